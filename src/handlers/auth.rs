use axum::{extract::State, response::IntoResponse};
use serde::{Deserialize, Serialize};
use serde_json::json;

use crate::db::models::User;
use crate::db::queries;
use crate::domain::DomainError;
use crate::error::AppError;
use crate::handlers::{ApiResponse, AppJson};
use crate::middleware::auth::{issue_token, Role};
use crate::validation::normalize_phone;
use crate::AppState;

#[derive(Debug, Deserialize)]
pub struct OtpRequest {
    pub phone: String,
}

#[derive(Debug, Deserialize)]
pub struct OtpVerifyRequest {
    pub phone: String,
    pub code: String,
}

#[derive(Debug, Serialize)]
pub struct TokenResponse {
    pub token: String,
    pub expires_in: i64,
    pub user: User,
}

pub async fn request_otp(
    State(state): State<AppState>,
    AppJson(req): AppJson<OtpRequest>,
) -> Result<impl IntoResponse, AppError> {
    let phone = normalize_phone(&req.phone)?;
    state.otp.issue(&phone).await?;
    Ok(ApiResponse::ok(json!({ "expires_in": state.otp.ttl_secs() })))
}

pub async fn verify_otp(
    State(state): State<AppState>,
    AppJson(req): AppJson<OtpVerifyRequest>,
) -> Result<impl IntoResponse, AppError> {
    let phone = normalize_phone(&req.phone)?;
    state.otp.verify(&phone, &req.code).await?;

    let user = queries::find_user_by_phone(&state.db, &phone)
        .await?
        .ok_or_else(|| AppError::from(DomainError::NotFound("user".to_string())))?;
    let role: Role = user.role.parse()?;

    let token = issue_token(
        user.id,
        role,
        &state.config.jwt_secret,
        state.config.jwt_expires_in_secs,
    )?;
    tracing::info!(user_id = %user.id, role = role.as_str(), "User signed in with OTP");

    Ok(ApiResponse::ok(TokenResponse {
        token,
        expires_in: state.config.jwt_expires_in_secs,
        user,
    }))
}
