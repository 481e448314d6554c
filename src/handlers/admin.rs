use axum::{extract::State, response::IntoResponse};
use serde::Deserialize;
use uuid::Uuid;

use crate::domain::RegistrationStatus;
use crate::error::AppError;
use crate::handlers::{ApiResponse, AppJson, AppPath};
use crate::middleware::auth::AdminUser;
use crate::AppState;

#[derive(Debug, Deserialize)]
pub struct RegistrationRequest {
    pub status: RegistrationStatus,
}

pub async fn approve_recharge(
    State(state): State<AppState>,
    AdminUser(admin): AdminUser,
    AppPath(id): AppPath<Uuid>,
) -> Result<impl IntoResponse, AppError> {
    tracing::info!(admin_id = %admin.user_id, transaction_id = %id, "Admin approving recharge");
    let entry = state.ledger.approve_recharge(id).await?;
    Ok(ApiResponse::ok(entry))
}

pub async fn set_registration_status(
    State(state): State<AppState>,
    AdminUser(admin): AdminUser,
    AppPath(id): AppPath<Uuid>,
    AppJson(req): AppJson<RegistrationRequest>,
) -> Result<impl IntoResponse, AppError> {
    tracing::info!(admin_id = %admin.user_id, hairdresser_id = %id, "Admin updating registration");
    let profile = state
        .hairdressers
        .set_registration_status(id, req.status)
        .await?;
    Ok(ApiResponse::ok(profile))
}
