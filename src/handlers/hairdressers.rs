use axum::{extract::State, response::IntoResponse};
use bigdecimal::BigDecimal;
use serde::Deserialize;
use serde_json::json;

use crate::domain::GeoPoint;
use crate::error::AppError;
use crate::handlers::{ApiResponse, AppJson, AppQuery, Pagination};
use crate::middleware::auth::AuthUser;
use crate::validation::{
    validate_enum, validate_positive_amount, ALLOWED_PAYMENT_METHODS,
};
use crate::AppState;

#[derive(Debug, Deserialize)]
pub struct LocationRequest {
    pub latitude: f64,
    pub longitude: f64,
}

#[derive(Debug, Deserialize)]
pub struct AvailabilityRequest {
    pub is_available: bool,
}

#[derive(Debug, Deserialize)]
pub struct RechargeRequest {
    pub amount: BigDecimal,
    pub payment_method: String,
}

pub async fn me(State(state): State<AppState>, user: AuthUser) -> Result<impl IntoResponse, AppError> {
    let hairdresser_id = user.hairdresser_id(&state).await?;
    let profile = state.hairdressers.profile(hairdresser_id).await?;
    Ok(ApiResponse::ok(profile))
}

pub async fn update_location(
    State(state): State<AppState>,
    user: AuthUser,
    AppJson(req): AppJson<LocationRequest>,
) -> Result<impl IntoResponse, AppError> {
    let hairdresser_id = user.hairdresser_id(&state).await?;
    let location = GeoPoint::validated(req.latitude, req.longitude)?;
    let profile = state
        .hairdressers
        .update_location(hairdresser_id, location)
        .await?;
    Ok(ApiResponse::ok(profile))
}

pub async fn set_availability(
    State(state): State<AppState>,
    user: AuthUser,
    AppJson(req): AppJson<AvailabilityRequest>,
) -> Result<impl IntoResponse, AppError> {
    let hairdresser_id = user.hairdresser_id(&state).await?;
    let profile = state
        .hairdressers
        .set_availability(hairdresser_id, req.is_available)
        .await?;
    Ok(ApiResponse::ok(profile))
}

pub async fn balance(State(state): State<AppState>, user: AuthUser) -> Result<impl IntoResponse, AppError> {
    let hairdresser_id = user.hairdresser_id(&state).await?;
    let balance = state.ledger.balance(hairdresser_id).await?;
    Ok(ApiResponse::ok(json!({
        "hairdresser_id": hairdresser_id,
        "balance": balance.to_string(),
    })))
}

pub async fn transactions(
    State(state): State<AppState>,
    user: AuthUser,
    AppQuery(page): AppQuery<Pagination>,
) -> Result<impl IntoResponse, AppError> {
    let hairdresser_id = user.hairdresser_id(&state).await?;
    let entries = state
        .ledger
        .history(hairdresser_id, page.limit(), page.offset())
        .await?;
    Ok(ApiResponse::ok(entries))
}

pub async fn request_recharge(
    State(state): State<AppState>,
    user: AuthUser,
    AppJson(req): AppJson<RechargeRequest>,
) -> Result<impl IntoResponse, AppError> {
    let hairdresser_id = user.hairdresser_id(&state).await?;
    validate_positive_amount(&req.amount)?;
    let method = req.payment_method.trim().to_lowercase();
    validate_enum("payment_method", &method, ALLOWED_PAYMENT_METHODS)?;

    let entry = state
        .ledger
        .request_recharge(hairdresser_id, req.amount, method)
        .await?;
    Ok(ApiResponse::created(entry))
}
