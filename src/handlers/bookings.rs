use axum::{extract::State, response::IntoResponse};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::domain::{Actor, BookingStatus, DomainError, GeoPoint, ServiceType};
use crate::error::AppError;
use crate::handlers::{ApiResponse, AppJson, AppPath, AppQuery, Pagination};
use crate::middleware::auth::{AuthUser, MaybeAuthUser, Role};
use crate::services::lifecycle::CreateBooking;
use crate::validation::{
    clean_text, normalize_phone, validate_extension_minutes, validate_max_len, validate_radius,
    sanitize_string, ADDRESS_MAX_LEN, COMMENT_MAX_LEN, NAME_MAX_LEN, REASON_MAX_LEN,
};
use crate::AppState;

#[derive(Debug, Deserialize)]
pub struct CreateBookingRequest {
    pub client_name: String,
    pub client_phone: String,
    pub hairstyle_id: Uuid,
    pub service_type: ServiceType,
    pub location_address: Option<String>,
    pub latitude: Option<f64>,
    pub longitude: Option<f64>,
    pub scheduled_time: DateTime<Utc>,
    pub hairdresser_id: Option<Uuid>,
}

#[derive(Debug, Deserialize)]
pub struct NearbyQuery {
    pub latitude: f64,
    pub longitude: f64,
    pub radius: Option<f64>,
    pub hairstyle_id: Option<Uuid>,
}

#[derive(Debug, Serialize)]
pub struct NearbyHairdresser {
    pub hairdresser_id: Uuid,
    pub profession: String,
    pub average_rating: String,
    pub total_jobs: i32,
    pub latitude: Option<f64>,
    pub longitude: Option<f64>,
    pub distance_meters: f64,
}

#[derive(Debug, Deserialize)]
pub struct ListBookingsQuery {
    pub status: Option<BookingStatus>,
    pub limit: Option<i64>,
    pub offset: Option<i64>,
}

/// Guests identify themselves with the phone number on the booking.
#[derive(Debug, Default, Deserialize)]
pub struct GuestQuery {
    pub client_phone: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
pub struct RejectRequest {
    pub reason: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct CancelRequest {
    pub reason: String,
    pub client_phone: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct ExtensionRequest {
    pub minutes: i32,
    pub client_phone: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct RateRequest {
    pub rating: i16,
    pub comment: Option<String>,
    pub client_phone: Option<String>,
}

fn optional_text(field: &'static str, value: Option<String>, max_len: usize) -> Result<Option<String>, AppError> {
    match value.map(|v| sanitize_string(&v)) {
        Some(v) if v.is_empty() => Ok(None),
        Some(v) => {
            validate_max_len(field, &v, max_len)?;
            Ok(Some(v))
        }
        None => Ok(None),
    }
}

fn optional_location(latitude: Option<f64>, longitude: Option<f64>) -> Result<Option<GeoPoint>, AppError> {
    match (latitude, longitude) {
        (Some(latitude), Some(longitude)) => Ok(Some(GeoPoint::validated(latitude, longitude)?)),
        (None, None) => Ok(None),
        _ => Err(AppError::Validation(
            "latitude and longitude must be given together".to_string(),
        )),
    }
}

/// Bearer token wins; otherwise a guest phone; otherwise 401.
async fn resolve_actor(
    state: &AppState,
    user: Option<AuthUser>,
    client_phone: Option<&str>,
) -> Result<Actor, AppError> {
    match (user, client_phone) {
        (Some(user), _) => user.actor(state).await,
        (None, Some(phone)) => Ok(Actor::Guest(normalize_phone(phone)?)),
        (None, None) => Err(AppError::Unauthorized(
            "missing bearer token or client_phone".to_string(),
        )),
    }
}

pub async fn create_booking(
    State(state): State<AppState>,
    MaybeAuthUser(user): MaybeAuthUser,
    AppJson(req): AppJson<CreateBookingRequest>,
) -> Result<impl IntoResponse, AppError> {
    let client_id = match &user {
        Some(user) if user.role == Role::Client => Some(user.user_id),
        Some(_) => {
            return Err(DomainError::Forbidden("only clients can create bookings".to_string()).into())
        }
        None => None,
    };

    let input = CreateBooking {
        client_id,
        client_name: clean_text("client_name", &req.client_name, NAME_MAX_LEN)?,
        client_phone: normalize_phone(&req.client_phone)?,
        hairstyle_id: req.hairstyle_id,
        service_type: req.service_type,
        location_address: optional_text("location_address", req.location_address, ADDRESS_MAX_LEN)?,
        location: optional_location(req.latitude, req.longitude)?,
        scheduled_time: req.scheduled_time,
        hairdresser_id: req.hairdresser_id,
    };

    let booking = state.lifecycle.create(input).await?;
    Ok(ApiResponse::created(booking))
}

pub async fn nearby_hairdressers(
    State(state): State<AppState>,
    AppQuery(query): AppQuery<NearbyQuery>,
) -> Result<impl IntoResponse, AppError> {
    let origin = GeoPoint::validated(query.latitude, query.longitude)?;
    let radius = query
        .radius
        .unwrap_or(state.config.default_search_radius_meters);
    validate_radius(radius)?;

    let candidates = state
        .matcher
        .find_nearby(origin, radius, query.hairstyle_id)
        .await?;

    let data: Vec<NearbyHairdresser> = candidates
        .into_iter()
        .map(|c| NearbyHairdresser {
            hairdresser_id: c.hairdresser.id,
            profession: c.hairdresser.profession,
            average_rating: c.hairdresser.average_rating.to_string(),
            total_jobs: c.hairdresser.total_jobs,
            latitude: c.hairdresser.latitude,
            longitude: c.hairdresser.longitude,
            distance_meters: c.distance_meters.round(),
        })
        .collect();

    Ok(ApiResponse::ok(data))
}

pub async fn list_bookings(
    State(state): State<AppState>,
    user: AuthUser,
    AppQuery(query): AppQuery<ListBookingsQuery>,
) -> Result<impl IntoResponse, AppError> {
    let actor = user.actor(&state).await?;
    let page = Pagination {
        limit: query.limit,
        offset: query.offset,
    };
    let bookings = state
        .lifecycle
        .list(&actor, query.status, page.limit(), page.offset())
        .await?;
    Ok(ApiResponse::ok(bookings))
}

pub async fn get_booking(
    State(state): State<AppState>,
    MaybeAuthUser(user): MaybeAuthUser,
    AppPath(id): AppPath<Uuid>,
    AppQuery(guest): AppQuery<GuestQuery>,
) -> Result<impl IntoResponse, AppError> {
    let actor = resolve_actor(&state, user, guest.client_phone.as_deref()).await?;
    let booking = state.lifecycle.get(id, &actor).await?;
    Ok(ApiResponse::ok(booking))
}

pub async fn accept_booking(
    State(state): State<AppState>,
    user: AuthUser,
    AppPath(id): AppPath<Uuid>,
) -> Result<impl IntoResponse, AppError> {
    let hairdresser_id = user.hairdresser_id(&state).await?;
    let booking = state.lifecycle.accept(id, hairdresser_id).await?;
    Ok(ApiResponse::ok(booking))
}

pub async fn reject_booking(
    State(state): State<AppState>,
    user: AuthUser,
    AppPath(id): AppPath<Uuid>,
    body: Option<AppJson<RejectRequest>>,
) -> Result<impl IntoResponse, AppError> {
    let hairdresser_id = user.hairdresser_id(&state).await?;
    let reason = body.and_then(|AppJson(req)| req.reason);
    let reason = optional_text("reason", reason, REASON_MAX_LEN)?;

    let booking = state.lifecycle.reject(id, hairdresser_id, reason).await?;
    Ok(ApiResponse::ok(booking))
}

pub async fn start_booking(
    State(state): State<AppState>,
    user: AuthUser,
    AppPath(id): AppPath<Uuid>,
) -> Result<impl IntoResponse, AppError> {
    let hairdresser_id = user.hairdresser_id(&state).await?;
    let booking = state.lifecycle.start(id, hairdresser_id).await?;
    Ok(ApiResponse::ok(booking))
}

pub async fn complete_booking(
    State(state): State<AppState>,
    user: AuthUser,
    AppPath(id): AppPath<Uuid>,
) -> Result<impl IntoResponse, AppError> {
    let hairdresser_id = user.hairdresser_id(&state).await?;
    let booking = state.lifecycle.complete(id, hairdresser_id).await?;
    Ok(ApiResponse::ok(booking))
}

pub async fn cancel_booking(
    State(state): State<AppState>,
    MaybeAuthUser(user): MaybeAuthUser,
    AppPath(id): AppPath<Uuid>,
    AppJson(req): AppJson<CancelRequest>,
) -> Result<impl IntoResponse, AppError> {
    let actor = resolve_actor(&state, user, req.client_phone.as_deref()).await?;
    let reason = clean_text("reason", &req.reason, REASON_MAX_LEN)?;

    let booking = state.lifecycle.cancel(id, &actor, reason).await?;
    Ok(ApiResponse::ok(booking))
}

pub async fn request_extension(
    State(state): State<AppState>,
    MaybeAuthUser(user): MaybeAuthUser,
    AppPath(id): AppPath<Uuid>,
    AppJson(req): AppJson<ExtensionRequest>,
) -> Result<impl IntoResponse, AppError> {
    let actor = resolve_actor(&state, user, req.client_phone.as_deref()).await?;
    validate_extension_minutes(req.minutes)?;

    let booking = state
        .lifecycle
        .request_extension(id, &actor, req.minutes)
        .await?;
    Ok(ApiResponse::ok(booking))
}

pub async fn rate_booking(
    State(state): State<AppState>,
    MaybeAuthUser(user): MaybeAuthUser,
    AppPath(id): AppPath<Uuid>,
    AppJson(req): AppJson<RateRequest>,
) -> Result<impl IntoResponse, AppError> {
    let actor = resolve_actor(&state, user, req.client_phone.as_deref()).await?;
    let comment = optional_text("comment", req.comment, COMMENT_MAX_LEN)?;

    let rating = state.ratings.rate(id, &actor, req.rating, comment).await?;
    Ok(ApiResponse::created(rating))
}

pub async fn track_booking(
    State(state): State<AppState>,
    MaybeAuthUser(user): MaybeAuthUser,
    AppPath(id): AppPath<Uuid>,
    AppQuery(guest): AppQuery<GuestQuery>,
) -> Result<impl IntoResponse, AppError> {
    let actor = resolve_actor(&state, user, guest.client_phone.as_deref()).await?;
    let tracking = state.lifecycle.track(id, &actor).await?;
    Ok(ApiResponse::ok(tracking))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_location_requires_both_coordinates() {
        assert!(optional_location(Some(5.36), None).is_err());
        assert!(optional_location(None, None).unwrap().is_none());
        assert!(optional_location(Some(91.0), Some(0.0)).is_err());
        assert_eq!(
            optional_location(Some(5.36), Some(-4.01)).unwrap(),
            Some(GeoPoint::new(5.36, -4.01))
        );
    }

    #[test]
    fn test_optional_text_drops_blank_values() {
        assert_eq!(optional_text("reason", Some("  ".to_string()), 10).unwrap(), None);
        assert_eq!(
            optional_text("reason", Some(" too  busy ".to_string()), 10).unwrap(),
            Some("too busy".to_string())
        );
        assert!(optional_text("reason", Some("x".repeat(11)), 10).is_err());
    }
}
