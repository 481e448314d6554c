pub mod admin;
pub mod auth;
pub mod bookings;
pub mod hairdressers;
pub mod notifications;

use axum::{
    extract::{FromRequest, FromRequestParts, State},
    http::StatusCode,
    response::IntoResponse,
    Json,
};
use serde::{Deserialize, Serialize};

use crate::error::AppError;
use crate::health::{check_health, PostgresChecker, RedisChecker};
use crate::AppState;

pub const DEFAULT_PAGE_SIZE: i64 = 20;
pub const MAX_PAGE_SIZE: i64 = 100;

/// Success envelope shared by every endpoint.
#[derive(Debug, Serialize)]
pub struct ApiResponse<T> {
    pub success: bool,
    pub data: T,
}

impl<T: Serialize> ApiResponse<T> {
    pub fn ok(data: T) -> Json<Self> {
        Json(Self {
            success: true,
            data,
        })
    }

    pub fn created(data: T) -> (StatusCode, Json<Self>) {
        (StatusCode::CREATED, Self::ok(data))
    }
}

/// JSON body whose rejections use the error envelope.
#[derive(FromRequest)]
#[from_request(via(axum::Json), rejection(AppError))]
pub struct AppJson<T>(pub T);

#[derive(FromRequestParts)]
#[from_request(via(axum::extract::Query), rejection(AppError))]
pub struct AppQuery<T>(pub T);

#[derive(FromRequestParts)]
#[from_request(via(axum::extract::Path), rejection(AppError))]
pub struct AppPath<T>(pub T);

#[derive(Debug, Default, Deserialize)]
pub struct Pagination {
    pub limit: Option<i64>,
    pub offset: Option<i64>,
}

impl Pagination {
    pub fn limit(&self) -> i64 {
        self.limit.unwrap_or(DEFAULT_PAGE_SIZE).clamp(1, MAX_PAGE_SIZE)
    }

    pub fn offset(&self) -> i64 {
        self.offset.unwrap_or(0).max(0)
    }
}

pub async fn health(State(state): State<AppState>) -> impl IntoResponse {
    let postgres = PostgresChecker::new(state.db.clone());
    let redis = RedisChecker::new(state.config.redis_url.clone());
    let report = check_health(&postgres, &redis, state.start_time).await;

    let status_code = if report.status == "unhealthy" {
        StatusCode::SERVICE_UNAVAILABLE
    } else {
        StatusCode::OK
    };
    (status_code, Json(report))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_pagination_defaults_and_bounds() {
        let default = Pagination::default();
        assert_eq!(default.limit(), DEFAULT_PAGE_SIZE);
        assert_eq!(default.offset(), 0);

        let wild = Pagination {
            limit: Some(10_000),
            offset: Some(-5),
        };
        assert_eq!(wild.limit(), MAX_PAGE_SIZE);
        assert_eq!(wild.offset(), 0);
    }
}
