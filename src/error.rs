use axum::{
    Json,
    extract::rejection::{JsonRejection, PathRejection, QueryRejection},
    http::StatusCode,
    response::{IntoResponse, Response},
};
use serde_json::{Value, json};
use thiserror::Error;

use crate::domain::DomainError;
use crate::validation::ValidationError;

#[derive(Error, Debug)]
pub enum AppError {
    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    #[error("Cache error: {0}")]
    Cache(#[from] redis::RedisError),

    #[error(transparent)]
    Domain(#[from] DomainError),

    #[error("Validation error: {0}")]
    Validation(String),

    #[error("Unauthorized: {0}")]
    Unauthorized(String),

    #[error("Invalid or expired one-time code")]
    InvalidOtp,

    #[error("Internal server error: {0}")]
    Internal(String),
}

impl From<ValidationError> for AppError {
    fn from(err: ValidationError) -> Self {
        AppError::Validation(err.to_string())
    }
}

impl From<JsonRejection> for AppError {
    fn from(rejection: JsonRejection) -> Self {
        AppError::Validation(rejection.body_text())
    }
}

impl From<QueryRejection> for AppError {
    fn from(rejection: QueryRejection) -> Self {
        AppError::Validation(rejection.body_text())
    }
}

impl From<PathRejection> for AppError {
    fn from(rejection: PathRejection) -> Self {
        AppError::Validation(rejection.body_text())
    }
}

impl AppError {
    pub fn code(&self) -> &'static str {
        match self {
            AppError::Database(sqlx::Error::RowNotFound) => "NOT_FOUND",
            AppError::Database(_) | AppError::Cache(_) | AppError::Internal(_) => "INTERNAL_ERROR",
            AppError::Validation(_) => "VALIDATION_ERROR",
            AppError::Unauthorized(_) => "UNAUTHORIZED",
            AppError::InvalidOtp => "INVALID_OTP",
            AppError::Domain(err) => match err {
                DomainError::NotFound(_) => "NOT_FOUND",
                DomainError::Forbidden(_) => "FORBIDDEN",
                DomainError::InvalidStatus { .. } | DomainError::NotPendingRecharge => "INVALID_STATUS",
                DomainError::InsufficientBalance { .. } => "INSUFFICIENT_BALANCE",
                DomainError::NoHairdresserAvailable => "NO_HAIRDRESSER_AVAILABLE",
                DomainError::HairdresserBusy => "HAIRDRESSER_BUSY",
                DomainError::NotCompleted => "NOT_COMPLETED",
                DomainError::AlreadyRated => "ALREADY_RATED",
                DomainError::Validation(_) => "VALIDATION_ERROR",
            },
        }
    }

    pub fn status_code(&self) -> StatusCode {
        match self {
            AppError::Database(sqlx::Error::RowNotFound) => StatusCode::NOT_FOUND,
            AppError::Database(_) | AppError::Cache(_) | AppError::Internal(_) => {
                StatusCode::INTERNAL_SERVER_ERROR
            }
            AppError::Validation(_) | AppError::InvalidOtp => StatusCode::BAD_REQUEST,
            AppError::Unauthorized(_) => StatusCode::UNAUTHORIZED,
            AppError::Domain(DomainError::Validation(_)) => StatusCode::BAD_REQUEST,
            AppError::Domain(DomainError::Forbidden(_)) => StatusCode::FORBIDDEN,
            // Missing rows and failed preconditions share 404.
            AppError::Domain(_) => StatusCode::NOT_FOUND,
        }
    }

    fn details(&self) -> Option<Value> {
        match self {
            AppError::Domain(DomainError::InsufficientBalance {
                required,
                available,
            }) => Some(json!({
                "required": required.to_string(),
                "available": available.to_string(),
            })),
            AppError::Domain(DomainError::InvalidStatus { current, action }) => Some(json!({
                "current_status": current.as_str(),
                "action": action,
            })),
            _ => None,
        }
    }

    fn public_message(&self) -> String {
        match self.status_code() {
            StatusCode::INTERNAL_SERVER_ERROR => "Internal server error".to_string(),
            StatusCode::NOT_FOUND if matches!(self, AppError::Database(_)) => {
                "Resource not found".to_string()
            }
            _ => self.to_string(),
        }
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let status = self.status_code();
        if status == StatusCode::INTERNAL_SERVER_ERROR {
            tracing::error!(error = %self, "request failed");
        }

        let mut error = json!({
            "code": self.code(),
            "message": self.public_message(),
        });
        if let Some(details) = self.details() {
            error["details"] = details;
        }

        let body = Json(json!({
            "success": false,
            "error": error,
        }));

        (status, body).into_response()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::BookingStatus;
    use bigdecimal::BigDecimal;

    async fn body_json(response: Response) -> Value {
        let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .unwrap();
        serde_json::from_slice(&bytes).unwrap()
    }

    #[test]
    fn test_validation_error_status_code() {
        let error = AppError::Validation("Invalid input".to_string());
        assert_eq!(error.status_code(), StatusCode::BAD_REQUEST);
        assert_eq!(error.code(), "VALIDATION_ERROR");
    }

    #[test]
    fn test_forbidden_status_code() {
        let error = AppError::Domain(DomainError::Forbidden("nope".to_string()));
        assert_eq!(error.status_code(), StatusCode::FORBIDDEN);
        assert_eq!(error.code(), "FORBIDDEN");
    }

    #[test]
    fn test_preconditions_surface_as_not_found() {
        for err in [
            DomainError::NoHairdresserAvailable,
            DomainError::AlreadyRated,
            DomainError::NotCompleted,
            DomainError::InvalidStatus {
                current: BookingStatus::Accepted,
                action: "accept",
            },
        ] {
            assert_eq!(AppError::Domain(err).status_code(), StatusCode::NOT_FOUND);
        }
    }

    #[test]
    fn test_database_error_status_code() {
        let error = AppError::Database(sqlx::Error::PoolTimedOut);
        assert_eq!(error.status_code(), StatusCode::INTERNAL_SERVER_ERROR);
        assert_eq!(error.code(), "INTERNAL_ERROR");
    }

    #[test]
    fn test_unauthorized_error_status_code() {
        let error = AppError::Unauthorized("missing bearer token".to_string());
        assert_eq!(error.status_code(), StatusCode::UNAUTHORIZED);
    }

    #[tokio::test]
    async fn test_error_envelope_shape() {
        let error = AppError::Domain(DomainError::InsufficientBalance {
            required: BigDecimal::from(2000),
            available: BigDecimal::from(500),
        });
        let response = error.into_response();
        assert_eq!(response.status(), StatusCode::NOT_FOUND);

        let body = body_json(response).await;
        assert_eq!(body["success"], false);
        assert_eq!(body["error"]["code"], "INSUFFICIENT_BALANCE");
        assert_eq!(body["error"]["details"]["required"], "2000");
        assert!(body["error"]["message"].is_string());
    }

    #[tokio::test]
    async fn test_internal_error_hides_details() {
        let response = AppError::Internal("connection string leaked".to_string()).into_response();
        let body = body_json(response).await;
        assert_eq!(body["error"]["message"], "Internal server error");
        assert!(body["error"].get("details").is_none());
    }
}
