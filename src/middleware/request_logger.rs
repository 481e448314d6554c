use axum::{
    body::Body,
    extract::{Request, State},
    http::{HeaderValue, StatusCode},
    middleware::Next,
    response::{IntoResponse, Response},
};
use std::time::Instant;
use uuid::Uuid;

const MAX_BODY_LOG_SIZE: usize = 1024; // 1KB of sanitized body per log line
/// Same cap axum applies to extractors by default, so buffering here rejects nothing new.
pub const MAX_BODY_READ_SIZE: usize = 2 * 1024 * 1024;
const REQUEST_ID_HEADER: &str = "x-request-id";

/// `log_body` comes from `LOG_REQUEST_BODY`. Logged bodies are sanitized.
pub async fn request_logger_middleware(
    State(log_body): State<bool>,
    mut req: Request,
    next: Next,
) -> Response {
    let request_id = Uuid::new_v4().to_string();
    let method = req.method().clone();
    let uri = req.uri().clone();
    let start = Instant::now();

    if let Ok(value) = HeaderValue::from_str(&request_id) {
        req.headers_mut().insert(REQUEST_ID_HEADER, value);
    }

    if log_body {
        let (parts, body) = req.into_parts();
        let bytes = match axum::body::to_bytes(body, MAX_BODY_READ_SIZE).await {
            Ok(bytes) => bytes,
            Err(_) => {
                tracing::warn!(
                    request_id = %request_id,
                    method = %method,
                    uri = %uri,
                    "Request body too large or failed to read"
                );
                return (StatusCode::PAYLOAD_TOO_LARGE, "Request body too large").into_response();
            }
        };

        let sanitized_body = loggable_body(&bytes);

        tracing::info!(
            request_id = %request_id,
            method = %method,
            uri = %uri,
            body_size = bytes.len(),
            body = %sanitized_body,
            "Incoming request"
        );

        req = Request::from_parts(parts, Body::from(bytes));
    } else {
        tracing::info!(
            request_id = %request_id,
            method = %method,
            uri = %uri,
            "Incoming request"
        );
    }

    let response = next.run(req).await;

    let latency = start.elapsed();
    let status = response.status();

    tracing::info!(
        request_id = %request_id,
        method = %method,
        uri = %uri,
        status = %status.as_u16(),
        latency_ms = latency.as_millis(),
        "Outgoing response"
    );

    let (mut parts, body) = response.into_parts();
    if let Ok(value) = HeaderValue::from_str(&request_id) {
        parts.headers.insert(REQUEST_ID_HEADER, value);
    }

    Response::from_parts(parts, body)
}

/// Sanitizes the whole body first, then cuts the result to `MAX_BODY_LOG_SIZE`.
fn loggable_body(bytes: &[u8]) -> String {
    let rendered = match serde_json::from_slice::<serde_json::Value>(bytes) {
        Ok(json) => {
            let sanitized = crate::utils::sanitize::sanitize_json(&json);
            serde_json::to_string(&sanitized).unwrap_or_else(|_| "[invalid json]".to_string())
        }
        Err(_) if bytes.is_empty() => return String::new(),
        Err(_) => return format!("[non-json, {} bytes]", bytes.len()),
    };

    if rendered.len() <= MAX_BODY_LOG_SIZE {
        return rendered;
    }
    let mut cut = MAX_BODY_LOG_SIZE;
    while !rendered.is_char_boundary(cut) {
        cut -= 1;
    }
    format!("{}[truncated, {} bytes]", &rendered[..cut], bytes.len())
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::Request;
    use axum::{body::Body, routing::post, Router};
    use tower::ServiceExt;

    fn app(log_body: bool) -> Router {
        Router::new()
            .route("/echo", post(|body: String| async move { body }))
            .layer(axum::middleware::from_fn_with_state(log_body, request_logger_middleware))
    }

    #[tokio::test]
    async fn test_request_logger_adds_request_id() {
        let response = app(false)
            .oneshot(Request::builder().method("POST").uri("/echo").body(Body::empty()).unwrap())
            .await
            .unwrap();

        assert!(response.headers().contains_key(REQUEST_ID_HEADER));
    }

    #[tokio::test]
    async fn test_body_is_forwarded_when_logged() {
        let response = app(true)
            .oneshot(
                Request::builder()
                    .method("POST")
                    .uri("/echo")
                    .body(Body::from(r#"{"client_phone":"+2250700000000"}"#))
                    .unwrap(),
            )
            .await
            .unwrap();

        let bytes = axum::body::to_bytes(response.into_body(), usize::MAX).await.unwrap();
        assert_eq!(&bytes[..], br#"{"client_phone":"+2250700000000"}"#);
    }

    #[tokio::test]
    async fn test_body_over_log_limit_is_forwarded() {
        let body = serde_json::json!({
            "rating": 5,
            "comment": "é".repeat(600),
            "client_phone": "+2250700000000"
        })
        .to_string();
        assert!(body.len() > MAX_BODY_LOG_SIZE);

        let response = app(true)
            .oneshot(
                Request::builder()
                    .method("POST")
                    .uri("/echo")
                    .body(Body::from(body.clone()))
                    .unwrap(),
            )
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::OK);
        let bytes = axum::body::to_bytes(response.into_body(), usize::MAX).await.unwrap();
        assert_eq!(bytes.len(), body.len());
    }

    #[test]
    fn test_logged_body_is_sanitized_then_truncated() {
        let body = serde_json::json!({
            "client_phone": "+2250700000012",
            "comment": "é".repeat(600)
        })
        .to_string();

        let logged = loggable_body(body.as_bytes());
        assert!(logged.contains("****12"));
        assert!(!logged.contains("+2250700000012"));
        assert!(logged.ends_with(&format!("[truncated, {} bytes]", body.len())));
    }
}
