use axum::{extract::State, response::IntoResponse};

use crate::db::queries;
use crate::error::AppError;
use crate::handlers::{ApiResponse, AppQuery, Pagination};
use crate::middleware::auth::AuthUser;
use crate::AppState;

/// Newest first. Offset is ignored; the inbox is only ever read from the top.
pub async fn list_notifications(
    State(state): State<AppState>,
    user: AuthUser,
    AppQuery(page): AppQuery<Pagination>,
) -> Result<impl IntoResponse, AppError> {
    let notifications = queries::list_notifications(&state.db, user.user_id, page.limit()).await?;
    Ok(ApiResponse::ok(notifications))
}
