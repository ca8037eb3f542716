use axum::{
    extract::{Path, State},
    routing::{get, post},
    Json, Router,
};
use serde::Serialize;
use uuid::Uuid;

use crate::{auth::AuthUser, entities::notification, ApiResponse, ApiResult, AppState};

#[derive(Debug, Serialize)]
pub struct ClearOutcome {
    pub cleared: u64,
}

pub fn routes() -> Router<AppState> {
    Router::new()
        .route("/notifications/unread", get(unread))
        .route("/notifications/:id/seen", post(mark_seen))
        .route("/notifications/clear", post(clear))
}

async fn unread(
    State(state): State<AppState>,
    user: AuthUser,
) -> ApiResult<Vec<notification::Model>> {
    let notifications = state
        .services
        .notifications
        .list_unread(user.user_id)
        .await?;
    Ok(Json(ApiResponse::success(notifications)))
}

async fn mark_seen(
    State(state): State<AppState>,
    user: AuthUser,
    Path(id): Path<Uuid>,
) -> ApiResult<()> {
    state
        .services
        .notifications
        .mark_read(user.user_id, id)
        .await?;
    Ok(Json(ApiResponse::success(())))
}

async fn clear(State(state): State<AppState>, user: AuthUser) -> ApiResult<ClearOutcome> {
    let cleared = state.services.notifications.clear_all(user.user_id).await?;
    Ok(Json(ApiResponse::success(ClearOutcome { cleared })))
}
