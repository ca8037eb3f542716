use axum::{
    extract::{Path, State},
    routing::{get, post},
    Json, Router,
};
use serde::Deserialize;
use utoipa::ToSchema;
use uuid::Uuid;

use crate::{
    auth::AuthUser, entities::message, services::messages::UnreadThread, ApiResponse, ApiResult,
    AppState,
};

#[derive(Debug, Deserialize, ToSchema)]
pub struct SendMessageRequest {
    pub body: String,
}

#[derive(Debug, Deserialize, ToSchema)]
pub struct MarkSeenRequest {
    pub order_id: Uuid,
}

pub fn routes() -> Router<AppState> {
    Router::new()
        .route("/orders/:id/messages", get(thread).post(send_message))
        .route("/messages/unread", get(unread))
        .route("/messages/seen", post(mark_seen))
}

async fn thread(
    State(state): State<AppState>,
    user: AuthUser,
    Path(id): Path<Uuid>,
) -> ApiResult<Vec<message::Model>> {
    let messages = state.services.messages.thread(id, user.user_id).await?;
    Ok(Json(ApiResponse::success(messages)))
}

async fn send_message(
    State(state): State<AppState>,
    user: AuthUser,
    Path(id): Path<Uuid>,
    Json(payload): Json<SendMessageRequest>,
) -> ApiResult<message::Model> {
    let message = state
        .services
        .messages
        .send_message(id, user.user_id, &payload.body)
        .await?;
    Ok(Json(ApiResponse::success(message)))
}

async fn unread(State(state): State<AppState>, user: AuthUser) -> ApiResult<Vec<UnreadThread>> {
    let overview = state
        .services
        .messages
        .unread_overview(user.user_id)
        .await?;
    Ok(Json(ApiResponse::success(overview)))
}

async fn mark_seen(
    State(state): State<AppState>,
    user: AuthUser,
    Json(payload): Json<MarkSeenRequest>,
) -> ApiResult<()> {
    state
        .services
        .messages
        .mark_seen(user.user_id, payload.order_id)
        .await?;
    Ok(Json(ApiResponse::success(())))
}
