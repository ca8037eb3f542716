use axum::{
    extract::{Path, State},
    routing::{delete, get, post},
    Json, Router,
};
use uuid::Uuid;

use crate::{
    auth::AuthUser, entities::item, services::inventory::CreateItemRequest, ApiResponse, ApiResult,
    AppState,
};

pub fn routes() -> Router<AppState> {
    Router::new()
        .route("/items", post(create_item))
        .route("/items/mine", get(my_items))
        .route("/items/:id", delete(delete_item))
}

async fn create_item(
    State(state): State<AppState>,
    user: AuthUser,
    Json(payload): Json<CreateItemRequest>,
) -> ApiResult<item::Model> {
    let item = state
        .services
        .inventory
        .create_item(user.user_id, payload)
        .await?;
    Ok(Json(ApiResponse::success(item)))
}

async fn my_items(State(state): State<AppState>, user: AuthUser) -> ApiResult<Vec<item::Model>> {
    let items = state
        .services
        .inventory
        .list_for_seller(user.user_id)
        .await?;
    Ok(Json(ApiResponse::success(items)))
}

async fn delete_item(
    State(state): State<AppState>,
    user: AuthUser,
    Path(id): Path<Uuid>,
) -> ApiResult<()> {
    state
        .services
        .inventory
        .delete_item(user.user_id, id)
        .await?;
    Ok(Json(ApiResponse::success(())))
}
