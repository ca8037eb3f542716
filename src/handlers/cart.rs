use axum::{
    extract::{Path, State},
    routing::{delete, get},
    Json, Router,
};
use serde::Deserialize;
use utoipa::ToSchema;
use uuid::Uuid;

use crate::{
    auth::AuthUser, services::cart::CartLine, ApiResponse, ApiResult, AppState,
};

#[derive(Debug, Deserialize, ToSchema)]
pub struct AddToCartRequest {
    pub item_id: Uuid,
}

pub fn routes() -> Router<AppState> {
    Router::new()
        .route("/cart", get(view_cart).post(add_to_cart))
        .route("/cart/:item_id", delete(remove_from_cart))
}

async fn add_to_cart(
    State(state): State<AppState>,
    user: AuthUser,
    Json(payload): Json<AddToCartRequest>,
) -> ApiResult<Vec<CartLine>> {
    state
        .services
        .cart
        .add_to_cart(user.user_id, payload.item_id)
        .await?;
    let cart = state.services.cart.view_cart(user.user_id).await?;
    Ok(Json(ApiResponse::success(cart)))
}

async fn view_cart(State(state): State<AppState>, user: AuthUser) -> ApiResult<Vec<CartLine>> {
    let cart = state.services.cart.view_cart(user.user_id).await?;
    Ok(Json(ApiResponse::success(cart)))
}

async fn remove_from_cart(
    State(state): State<AppState>,
    user: AuthUser,
    Path(item_id): Path<Uuid>,
) -> ApiResult<Vec<CartLine>> {
    state
        .services
        .cart
        .remove_from_cart(user.user_id, item_id)
        .await?;
    let cart = state.services.cart.view_cart(user.user_id).await?;
    Ok(Json(ApiResponse::success(cart)))
}
