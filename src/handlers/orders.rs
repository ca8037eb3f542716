use axum::{
    extract::{Path, Query, State},
    routing::{get, post, put},
    Json, Router,
};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::{
    auth::AuthUser,
    entities::order,
    services::orders::{OrderDetails, UpdateOrderStatusRequest},
    ApiResponse, ApiResult, AppState,
};

#[derive(Debug, Deserialize)]
pub struct ArchiveParams {
    /// Archive one order when present; sweep all eligible orders otherwise.
    pub order_id: Option<Uuid>,
}

#[derive(Debug, Serialize)]
pub struct ArchiveOutcome {
    pub archived: u64,
}

pub fn routes() -> Router<AppState> {
    Router::new()
        .route("/orders", get(list_orders))
        .route("/orders/:id/status", put(update_status))
        .route("/orders/archive", post(archive))
}

async fn list_orders(State(state): State<AppState>, user: AuthUser) -> ApiResult<Vec<OrderDetails>> {
    let orders = state.services.orders.list_for_user(user.user_id).await?;
    Ok(Json(ApiResponse::success(orders)))
}

async fn update_status(
    State(state): State<AppState>,
    user: AuthUser,
    Path(id): Path<Uuid>,
    Json(payload): Json<UpdateOrderStatusRequest>,
) -> ApiResult<order::Model> {
    let updated = state
        .services
        .orders
        .update_status(id, user.user_id, payload)
        .await?;
    Ok(Json(ApiResponse::success(updated)))
}

async fn archive(
    State(state): State<AppState>,
    user: AuthUser,
    Query(params): Query<ArchiveParams>,
) -> ApiResult<ArchiveOutcome> {
    let archived = match params.order_id {
        Some(order_id) => {
            state
                .services
                .orders
                .archive_order(order_id, user.user_id)
                .await?;
            1
        }
        None => state.services.orders.archive_all(user.user_id).await?,
    };
    Ok(Json(ApiResponse::success(ArchiveOutcome { archived })))
}
