use axum::{extract::State, routing::post, Json, Router};

use crate::{
    auth::AuthUser,
    services::checkout::{CheckoutOutcome, CheckoutRequest},
    ApiResponse, ApiResult, AppState,
};

pub fn routes() -> Router<AppState> {
    Router::new().route("/checkout", post(checkout))
}

async fn checkout(
    State(state): State<AppState>,
    user: AuthUser,
    Json(payload): Json<CheckoutRequest>,
) -> ApiResult<CheckoutOutcome> {
    let outcome = state
        .services
        .checkout
        .checkout(user.user_id, payload)
        .await?;
    Ok(Json(ApiResponse::success(outcome)))
}
