use axum::{
    extract::State,
    http::StatusCode,
    response::Json,
    routing::{get, post},
    Router,
};
use tracing::info;

use crate::auth::CurrentUser;
use crate::errors::ServiceError;
use crate::models::{NewOrder, OrderView};
use crate::{ApiResponse, ApiResult, AppState};

/// Lists the caller's orders with their derived display status.
pub async fn list_orders(
    State(state): State<AppState>,
    CurrentUser(user): CurrentUser,
) -> ApiResult<Vec<OrderView>> {
    let orders = state.services.orders.get_user_orders(user.id).await?;
    Ok(Json(ApiResponse::success(orders)))
}

/// Creates an order owned by the caller, whatever user id the body carries.
pub async fn create_order(
    State(state): State<AppState>,
    CurrentUser(user): CurrentUser,
    Json(order): Json<NewOrder>,
) -> Result<(StatusCode, Json<ApiResponse<OrderView>>), ServiceError> {
    let created = state
        .services
        .orders
        .add_order_for_user(user.id, order)
        .await?;
    info!(order_id = created.id, user_id = user.id, "Order placed");
    Ok((StatusCode::CREATED, Json(ApiResponse::success(created))))
}

pub fn order_routes() -> Router<AppState> {
    Router::new()
        .route("/orders", get(list_orders))
        .route("/order", post(create_order))
}
