//! Store-scoped endpoints for managers and admins.

use axum::{
    extract::{Path, State},
    response::Json,
    routing::{get, put},
    Router,
};
use tracing::info;

use crate::auth::CurrentUser;
use crate::entities::order::Model as OrderModel;
use crate::models::{OrderView, UpdateOrderStatus};
use crate::{ApiResponse, ApiResult, AppState};

/// Role check, order lookup, store relationship check, then the update.
pub async fn update_order_status(
    State(state): State<AppState>,
    CurrentUser(user): CurrentUser,
    Path(order_id): Path<i64>,
    Json(body): Json<UpdateOrderStatus>,
) -> ApiResult<OrderModel> {
    let services = &state.services;
    services.store_access.ensure_role(&user)?;

    let order = services.orders.find_order_by_id(order_id).await?;
    services
        .store_access
        .ensure_store_access(&user, order.store_id)
        .await?;

    let updated = services.orders.update_status(order_id, body.status).await?;
    info!(order_id, user_id = user.id, store_id = order.store_id, "Manager updated order status");
    Ok(Json(ApiResponse::success(updated)))
}

pub async fn store_orders(
    State(state): State<AppState>,
    CurrentUser(user): CurrentUser,
    Path(store_id): Path<i64>,
) -> ApiResult<Vec<OrderView>> {
    state
        .services
        .store_access
        .ensure_store_access(&user, store_id)
        .await?;
    let orders = state.services.orders.orders_for_store(store_id).await?;
    Ok(Json(ApiResponse::success(orders)))
}

pub fn manager_routes() -> Router<AppState> {
    Router::new()
        .route("/mgr/orders/:order_id/status", put(update_order_status))
        .route("/mgr/store/:store_id/orders", get(store_orders))
}
