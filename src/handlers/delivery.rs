//! Courier pass-through endpoints.

use axum::{
    extract::{Path, State},
    response::Json,
    routing::{get, post},
    Router,
};

use crate::models::{DeliveryData, DeliveryResponse, QuoteRequest, QuoteResponse};
use crate::services::delivery::prepare_dispatch;
use crate::{ApiResponse, ApiResult, AppState};

pub async fn quote(
    State(state): State<AppState>,
    Json(request): Json<QuoteRequest>,
) -> ApiResult<QuoteResponse> {
    let quote = state.services.delivery.quote(request).await?;
    Ok(Json(ApiResponse::success(quote)))
}

pub async fn create_delivery(
    State(state): State<AppState>,
    Json(data): Json<DeliveryData>,
) -> ApiResult<DeliveryResponse> {
    let data = prepare_dispatch(data, state.config.test_mode);
    let delivery = state.services.delivery.create_delivery(data).await?;
    Ok(Json(ApiResponse::success(delivery)))
}

pub async fn get_delivery(
    State(state): State<AppState>,
    Path(delivery_id): Path<String>,
) -> ApiResult<DeliveryResponse> {
    let delivery = state.services.delivery.get_delivery(&delivery_id).await?;
    Ok(Json(ApiResponse::success(delivery)))
}

pub fn delivery_routes() -> Router<AppState> {
    Router::new()
        .route("/uber/quote", post(quote))
        .route("/uber/delivery", post(create_delivery))
        .route("/uber/delivery/:delivery_id", get(get_delivery))
}
