use axum::{
    extract::{Path, State},
    response::Json,
    routing::{get, post, put},
    Router,
};

use crate::auth::CurrentUser;
use crate::models::{PaymentIntent, PaymentIntentRequest, PaymentMethod};
use crate::{ApiResponse, ApiResult, AppState};

/// Charges an order and, when delivery data is supplied, dispatches a courier.
pub async fn pay(
    State(state): State<AppState>,
    CurrentUser(user): CurrentUser,
    Json(request): Json<PaymentIntentRequest>,
) -> ApiResult<PaymentIntent> {
    let intent = state.services.checkout.pay(&user, request).await?;
    Ok(Json(ApiResponse::success(intent)))
}

pub async fn attach_payment_method(
    State(state): State<AppState>,
    CurrentUser(user): CurrentUser,
    Path(payment_method_id): Path<String>,
) -> ApiResult<PaymentMethod> {
    let method = state
        .services
        .users
        .attach_payment_method(user, &payment_method_id)
        .await?;
    Ok(Json(ApiResponse::success(method)))
}

pub async fn list_payment_methods(
    State(state): State<AppState>,
    CurrentUser(user): CurrentUser,
) -> ApiResult<Vec<PaymentMethod>> {
    let methods = state.services.users.list_payment_methods(&user).await?;
    Ok(Json(ApiResponse::success(methods)))
}

pub async fn detach_payment_method(
    State(state): State<AppState>,
    CurrentUser(user): CurrentUser,
    Path(payment_method_id): Path<String>,
) -> ApiResult<PaymentMethod> {
    let method = state
        .services
        .users
        .detach_payment_method(user, &payment_method_id)
        .await?;
    Ok(Json(ApiResponse::success(method)))
}

pub async fn detach_all_payment_methods(
    State(state): State<AppState>,
    CurrentUser(user): CurrentUser,
) -> ApiResult<Vec<PaymentMethod>> {
    let methods = state.services.users.detach_all_payment_methods(user).await?;
    Ok(Json(ApiResponse::success(methods)))
}

pub async fn list_payment_intents(
    State(state): State<AppState>,
    CurrentUser(user): CurrentUser,
) -> ApiResult<Vec<PaymentIntent>> {
    let intents = state.services.users.list_payment_intents(&user).await?;
    Ok(Json(ApiResponse::success(intents)))
}

pub async fn get_payment_intent(
    State(state): State<AppState>,
    CurrentUser(user): CurrentUser,
    Path(payment_intent_id): Path<String>,
) -> ApiResult<PaymentIntent> {
    let intent = state
        .services
        .users
        .get_payment_intent(&user, &payment_intent_id)
        .await?;
    Ok(Json(ApiResponse::success(intent)))
}

/// Payment routes
pub fn payment_routes() -> Router<AppState> {
    Router::new()
        .route("/pay", post(pay))
        .route(
            "/payment-methods",
            get(list_payment_methods).delete(detach_all_payment_methods),
        )
        .route(
            "/payment-methods/:payment_method_id",
            put(attach_payment_method).delete(detach_payment_method),
        )
        .route("/payment-intents", get(list_payment_intents))
        .route("/payment-intents/:payment_intent_id", get(get_payment_intent))
}
