mod common;

use axum::http::{Method, StatusCode};
use common::{
    delivery_data_json, delivery_json, payment_intent_json, response_json, TestApp, TestOptions,
};
use serde_json::json;
use storefront_api::entities::user::Role;
use wiremock::{
    matchers::{body_partial_json, body_string_contains, header_exists, method, path},
    Mock, ResponseTemplate,
};

fn pay_body(order_id: i64) -> serde_json::Value {
    json!({
        "amount": 2500,
        "currency": "usd",
        "payment_method_id": "pm_card_visa",
        "order_id": order_id,
    })
}

#[tokio::test]
async fn store_pickup_payment_records_the_intent_only() {
    let app = TestApp::new().await;
    let buyer = app.seed_user("buyer@example.com", Role::User).await;
    let store = app.seed_store("Downtown").await;
    let bagel = app.seed_product("Bagel", 250).await;
    let order = app.seed_order(buyer.id, store.id, bagel.id).await;

    Mock::given(method("POST"))
        .and(path("/payment_intents"))
        .and(header_exists("Idempotency-Key"))
        .and(body_string_contains("confirmation_method=manual"))
        .and(body_string_contains("confirm=true"))
        .and(body_string_contains("customer=cus_buyer_example_com"))
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_json(payment_intent_json("pi_pickup", "cus_buyer_example_com", false)),
        )
        .expect(1)
        .mount(&app.payments)
        .await;

    let response = app
        .request_as(&buyer, Method::POST, "/api/pay", Some(pay_body(order.id)))
        .await;
    assert_eq!(response.status(), StatusCode::OK);
    let body = response_json(response).await;
    assert_eq!(body["data"]["id"], "pi_pickup");
    assert_eq!(body["data"]["object"], "payment_intent");

    let stored = app.orders().find_by_id(order.id).await.unwrap().unwrap();
    assert_eq!(stored.payment_intent_id.as_deref(), Some("pi_pickup"));
    assert!(stored.delivery_id.is_none());
}

#[tokio::test]
async fn courier_payment_dispatches_a_robo_courier_in_test_mode() {
    let app = TestApp::with_options(TestOptions {
        test_mode: true,
        ..Default::default()
    })
    .await;
    let buyer = app.seed_user("buyer@example.com", Role::User).await;
    let address = app.seed_address(buyer.id).await;
    let store = app.seed_store("Downtown").await;
    let bagel = app.seed_product("Bagel", 250).await;
    let order = app.seed_order(buyer.id, store.id, bagel.id).await;

    Mock::given(method("POST"))
        .and(path("/payment_intents"))
        .and(body_string_contains("62701"))
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_json(payment_intent_json("pi_courier", "cus_buyer_example_com", false)),
        )
        .expect(1)
        .mount(&app.payments)
        .await;
    app.mount_courier_token(1).await;
    Mock::given(method("POST"))
        .and(path(app.courier_path("deliveries")))
        .and(body_partial_json(json!({
            "test_specifications": {"robo_courier_specification": {"mode": "auto"}}
        })))
        .respond_with(ResponseTemplate::new(200).set_body_json(delivery_json("del_1", "pending")))
        .expect(1)
        .mount(&app.courier)
        .await;

    let mut body = pay_body(order.id);
    body["shipping_address_id"] = json!(address.id);
    body["delivery_data"] = delivery_data_json();

    let response = app
        .request_as(&buyer, Method::POST, "/api/pay", Some(body))
        .await;
    assert_eq!(response.status(), StatusCode::OK);

    let stored = app.orders().find_by_id(order.id).await.unwrap().unwrap();
    assert_eq!(stored.payment_intent_id.as_deref(), Some("pi_courier"));
    assert_eq!(stored.delivery_id.as_deref(), Some("del_1"));
}

#[tokio::test]
async fn courier_failure_after_charge_reports_the_payment_intent() {
    let app = TestApp::new().await;
    let buyer = app.seed_user("buyer@example.com", Role::User).await;
    let store = app.seed_store("Downtown").await;
    let bagel = app.seed_product("Bagel", 250).await;
    let order = app.seed_order(buyer.id, store.id, bagel.id).await;

    Mock::given(method("POST"))
        .and(path("/payment_intents"))
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_json(payment_intent_json("pi_charged", "cus_buyer_example_com", false)),
        )
        .expect(1)
        .mount(&app.payments)
        .await;
    app.mount_courier_token(1).await;
    Mock::given(method("POST"))
        .and(path(app.courier_path("deliveries")))
        .respond_with(ResponseTemplate::new(400).set_body_json(json!({
            "code": "invalid_params",
            "message": "The parameters of your request were invalid.",
        })))
        .expect(1)
        .mount(&app.courier)
        .await;

    let mut body = pay_body(order.id);
    body["delivery_data"] = delivery_data_json();
    let response = app
        .request_as(&buyer, Method::POST, "/api/pay", Some(body))
        .await;

    assert_eq!(response.status(), StatusCode::BAD_GATEWAY);
    let error = response_json(response).await;
    assert_eq!(error["details"], "payment_intent_id=pi_charged");
    assert!(error["request_id"].is_string());

    let stored = app.orders().find_by_id(order.id).await.unwrap().unwrap();
    assert_eq!(stored.payment_intent_id.as_deref(), Some("pi_charged"));
    assert!(stored.delivery_id.is_none());
}

#[tokio::test]
async fn declined_cards_surface_as_payment_required_and_leave_the_order_unpaid() {
    let app = TestApp::new().await;
    let buyer = app.seed_user("buyer@example.com", Role::User).await;
    let store = app.seed_store("Downtown").await;
    let bagel = app.seed_product("Bagel", 250).await;
    let order = app.seed_order(buyer.id, store.id, bagel.id).await;

    Mock::given(method("POST"))
        .and(path("/payment_intents"))
        .respond_with(ResponseTemplate::new(402).set_body_json(json!({
            "error": {
                "type": "card_error",
                "code": "card_declined",
                "message": "Your card was declined.",
            }
        })))
        .expect(1)
        .mount(&app.payments)
        .await;

    let response = app
        .request_as(&buyer, Method::POST, "/api/pay", Some(pay_body(order.id)))
        .await;
    assert_eq!(response.status(), StatusCode::PAYMENT_REQUIRED);
    let error = response_json(response).await;
    assert!(error["message"]
        .as_str()
        .unwrap()
        .contains("Your card was declined."));

    let stored = app.orders().find_by_id(order.id).await.unwrap().unwrap();
    assert!(stored.payment_intent_id.is_none());
}

#[tokio::test]
async fn paying_for_someone_elses_order_is_not_found_and_never_charges() {
    let app = TestApp::new().await;
    let owner = app.seed_user("owner@example.com", Role::User).await;
    let intruder = app.seed_user("intruder@example.com", Role::User).await;
    let store = app.seed_store("Downtown").await;
    let bagel = app.seed_product("Bagel", 250).await;
    let order = app.seed_order(owner.id, store.id, bagel.id).await;

    Mock::given(method("POST"))
        .and(path("/payment_intents"))
        .respond_with(ResponseTemplate::new(200))
        .expect(0)
        .mount(&app.payments)
        .await;

    let response = app
        .request_as(&intruder, Method::POST, "/api/pay", Some(pay_body(order.id)))
        .await;
    assert_eq!(response.status(), StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn non_positive_order_ids_are_rejected() {
    let app = TestApp::new().await;
    let buyer = app.seed_user("buyer@example.com", Role::User).await;

    let response = app
        .request_as(&buyer, Method::POST, "/api/pay", Some(pay_body(0)))
        .await;
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn pay_requires_a_registered_user() {
    let app = TestApp::new().await;

    let anonymous = app.request(Method::POST, "/api/pay", Some(pay_body(1)), None).await;
    assert_eq!(anonymous.status(), StatusCode::UNAUTHORIZED);

    let token = app.token_for("stranger@example.com");
    let unregistered = app
        .request(Method::POST, "/api/pay", Some(pay_body(1)), Some(&token))
        .await;
    assert_eq!(unregistered.status(), StatusCode::UNAUTHORIZED);

    let forged = app
        .request(Method::POST, "/api/pay", Some(pay_body(1)), Some("not.a.jwt"))
        .await;
    assert_eq!(forged.status(), StatusCode::UNAUTHORIZED);
}
