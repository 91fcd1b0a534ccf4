mod common;

use std::sync::Arc;
use std::time::Duration;

use assert_matches::assert_matches;
use common::{delivery_data_json, delivery_json};
use reqwest::Client;
use serde_json::json;
use storefront_api::{
    errors::AdapterError,
    middleware_helpers::RetryConfig,
    models::{DeliveryData, DeliveryStatus, QuoteRequest},
    services::delivery::{CourierClient, CourierSettings, DeliveryDispatch, TokenState},
};
use tokio::task::JoinSet;
use wiremock::{
    matchers::{body_string_contains, header, method, path},
    Mock, MockServer, ResponseTemplate,
};

fn client(server: &MockServer) -> CourierClient {
    let settings = CourierSettings {
        auth_url: format!("{}/oauth/v2/token", server.uri()),
        api_base_url: format!("{}/v1/customers", server.uri()),
        customer_id: "cust_test".to_string(),
        client_id: "client".to_string(),
        client_secret: "secret".to_string(),
        scope: "eats.deliveries".to_string(),
    };
    let retry = RetryConfig {
        max_attempts: 3,
        initial_delay: Duration::from_millis(1),
        max_delay: Duration::from_millis(5),
        backoff_factor: 2.0,
    };
    CourierClient::with_client(Client::new(), settings, retry)
}

fn token_response(access_token: &str) -> ResponseTemplate {
    token_response_expiring_in(access_token, 2_592_000)
}

fn token_response_expiring_in(access_token: &str, expires_in: i64) -> ResponseTemplate {
    ResponseTemplate::new(200).set_body_json(json!({
        "access_token": access_token,
        "token_type": "Bearer",
        "expires_in": expires_in,
        "scope": "eats.deliveries",
    }))
}

#[tokio::test]
async fn token_is_exchanged_once_and_reused() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/oauth/v2/token"))
        .and(body_string_contains("grant_type=client_credentials"))
        .and(body_string_contains("scope=eats.deliveries"))
        .respond_with(token_response("tok_1"))
        .expect(1)
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/v1/customers/cust_test/deliveries/del_1"))
        .and(header("authorization", "Bearer tok_1"))
        .respond_with(ResponseTemplate::new(200).set_body_json(delivery_json("del_1", "pickup")))
        .expect(2)
        .mount(&server)
        .await;

    let courier = client(&server);
    assert_eq!(courier.token_state().await, TokenState::Unset);

    let first = courier.get_delivery("del_1").await.unwrap();
    let second = courier.get_delivery("del_1").await.unwrap();
    assert_eq!(first.status, DeliveryStatus::Pickup);
    assert_eq!(second.id, "del_1");
    assert_eq!(courier.token_state().await, TokenState::Valid);
}

#[tokio::test]
async fn token_inside_the_safety_margin_is_exchanged_again() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/oauth/v2/token"))
        .respond_with(token_response_expiring_in("tok_short", 300))
        .expect(2)
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/v1/customers/cust_test/deliveries/del_1"))
        .and(header("authorization", "Bearer tok_short"))
        .respond_with(ResponseTemplate::new(200).set_body_json(delivery_json("del_1", "pickup")))
        .expect(2)
        .mount(&server)
        .await;

    let courier = client(&server);
    courier.get_delivery("del_1").await.unwrap();
    assert_eq!(courier.token_state().await, TokenState::Expired);

    courier.get_delivery("del_1").await.unwrap();
    assert_eq!(courier.token_state().await, TokenState::Expired);
}

#[tokio::test]
async fn concurrent_calls_on_a_cold_client_share_one_exchange() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/oauth/v2/token"))
        .respond_with(token_response("tok_shared").set_delay(Duration::from_millis(100)))
        .expect(1)
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/v1/customers/cust_test/deliveries/del_1"))
        .and(header("authorization", "Bearer tok_shared"))
        .respond_with(ResponseTemplate::new(200).set_body_json(delivery_json("del_1", "pickup")))
        .expect(8)
        .mount(&server)
        .await;

    let courier = Arc::new(client(&server));
    let mut calls = JoinSet::new();
    for _ in 0..8 {
        let courier = courier.clone();
        calls.spawn(async move { courier.get_delivery("del_1").await });
    }
    while let Some(joined) = calls.join_next().await {
        assert_eq!(joined.unwrap().unwrap().status, DeliveryStatus::Pickup);
    }
    assert_eq!(courier.token_state().await, TokenState::Valid);
}

#[tokio::test]
async fn rejected_token_is_refreshed_and_the_call_repeated_once() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/oauth/v2/token"))
        .respond_with(token_response("tok_any"))
        .expect(2)
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/v1/customers/cust_test/deliveries/del_1"))
        .respond_with(ResponseTemplate::new(401).set_body_json(json!({
            "code": "unauthorized",
            "message": "The specified token is expired.",
        })))
        .up_to_n_times(1)
        .with_priority(1)
        .expect(1)
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/v1/customers/cust_test/deliveries/del_1"))
        .respond_with(ResponseTemplate::new(200).set_body_json(delivery_json("del_1", "delivered")))
        .expect(1)
        .mount(&server)
        .await;

    let delivery = client(&server).get_delivery("del_1").await.unwrap();
    assert_eq!(delivery.status, DeliveryStatus::Delivered);
    assert!(delivery.complete);
}

#[tokio::test]
async fn persistent_401_is_reported_after_a_single_refresh() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/oauth/v2/token"))
        .respond_with(token_response("tok_any"))
        .expect(2)
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/v1/customers/cust_test/deliveries/del_1"))
        .respond_with(ResponseTemplate::new(401))
        .expect(2)
        .mount(&server)
        .await;

    assert_matches!(
        client(&server).get_delivery("del_1").await,
        Err(AdapterError::Unauthorized { .. })
    );
}

#[tokio::test]
async fn transient_failures_are_retried_for_reads() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/oauth/v2/token"))
        .respond_with(token_response("tok_1"))
        .expect(1)
        .mount(&server)
        .await;
    Mock::given(method("POST"))
        .and(path("/v1/customers/cust_test/delivery_quotes"))
        .respond_with(ResponseTemplate::new(503))
        .up_to_n_times(2)
        .with_priority(1)
        .expect(2)
        .mount(&server)
        .await;
    Mock::given(method("POST"))
        .and(path("/v1/customers/cust_test/delivery_quotes"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "kind": "delivery_quote",
            "id": "dqt_1",
            "fee": 599,
            "currency_type": "USD",
            "duration": 30,
            "pickup_duration": 10,
        })))
        .expect(1)
        .mount(&server)
        .await;

    let quote = client(&server)
        .quote(QuoteRequest {
            dropoff_address: "20 W 34th St, New York, NY".to_string(),
            pickup_address: "1 Main St, New York, NY".to_string(),
            dropoff_latitude: None,
            dropoff_longitude: None,
            dropoff_phone_number: None,
            pickup_latitude: None,
            pickup_longitude: None,
            pickup_phone_number: None,
            pickup_ready_dt: None,
            pickup_deadline_dt: None,
            dropoff_ready_dt: None,
            dropoff_deadline_dt: None,
            manifest_total_value: None,
            external_store_id: None,
        })
        .await
        .unwrap();
    assert_eq!(quote.id, "dqt_1");
    assert_eq!(quote.fee, 599);
}

#[tokio::test]
async fn deliveries_without_idempotency_key_are_not_retried() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/oauth/v2/token"))
        .respond_with(token_response("tok_1"))
        .mount(&server)
        .await;
    Mock::given(method("POST"))
        .and(path("/v1/customers/cust_test/deliveries"))
        .respond_with(ResponseTemplate::new(503))
        .expect(1)
        .mount(&server)
        .await;

    let data: DeliveryData = serde_json::from_value(delivery_data_json()).unwrap();
    assert!(data.idempotency_key.is_none());
    assert_matches!(
        client(&server).create_delivery(data).await,
        Err(AdapterError::Transient { .. })
    );
}

#[tokio::test]
async fn unknown_delivery_fields_are_preserved() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/oauth/v2/token"))
        .respond_with(token_response("tok_1"))
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/v1/customers/cust_test/deliveries/del_1"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "id": "del_1",
            "status": "en_route_to_moon",
            "courier": {"name": "Robo", "vehicle_type": "car"},
        })))
        .mount(&server)
        .await;

    let delivery = client(&server).get_delivery("del_1").await.unwrap();
    assert_eq!(delivery.status, DeliveryStatus::Unknown);
    let relayed = serde_json::to_value(&delivery).unwrap();
    assert_eq!(relayed["courier"]["name"], "Robo");
}
