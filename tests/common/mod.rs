#![allow(dead_code)]

use std::sync::Arc;

use axum::{
    body::{to_bytes, Body},
    http::{Method, Request},
    response::Response,
    Router,
};
use jsonwebtoken::{encode, Algorithm, EncodingKey, Header};
use sea_orm::{ActiveModelTrait, DatabaseConnection, Set};
use serde_json::{json, Value};
use storefront_api::{
    auth::IdentityClaims,
    build_router,
    config::AppConfig,
    db,
    entities::{address, product, store, user, user::Role},
    handlers::AppServices,
    models::OrderView,
    repositories::{order_repository::OrderLine, ManagerStoreRepository, OrderRepository},
    AppState,
};
use tempfile::TempDir;
use tower::ServiceExt;
use wiremock::{
    matchers::{method, path},
    Mock, MockServer, ResponseTemplate,
};

pub const JWT_SECRET: &str = "test_secret_key_for_testing_purposes_only_32chars";
pub const COURIER_CUSTOMER: &str = "cust_test";

/// Knobs that differ between test scenarios.
#[derive(Debug, Clone, Copy, Default)]
pub struct TestOptions {
    pub test_mode: bool,
    pub admin_bypass: bool,
}

/// Real router over a throwaway SQLite file, with wiremock standing in for
/// the payment processor and the courier.
pub struct TestApp {
    router: Router,
    pub state: AppState,
    pub db: Arc<DatabaseConnection>,
    pub payments: MockServer,
    pub courier: MockServer,
    _dir: TempDir,
}

impl TestApp {
    pub async fn new() -> Self {
        Self::with_options(TestOptions::default()).await
    }

    pub async fn with_options(options: TestOptions) -> Self {
        let dir = tempfile::tempdir().expect("failed to create temp dir");
        let payments = MockServer::start().await;
        let courier = MockServer::start().await;

        let mut cfg = AppConfig::new(
            format!("sqlite://{}/test.db?mode=rwc", dir.path().display()),
            JWT_SECRET.to_string(),
            "127.0.0.1".to_string(),
            18_080,
            "test".to_string(),
        );
        cfg.db_max_connections = 1;
        cfg.db_min_connections = 1;
        cfg.test_mode = options.test_mode;
        cfg.admin_bypasses_store_check = options.admin_bypass;
        cfg.payment_api_base_url = payments.uri();
        cfg.payment_secret_key = "sk_test_123".to_string();
        cfg.courier_auth_url = format!("{}/oauth/v2/token", courier.uri());
        cfg.courier_api_base_url = format!("{}/v1/customers", courier.uri());
        cfg.courier_customer_id = COURIER_CUSTOMER.to_string();
        cfg.courier_client_id = "client".to_string();
        cfg.courier_client_secret = "secret".to_string();
        cfg.adapter_timeout_secs = 5;
        cfg.adapter_max_attempts = 2;
        cfg.adapter_initial_backoff_ms = 1;

        let pool = db::establish_connection_from_app_config(&cfg)
            .await
            .expect("failed to create test database");
        db::run_migrations(&pool)
            .await
            .expect("failed to run migrations");
        let db = Arc::new(pool);

        let services =
            AppServices::from_config(db.clone(), &cfg).expect("failed to build services");
        let state = AppState::new(db.clone(), cfg, services);
        let router = build_router(state.clone());

        Self {
            router,
            state,
            db,
            payments,
            courier,
            _dir: dir,
        }
    }

    /// Signs an identity token for `email`, valid for an hour.
    pub fn token_for(&self, email: &str) -> String {
        let claims = IdentityClaims {
            email: email.to_string(),
            sub: None,
            exp: (chrono::Utc::now().timestamp() + 3600) as usize,
        };
        encode(
            &Header::new(Algorithm::HS256),
            &claims,
            &EncodingKey::from_secret(JWT_SECRET.as_bytes()),
        )
        .expect("failed to sign token")
    }

    /// Send a request against the router with an optional bearer token.
    pub async fn request(
        &self,
        method: Method,
        uri: &str,
        body: Option<Value>,
        token: Option<&str>,
    ) -> Response {
        let mut builder = Request::builder().method(method).uri(uri);

        if let Some(tok) = token {
            builder = builder.header("authorization", format!("Bearer {}", tok));
        }

        let body = if let Some(json) = body {
            builder = builder.header("content-type", "application/json");
            Body::from(serde_json::to_vec(&json).expect("failed to serialize json request body"))
        } else {
            Body::empty()
        };

        let request = builder.body(body).expect("failed to build request");
        self.router
            .clone()
            .oneshot(request)
            .await
            .expect("router error during test request")
    }

    /// Request authenticated as `user`.
    pub async fn request_as(
        &self,
        user: &user::Model,
        method: Method,
        uri: &str,
        body: Option<Value>,
    ) -> Response {
        let token = self.token_for(&user.email);
        self.request(method, uri, body, Some(&token)).await
    }

    pub async fn seed_user(&self, email: &str, role: Role) -> user::Model {
        user::ActiveModel {
            email: Set(email.to_string()),
            role: Set(role),
            stripe_customer_id: Set(Some(format!("cus_{}", email.replace(['@', '.'], "_")))),
            ..Default::default()
        }
        .insert(self.db.as_ref())
        .await
        .expect("failed to seed user")
    }

    pub async fn seed_store(&self, name: &str) -> store::Model {
        store::ActiveModel {
            name: Set(name.to_string()),
            city: Set(Some("Springfield".to_string())),
            ..Default::default()
        }
        .insert(self.db.as_ref())
        .await
        .expect("failed to seed store")
    }

    pub async fn seed_product(&self, name: &str, price: i64) -> product::Model {
        product::ActiveModel {
            name: Set(name.to_string()),
            price: Set(price),
            ..Default::default()
        }
        .insert(self.db.as_ref())
        .await
        .expect("failed to seed product")
    }

    pub async fn seed_address(&self, user_id: i64) -> address::Model {
        address::ActiveModel {
            user_id: Set(user_id),
            line1: Set("1 Main St".to_string()),
            line2: Set(String::new()),
            city: Set("Springfield".to_string()),
            state: Set("IL".to_string()),
            country: Set("US".to_string()),
            postal_code: Set("62701".to_string()),
            ..Default::default()
        }
        .insert(self.db.as_ref())
        .await
        .expect("failed to seed address")
    }

    pub async fn assign_manager(&self, user_id: i64, store_id: i64) {
        ManagerStoreRepository::new(self.db.clone())
            .assign(user_id, store_id)
            .await
            .expect("failed to assign manager");
    }

    /// Persists an order with a single line, bypassing the HTTP layer.
    pub async fn seed_order(&self, user_id: i64, store_id: i64, product_id: i64) -> OrderView {
        OrderRepository::new(self.db.clone())
            .create_with_items(
                user_id,
                store_id,
                &[OrderLine {
                    product_id,
                    quantity: 1,
                }],
            )
            .await
            .expect("failed to seed order")
    }

    pub fn orders(&self) -> OrderRepository {
        OrderRepository::new(self.db.clone())
    }

    /// Courier token endpoint answering with a one-hour bearer token.
    pub async fn mount_courier_token(&self, expected_calls: u64) {
        Mock::given(method("POST"))
            .and(path("/oauth/v2/token"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "access_token": "courier-token",
                "token_type": "Bearer",
                "expires_in": 2_592_000,
                "scope": "eats.deliveries",
            })))
            .expect(expected_calls)
            .mount(&self.courier)
            .await;
    }

    pub fn courier_path(&self, suffix: &str) -> String {
        format!("/v1/customers/{}/{}", COURIER_CUSTOMER, suffix)
    }
}

pub async fn response_json(response: Response) -> Value {
    let bytes = to_bytes(response.into_body(), usize::MAX)
        .await
        .expect("failed to read response body");
    serde_json::from_slice(&bytes).expect("response body is not json")
}

pub fn payment_intent_json(id: &str, customer: &str, refunded: bool) -> Value {
    json!({
        "id": id,
        "object": "payment_intent",
        "amount": 2500,
        "currency": "usd",
        "status": "succeeded",
        "customer": customer,
        "latest_charge": {
            "id": format!("ch_{}", id),
            "object": "charge",
            "refunded": refunded,
            "amount_refunded": if refunded { 2500 } else { 0 },
        },
    })
}

pub fn delivery_json(id: &str, status: &str) -> Value {
    json!({
        "id": id,
        "status": status,
        "tracking_url": format!("https://courier.example/track/{}", id),
        "fee": 599,
        "currency": "usd",
        "complete": status == "delivered",
        "live_mode": false,
        "courier_imminent": false,
    })
}

pub fn delivery_data_json() -> Value {
    json!({
        "dropoff_address": "{\"street_address\":[\"20 W 34th St\"],\"city\":\"New York\",\"state\":\"NY\",\"zip_code\":\"10001\"}",
        "dropoff_name": "Pat Buyer",
        "dropoff_phone_number": "+15555550100",
        "manifest_items": [{"name": "Bagel", "quantity": 2, "size": "small"}],
        "pickup_address": "{\"street_address\":[\"1 Main St\"],\"city\":\"New York\",\"state\":\"NY\",\"zip_code\":\"10001\"}",
        "pickup_name": "Corner Store",
        "pickup_phone_number": "+15555550111",
    })
}
