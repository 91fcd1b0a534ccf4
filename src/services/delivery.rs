use async_trait::async_trait;
use chrono::{DateTime, Duration as ChronoDuration, Utc};
use metrics::counter;
use reqwest::{Client, Method, Response};
use serde::de::DeserializeOwned;
use serde::Serialize;
use tokio::sync::Mutex;
use tracing::{info, instrument, warn};
use uuid::Uuid;

use crate::config::AppConfig;
use crate::errors::{AdapterError, ServiceError};
use crate::middleware_helpers::retry::{with_retry, AdapterRetryPolicy, RetryConfig};
use crate::models::delivery::{
    CourierErrorBody, DeliveryData, DeliveryResponse, QuoteRequest, QuoteResponse, TokenResponse,
};

const SERVICE: &str = "courier";
/// Tokens are treated as expired this long before the courier says they are.
const TOKEN_SAFETY_MARGIN_SECS: i64 = 300;

/// Operations this service needs from the courier.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait DeliveryDispatch: Send + Sync {
    async fn quote(&self, request: QuoteRequest) -> Result<QuoteResponse, AdapterError>;

    async fn create_delivery(&self, data: DeliveryData) -> Result<DeliveryResponse, AdapterError>;

    async fn get_delivery(&self, delivery_id: &str) -> Result<DeliveryResponse, AdapterError>;
}

/// Prepares a create-delivery payload: robo-courier simulation in test mode and an
/// idempotency key so the create can be retried safely.
pub fn prepare_dispatch(mut data: DeliveryData, test_mode: bool) -> DeliveryData {
    if test_mode {
        data.apply_test_mode();
    }
    if data.idempotency_key.as_deref().map_or(true, str::is_empty) {
        data.idempotency_key = Some(Uuid::new_v4().to_string());
    }
    data
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TokenState {
    Unset,
    Valid,
    Expired,
}

#[derive(Debug, Clone)]
struct CachedToken {
    /// `"<token_type> <access_token>"`, ready for the Authorization header
    authorization: String,
    expires_at: DateTime<Utc>,
}

impl CachedToken {
    fn is_valid_at(&self, now: DateTime<Utc>) -> bool {
        now < self.expires_at
    }
}

#[derive(Debug, Clone)]
pub struct CourierSettings {
    pub auth_url: String,
    pub api_base_url: String,
    pub customer_id: String,
    pub client_id: String,
    pub client_secret: String,
    pub scope: String,
}

impl From<&AppConfig> for CourierSettings {
    fn from(config: &AppConfig) -> Self {
        Self {
            auth_url: config.courier_auth_url.clone(),
            api_base_url: config.courier_api_base_url.clone(),
            customer_id: config.courier_customer_id.clone(),
            client_id: config.courier_client_id.clone(),
            client_secret: config.courier_client_secret.clone(),
            scope: config.courier_scope.clone(),
        }
    }
}

/// Courier API client holding the OAuth client-credentials token.
///
/// The token lock is held across a refresh, so concurrent callers wait for a
/// single exchange instead of each requesting their own token.
pub struct CourierClient {
    http: Client,
    settings: CourierSettings,
    retry: RetryConfig,
    token: Mutex<Option<CachedToken>>,
}

impl CourierClient {
    pub fn new(config: &AppConfig) -> Result<Self, ServiceError> {
        let http = Client::builder()
            .timeout(config.adapter_timeout())
            .build()
            .map_err(|e| {
                ServiceError::InternalError(format!("failed to build courier HTTP client: {}", e))
            })?;
        Ok(Self::with_client(
            http,
            CourierSettings::from(config),
            config.adapter_retry(),
        ))
    }

    /// Build a client from an existing reqwest client (useful for testing).
    pub fn with_client(http: Client, settings: CourierSettings, retry: RetryConfig) -> Self {
        Self {
            http,
            settings,
            retry,
            token: Mutex::new(None),
        }
    }

    pub async fn token_state(&self) -> TokenState {
        match self.token.lock().await.as_ref() {
            None => TokenState::Unset,
            Some(token) if token.is_valid_at(Utc::now()) => TokenState::Valid,
            Some(_) => TokenState::Expired,
        }
    }

    fn endpoint(&self, path: &str) -> String {
        format!(
            "{}/{}/{}",
            self.settings.api_base_url.trim_end_matches('/'),
            self.settings.customer_id,
            path
        )
    }

    /// Returns a valid Authorization header value, exchanging credentials when needed.
    async fn authorization(&self) -> Result<String, AdapterError> {
        let mut cached = self.token.lock().await;
        if let Some(token) = cached.as_ref() {
            if token.is_valid_at(Utc::now()) {
                return Ok(token.authorization.clone());
            }
        }

        let fresh = self.exchange_credentials().await;
        let outcome = if fresh.is_ok() { "success" } else { "failure" };
        counter!("storefront.courier.token_refreshes", 1, "outcome" => outcome);

        let fresh = fresh?;
        let authorization = fresh.authorization.clone();
        *cached = Some(fresh);
        Ok(authorization)
    }

    /// Drops the cached token if it is still the one that was rejected.
    async fn invalidate(&self, rejected: &str) {
        let mut cached = self.token.lock().await;
        if cached.as_ref().is_some_and(|token| token.authorization == rejected) {
            *cached = None;
        }
    }

    async fn exchange_credentials(&self) -> Result<CachedToken, AdapterError> {
        let form = [
            ("grant_type", "client_credentials"),
            ("client_id", self.settings.client_id.as_str()),
            ("client_secret", self.settings.client_secret.as_str()),
            ("scope", self.settings.scope.as_str()),
        ];

        let token: TokenResponse = with_retry(&self.retry, AdapterRetryPolicy, || {
            let request = self.http.post(&self.settings.auth_url).form(&form);
            async move {
                let response = request
                    .send()
                    .await
                    .map_err(|e| AdapterError::from_transport(SERVICE, e))?;
                decode(response).await
            }
        })
        .await?;

        let expires_at = token_expiry(Utc::now(), token.expires_in)?;
        info!(expires_at = %expires_at, "Obtained courier access token");

        Ok(CachedToken {
            authorization: format!("{} {}", token.token_type, token.access_token),
            expires_at,
        })
    }

    /// Authorized call; a 401 invalidates the token and the call is repeated once with a fresh one.
    async fn call<T, B>(
        &self,
        operation: &'static str,
        method: Method,
        url: String,
        body: Option<&B>,
        retryable: bool,
    ) -> Result<T, AdapterError>
    where
        T: DeserializeOwned,
        B: Serialize + ?Sized + Sync,
    {
        let authorization = self.authorization().await?;
        let result = match self.send(&method, &url, body, &authorization, retryable).await {
            Err(AdapterError::Unauthorized { message, .. }) => {
                warn!(operation, %message, "Courier rejected the access token, refreshing");
                self.invalidate(&authorization).await;
                let authorization = self.authorization().await?;
                self.send(&method, &url, body, &authorization, retryable).await
            }
            other => other,
        };

        let outcome = if result.is_ok() { "success" } else { "failure" };
        counter!("storefront.courier.requests", 1, "operation" => operation, "outcome" => outcome);
        if let Err(e) = &result {
            warn!(operation, error = %e, "Courier call failed");
        }
        result
    }

    async fn send<T, B>(
        &self,
        method: &Method,
        url: &str,
        body: Option<&B>,
        authorization: &str,
        retryable: bool,
    ) -> Result<T, AdapterError>
    where
        T: DeserializeOwned,
        B: Serialize + ?Sized + Sync,
    {
        let retry = if retryable {
            self.retry.clone()
        } else {
            RetryConfig::none()
        };

        with_retry(&retry, AdapterRetryPolicy, || {
            let mut request = self
                .http
                .request(method.clone(), url)
                .header(reqwest::header::AUTHORIZATION, authorization);
            if let Some(body) = body {
                request = request.json(body);
            }
            async move {
                let response = request
                    .send()
                    .await
                    .map_err(|e| AdapterError::from_transport(SERVICE, e))?;
                decode(response).await
            }
        })
        .await
    }
}

/// When a token issued at `now` must be replaced, `TOKEN_SAFETY_MARGIN_SECS` ahead of its expiry.
fn token_expiry(now: DateTime<Utc>, expires_in: i64) -> Result<DateTime<Utc>, AdapterError> {
    ChronoDuration::try_seconds(expires_in.saturating_sub(TOKEN_SAFETY_MARGIN_SECS))
        .and_then(|lifetime| now.checked_add_signed(lifetime))
        .ok_or_else(|| AdapterError::Decode {
            service: SERVICE,
            message: format!("token expires_in out of range: {}", expires_in),
        })
}

async fn decode<T: DeserializeOwned>(response: Response) -> Result<T, AdapterError> {
    let status = response.status();
    if status.is_success() {
        return response
            .json::<T>()
            .await
            .map_err(|e| AdapterError::from_transport(SERVICE, e));
    }

    let body = response.text().await.unwrap_or_default();
    let message = serde_json::from_str::<CourierErrorBody>(&body)
        .map(|b| b.describe())
        .unwrap_or_else(|_| {
            if body.is_empty() {
                status.to_string()
            } else {
                body
            }
        });
    Err(AdapterError::from_status(SERVICE, status.as_u16(), message))
}

#[async_trait]
impl DeliveryDispatch for CourierClient {
    #[instrument(skip(self, request))]
    async fn quote(&self, request: QuoteRequest) -> Result<QuoteResponse, AdapterError> {
        let url = self.endpoint("delivery_quotes");
        self.call("quote", Method::POST, url, Some(&request), true).await
    }

    #[instrument(skip(self, data), fields(idempotency_key = ?data.idempotency_key))]
    async fn create_delivery(&self, data: DeliveryData) -> Result<DeliveryResponse, AdapterError> {
        let url = self.endpoint("deliveries");
        let retryable = data.idempotency_key.is_some();
        let delivery: DeliveryResponse = self
            .call("create_delivery", Method::POST, url, Some(&data), retryable)
            .await?;
        info!(delivery_id = %delivery.id, status = ?delivery.status, "Courier delivery created");
        Ok(delivery)
    }

    #[instrument(skip(self))]
    async fn get_delivery(&self, delivery_id: &str) -> Result<DeliveryResponse, AdapterError> {
        let delivery_id = AdapterError::path_segment(SERVICE, delivery_id)?;
        let url = self.endpoint(&format!("deliveries/{}", delivery_id));
        self.call::<_, ()>("get_delivery", Method::GET, url, None, true).await
    }
}
