use async_trait::async_trait;
use metrics::counter;
use reqwest::{Client, RequestBuilder, Response};
use serde::de::DeserializeOwned;
use tracing::{debug, instrument, warn};
use uuid::Uuid;

use crate::config::AppConfig;
use crate::errors::{AdapterError, ServiceError};
use crate::middleware_helpers::retry::{with_retry, AdapterRetryPolicy, RetryConfig};
use crate::models::payment::{
    Customer, NewPaymentIntent, PaymentIntent, PaymentMethod, StripeErrorBody, StripeList,
};

const SERVICE: &str = "payments";
const PAGE_SIZE: &str = "100";

/// Operations this service needs from the payment processor.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait PaymentGateway: Send + Sync {
    /// Creates a processor customer and returns its id.
    async fn create_customer(&self, email: &str) -> Result<String, AdapterError>;

    async fn create_payment_intent(
        &self,
        params: NewPaymentIntent,
    ) -> Result<PaymentIntent, AdapterError>;

    /// Retrieves an intent with `latest_charge` expanded.
    async fn retrieve_payment_intent(&self, id: &str) -> Result<PaymentIntent, AdapterError>;

    /// Every intent of a customer with `latest_charge` expanded.
    async fn list_payment_intents(&self, customer: &str)
        -> Result<Vec<PaymentIntent>, AdapterError>;

    async fn attach_payment_method(
        &self,
        payment_method_id: &str,
        customer: &str,
    ) -> Result<PaymentMethod, AdapterError>;

    async fn detach_payment_method(
        &self,
        payment_method_id: &str,
    ) -> Result<PaymentMethod, AdapterError>;

    async fn retrieve_payment_method(
        &self,
        payment_method_id: &str,
    ) -> Result<PaymentMethod, AdapterError>;

    /// Every card payment method of a customer, following pagination.
    async fn list_payment_methods(&self, customer: &str)
        -> Result<Vec<PaymentMethod>, AdapterError>;
}

/// REST client for the Stripe API.
#[derive(Clone)]
pub struct StripeGateway {
    http: Client,
    base_url: String,
    secret_key: String,
    retry: RetryConfig,
}

impl StripeGateway {
    pub fn new(config: &AppConfig) -> Result<Self, ServiceError> {
        let http = Client::builder()
            .timeout(config.adapter_timeout())
            .build()
            .map_err(|e| {
                ServiceError::InternalError(format!("failed to build payment HTTP client: {}", e))
            })?;

        Ok(Self::with_client(
            http,
            config.payment_api_base_url.clone(),
            config.payment_secret_key.clone(),
            config.adapter_retry(),
        ))
    }

    /// Build a gateway from an existing client (useful for testing).
    pub fn with_client(
        http: Client,
        base_url: impl Into<String>,
        secret_key: impl Into<String>,
        retry: RetryConfig,
    ) -> Self {
        Self {
            http,
            base_url: base_url.into().trim_end_matches('/').to_string(),
            secret_key: secret_key.into(),
            retry,
        }
    }

    fn url(&self, path: &str) -> String {
        format!("{}/{}", self.base_url, path)
    }

    fn get(&self, path: &str) -> RequestBuilder {
        self.http.get(self.url(path)).bearer_auth(&self.secret_key)
    }

    fn post(&self, path: &str) -> RequestBuilder {
        self.http.post(self.url(path)).bearer_auth(&self.secret_key)
    }

    /// Sends the request built by `build`, retrying transient failures when `retryable`.
    async fn execute<T, F>(
        &self,
        operation: &'static str,
        retryable: bool,
        build: F,
    ) -> Result<T, AdapterError>
    where
        T: DeserializeOwned,
        F: Fn() -> RequestBuilder,
    {
        let retry = if retryable {
            self.retry.clone()
        } else {
            RetryConfig::none()
        };

        let result = with_retry(&retry, AdapterRetryPolicy, || {
            let request = build();
            async move {
                let response = request
                    .send()
                    .await
                    .map_err(|e| AdapterError::from_transport(SERVICE, e))?;
                decode(response).await
            }
        })
        .await;

        let outcome = if result.is_ok() { "success" } else { "failure" };
        counter!("storefront.payment.requests", 1, "operation" => operation, "outcome" => outcome);
        if let Err(e) = &result {
            warn!(operation, error = %e, "Payment processor call failed");
        }
        result
    }

    async fn list_all<T, F>(
        &self,
        operation: &'static str,
        path: &str,
        query: &[(&str, &str)],
        id_of: F,
    ) -> Result<Vec<T>, AdapterError>
    where
        T: DeserializeOwned,
        F: Fn(&T) -> String,
    {
        let mut collected = Vec::new();
        let mut starting_after: Option<String> = None;

        loop {
            let page: StripeList<T> = self
                .execute(operation, true, || {
                    let mut request = self.get(path).query(query).query(&[("limit", PAGE_SIZE)]);
                    if let Some(cursor) = &starting_after {
                        request = request.query(&[("starting_after", cursor.as_str())]);
                    }
                    request
                })
                .await?;

            let has_more = page.has_more;
            starting_after = page.data.last().map(&id_of);
            collected.extend(page.data);

            if !has_more || starting_after.is_none() {
                break;
            }
        }

        debug!(operation, count = collected.len(), "Listed processor resources");
        Ok(collected)
    }
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
    let message = serde_json::from_str::<StripeErrorBody>(&body)
        .map(|b| b.error.describe())
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
impl PaymentGateway for StripeGateway {
    #[instrument(skip(self))]
    async fn create_customer(&self, email: &str) -> Result<String, AdapterError> {
        let idempotency_key = Uuid::new_v4().to_string();
        let customer: Customer = self
            .execute("create_customer", true, || {
                self.post("customers")
                    .header("Idempotency-Key", idempotency_key.as_str())
                    .form(&[("email", email)])
            })
            .await?;
        Ok(customer.id)
    }

    #[instrument(skip(self, params), fields(amount = params.amount, currency = %params.currency))]
    async fn create_payment_intent(
        &self,
        params: NewPaymentIntent,
    ) -> Result<PaymentIntent, AdapterError> {
        let form = params.to_form();
        // Without an idempotency key a retried create could charge twice.
        let retryable = params.idempotency_key.is_some();
        self.execute("create_payment_intent", retryable, || {
            let mut request = self.post("payment_intents").form(&form);
            if let Some(key) = &params.idempotency_key {
                request = request.header("Idempotency-Key", key.as_str());
            }
            request
        })
        .await
    }

    #[instrument(skip(self))]
    async fn retrieve_payment_intent(&self, id: &str) -> Result<PaymentIntent, AdapterError> {
        let path = format!("payment_intents/{}", AdapterError::path_segment(SERVICE, id)?);
        self.execute("retrieve_payment_intent", true, || {
            self.get(&path).query(&[("expand[]", "latest_charge")])
        })
        .await
    }

    #[instrument(skip(self))]
    async fn list_payment_intents(
        &self,
        customer: &str,
    ) -> Result<Vec<PaymentIntent>, AdapterError> {
        self.list_all(
            "list_payment_intents",
            "payment_intents",
            &[("customer", customer), ("expand[]", "data.latest_charge")],
            |intent: &PaymentIntent| intent.id.clone(),
        )
        .await
    }

    #[instrument(skip(self))]
    async fn attach_payment_method(
        &self,
        payment_method_id: &str,
        customer: &str,
    ) -> Result<PaymentMethod, AdapterError> {
        let id = AdapterError::path_segment(SERVICE, payment_method_id)?;
        let path = format!("payment_methods/{}/attach", id);
        self.execute("attach_payment_method", false, || {
            self.post(&path).form(&[("customer", customer)])
        })
        .await
    }

    #[instrument(skip(self))]
    async fn detach_payment_method(
        &self,
        payment_method_id: &str,
    ) -> Result<PaymentMethod, AdapterError> {
        let id = AdapterError::path_segment(SERVICE, payment_method_id)?;
        let path = format!("payment_methods/{}/detach", id);
        self.execute("detach_payment_method", false, || self.post(&path)).await
    }

    #[instrument(skip(self))]
    async fn retrieve_payment_method(
        &self,
        payment_method_id: &str,
    ) -> Result<PaymentMethod, AdapterError> {
        let path = format!(
            "payment_methods/{}",
            AdapterError::path_segment(SERVICE, payment_method_id)?
        );
        self.execute("retrieve_payment_method", true, || self.get(&path)).await
    }

    #[instrument(skip(self))]
    async fn list_payment_methods(
        &self,
        customer: &str,
    ) -> Result<Vec<PaymentMethod>, AdapterError> {
        let path = format!(
            "customers/{}/payment_methods",
            AdapterError::path_segment(SERVICE, customer)?
        );
        self.list_all(
            "list_payment_methods",
            &path,
            &[("type", "card")],
            |method: &PaymentMethod| method.id.clone(),
        )
        .await
    }
}
