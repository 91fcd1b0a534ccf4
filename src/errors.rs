use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use sea_orm::error::DbErr;
use serde::{Deserialize, Serialize};
use strum::Display;

fn current_request_id() -> Option<String> {
    crate::tracing::current_request_id().map(|rid| rid.as_str().to_string())
}

/// Body returned for every failed request.
#[derive(Debug, Serialize, Deserialize)]
pub struct ErrorResponse {
    /// HTTP status category (e.g., "Not Found", "Bad Gateway")
    pub error: String,
    /// Human-readable error description
    pub message: String,
    /// Extra context the caller can act on (e.g. the processor payment id after a partial failure)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub details: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub request_id: Option<String>,
    pub timestamp: String,
}

/// Step of the pay workflow that failed after the processor already accepted the charge.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Display)]
#[strum(serialize_all = "snake_case")]
pub enum CheckoutStage {
    RecordPayment,
    DispatchDelivery,
    RecordDelivery,
}

/// Failure talking to the payment processor or the courier.
#[derive(Debug, Clone, thiserror::Error)]
pub enum AdapterError {
    #[error("{service} is temporarily unavailable: {message}")]
    Transient {
        service: &'static str,
        message: String,
    },

    #[error("{service} rejected the request ({status}): {message}")]
    Rejected {
        service: &'static str,
        status: u16,
        message: String,
    },

    #[error("{service} refused our credentials: {message}")]
    Unauthorized {
        service: &'static str,
        message: String,
    },

    #[error("{service} resource id {id:?} is not a valid path segment")]
    InvalidId { service: &'static str, id: String },

    #[error("{service} returned an unreadable response: {message}")]
    Decode {
        service: &'static str,
        message: String,
    },
}

impl AdapterError {
    /// Classifies a non-success HTTP status from a remote API.
    pub fn from_status(service: &'static str, status: u16, message: String) -> Self {
        match status {
            401 => Self::Unauthorized { service, message },
            429 | 500..=599 => Self::Transient { service, message },
            _ => Self::Rejected {
                service,
                status,
                message,
            },
        }
    }

    pub fn from_transport(service: &'static str, err: reqwest::Error) -> Self {
        if err.is_decode() {
            Self::Decode {
                service,
                message: err.to_string(),
            }
        } else {
            Self::Transient {
                service,
                message: err.to_string(),
            }
        }
    }

    /// Passes `id` through only if it can be spliced into a remote URL as one path segment.
    pub fn path_segment<'a>(service: &'static str, id: &'a str) -> Result<&'a str, Self> {
        let valid = !id.is_empty()
            && id
                .bytes()
                .all(|b| b.is_ascii_alphanumeric() || b == b'_' || b == b'-');
        if valid {
            Ok(id)
        } else {
            Err(Self::InvalidId {
                service,
                id: id.to_string(),
            })
        }
    }

    /// Transport failures, timeouts, throttling and 5xx responses may succeed on retry.
    pub fn is_transient(&self) -> bool {
        matches!(self, Self::Transient { .. })
    }
}

#[derive(Debug, thiserror::Error)]
pub enum ServiceError {
    #[error("Database error: {0}")]
    DatabaseError(#[from] DbErr),

    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Validation error: {0}")]
    ValidationError(String),

    #[error("Bad request: {0}")]
    BadRequest(String),

    #[error("Unauthorized: {0}")]
    Unauthorized(String),

    #[error("Forbidden: {0}")]
    Forbidden(String),

    #[error("External service error: {0}")]
    ExternalService(#[from] AdapterError),

    #[error("Order {order_id} partially processed: {stage} failed after payment {payment_intent_id} succeeded: {reason}")]
    PartialFailure {
        order_id: i64,
        payment_intent_id: String,
        stage: CheckoutStage,
        reason: String,
    },

    #[error("Internal error: {0}")]
    InternalError(String),

    #[error("Other error: {0}")]
    Other(#[from] anyhow::Error),
}

impl From<validator::ValidationErrors> for ServiceError {
    fn from(err: validator::ValidationErrors) -> Self {
        ServiceError::ValidationError(err.to_string())
    }
}

impl ServiceError {
    /// Returns the HTTP status code for this error.
    /// This is the single source of truth for error-to-status mapping.
    pub fn status_code(&self) -> StatusCode {
        match self {
            Self::NotFound(_) => StatusCode::NOT_FOUND,
            Self::ValidationError(_) | Self::BadRequest(_) => StatusCode::BAD_REQUEST,
            Self::Unauthorized(_) => StatusCode::UNAUTHORIZED,
            Self::Forbidden(_) => StatusCode::FORBIDDEN,
            Self::ExternalService(err) => match err {
                AdapterError::Transient { .. } => StatusCode::SERVICE_UNAVAILABLE,
                AdapterError::InvalidId { .. } => StatusCode::BAD_REQUEST,
                AdapterError::Rejected { status: 402, .. } => StatusCode::PAYMENT_REQUIRED,
                _ => StatusCode::BAD_GATEWAY,
            },
            Self::PartialFailure { stage, .. } => match stage {
                CheckoutStage::DispatchDelivery => StatusCode::BAD_GATEWAY,
                CheckoutStage::RecordPayment | CheckoutStage::RecordDelivery => {
                    StatusCode::INTERNAL_SERVER_ERROR
                }
            },
            Self::DatabaseError(_) | Self::InternalError(_) | Self::Other(_) => {
                StatusCode::INTERNAL_SERVER_ERROR
            }
        }
    }

    /// Returns the error message suitable for HTTP responses.
    /// Internal errors return generic messages to avoid leaking implementation details.
    pub fn response_message(&self) -> String {
        match self {
            Self::DatabaseError(_) => "Database error".to_string(),
            Self::InternalError(_) | Self::Other(_) => "Internal server error".to_string(),
            Self::PartialFailure {
                order_id, stage, ..
            } => format!(
                "Payment for order {} succeeded but {} failed",
                order_id, stage
            ),
            _ => self.to_string(),
        }
    }

    fn response_details(&self) -> Option<String> {
        match self {
            Self::PartialFailure {
                payment_intent_id, ..
            } => Some(format!("payment_intent_id={}", payment_intent_id)),
            _ => None,
        }
    }
}

impl IntoResponse for ServiceError {
    fn into_response(self) -> Response {
        let status = self.status_code();

        let err = ErrorResponse {
            error: status.canonical_reason().unwrap_or("Error").to_string(),
            message: self.response_message(),
            details: self.response_details(),
            request_id: current_request_id(),
            timestamp: chrono::Utc::now().to_rfc3339(),
        };

        (status, Json(err)).into_response()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::body::to_bytes;
    use rstest::rstest;

    #[tokio::test]
    async fn service_error_response_includes_request_id() {
        let response =
            crate::tracing::scope_request_id(crate::tracing::RequestId::new("req-123"), async {
                ServiceError::NotFound("missing".into()).into_response()
            })
            .await;
        assert_eq!(response.status(), StatusCode::NOT_FOUND);

        let body = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        let payload: ErrorResponse = serde_json::from_slice(&body).unwrap();
        assert_eq!(payload.request_id.as_deref(), Some("req-123"));
    }

    #[rstest]
    #[case(ServiceError::NotFound("x".into()), StatusCode::NOT_FOUND)]
    #[case(ServiceError::ValidationError("x".into()), StatusCode::BAD_REQUEST)]
    #[case(ServiceError::Unauthorized("x".into()), StatusCode::UNAUTHORIZED)]
    #[case(ServiceError::Forbidden("x".into()), StatusCode::FORBIDDEN)]
    #[case(
        ServiceError::ExternalService(AdapterError::from_status("courier", 503, "down".into())),
        StatusCode::SERVICE_UNAVAILABLE
    )]
    #[case(
        ServiceError::ExternalService(AdapterError::from_status("payments", 402, "card declined".into())),
        StatusCode::PAYMENT_REQUIRED
    )]
    #[case(
        ServiceError::ExternalService(AdapterError::from_status("payments", 400, "bad param".into())),
        StatusCode::BAD_GATEWAY
    )]
    #[case(
        ServiceError::ExternalService(AdapterError::InvalidId { service: "courier", id: "..".into() }),
        StatusCode::BAD_REQUEST
    )]
    #[case(ServiceError::InternalError("x".into()), StatusCode::INTERNAL_SERVER_ERROR)]
    fn service_error_status_code_mapping(#[case] error: ServiceError, #[case] expected: StatusCode) {
        assert_eq!(error.status_code(), expected);
    }

    #[test]
    fn adapter_status_classification() {
        assert!(AdapterError::from_status("courier", 500, "boom".into()).is_transient());
        assert!(AdapterError::from_status("courier", 429, "slow down".into()).is_transient());
        assert!(!AdapterError::from_status("courier", 404, "missing".into()).is_transient());
        assert!(matches!(
            AdapterError::from_status("courier", 401, "expired".into()),
            AdapterError::Unauthorized { .. }
        ));
    }

    #[rstest]
    #[case("del_9f2A-x")]
    #[case("pm_card_visa")]
    fn path_segment_accepts_plain_ids(#[case] id: &str) {
        assert_eq!(AdapterError::path_segment("courier", id).unwrap(), id);
    }

    #[rstest]
    #[case("")]
    #[case("..")]
    #[case("../../other_customer/deliveries")]
    #[case("del_1?expand=all")]
    #[case("del_1#frag")]
    #[case("del 1")]
    #[case("del%2F1")]
    fn path_segment_rejects_anything_else(#[case] id: &str) {
        assert!(matches!(
            AdapterError::path_segment("courier", id),
            Err(AdapterError::InvalidId { .. })
        ));
    }

    #[tokio::test]
    async fn partial_failure_exposes_payment_intent_in_details() {
        let error = ServiceError::PartialFailure {
            order_id: 42,
            payment_intent_id: "pi_123".into(),
            stage: CheckoutStage::DispatchDelivery,
            reason: "courier rejected the request".into(),
        };
        assert_eq!(error.status_code(), StatusCode::BAD_GATEWAY);

        let response = error.into_response();
        let body = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        let payload: ErrorResponse = serde_json::from_slice(&body).unwrap();
        assert_eq!(
            payload.message,
            "Payment for order 42 succeeded but dispatch_delivery failed"
        );
        assert_eq!(payload.details.as_deref(), Some("payment_intent_id=pi_123"));
    }

    #[test]
    fn response_message_hides_internal_details() {
        assert_eq!(
            ServiceError::InternalError("sensitive".into()).response_message(),
            "Internal server error"
        );
        assert_eq!(
            ServiceError::NotFound("Order 7 not found".into()).response_message(),
            "Not found: Order 7 not found"
        );
    }
}
