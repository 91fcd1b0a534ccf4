use super::order::DisplayStatus;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// Courier-side lifecycle of a delivery.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DeliveryStatus {
    Pending,
    Pickup,
    PickupComplete,
    Dropoff,
    Delivered,
    Canceled,
    Returned,
    #[serde(other)]
    Unknown,
}

impl DeliveryStatus {
    /// Order status a customer sees for a courier-tracked order.
    pub fn display_status(&self) -> DisplayStatus {
        match self {
            Self::Pending | Self::Pickup => DisplayStatus::ReadyForPickup,
            Self::PickupComplete | Self::Dropoff => DisplayStatus::InDelivery,
            Self::Delivered => DisplayStatus::Completed,
            Self::Canceled => DisplayStatus::Canceled,
            Self::Returned => DisplayStatus::Returned,
            Self::Unknown => DisplayStatus::Unknown,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct QuoteRequest {
    pub dropoff_address: String,
    pub pickup_address: String,
    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub dropoff_latitude: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub dropoff_longitude: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub dropoff_phone_number: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub pickup_latitude: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub pickup_longitude: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub pickup_phone_number: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub pickup_ready_dt: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub pickup_deadline_dt: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub dropoff_ready_dt: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub dropoff_deadline_dt: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub manifest_total_value: Option<i64>,
    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub external_store_id: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct QuoteResponse {
    pub id: String,
    #[serde(default)]
    pub kind: String,
    #[serde(default)]
    pub fee: i64,
    #[serde(default)]
    pub currency_type: String,
    #[serde(default)]
    pub created: Option<String>,
    #[serde(default)]
    pub expires: Option<String>,
    #[serde(default)]
    pub dropoff_eta: Option<String>,
    #[serde(default)]
    pub dropoff_deadline: Option<String>,
    #[serde(default)]
    pub duration: Option<i64>,
    #[serde(default)]
    pub pickup_duration: Option<i64>,
    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub external_store_id: Option<String>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

/// Create-delivery payload. Verification, action and scheduling details are passed through as-is.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DeliveryData {
    pub dropoff_address: String,
    pub dropoff_name: String,
    pub dropoff_phone_number: String,
    pub manifest_items: Vec<ManifestItem>,
    pub pickup_address: String,
    pub pickup_name: String,
    pub pickup_phone_number: String,
    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub quote_id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub manifest_reference: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub manifest_total_value: Option<i64>,
    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub tip: Option<i64>,
    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub external_store_id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub idempotency_key: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub test_specifications: Option<TestSpecifications>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl DeliveryData {
    /// Asks the courier to simulate the trip with a robo-courier instead of dispatching a driver.
    pub fn apply_test_mode(&mut self) {
        self.test_specifications = Some(TestSpecifications {
            robo_courier_specification: RoboCourierSpecification::auto(),
        });
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ManifestItem {
    pub name: String,
    pub quantity: i32,
    #[serde(default)]
    pub size: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub dimensions: Option<Dimensions>,
    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub price: Option<i64>,
    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub weight: Option<i64>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Dimensions {
    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub length: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub height: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub depth: Option<f64>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TestSpecifications {
    pub robo_courier_specification: RoboCourierSpecification,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RoboCourierSpecification {
    pub mode: String,
    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub enroute_for_pickup_at: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub pickup_imminent_at: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub pickup_at: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub dropoff_imminent_at: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub dropoff_at: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub cancel_reason: Option<String>,
}

impl RoboCourierSpecification {
    pub fn auto() -> Self {
        Self {
            mode: "auto".to_string(),
            enroute_for_pickup_at: None,
            pickup_imminent_at: None,
            pickup_at: None,
            dropoff_imminent_at: None,
            dropoff_at: None,
            cancel_reason: None,
        }
    }
}

/// Delivery as reported by the courier. Unread fields are relayed to clients unchanged.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DeliveryResponse {
    pub id: String,
    pub status: DeliveryStatus,
    #[serde(default)]
    pub tracking_url: Option<String>,
    #[serde(default)]
    pub fee: Option<i64>,
    #[serde(default)]
    pub currency: Option<String>,
    #[serde(default)]
    pub complete: bool,
    #[serde(default)]
    pub live_mode: bool,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct TokenResponse {
    pub token_type: String,
    pub access_token: String,
    pub expires_in: i64,
}

/// Error body returned by the courier API and its token endpoint.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct CourierErrorBody {
    #[serde(default)]
    pub code: Option<String>,
    #[serde(default)]
    pub message: Option<String>,
    #[serde(default)]
    pub error: Option<String>,
    #[serde(default)]
    pub metadata: Option<Value>,
}

impl CourierErrorBody {
    pub fn describe(&self) -> String {
        let message = self
            .message
            .as_deref()
            .or(self.error.as_deref())
            .unwrap_or("unknown error");
        let mut text = match &self.code {
            Some(code) => format!("{}: {}", code, message),
            None => message.to_string(),
        };
        if let Some(metadata) = &self.metadata {
            text.push_str(&format!(" {}", metadata));
        }
        text
    }
}
