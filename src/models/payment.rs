use super::delivery::DeliveryData;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use validator::Validate;

/// Body of `POST /api/pay`.
#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
pub struct PaymentIntentRequest {
    /// Amount in minor currency units
    #[validate(range(min = 1, message = "amount must be positive"))]
    pub amount: i64,
    #[validate(length(min = 3, max = 3, message = "currency must be an ISO 4217 code"))]
    pub currency: String,
    #[validate(length(min = 1, message = "payment_method_id is required"))]
    pub payment_method_id: String,
    /// Falls back to the user's default shipping address when absent or not positive
    #[serde(default)]
    pub shipping_address_id: Option<i64>,
    #[serde(default)]
    pub order_id: i64,
    /// Present when the order ships by courier instead of store pickup
    #[serde(default)]
    pub delivery_data: Option<DeliveryData>,
}

/// Payment intent as returned by the processor. Fields this service does not read are relayed untouched.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PaymentIntent {
    pub id: String,
    pub amount: i64,
    pub currency: String,
    pub status: String,
    #[serde(default)]
    pub customer: Option<String>,
    #[serde(default)]
    pub latest_charge: Option<LatestCharge>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl PaymentIntent {
    /// True only when the latest charge was expanded and reports a refund.
    pub fn is_refunded(&self) -> bool {
        matches!(&self.latest_charge, Some(LatestCharge::Expanded(charge)) if charge.refunded)
    }
}

/// `latest_charge` is a bare id unless the request asked for expansion.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum LatestCharge {
    Expanded(Charge),
    Id(String),
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Charge {
    pub id: String,
    #[serde(default)]
    pub refunded: bool,
    #[serde(default)]
    pub amount_refunded: i64,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PaymentMethod {
    pub id: String,
    #[serde(rename = "type", default)]
    pub method_type: String,
    #[serde(default)]
    pub customer: Option<String>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

/// Page of a processor list endpoint.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StripeList<T> {
    pub data: Vec<T>,
    #[serde(default)]
    pub has_more: bool,
}

#[derive(Debug, Clone, Deserialize)]
pub struct Customer {
    pub id: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConfirmationMethod {
    Automatic,
    Manual,
}

impl ConfirmationMethod {
    fn as_str(&self) -> &'static str {
        match self {
            Self::Automatic => "automatic",
            Self::Manual => "manual",
        }
    }
}

/// Parameters for creating a payment intent.
#[derive(Debug, Clone, PartialEq)]
pub struct NewPaymentIntent {
    pub amount: i64,
    pub currency: String,
    pub customer: Option<String>,
    pub payment_method: String,
    pub confirmation_method: ConfirmationMethod,
    pub confirm: bool,
    pub shipping: Option<ShippingDetails>,
    /// Sent as the `Idempotency-Key` header; makes the create safe to retry
    pub idempotency_key: Option<String>,
}

impl NewPaymentIntent {
    /// Form parameters in the processor's bracketed notation.
    pub fn to_form(&self) -> Vec<(String, String)> {
        let mut form = vec![
            ("amount".to_string(), self.amount.to_string()),
            ("currency".to_string(), self.currency.clone()),
            ("payment_method".to_string(), self.payment_method.clone()),
            (
                "confirmation_method".to_string(),
                self.confirmation_method.as_str().to_string(),
            ),
            ("confirm".to_string(), self.confirm.to_string()),
        ];
        if let Some(customer) = &self.customer {
            form.push(("customer".to_string(), customer.clone()));
        }
        if let Some(shipping) = &self.shipping {
            form.push(("shipping[name]".to_string(), shipping.name.clone()));
            let address = &shipping.address;
            for (key, value) in [
                ("line1", &address.line1),
                ("line2", &address.line2),
                ("city", &address.city),
                ("state", &address.state),
                ("country", &address.country),
                ("postal_code", &address.postal_code),
            ] {
                form.push((format!("shipping[address][{}]", key), value.clone()));
            }
        }
        form
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct ShippingDetails {
    pub name: String,
    pub address: ShippingAddress,
}

#[derive(Debug, Clone, PartialEq)]
pub struct ShippingAddress {
    pub line1: String,
    pub line2: String,
    pub city: String,
    pub state: String,
    pub country: String,
    pub postal_code: String,
}

impl From<&crate::entities::address::Model> for ShippingAddress {
    fn from(address: &crate::entities::address::Model) -> Self {
        Self {
            line1: address.line1.clone(),
            line2: address.line2.clone(),
            city: address.city.clone(),
            state: address.state.clone(),
            country: address.country.clone(),
            postal_code: address.postal_code.clone(),
        }
    }
}

/// Error envelope used by the processor: `{"error": {"message", "code", "type"}}`.
#[derive(Debug, Clone, Deserialize)]
pub struct StripeErrorBody {
    pub error: StripeErrorDetail,
}

#[derive(Debug, Clone, Deserialize)]
pub struct StripeErrorDetail {
    #[serde(default)]
    pub message: Option<String>,
    #[serde(default)]
    pub code: Option<String>,
    #[serde(rename = "type", default)]
    pub error_type: Option<String>,
}

impl StripeErrorDetail {
    pub fn describe(&self) -> String {
        let message = self.message.as_deref().unwrap_or("unknown error");
        match (&self.error_type, &self.code) {
            (Some(kind), Some(code)) => format!("{} ({}/{})", message, kind, code),
            (Some(kind), None) => format!("{} ({})", message, kind),
            (None, Some(code)) => format!("{} ({})", message, code),
            (None, None) => message.to_string(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn refunded_only_when_expanded_charge_reports_it() {
        let mut intent: PaymentIntent = serde_json::from_value(json!({
            "id": "pi_1",
            "amount": 1500,
            "currency": "usd",
            "status": "succeeded",
            "latest_charge": {"id": "ch_1", "refunded": true, "amount_refunded": 1500}
        }))
        .unwrap();
        assert!(intent.is_refunded());

        intent.latest_charge = Some(LatestCharge::Id("ch_1".into()));
        assert!(!intent.is_refunded());

        intent.latest_charge = None;
        assert!(!intent.is_refunded());
    }

    #[test]
    fn unknown_fields_survive_a_round_trip() {
        let raw = json!({
            "id": "pi_2",
            "amount": 100,
            "currency": "usd",
            "status": "requires_action",
            "client_secret": "pi_2_secret",
            "next_action": {"type": "use_stripe_sdk"}
        });
        let intent: PaymentIntent = serde_json::from_value(raw.clone()).unwrap();
        let back = serde_json::to_value(&intent).unwrap();
        assert_eq!(back["client_secret"], raw["client_secret"]);
        assert_eq!(back["next_action"], raw["next_action"]);
    }

    #[test]
    fn form_uses_bracketed_shipping_keys() {
        let params = NewPaymentIntent {
            amount: 1500,
            currency: "usd".into(),
            customer: Some("cus_1".into()),
            payment_method: "pm_1".into(),
            confirmation_method: ConfirmationMethod::Manual,
            confirm: true,
            shipping: Some(ShippingDetails {
                name: "buyer@example.com".into(),
                address: ShippingAddress {
                    line1: "1 Main St".into(),
                    line2: String::new(),
                    city: "Springfield".into(),
                    state: "IL".into(),
                    country: "US".into(),
                    postal_code: "62701".into(),
                },
            }),
            idempotency_key: None,
        };
        let form = params.to_form();
        assert!(form.contains(&("confirmation_method".into(), "manual".into())));
        assert!(form.contains(&("confirm".into(), "true".into())));
        assert!(form.contains(&("shipping[name]".into(), "buyer@example.com".into())));
        assert!(form.contains(&("shipping[address][postal_code]".into(), "62701".into())));
    }
}
