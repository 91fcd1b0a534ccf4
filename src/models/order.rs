use crate::entities::{order, order_item, product};
use crate::entities::order::OrderStatus;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use validator::{Validate, ValidationError};

/// Status shown to customers, recomputed from order, payment and delivery state on every read.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum DisplayStatus {
    WaitingForPayment,
    Paid,
    InProduction,
    ReadyForPickup,
    InDelivery,
    Completed,
    Refunded,
    Canceled,
    Returned,
    Unknown,
}

impl From<OrderStatus> for DisplayStatus {
    fn from(status: OrderStatus) -> Self {
        match status {
            OrderStatus::WaitingForPayment => Self::WaitingForPayment,
            OrderStatus::Paid => Self::Paid,
            OrderStatus::InProduction => Self::InProduction,
            OrderStatus::ReadyForPickup => Self::ReadyForPickup,
            OrderStatus::InDelivery => Self::InDelivery,
            OrderStatus::Completed => Self::Completed,
            OrderStatus::Refunded => Self::Refunded,
        }
    }
}

/// Order as returned by the API, items and products expanded.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OrderView {
    pub id: i64,
    pub user_id: i64,
    pub store_id: i64,
    pub status: OrderStatus,
    pub payment_intent_id: Option<String>,
    pub delivery_id: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    pub order_items: Vec<OrderItemView>,
    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub display_status: Option<DisplayStatus>,
}

impl OrderView {
    pub fn new(order: order::Model, order_items: Vec<OrderItemView>) -> Self {
        Self {
            id: order.id,
            user_id: order.user_id,
            store_id: order.store_id,
            status: order.status,
            payment_intent_id: order.payment_intent_id,
            delivery_id: order.delivery_id,
            created_at: order.created_at,
            updated_at: order.updated_at,
            order_items,
            display_status: None,
        }
    }

    pub fn payment_intent(&self) -> Option<&str> {
        self.payment_intent_id.as_deref().filter(|id| !id.is_empty())
    }

    pub fn delivery(&self) -> Option<&str> {
        self.delivery_id.as_deref().filter(|id| !id.is_empty())
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OrderItemView {
    pub id: i64,
    pub order_id: i64,
    pub product_id: i64,
    pub quantity: i32,
    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub product: Option<product::Model>,
}

impl OrderItemView {
    pub fn new(item: order_item::Model, product: Option<product::Model>) -> Self {
        Self {
            id: item.id,
            order_id: item.order_id,
            product_id: item.product_id,
            quantity: item.quantity,
            product,
        }
    }
}

/// Body of `POST /api/order`. Any `user_id` the client sends is ignored.
#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
pub struct NewOrder {
    #[validate(range(min = 1, message = "store_id must be positive"))]
    pub store_id: i64,
    #[validate(length(min = 1, message = "An order needs at least one item"))]
    #[validate]
    pub order_items: Vec<NewOrderItem>,
}

#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
#[validate(schema(function = "validate_product_reference"))]
pub struct NewOrderItem {
    #[serde(default)]
    pub product_id: Option<i64>,
    /// Embedded product object; its id wins over `product_id`.
    #[serde(default)]
    pub product: Option<ProductRef>,
    #[validate(range(min = 1, message = "Quantity must be at least 1"))]
    pub quantity: i32,
}

impl NewOrderItem {
    /// Product id taken from the embedded product when present, else the explicit id.
    pub fn resolved_product_id(&self) -> Option<i64> {
        self.product
            .as_ref()
            .map(|p| p.id)
            .or(self.product_id)
            .filter(|id| *id > 0)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProductRef {
    pub id: i64,
}

fn validate_product_reference(item: &NewOrderItem) -> Result<(), ValidationError> {
    if item.resolved_product_id().is_some() {
        Ok(())
    } else {
        let mut err = ValidationError::new("product");
        err.message = Some("Each item needs a product id or an embedded product".into());
        Err(err)
    }
}

/// Body of `PUT /api/mgr/orders/:order_id/status`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UpdateOrderStatus {
    pub status: OrderStatus,
}
