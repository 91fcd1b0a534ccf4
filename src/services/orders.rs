use std::sync::Arc;

use sea_orm::DatabaseConnection;
use tracing::{info, instrument, warn};
use validator::Validate;

use crate::entities::order::{Model as OrderModel, OrderStatus};
use crate::errors::ServiceError;
use crate::models::order::{DisplayStatus, NewOrder, OrderView};
use crate::repositories::order_repository::{OrderLine, OrderRepository};
use crate::services::delivery::DeliveryDispatch;
use crate::services::payments::PaymentGateway;

/// Order CRUD plus the display-status derivation that reconciles the local
/// record with processor and courier state.
#[derive(Clone)]
pub struct OrderService {
    orders: OrderRepository,
    payments: Arc<dyn PaymentGateway>,
    delivery: Arc<dyn DeliveryDispatch>,
}

impl OrderService {
    pub fn new(
        db: Arc<DatabaseConnection>,
        payments: Arc<dyn PaymentGateway>,
        delivery: Arc<dyn DeliveryDispatch>,
    ) -> Self {
        Self {
            orders: OrderRepository::new(db),
            payments,
            delivery,
        }
    }

    /// Lists a user's orders with `display_status` derived fresh from the processor and courier.
    /// Any adapter failure fails the whole listing.
    #[instrument(skip(self))]
    pub async fn get_user_orders(&self, user_id: i64) -> Result<Vec<OrderView>, ServiceError> {
        let mut orders = self.orders.find_by_user_with_items(user_id).await?;
        for order in orders.iter_mut() {
            let status = self.derive_display_status(order).await?;
            order.display_status = Some(status);
        }
        Ok(orders)
    }

    /// First matching rule wins: unpaid, refunded, store pickup, then courier status.
    pub async fn derive_display_status(
        &self,
        order: &OrderView,
    ) -> Result<DisplayStatus, ServiceError> {
        let Some(payment_intent_id) = order.payment_intent() else {
            return Ok(DisplayStatus::WaitingForPayment);
        };

        let intent = self
            .payments
            .retrieve_payment_intent(payment_intent_id)
            .await?;
        if intent.is_refunded() {
            return Ok(DisplayStatus::Refunded);
        }

        let Some(delivery_id) = order.delivery() else {
            return Ok(DisplayStatus::Completed);
        };

        let delivery = self.delivery.get_delivery(delivery_id).await?;
        let status = delivery.status.display_status();
        if status == DisplayStatus::Unknown {
            warn!(order_id = order.id, delivery_id, "Courier reported an unrecognised delivery status");
        }
        Ok(status)
    }

    /// Persists a new order for `user_id`. The acting user always owns the order.
    #[instrument(skip(self, order), fields(store_id = order.store_id))]
    pub async fn add_order_for_user(
        &self,
        user_id: i64,
        order: NewOrder,
    ) -> Result<OrderView, ServiceError> {
        order.validate()?;

        let lines = order
            .order_items
            .iter()
            .map(|item| {
                item.resolved_product_id()
                    .map(|product_id| OrderLine {
                        product_id,
                        quantity: item.quantity,
                    })
                    .ok_or_else(|| {
                        ServiceError::ValidationError(
                            "Each item needs a product id or an embedded product".to_string(),
                        )
                    })
            })
            .collect::<Result<Vec<_>, _>>()?;

        let created = self
            .orders
            .create_with_items(user_id, order.store_id, &lines)
            .await?;
        info!(order_id = created.id, user_id, items = lines.len(), "Order created");
        Ok(created)
    }

    pub async fn find_order_by_id(&self, order_id: i64) -> Result<OrderView, ServiceError> {
        self.orders
            .find_by_id_with_items(order_id)
            .await?
            .ok_or_else(|| order_not_found(order_id))
    }

    /// Like `find_order_by_id`, but orders owned by someone else are reported as missing.
    pub async fn find_user_order(
        &self,
        user_id: i64,
        order_id: i64,
    ) -> Result<OrderView, ServiceError> {
        let order = self.find_order_by_id(order_id).await?;
        if order.user_id != user_id {
            return Err(order_not_found(order_id));
        }
        Ok(order)
    }

    #[instrument(skip(self))]
    pub async fn update_payment_intent_id(
        &self,
        order_id: i64,
        payment_intent_id: &str,
    ) -> Result<OrderModel, ServiceError> {
        self.orders
            .set_payment_intent_id(order_id, payment_intent_id)
            .await?
            .ok_or_else(|| order_not_found(order_id))
    }

    #[instrument(skip(self))]
    pub async fn update_delivery_id(
        &self,
        order_id: i64,
        delivery_id: &str,
    ) -> Result<OrderModel, ServiceError> {
        self.orders
            .set_delivery_id(order_id, delivery_id)
            .await?
            .ok_or_else(|| order_not_found(order_id))
    }

    #[instrument(skip(self))]
    pub async fn update_status(
        &self,
        order_id: i64,
        status: OrderStatus,
    ) -> Result<OrderModel, ServiceError> {
        let updated = self
            .orders
            .update_status(order_id, status)
            .await?
            .ok_or_else(|| order_not_found(order_id))?;
        info!(order_id, status = ?status, "Order status updated");
        Ok(updated)
    }

    pub async fn orders_for_store(&self, store_id: i64) -> Result<Vec<OrderView>, ServiceError> {
        self.orders.find_by_store(store_id).await
    }
}

fn order_not_found(order_id: i64) -> ServiceError {
    ServiceError::NotFound(format!("Order {} not found", order_id))
}
