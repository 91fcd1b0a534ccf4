use std::sync::Arc;

use tracing::{error, info, instrument};
use uuid::Uuid;
use validator::Validate;

use crate::entities::user::Model as UserModel;
use crate::errors::{CheckoutStage, ServiceError};
use crate::models::payment::{
    ConfirmationMethod, NewPaymentIntent, PaymentIntent, PaymentIntentRequest, ShippingAddress,
    ShippingDetails,
};
use crate::repositories::AddressRepository;
use crate::services::delivery::{prepare_dispatch, DeliveryDispatch};
use crate::services::orders::OrderService;
use crate::services::payments::PaymentGateway;

/// Pay workflow: charge, record the charge, then optionally dispatch and record the delivery.
///
/// Steps run strictly in sequence. Nothing is rolled back: once the processor
/// accepts the charge, later failures surface as `PartialFailure` carrying the
/// payment intent id.
#[derive(Clone)]
pub struct CheckoutService {
    orders: OrderService,
    addresses: AddressRepository,
    payments: Arc<dyn PaymentGateway>,
    delivery: Arc<dyn DeliveryDispatch>,
    test_mode: bool,
}

impl CheckoutService {
    pub fn new(
        orders: OrderService,
        addresses: AddressRepository,
        payments: Arc<dyn PaymentGateway>,
        delivery: Arc<dyn DeliveryDispatch>,
        test_mode: bool,
    ) -> Self {
        Self {
            orders,
            addresses,
            payments,
            delivery,
            test_mode,
        }
    }

    #[instrument(skip(self, user, request), fields(user_id = user.id, order_id = request.order_id))]
    pub async fn pay(
        &self,
        user: &UserModel,
        request: PaymentIntentRequest,
    ) -> Result<PaymentIntent, ServiceError> {
        if request.order_id <= 0 {
            return Err(ServiceError::ValidationError(
                "order_id must be a positive integer".to_string(),
            ));
        }
        request.validate()?;

        let order = self.orders.find_user_order(user.id, request.order_id).await?;
        let shipping = self
            .resolve_shipping(user, request.shipping_address_id)
            .await?;

        let intent = self
            .payments
            .create_payment_intent(NewPaymentIntent {
                amount: request.amount,
                currency: request.currency.clone(),
                customer: user.stripe_customer_id.clone(),
                payment_method: request.payment_method_id.clone(),
                confirmation_method: ConfirmationMethod::Manual,
                confirm: true,
                shipping,
                idempotency_key: Some(Uuid::new_v4().to_string()),
            })
            .await?;
        info!(order_id = order.id, payment_intent_id = %intent.id, status = %intent.status, "Payment intent created");

        if let Err(e) = self
            .orders
            .update_payment_intent_id(order.id, &intent.id)
            .await
        {
            return Err(partial_failure(
                order.id,
                &intent,
                CheckoutStage::RecordPayment,
                e.to_string(),
            ));
        }

        let Some(delivery_data) = request.delivery_data else {
            return Ok(intent);
        };

        let delivery = match self
            .delivery
            .create_delivery(prepare_dispatch(delivery_data, self.test_mode))
            .await
        {
            Ok(delivery) => delivery,
            Err(e) => {
                return Err(partial_failure(
                    order.id,
                    &intent,
                    CheckoutStage::DispatchDelivery,
                    e.to_string(),
                ))
            }
        };

        if let Err(e) = self.orders.update_delivery_id(order.id, &delivery.id).await {
            return Err(partial_failure(
                order.id,
                &intent,
                CheckoutStage::RecordDelivery,
                format!("delivery {} not recorded: {}", delivery.id, e),
            ));
        }
        info!(order_id = order.id, delivery_id = %delivery.id, "Delivery dispatched");

        Ok(intent)
    }

    /// Request address when positive, else the user's default. The address must belong to the user.
    async fn resolve_shipping(
        &self,
        user: &UserModel,
        requested: Option<i64>,
    ) -> Result<Option<ShippingDetails>, ServiceError> {
        let address_id = requested
            .filter(|id| *id > 0)
            .or(user.default_shipping_address_id.filter(|id| *id > 0));
        let Some(address_id) = address_id else {
            return Ok(None);
        };

        let address = self
            .addresses
            .find_by_id(address_id)
            .await?
            .filter(|a| a.user_id == user.id)
            .ok_or_else(|| ServiceError::NotFound(format!("Address {} not found", address_id)))?;

        Ok(Some(ShippingDetails {
            name: user.email.clone(),
            address: ShippingAddress::from(&address),
        }))
    }
}

fn partial_failure(
    order_id: i64,
    intent: &PaymentIntent,
    stage: CheckoutStage,
    reason: String,
) -> ServiceError {
    error!(
        order_id,
        payment_intent_id = %intent.id,
        stage = %stage,
        %reason,
        "Payment succeeded but checkout did not complete"
    );
    ServiceError::PartialFailure {
        order_id,
        payment_intent_id: intent.id.clone(),
        stage,
        reason,
    }
}
