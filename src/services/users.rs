use std::sync::Arc;

use tracing::{info, instrument, warn};

use crate::entities::user::{Model as UserModel, Role};
use crate::errors::ServiceError;
use crate::models::payment::{PaymentIntent, PaymentMethod};
use crate::repositories::UserRepository;
use crate::services::payments::PaymentGateway;

/// Local user accounts and their processor-side customer, payment methods and intents.
#[derive(Clone)]
pub struct UserService {
    users: UserRepository,
    payments: Arc<dyn PaymentGateway>,
}

impl UserService {
    pub fn new(users: UserRepository, payments: Arc<dyn PaymentGateway>) -> Self {
        Self { users, payments }
    }

    pub async fn find_by_email(&self, email: &str) -> Result<Option<UserModel>, ServiceError> {
        self.users.find_by_email(email).await
    }

    /// Finds or registers the user for a verified email and makes sure a processor customer exists.
    #[instrument(skip(self))]
    pub async fn login(&self, email: &str) -> Result<UserModel, ServiceError> {
        let user = match self.users.find_by_email(email).await? {
            Some(user) => user,
            None => {
                let user = self.users.create(email, Role::User).await?;
                info!(user_id = user.id, "Registered new user");
                user
            }
        };

        if user.stripe_customer_id.as_deref().is_some_and(|id| !id.is_empty()) {
            return Ok(user);
        }

        let customer_id = self.payments.create_customer(email).await?;
        info!(user_id = user.id, %customer_id, "Created processor customer");
        self.users.set_stripe_customer_id(user, &customer_id).await
    }

    fn customer_of(user: &UserModel) -> Result<&str, ServiceError> {
        user.stripe_customer_id
            .as_deref()
            .filter(|id| !id.is_empty())
            .ok_or_else(|| {
                ServiceError::BadRequest(
                    "No payment customer on file; call /api/login first".to_string(),
                )
            })
    }

    /// Attaches a payment method and makes it the user's current one.
    #[instrument(skip(self, user), fields(user_id = user.id))]
    pub async fn attach_payment_method(
        &self,
        user: UserModel,
        payment_method_id: &str,
    ) -> Result<PaymentMethod, ServiceError> {
        let customer = Self::customer_of(&user)?.to_string();
        let method = self
            .payments
            .attach_payment_method(payment_method_id, &customer)
            .await?;
        self.users
            .set_payment_method_id(user, Some(method.id.clone()))
            .await?;
        Ok(method)
    }

    pub async fn list_payment_methods(
        &self,
        user: &UserModel,
    ) -> Result<Vec<PaymentMethod>, ServiceError> {
        let customer = Self::customer_of(user)?;
        Ok(self.payments.list_payment_methods(customer).await?)
    }

    /// Detaches one of the user's payment methods, clearing it as current if selected.
    #[instrument(skip(self, user), fields(user_id = user.id))]
    pub async fn detach_payment_method(
        &self,
        user: UserModel,
        payment_method_id: &str,
    ) -> Result<PaymentMethod, ServiceError> {
        let customer = Self::customer_of(&user)?.to_string();
        let method = self
            .payments
            .retrieve_payment_method(payment_method_id)
            .await?;
        if method.customer.as_deref() != Some(customer.as_str()) {
            warn!(payment_method_id, "Refused to detach a payment method owned by another customer");
            return Err(ServiceError::Forbidden(
                "Payment method does not belong to this user".to_string(),
            ));
        }

        let detached = self
            .payments
            .detach_payment_method(payment_method_id)
            .await?;
        if user.payment_method_id.as_deref() == Some(payment_method_id) {
            self.users.set_payment_method_id(user, None).await?;
        }
        Ok(detached)
    }

    /// Detaches every payment method of the user and clears the current one.
    #[instrument(skip(self, user), fields(user_id = user.id))]
    pub async fn detach_all_payment_methods(
        &self,
        user: UserModel,
    ) -> Result<Vec<PaymentMethod>, ServiceError> {
        let customer = Self::customer_of(&user)?.to_string();
        let methods = self.payments.list_payment_methods(&customer).await?;

        let mut detached = Vec::with_capacity(methods.len());
        for method in methods {
            detached.push(self.payments.detach_payment_method(&method.id).await?);
        }
        info!(count = detached.len(), "Detached all payment methods");

        if user.payment_method_id.is_some() {
            self.users.set_payment_method_id(user, None).await?;
        }
        Ok(detached)
    }

    pub async fn list_payment_intents(
        &self,
        user: &UserModel,
    ) -> Result<Vec<PaymentIntent>, ServiceError> {
        let customer = Self::customer_of(user)?;
        Ok(self.payments.list_payment_intents(customer).await?)
    }

    /// Retrieves an intent; intents of other customers are reported as missing.
    pub async fn get_payment_intent(
        &self,
        user: &UserModel,
        payment_intent_id: &str,
    ) -> Result<PaymentIntent, ServiceError> {
        let customer = Self::customer_of(user)?;
        let intent = self
            .payments
            .retrieve_payment_intent(payment_intent_id)
            .await?;
        if intent.customer.as_deref() != Some(customer) {
            return Err(ServiceError::NotFound(format!(
                "Payment intent {} not found",
                payment_intent_id
            )));
        }
        Ok(intent)
    }
}
