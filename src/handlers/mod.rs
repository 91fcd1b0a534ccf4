pub mod delivery;
pub mod login;
pub mod manager;
pub mod orders;
pub mod payments;

use std::sync::Arc;

use sea_orm::DatabaseConnection;

use crate::auth::{IdentityVerifier, JwtIdentityVerifier};
use crate::config::AppConfig;
use crate::errors::ServiceError;
use crate::repositories::{AddressRepository, ManagerStoreRepository, UserRepository};
use crate::services::{
    checkout::CheckoutService,
    delivery::{CourierClient, DeliveryDispatch},
    orders::OrderService,
    payments::{PaymentGateway, StripeGateway},
    store_access::StoreAccessGate,
    users::UserService,
};

// Re-export AppState so handler modules can import it as crate::handlers::AppState
pub use crate::AppState;

/// Services layer that encapsulates business logic used by HTTP handlers
#[derive(Clone)]
pub struct AppServices {
    pub orders: Arc<OrderService>,
    pub checkout: Arc<CheckoutService>,
    pub payments: Arc<dyn PaymentGateway>,
    pub delivery: Arc<dyn DeliveryDispatch>,
    pub users: Arc<UserService>,
    pub store_access: Arc<StoreAccessGate>,
    pub identity: Arc<dyn IdentityVerifier>,
}

impl AppServices {
    /// Wires the services around the given adapters.
    pub fn new(
        db: Arc<DatabaseConnection>,
        config: &AppConfig,
        payments: Arc<dyn PaymentGateway>,
        delivery: Arc<dyn DeliveryDispatch>,
        identity: Arc<dyn IdentityVerifier>,
    ) -> Self {
        let orders = OrderService::new(db.clone(), payments.clone(), delivery.clone());
        let checkout = CheckoutService::new(
            orders.clone(),
            AddressRepository::new(db.clone()),
            payments.clone(),
            delivery.clone(),
            config.test_mode,
        );
        let users = UserService::new(UserRepository::new(db.clone()), payments.clone());
        let store_access = StoreAccessGate::new(
            Arc::new(ManagerStoreRepository::new(db)),
            config.admin_bypasses_store_check,
        );

        Self {
            orders: Arc::new(orders),
            checkout: Arc::new(checkout),
            payments,
            delivery,
            users: Arc::new(users),
            store_access: Arc::new(store_access),
            identity,
        }
    }

    /// Builds the production adapters (payment processor, courier, JWT verifier) from config.
    pub fn from_config(
        db: Arc<DatabaseConnection>,
        config: &AppConfig,
    ) -> Result<Self, ServiceError> {
        let payments: Arc<dyn PaymentGateway> = Arc::new(StripeGateway::new(config)?);
        let delivery: Arc<dyn DeliveryDispatch> = Arc::new(CourierClient::new(config)?);
        let identity: Arc<dyn IdentityVerifier> =
            Arc::new(JwtIdentityVerifier::new(&config.jwt_secret));
        Ok(Self::new(db, config, payments, delivery, identity))
    }
}
