use sea_orm::DatabaseConnection;
use std::sync::Arc;

pub mod address_repository;
pub mod manager_store_repository;
pub mod order_repository;
pub mod user_repository;

pub use address_repository::AddressRepository;
pub use manager_store_repository::{ManagerStoreLookup, ManagerStoreRepository};
pub use order_repository::OrderRepository;
pub use user_repository::UserRepository;

/// Repository trait for common database operations
pub trait Repository {
    fn get_db(&self) -> &DatabaseConnection;
}

#[derive(Debug, Clone)]
pub struct BaseRepository {
    db: Arc<DatabaseConnection>,
}

impl BaseRepository {
    pub fn new(db: Arc<DatabaseConnection>) -> Self {
        Self { db }
    }
}

impl Repository for BaseRepository {
    fn get_db(&self) -> &DatabaseConnection {
        &self.db
    }
}
