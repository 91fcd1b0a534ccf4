use async_trait::async_trait;
use sea_orm::{
    ActiveModelTrait, ColumnTrait, DatabaseConnection, EntityTrait, PaginatorTrait, QueryFilter,
    Set,
};
use std::sync::Arc;

use crate::entities::manager_store::{
    ActiveModel as ManagerStoreActiveModel, Column, Entity as ManagerStore,
    Model as ManagerStoreModel,
};
use crate::errors::ServiceError;

use super::{BaseRepository, Repository};

/// Looks up manager-store relationships for the authorization gate.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait ManagerStoreLookup: Send + Sync {
    async fn manages_store(&self, user_id: i64, store_id: i64) -> Result<bool, ServiceError>;
}

#[derive(Debug, Clone)]
pub struct ManagerStoreRepository {
    base: BaseRepository,
}

impl ManagerStoreRepository {
    pub fn new(db: Arc<DatabaseConnection>) -> Self {
        Self {
            base: BaseRepository::new(db),
        }
    }

    /// Records that `user_id` manages `store_id`.
    pub async fn assign(
        &self,
        user_id: i64,
        store_id: i64,
    ) -> Result<ManagerStoreModel, ServiceError> {
        let relation = ManagerStoreActiveModel {
            user_id: Set(user_id),
            store_id: Set(store_id),
            ..Default::default()
        };
        Ok(relation.insert(self.base.get_db()).await?)
    }
}

#[async_trait]
impl ManagerStoreLookup for ManagerStoreRepository {
    async fn manages_store(&self, user_id: i64, store_id: i64) -> Result<bool, ServiceError> {
        let count = ManagerStore::find()
            .filter(Column::UserId.eq(user_id))
            .filter(Column::StoreId.eq(store_id))
            .count(self.base.get_db())
            .await?;
        Ok(count > 0)
    }
}
