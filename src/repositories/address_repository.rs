use sea_orm::{DatabaseConnection, EntityTrait};
use std::sync::Arc;

use crate::entities::address::{Entity as Address, Model as AddressModel};
use crate::errors::ServiceError;

use super::{BaseRepository, Repository};

#[derive(Debug, Clone)]
pub struct AddressRepository {
    base: BaseRepository,
}

impl AddressRepository {
    pub fn new(db: Arc<DatabaseConnection>) -> Self {
        Self {
            base: BaseRepository::new(db),
        }
    }

    pub async fn find_by_id(&self, id: i64) -> Result<Option<AddressModel>, ServiceError> {
        Ok(Address::find_by_id(id).one(self.base.get_db()).await?)
    }
}
