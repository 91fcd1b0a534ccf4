use sea_orm::{
    ActiveModelTrait, ColumnTrait, DatabaseConnection, EntityTrait, QueryFilter, Set,
};
use std::sync::Arc;

use crate::entities::user::{
    ActiveModel as UserActiveModel, Column, Entity as User, Model as UserModel, Role,
};
use crate::errors::ServiceError;

use super::{BaseRepository, Repository};

#[derive(Debug, Clone)]
pub struct UserRepository {
    base: BaseRepository,
}

impl UserRepository {
    pub fn new(db: Arc<DatabaseConnection>) -> Self {
        Self {
            base: BaseRepository::new(db),
        }
    }

    pub async fn find_by_id(&self, id: i64) -> Result<Option<UserModel>, ServiceError> {
        Ok(User::find_by_id(id).one(self.base.get_db()).await?)
    }

    pub async fn find_by_email(&self, email: &str) -> Result<Option<UserModel>, ServiceError> {
        Ok(User::find()
            .filter(Column::Email.eq(email))
            .one(self.base.get_db())
            .await?)
    }

    pub async fn create(&self, email: &str, role: Role) -> Result<UserModel, ServiceError> {
        let user = UserActiveModel {
            email: Set(email.to_string()),
            role: Set(role),
            ..Default::default()
        };
        Ok(user.insert(self.base.get_db()).await?)
    }

    pub async fn set_stripe_customer_id(
        &self,
        user: UserModel,
        customer_id: &str,
    ) -> Result<UserModel, ServiceError> {
        let mut active: UserActiveModel = user.into();
        active.stripe_customer_id = Set(Some(customer_id.to_string()));
        Ok(active.update(self.base.get_db()).await?)
    }

    pub async fn set_payment_method_id(
        &self,
        user: UserModel,
        payment_method_id: Option<String>,
    ) -> Result<UserModel, ServiceError> {
        let mut active: UserActiveModel = user.into();
        active.payment_method_id = Set(payment_method_id);
        Ok(active.update(self.base.get_db()).await?)
    }
}
