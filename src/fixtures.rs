//! Seed helpers shared by unit tests.

use sea_orm::{ActiveModelTrait, DatabaseConnection, Set};

use crate::entities::user::Role;
use crate::entities::{address, product, store, user};

pub async fn seed_user(db: &DatabaseConnection, email: &str, role: Role) -> user::Model {
    user::ActiveModel {
        email: Set(email.to_string()),
        role: Set(role),
        stripe_customer_id: Set(Some(format!("cus_{}", email.replace(['@', '.'], "_")))),
        ..Default::default()
    }
    .insert(db)
    .await
    .unwrap()
}

pub async fn seed_store(db: &DatabaseConnection, name: &str) -> store::Model {
    store::ActiveModel {
        name: Set(name.to_string()),
        ..Default::default()
    }
    .insert(db)
    .await
    .unwrap()
}

pub async fn seed_product(db: &DatabaseConnection, name: &str, price: i64) -> product::Model {
    product::ActiveModel {
        name: Set(name.to_string()),
        price: Set(price),
        ..Default::default()
    }
    .insert(db)
    .await
    .unwrap()
}

pub async fn seed_address(db: &DatabaseConnection, user_id: i64) -> address::Model {
    address::ActiveModel {
        user_id: Set(user_id),
        line1: Set("1 Main St".to_string()),
        line2: Set(String::new()),
        city: Set("Springfield".to_string()),
        state: Set("IL".to_string()),
        country: Set("US".to_string()),
        postal_code: Set("62701".to_string()),
        ..Default::default()
    }
    .insert(db)
    .await
    .unwrap()
}
