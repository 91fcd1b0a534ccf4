use sea_orm::{
    ActiveModelTrait, ColumnTrait, DatabaseConnection, EntityTrait, QueryFilter, QueryOrder, Set,
    TransactionTrait,
};
use std::collections::HashMap;
use std::sync::Arc;

use crate::entities::order::{
    ActiveModel as OrderActiveModel, Column, Entity as Order, Model as OrderModel, OrderStatus,
};
use crate::entities::order_item::{
    self, ActiveModel as OrderItemActiveModel, Entity as OrderItem,
};
use crate::entities::product::{self, Entity as Product};
use crate::errors::ServiceError;
use crate::models::order::{OrderItemView, OrderView};

use super::{BaseRepository, Repository};

/// Line to persist with a new order, product already resolved.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct OrderLine {
    pub product_id: i64,
    pub quantity: i32,
}

/// Repository for orders and their items
#[derive(Debug, Clone)]
pub struct OrderRepository {
    base: BaseRepository,
}

impl OrderRepository {
    pub fn new(db: Arc<DatabaseConnection>) -> Self {
        Self {
            base: BaseRepository::new(db),
        }
    }

    pub async fn find_by_id(&self, id: i64) -> Result<Option<OrderModel>, ServiceError> {
        Ok(Order::find_by_id(id).one(self.base.get_db()).await?)
    }

    /// Find an order with its items and their products
    pub async fn find_by_id_with_items(&self, id: i64) -> Result<Option<OrderView>, ServiceError> {
        match self.find_by_id(id).await? {
            Some(order) => Ok(self.expand(vec![order]).await?.pop()),
            None => Ok(None),
        }
    }

    /// Orders placed by a user, oldest first, with items and products
    pub async fn find_by_user_with_items(
        &self,
        user_id: i64,
    ) -> Result<Vec<OrderView>, ServiceError> {
        let orders = Order::find()
            .filter(Column::UserId.eq(user_id))
            .order_by_asc(Column::Id)
            .all(self.base.get_db())
            .await?;
        self.expand(orders).await
    }

    /// Orders placed at a store, oldest first, with items and products
    pub async fn find_by_store(&self, store_id: i64) -> Result<Vec<OrderView>, ServiceError> {
        let orders = Order::find()
            .filter(Column::StoreId.eq(store_id))
            .order_by_asc(Column::Id)
            .all(self.base.get_db())
            .await?;
        self.expand(orders).await
    }

    /// Inserts the order, then its items with the generated order id, in one transaction.
    pub async fn create_with_items(
        &self,
        user_id: i64,
        store_id: i64,
        lines: &[OrderLine],
    ) -> Result<OrderView, ServiceError> {
        let txn = self.base.get_db().begin().await?;

        let order = OrderActiveModel {
            user_id: Set(user_id),
            store_id: Set(store_id),
            status: Set(OrderStatus::WaitingForPayment),
            payment_intent_id: Set(None),
            delivery_id: Set(None),
            ..Default::default()
        }
        .insert(&txn)
        .await?;

        let mut items = Vec::with_capacity(lines.len());
        for line in lines {
            let item = OrderItemActiveModel {
                order_id: Set(order.id),
                product_id: Set(line.product_id),
                quantity: Set(line.quantity),
                ..Default::default()
            }
            .insert(&txn)
            .await?;
            items.push(item);
        }

        txn.commit().await?;

        let products = self.products_for(&items).await?;
        let items = items
            .into_iter()
            .map(|item| {
                let product = products.get(&item.product_id).cloned();
                OrderItemView::new(item, product)
            })
            .collect();
        Ok(OrderView::new(order, items))
    }

    /// Sets the persisted lifecycle status. `None` when the order does not exist.
    pub async fn update_status(
        &self,
        id: i64,
        status: OrderStatus,
    ) -> Result<Option<OrderModel>, ServiceError> {
        self.update_field(id, |active| active.status = Set(status)).await
    }

    pub async fn set_payment_intent_id(
        &self,
        id: i64,
        payment_intent_id: &str,
    ) -> Result<Option<OrderModel>, ServiceError> {
        let value = payment_intent_id.to_string();
        self.update_field(id, move |active| active.payment_intent_id = Set(Some(value)))
            .await
    }

    pub async fn set_delivery_id(
        &self,
        id: i64,
        delivery_id: &str,
    ) -> Result<Option<OrderModel>, ServiceError> {
        let value = delivery_id.to_string();
        self.update_field(id, move |active| active.delivery_id = Set(Some(value)))
            .await
    }

    async fn update_field<F>(&self, id: i64, apply: F) -> Result<Option<OrderModel>, ServiceError>
    where
        F: FnOnce(&mut OrderActiveModel),
    {
        let Some(existing) = self.find_by_id(id).await? else {
            return Ok(None);
        };
        let mut active: OrderActiveModel = existing.into();
        apply(&mut active);
        Ok(Some(active.update(self.base.get_db()).await?))
    }

    async fn expand(&self, orders: Vec<OrderModel>) -> Result<Vec<OrderView>, ServiceError> {
        if orders.is_empty() {
            return Ok(Vec::new());
        }

        let order_ids: Vec<i64> = orders.iter().map(|o| o.id).collect();
        let items = OrderItem::find()
            .filter(order_item::Column::OrderId.is_in(order_ids))
            .order_by_asc(order_item::Column::Id)
            .all(self.base.get_db())
            .await?;
        let products = self.products_for(&items).await?;

        let mut items_by_order: HashMap<i64, Vec<OrderItemView>> = HashMap::new();
        for item in items {
            let product = products.get(&item.product_id).cloned();
            items_by_order
                .entry(item.order_id)
                .or_default()
                .push(OrderItemView::new(item, product));
        }

        Ok(orders
            .into_iter()
            .map(|order| {
                let items = items_by_order.remove(&order.id).unwrap_or_default();
                OrderView::new(order, items)
            })
            .collect())
    }

    async fn products_for(
        &self,
        items: &[order_item::Model],
    ) -> Result<HashMap<i64, product::Model>, ServiceError> {
        let mut product_ids: Vec<i64> = items.iter().map(|i| i.product_id).collect();
        product_ids.sort_unstable();
        product_ids.dedup();
        if product_ids.is_empty() {
            return Ok(HashMap::new());
        }

        Ok(Product::find()
            .filter(product::Column::Id.is_in(product_ids))
            .all(self.base.get_db())
            .await?
            .into_iter()
            .map(|p| (p.id, p))
            .collect())
    }
}
