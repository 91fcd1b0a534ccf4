pub mod address;
pub mod manager_store;
pub mod order;
pub mod order_item;
pub mod product;
pub mod store;
pub mod user;
