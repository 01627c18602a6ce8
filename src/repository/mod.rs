//! # Order Repository
//!
//! Persistence contract consumed by the order service. Every write for one
//! order (order row, delivery, payment, items) is atomic: all sub-records or
//! none.

#[cfg(feature = "postgres")]
pub mod postgres;

use async_trait::async_trait;

use crate::error::Result;
use crate::models::Order;

#[cfg(feature = "postgres")]
pub use postgres::PostgresOrderRepository;

#[async_trait]
pub trait OrderRepository: Send + Sync + std::fmt::Debug {
    /// Insert the aggregate, replacing any existing order with the same uid
    async fn create(&self, order: &Order) -> Result<()>;

    /// Fetch the aggregate; `Ok(None)` when no order has this uid
    async fn get_by_uid(&self, order_uid: &str) -> Result<Option<Order>>;

    /// Every stored aggregate, newest `date_created` first
    async fn list_all(&self) -> Result<Vec<Order>>;

    /// Upsert the aggregate
    async fn update(&self, order: &Order) -> Result<()>;

    /// Remove the aggregate and its sub-records
    async fn delete(&self, order_uid: &str) -> Result<()>;
}
