use async_trait::async_trait;
use uuid::Uuid;

use super::RepoError;
use crate::domain::order::{ListResult, Order, OrderDetail, OrderFilter};

#[async_trait]
pub trait OrderRepository: Send + Sync + 'static {
    /// Single unit of work: decrements stock for every line (failing with
    /// `InsufficientStock` instead of going negative), takes the next
    /// same-day sequence, stores the order and its details. Nothing is
    /// persisted on failure. Returns the order with its number assigned.
    async fn place_order(
        &self,
        order: Order,
        details: Vec<OrderDetail>,
    ) -> Result<Order, RepoError>;
    async fn get_order(&self, id: Uuid) -> Result<Option<Order>, RepoError>;
    async fn order_details(&self, order_id: Uuid) -> Result<Vec<OrderDetail>, RepoError>;
    /// Newest first.
    async fn list_orders(&self, filter: OrderFilter) -> Result<ListResult<Order>, RepoError>;
    /// Writes `order` only if the stored version still equals
    /// `expected_version`, otherwise `StaleOrder`. With `restock` the ordered
    /// quantities go back to their products in the same write.
    async fn update_order(
        &self,
        order: Order,
        expected_version: i64,
        restock: bool,
    ) -> Result<Order, RepoError>;
}
