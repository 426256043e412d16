use async_trait::async_trait;
use uuid::Uuid;

use super::RepoError;
use crate::domain::order_status::{OrderStatus, OrderStatusName};

#[async_trait]
pub trait OrderStatusRepository: Send + Sync + 'static {
    /// Inserts the status or refreshes the metadata of the existing one with
    /// the same name. The stored id never changes.
    async fn upsert_status(&self, status: OrderStatus) -> Result<OrderStatus, RepoError>;
    async fn get_status(&self, id: Uuid) -> Result<Option<OrderStatus>, RepoError>;
    async fn find_status_by_name(
        &self,
        name: OrderStatusName,
    ) -> Result<Option<OrderStatus>, RepoError>;
    /// Sorted by `sort_order`.
    async fn list_statuses(&self) -> Result<Vec<OrderStatus>, RepoError>;
}
