use async_trait::async_trait;
use chrono::{DateTime, Utc};
use uuid::Uuid;

use super::RepoError;
use crate::domain::discount::DiscountCode;

#[async_trait]
pub trait DiscountRepository: Send + Sync + 'static {
    /// Fails with `RepoError::Duplicate` when the code is already taken.
    async fn create_discount(&self, discount: DiscountCode) -> Result<DiscountCode, RepoError>;
    async fn get_discount(&self, id: Uuid) -> Result<Option<DiscountCode>, RepoError>;
    /// `code` must already be normalised.
    async fn find_discount_by_code(
        &self,
        code: &str,
    ) -> Result<Option<DiscountCode>, RepoError>;
    async fn list_discounts(&self) -> Result<Vec<DiscountCode>, RepoError>;
    async fn list_active_discounts(
        &self,
        now: DateTime<Utc>,
    ) -> Result<Vec<DiscountCode>, RepoError>;
    /// Replaces the stored record. `None` when the id is unknown.
    async fn update_discount(
        &self,
        discount: DiscountCode,
    ) -> Result<Option<DiscountCode>, RepoError>;
}
