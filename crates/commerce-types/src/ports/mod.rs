pub mod discount_repository;
pub mod order_repository;
pub mod order_status_repository;
pub mod product_repository;

use uuid::Uuid;

pub use discount_repository::DiscountRepository;
pub use order_repository::OrderRepository;
pub use order_status_repository::OrderStatusRepository;
pub use product_repository::ProductRepository;

#[derive(thiserror::Error, Debug)]
pub enum RepoError {
    #[error("db error: {0}")]
    DbError(String),
    #[error("duplicate value: {0}")]
    Duplicate(String),
    #[error("product {0} not found")]
    ProductNotFound(Uuid),
    #[error("insufficient stock for product {0}")]
    InsufficientStock(Uuid),
    #[error("order {0} was modified concurrently")]
    StaleOrder(Uuid),
}

/// Everything the application services need from storage.
pub trait CommerceRepository:
    DiscountRepository + OrderRepository + OrderStatusRepository + ProductRepository
{
}

impl<T> CommerceRepository for T where
    T: DiscountRepository + OrderRepository + OrderStatusRepository + ProductRepository
{
}
