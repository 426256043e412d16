use crate::errors::AppError;
use commerce_types::domain::order_status::OrderStatus;
use commerce_types::ports::OrderStatusRepository;

pub struct OrderStatusService<R: OrderStatusRepository> {
    repo: R,
}

impl<R: OrderStatusRepository> OrderStatusService<R> {
    pub fn new(repo: R) -> Self {
        Self { repo }
    }

    /// Upserts every workflow status by name. Safe to run on every start.
    pub async fn seed_defaults(&self) -> Result<Vec<OrderStatus>, AppError> {
        let mut seeded = Vec::new();
        for status in OrderStatus::seed() {
            seeded.push(self.repo.upsert_status(status).await?);
        }
        tracing::info!(count = seeded.len(), "order statuses seeded");
        Ok(seeded)
    }

    pub async fn list_statuses(&self) -> Result<Vec<OrderStatus>, AppError> {
        Ok(self.repo.list_statuses().await?)
    }
}
