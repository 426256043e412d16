pub mod catalog_service;
pub mod discount_service;
pub mod order_service;
pub mod order_status_service;

use commerce_types::ports::CommerceRepository;
use std::sync::Arc;

use self::catalog_service::CatalogService;
use self::discount_service::DiscountService;
use self::order_service::OrderService;
use self::order_status_service::OrderStatusService;

/// All application services over one shared repository.
pub struct CommerceServices<R: CommerceRepository> {
    pub discounts: Arc<DiscountService<R>>,
    pub orders: Arc<OrderService<R>>,
    pub statuses: Arc<OrderStatusService<R>>,
    pub catalog: Arc<CatalogService<R>>,
}

impl<R: CommerceRepository + Clone> CommerceServices<R> {
    pub fn new(repo: R) -> Self {
        Self {
            discounts: Arc::new(DiscountService::new(repo.clone())),
            orders: Arc::new(OrderService::new(repo.clone())),
            statuses: Arc::new(OrderStatusService::new(repo.clone())),
            catalog: Arc::new(CatalogService::new(repo)),
        }
    }
}

impl<R: CommerceRepository> Clone for CommerceServices<R> {
    fn clone(&self) -> Self {
        Self {
            discounts: self.discounts.clone(),
            orders: self.orders.clone(),
            statuses: self.statuses.clone(),
            catalog: self.catalog.clone(),
        }
    }
}
