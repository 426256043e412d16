use async_trait::async_trait;
use chrono::{DateTime, NaiveDate, Utc};
use commerce_types::domain::discount::DiscountCode;
use commerce_types::domain::order::{ListResult, Order, OrderDetail, OrderFilter};
use commerce_types::domain::order_status::{OrderStatus, OrderStatusName};
use commerce_types::domain::product::Product;
use commerce_types::ports::{
    DiscountRepository, OrderRepository, OrderStatusRepository, ProductRepository, RepoError,
};
use dashmap::DashMap;
use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard};
use uuid::Uuid;

/// DashMap-backed store. Multi-record writes (placing, restocking, unique
/// codes, status upserts) run under `write_lock` so they are all-or-nothing.
#[derive(Clone)]
pub struct InMemoryRepo {
    discounts: Arc<DashMap<Uuid, DiscountCode>>,
    products: Arc<DashMap<Uuid, Product>>,
    statuses: Arc<DashMap<Uuid, OrderStatus>>,
    orders: Arc<DashMap<Uuid, Order>>,
    details: Arc<DashMap<Uuid, Vec<OrderDetail>>>,
    day_counters: Arc<DashMap<NaiveDate, u32>>,
    write_lock: Arc<Mutex<()>>,
}

impl InMemoryRepo {
    pub fn new() -> Self {
        Self {
            discounts: Arc::new(DashMap::new()),
            products: Arc::new(DashMap::new()),
            statuses: Arc::new(DashMap::new()),
            orders: Arc::new(DashMap::new()),
            details: Arc::new(DashMap::new()),
            day_counters: Arc::new(DashMap::new()),
            write_lock: Arc::new(Mutex::new(())),
        }
    }

    fn lock(&self) -> Result<MutexGuard<'_, ()>, RepoError> {
        self.write_lock
            .lock()
            .map_err(|_| RepoError::DbError("write lock poisoned".into()))
    }

    fn code_taken(&self, code: &str, except: Option<Uuid>) -> bool {
        self.discounts
            .iter()
            .any(|kv| kv.code == code && Some(kv.id) != except)
    }

    fn save_discount_locked(
        &self,
        discount: DiscountCode,
        insert: bool,
    ) -> Result<Option<DiscountCode>, RepoError> {
        let _guard = self.lock()?;
        if !insert && !self.discounts.contains_key(&discount.id) {
            return Ok(None);
        }
        let except = if insert { None } else { Some(discount.id) };
        if self.code_taken(&discount.code, except) {
            return Err(RepoError::Duplicate(discount.code));
        }
        self.discounts.insert(discount.id, discount.clone());
        Ok(Some(discount))
    }

    fn upsert_status_locked(&self, status: OrderStatus) -> Result<OrderStatus, RepoError> {
        let _guard = self.lock()?;
        let existing = self
            .statuses
            .iter()
            .find(|kv| kv.name == status.name)
            .map(|kv| kv.id);
        let stored = OrderStatus {
            id: existing.unwrap_or(status.id),
            ..status
        };
        self.statuses.insert(stored.id, stored.clone());
        Ok(stored)
    }

    fn place_order_locked(
        &self,
        mut order: Order,
        details: Vec<OrderDetail>,
    ) -> Result<Order, RepoError> {
        let _guard = self.lock()?;

        let mut wanted: HashMap<Uuid, i64> = HashMap::new();
        for d in &details {
            *wanted.entry(d.product_id).or_default() += d.quantity as i64;
        }
        for (product_id, qty) in &wanted {
            let product = self
                .products
                .get(product_id)
                .ok_or(RepoError::ProductNotFound(*product_id))?;
            if product.stock_quantity < *qty {
                return Err(RepoError::InsufficientStock(*product_id));
            }
        }

        let now = Utc::now();
        for (product_id, qty) in &wanted {
            if let Some(mut product) = self.products.get_mut(product_id) {
                product.stock_quantity -= qty;
                product.updated_at = now;
            }
        }

        let seq = {
            let mut counter = self.day_counters.entry(order.order_day()).or_insert(0);
            *counter += 1;
            *counter
        };
        order.assign_number(seq);

        self.orders.insert(order.id, order.clone());
        self.details.insert(order.id, details);
        Ok(order)
    }

    fn update_order_locked(
        &self,
        mut order: Order,
        expected_version: i64,
        restock: bool,
    ) -> Result<Order, RepoError> {
        let _guard = self.lock()?;

        let mut stored = self
            .orders
            .get_mut(&order.id)
            .ok_or(RepoError::StaleOrder(order.id))?;
        if stored.version != expected_version {
            return Err(RepoError::StaleOrder(order.id));
        }

        if restock {
            let now = Utc::now();
            if let Some(lines) = self.details.get(&order.id) {
                for line in lines.iter() {
                    if let Some(mut product) = self.products.get_mut(&line.product_id) {
                        product.stock_quantity += line.quantity as i64;
                        product.updated_at = now;
                    }
                }
            }
        }

        order.version = expected_version + 1;
        *stored = order.clone();
        Ok(order)
    }
}

impl Default for InMemoryRepo {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl DiscountRepository for InMemoryRepo {
    async fn create_discount(&self, discount: DiscountCode) -> Result<DiscountCode, RepoError> {
        self.save_discount_locked(discount.clone(), true)?;
        Ok(discount)
    }

    async fn get_discount(&self, id: Uuid) -> Result<Option<DiscountCode>, RepoError> {
        Ok(self.discounts.get(&id).map(|r| r.clone()))
    }

    async fn find_discount_by_code(&self, code: &str) -> Result<Option<DiscountCode>, RepoError> {
        Ok(self
            .discounts
            .iter()
            .find(|kv| kv.code == code)
            .map(|kv| kv.value().clone()))
    }

    async fn list_discounts(&self) -> Result<Vec<DiscountCode>, RepoError> {
        let mut all: Vec<DiscountCode> = self
            .discounts
            .iter()
            .map(|kv| kv.value().clone())
            .collect();
        all.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        Ok(all)
    }

    async fn list_active_discounts(
        &self,
        now: DateTime<Utc>,
    ) -> Result<Vec<DiscountCode>, RepoError> {
        let mut active: Vec<DiscountCode> = self
            .discounts
            .iter()
            .filter(|kv| kv.is_applicable(now))
            .map(|kv| kv.value().clone())
            .collect();
        active.sort_by(|a, b| a.end_date.cmp(&b.end_date));
        Ok(active)
    }

    async fn update_discount(
        &self,
        discount: DiscountCode,
    ) -> Result<Option<DiscountCode>, RepoError> {
        self.save_discount_locked(discount, false)
    }
}

#[async_trait]
impl ProductRepository for InMemoryRepo {
    async fn create_product(&self, product: Product) -> Result<Product, RepoError> {
        self.products.insert(product.id, product.clone());
        Ok(product)
    }

    async fn get_product(&self, id: Uuid) -> Result<Option<Product>, RepoError> {
        Ok(self.products.get(&id).map(|r| r.clone()))
    }

    async fn list_products(&self) -> Result<Vec<Product>, RepoError> {
        let mut all: Vec<Product> = self
            .products
            .iter()
            .map(|kv| kv.value().clone())
            .collect();
        all.sort_by(|a, b| a.name.cmp(&b.name));
        Ok(all)
    }
}

#[async_trait]
impl OrderStatusRepository for InMemoryRepo {
    async fn upsert_status(&self, status: OrderStatus) -> Result<OrderStatus, RepoError> {
        self.upsert_status_locked(status)
    }

    async fn get_status(&self, id: Uuid) -> Result<Option<OrderStatus>, RepoError> {
        Ok(self.statuses.get(&id).map(|r| r.clone()))
    }

    async fn find_status_by_name(
        &self,
        name: OrderStatusName,
    ) -> Result<Option<OrderStatus>, RepoError> {
        Ok(self
            .statuses
            .iter()
            .find(|kv| kv.name == name)
            .map(|kv| kv.value().clone()))
    }

    async fn list_statuses(&self) -> Result<Vec<OrderStatus>, RepoError> {
        let mut all: Vec<OrderStatus> = self
            .statuses
            .iter()
            .map(|kv| kv.value().clone())
            .collect();
        all.sort_by_key(|s| s.sort_order);
        Ok(all)
    }
}

#[async_trait]
impl OrderRepository for InMemoryRepo {
    async fn place_order(
        &self,
        order: Order,
        details: Vec<OrderDetail>,
    ) -> Result<Order, RepoError> {
        self.place_order_locked(order, details)
    }

    async fn get_order(&self, id: Uuid) -> Result<Option<Order>, RepoError> {
        Ok(self.orders.get(&id).map(|r| r.clone()))
    }

    async fn order_details(&self, order_id: Uuid) -> Result<Vec<OrderDetail>, RepoError> {
        Ok(self
            .details
            .get(&order_id)
            .map(|r| r.clone())
            .unwrap_or_default())
    }

    async fn list_orders(&self, filter: OrderFilter) -> Result<ListResult<Order>, RepoError> {
        let status = filter.order_status_id;
        let mut matching: Vec<Order> = self
            .orders
            .iter()
            .filter(|kv| filter.user_id.map_or(true, |u| kv.user_id == u))
            .filter(|kv| status.map_or(true, |s| kv.order_status_id == s))
            .map(|kv| kv.value().clone())
            .collect();
        matching.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        let total = matching.len() as i64;
        let items = matching
            .into_iter()
            .skip(filter.offset())
            .take(filter.limit as usize)
            .collect();
        Ok(ListResult {
            items,
            total,
            page: filter.page,
            limit: filter.limit,
        })
    }

    async fn update_order(
        &self,
        order: Order,
        expected_version: i64,
        restock: bool,
    ) -> Result<Order, RepoError> {
        self.update_order_locked(order, expected_version, restock)
    }
}
