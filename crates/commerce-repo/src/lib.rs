#[cfg(not(any(feature = "memory", feature = "sqlite")))]
compile_error!("Enable a repo feature: `memory` or `sqlite`.");

use chrono::{DateTime, Utc};
use commerce_types::domain::discount::DiscountCode;
use commerce_types::domain::order::{ListResult, Order, OrderDetail, OrderFilter};
use commerce_types::domain::order_status::{OrderStatus, OrderStatusName};
use commerce_types::domain::product::Product;
use commerce_types::ports::{
    DiscountRepository, OrderRepository, OrderStatusRepository, ProductRepository, RepoError,
};
use uuid::Uuid;

#[cfg(feature = "memory")]
pub mod memory;
#[cfg(feature = "sqlite")]
pub mod sqlite;

/// Storage selected at startup.
#[derive(Clone)]
pub enum Repo {
    #[cfg(feature = "memory")]
    Memory(memory::InMemoryRepo),
    #[cfg(feature = "sqlite")]
    Sqlite(sqlite::SqliteRepo),
}

pub async fn build_repo(url: Option<&str>) -> anyhow::Result<Repo> {
    Repo::build_repo(url).await
}

impl Repo {
    #[cfg(all(feature = "memory", not(feature = "sqlite")))]
    pub async fn build_repo(url: Option<&str>) -> anyhow::Result<Self> {
        if let Some(url) = url {
            tracing::warn!(url, "sqlite support not compiled in; using in-memory store");
        }
        Ok(Self::Memory(memory::InMemoryRepo::new()))
    }

    #[cfg(all(feature = "sqlite", not(feature = "memory")))]
    pub async fn build_repo(database_url: Option<&str>) -> anyhow::Result<Self> {
        let url = database_url.unwrap_or("sqlite://commerce.db");
        Ok(Self::Sqlite(sqlite::SqliteRepo::new(url).await?))
    }

    // If both features are enabled, an explicit url picks sqlite.
    #[cfg(all(feature = "sqlite", feature = "memory"))]
    pub async fn build_repo(database_url: Option<&str>) -> anyhow::Result<Self> {
        match database_url {
            Some(url) => Ok(Self::Sqlite(sqlite::SqliteRepo::new(url).await?)),
            None => Ok(Self::Memory(memory::InMemoryRepo::new())),
        }
    }

    pub fn backend(&self) -> &'static str {
        match self {
            #[cfg(feature = "memory")]
            Repo::Memory(_) => "memory",
            #[cfg(feature = "sqlite")]
            Repo::Sqlite(_) => "sqlite",
        }
    }
}

macro_rules! dispatch {
    ($self:ident . $method:ident ( $($arg:expr),* )) => {
        match $self {
            #[cfg(feature = "memory")]
            Repo::Memory(r) => r.$method($($arg),*).await,
            #[cfg(feature = "sqlite")]
            Repo::Sqlite(r) => r.$method($($arg),*).await,
        }
    };
}

#[async_trait::async_trait]
impl DiscountRepository for Repo {
    async fn create_discount(&self, discount: DiscountCode) -> Result<DiscountCode, RepoError> {
        dispatch!(self.create_discount(discount))
    }

    async fn get_discount(&self, id: Uuid) -> Result<Option<DiscountCode>, RepoError> {
        dispatch!(self.get_discount(id))
    }

    async fn find_discount_by_code(&self, code: &str) -> Result<Option<DiscountCode>, RepoError> {
        dispatch!(self.find_discount_by_code(code))
    }

    async fn list_discounts(&self) -> Result<Vec<DiscountCode>, RepoError> {
        dispatch!(self.list_discounts())
    }

    async fn list_active_discounts(
        &self,
        now: DateTime<Utc>,
    ) -> Result<Vec<DiscountCode>, RepoError> {
        dispatch!(self.list_active_discounts(now))
    }

    async fn update_discount(
        &self,
        discount: DiscountCode,
    ) -> Result<Option<DiscountCode>, RepoError> {
        dispatch!(self.update_discount(discount))
    }
}

#[async_trait::async_trait]
impl ProductRepository for Repo {
    async fn create_product(&self, product: Product) -> Result<Product, RepoError> {
        dispatch!(self.create_product(product))
    }

    async fn get_product(&self, id: Uuid) -> Result<Option<Product>, RepoError> {
        dispatch!(self.get_product(id))
    }

    async fn list_products(&self) -> Result<Vec<Product>, RepoError> {
        dispatch!(self.list_products())
    }
}

#[async_trait::async_trait]
impl OrderStatusRepository for Repo {
    async fn upsert_status(&self, status: OrderStatus) -> Result<OrderStatus, RepoError> {
        dispatch!(self.upsert_status(status))
    }

    async fn get_status(&self, id: Uuid) -> Result<Option<OrderStatus>, RepoError> {
        dispatch!(self.get_status(id))
    }

    async fn find_status_by_name(
        &self,
        name: OrderStatusName,
    ) -> Result<Option<OrderStatus>, RepoError> {
        dispatch!(self.find_status_by_name(name))
    }

    async fn list_statuses(&self) -> Result<Vec<OrderStatus>, RepoError> {
        dispatch!(self.list_statuses())
    }
}

#[async_trait::async_trait]
impl OrderRepository for Repo {
    async fn place_order(
        &self,
        order: Order,
        details: Vec<OrderDetail>,
    ) -> Result<Order, RepoError> {
        dispatch!(self.place_order(order, details))
    }

    async fn get_order(&self, id: Uuid) -> Result<Option<Order>, RepoError> {
        dispatch!(self.get_order(id))
    }

    async fn order_details(&self, order_id: Uuid) -> Result<Vec<OrderDetail>, RepoError> {
        dispatch!(self.order_details(order_id))
    }

    async fn list_orders(&self, filter: OrderFilter) -> Result<ListResult<Order>, RepoError> {
        dispatch!(self.list_orders(filter))
    }

    async fn update_order(
        &self,
        order: Order,
        expected_version: i64,
        restock: bool,
    ) -> Result<Order, RepoError> {
        dispatch!(self.update_order(order, expected_version, restock))
    }
}
