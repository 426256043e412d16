use async_trait::async_trait;
use chrono::{DateTime, SecondsFormat, Utc};
use commerce_types::domain::discount::DiscountCode;
use commerce_types::domain::order::{ListResult, Order, OrderDetail, OrderFilter, Receiver};
use commerce_types::domain::order_status::{OrderStatus, OrderStatusName};
use commerce_types::domain::product::Product;
use commerce_types::ports::{
    DiscountRepository, OrderRepository, OrderStatusRepository, ProductRepository, RepoError,
};
use sqlx::sqlite::SqliteConnectOptions;
use sqlx::{FromRow, SqlitePool};
use std::str::FromStr;
use std::sync::Arc;
use tokio::sync::Mutex;
use uuid::Uuid;

/// SQLite admits one writer at a time; `write_lock` queues this process's
/// write transactions so they wait here instead of failing with SQLITE_BUSY.
#[derive(Clone)]
pub struct SqliteRepo {
    pool: SqlitePool,
    write_lock: Arc<Mutex<()>>,
}

fn db(e: impl std::fmt::Display) -> RepoError {
    RepoError::DbError(e.to_string())
}

fn is_unique_violation(e: &sqlx::Error) -> bool {
    e.as_database_error()
        .is_some_and(|d| d.is_unique_violation())
}

/// Fixed-width UTC timestamps so that string comparison in SQL is ordering.
fn ts(dt: &DateTime<Utc>) -> String {
    dt.to_rfc3339_opts(SecondsFormat::Micros, true)
}

fn opt_ts(dt: &Option<DateTime<Utc>>) -> Option<String> {
    dt.as_ref().map(ts)
}

fn parse_ts(s: &str) -> Result<DateTime<Utc>, RepoError> {
    Ok(DateTime::parse_from_rfc3339(s)
        .map_err(db)?
        .with_timezone(&Utc))
}

fn parse_opt_ts(s: Option<String>) -> Result<Option<DateTime<Utc>>, RepoError> {
    s.as_deref().map(parse_ts).transpose()
}

fn parse_id(s: &str) -> Result<Uuid, RepoError> {
    Uuid::parse_str(s).map_err(db)
}

fn parse_enum<T>(s: &str) -> Result<T, RepoError>
where
    T: FromStr<Err = anyhow::Error>,
{
    s.parse::<T>().map_err(db)
}

const DISCOUNT_COLUMNS: &str = "id, code, discount_percent, min_order_value, max_discount_amount, \
     start_date, end_date, is_active, created_at, updated_at";

#[derive(FromRow)]
struct DbDiscount {
    id: String,
    code: String,
    discount_percent: i64,
    min_order_value: i64,
    max_discount_amount: Option<i64>,
    start_date: String,
    end_date: String,
    is_active: bool,
    created_at: String,
    updated_at: String,
}

impl DbDiscount {
    fn into_discount(self) -> Result<DiscountCode, RepoError> {
        Ok(DiscountCode {
            id: parse_id(&self.id)?,
            code: self.code,
            discount_percent: u8::try_from(self.discount_percent).map_err(db)?,
            min_order_value: self.min_order_value,
            max_discount_amount: self.max_discount_amount,
            start_date: parse_ts(&self.start_date)?,
            end_date: parse_ts(&self.end_date)?,
            is_active: self.is_active,
            created_at: parse_ts(&self.created_at)?,
            updated_at: parse_ts(&self.updated_at)?,
        })
    }
}

const PRODUCT_COLUMNS: &str =
    "id, name, price, stock_quantity, images_json, created_at, updated_at";

#[derive(FromRow)]
struct DbProduct {
    id: String,
    name: String,
    price: i64,
    stock_quantity: i64,
    images_json: String,
    created_at: String,
    updated_at: String,
}

impl DbProduct {
    fn into_product(self) -> Result<Product, RepoError> {
        let images: Vec<String> = serde_json::from_str(&self.images_json).map_err(db)?;
        Ok(Product {
            id: parse_id(&self.id)?,
            name: self.name,
            price: self.price,
            stock_quantity: self.stock_quantity,
            images,
            created_at: parse_ts(&self.created_at)?,
            updated_at: parse_ts(&self.updated_at)?,
        })
    }
}

const STATUS_COLUMNS: &str = "id, name, description, color, sort_order, is_active";

#[derive(FromRow)]
struct DbStatus {
    id: String,
    name: String,
    description: String,
    color: String,
    sort_order: i64,
    is_active: bool,
}

impl DbStatus {
    fn into_status(self) -> Result<OrderStatus, RepoError> {
        Ok(OrderStatus {
            id: parse_id(&self.id)?,
            name: parse_enum::<OrderStatusName>(&self.name)?,
            description: self.description,
            color: self.color,
            sort_order: self.sort_order as i32,
            is_active: self.is_active,
        })
    }
}

const ORDER_COLUMNS: &str = "id, order_number, user_id, subtotal, shipping_fee, discount, \
     discount_code, total_price, order_status_id, payment_method, payment_status, transaction_id, \
     paid_at, delivered_at, cancelled_at, cancelled_reason, note, receiver_name, receiver_phone, \
     receiver_address, receiver_email, version, created_at, updated_at";

#[derive(FromRow)]
struct DbOrder {
    id: String,
    order_number: String,
    user_id: String,
    subtotal: i64,
    shipping_fee: i64,
    discount: i64,
    discount_code: Option<String>,
    total_price: i64,
    order_status_id: String,
    payment_method: String,
    payment_status: String,
    transaction_id: Option<String>,
    paid_at: Option<String>,
    delivered_at: Option<String>,
    cancelled_at: Option<String>,
    cancelled_reason: Option<String>,
    note: Option<String>,
    receiver_name: String,
    receiver_phone: String,
    receiver_address: String,
    receiver_email: Option<String>,
    version: i64,
    created_at: String,
    updated_at: String,
}

impl DbOrder {
    fn into_order(self) -> Result<Order, RepoError> {
        Ok(Order {
            id: parse_id(&self.id)?,
            order_number: self.order_number,
            user_id: parse_id(&self.user_id)?,
            subtotal: self.subtotal,
            shipping_fee: self.shipping_fee,
            discount: self.discount,
            discount_code: self.discount_code,
            total_price: self.total_price,
            order_status_id: parse_id(&self.order_status_id)?,
            payment_method: parse_enum(&self.payment_method)?,
            payment_status: parse_enum(&self.payment_status)?,
            transaction_id: self.transaction_id,
            paid_at: parse_opt_ts(self.paid_at)?,
            delivered_at: parse_opt_ts(self.delivered_at)?,
            cancelled_at: parse_opt_ts(self.cancelled_at)?,
            cancelled_reason: self.cancelled_reason,
            note: self.note,
            receiver: Receiver {
                receiver_name: self.receiver_name,
                receiver_phone: self.receiver_phone,
                receiver_address: self.receiver_address,
                receiver_email: self.receiver_email,
            },
            version: self.version,
            created_at: parse_ts(&self.created_at)?,
            updated_at: parse_ts(&self.updated_at)?,
        })
    }
}

const DETAIL_COLUMNS: &str = "id, order_id, product_id, product_name, product_image, quantity, \
     price, total_price, discount, note";

#[derive(FromRow)]
struct DbDetail {
    id: String,
    order_id: String,
    product_id: String,
    product_name: String,
    product_image: Option<String>,
    quantity: i64,
    price: i64,
    total_price: i64,
    discount: i64,
    note: Option<String>,
}

impl DbDetail {
    fn into_detail(self) -> Result<OrderDetail, RepoError> {
        Ok(OrderDetail {
            id: parse_id(&self.id)?,
            order_id: parse_id(&self.order_id)?,
            product_id: parse_id(&self.product_id)?,
            product_name: self.product_name,
            product_image: self.product_image,
            quantity: u32::try_from(self.quantity).map_err(db)?,
            price: self.price,
            total_price: self.total_price,
            discount: self.discount,
            note: self.note,
        })
    }
}

impl SqliteRepo {
    pub async fn new(database_url: &str) -> anyhow::Result<Self> {
        // Ensure on-disk SQLite target directory exists (no-op for in-memory).
        if let Some(path) = database_url.strip_prefix("sqlite://") {
            if path != ":memory:" {
                let p = std::path::Path::new(path);
                if let Some(parent) = p.parent() {
                    if !parent.as_os_str().is_empty() {
                        tokio::fs::create_dir_all(parent).await?;
                    }
                }
            }
        }

        let options = SqliteConnectOptions::from_str(database_url)?
            .create_if_missing(true)
            .foreign_keys(true);

        let pool = SqlitePool::connect_with(options).await?;

        let ddl = include_str!("../migrations/0001_init.sql");
        for statement in ddl.split(';').map(str::trim).filter(|s| !s.is_empty()) {
            sqlx::query(statement).execute(&pool).await?;
        }
        tracing::debug!(database_url, "sqlite schema ready");

        Ok(Self {
            pool,
            write_lock: Arc::new(Mutex::new(())),
        })
    }

    async fn fetch_order(&self, id: Uuid) -> Result<Option<Order>, RepoError> {
        let sql = format!("SELECT {ORDER_COLUMNS} FROM orders WHERE id = ?");
        let row: Option<DbOrder> = sqlx::query_as(&sql)
            .bind(id.to_string())
            .fetch_optional(&self.pool)
            .await
            .map_err(db)?;
        row.map(|r| r.into_order()).transpose()
    }
}

#[async_trait]
impl DiscountRepository for SqliteRepo {
    async fn create_discount(&self, discount: DiscountCode) -> Result<DiscountCode, RepoError> {
        let res = sqlx::query(
            "INSERT INTO discount_codes (id, code, discount_percent, min_order_value,
                 max_discount_amount, start_date, end_date, is_active, created_at, updated_at)
             VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?)",
        )
        .bind(discount.id.to_string())
        .bind(&discount.code)
        .bind(discount.discount_percent as i64)
        .bind(discount.min_order_value)
        .bind(discount.max_discount_amount)
        .bind(ts(&discount.start_date))
        .bind(ts(&discount.end_date))
        .bind(discount.is_active)
        .bind(ts(&discount.created_at))
        .bind(ts(&discount.updated_at))
        .execute(&self.pool)
        .await;
        match res {
            Ok(_) => Ok(discount),
            Err(e) if is_unique_violation(&e) => Err(RepoError::Duplicate(discount.code)),
            Err(e) => Err(db(e)),
        }
    }

    async fn get_discount(&self, id: Uuid) -> Result<Option<DiscountCode>, RepoError> {
        let sql = format!("SELECT {DISCOUNT_COLUMNS} FROM discount_codes WHERE id = ?");
        let row: Option<DbDiscount> = sqlx::query_as(&sql)
            .bind(id.to_string())
            .fetch_optional(&self.pool)
            .await
            .map_err(db)?;
        row.map(|r| r.into_discount()).transpose()
    }

    async fn find_discount_by_code(&self, code: &str) -> Result<Option<DiscountCode>, RepoError> {
        let sql = format!("SELECT {DISCOUNT_COLUMNS} FROM discount_codes WHERE code = ?");
        let row: Option<DbDiscount> = sqlx::query_as(&sql)
            .bind(code)
            .fetch_optional(&self.pool)
            .await
            .map_err(db)?;
        row.map(|r| r.into_discount()).transpose()
    }

    async fn list_discounts(&self) -> Result<Vec<DiscountCode>, RepoError> {
        let sql = format!("SELECT {DISCOUNT_COLUMNS} FROM discount_codes ORDER BY created_at DESC");
        let rows: Vec<DbDiscount> = sqlx::query_as(&sql)
            .fetch_all(&self.pool)
            .await
            .map_err(db)?;
        rows.into_iter().map(|r| r.into_discount()).collect()
    }

    async fn list_active_discounts(
        &self,
        now: DateTime<Utc>,
    ) -> Result<Vec<DiscountCode>, RepoError> {
        let sql = format!(
            "SELECT {DISCOUNT_COLUMNS} FROM discount_codes
             WHERE is_active = 1 AND start_date <= ? AND end_date >= ?
             ORDER BY end_date"
        );
        let now = ts(&now);
        let rows: Vec<DbDiscount> = sqlx::query_as(&sql)
            .bind(&now)
            .bind(&now)
            .fetch_all(&self.pool)
            .await
            .map_err(db)?;
        rows.into_iter().map(|r| r.into_discount()).collect()
    }

    async fn update_discount(
        &self,
        discount: DiscountCode,
    ) -> Result<Option<DiscountCode>, RepoError> {
        let res = sqlx::query(
            "UPDATE discount_codes SET code = ?, discount_percent = ?, min_order_value = ?,
                 max_discount_amount = ?, start_date = ?, end_date = ?, is_active = ?,
                 updated_at = ?
             WHERE id = ?",
        )
        .bind(&discount.code)
        .bind(discount.discount_percent as i64)
        .bind(discount.min_order_value)
        .bind(discount.max_discount_amount)
        .bind(ts(&discount.start_date))
        .bind(ts(&discount.end_date))
        .bind(discount.is_active)
        .bind(ts(&discount.updated_at))
        .bind(discount.id.to_string())
        .execute(&self.pool)
        .await;
        match res {
            Ok(r) if r.rows_affected() == 0 => Ok(None),
            Ok(_) => Ok(Some(discount)),
            Err(e) if is_unique_violation(&e) => Err(RepoError::Duplicate(discount.code)),
            Err(e) => Err(db(e)),
        }
    }
}

#[async_trait]
impl ProductRepository for SqliteRepo {
    async fn create_product(&self, product: Product) -> Result<Product, RepoError> {
        let images_json = serde_json::to_string(&product.images).map_err(db)?;
        sqlx::query(
            "INSERT INTO products
                 (id, name, price, stock_quantity, images_json, created_at, updated_at)
             VALUES (?, ?, ?, ?, ?, ?, ?)",
        )
        .bind(product.id.to_string())
        .bind(&product.name)
        .bind(product.price)
        .bind(product.stock_quantity)
        .bind(images_json)
        .bind(ts(&product.created_at))
        .bind(ts(&product.updated_at))
        .execute(&self.pool)
        .await
        .map_err(db)?;
        Ok(product)
    }

    async fn get_product(&self, id: Uuid) -> Result<Option<Product>, RepoError> {
        let sql = format!("SELECT {PRODUCT_COLUMNS} FROM products WHERE id = ?");
        let row: Option<DbProduct> = sqlx::query_as(&sql)
            .bind(id.to_string())
            .fetch_optional(&self.pool)
            .await
            .map_err(db)?;
        row.map(|r| r.into_product()).transpose()
    }

    async fn list_products(&self) -> Result<Vec<Product>, RepoError> {
        let sql = format!("SELECT {PRODUCT_COLUMNS} FROM products ORDER BY name");
        let rows: Vec<DbProduct> = sqlx::query_as(&sql)
            .fetch_all(&self.pool)
            .await
            .map_err(db)?;
        rows.into_iter().map(|r| r.into_product()).collect()
    }
}

#[async_trait]
impl OrderStatusRepository for SqliteRepo {
    async fn upsert_status(&self, status: OrderStatus) -> Result<OrderStatus, RepoError> {
        sqlx::query(
            "INSERT INTO order_statuses (id, name, description, color, sort_order, is_active)
             VALUES (?, ?, ?, ?, ?, ?)
             ON CONFLICT(name) DO UPDATE SET
                 description = excluded.description,
                 color = excluded.color,
                 sort_order = excluded.sort_order,
                 is_active = excluded.is_active",
        )
        .bind(status.id.to_string())
        .bind(status.name.as_str())
        .bind(&status.description)
        .bind(&status.color)
        .bind(status.sort_order as i64)
        .bind(status.is_active)
        .execute(&self.pool)
        .await
        .map_err(db)?;
        self.find_status_by_name(status.name)
            .await?
            .ok_or_else(|| {
                RepoError::DbError(format!("status {} vanished after upsert", status.name))
            })
    }

    async fn get_status(&self, id: Uuid) -> Result<Option<OrderStatus>, RepoError> {
        let sql = format!("SELECT {STATUS_COLUMNS} FROM order_statuses WHERE id = ?");
        let row: Option<DbStatus> = sqlx::query_as(&sql)
            .bind(id.to_string())
            .fetch_optional(&self.pool)
            .await
            .map_err(db)?;
        row.map(|r| r.into_status()).transpose()
    }

    async fn find_status_by_name(
        &self,
        name: OrderStatusName,
    ) -> Result<Option<OrderStatus>, RepoError> {
        let sql = format!("SELECT {STATUS_COLUMNS} FROM order_statuses WHERE name = ?");
        let row: Option<DbStatus> = sqlx::query_as(&sql)
            .bind(name.as_str())
            .fetch_optional(&self.pool)
            .await
            .map_err(db)?;
        row.map(|r| r.into_status()).transpose()
    }

    async fn list_statuses(&self) -> Result<Vec<OrderStatus>, RepoError> {
        let sql = format!("SELECT {STATUS_COLUMNS} FROM order_statuses ORDER BY sort_order");
        let rows: Vec<DbStatus> = sqlx::query_as(&sql)
            .fetch_all(&self.pool)
            .await
            .map_err(db)?;
        rows.into_iter().map(|r| r.into_status()).collect()
    }
}

#[async_trait]
impl OrderRepository for SqliteRepo {
    async fn place_order(
        &self,
        mut order: Order,
        details: Vec<OrderDetail>,
    ) -> Result<Order, RepoError> {
        let _writer = self.write_lock.lock().await;
        // Dropping `tx` on any early return rolls everything back.
        let mut tx = self.pool.begin().await.map_err(db)?;
        let now = ts(&Utc::now());

        for d in &details {
            let qty = d.quantity as i64;
            let res = sqlx::query(
                "UPDATE products SET stock_quantity = stock_quantity - ?, updated_at = ?
                 WHERE id = ? AND stock_quantity >= ?",
            )
            .bind(qty)
            .bind(&now)
            .bind(d.product_id.to_string())
            .bind(qty)
            .execute(&mut *tx)
            .await
            .map_err(db)?;
            if res.rows_affected() == 0 {
                let lookup = "SELECT id FROM products WHERE id = ?";
                let exists: Option<(String,)> = sqlx::query_as(lookup)
                    .bind(d.product_id.to_string())
                    .fetch_optional(&mut *tx)
                    .await
                    .map_err(db)?;
                return Err(match exists {
                    Some(_) => RepoError::InsufficientStock(d.product_id),
                    None => RepoError::ProductNotFound(d.product_id),
                });
            }
        }

        let (seq,): (i64,) = sqlx::query_as(
            "INSERT INTO order_counters (day, seq) VALUES (?, 1)
             ON CONFLICT(day) DO UPDATE SET seq = seq + 1
             RETURNING seq",
        )
        .bind(order.order_day().format("%Y-%m-%d").to_string())
        .fetch_one(&mut *tx)
        .await
        .map_err(db)?;
        let seq = u32::try_from(seq).map_err(db)?;
        order.assign_number(seq);

        let insert = format!(
            "INSERT INTO orders ({ORDER_COLUMNS})
             VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)"
        );
        sqlx::query(&insert)
            .bind(order.id.to_string())
            .bind(&order.order_number)
            .bind(order.user_id.to_string())
            .bind(order.subtotal)
            .bind(order.shipping_fee)
            .bind(order.discount)
            .bind(&order.discount_code)
            .bind(order.total_price)
            .bind(order.order_status_id.to_string())
            .bind(order.payment_method.as_str())
            .bind(order.payment_status.as_str())
            .bind(&order.transaction_id)
            .bind(opt_ts(&order.paid_at))
            .bind(opt_ts(&order.delivered_at))
            .bind(opt_ts(&order.cancelled_at))
            .bind(&order.cancelled_reason)
            .bind(&order.note)
            .bind(&order.receiver.receiver_name)
            .bind(&order.receiver.receiver_phone)
            .bind(&order.receiver.receiver_address)
            .bind(&order.receiver.receiver_email)
            .bind(order.version)
            .bind(ts(&order.created_at))
            .bind(ts(&order.updated_at))
            .execute(&mut *tx)
            .await
            .map_err(db)?;

        for (position, d) in details.iter().enumerate() {
            sqlx::query(
                "INSERT INTO order_details (id, order_id, position, product_id, product_name,
                     product_image, quantity, price, total_price, discount, note)
                 VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)",
            )
            .bind(d.id.to_string())
            .bind(order.id.to_string())
            .bind(position as i64)
            .bind(d.product_id.to_string())
            .bind(&d.product_name)
            .bind(&d.product_image)
            .bind(d.quantity as i64)
            .bind(d.price)
            .bind(d.total_price)
            .bind(d.discount)
            .bind(&d.note)
            .execute(&mut *tx)
            .await
            .map_err(db)?;
        }

        tx.commit().await.map_err(db)?;
        Ok(order)
    }

    async fn get_order(&self, id: Uuid) -> Result<Option<Order>, RepoError> {
        self.fetch_order(id).await
    }

    async fn order_details(&self, order_id: Uuid) -> Result<Vec<OrderDetail>, RepoError> {
        let sql = format!(
            "SELECT {DETAIL_COLUMNS} FROM order_details WHERE order_id = ? ORDER BY position"
        );
        let rows: Vec<DbDetail> = sqlx::query_as(&sql)
            .bind(order_id.to_string())
            .fetch_all(&self.pool)
            .await
            .map_err(db)?;
        rows.into_iter().map(|r| r.into_detail()).collect()
    }

    async fn list_orders(&self, filter: OrderFilter) -> Result<ListResult<Order>, RepoError> {
        let user = filter.user_id.map(|u| u.to_string());
        let status = filter.order_status_id.map(|s| s.to_string());
        let predicate = "(? IS NULL OR user_id = ?) AND (? IS NULL OR order_status_id = ?)";

        let (total,): (i64,) =
            sqlx::query_as(&format!("SELECT COUNT(*) FROM orders WHERE {predicate}"))
                .bind(&user)
                .bind(&user)
                .bind(&status)
                .bind(&status)
                .fetch_one(&self.pool)
                .await
                .map_err(db)?;

        let sql = format!(
            "SELECT {ORDER_COLUMNS} FROM orders WHERE {predicate}
             ORDER BY created_at DESC LIMIT ? OFFSET ?"
        );
        let rows: Vec<DbOrder> = sqlx::query_as(&sql)
            .bind(&user)
            .bind(&user)
            .bind(&status)
            .bind(&status)
            .bind(filter.limit as i64)
            .bind(filter.offset() as i64)
            .fetch_all(&self.pool)
            .await
            .map_err(db)?;
        let items = rows
            .into_iter()
            .map(|r| r.into_order())
            .collect::<Result<Vec<_>, _>>()?;
        Ok(ListResult {
            items,
            total,
            page: filter.page,
            limit: filter.limit,
        })
    }

    async fn update_order(
        &self,
        mut order: Order,
        expected_version: i64,
        restock: bool,
    ) -> Result<Order, RepoError> {
        let _writer = self.write_lock.lock().await;
        let mut tx = self.pool.begin().await.map_err(db)?;

        let res = sqlx::query(
            "UPDATE orders SET order_status_id = ?, payment_status = ?, transaction_id = ?,
                 paid_at = ?, delivered_at = ?, cancelled_at = ?, cancelled_reason = ?, note = ?,
                 updated_at = ?, version = version + 1
             WHERE id = ? AND version = ?",
        )
        .bind(order.order_status_id.to_string())
        .bind(order.payment_status.as_str())
        .bind(&order.transaction_id)
        .bind(opt_ts(&order.paid_at))
        .bind(opt_ts(&order.delivered_at))
        .bind(opt_ts(&order.cancelled_at))
        .bind(&order.cancelled_reason)
        .bind(&order.note)
        .bind(ts(&order.updated_at))
        .bind(order.id.to_string())
        .bind(expected_version)
        .execute(&mut *tx)
        .await
        .map_err(db)?;
        if res.rows_affected() == 0 {
            return Err(RepoError::StaleOrder(order.id));
        }

        if restock {
            sqlx::query(
                "UPDATE products SET
                     stock_quantity = stock_quantity + (
                         SELECT SUM(d.quantity) FROM order_details d
                         WHERE d.order_id = ? AND d.product_id = products.id
                     ),
                     updated_at = ?
                 WHERE id IN (SELECT product_id FROM order_details WHERE order_id = ?)",
            )
            .bind(order.id.to_string())
            .bind(ts(&Utc::now()))
            .bind(order.id.to_string())
            .execute(&mut *tx)
            .await
            .map_err(db)?;
        }

        tx.commit().await.map_err(db)?;
        order.version = expected_version + 1;
        Ok(order)
    }
}
