use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use uuid::Uuid;

use crate::domain::order_status::{OrderStatus, OrderStatusName, TransitionError};
use crate::domain::product::Product;

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum PaymentMethod {
    Cod,
    BankTransfer,
    CreditCard,
    EWallet,
    Vnpay,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum PaymentStatus {
    Pending,
    Paid,
    Failed,
    Refunded,
}

#[derive(thiserror::Error, Debug, Clone, PartialEq, Eq)]
pub enum PaymentError {
    #[error("payment status cannot change from {from} to {to}")]
    NotAllowed {
        from: PaymentStatus,
        to: PaymentStatus,
    },
}

impl PaymentMethod {
    pub fn as_str(&self) -> &'static str {
        match self {
            PaymentMethod::Cod => "cod",
            PaymentMethod::BankTransfer => "bank_transfer",
            PaymentMethod::CreditCard => "credit_card",
            PaymentMethod::EWallet => "e_wallet",
            PaymentMethod::Vnpay => "vnpay",
        }
    }
}

impl FromStr for PaymentMethod {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Ok(match s {
            "cod" => PaymentMethod::Cod,
            "bank_transfer" => PaymentMethod::BankTransfer,
            "credit_card" => PaymentMethod::CreditCard,
            "e_wallet" => PaymentMethod::EWallet,
            "vnpay" => PaymentMethod::Vnpay,
            other => anyhow::bail!("unknown payment method `{other}`"),
        })
    }
}

impl PaymentStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            PaymentStatus::Pending => "pending",
            PaymentStatus::Paid => "paid",
            PaymentStatus::Failed => "failed",
            PaymentStatus::Refunded => "refunded",
        }
    }

    pub fn can_become(&self, next: PaymentStatus) -> bool {
        use PaymentStatus::*;
        matches!(
            (self, next),
            (Pending, Paid | Failed) | (Failed, Paid | Failed) | (Paid, Refunded)
        )
    }
}

impl fmt::Display for PaymentStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for PaymentStatus {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Ok(match s {
            "pending" => PaymentStatus::Pending,
            "paid" => PaymentStatus::Paid,
            "failed" => PaymentStatus::Failed,
            "refunded" => PaymentStatus::Refunded,
            other => anyhow::bail!("unknown payment status `{other}`"),
        })
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct Receiver {
    pub receiver_name: String,
    pub receiver_phone: String,
    pub receiver_address: String,
    #[serde(default)]
    pub receiver_email: Option<String>,
}

/// Line item snapshot. Name, image and price are copied from the product at
/// order time and never follow later product edits.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct OrderDetail {
    pub id: Uuid,
    pub order_id: Uuid,
    pub product_id: Uuid,
    pub product_name: String,
    pub product_image: Option<String>,
    pub quantity: u32,
    pub price: i64,
    pub total_price: i64,
    pub discount: i64,
    pub note: Option<String>,
}

impl OrderDetail {
    pub fn snapshot(
        order_id: Uuid,
        product: &Product,
        quantity: u32,
        note: Option<String>,
    ) -> anyhow::Result<Self> {
        if quantity == 0 {
            anyhow::bail!("item quantity must be > 0");
        }
        let total_price = product
            .price
            .checked_mul(quantity as i64)
            .ok_or_else(|| anyhow::anyhow!("line total overflows"))?;
        Ok(Self {
            id: Uuid::new_v4(),
            order_id,
            product_id: product.id,
            product_name: product.name.clone(),
            product_image: product.primary_image().map(str::to_owned),
            quantity,
            price: product.price,
            total_price,
            discount: 0,
            note,
        })
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct OrderTotals {
    pub subtotal: i64,
    pub shipping_fee: i64,
    pub discount: i64,
    pub total_price: i64,
}

impl OrderTotals {
    /// Server-side totals: `subtotal + shippingFee - discount`.
    pub fn compute(
        details: &[OrderDetail],
        shipping_fee: i64,
        discount: i64,
    ) -> anyhow::Result<Self> {
        if shipping_fee < 0 {
            anyhow::bail!("shippingFee must not be negative");
        }
        let subtotal = details
            .iter()
            .try_fold(0i64, |acc, d| acc.checked_add(d.total_price))
            .ok_or_else(|| anyhow::anyhow!("subtotal overflows"))?;
        if discount < 0 || discount > subtotal {
            anyhow::bail!("discount must be between 0 and the subtotal");
        }
        let total_price = subtotal
            .checked_add(shipping_fee)
            .and_then(|t| t.checked_sub(discount))
            .ok_or_else(|| anyhow::anyhow!("total overflows"))?;
        Ok(Self {
            subtotal,
            shipping_fee,
            discount,
            total_price,
        })
    }
}

pub fn format_order_number(date: NaiveDate, seq: u32) -> String {
    format!("ORD{}{seq:04}", date.format("%Y%m%d"))
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct Order {
    pub id: Uuid,
    pub order_number: String,
    pub user_id: Uuid,
    pub subtotal: i64,
    pub shipping_fee: i64,
    pub discount: i64,
    pub discount_code: Option<String>,
    pub total_price: i64,
    pub order_status_id: Uuid,
    pub payment_method: PaymentMethod,
    pub payment_status: PaymentStatus,
    pub transaction_id: Option<String>,
    pub paid_at: Option<DateTime<Utc>>,
    pub delivered_at: Option<DateTime<Utc>>,
    pub cancelled_at: Option<DateTime<Utc>>,
    pub cancelled_reason: Option<String>,
    pub note: Option<String>,
    #[serde(flatten)]
    pub receiver: Receiver,
    /// Bumped on every persisted change; writes are conditional on it.
    pub version: i64,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Order {
    /// A new pending order. `order_number` stays empty until the repository
    /// assigns the day sequence inside the placing transaction.
    pub fn new(
        user_id: Uuid,
        pending_status_id: Uuid,
        payment_method: PaymentMethod,
        receiver: Receiver,
        totals: OrderTotals,
        discount_code: Option<String>,
        note: Option<String>,
    ) -> Self {
        let now = Utc::now();
        Self {
            id: Uuid::new_v4(),
            order_number: String::new(),
            user_id,
            subtotal: totals.subtotal,
            shipping_fee: totals.shipping_fee,
            discount: totals.discount,
            discount_code,
            total_price: totals.total_price,
            order_status_id: pending_status_id,
            payment_method,
            payment_status: PaymentStatus::Pending,
            transaction_id: None,
            paid_at: None,
            delivered_at: None,
            cancelled_at: None,
            cancelled_reason: None,
            note,
            receiver,
            version: 0,
            created_at: now,
            updated_at: now,
        }
    }

    pub fn order_day(&self) -> NaiveDate {
        self.created_at.date_naive()
    }

    pub fn assign_number(&mut self, seq: u32) {
        self.order_number = format_order_number(self.order_day(), seq);
    }

    /// Moves the order from `current` to `target`, stamping the lifecycle
    /// timestamps that belong to the target state.
    pub fn transition_to(
        &mut self,
        current: OrderStatusName,
        target: &OrderStatus,
        cancelled_reason: Option<String>,
        now: DateTime<Utc>,
    ) -> Result<(), TransitionError> {
        current.check_transition(target.name)?;
        self.order_status_id = target.id;
        match target.name {
            OrderStatusName::Delivered => self.delivered_at = Some(now),
            OrderStatusName::Cancelled => {
                self.cancelled_at = Some(now);
                self.cancelled_reason = cancelled_reason;
            }
            OrderStatusName::Paid if self.payment_status != PaymentStatus::Paid => {
                self.payment_status = PaymentStatus::Paid;
                self.paid_at = Some(now);
            }
            _ => {}
        }
        self.updated_at = now;
        Ok(())
    }

    pub fn apply_payment(
        &mut self,
        next: PaymentStatus,
        transaction_id: Option<String>,
        now: DateTime<Utc>,
    ) -> Result<(), PaymentError> {
        if !self.payment_status.can_become(next) {
            return Err(PaymentError::NotAllowed {
                from: self.payment_status,
                to: next,
            });
        }
        self.payment_status = next;
        if transaction_id.is_some() {
            self.transaction_id = transaction_id;
        }
        if next == PaymentStatus::Paid {
            self.paid_at = Some(now);
        }
        self.updated_at = now;
        Ok(())
    }
}

/// An order with its resolved status and line items.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct OrderView {
    #[serde(flatten)]
    pub order: Order,
    pub status: OrderStatus,
    pub details: Vec<OrderDetail>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StatusUpdate {
    pub order_status_id: Uuid,
    #[serde(default)]
    pub note: Option<String>,
    #[serde(default)]
    pub cancelled_reason: Option<String>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CancelRequest {
    #[serde(default)]
    pub reason: Option<String>,
}

/// Payment gateway outcome reported against an order.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PaymentEvent {
    pub outcome: PaymentStatus,
    #[serde(default)]
    pub transaction_id: Option<String>,
}

#[derive(Debug, Clone, Default)]
pub struct OrderFilter {
    pub user_id: Option<Uuid>,
    pub order_status_id: Option<Uuid>,
    pub page: u32,
    pub limit: u32,
}

impl OrderFilter {
    pub fn offset(&self) -> usize {
        (self.page.max(1) as usize - 1) * self.limit as usize
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ListResult<T> {
    pub items: Vec<T>,
    pub total: i64,
    pub page: u32,
    pub limit: u32,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn product(price: i64) -> Product {
        Product {
            id: Uuid::new_v4(),
            name: "Kettle".into(),
            price,
            stock_quantity: 10,
            images: vec!["kettle-1.png".into(), "kettle-2.png".into()],
            created_at: Utc::now(),
            updated_at: Utc::now(),
        }
    }

    fn receiver() -> Receiver {
        Receiver {
            receiver_name: "An".into(),
            receiver_phone: "0900000000".into(),
            receiver_address: "1 Le Loi".into(),
            receiver_email: None,
        }
    }

    fn pending_order(method: PaymentMethod) -> (Order, OrderStatus) {
        let pending = OrderStatus::with_defaults(OrderStatusName::Pending);
        let totals = OrderTotals {
            subtotal: 100,
            shipping_fee: 0,
            discount: 0,
            total_price: 100,
        };
        let order = Order::new(
            Uuid::new_v4(),
            pending.id,
            method,
            receiver(),
            totals,
            None,
            None,
        );
        (order, pending)
    }

    #[test]
    fn order_number_format() {
        let day = NaiveDate::from_ymd_opt(2026, 3, 7).unwrap();
        assert_eq!(format_order_number(day, 1), "ORD202603070001");
        assert_eq!(format_order_number(day, 42), "ORD202603070042");
        assert_eq!(format_order_number(day, 12345), "ORD2026030712345");
    }

    #[test]
    fn snapshot_copies_product_fields() {
        let p = product(25_000);
        let order_id = Uuid::new_v4();
        let note = Some("gift".to_owned());
        let d = OrderDetail::snapshot(order_id, &p, 3, note).unwrap();
        assert_eq!(d.order_id, order_id);
        assert_eq!(d.product_name, "Kettle");
        assert_eq!(d.product_image.as_deref(), Some("kettle-1.png"));
        assert_eq!(d.price, 25_000);
        assert_eq!(d.total_price, 75_000);
        assert_eq!(d.discount, 0);
        assert!(OrderDetail::snapshot(order_id, &p, 0, None).is_err());
    }

    #[test]
    fn totals_are_recomputed() {
        let order_id = Uuid::new_v4();
        let details = vec![
            OrderDetail::snapshot(order_id, &product(10_000), 2, None)
                .unwrap(),
            OrderDetail::snapshot(order_id, &product(5_000), 1, None)
                .unwrap(),
        ];
        let t = OrderTotals::compute(&details, 30_000, 2_500).unwrap();
        assert_eq!(t.subtotal, 25_000);
        assert_eq!(t.total_price, 52_500);

        assert!(OrderTotals::compute(&details, -1, 0).is_err());
        assert!(OrderTotals::compute(&details, 0, 25_001).is_err());
    }

    #[test]
    fn total_overflow_is_an_error() {
        let id = Uuid::new_v4();
        let details = vec![OrderDetail::snapshot(id, &product(10), 1, None).unwrap()];
        let err = OrderTotals::compute(&details, i64::MAX, 0).unwrap_err();
        assert_eq!(err.to_string(), "total overflows");

        let at_limit = OrderTotals::compute(&details, i64::MAX - 10, 0).unwrap();
        assert_eq!(at_limit.total_price, i64::MAX);
    }

    #[test]
    fn delivering_and_cancelling_stamp_timestamps() {
        let (mut order, _) = pending_order(PaymentMethod::Cod);
        let delivered = OrderStatus::with_defaults(OrderStatusName::Delivered);
        let now = Utc::now();
        order
            .transition_to(OrderStatusName::Shipped, &delivered, None, now)
            .unwrap();
        assert_eq!(order.order_status_id, delivered.id);
        assert_eq!(order.delivered_at, Some(now));

        let (mut order, _) = pending_order(PaymentMethod::Cod);
        let cancelled = OrderStatus::with_defaults(OrderStatusName::Cancelled);
        order
            .transition_to(
                OrderStatusName::Pending,
                &cancelled,
                Some("changed mind".into()),
                now,
            )
            .unwrap();
        assert_eq!(order.cancelled_at, Some(now));
        assert_eq!(order.cancelled_reason.as_deref(), Some("changed mind"));
    }

    #[test]
    fn rejected_transition_leaves_order_untouched() {
        let (mut order, pending) = pending_order(PaymentMethod::Cod);
        let before = order.clone();
        let shipped = OrderStatus::with_defaults(OrderStatusName::Shipped);
        assert!(order
            .transition_to(OrderStatusName::Pending, &shipped, None, Utc::now())
            .is_err());
        assert_eq!(order, before);
        assert_eq!(order.order_status_id, pending.id);
    }

    #[test]
    fn entering_paid_marks_payment() {
        let (mut order, _) = pending_order(PaymentMethod::Vnpay);
        let paid = OrderStatus::with_defaults(OrderStatusName::Paid);
        order
            .transition_to(OrderStatusName::Pending, &paid, None, Utc::now())
            .unwrap();
        assert_eq!(order.payment_status, PaymentStatus::Paid);
        assert!(order.paid_at.is_some());
    }

    #[test]
    fn payment_status_table() {
        let (mut order, _) = pending_order(PaymentMethod::Vnpay);
        let now = Utc::now();
        order
            .apply_payment(PaymentStatus::Failed, Some("T1".into()), now)
            .unwrap();
        order
            .apply_payment(PaymentStatus::Paid, Some("T2".into()), now)
            .unwrap();
        assert_eq!(order.transaction_id.as_deref(), Some("T2"));
        assert_eq!(
            order.apply_payment(PaymentStatus::Paid, None, now),
            Err(PaymentError::NotAllowed {
                from: PaymentStatus::Paid,
                to: PaymentStatus::Paid,
            })
        );
        order
            .apply_payment(PaymentStatus::Refunded, None, now)
            .unwrap();
        assert!(order.apply_payment(PaymentStatus::Paid, None, now).is_err());
    }

    #[test]
    fn order_json_is_flat_camel_case() {
        let (order, _) = pending_order(PaymentMethod::BankTransfer);
        let v = serde_json::to_value(&order).unwrap();
        assert_eq!(v["paymentMethod"], "bank_transfer");
        assert_eq!(v["receiverName"], "An");
        assert_eq!(v["paymentStatus"], "pending");
    }
}
