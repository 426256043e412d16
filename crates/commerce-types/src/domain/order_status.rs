use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use uuid::Uuid;

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "snake_case")]
pub enum OrderStatusName {
    Pending,
    Paid,
    Confirmed,
    Processing,
    Shipped,
    Delivered,
    Cancelled,
    Returned,
}

#[derive(thiserror::Error, Debug, Clone, PartialEq, Eq)]
pub enum TransitionError {
    #[error("order is already in status {0}")]
    AlreadyInStatus(OrderStatusName),
    #[error("order in status {0} allows no further transitions")]
    Terminal(OrderStatusName),
    #[error("cannot move order from {from} to {to}; allowed: {}", list(.allowed))]
    NotAllowed {
        from: OrderStatusName,
        to: OrderStatusName,
        allowed: Vec<OrderStatusName>,
    },
}

fn list(names: &[OrderStatusName]) -> String {
    names
        .iter()
        .map(|n| n.as_str())
        .collect::<Vec<_>>()
        .join(", ")
}

impl OrderStatusName {
    pub const ALL: [OrderStatusName; 8] = [
        OrderStatusName::Pending,
        OrderStatusName::Paid,
        OrderStatusName::Confirmed,
        OrderStatusName::Processing,
        OrderStatusName::Shipped,
        OrderStatusName::Delivered,
        OrderStatusName::Cancelled,
        OrderStatusName::Returned,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            OrderStatusName::Pending => "pending",
            OrderStatusName::Paid => "paid",
            OrderStatusName::Confirmed => "confirmed",
            OrderStatusName::Processing => "processing",
            OrderStatusName::Shipped => "shipped",
            OrderStatusName::Delivered => "delivered",
            OrderStatusName::Cancelled => "cancelled",
            OrderStatusName::Returned => "returned",
        }
    }

    /// The order workflow graph. Every status change goes through here.
    pub fn allowed_transitions(&self) -> &'static [OrderStatusName] {
        use OrderStatusName::*;
        match self {
            Pending => &[Paid, Confirmed, Cancelled],
            Paid => &[Confirmed, Cancelled],
            Confirmed => &[Processing],
            Processing => &[Shipped],
            Shipped => &[Delivered],
            Delivered => &[Returned],
            Cancelled | Returned => &[],
        }
    }

    pub fn is_terminal(&self) -> bool {
        self.allowed_transitions().is_empty()
    }

    pub fn check_transition(&self, to: OrderStatusName) -> Result<(), TransitionError> {
        if *self == to {
            return Err(TransitionError::AlreadyInStatus(to));
        }
        let allowed = self.allowed_transitions();
        if allowed.is_empty() {
            return Err(TransitionError::Terminal(*self));
        }
        if !allowed.contains(&to) {
            return Err(TransitionError::NotAllowed {
                from: *self,
                to,
                allowed: allowed.to_vec(),
            });
        }
        Ok(())
    }

    fn defaults(&self) -> (&'static str, &'static str, i32) {
        match self {
            OrderStatusName::Pending => ("Awaiting confirmation", "#f59e0b", 1),
            OrderStatusName::Paid => ("Payment received", "#10b981", 2),
            OrderStatusName::Confirmed => ("Confirmed by staff", "#3b82f6", 3),
            OrderStatusName::Processing => ("Being prepared", "#6366f1", 4),
            OrderStatusName::Shipped => ("Handed to carrier", "#8b5cf6", 5),
            OrderStatusName::Delivered => ("Delivered to receiver", "#22c55e", 6),
            OrderStatusName::Cancelled => ("Cancelled", "#ef4444", 7),
            OrderStatusName::Returned => ("Returned by receiver", "#6b7280", 8),
        }
    }
}

impl fmt::Display for OrderStatusName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for OrderStatusName {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        OrderStatusName::ALL
            .into_iter()
            .find(|n| n.as_str() == s)
            .ok_or_else(|| anyhow::anyhow!("unknown order status `{s}`"))
    }
}

/// Registry entry: a workflow status plus its display metadata.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct OrderStatus {
    pub id: Uuid,
    pub name: OrderStatusName,
    pub description: String,
    pub color: String,
    pub sort_order: i32,
    pub is_active: bool,
}

impl OrderStatus {
    pub fn with_defaults(name: OrderStatusName) -> Self {
        let (description, color, sort_order) = name.defaults();
        Self {
            id: Uuid::new_v4(),
            name,
            description: description.into(),
            color: color.into(),
            sort_order,
            is_active: true,
        }
    }

    /// The full registry as seeded at startup.
    pub fn seed() -> Vec<OrderStatus> {
        OrderStatusName::ALL
            .into_iter()
            .map(OrderStatus::with_defaults)
            .collect()
    }
}
