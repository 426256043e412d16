use serde::{Deserialize, Serialize};
use uuid::Uuid;

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum Role {
    Customer,
    Staff,
    Admin,
    /// Internal callers such as the payment gateway callback handler.
    Service,
}

/// The authenticated caller, established upstream and passed explicitly
/// into every operation that needs it.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Principal {
    pub id: Uuid,
    pub role: Role,
}

impl Principal {
    pub fn new(id: Uuid, role: Role) -> Self {
        Self { id, role }
    }

    pub fn customer(id: Uuid) -> Self {
        Self::new(id, Role::Customer)
    }

    pub fn is_admin(&self) -> bool {
        self.role == Role::Admin
    }

    pub fn is_staff(&self) -> bool {
        matches!(self.role, Role::Staff | Role::Admin)
    }

    pub fn can_record_payments(&self) -> bool {
        matches!(self.role, Role::Service | Role::Admin)
    }

    /// Whether this caller may read or act on an order owned by `owner`.
    pub fn can_access_order_of(&self, owner: Uuid) -> bool {
        self.is_staff() || self.role == Role::Service || self.id == owner
    }
}
