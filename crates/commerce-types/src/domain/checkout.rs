use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::domain::order::{PaymentMethod, Receiver};

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CheckoutItem {
    pub product_id: Uuid,
    pub quantity: u32,
    #[serde(default)]
    pub note: Option<String>,
}

/// Checkout payload. `discount` and `totalPrice` are what the client believes
/// the order costs; they are only compared against the server's figures.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Checkout {
    #[serde(default)]
    pub user_id: Option<Uuid>,
    pub items: Vec<CheckoutItem>,
    #[serde(flatten)]
    pub receiver: Receiver,
    pub payment_method: PaymentMethod,
    #[serde(default)]
    pub shipping_fee: Option<i64>,
    #[serde(default)]
    pub discount_code: Option<String>,
    #[serde(default, rename = "discount")]
    pub declared_discount: Option<i64>,
    #[serde(default, rename = "totalPrice")]
    pub declared_total: Option<i64>,
    #[serde(default)]
    pub note: Option<String>,
}

impl Checkout {
    pub fn validate(&self) -> anyhow::Result<()> {
        if self.items.is_empty() {
            anyhow::bail!("items empty");
        }
        for it in &self.items {
            if it.quantity == 0 {
                anyhow::bail!("item quantity must be > 0");
            }
        }
        let r = &self.receiver;
        if r.receiver_name.trim().is_empty() {
            anyhow::bail!("receiverName empty");
        }
        if r.receiver_phone.trim().is_empty() {
            anyhow::bail!("receiverPhone empty");
        }
        if r.receiver_address.trim().is_empty() {
            anyhow::bail!("receiverAddress empty");
        }
        if self.shipping_fee.is_some_and(|f| f < 0) {
            anyhow::bail!("shippingFee must not be negative");
        }
        if self.declared_discount.is_some_and(|d| d < 0) {
            anyhow::bail!("discount must not be negative");
        }
        if self.declared_total.is_some_and(|t| t < 0) {
            anyhow::bail!("totalPrice must not be negative");
        }
        Ok(())
    }

    pub fn discount_code(&self) -> Option<&str> {
        self.discount_code
            .as_deref()
            .map(str::trim)
            .filter(|c| !c.is_empty())
    }
}
