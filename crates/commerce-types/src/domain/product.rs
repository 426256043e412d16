use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct Product {
    pub id: Uuid,
    pub name: String,
    pub price: i64,
    pub stock_quantity: i64,
    pub images: Vec<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NewProduct {
    pub name: String,
    pub price: i64,
    pub stock_quantity: i64,
    #[serde(default)]
    pub images: Vec<String>,
}

impl Product {
    pub fn new(input: NewProduct) -> anyhow::Result<Self> {
        if input.name.trim().is_empty() {
            anyhow::bail!("name empty");
        }
        if input.price < 0 {
            anyhow::bail!("price must not be negative");
        }
        if input.stock_quantity < 0 {
            anyhow::bail!("stockQuantity must not be negative");
        }
        let now = Utc::now();
        Ok(Self {
            id: Uuid::new_v4(),
            name: input.name,
            price: input.price,
            stock_quantity: input.stock_quantity,
            images: input.images,
            created_at: now,
            updated_at: now,
        })
    }

    pub fn primary_image(&self) -> Option<&str> {
        self.images.first().map(String::as_str)
    }
}
