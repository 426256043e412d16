use chrono::{DateTime, Utc};
use serde::{Deserialize, Deserializer, Serialize};
use uuid::Uuid;

#[derive(thiserror::Error, Debug, Clone, PartialEq, Eq)]
pub enum DiscountError {
    #[error("discount is inactive")]
    Inactive,
    #[error("discount is outside its validity window")]
    OutsideWindow,
    #[error("order total {total} is below the minimum order value {minimum}")]
    BelowMinimum { minimum: i64, total: i64 },
    #[error("discount cannot be edited while it is in use")]
    InUse,
    #[error("{0}")]
    Invalid(String),
}

/// A percentage-off voucher. `code` is always stored upper-cased.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct DiscountCode {
    pub id: Uuid,
    pub code: String,
    pub discount_percent: u8,
    pub min_order_value: i64,
    pub max_discount_amount: Option<i64>,
    pub start_date: DateTime<Utc>,
    pub end_date: DateTime<Utc>,
    pub is_active: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NewDiscount {
    pub code: String,
    pub discount_percent: i64,
    #[serde(default)]
    pub min_order_value: Option<i64>,
    #[serde(default)]
    pub max_discount_amount: Option<i64>,
    pub start_date: DateTime<Utc>,
    pub end_date: DateTime<Utc>,
}

/// Partial update. `maxDiscountAmount: null` clears the cap, an absent field
/// leaves it untouched.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DiscountPatch {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub code: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub discount_percent: Option<i64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub min_order_value: Option<i64>,
    #[serde(
        default,
        deserialize_with = "double_option",
        skip_serializing_if = "Option::is_none"
    )]
    pub max_discount_amount: Option<Option<i64>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub start_date: Option<DateTime<Utc>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub end_date: Option<DateTime<Utc>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub is_active: Option<bool>,
}

fn double_option<'de, D, T>(de: D) -> Result<Option<Option<T>>, D::Error>
where
    D: Deserializer<'de>,
    T: Deserialize<'de>,
{
    Option::<T>::deserialize(de).map(Some)
}

/// Outcome of evaluating a code against an order total.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct DiscountQuote {
    pub code: String,
    pub discount_percent: u8,
    pub discount_amount: i64,
    pub original_discount_amount: i64,
    pub max_discount_amount: Option<i64>,
    pub total_after_discount: i64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ApplyDiscountRequest {
    pub code: String,
    pub order_total: i64,
}

pub fn normalize_code(code: &str) -> String {
    code.trim().to_uppercase()
}

fn validate_code(code: &str) -> Result<(), DiscountError> {
    if code.is_empty() {
        return Err(DiscountError::Invalid("code must not be empty".into()));
    }
    if code.chars().any(char::is_whitespace) {
        return Err(DiscountError::Invalid(
            "code must not contain whitespace".into(),
        ));
    }
    Ok(())
}

fn validate_percent(percent: i64) -> Result<u8, DiscountError> {
    match u8::try_from(percent) {
        Ok(p) if (1..=100).contains(&p) => Ok(p),
        _ => Err(DiscountError::Invalid(
            "discountPercent must be between 1 and 100".into(),
        )),
    }
}

impl DiscountCode {
    pub fn new(input: NewDiscount) -> Result<Self, DiscountError> {
        let code = normalize_code(&input.code);
        validate_code(&code)?;
        let now = Utc::now();
        let discount = Self {
            id: Uuid::new_v4(),
            code,
            discount_percent: validate_percent(input.discount_percent)?,
            min_order_value: input.min_order_value.unwrap_or(0),
            max_discount_amount: input.max_discount_amount,
            start_date: input.start_date,
            end_date: input.end_date,
            is_active: true,
            created_at: now,
            updated_at: now,
        };
        discount.validate()?;
        Ok(discount)
    }

    fn validate(&self) -> Result<(), DiscountError> {
        if self.min_order_value < 0 {
            return Err(DiscountError::Invalid(
                "minOrderValue must not be negative".into(),
            ));
        }
        if matches!(self.max_discount_amount, Some(cap) if cap <= 0) {
            return Err(DiscountError::Invalid(
                "maxDiscountAmount must be positive".into(),
            ));
        }
        if self.start_date >= self.end_date {
            return Err(DiscountError::Invalid(
                "startDate must be before endDate".into(),
            ));
        }
        Ok(())
    }

    /// Inclusive on both ends.
    pub fn is_in_window(&self, now: DateTime<Utc>) -> bool {
        self.start_date <= now && now <= self.end_date
    }

    pub fn is_applicable(&self, now: DateTime<Utc>) -> bool {
        self.is_active && self.is_in_window(now)
    }

    /// Pure evaluation of this code against `order_total` at `now`.
    pub fn evaluate(
        &self,
        order_total: i64,
        now: DateTime<Utc>,
    ) -> Result<DiscountQuote, DiscountError> {
        if order_total < 0 {
            return Err(DiscountError::Invalid(
                "orderTotal must not be negative".into(),
            ));
        }
        if !self.is_active {
            return Err(DiscountError::Inactive);
        }
        if !self.is_in_window(now) {
            return Err(DiscountError::OutsideWindow);
        }
        if order_total < self.min_order_value {
            return Err(DiscountError::BelowMinimum {
                minimum: self.min_order_value,
                total: order_total,
            });
        }
        // i128 keeps large totals from overflowing before the division.
        let raw = (order_total as i128 * self.discount_percent as i128 / 100) as i64;
        let amount = match self.max_discount_amount {
            Some(cap) => raw.min(cap),
            None => raw,
        };
        Ok(DiscountQuote {
            code: self.code.clone(),
            discount_percent: self.discount_percent,
            discount_amount: amount,
            original_discount_amount: raw,
            max_discount_amount: self.max_discount_amount,
            total_after_discount: order_total - amount,
        })
    }

    /// Applies `patch` unless the code is currently in its validity window.
    pub fn update(
        &mut self,
        patch: DiscountPatch,
        now: DateTime<Utc>,
    ) -> Result<(), DiscountError> {
        if self.is_in_window(now) {
            return Err(DiscountError::InUse);
        }
        let mut next = self.clone();
        if let Some(code) = patch.code {
            next.code = normalize_code(&code);
            validate_code(&next.code)?;
        }
        if let Some(percent) = patch.discount_percent {
            next.discount_percent = validate_percent(percent)?;
        }
        if let Some(min) = patch.min_order_value {
            next.min_order_value = min;
        }
        if let Some(cap) = patch.max_discount_amount {
            next.max_discount_amount = cap;
        }
        if let Some(start) = patch.start_date {
            next.start_date = start;
        }
        if let Some(end) = patch.end_date {
            next.end_date = end;
        }
        if let Some(active) = patch.is_active {
            next.is_active = active;
        }
        next.validate()?;
        next.updated_at = Utc::now();
        *self = next;
        Ok(())
    }

    pub fn deactivate(&mut self) {
        self.is_active = false;
        self.updated_at = Utc::now();
    }
}
