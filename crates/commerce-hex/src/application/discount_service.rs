use crate::errors::AppError;
use chrono::{DateTime, Utc};
use commerce_types::domain::discount::{
    normalize_code, DiscountCode, DiscountError, DiscountPatch, DiscountQuote, NewDiscount,
};
use commerce_types::domain::principal::Principal;
use commerce_types::ports::DiscountRepository;
use uuid::Uuid;

impl From<DiscountError> for AppError {
    fn from(e: DiscountError) -> Self {
        AppError::BadRequest(e.to_string())
    }
}

fn require_admin(principal: &Principal) -> Result<(), AppError> {
    if principal.is_admin() {
        Ok(())
    } else {
        Err(AppError::Forbidden("admin role required".into()))
    }
}

/// Looks up `code` (case-insensitively) and evaluates it against
/// `order_total` at `now`. Shared by the apply endpoint and checkout.
pub(crate) async fn quote_code<R: DiscountRepository>(
    repo: &R,
    code: &str,
    order_total: i64,
    now: DateTime<Utc>,
) -> Result<DiscountQuote, AppError> {
    let normalized = normalize_code(code);
    let discount = repo
        .find_discount_by_code(&normalized)
        .await?
        .ok_or_else(|| {
            AppError::NotFound(format!("discount {normalized} not found"))
        })?;
    discount.evaluate(order_total, now).map_err(|e| {
        tracing::warn!(code = %normalized, order_total, reason = %e, "discount rejected");
        AppError::from(e)
    })
}

pub struct DiscountService<R: DiscountRepository> {
    repo: R,
}

impl<R: DiscountRepository> DiscountService<R> {
    pub fn new(repo: R) -> Self {
        Self { repo }
    }

    pub async fn create_discount(
        &self,
        principal: &Principal,
        input: NewDiscount,
    ) -> Result<DiscountCode, AppError> {
        require_admin(principal)?;
        let discount = DiscountCode::new(input)?;
        let created = self.repo.create_discount(discount).await?;
        tracing::info!(code = %created.code, id = %created.id, "discount created");
        Ok(created)
    }

    pub async fn list_discounts(
        &self,
        principal: &Principal,
    ) -> Result<Vec<DiscountCode>, AppError> {
        require_admin(principal)?;
        Ok(self.repo.list_discounts().await?)
    }

    pub async fn list_active(&self) -> Result<Vec<DiscountCode>, AppError> {
        Ok(self.repo.list_active_discounts(Utc::now()).await?)
    }

    pub async fn get_discount(
        &self,
        principal: &Principal,
        id: Uuid,
    ) -> Result<DiscountCode, AppError> {
        require_admin(principal)?;
        self.find(id).await
    }

    async fn find(&self, id: Uuid) -> Result<DiscountCode, AppError> {
        self.repo
            .get_discount(id)
            .await?
            .ok_or_else(|| AppError::NotFound(format!("discount {id}")))
    }

    pub async fn apply_discount(
        &self,
        code: &str,
        order_total: i64,
    ) -> Result<DiscountQuote, AppError> {
        quote_code(&self.repo, code, order_total, Utc::now()).await
    }

    pub async fn update_discount(
        &self,
        principal: &Principal,
        id: Uuid,
        patch: DiscountPatch,
    ) -> Result<DiscountCode, AppError> {
        require_admin(principal)?;
        let mut discount = self.find(id).await?;
        discount.update(patch, Utc::now())?;
        let saved = self
            .repo
            .update_discount(discount)
            .await?
            .ok_or_else(|| AppError::NotFound(format!("discount {id}")))?;
        tracing::info!(code = %saved.code, %id, "discount updated");
        Ok(saved)
    }

    /// Soft delete.
    pub async fn deactivate_discount(
        &self,
        principal: &Principal,
        id: Uuid,
    ) -> Result<DiscountCode, AppError> {
        require_admin(principal)?;
        let mut discount = self.find(id).await?;
        discount.deactivate();
        let saved = self
            .repo
            .update_discount(discount)
            .await?
            .ok_or_else(|| AppError::NotFound(format!("discount {id}")))?;
        tracing::info!(code = %saved.code, %id, "discount deactivated");
        Ok(saved)
    }
}
