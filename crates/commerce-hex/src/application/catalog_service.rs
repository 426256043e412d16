use crate::errors::AppError;
use commerce_types::domain::principal::Principal;
use commerce_types::domain::product::{NewProduct, Product};
use commerce_types::ports::ProductRepository;
use uuid::Uuid;

/// The slice of the product catalog checkout depends on.
pub struct CatalogService<R: ProductRepository> {
    repo: R,
}

impl<R: ProductRepository> CatalogService<R> {
    pub fn new(repo: R) -> Self {
        Self { repo }
    }

    pub async fn create_product(
        &self,
        principal: &Principal,
        input: NewProduct,
    ) -> Result<Product, AppError> {
        if !principal.is_admin() {
            return Err(AppError::Forbidden("admin role required".into()));
        }
        let product = Product::new(input).map_err(|e| AppError::BadRequest(e.to_string()))?;
        let created = self.repo.create_product(product).await?;
        tracing::info!(id = %created.id, name = %created.name, "product created");
        Ok(created)
    }

    pub async fn get_product(&self, id: Uuid) -> Result<Product, AppError> {
        self.repo
            .get_product(id)
            .await?
            .ok_or_else(|| AppError::NotFound(format!("product {id} not found")))
    }

    pub async fn list_products(&self) -> Result<Vec<Product>, AppError> {
        Ok(self.repo.list_products().await?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use commerce_repo::memory::InMemoryRepo;
    use commerce_types::domain::principal::Role;

    fn kettle() -> NewProduct {
        NewProduct {
            name: "Kettle".into(),
            price: 250_000,
            stock_quantity: 5,
            images: vec![],
        }
    }

    #[tokio::test]
    async fn admins_create_and_anyone_reads() {
        let svc = CatalogService::new(InMemoryRepo::new());
        let admin = Principal::new(Uuid::new_v4(), Role::Admin);
        let p = svc.create_product(&admin, kettle()).await.unwrap();
        assert_eq!(svc.get_product(p.id).await.unwrap().name, "Kettle");
        assert_eq!(svc.list_products().await.unwrap().len(), 1);

        let customer = Principal::customer(Uuid::new_v4());
        let res = svc.create_product(&customer, kettle()).await;
        assert!(matches!(res, Err(AppError::Forbidden(_))));

        let missing = svc.get_product(Uuid::new_v4()).await;
        assert!(matches!(missing, Err(AppError::NotFound(_))));
    }

    #[tokio::test]
    async fn negative_price_is_a_bad_request() {
        let svc = CatalogService::new(InMemoryRepo::new());
        let admin = Principal::new(Uuid::new_v4(), Role::Admin);
        let mut bad = kettle();
        bad.price = -1;
        let res = svc.create_product(&admin, bad).await;
        assert!(matches!(res, Err(AppError::BadRequest(_))));
    }
}
