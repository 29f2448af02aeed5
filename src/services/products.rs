use crate::{
    db::DbPool,
    entities::product::{self, Entity as ProductEntity},
    errors::ServiceError,
    models::fulfillment::available_for_order,
};
use sea_orm::{
    ActiveModelTrait, ColumnTrait, EntityTrait, PaginatorTrait, QueryFilter, QueryOrder, Set,
};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::{info, instrument};
use uuid::Uuid;
use validator::Validate;

#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
pub struct CreateProductInput {
    #[validate(length(min = 1, max = 64, message = "SKU is required"))]
    pub sku: String,
    #[validate(length(min = 1, max = 200, message = "Name is required"))]
    pub name: String,
    #[serde(default)]
    #[validate(range(min = 0))]
    pub fresh_stock: i32,
    #[serde(default)]
    #[validate(range(min = 0))]
    pub damaged_stock: i32,
    #[serde(default)]
    #[validate(range(min = 0))]
    pub sample_stock: i32,
    #[serde(default)]
    #[validate(range(min = 0))]
    pub showroom_stock: i32,
    #[serde(default)]
    #[validate(range(min = 0))]
    pub opening_stock: i32,
}

/// A product with the quantity order entry may promise.
#[derive(Debug, Clone, Serialize)]
pub struct ProductView {
    #[serde(flatten)]
    pub product: product::Model,
    pub available_for_order: i32,
}

impl From<product::Model> for ProductView {
    fn from(product: product::Model) -> Self {
        let available = available_for_order(
            product.fresh_stock,
            product.opening_stock,
            product.damaged_stock,
        );
        Self {
            product,
            available_for_order: available,
        }
    }
}

/// Product master data. Stock counters are only moved by the order,
/// dispatch and purchase request workflows.
#[derive(Clone)]
pub struct ProductService {
    db_pool: Arc<DbPool>,
}

impl ProductService {
    pub fn new(db_pool: Arc<DbPool>) -> Self {
        Self { db_pool }
    }

    #[instrument(skip(self, input), fields(sku = %input.sku))]
    pub async fn create_product(&self, input: CreateProductInput) -> Result<ProductView, ServiceError> {
        input.validate()?;
        let db = &*self.db_pool;

        let existing = ProductEntity::find()
            .filter(product::Column::Sku.eq(input.sku.clone()))
            .one(db)
            .await?;
        if existing.is_some() {
            return Err(ServiceError::Conflict(format!(
                "product with SKU {} already exists",
                input.sku
            )));
        }

        let created = product::ActiveModel {
            id: Set(Uuid::new_v4()),
            sku: Set(input.sku),
            name: Set(input.name),
            fresh_stock: Set(input.fresh_stock),
            damaged_stock: Set(input.damaged_stock),
            sample_stock: Set(input.sample_stock),
            showroom_stock: Set(input.showroom_stock),
            opening_stock: Set(input.opening_stock),
            ordered_quantity: Set(0),
            in_transit_quantity: Set(0),
            version: Set(1),
            ..Default::default()
        }
        .insert(db)
        .await?;

        info!(product_id = %created.id, "Product created");
        Ok(created.into())
    }

    #[instrument(skip(self))]
    pub async fn get_product(&self, id: Uuid) -> Result<ProductView, ServiceError> {
        ProductEntity::find_by_id(id)
            .one(&*self.db_pool)
            .await?
            .map(ProductView::from)
            .ok_or_else(|| ServiceError::NotFound(format!("Product {} not found", id)))
    }

    #[instrument(skip(self))]
    pub async fn list_products(
        &self,
        page: u64,
        per_page: u64,
    ) -> Result<(Vec<ProductView>, u64), ServiceError> {
        let paginator = ProductEntity::find()
            .order_by_asc(product::Column::Sku)
            .paginate(&*self.db_pool, per_page.max(1));
        let total = paginator.num_items().await?;
        let products = paginator
            .fetch_page(page.saturating_sub(1))
            .await?
            .into_iter()
            .map(ProductView::from)
            .collect();
        Ok((products, total))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;

    #[test]
    fn view_computes_available_for_order() {
        let product = product::Model {
            id: Uuid::new_v4(),
            sku: "TILE-600".into(),
            name: "Vitrified tile 600x600".into(),
            fresh_stock: 40,
            damaged_stock: 5,
            sample_stock: 2,
            showroom_stock: 1,
            opening_stock: 10,
            ordered_quantity: 0,
            in_transit_quantity: 0,
            created_at: Utc::now(),
            updated_at: None,
            version: 1,
        };
        let view = ProductView::from(product);
        assert_eq!(view.available_for_order, 45);
    }
}
