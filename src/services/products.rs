use crate::{
    entities::{market_price, product},
    errors::{FieldErrors, ServiceError},
    services::{
        deserialize_some, not_found, optional_text, required_text, CrudService, WriteMode,
        NAME_MAX_LENGTH,
    },
};
use async_trait::async_trait;
use sea_orm::{
    ActiveModelTrait, ColumnTrait, DatabaseConnection, EntityTrait, ModelTrait, QueryFilter,
    QueryOrder, Set, TransactionTrait,
};
use serde::Deserialize;
use serde_json::Value;
use std::sync::Arc;
use tracing::{info, instrument};

/// Write payload for products. `ProductID` in the body is ignored.
#[derive(Debug, Default, Deserialize)]
pub struct ProductPayload {
    #[serde(rename = "ProductName", default, deserialize_with = "deserialize_some")]
    pub name: Option<Value>,
    #[serde(rename = "Category", default, deserialize_with = "deserialize_some")]
    pub category: Option<Value>,
}

struct CleanProduct {
    name: Option<String>,
    category: Option<Option<String>>,
}

impl ProductPayload {
    fn clean(self, mode: WriteMode) -> Result<CleanProduct, ServiceError> {
        let mut errors = FieldErrors::new();
        let name = required_text(&mut errors, "ProductName", self.name, mode, NAME_MAX_LENGTH);
        let category = optional_text(&mut errors, "Category", self.category, NAME_MAX_LENGTH);
        errors.into_result()?;
        Ok(CleanProduct { name, category })
    }
}

/// Products CRUD
#[derive(Clone)]
pub struct ProductService {
    db: Arc<DatabaseConnection>,
}

impl ProductService {
    pub fn new(db: Arc<DatabaseConnection>) -> Self {
        Self { db }
    }

    async fn find(&self, id: i32) -> Result<product::Model, ServiceError> {
        product::Entity::find_by_id(id)
            .one(&*self.db)
            .await?
            .ok_or_else(|| not_found(Self::RESOURCE, id))
    }
}

#[async_trait]
impl CrudService for ProductService {
    type Payload = ProductPayload;
    type Record = product::Model;

    const RESOURCE: &'static str = "Product";

    #[instrument(skip(self))]
    async fn list(&self) -> Result<Vec<product::Model>, ServiceError> {
        Ok(product::Entity::find()
            .order_by_asc(product::Column::Id)
            .all(&*self.db)
            .await?)
    }

    #[instrument(skip(self))]
    async fn get(&self, id: i32) -> Result<product::Model, ServiceError> {
        self.find(id).await
    }

    #[instrument(skip(self))]
    async fn create(&self, payload: ProductPayload) -> Result<product::Model, ServiceError> {
        let clean = payload.clean(WriteMode::Full)?;

        let created = product::ActiveModel {
            name: Set(clean.name.unwrap_or_default()),
            category: Set(clean.category.flatten()),
            ..Default::default()
        }
        .insert(&*self.db)
        .await?;

        info!(product_id = created.id, "Created product");
        Ok(created)
    }

    #[instrument(skip(self))]
    async fn update(
        &self,
        id: i32,
        payload: ProductPayload,
        mode: WriteMode,
    ) -> Result<product::Model, ServiceError> {
        let existing = self.find(id).await?;
        let clean = payload.clean(mode)?;

        let mut active: product::ActiveModel = existing.into();
        if let Some(name) = clean.name {
            active.name = Set(name);
        }
        if let Some(category) = clean.category {
            active.category = Set(category);
        }

        let updated = active.update(&*self.db).await?;
        info!(product_id = id, "Updated product");
        Ok(updated)
    }

    /// Deletes the product and every price recorded for it.
    #[instrument(skip(self))]
    async fn delete(&self, id: i32) -> Result<(), ServiceError> {
        let txn = self.db.begin().await?;

        let existing = product::Entity::find_by_id(id)
            .one(&txn)
            .await?
            .ok_or_else(|| not_found(Self::RESOURCE, id))?;

        let removed = market_price::Entity::delete_many()
            .filter(market_price::Column::ProductId.eq(id))
            .exec(&txn)
            .await?;
        existing.delete(&txn).await?;

        txn.commit().await?;
        info!(
            product_id = id,
            prices_removed = removed.rows_affected,
            "Deleted product"
        );
        Ok(())
    }
}
