use crate::{
    entities::{market, market_price},
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

/// Write payload for markets. `MarketID` in the body is ignored.
#[derive(Debug, Default, Deserialize)]
pub struct MarketPayload {
    #[serde(rename = "MarketName", default, deserialize_with = "deserialize_some")]
    pub name: Option<Value>,
    #[serde(rename = "Province", default, deserialize_with = "deserialize_some")]
    pub province: Option<Value>,
}

struct CleanMarket {
    name: Option<String>,
    province: Option<Option<String>>,
}

impl MarketPayload {
    fn clean(self, mode: WriteMode) -> Result<CleanMarket, ServiceError> {
        let mut errors = FieldErrors::new();
        let name = required_text(&mut errors, "MarketName", self.name, mode, NAME_MAX_LENGTH);
        let province = optional_text(&mut errors, "Province", self.province, NAME_MAX_LENGTH);
        errors.into_result()?;
        Ok(CleanMarket { name, province })
    }
}

/// Markets CRUD
#[derive(Clone)]
pub struct MarketService {
    db: Arc<DatabaseConnection>,
}

impl MarketService {
    pub fn new(db: Arc<DatabaseConnection>) -> Self {
        Self { db }
    }

    async fn find(&self, id: i32) -> Result<market::Model, ServiceError> {
        market::Entity::find_by_id(id)
            .one(&*self.db)
            .await?
            .ok_or_else(|| not_found(Self::RESOURCE, id))
    }
}

#[async_trait]
impl CrudService for MarketService {
    type Payload = MarketPayload;
    type Record = market::Model;

    const RESOURCE: &'static str = "Market";

    #[instrument(skip(self))]
    async fn list(&self) -> Result<Vec<market::Model>, ServiceError> {
        Ok(market::Entity::find()
            .order_by_asc(market::Column::Id)
            .all(&*self.db)
            .await?)
    }

    #[instrument(skip(self))]
    async fn get(&self, id: i32) -> Result<market::Model, ServiceError> {
        self.find(id).await
    }

    #[instrument(skip(self))]
    async fn create(&self, payload: MarketPayload) -> Result<market::Model, ServiceError> {
        let clean = payload.clean(WriteMode::Full)?;

        let created = market::ActiveModel {
            name: Set(clean.name.unwrap_or_default()),
            province: Set(clean.province.flatten()),
            ..Default::default()
        }
        .insert(&*self.db)
        .await?;

        info!(market_id = created.id, "Created market");
        Ok(created)
    }

    #[instrument(skip(self))]
    async fn update(
        &self,
        id: i32,
        payload: MarketPayload,
        mode: WriteMode,
    ) -> Result<market::Model, ServiceError> {
        let existing = self.find(id).await?;
        let clean = payload.clean(mode)?;

        let mut active: market::ActiveModel = existing.into();
        if let Some(name) = clean.name {
            active.name = Set(name);
        }
        if let Some(province) = clean.province {
            active.province = Set(province);
        }

        let updated = active.update(&*self.db).await?;
        info!(market_id = id, "Updated market");
        Ok(updated)
    }

    /// Deletes the market and every price recorded at it.
    #[instrument(skip(self))]
    async fn delete(&self, id: i32) -> Result<(), ServiceError> {
        let txn = self.db.begin().await?;

        let existing = market::Entity::find_by_id(id)
            .one(&txn)
            .await?
            .ok_or_else(|| not_found(Self::RESOURCE, id))?;

        let removed = market_price::Entity::delete_many()
            .filter(market_price::Column::MarketId.eq(id))
            .exec(&txn)
            .await?;
        existing.delete(&txn).await?;

        txn.commit().await?;
        info!(
            market_id = id,
            prices_removed = removed.rows_affected,
            "Deleted market"
        );
        Ok(())
    }
}
