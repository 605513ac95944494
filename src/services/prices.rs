use crate::{
    db::is_unique_violation,
    entities::{market, market_price, product},
    errors::{FieldErrors, ServiceError, NON_FIELD_ERRORS},
    services::{
        deserialize_some, not_found, parse_date, parse_integer, parse_pk, required_value,
        CrudService, WriteMode,
    },
};
use async_trait::async_trait;
use chrono::NaiveDate;
use sea_orm::{
    sea_query::JoinType, ActiveModelTrait, ColumnTrait, DatabaseConnection, DbErr, EntityTrait,
    FromQueryResult, ModelTrait, PaginatorTrait, QueryFilter, QueryOrder, QuerySelect, RelationTrait,
    Select, Set,
};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::sync::Arc;
use tracing::{info, instrument, warn};

pub const DUPLICATE_PRICE_MESSAGE: &str =
    "The fields Product, Market, PriceDate must make a unique set.";

/// Price as returned to clients, with the product and market names resolved.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, FromQueryResult)]
pub struct PriceRecord {
    #[serde(rename = "PriceID")]
    pub id: i32,
    #[serde(rename = "Product")]
    pub product_id: i32,
    #[serde(rename = "Market")]
    pub market_id: i32,
    #[serde(rename = "Price")]
    pub price: i32,
    #[serde(rename = "PriceDate")]
    pub price_date: NaiveDate,
    #[serde(rename = "ProductName")]
    pub product_name: String,
    #[serde(rename = "MarketName")]
    pub market_name: String,
}

/// Write payload for prices. `PriceID`, `ProductName` and `MarketName` are read-only.
///
/// Fields stay as raw JSON so type errors can be reported per field.
#[derive(Debug, Default, Deserialize)]
pub struct PricePayload {
    #[serde(rename = "Product", default, deserialize_with = "deserialize_some")]
    pub product: Option<Value>,
    #[serde(rename = "Market", default, deserialize_with = "deserialize_some")]
    pub market: Option<Value>,
    #[serde(rename = "Price", default, deserialize_with = "deserialize_some")]
    pub price: Option<Value>,
    #[serde(rename = "PriceDate", default, deserialize_with = "deserialize_some")]
    pub price_date: Option<Value>,
}

/// A fully resolved set of writable fields.
#[derive(Debug, Clone, Copy)]
struct PriceFields {
    product_id: i32,
    market_id: i32,
    price: i32,
    price_date: NaiveDate,
}

fn duplicate_price() -> ServiceError {
    ServiceError::field(NON_FIELD_ERRORS, DUPLICATE_PRICE_MESSAGE)
}

fn missing_reference(id: i32) -> String {
    format!("Invalid pk \"{}\" - object does not exist.", id)
}

/// Daily market prices CRUD
#[derive(Clone)]
pub struct PriceService {
    db: Arc<DatabaseConnection>,
}

impl PriceService {
    pub fn new(db: Arc<DatabaseConnection>) -> Self {
        Self { db }
    }

    /// Prices joined with their product and market names, oldest first.
    fn with_names() -> Select<market_price::Entity> {
        market_price::Entity::find()
            .select_only()
            .column(market_price::Column::Id)
            .column(market_price::Column::ProductId)
            .column(market_price::Column::MarketId)
            .column(market_price::Column::Price)
            .column(market_price::Column::PriceDate)
            .column_as(product::Column::Name, "product_name")
            .column_as(market::Column::Name, "market_name")
            .join(JoinType::InnerJoin, market_price::Relation::Product.def())
            .join(JoinType::InnerJoin, market_price::Relation::Market.def())
            .order_by_asc(market_price::Column::Id)
    }

    async fn find_model(&self, id: i32) -> Result<market_price::Model, ServiceError> {
        market_price::Entity::find_by_id(id)
            .one(&*self.db)
            .await?
            .ok_or_else(|| not_found(Self::RESOURCE, id))
    }

    /// Checks presence of the writable fields, falling back to `current` for
    /// anything a partial update leaves out.
    fn resolve(
        payload: PricePayload,
        mode: WriteMode,
        current: Option<&market_price::Model>,
    ) -> Result<PriceFields, ServiceError> {
        let mut errors = FieldErrors::new();
        let product_id = required_value(&mut errors, "Product", payload.product, mode, parse_pk);
        let market_id = required_value(&mut errors, "Market", payload.market, mode, parse_pk);
        let price = required_value(&mut errors, "Price", payload.price, mode, parse_integer);
        let price_date =
            required_value(&mut errors, "PriceDate", payload.price_date, mode, parse_date);
        errors.into_result()?;

        let fields = match (product_id, market_id, price, price_date, current) {
            (Some(product_id), Some(market_id), Some(price), Some(price_date), _) => PriceFields {
                product_id,
                market_id,
                price,
                price_date,
            },
            (product_id, market_id, price, price_date, Some(current)) => PriceFields {
                product_id: product_id.unwrap_or(current.product_id),
                market_id: market_id.unwrap_or(current.market_id),
                price: price.unwrap_or(current.price),
                price_date: price_date.unwrap_or(current.price_date),
            },
            _ => {
                return Err(ServiceError::InternalError(
                    "partial price write without a stored record".to_string(),
                ))
            }
        };
        Ok(fields)
    }

    /// Reports references to products or markets that do not exist.
    async fn ensure_references_exist(&self, fields: &PriceFields) -> Result<(), ServiceError> {
        let mut errors = FieldErrors::new();
        if product::Entity::find_by_id(fields.product_id)
            .one(&*self.db)
            .await?
            .is_none()
        {
            errors.add("Product", missing_reference(fields.product_id));
        }
        if market::Entity::find_by_id(fields.market_id)
            .one(&*self.db)
            .await?
            .is_none()
        {
            errors.add("Market", missing_reference(fields.market_id));
        }
        errors.into_result()
    }

    /// Rejects a (product, market, date) triple already used by another price.
    async fn ensure_unique_triple(
        &self,
        fields: &PriceFields,
        exclude_id: Option<i32>,
    ) -> Result<(), ServiceError> {
        let mut query = market_price::Entity::find()
            .filter(market_price::Column::ProductId.eq(fields.product_id))
            .filter(market_price::Column::MarketId.eq(fields.market_id))
            .filter(market_price::Column::PriceDate.eq(fields.price_date));

        if let Some(id) = exclude_id {
            query = query.filter(market_price::Column::Id.ne(id));
        }

        if query.count(&*self.db).await? > 0 {
            return Err(duplicate_price());
        }
        Ok(())
    }

    async fn validate(
        &self,
        fields: &PriceFields,
        exclude_id: Option<i32>,
    ) -> Result<(), ServiceError> {
        self.ensure_references_exist(fields).await?;
        self.ensure_unique_triple(fields, exclude_id).await
    }
}

/// A concurrent writer can still win the race past the pre-check; the unique
/// index then reports the same validation error.
fn map_write_error(err: DbErr) -> ServiceError {
    if is_unique_violation(&err) {
        warn!("Unique index rejected a duplicate price");
        duplicate_price()
    } else {
        ServiceError::DatabaseError(err)
    }
}

#[async_trait]
impl CrudService for PriceService {
    type Payload = PricePayload;
    type Record = PriceRecord;

    const RESOURCE: &'static str = "MarketPrice";

    #[instrument(skip(self))]
    async fn list(&self) -> Result<Vec<PriceRecord>, ServiceError> {
        Ok(Self::with_names()
            .into_model::<PriceRecord>()
            .all(&*self.db)
            .await?)
    }

    #[instrument(skip(self))]
    async fn get(&self, id: i32) -> Result<PriceRecord, ServiceError> {
        Self::with_names()
            .filter(market_price::Column::Id.eq(id))
            .into_model::<PriceRecord>()
            .one(&*self.db)
            .await?
            .ok_or_else(|| not_found(Self::RESOURCE, id))
    }

    #[instrument(skip(self))]
    async fn create(&self, payload: PricePayload) -> Result<PriceRecord, ServiceError> {
        let fields = Self::resolve(payload, WriteMode::Full, None)?;
        self.validate(&fields, None).await?;

        let created = market_price::ActiveModel {
            product_id: Set(fields.product_id),
            market_id: Set(fields.market_id),
            price: Set(fields.price),
            price_date: Set(fields.price_date),
            ..Default::default()
        }
        .insert(&*self.db)
        .await
        .map_err(map_write_error)?;

        info!(
            price_id = created.id,
            product_id = fields.product_id,
            market_id = fields.market_id,
            price_date = %fields.price_date,
            "Created market price"
        );
        self.get(created.id).await
    }

    #[instrument(skip(self))]
    async fn update(
        &self,
        id: i32,
        payload: PricePayload,
        mode: WriteMode,
    ) -> Result<PriceRecord, ServiceError> {
        let existing = self.find_model(id).await?;
        let fields = Self::resolve(payload, mode, Some(&existing))?;
        self.validate(&fields, Some(id)).await?;

        let mut active: market_price::ActiveModel = existing.into();
        active.product_id = Set(fields.product_id);
        active.market_id = Set(fields.market_id);
        active.price = Set(fields.price);
        active.price_date = Set(fields.price_date);
        active.update(&*self.db).await.map_err(map_write_error)?;

        info!(price_id = id, "Updated market price");
        self.get(id).await
    }

    #[instrument(skip(self))]
    async fn delete(&self, id: i32) -> Result<(), ServiceError> {
        let existing = self.find_model(id).await?;
        existing.delete(&*self.db).await?;
        info!(price_id = id, "Deleted market price");
        Ok(())
    }
}
