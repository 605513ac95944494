use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};

/// A tradable agricultural product.
#[derive(Clone, Debug, PartialEq, Eq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "products")]
pub struct Model {
    #[sea_orm(primary_key)]
    #[serde(rename = "ProductID")]
    pub id: i32,
    #[serde(rename = "ProductName")]
    pub name: String,
    #[serde(rename = "Category")]
    pub category: Option<String>,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    #[sea_orm(has_many = "super::market_price::Entity")]
    MarketPrice,
}

impl Related<super::market_price::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::MarketPrice.def()
    }
}

impl ActiveModelBehavior for ActiveModel {}
