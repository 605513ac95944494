use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};

/// A physical market where prices are observed.
#[derive(Clone, Debug, PartialEq, Eq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "markets")]
pub struct Model {
    #[sea_orm(primary_key)]
    #[serde(rename = "MarketID")]
    pub id: i32,
    #[serde(rename = "MarketName")]
    pub name: String,
    #[serde(rename = "Province")]
    pub province: Option<String>,
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
