use sea_orm_migration::prelude::*;

use crate::m20240301_000001_create_markets_table::Markets;
use crate::m20240301_000002_create_products_table::Products;

pub struct Migration;

impl MigrationName for Migration {
    fn name(&self) -> &str {
        "m20240301_000003_create_market_prices_table"
    }
}

#[async_trait::async_trait]
impl MigrationTrait for Migration {
    async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .create_table(
                Table::create()
                    .table(MarketPrices::Table)
                    .if_not_exists()
                    .col(
                        ColumnDef::new(MarketPrices::Id)
                            .integer()
                            .not_null()
                            .auto_increment()
                            .primary_key(),
                    )
                    .col(ColumnDef::new(MarketPrices::ProductId).integer().not_null())
                    .col(ColumnDef::new(MarketPrices::MarketId).integer().not_null())
                    .col(ColumnDef::new(MarketPrices::Price).integer().not_null())
                    .col(ColumnDef::new(MarketPrices::PriceDate).date().not_null())
                    .foreign_key(
                        ForeignKey::create()
                            .name("fk_market_prices_product_id")
                            .from(MarketPrices::Table, MarketPrices::ProductId)
                            .to(Products::Table, Products::Id)
                            .on_delete(ForeignKeyAction::Cascade)
                            .on_update(ForeignKeyAction::Cascade),
                    )
                    .foreign_key(
                        ForeignKey::create()
                            .name("fk_market_prices_market_id")
                            .from(MarketPrices::Table, MarketPrices::MarketId)
                            .to(Markets::Table, Markets::Id)
                            .on_delete(ForeignKeyAction::Cascade)
                            .on_update(ForeignKeyAction::Cascade),
                    )
                    .to_owned(),
            )
            .await?;

        manager
            .create_index(
                Index::create()
                    .name("idx_market_prices_product_market_date")
                    .table(MarketPrices::Table)
                    .col(MarketPrices::ProductId)
                    .col(MarketPrices::MarketId)
                    .col(MarketPrices::PriceDate)
                    .unique()
                    .to_owned(),
            )
            .await?;

        manager
            .create_index(
                Index::create()
                    .name("idx_market_prices_market_id")
                    .table(MarketPrices::Table)
                    .col(MarketPrices::MarketId)
                    .to_owned(),
            )
            .await?;

        Ok(())
    }

    async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .drop_table(Table::drop().table(MarketPrices::Table).to_owned())
            .await
    }
}

#[derive(DeriveIden)]
pub enum MarketPrices {
    Table,
    Id,
    ProductId,
    MarketId,
    Price,
    PriceDate,
}
