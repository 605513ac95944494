pub use sea_orm_migration::prelude::*;

mod m20240301_000001_create_markets_table;
mod m20240301_000002_create_products_table;
mod m20240301_000003_create_market_prices_table;
mod m20240301_000004_create_users_table;

pub struct Migrator;

#[async_trait::async_trait]
impl MigratorTrait for Migrator {
    fn migrations() -> Vec<Box<dyn MigrationTrait>> {
        vec![
            Box::new(m20240301_000001_create_markets_table::Migration),
            Box::new(m20240301_000002_create_products_table::Migration),
            Box::new(m20240301_000003_create_market_prices_table::Migration),
            Box::new(m20240301_000004_create_users_table::Migration),
        ]
    }
}
