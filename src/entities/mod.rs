//! SeaORM entities backing the API resources.

pub mod market;
pub mod market_price;
pub mod product;
pub mod user;
