pub mod auth;
pub mod common;
pub mod resource;
pub mod users;

use axum::extract::FromRef;
use sea_orm::DatabaseConnection;
use std::sync::Arc;

use crate::auth::AuthService;
use crate::services::{MarketService, PriceService, ProductService, UserService};

// Re-export AppState so handler modules can import it as crate::handlers::AppState
pub use crate::AppState;

/// Services layer that encapsulates business logic used by HTTP handlers
#[derive(Clone)]
pub struct AppServices {
    pub markets: Arc<MarketService>,
    pub products: Arc<ProductService>,
    pub prices: Arc<PriceService>,
    pub users: Arc<UserService>,
}

impl AppServices {
    pub fn new(db: Arc<DatabaseConnection>) -> Self {
        Self {
            markets: Arc::new(MarketService::new(db.clone())),
            products: Arc::new(ProductService::new(db.clone())),
            prices: Arc::new(PriceService::new(db.clone())),
            users: Arc::new(UserService::new(db)),
        }
    }
}

impl FromRef<AppState> for Arc<MarketService> {
    fn from_ref(state: &AppState) -> Self {
        state.services.markets.clone()
    }
}

impl FromRef<AppState> for Arc<ProductService> {
    fn from_ref(state: &AppState) -> Self {
        state.services.products.clone()
    }
}

impl FromRef<AppState> for Arc<PriceService> {
    fn from_ref(state: &AppState) -> Self {
        state.services.prices.clone()
    }
}

impl FromRef<AppState> for Arc<UserService> {
    fn from_ref(state: &AppState) -> Self {
        state.services.users.clone()
    }
}

impl FromRef<AppState> for Arc<AuthService> {
    fn from_ref(state: &AppState) -> Self {
        state.auth.clone()
    }
}
