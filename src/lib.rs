//! Market Prices API Library
//!
//! Markets, agricultural products and the daily prices observed for them,
//! plus the account endpoints that issue JWTs for the protected routes.
#![forbid(unsafe_code)]
#![deny(rust_2018_idioms)]
#![allow(elided_lifetimes_in_paths)]
#![warn(clippy::all, clippy::perf, clippy::dbg_macro)]

pub mod auth;
pub mod config;
pub mod db;
pub mod entities;
pub mod errors;
pub mod handlers;
pub mod health;
pub mod middleware_helpers;
pub mod services;
pub mod tracing;

use axum::{extract::DefaultBodyLimit, http::HeaderValue, Extension, Router};
use sea_orm::DatabaseConnection;
use std::sync::Arc;
use tower_http::{
    cors::{AllowHeaders, AllowMethods, CorsLayer},
    limit::RequestBodyLimitLayer,
};

use crate::auth::{AuthConfig, AuthRouterExt, AuthService};
use crate::config::AppConfig;
use crate::handlers::resource::crud_routes;
use crate::services::{MarketService, PriceService, ProductService};

// App state definition
#[derive(Clone)]
pub struct AppState {
    pub db: Arc<DatabaseConnection>,
    pub config: Arc<AppConfig>,
    pub auth: Arc<AuthService>,
    pub services: handlers::AppServices,
}

impl AppState {
    pub fn new(db: Arc<DatabaseConnection>, config: AppConfig) -> Self {
        let auth = Arc::new(AuthService::new(AuthConfig::from(&config), db.clone()));
        Self {
            services: handlers::AppServices::new(db.clone()),
            db,
            config: Arc::new(config),
            auth,
        }
    }
}

/// Routes that require no authentication
pub fn public_routes() -> Router<AppState> {
    Router::new()
        .merge(crud_routes::<MarketService>("/markets/", "/markets/:id/"))
        .merge(crud_routes::<ProductService>("/products/", "/products/:id/"))
        .merge(crud_routes::<PriceService>("/prices/", "/prices/:id/"))
        .merge(handlers::auth::auth_routes())
        .merge(health::health_routes())
}

/// Routes that require a valid access token
pub fn protected_routes(config: &AppConfig) -> Router<AppState> {
    let users = if config.user_admin_requires_staff {
        handlers::users::user_routes().with_staff()
    } else {
        handlers::users::user_routes().with_auth()
    };

    Router::new()
        .merge(handlers::auth::profile_routes().with_auth())
        .merge(users)
}

fn cors_layer(config: &AppConfig) -> CorsLayer {
    let origins: Vec<HeaderValue> = config
        .cors_origins()
        .iter()
        .filter_map(|origin| HeaderValue::from_str(origin).ok())
        .collect();

    if !origins.is_empty() {
        CorsLayer::new()
            .allow_origin(origins)
            .allow_methods(AllowMethods::mirror_request())
            .allow_headers(AllowHeaders::mirror_request())
            .allow_credentials(config.cors_allow_credentials)
    } else if config.should_allow_permissive_cors() {
        CorsLayer::permissive()
    } else {
        CorsLayer::new()
    }
}

/// Full application router with the middleware stack applied
pub fn app_router(state: AppState) -> Router {
    let config = state.config.clone();

    Router::new()
        .merge(public_routes())
        .merge(protected_routes(&config))
        .layer(DefaultBodyLimit::disable())
        .layer(RequestBodyLimitLayer::new(config.max_body_size))
        // HTTP tracing layer for consistent request/response telemetry
        .layer(tracing::configure_http_tracing())
        .layer(cors_layer(&config))
        // Inject AuthService into request extensions for auth middleware
        .layer(Extension(state.auth.clone()))
        // Ensure every request carries a request id for traceability
        .layer(axum::middleware::from_fn(
            middleware_helpers::request_id::request_id_middleware,
        ))
        .with_state(state)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn config(origins: Option<&str>, environment: &str, any: bool) -> AppConfig {
        let mut cfg = AppConfig::new(
            "sqlite::memory:".into(),
            "k3J9vQ2mX7pL4wR8tY1uZ6nB0cD5eF-gH_iJ.oP~sT2vW9xA4yC7zE1rU8qM3bN6".into(),
            300,
            86400,
            "127.0.0.1".into(),
            8080,
            environment.into(),
        );
        cfg.cors_allowed_origins = origins.map(str::to_string);
        cfg.cors_allow_any_origin = any;
        cfg
    }

    #[test]
    fn cors_layer_builds_for_every_configuration() {
        let _ = cors_layer(&config(Some("https://a.example, https://b.example"), "production", false));
        let mut with_credentials = config(Some("https://a.example"), "production", false);
        with_credentials.cors_allow_credentials = true;
        let _ = cors_layer(&with_credentials);
        let _ = cors_layer(&config(None, "development", false));
        let _ = cors_layer(&config(None, "production", true));
        let _ = cors_layer(&config(None, "production", false));
    }
}
