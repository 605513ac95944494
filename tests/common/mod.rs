#![allow(dead_code)]

use axum::{
    body::{self, Body},
    http::{Method, Request, StatusCode},
    response::Response,
    Router,
};
use market_prices_api::{config::AppConfig, db, AppState};
use serde_json::{json, Value};
use tempfile::TempDir;
use tower::ServiceExt;

pub const TEST_SECRET: &str = "k3J9vQ2mX7pL4wR8tY1uZ6nB0cD5eF-gH_iJ.oP~sT2vW9xA4yC7zE1rU8qM3bN6";
pub const TEST_PASSWORD: &str = "Tomato-Harvest-2024";

/// Helper harness for spinning up the application against a throwaway SQLite file.
pub struct TestApp {
    router: Router,
    pub state: AppState,
    _db_dir: TempDir,
}

impl TestApp {
    pub async fn new() -> Self {
        Self::with_config(|_| {}).await
    }

    /// Construct a test application, letting the caller adjust the configuration.
    pub async fn with_config(adjust: impl FnOnce(&mut AppConfig)) -> Self {
        let db_dir = tempfile::tempdir().expect("create temp dir");
        let db_path = db_dir.path().join("market_prices_test.db");

        let mut cfg = AppConfig::new(
            format!("sqlite://{}?mode=rwc", db_path.display()),
            TEST_SECRET.to_string(),
            300,
            86_400,
            "127.0.0.1".to_string(),
            18_080,
            "test".to_string(),
        );
        cfg.db_max_connections = 1;
        cfg.db_min_connections = 1;
        adjust(&mut cfg);

        let pool = db::establish_connection_from_app_config(&cfg)
            .await
            .expect("failed to create test database");
        db::run_migrations(&pool)
            .await
            .expect("failed to run migrations in tests");

        let state = AppState::new(std::sync::Arc::new(pool), cfg);
        let router = market_prices_api::app_router(state.clone());

        Self {
            router,
            state,
            _db_dir: db_dir,
        }
    }

    pub async fn request(
        &self,
        method: Method,
        uri: &str,
        body: Option<Value>,
        token: Option<&str>,
    ) -> Response {
        let mut builder = Request::builder().method(method).uri(uri);
        if let Some(token) = token {
            builder = builder.header("authorization", format!("Bearer {}", token));
        }
        let body = match body {
            Some(value) => {
                builder = builder.header("content-type", "application/json");
                Body::from(value.to_string())
            }
            None => Body::empty(),
        };

        self.router
            .clone()
            .oneshot(builder.body(body).expect("build request"))
            .await
            .expect("router response")
    }

    /// Sends a request and decodes the JSON response body.
    pub async fn json(
        &self,
        method: Method,
        uri: &str,
        body: Option<Value>,
        token: Option<&str>,
    ) -> (StatusCode, Value) {
        let response = self.request(method, uri, body, token).await;
        let status = response.status();
        (status, response_json(response).await)
    }

    pub async fn register(&self, username: &str, email: &str) -> Response {
        self.request(
            Method::POST,
            "/register/",
            Some(json!({
                "username": username,
                "email": email,
                "password": TEST_PASSWORD,
                "password2": TEST_PASSWORD,
            })),
            None,
        )
        .await
    }

    pub async fn login(&self, username: &str, password: &str) -> (StatusCode, Value) {
        self.json(
            Method::POST,
            "/login/",
            Some(json!({ "username": username, "password": password })),
            None,
        )
        .await
    }

    /// Registers a user and returns its access token.
    pub async fn access_token(&self, username: &str) -> String {
        let response = self
            .register(username, &format!("{}@example.com", username))
            .await;
        assert_eq!(response.status(), StatusCode::CREATED);

        let (status, tokens) = self.login(username, TEST_PASSWORD).await;
        assert_eq!(status, StatusCode::OK);
        tokens["access"].as_str().expect("access token").to_string()
    }

    pub async fn create_market(&self, name: &str, province: Option<&str>) -> Value {
        let (status, body) = self
            .json(
                Method::POST,
                "/markets/",
                Some(json!({ "MarketName": name, "Province": province })),
                None,
            )
            .await;
        assert_eq!(status, StatusCode::CREATED, "{}", body);
        body
    }

    pub async fn create_product(&self, name: &str, category: Option<&str>) -> Value {
        let (status, body) = self
            .json(
                Method::POST,
                "/products/",
                Some(json!({ "ProductName": name, "Category": category })),
                None,
            )
            .await;
        assert_eq!(status, StatusCode::CREATED, "{}", body);
        body
    }
}

pub async fn response_json(response: Response) -> Value {
    let bytes = body::to_bytes(response.into_body(), usize::MAX)
        .await
        .expect("response body bytes");
    if bytes.is_empty() {
        return Value::Null;
    }
    serde_json::from_slice(&bytes).expect("json response")
}
