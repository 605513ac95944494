mod common;

use axum::http::{Method, StatusCode};
use chrono::{Duration, Utc};
use common::{TestApp, TEST_PASSWORD, TEST_SECRET};
use jsonwebtoken::{encode, EncodingKey, Header};
use market_prices_api::{
    auth::{Claims, TokenType},
    entities::user,
};
use sea_orm::{EntityTrait, PaginatorTrait};
use serde_json::json;

async fn user_count(app: &TestApp) -> u64 {
    user::Entity::find().count(&*app.state.db).await.unwrap()
}

#[tokio::test]
async fn register_returns_username_and_email_only() {
    let app = TestApp::new().await;
    let (status, body) = app
        .json(
            Method::POST,
            "/register/",
            Some(json!({
                "username": "farmer",
                "email": "farmer@example.com",
                "password": TEST_PASSWORD,
                "password2": TEST_PASSWORD,
            })),
            None,
        )
        .await;
    assert_eq!(status, StatusCode::CREATED);
    assert_eq!(body, json!({ "username": "farmer", "email": "farmer@example.com" }));
}

#[tokio::test]
async fn password_mismatch_creates_no_user() {
    let app = TestApp::new().await;
    let (status, body) = app
        .json(
            Method::POST,
            "/register/",
            Some(json!({
                "username": "farmer",
                "email": "farmer@example.com",
                "password": TEST_PASSWORD,
                "password2": "Something-Else-99",
            })),
            None,
        )
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["fields"]["password"][0], "Password fields didn't match.");
    assert_eq!(user_count(&app).await, 0);
}

#[tokio::test]
async fn weak_passwords_are_rejected() {
    let app = TestApp::new().await;
    for weak in ["short", "12345678901", "password"] {
        let (status, body) = app
            .json(
                Method::POST,
                "/register/",
                Some(json!({
                    "username": "farmer",
                    "email": "",
                    "password": weak,
                    "password2": weak,
                })),
                None,
            )
            .await;
        assert_eq!(status, StatusCode::BAD_REQUEST, "{}", weak);
        assert!(body["fields"]["password"].is_array(), "{}", weak);
    }
    assert_eq!(user_count(&app).await, 0);
}

#[tokio::test]
async fn duplicate_username_is_rejected() {
    let app = TestApp::new().await;
    assert_eq!(
        app.register("farmer", "a@example.com").await.status(),
        StatusCode::CREATED
    );
    let (status, body) = app
        .json(
            Method::POST,
            "/register/",
            Some(json!({
                "username": "farmer",
                "email": "b@example.com",
                "password": TEST_PASSWORD,
                "password2": TEST_PASSWORD,
            })),
            None,
        )
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(
        body["fields"]["username"][0],
        "A user with that username already exists."
    );
}

#[tokio::test]
async fn login_issues_token_pair() {
    let app = TestApp::new().await;
    app.register("farmer", "farmer@example.com").await;

    let (status, tokens) = app.login("farmer", TEST_PASSWORD).await;
    assert_eq!(status, StatusCode::OK);
    assert!(tokens["access"].as_str().is_some_and(|t| !t.is_empty()));
    assert!(tokens["refresh"].as_str().is_some_and(|t| !t.is_empty()));
}

#[tokio::test]
async fn login_with_bad_credentials_returns_no_tokens() {
    let app = TestApp::new().await;
    app.register("farmer", "farmer@example.com").await;

    for (username, password) in [("farmer", "wrong-password-1"), ("nobody", TEST_PASSWORD)] {
        let (status, body) = app.login(username, password).await;
        assert_eq!(status, StatusCode::UNAUTHORIZED);
        assert!(body.get("access").is_none());
        assert!(body.get("refresh").is_none());
    }

    let (status, body) = app
        .json(Method::POST, "/login/", Some(json!({ "username": "farmer" })), None)
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["fields"]["password"][0], "This field is required.");
}

#[tokio::test]
async fn refresh_exchanges_only_refresh_tokens() {
    let app = TestApp::new().await;
    app.register("farmer", "farmer@example.com").await;
    let (_, tokens) = app.login("farmer", TEST_PASSWORD).await;

    let (status, body) = app
        .json(
            Method::POST,
            "/token/refresh/",
            Some(json!({ "refresh": tokens["refresh"] })),
            None,
        )
        .await;
    assert_eq!(status, StatusCode::OK);
    let access = body["access"].as_str().unwrap().to_string();

    let (status, _) = app.json(Method::GET, "/profile/", None, Some(&access)).await;
    assert_eq!(status, StatusCode::OK);

    let (status, _) = app
        .json(
            Method::POST,
            "/token/refresh/",
            Some(json!({ "refresh": tokens["access"] })),
            None,
        )
        .await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);

    let (status, _) = app
        .json(
            Method::POST,
            "/token/refresh/",
            Some(json!({ "refresh": "not-a-jwt" })),
            None,
        )
        .await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn profile_requires_a_token() {
    let app = TestApp::new().await;
    let (status, body) = app.json(Method::GET, "/profile/", None, None).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
    assert_eq!(body["message"], "Authentication credentials were not provided.");

    let (status, _) = app
        .json(Method::GET, "/profile/", None, Some("garbage"))
        .await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn profile_returns_exactly_four_fields() {
    let app = TestApp::new().await;
    let token = app.access_token("farmer").await;

    let (status, body) = app.json(Method::GET, "/profile/", None, Some(&token)).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(
        body,
        json!({
            "username": "farmer",
            "email": "farmer@example.com",
            "first_name": "",
            "last_name": "",
        })
    );
}

#[tokio::test]
async fn profile_update_changes_names_only() {
    let app = TestApp::new().await;
    let token = app.access_token("farmer").await;

    let (status, body) = app
        .json(
            Method::PATCH,
            "/profile/",
            Some(json!({ "first_name": "Somchai", "username": "hijack" })),
            Some(&token),
        )
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["first_name"], "Somchai");
    assert_eq!(body["username"], "farmer");

    let (status, body) = app
        .json(
            Method::PUT,
            "/profile/",
            Some(json!({ "email": "not-an-email" })),
            Some(&token),
        )
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert!(body["fields"]["email"].is_array());
}

#[tokio::test]
async fn expired_access_token_is_rejected() {
    let app = TestApp::new().await;
    app.register("farmer", "farmer@example.com").await;

    let past = Utc::now() - Duration::hours(2);
    let claims = Claims {
        sub: "1".to_string(),
        token_type: TokenType::Access,
        jti: "expired".to_string(),
        iat: past.timestamp(),
        exp: (past + Duration::minutes(5)).timestamp(),
        nbf: past.timestamp(),
        iss: app.state.config.auth_issuer.clone(),
        aud: app.state.config.auth_audience.clone(),
    };
    let token = encode(
        &Header::default(),
        &claims,
        &EncodingKey::from_secret(TEST_SECRET.as_bytes()),
    )
    .unwrap();

    let (status, body) = app.json(Method::GET, "/profile/", None, Some(&token)).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
    assert_eq!(body["message"], "Token is invalid or expired");
}

#[tokio::test]
async fn login_stamps_last_login() {
    let app = TestApp::new().await;
    app.register("farmer", "farmer@example.com").await;

    let before = user::Entity::find().one(&*app.state.db).await.unwrap().unwrap();
    assert!(before.last_login.is_none());

    app.login("farmer", TEST_PASSWORD).await;
    let after = user::Entity::find().one(&*app.state.db).await.unwrap().unwrap();
    assert!(after.last_login.is_some());
}

#[tokio::test]
async fn health_reports_database_status() {
    let app = TestApp::new().await;
    let (status, body) = app.json(Method::GET, "/health", None, None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["status"], "healthy");
    assert_eq!(body["checks"]["database"]["status"], "healthy");
}
