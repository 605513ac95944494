mod common;

use axum::http::{Method, StatusCode};
use common::TestApp;
use serde_json::json;

#[tokio::test]
async fn product_crud_roundtrip() {
    let app = TestApp::new().await;

    let rice = app.create_product("Rice", Some("Grain")).await;
    assert_eq!(rice["ProductName"], "Rice");
    assert_eq!(rice["Category"], "Grain");
    let uri = format!("/products/{}/", rice["ProductID"]);

    let (status, body) = app
        .json(Method::PATCH, &uri, Some(json!({ "ProductName": "Jasmine Rice" })), None)
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["ProductName"], "Jasmine Rice");
    assert_eq!(body["Category"], "Grain");

    let (status, list) = app.json(Method::GET, "/products/", None, None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(list.as_array().unwrap().len(), 1);

    let response = app.request(Method::DELETE, &uri, None, None).await;
    assert_eq!(response.status(), StatusCode::NO_CONTENT);

    let (status, list) = app.json(Method::GET, "/products/", None, None).await;
    assert_eq!(status, StatusCode::OK);
    assert!(list.as_array().unwrap().is_empty());
}

#[tokio::test]
async fn product_name_is_required() {
    let app = TestApp::new().await;
    let (status, body) = app
        .json(Method::POST, "/products/", Some(json!({ "Category": "Fruit" })), None)
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["fields"]["ProductName"][0], "This field is required.");
}

#[tokio::test]
async fn client_supplied_id_is_ignored() {
    let app = TestApp::new().await;
    let (status, body) = app
        .json(
            Method::POST,
            "/products/",
            Some(json!({ "ProductID": 42, "ProductName": "Mango" })),
            None,
        )
        .await;
    assert_eq!(status, StatusCode::CREATED);
    assert_eq!(body["ProductID"], 1);
    assert!(body["Category"].is_null());
}

#[tokio::test]
async fn patch_with_null_product_name_is_rejected() {
    let app = TestApp::new().await;
    let rice = app.create_product("Rice", Some("Grain")).await;
    let (status, body) = app
        .json(
            Method::PATCH,
            &format!("/products/{}/", rice["ProductID"]),
            Some(json!({ "ProductName": null, "Category": null })),
            None,
        )
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["fields"]["ProductName"][0], "This field may not be null.");
    assert!(body["fields"].get("Category").is_none());
}
