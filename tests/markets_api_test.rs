mod common;

use axum::http::{Method, StatusCode};
use common::TestApp;
use serde_json::json;

#[tokio::test]
async fn create_list_and_retrieve_markets() {
    let app = TestApp::new().await;

    let central = app.create_market("Central", Some("Bangkok")).await;
    app.create_market("Riverside", None).await;
    assert_eq!(central["MarketName"], "Central");
    assert_eq!(central["Province"], "Bangkok");
    let id = central["MarketID"].as_i64().unwrap();

    let (status, list) = app.json(Method::GET, "/markets/", None, None).await;
    assert_eq!(status, StatusCode::OK);
    let names: Vec<_> = list
        .as_array()
        .unwrap()
        .iter()
        .map(|m| m["MarketName"].as_str().unwrap().to_string())
        .collect();
    assert_eq!(names, vec!["Central", "Riverside"]);

    let (status, detail) = app
        .json(Method::GET, &format!("/markets/{}/", id), None, None)
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(detail, central);
}

#[tokio::test]
async fn missing_and_blank_names_are_field_errors() {
    let app = TestApp::new().await;

    let (status, body) = app
        .json(Method::POST, "/markets/", Some(json!({ "Province": "Chiang Mai" })), None)
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["fields"]["MarketName"][0], "This field is required.");

    let (status, body) = app
        .json(Method::POST, "/markets/", Some(json!({ "MarketName": "   " })), None)
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["fields"]["MarketName"][0], "This field may not be blank.");

    let (status, body) = app
        .json(
            Method::POST,
            "/markets/",
            Some(json!({ "MarketName": "x".repeat(101) })),
            None,
        )
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert!(body["fields"]["MarketName"].is_array());
}

#[tokio::test]
async fn put_replaces_and_patch_merges() {
    let app = TestApp::new().await;
    let market = app.create_market("Central", Some("Bangkok")).await;
    let uri = format!("/markets/{}/", market["MarketID"]);

    let (status, body) = app
        .json(Method::PATCH, &uri, Some(json!({ "Province": "Nonthaburi" })), None)
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["MarketName"], "Central");
    assert_eq!(body["Province"], "Nonthaburi");

    let (status, body) = app
        .json(Method::PUT, &uri, Some(json!({ "Province": "Nakhon" })), None)
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert!(body["fields"]["MarketName"].is_array());

    let (status, body) = app
        .json(
            Method::PUT,
            &uri,
            Some(json!({ "MarketName": "Central Hall", "Province": null })),
            None,
        )
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["MarketName"], "Central Hall");
    assert!(body["Province"].is_null());
}

#[tokio::test]
async fn blank_province_is_stored_as_null() {
    let app = TestApp::new().await;
    let market = app.create_market("Central", Some("  ")).await;
    assert!(market["Province"].is_null());
}

#[tokio::test]
async fn unknown_market_is_not_found() {
    let app = TestApp::new().await;

    for method in [Method::GET, Method::DELETE] {
        let (status, body) = app.json(method, "/markets/999/", None, None).await;
        assert_eq!(status, StatusCode::NOT_FOUND);
        assert_eq!(body["error"], "Not Found");
    }

    let (status, _) = app
        .json(
            Method::PUT,
            "/markets/999/",
            Some(json!({ "MarketName": "Ghost" })),
            None,
        )
        .await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn delete_removes_market() {
    let app = TestApp::new().await;
    let market = app.create_market("Central", None).await;
    let uri = format!("/markets/{}/", market["MarketID"]);

    let response = app.request(Method::DELETE, &uri, None, None).await;
    assert_eq!(response.status(), StatusCode::NO_CONTENT);

    let (status, _) = app.json(Method::GET, &uri, None, None).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn malformed_json_is_a_bad_request() {
    let app = TestApp::new().await;
    let response = app
        .request(
            Method::POST,
            "/markets/",
            Some(json!("just text")),
            None,
        )
        .await;
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn responses_carry_a_request_id() {
    let app = TestApp::new().await;
    let response = app.request(Method::GET, "/markets/", None, None).await;
    assert!(response.headers().contains_key("x-request-id"));
}

#[tokio::test]
async fn unparsable_ids_use_the_error_envelope() {
    let app = TestApp::new().await;
    for uri in ["/markets/abc/", "/markets/99999999999/"] {
        let response = app.request(Method::GET, uri, None, None).await;
        assert_eq!(response.status(), StatusCode::NOT_FOUND, "{}", uri);
        let request_id = response
            .headers()
            .get("x-request-id")
            .and_then(|v| v.to_str().ok())
            .map(str::to_string);
        let body = common::response_json(response).await;
        assert_eq!(body["error"], "Not Found");
        assert!(body["message"].is_string());
        assert_eq!(body["request_id"].as_str().map(str::to_string), request_id);
    }
}

#[tokio::test]
async fn patch_with_null_name_is_rejected() {
    let app = TestApp::new().await;
    let market = app.create_market("Central", Some("Bangkok")).await;
    let uri = format!("/markets/{}/", market["MarketID"]);

    let (status, body) = app
        .json(Method::PATCH, &uri, Some(json!({ "MarketName": null })), None)
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["fields"]["MarketName"][0], "This field may not be null.");

    let (_, stored) = app.json(Method::GET, &uri, None, None).await;
    assert_eq!(stored["MarketName"], "Central");
}

#[tokio::test]
async fn non_string_name_is_a_field_error() {
    let app = TestApp::new().await;
    let (status, body) = app
        .json(Method::POST, "/markets/", Some(json!({ "MarketName": ["Central"] })), None)
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["fields"]["MarketName"][0], "Not a valid string.");
}
