//! Shared test helpers for API integration tests.
#![allow(dead_code)]

use std::sync::Arc;

use axum::Router;
use axum::body::Body;
use axum::http::{Request, StatusCode};
use http_body_util::BodyExt;
use keel_api::config::AppConfig;
use keel_api::state::AppState;
use keel_test_support::FixedClock;
use tower::ServiceExt;

/// Build the application state with a fixed clock and default config.
pub fn test_state() -> AppState {
    AppState::new(&AppConfig::default(), Arc::new(FixedClock::at_default()))
}

/// Build the full app router over `state`. Uses the same route structure
/// as `main.rs`.
pub fn build_test_app(state: &AppState) -> Router {
    keel_api::app(state.clone())
}

/// Send a POST request with a JSON body and return the response.
pub async fn post_json(
    app: Router,
    uri: &str,
    body: &serde_json::Value,
) -> (StatusCode, serde_json::Value) {
    let request = Request::builder()
        .method("POST")
        .uri(uri)
        .header("content-type", "application/json")
        .body(Body::from(serde_json::to_vec(body).unwrap()))
        .unwrap();
    send(app, request).await
}

/// Send a POST request with no body and return the response.
pub async fn post_empty(app: Router, uri: &str) -> (StatusCode, serde_json::Value) {
    let request = Request::builder()
        .method("POST")
        .uri(uri)
        .body(Body::empty())
        .unwrap();
    send(app, request).await
}

/// Send a GET request and return the response.
pub async fn get_json(app: Router, uri: &str) -> (StatusCode, serde_json::Value) {
    let request = Request::builder()
        .method("GET")
        .uri(uri)
        .body(Body::empty())
        .unwrap();
    send(app, request).await
}

async fn send(app: Router, request: Request<Body>) -> (StatusCode, serde_json::Value) {
    let response = app.oneshot(request).await.unwrap();
    let status = response.status();
    let body_bytes = response.into_body().collect().await.unwrap().to_bytes();
    let json: serde_json::Value = serde_json::from_slice(&body_bytes).unwrap();

    (status, json)
}

/// Create an order through `POST /orders` and return its id.
pub async fn create_order(state: &AppState, product: &str, quantity: u32) -> String {
    let (status, json) = post_json(
        build_test_app(state),
        "/orders",
        &serde_json::json!({
            "user_id": "user-1",
            "product": product,
            "quantity": quantity,
            "price": 29.99
        }),
    )
    .await;
    assert_eq!(status, StatusCode::CREATED);
    json["data"]["order_id"].as_str().unwrap().to_owned()
}
