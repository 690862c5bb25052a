//! Router tests that stop before the database: health, redirects, the
//! session gate, middleware headers and the `/auth` rate limiter.

#![allow(clippy::unwrap_used)]

use axum::{
    body::Body,
    http::{Request, StatusCode, header},
};
use serde_json::json;

use brokeshop_integration_tests::TestApp;

#[tokio::test]
async fn test_health() {
    let mut app = TestApp::without_database();
    let response = app.get("/health").await;
    assert_eq!(response.status, StatusCode::OK);
    assert_eq!(response.text(), "ok");
}

#[tokio::test]
async fn test_root_redirects_to_shop() {
    let mut app = TestApp::without_database();
    app.get("/").await.assert_redirect("/shop");
}

#[tokio::test]
async fn test_protected_pages_redirect_to_login() {
    let mut app = TestApp::without_database();
    for path in ["/shop", "/shop/product/1", "/cart", "/cart/orders", "/admin", "/admin/export"] {
        app.get(path).await.assert_redirect("/auth/login");
    }
    app.post_form("/cart/add/1", &[("quantity", "1")])
        .await
        .assert_redirect("/auth/login");
}

#[tokio::test]
async fn test_json_request_without_session_is_401() {
    let mut app = TestApp::without_database();
    let response = app
        .post_json("/shop/product/1/review", &json!({"rating": 5}))
        .await;
    assert_eq!(response.status, StatusCode::UNAUTHORIZED);

    let response = app.post_json("/admin/import", &json!({})).await;
    assert_eq!(response.status, StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn test_json_get_without_session_is_401() {
    let mut app = TestApp::without_database();
    let request = Request::get("/cart")
        .header(header::ACCEPT, "application/json")
        .body(Body::empty())
        .unwrap();
    assert_eq!(app.send(request).await.status, StatusCode::UNAUTHORIZED);

    let request = Request::get("/admin/users")
        .header("x-requested-with", "XMLHttpRequest")
        .body(Body::empty())
        .unwrap();
    assert_eq!(app.send(request).await.status, StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn test_login_page_is_json() {
    let mut app = TestApp::without_database();
    let response = app.get("/auth/login?error=Bad%20luck").await;
    assert_eq!(response.status, StatusCode::OK);

    let body = response.json();
    assert_eq!(body["page"], "login");
    assert_eq!(body["min_password_length"], 6);
    assert_eq!(body["error"], "Bad luck");
}

#[tokio::test]
async fn test_login_requires_privacy_agreement() {
    let mut app = TestApp::without_database();
    let response = app
        .post_form("/auth/login", &[("username", "alice"), ("password", "secret1")])
        .await;
    response.assert_redirect("/auth/login");
    assert!(response.error().is_some());
}

#[tokio::test]
async fn test_security_headers_and_request_id() {
    let mut app = TestApp::without_database();
    let request = Request::get("/health")
        .header("x-request-id", "trace-abc-123")
        .body(Body::empty())
        .unwrap();
    let response = app.send(request).await;

    assert_eq!(response.headers["x-request-id"], "trace-abc-123");
    assert_eq!(response.headers[header::X_CONTENT_TYPE_OPTIONS], "nosniff");
    assert_eq!(response.headers[header::X_FRAME_OPTIONS], "DENY");
    assert_eq!(response.headers[header::CACHE_CONTROL], "no-store");
}

#[tokio::test]
async fn test_generated_request_id() {
    let mut app = TestApp::without_database();
    let response = app.get("/health").await;
    let id = response.headers["x-request-id"].to_str().unwrap();
    assert_eq!(id.len(), 36);
}

#[tokio::test]
async fn test_auth_routes_are_rate_limited() {
    let mut app = TestApp::without_database().with_client_ip("198.51.100.7");

    for _ in 0..5 {
        assert_eq!(app.get("/auth/login").await.status, StatusCode::OK);
    }
    assert_eq!(
        app.get("/auth/login").await.status,
        StatusCode::TOO_MANY_REQUESTS
    );

    // Other routes and other clients are unaffected.
    assert_eq!(app.get("/health").await.status, StatusCode::OK);
    let mut other = app.new_browser();
    assert_eq!(other.get("/auth/login").await.status, StatusCode::OK);
}
