//! HTTP route handlers for the shop.
//!
//! GET handlers answer with JSON view models. Form POSTs answer with a 303
//! redirect carrying a `success` or `error` message in the query string, see
//! [`flash`].
//!
//! # Route Structure
//!
//! ```text
//! GET  /                       - Redirect to /shop
//! GET  /health                 - Liveness
//! GET  /health/ready           - Readiness (database reachable)
//!
//! # Auth (rate limited)
//! GET  /auth/login             - Login page
//! POST /auth/login             - Login action
//! GET  /auth/register          - Register page
//! POST /auth/register          - Register action
//! POST /auth/logout            - Logout action
//!
//! # Catalog
//! GET  /shop                   - Product listing
//! GET  /shop/search            - Search by text (q) or category
//! GET  /shop/product/{id}      - Product detail with approved reviews
//! POST /shop/product/{id}/review - Submit a review (auth; form or JSON)
//!
//! # Cart (auth)
//! GET  /cart                   - Cart page
//! POST /cart/add/{id}          - Add to cart
//! POST /cart/update/{id}       - Set quantity (0 removes)
//! POST /cart/remove/{id}       - Remove line
//! POST /cart/clear             - Empty the cart
//! GET  /cart/count             - Item count
//! GET  /cart/checkout          - Checkout page
//! POST /cart/checkout          - Place order
//! GET  /cart/orders            - Order history
//!
//! # Back-office (admin, some root)
//! GET  /admin                  - Dashboard
//! ...                          - See [`admin::routes`]
//! ```

pub mod admin;
pub mod auth;
pub mod cart;
pub mod flash;
pub mod shop;

use axum::{
    Router,
    extract::State,
    http::StatusCode,
    response::Redirect,
    routing::{get, post},
};

use crate::middleware::auth_rate_limiter;
use crate::state::AppState;

/// Create the auth routes router.
pub fn auth_routes() -> Router<AppState> {
    let router = Router::new()
        .route("/login", get(auth::login_page).post(auth::login))
        .route("/register", get(auth::register_page).post(auth::register))
        .route("/logout", post(auth::logout));

    match auth_rate_limiter() {
        Some(limiter) => router.layer(limiter),
        None => {
            tracing::warn!("Auth rate limiter misconfigured, serving /auth unthrottled");
            router
        }
    }
}

/// Create the catalog routes router.
pub fn shop_routes() -> Router<AppState> {
    Router::new()
        .route("/", get(shop::index))
        .route("/search", get(shop::search))
        .route("/product/{id}", get(shop::show))
        .route("/product/{id}/review", post(shop::submit_review))
}

/// Create the cart routes router.
pub fn cart_routes() -> Router<AppState> {
    Router::new()
        .route("/", get(cart::show))
        .route("/add/{id}", post(cart::add))
        .route("/update/{id}", post(cart::update))
        .route("/remove/{id}", post(cart::remove))
        .route("/clear", post(cart::clear))
        .route("/count", get(cart::count))
        .route("/checkout", get(cart::checkout_page).post(cart::checkout))
        .route("/orders", get(cart::orders))
}

/// Create all routes for the shop.
pub fn routes() -> Router<AppState> {
    Router::new()
        .route("/", get(|| async { Redirect::to("/shop") }))
        .route("/health", get(health))
        .route("/health/ready", get(readiness))
        .nest("/auth", auth_routes())
        .nest("/shop", shop_routes())
        .nest("/cart", cart_routes())
        .nest("/admin", admin::routes())
}

/// Liveness health check endpoint.
///
/// Returns "ok" if the server is running. Does not check dependencies.
async fn health() -> &'static str {
    "ok"
}

/// Readiness health check endpoint.
///
/// Returns 503 Service Unavailable if the database is not reachable.
async fn readiness(State(state): State<AppState>) -> StatusCode {
    match sqlx::query("SELECT 1").fetch_one(state.pool()).await {
        Ok(_) => StatusCode::OK,
        Err(e) => {
            tracing::warn!(error = %e, "Readiness check failed");
            StatusCode::SERVICE_UNAVAILABLE
        }
    }
}
