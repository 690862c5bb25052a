//! Integration test harness for BrokeShop.
//!
//! Requests go through the full router in process with
//! `tower::ServiceExt::oneshot`, sessions in a `MemoryStore`, and the
//! session cookie carried between requests like a browser would.
//!
//! # Running Tests
//!
//! ```bash
//! # Router tests that need no database
//! cargo test -p brokeshop-integration-tests
//!
//! # Everything, against a disposable PostgreSQL server
//! DATABASE_URL=postgres://postgres@localhost/brokeshop_test \
//!     cargo test -p brokeshop-integration-tests -- --include-ignored
//! ```
//!
//! Database tests use `#[sqlx::test]`, which creates a fresh database per
//! test and applies the shop migrations.

use std::str::FromStr;
use std::sync::atomic::{AtomicU32, Ordering};

use axum::{
    Router,
    body::{Body, to_bytes},
    http::{HeaderMap, Method, Request, StatusCode, header},
};
use rust_decimal::Decimal;
use serde_json::Value;
use sqlx::PgPool;
use tower::ServiceExt;
use tower_sessions::MemoryStore;

use brokeshop_core::{Email, Price, ProductId, Role, UserId, Username};
use brokeshop_storefront::config::StorefrontConfig;
use brokeshop_storefront::db::{self, ProductRepository};
use brokeshop_storefront::middleware::session::SESSION_COOKIE_NAME;
use brokeshop_storefront::models::ProductDraft;
use brokeshop_storefront::services::AuthService;
use brokeshop_storefront::state::AppState;

/// Every request gets its own client address unless one is pinned, so the
/// `/auth` rate limiter only trips where a test asks for it.
static NEXT_CLIENT: AtomicU32 = AtomicU32::new(1);

/// Configuration with a placeholder database URL.
///
/// # Panics
///
/// Panics if the built-in settings fail to parse.
#[must_use]
pub fn test_config() -> StorefrontConfig {
    StorefrontConfig::from_lookup(|key| match key {
        "DATABASE_URL" => Some("postgres://brokeshop@localhost/brokeshop_test".to_owned()),
        _ => None,
    })
    .expect("test configuration")
}

/// A buffered response.
#[derive(Debug)]
pub struct TestResponse {
    pub status: StatusCode,
    pub headers: HeaderMap,
    pub body: Vec<u8>,
}

impl TestResponse {
    /// The redirect target, if any.
    #[must_use]
    pub fn location(&self) -> Option<&str> {
        self.headers
            .get(header::LOCATION)
            .and_then(|v| v.to_str().ok())
    }

    /// Decoded `success` message of a redirect.
    #[must_use]
    pub fn success(&self) -> Option<String> {
        self.flash("success")
    }

    /// Decoded `error` message of a redirect.
    #[must_use]
    pub fn error(&self) -> Option<String> {
        self.flash("error")
    }

    fn flash(&self, key: &str) -> Option<String> {
        let (_, query) = self.location()?.split_once('?')?;
        query.split('&').find_map(|pair| {
            let (k, v) = pair.split_once('=')?;
            (k == key)
                .then(|| urlencoding::decode(v).ok().map(|s| s.into_owned()))
                .flatten()
        })
    }

    /// The body parsed as JSON.
    ///
    /// # Panics
    ///
    /// Panics if the body is not JSON.
    #[must_use]
    pub fn json(&self) -> Value {
        serde_json::from_slice(&self.body).unwrap_or_else(|e| {
            panic!(
                "expected JSON body ({e}), got {}: {}",
                self.status,
                String::from_utf8_lossy(&self.body)
            )
        })
    }

    /// The body as text.
    #[must_use]
    pub fn text(&self) -> String {
        String::from_utf8_lossy(&self.body).into_owned()
    }

    /// Assert a 303 to `path`, ignoring the query.
    ///
    /// # Panics
    ///
    /// Panics if the response is not such a redirect.
    pub fn assert_redirect(&self, path: &str) {
        assert_eq!(self.status, StatusCode::SEE_OTHER, "body: {}", self.text());
        let location = self.location().unwrap_or_default();
        let target = location.split('?').next().unwrap_or_default();
        assert_eq!(target, path, "location: {location}");
    }
}

/// A browser-like client for the shop router.
pub struct TestApp {
    router: Router,
    cookie: Option<String>,
    client_ip: Option<String>,
}

impl TestApp {
    /// An app backed by `pool`.
    #[must_use]
    pub fn new(pool: PgPool) -> Self {
        let state = AppState::new(test_config(), pool);
        Self {
            router: brokeshop_storefront::app(state, MemoryStore::default()),
            cookie: None,
            client_ip: None,
        }
    }

    /// An app whose pool never connects, for requests that stop before the
    /// store.
    ///
    /// # Panics
    ///
    /// Panics if the placeholder URL fails to parse.
    #[must_use]
    pub fn without_database() -> Self {
        let config = test_config();
        let pool = db::create_lazy_pool(&config.database).expect("lazy pool");
        Self::new(pool)
    }

    /// Send every request from the same client address.
    #[must_use]
    pub fn with_client_ip(mut self, ip: &str) -> Self {
        self.client_ip = Some(ip.to_owned());
        self
    }

    /// A second browser on the same app, with no session.
    #[must_use]
    pub fn new_browser(&self) -> Self {
        Self {
            router: self.router.clone(),
            cookie: None,
            client_ip: None,
        }
    }

    fn client_ip(&self) -> String {
        self.client_ip.clone().unwrap_or_else(|| {
            let n = NEXT_CLIENT.fetch_add(1, Ordering::Relaxed);
            format!("10.{}.{}.{}", (n >> 16) & 0xff, (n >> 8) & 0xff, n & 0xff)
        })
    }

    /// Send a request, attaching and then updating the session cookie.
    ///
    /// # Panics
    ///
    /// Panics if the router fails or the body cannot be read.
    pub async fn send(&mut self, mut request: Request<Body>) -> TestResponse {
        let headers = request.headers_mut();
        if let Some(cookie) = &self.cookie {
            headers.insert(header::COOKIE, cookie.parse().expect("cookie header"));
        }
        headers.insert("x-forwarded-for", self.client_ip().parse().expect("ip header"));

        let response = self
            .router
            .clone()
            .oneshot(request)
            .await
            .expect("router is infallible");

        for value in response.headers().get_all(header::SET_COOKIE) {
            let Some(pair) = value.to_str().ok().and_then(|v| v.split(';').next()) else {
                continue;
            };
            if let Some(id) = pair.strip_prefix(&format!("{SESSION_COOKIE_NAME}=")) {
                self.cookie = (!id.is_empty()).then(|| pair.to_owned());
            }
        }

        let status = response.status();
        let headers = response.headers().clone();
        let body = to_bytes(response.into_body(), usize::MAX)
            .await
            .expect("read body")
            .to_vec();

        TestResponse {
            status,
            headers,
            body,
        }
    }

    /// `GET uri`.
    ///
    /// # Panics
    ///
    /// Panics if `uri` is invalid.
    pub async fn get(&mut self, uri: &str) -> TestResponse {
        let request = Request::get(uri).body(Body::empty()).expect("request");
        self.send(request).await
    }

    /// `POST uri` with a url-encoded form.
    ///
    /// # Panics
    ///
    /// Panics if `uri` is invalid.
    pub async fn post_form(&mut self, uri: &str, fields: &[(&str, &str)]) -> TestResponse {
        let body = fields
            .iter()
            .map(|(k, v)| format!("{}={}", urlencoding::encode(k), urlencoding::encode(v)))
            .collect::<Vec<_>>()
            .join("&");
        let request = Request::builder()
            .method(Method::POST)
            .uri(uri)
            .header(header::CONTENT_TYPE, "application/x-www-form-urlencoded")
            .body(Body::from(body))
            .expect("request");
        self.send(request).await
    }

    /// `POST uri` with a JSON body.
    ///
    /// # Panics
    ///
    /// Panics if `uri` is invalid.
    pub async fn post_json(&mut self, uri: &str, body: &Value) -> TestResponse {
        let request = Request::builder()
            .method(Method::POST)
            .uri(uri)
            .header(header::CONTENT_TYPE, "application/json")
            .body(Body::from(body.to_string()))
            .expect("request");
        self.send(request).await
    }

    /// Register through the form.
    pub async fn register(&mut self, username: &str, email: &str, password: &str) -> TestResponse {
        self.post_form(
            "/auth/register",
            &[
                ("username", username),
                ("email", email),
                ("password", password),
                ("confirm_password", password),
                ("privacy", "on"),
            ],
        )
        .await
    }

    /// Log in through the form.
    pub async fn login(&mut self, username: &str, password: &str) -> TestResponse {
        self.post_form(
            "/auth/login",
            &[
                ("username", username),
                ("password", password),
                ("privacy", "on"),
            ],
        )
        .await
    }

    /// Log out.
    pub async fn logout(&mut self) -> TestResponse {
        self.post_form("/auth/logout", &[]).await
    }
}

/// Create an account directly in the store.
///
/// # Panics
///
/// Panics if the account cannot be created.
pub async fn create_account(pool: &PgPool, username: &str, password: &str, role: Role) -> UserId {
    let username = Username::parse(username).expect("username");
    let email = Email::parse(&format!("{username}@brokeshop.test")).expect("email");
    AuthService::new(pool)
        .create_account(&username, &email, password, role)
        .await
        .expect("create account")
        .id
}

/// Insert products named `Product 1..=n` priced `100 * i`.
///
/// # Panics
///
/// Panics if a product cannot be inserted.
pub async fn seed_products(pool: &PgPool, n: i64) -> Vec<ProductId> {
    let repo = ProductRepository::new(pool);
    let mut ids = Vec::new();
    for i in 1..=n {
        let draft = ProductDraft {
            name: format!("Product {i}"),
            description: format!("Description {i}"),
            price: Price::new(Decimal::from(100 * i)).expect("price"),
            category: Some(if i % 2 == 0 { "Even" } else { "Odd" }.to_owned()),
            image: None,
        };
        ids.push(repo.create(&draft).await.expect("create product").id);
    }
    ids
}

/// Read a decimal serialized as a JSON string or number.
///
/// # Panics
///
/// Panics if `value` is not a decimal.
#[must_use]
pub fn decimal(value: &Value) -> Decimal {
    match value {
        Value::String(s) => Decimal::from_str(s).expect("decimal string"),
        Value::Number(n) => Decimal::from_str(&n.to_string()).expect("decimal number"),
        other => panic!("expected decimal, got {other}"),
    }
}
