//! Database operations for the shop's `PostgreSQL` store.
//!
//! # Schema: `shop`
//!
//! - `user_account` - Accounts with argon2 hashes and a role literal
//! - `product` - Catalog
//! - `cart_line` - (user, product) -> quantity
//! - `customer_order`, `order_item` - Placed orders with price snapshots
//! - `delivery_address`, `payment` - One-to-one with an order
//! - `review` - Product reviews and their moderation state
//!
//! Sessions live in `tower_sessions.session`, created by the session store.
//!
//! # Migrations
//!
//! Migrations are stored in `crates/storefront/migrations/` and run via:
//! ```bash
//! cargo run -p brokeshop-cli -- migrate
//! ```
//!
//! Every call is bounded: the pool's `acquire_timeout` caps waiting for a
//! connection and each connection carries a server-side `statement_timeout`.
//! Both surface as [`RepositoryError::Timeout`].

pub mod cart;
pub mod orders;
pub mod products;
pub mod reviews;
pub mod users;

use std::str::FromStr;

use secrecy::ExposeSecret;
use sqlx::PgPool;
use sqlx::postgres::{PgConnectOptions, PgPoolOptions};
use thiserror::Error;

pub use cart::CartRepository;
pub use orders::OrderRepository;
pub use products::ProductRepository;
pub use reviews::ReviewRepository;
pub use users::UserRepository;

use crate::config::DatabaseConfig;

/// Embedded schema migrations.
pub static MIGRATOR: sqlx::migrate::Migrator = sqlx::migrate!("./migrations");

/// SQLSTATE raised when `statement_timeout` cancels a query.
const QUERY_CANCELED: &str = "57014";

/// Errors that can occur during repository operations.
#[derive(Debug, Error)]
pub enum RepositoryError {
    /// Database error from sqlx.
    #[error("database error: {0}")]
    Database(sqlx::Error),

    /// Data in the database is corrupted or invalid.
    #[error("data corruption: {0}")]
    DataCorruption(String),

    /// Requested entity was not found.
    #[error("not found")]
    NotFound,

    /// Constraint violation (e.g., unique username).
    #[error("constraint violation: {0}")]
    Conflict(String),

    /// No connection became available, or the statement ran too long.
    #[error("database timed out")]
    Timeout,
}

impl From<sqlx::Error> for RepositoryError {
    fn from(e: sqlx::Error) -> Self {
        match e {
            sqlx::Error::PoolTimedOut => Self::Timeout,
            sqlx::Error::Database(ref db_err)
                if db_err.code().as_deref() == Some(QUERY_CANCELED) =>
            {
                Self::Timeout
            }
            other => Self::Database(other),
        }
    }
}

/// Map a unique-constraint violation to [`RepositoryError::Conflict`].
pub(crate) fn conflict_on_unique(e: sqlx::Error, what: &str) -> RepositoryError {
    if let sqlx::Error::Database(ref db_err) = e
        && db_err.is_unique_violation()
    {
        return RepositoryError::Conflict(what.to_owned());
    }
    RepositoryError::from(e)
}

/// Create a `PostgreSQL` connection pool from configuration.
///
/// # Errors
///
/// Returns `sqlx::Error` if the URL is malformed or the connection cannot be
/// established.
pub async fn create_pool(config: &DatabaseConfig) -> Result<PgPool, sqlx::Error> {
    let options = connect_options(config)?;
    pool_options(config).connect_with(options).await
}

/// Create a pool that connects on first use.
///
/// # Errors
///
/// Returns `sqlx::Error` if the URL is malformed.
pub fn create_lazy_pool(config: &DatabaseConfig) -> Result<PgPool, sqlx::Error> {
    let options = connect_options(config)?;
    Ok(pool_options(config).connect_lazy_with(options))
}

fn connect_options(config: &DatabaseConfig) -> Result<PgConnectOptions, sqlx::Error> {
    let statement_timeout_ms = config.statement_timeout.as_millis();
    Ok(PgConnectOptions::from_str(config.url.expose_secret())?
        .options([("statement_timeout", statement_timeout_ms.to_string())]))
}

fn pool_options(config: &DatabaseConfig) -> PgPoolOptions {
    PgPoolOptions::new()
        .max_connections(config.max_connections)
        .min_connections(config.max_connections.min(2))
        .acquire_timeout(config.acquire_timeout)
}
