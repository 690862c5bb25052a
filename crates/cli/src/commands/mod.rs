//! Command implementations.

pub mod migrate;
pub mod seed;
pub mod snapshot;
pub mod user;

use sqlx::PgPool;
use thiserror::Error;

use brokeshop_storefront::config::{ConfigError, StorefrontConfig};
use brokeshop_storefront::db::{self, RepositoryError};
use brokeshop_storefront::services::{AuthError, SnapshotError};

/// Errors that can occur while running a command.
#[derive(Debug, Error)]
pub enum CliError {
    #[error(transparent)]
    Config(#[from] ConfigError),

    #[error("Database connection error: {0}")]
    Database(#[from] sqlx::Error),

    #[error("Migration error: {0}")]
    Migration(#[from] sqlx::migrate::MigrateError),

    #[error(transparent)]
    Repository(#[from] RepositoryError),

    #[error(transparent)]
    Auth(#[from] AuthError),

    #[error(transparent)]
    Snapshot(#[from] SnapshotError),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Invalid role: {0}. Valid roles: user, admin, root")]
    InvalidRole(String),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Refusing to replace all products and users without --yes")]
    NotConfirmed,
}

/// Connect using the storefront's database settings.
async fn connect() -> Result<PgPool, CliError> {
    let config = StorefrontConfig::from_env()?;
    tracing::info!("Connecting to database...");
    Ok(db::create_pool(&config.database).await?)
}
