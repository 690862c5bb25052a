//! Database migration command.
//!
//! Applies the shop schema migrations from `crates/storefront/migrations/`
//! and creates the session table. The storefront binary runs the same set
//! on startup.

use tower_sessions_sqlx_store::PostgresStore;

use brokeshop_storefront::db::MIGRATOR;

use super::{CliError, connect};

/// Run all migrations.
pub async fn run() -> Result<(), CliError> {
    let pool = connect().await?;

    tracing::info!("Running shop migrations...");
    MIGRATOR.run(&pool).await?;

    tracing::info!("Creating session table...");
    PostgresStore::new(pool).migrate().await?;

    tracing::info!("Migrations complete!");
    Ok(())
}
