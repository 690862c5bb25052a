//! Snapshot export and import.
//!
//! # Usage
//!
//! ```bash
//! bs-cli snapshot export -o snapshot.json
//! bs-cli snapshot import snapshot.json --yes
//! ```
//!
//! Import replaces every product and user, and removes carts, orders and
//! reviews by cascade, then signs everyone out. Password hashes are stored
//! exactly as exported.

use std::io::Write;
use std::path::Path;

use tower_sessions_sqlx_store::PostgresStore;

use brokeshop_storefront::services::{PrincipalCache, Snapshot, SnapshotService};

use super::{CliError, connect};

/// `PostgresStore` keeps sessions in `tower_sessions.session` by default.
const CLEAR_SESSIONS: &str = "DELETE FROM tower_sessions.session";

/// Write the current products and users as pretty-printed JSON.
pub async fn export(output: Option<&Path>) -> Result<(), CliError> {
    let pool = connect().await?;
    let snapshot = SnapshotService::new(&pool).export().await?;
    let json = serde_json::to_vec_pretty(&snapshot)?;

    match output {
        Some(path) => {
            tokio::fs::write(path, &json).await?;
            tracing::info!(
                "Exported {} products and {} users to {}",
                snapshot.products.len(),
                snapshot.users.len(),
                path.display()
            );
        }
        None => {
            let mut stdout = std::io::stdout().lock();
            stdout.write_all(&json)?;
            stdout.write_all(b"\n")?;
        }
    }

    Ok(())
}

/// Replace all products and users with the snapshot in `file`.
pub async fn import(file: &Path, confirmed: bool) -> Result<(), CliError> {
    let content = tokio::fs::read_to_string(file).await?;
    let snapshot = Snapshot::from_json(&content)?;
    snapshot.validate()?;

    if !confirmed {
        tracing::warn!(
            "Snapshot holds {} products and {} users; rerun with --yes to replace the current data",
            snapshot.products.len(),
            snapshot.users.len()
        );
        return Err(CliError::NotConfirmed);
    }

    let pool = connect().await?;
    // A running storefront keeps its own principal cache, so every session
    // is dropped instead.
    let principals = PrincipalCache::new();
    let summary = SnapshotService::new(&pool)
        .import(&snapshot, &principals)
        .await?;

    let store = PostgresStore::new(pool.clone());
    store.migrate().await?;
    let dropped = sqlx::query(CLEAR_SESSIONS)
        .execute(&pool)
        .await?
        .rows_affected();

    tracing::info!(
        "Imported {} products and {} users, dropped {dropped} sessions",
        summary.products,
        summary.users
    );
    Ok(())
}
