//! Catalog and account snapshots.
//!
//! Export dumps products and users (with their password hashes) as JSON.
//! Import replaces both tables wholesale in one transaction: record IDs are
//! kept, hashes are stored verbatim, and carts, orders and reviews that
//! referenced the old rows go with them.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::{PgConnection, PgPool};
use thiserror::Error;
use tracing::instrument;

use brokeshop_core::{Email, Price, ProductId, Role, UserId, Username};

use super::principal_cache::PrincipalCache;
use crate::db::RepositoryError;

/// Errors from snapshot export and import.
#[derive(Debug, Error)]
pub enum SnapshotError {
    /// The document isn't valid snapshot JSON (bad role, negative price, ...).
    #[error("invalid snapshot: {0}")]
    Parse(#[from] serde_json::Error),

    /// The document parsed but its records don't fit together.
    #[error("invalid snapshot: {0}")]
    Invalid(String),

    #[error(transparent)]
    Repository(#[from] RepositoryError),
}

impl From<sqlx::Error> for SnapshotError {
    fn from(e: sqlx::Error) -> Self {
        Self::Repository(e.into())
    }
}

/// A product as stored in a snapshot.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct SnapshotProduct {
    pub id: ProductId,
    pub name: String,
    #[serde(default)]
    pub description: String,
    pub price: Price,
    #[serde(default)]
    pub category: Option<String>,
    pub image: String,
    pub created_at: DateTime<Utc>,
}

/// A user account as stored in a snapshot, hash included.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct SnapshotUser {
    pub id: UserId,
    pub username: Username,
    pub email: Email,
    pub password_hash: String,
    pub role: Role,
    pub created_at: DateTime<Utc>,
}

/// Full export document.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Snapshot {
    pub products: Vec<SnapshotProduct>,
    pub users: Vec<SnapshotUser>,
    pub exported_at: DateTime<Utc>,
}

impl Snapshot {
    /// Parse a snapshot document.
    ///
    /// # Errors
    ///
    /// Returns `SnapshotError::Parse` if the JSON is malformed or any field
    /// fails validation; roles are parsed strictly.
    pub fn from_json(json: &str) -> Result<Self, SnapshotError> {
        Ok(serde_json::from_str(json)?)
    }

    /// Check cross-record constraints the store would otherwise reject
    /// halfway through an import.
    ///
    /// # Errors
    ///
    /// Returns `SnapshotError::Invalid` naming the first problem found.
    pub fn validate(&self) -> Result<(), SnapshotError> {
        let mut product_ids = std::collections::HashSet::new();
        for product in &self.products {
            if !product_ids.insert(product.id) {
                return Err(invalid(format!("duplicate product id {}", product.id)));
            }
            if product.name.trim().is_empty() {
                return Err(invalid(format!("product {} has no name", product.id)));
            }
        }

        let mut user_ids = std::collections::HashSet::new();
        let mut usernames = std::collections::HashSet::new();
        let mut emails = std::collections::HashSet::new();
        for user in &self.users {
            if !user_ids.insert(user.id) {
                return Err(invalid(format!("duplicate user id {}", user.id)));
            }
            if !usernames.insert(user.username.as_str()) {
                return Err(invalid(format!("duplicate username {}", user.username)));
            }
            if !emails.insert(user.email.as_str()) {
                return Err(invalid(format!("duplicate email {}", user.email)));
            }
            if user.password_hash.is_empty() {
                return Err(invalid(format!("user {} has no password hash", user.id)));
            }
        }

        if !self.users.iter().any(|u| u.role == Role::Root) {
            return Err(invalid("snapshot contains no root account".to_owned()));
        }
        Ok(())
    }
}

fn invalid(message: String) -> SnapshotError {
    SnapshotError::Invalid(message)
}

#[derive(sqlx::FromRow)]
struct SnapshotUserRow {
    id: i32,
    username: String,
    email: String,
    password_hash: String,
    role: String,
    created_at: DateTime<Utc>,
}

#[derive(sqlx::FromRow)]
struct SnapshotProductRow {
    id: i32,
    name: String,
    description: String,
    price: rust_decimal::Decimal,
    category: Option<String>,
    image: String,
    created_at: DateTime<Utc>,
}

/// Counts reported after an import.
#[derive(Debug, Clone, Copy, Serialize)]
pub struct ImportSummary {
    pub products: usize,
    pub users: usize,
}

/// Snapshot service.
pub struct SnapshotService<'a> {
    pool: &'a PgPool,
}

impl<'a> SnapshotService<'a> {
    /// Create a new snapshot service.
    #[must_use]
    pub const fn new(pool: &'a PgPool) -> Self {
        Self { pool }
    }

    /// Dump every product and user.
    ///
    /// # Errors
    ///
    /// Returns `SnapshotError::Repository` if a query fails or a stored row is
    /// invalid (an unknown role literal is reported, not downgraded).
    #[instrument(skip(self))]
    pub async fn export(&self) -> Result<Snapshot, SnapshotError> {
        let product_rows = sqlx::query_as::<_, SnapshotProductRow>(
            "SELECT id, name, description, price, category, image, created_at
             FROM shop.product ORDER BY id",
        )
        .fetch_all(self.pool)
        .await?;

        let user_rows = sqlx::query_as::<_, SnapshotUserRow>(
            "SELECT id, username, email, password_hash, role, created_at
             FROM shop.user_account ORDER BY id",
        )
        .fetch_all(self.pool)
        .await?;

        let products = product_rows
            .into_iter()
            .map(|row| {
                let price = Price::new(row.price).map_err(|e| {
                    RepositoryError::DataCorruption(format!("product {}: {e}", row.id))
                })?;
                Ok(SnapshotProduct {
                    id: ProductId::new(row.id),
                    name: row.name,
                    description: row.description,
                    price,
                    category: row.category,
                    image: row.image,
                    created_at: row.created_at,
                })
            })
            .collect::<Result<Vec<_>, RepositoryError>>()?;

        let users = user_rows
            .into_iter()
            .map(|row| {
                let role = row.role.parse::<Role>().map_err(|e| {
                    RepositoryError::DataCorruption(format!("user {}: {e}", row.id))
                })?;
                Ok(SnapshotUser {
                    id: UserId::new(row.id),
                    username: Username::from_stored(row.username),
                    email: Email::from_stored(row.email),
                    password_hash: row.password_hash,
                    role,
                    created_at: row.created_at,
                })
            })
            .collect::<Result<Vec<_>, RepositoryError>>()?;

        tracing::info!(
            products = products.len(),
            users = users.len(),
            "Snapshot exported"
        );
        Ok(Snapshot {
            products,
            users,
            exported_at: Utc::now(),
        })
    }

    /// Replace all products and users with the snapshot's.
    ///
    /// On success every cached principal is invalidated. On failure nothing
    /// changes.
    ///
    /// # Errors
    ///
    /// Returns `SnapshotError::Invalid` if the snapshot fails
    /// [`Snapshot::validate`].
    /// Returns `SnapshotError::Repository` if any write fails.
    #[instrument(skip_all, fields(products = snapshot.products.len(), users = snapshot.users.len()))]
    pub async fn import(
        &self,
        snapshot: &Snapshot,
        principals: &PrincipalCache,
    ) -> Result<ImportSummary, SnapshotError> {
        snapshot.validate()?;

        let mut tx = self.pool.begin().await?;

        sqlx::query("TRUNCATE shop.user_account, shop.product RESTART IDENTITY CASCADE")
            .execute(&mut *tx)
            .await?;

        for product in &snapshot.products {
            insert_product(&mut tx, product).await?;
        }
        for user in &snapshot.users {
            insert_user(&mut tx, user).await?;
        }

        reset_sequence(&mut tx, "shop.product").await?;
        reset_sequence(&mut tx, "shop.user_account").await?;

        tx.commit().await?;
        principals.invalidate_all().await;

        tracing::warn!("Snapshot imported, all products and users replaced");
        Ok(ImportSummary {
            products: snapshot.products.len(),
            users: snapshot.users.len(),
        })
    }
}

async fn insert_product(
    conn: &mut PgConnection,
    product: &SnapshotProduct,
) -> Result<(), SnapshotError> {
    sqlx::query(
        "INSERT INTO shop.product (id, name, description, price, category, image, created_at)
         VALUES ($1, $2, $3, $4, $5, $6, $7)",
    )
    .bind(product.id)
    .bind(&product.name)
    .bind(&product.description)
    .bind(product.price.amount())
    .bind(&product.category)
    .bind(&product.image)
    .bind(product.created_at)
    .execute(&mut *conn)
    .await?;
    Ok(())
}

async fn insert_user(conn: &mut PgConnection, user: &SnapshotUser) -> Result<(), SnapshotError> {
    sqlx::query(
        "INSERT INTO shop.user_account (id, username, email, password_hash, role, created_at)
         VALUES ($1, $2, $3, $4, $5, $6)",
    )
    .bind(user.id)
    .bind(user.username.as_str())
    .bind(user.email.as_str())
    .bind(&user.password_hash)
    .bind(user.role.as_str())
    .bind(user.created_at)
    .execute(&mut *conn)
    .await?;
    Ok(())
}

/// Point the table's identity sequence past its highest ID.
async fn reset_sequence(conn: &mut PgConnection, table: &str) -> Result<(), SnapshotError> {
    sqlx::query(&format!(
        "SELECT setval(pg_get_serial_sequence('{table}', 'id'),
                       COALESCE((SELECT MAX(id) FROM {table}), 0) + 1,
                       false)"
    ))
    .execute(&mut *conn)
    .await?;
    Ok(())
}
