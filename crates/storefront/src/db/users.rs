//! Credential store: user accounts and their password hashes.

use chrono::{DateTime, Utc};
use sqlx::PgPool;

use brokeshop_core::{Email, Role, UserId, Username};

use super::{RepositoryError, conflict_on_unique};
use crate::models::User;

// =============================================================================
// Internal Row Types
// =============================================================================

/// Internal row type for user queries.
#[derive(Debug, sqlx::FromRow)]
struct UserRow {
    id: i32,
    username: String,
    email: String,
    role: String,
    created_at: DateTime<Utc>,
}

impl From<UserRow> for User {
    fn from(row: UserRow) -> Self {
        let role = Role::from_stored_lossy(&row.role);
        if role.as_str() != row.role {
            tracing::warn!(user_id = row.id, stored = %row.role, "Unknown role literal, treating as user");
        }
        Self {
            id: UserId::new(row.id),
            username: Username::from_stored(row.username),
            email: Email::from_stored(row.email),
            role,
            created_at: row.created_at,
        }
    }
}

/// Internal row type for login lookups.
#[derive(Debug, sqlx::FromRow)]
struct CredentialRow {
    #[sqlx(flatten)]
    user: UserRow,
    password_hash: String,
}

const USER_COLUMNS: &str = "id, username, email, role, created_at";

// =============================================================================
// Repository
// =============================================================================

/// Repository for user database operations.
pub struct UserRepository<'a> {
    pool: &'a PgPool,
}

impl<'a> UserRepository<'a> {
    /// Create a new user repository.
    #[must_use]
    pub const fn new(pool: &'a PgPool) -> Self {
        Self { pool }
    }

    /// Insert a new account.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Conflict` if the username or email is taken.
    /// Returns `RepositoryError::Database` for other database errors.
    pub async fn create(
        &self,
        username: &Username,
        email: &Email,
        password_hash: &str,
        role: Role,
    ) -> Result<User, RepositoryError> {
        let row = sqlx::query_as::<_, UserRow>(&format!(
            "INSERT INTO shop.user_account (username, email, password_hash, role)
             VALUES ($1, $2, $3, $4)
             RETURNING {USER_COLUMNS}"
        ))
        .bind(username.as_str())
        .bind(email.as_str())
        .bind(password_hash)
        .bind(role.as_str())
        .fetch_one(self.pool)
        .await
        .map_err(|e| conflict_on_unique(e, "username or email already exists"))?;

        Ok(row.into())
    }

    /// Get a user by their ID.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    pub async fn get_by_id(&self, id: UserId) -> Result<Option<User>, RepositoryError> {
        let row = sqlx::query_as::<_, UserRow>(&format!(
            "SELECT {USER_COLUMNS} FROM shop.user_account WHERE id = $1"
        ))
        .bind(id)
        .fetch_optional(self.pool)
        .await?;

        Ok(row.map(Into::into))
    }

    /// Get a user by their login name.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    pub async fn get_by_username(
        &self,
        username: &Username,
    ) -> Result<Option<User>, RepositoryError> {
        let row = sqlx::query_as::<_, UserRow>(&format!(
            "SELECT {USER_COLUMNS} FROM shop.user_account WHERE username = $1"
        ))
        .bind(username.as_str())
        .fetch_optional(self.pool)
        .await?;

        Ok(row.map(Into::into))
    }

    /// Get a user by their email address.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    pub async fn get_by_email(&self, email: &Email) -> Result<Option<User>, RepositoryError> {
        let row = sqlx::query_as::<_, UserRow>(&format!(
            "SELECT {USER_COLUMNS} FROM shop.user_account WHERE email = $1"
        ))
        .bind(email.as_str())
        .fetch_optional(self.pool)
        .await?;

        Ok(row.map(Into::into))
    }

    /// Get a user together with their password hash, for login.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    pub async fn get_credentials(
        &self,
        username: &Username,
    ) -> Result<Option<(User, String)>, RepositoryError> {
        let row = sqlx::query_as::<_, CredentialRow>(&format!(
            "SELECT {USER_COLUMNS}, password_hash FROM shop.user_account WHERE username = $1"
        ))
        .bind(username.as_str())
        .fetch_optional(self.pool)
        .await?;

        Ok(row.map(|r| (r.user.into(), r.password_hash)))
    }

    /// List all users, newest first.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    pub async fn list_all(&self) -> Result<Vec<User>, RepositoryError> {
        let rows = sqlx::query_as::<_, UserRow>(&format!(
            "SELECT {USER_COLUMNS} FROM shop.user_account ORDER BY created_at DESC, id DESC"
        ))
        .fetch_all(self.pool)
        .await?;

        Ok(rows.into_iter().map(Into::into).collect())
    }

    /// Count all accounts.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    pub async fn count(&self) -> Result<i64, RepositoryError> {
        let count: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM shop.user_account")
            .fetch_one(self.pool)
            .await?;
        Ok(count)
    }

    /// Delete a user after `check` approves the locked row.
    ///
    /// The target row is read `FOR UPDATE` in the same transaction as the
    /// delete, so a concurrent role change cannot slip between the check and
    /// the write.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::NotFound` if the user doesn't exist.
    /// Returns whatever `check` rejects with.
    /// Returns `RepositoryError::Database` for other database errors.
    pub async fn delete_checked<E, F>(&self, id: UserId, check: F) -> Result<User, E>
    where
        F: FnOnce(&User) -> Result<(), E>,
        E: From<RepositoryError>,
    {
        let mut tx = self.pool.begin().await.map_err(RepositoryError::from)?;

        let target = lock_user(&mut tx, id).await?;
        check(&target)?;

        sqlx::query("DELETE FROM shop.user_account WHERE id = $1")
            .bind(id)
            .execute(&mut *tx)
            .await
            .map_err(RepositoryError::from)?;

        tx.commit().await.map_err(RepositoryError::from)?;

        Ok(target)
    }

    /// Change a user's role after `check` approves the locked row, refusing
    /// to demote the last remaining root.
    ///
    /// Root rows are locked first, then the target, so two concurrent
    /// demotions cannot both pass the last-root check and a concurrent
    /// promotion of the target is seen by `check`.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::NotFound` if the user doesn't exist.
    /// Returns whatever `check` rejects with.
    /// Returns `RepositoryError::Conflict` if the change would leave no root.
    /// Returns `RepositoryError::Database` for other database errors.
    pub async fn update_role_checked<E, F>(
        &self,
        id: UserId,
        role: Role,
        check: F,
    ) -> Result<(User, User), E>
    where
        F: FnOnce(&User) -> Result<(), E>,
        E: From<RepositoryError>,
    {
        let mut tx = self.pool.begin().await.map_err(RepositoryError::from)?;

        let roots: Vec<i32> = sqlx::query_scalar(
            "SELECT id FROM shop.user_account WHERE role = 'root' ORDER BY id FOR UPDATE",
        )
        .fetch_all(&mut *tx)
        .await
        .map_err(RepositoryError::from)?;

        let target = lock_user(&mut tx, id).await?;
        check(&target)?;

        let other_roots = roots.iter().filter(|&&root| root != id.as_i32()).count();
        if target.role == Role::Root && role != Role::Root && other_roots == 0 {
            return Err(RepositoryError::Conflict("cannot demote the last root".to_owned()).into());
        }

        let row = sqlx::query_as::<_, UserRow>(&format!(
            "UPDATE shop.user_account SET role = $2 WHERE id = $1 RETURNING {USER_COLUMNS}"
        ))
        .bind(id)
        .bind(role.as_str())
        .fetch_one(&mut *tx)
        .await
        .map_err(RepositoryError::from)?;

        tx.commit().await.map_err(RepositoryError::from)?;

        Ok((target, row.into()))
    }
}

/// Read a user row `FOR UPDATE` inside `tx`.
async fn lock_user(
    tx: &mut sqlx::Transaction<'_, sqlx::Postgres>,
    id: UserId,
) -> Result<User, RepositoryError> {
    sqlx::query_as::<_, UserRow>(&format!(
        "SELECT {USER_COLUMNS} FROM shop.user_account WHERE id = $1 FOR UPDATE"
    ))
    .bind(id)
    .fetch_optional(&mut **tx)
    .await?
    .map(User::from)
    .ok_or(RepositoryError::NotFound)
}
