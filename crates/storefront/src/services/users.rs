//! Back-office user management.
//!
//! Each rule check runs against the target row as locked by the write's own
//! transaction. Every change invalidates the target's cached principal so an
//! open session picks up the new role (or loses access) on its next request.

use sqlx::PgPool;
use thiserror::Error;
use tracing::instrument;

use brokeshop_core::{Role, UserId, authorize};

use super::principal_cache::PrincipalCache;
use crate::db::{RepositoryError, UserRepository};
use crate::models::{CurrentUser, User};

/// Errors from user management.
#[derive(Debug, Error)]
pub enum AdminError {
    #[error("you cannot delete your own account")]
    CannotDeleteSelf,

    /// The target's role is too high for the actor, or the requested role is
    /// above the actor's own.
    #[error("insufficient privileges")]
    InsufficientPrivilege,

    #[error("cannot demote the last root")]
    LastRoot,

    #[error("user not found")]
    UserNotFound,

    #[error(transparent)]
    Repository(RepositoryError),
}

impl From<RepositoryError> for AdminError {
    fn from(e: RepositoryError) -> Self {
        match e {
            RepositoryError::NotFound => Self::UserNotFound,
            RepositoryError::Conflict(_) => Self::LastRoot,
            other => Self::Repository(other),
        }
    }
}

impl AdminError {
    /// Whether this error is the caller's fault rather than the store's.
    #[must_use]
    pub const fn is_client_error(&self) -> bool {
        !matches!(self, Self::Repository(_))
    }
}

/// Check whether `actor` may delete `target`.
///
/// # Errors
///
/// Returns `AdminError::CannotDeleteSelf` for self-deletion and
/// `AdminError::InsufficientPrivilege` unless the target ranks strictly below
/// the actor.
pub fn check_delete(actor: &CurrentUser, target: &User) -> Result<(), AdminError> {
    if !authorize(actor.role, Role::Admin).is_allowed() {
        return Err(AdminError::InsufficientPrivilege);
    }
    if actor.id == target.id {
        return Err(AdminError::CannotDeleteSelf);
    }
    if target.role >= actor.role {
        return Err(AdminError::InsufficientPrivilege);
    }
    Ok(())
}

/// Check whether `actor` may give `target` the role `new_role`.
///
/// Root may change anyone; an admin only users below admin, and nobody may
/// grant a role above their own. The last-root guard runs in the store.
///
/// # Errors
///
/// Returns `AdminError::InsufficientPrivilege` if any rule fails.
pub fn check_role_change(
    actor: &CurrentUser,
    target: &User,
    new_role: Role,
) -> Result<(), AdminError> {
    if !authorize(actor.role, Role::Admin).is_allowed() {
        return Err(AdminError::InsufficientPrivilege);
    }
    if new_role > actor.role {
        return Err(AdminError::InsufficientPrivilege);
    }
    if actor.role != Role::Root && target.role >= actor.role {
        return Err(AdminError::InsufficientPrivilege);
    }
    Ok(())
}

/// User management service.
pub struct UserAdminService<'a> {
    users: UserRepository<'a>,
    principals: &'a PrincipalCache,
}

impl<'a> UserAdminService<'a> {
    /// Create a new user management service.
    #[must_use]
    pub const fn new(pool: &'a PgPool, principals: &'a PrincipalCache) -> Self {
        Self {
            users: UserRepository::new(pool),
            principals,
        }
    }

    /// Delete a user on behalf of `actor`.
    ///
    /// # Errors
    ///
    /// Returns `AdminError::UserNotFound` if the target doesn't exist.
    /// Returns the rule violation from [`check_delete`].
    #[instrument(skip(self, actor), fields(actor = %actor.id, target = %target_id))]
    pub async fn delete_user(
        &self,
        actor: &CurrentUser,
        target_id: UserId,
    ) -> Result<(), AdminError> {
        let target = self
            .users
            .delete_checked(target_id, |target| check_delete(actor, target))
            .await?;
        self.principals.invalidate_user(target_id).await;

        tracing::info!(username = %target.username, "User deleted");
        Ok(())
    }

    /// Change a user's role on behalf of `actor`.
    ///
    /// # Errors
    ///
    /// Returns `AdminError::UserNotFound` if the target doesn't exist.
    /// Returns the rule violation from [`check_role_change`].
    /// Returns `AdminError::LastRoot` if this would leave no root.
    #[instrument(skip(self, actor), fields(actor = %actor.id, target = %target_id, role = %new_role))]
    pub async fn update_role(
        &self,
        actor: &CurrentUser,
        target_id: UserId,
        new_role: Role,
    ) -> Result<User, AdminError> {
        let (target, updated) = self
            .users
            .update_role_checked(target_id, new_role, |target| {
                check_role_change(actor, target, new_role)
            })
            .await?;
        self.principals.invalidate_user(target_id).await;

        tracing::info!(from = %target.role, to = %updated.role, "Role updated");
        Ok(updated)
    }
}
