//! Session-related types.
//!
//! Types stored in the session for authentication state.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use brokeshop_core::{Role, UserId, Username};

use super::User;

/// Session-stored principal.
///
/// The role is a cached copy of the stored role, valid as of
/// `role_cached_at`. The session gate refreshes it when the principal cache
/// reports an invalidation recorded after that instant.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CurrentUser {
    /// User's database ID.
    pub id: UserId,
    /// Login name, for display.
    pub username: Username,
    /// Cached role.
    pub role: Role,
    /// When `role` was read from the store.
    pub role_cached_at: DateTime<Utc>,
}

impl CurrentUser {
    /// Principal for a user freshly read from the store.
    #[must_use]
    pub fn from_user(user: &User, now: DateTime<Utc>) -> Self {
        Self {
            id: user.id,
            username: user.username.clone(),
            role: user.role,
            role_cached_at: now,
        }
    }

    /// This principal re-read from `user`, or `None` if the row under this
    /// id now belongs to a different account.
    ///
    /// Ids survive a snapshot import but may name someone else afterwards;
    /// the username is what ties a session to its account.
    #[must_use]
    pub fn refreshed(&self, user: &User, now: DateTime<Utc>) -> Option<Self> {
        (self.id == user.id && self.username == user.username).then(|| Self::from_user(user, now))
    }
}

/// Session keys for authentication data.
pub mod keys {
    /// Key for storing the current logged-in user.
    pub const CURRENT_USER: &str = "current_user";
}
