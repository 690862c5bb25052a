//! Invalidation records for session-cached roles.
//!
//! A login copies the user's role into the session. Anything that changes a
//! role or removes a user records an invalidation here, and the session gate
//! reloads any principal whose copy predates a matching record.
//!
//! | Event | Record |
//! |-------|--------|
//! | role update, user deletion | [`CacheScope::User`] |
//! | snapshot import | [`CacheScope::Everyone`] |
//! | logout | none, the session itself is flushed |
//!
//! Records expire after the session lifetime, since no session can be older.
//! The cache is per process; a multi-instance deployment would need a shared
//! store for these records.

use std::time::Duration;

use chrono::{DateTime, Utc};
use moka::future::Cache;

use brokeshop_core::UserId;

use crate::models::CurrentUser;

/// Longest a session can live, and so the longest a record matters.
pub const SESSION_LIFETIME: Duration = Duration::from_secs(24 * 60 * 60);

/// What an invalidation record applies to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum CacheScope {
    /// Every session.
    Everyone,
    /// Sessions of one user.
    User(UserId),
}

/// In-process invalidation timestamps keyed by scope.
#[derive(Clone)]
pub struct PrincipalCache {
    invalidations: Cache<CacheScope, DateTime<Utc>>,
}

impl PrincipalCache {
    /// Create an empty cache.
    #[must_use]
    pub fn new() -> Self {
        Self {
            invalidations: Cache::builder()
                .max_capacity(100_000)
                .time_to_live(SESSION_LIFETIME)
                .build(),
        }
    }

    /// Record that one user's cached role is no longer trustworthy.
    pub async fn invalidate_user(&self, user_id: UserId) {
        tracing::debug!(%user_id, "Invalidating cached principal");
        self.invalidations
            .insert(CacheScope::User(user_id), Utc::now())
            .await;
    }

    /// Record that every cached role is no longer trustworthy.
    pub async fn invalidate_all(&self) {
        tracing::debug!("Invalidating all cached principals");
        self.invalidations
            .insert(CacheScope::Everyone, Utc::now())
            .await;
    }

    /// Whether the principal's role was cached before a matching invalidation.
    pub async fn is_stale(&self, principal: &CurrentUser) -> bool {
        for scope in [CacheScope::Everyone, CacheScope::User(principal.id)] {
            if let Some(at) = self.invalidations.get(&scope).await
                && at >= principal.role_cached_at
            {
                return true;
            }
        }
        false
    }
}

impl Default for PrincipalCache {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use brokeshop_core::{Role, Username};

    use super::*;

    fn principal(id: i32, cached_at: DateTime<Utc>) -> CurrentUser {
        CurrentUser {
            id: UserId::new(id),
            username: Username::from_stored(format!("user{id}")),
            role: Role::Admin,
            role_cached_at: cached_at,
        }
    }

    #[tokio::test]
    async fn test_fresh_principal_is_not_stale() {
        let cache = PrincipalCache::new();
        assert!(!cache.is_stale(&principal(1, Utc::now())).await);
    }

    #[tokio::test]
    async fn test_user_invalidation_affects_only_that_user() {
        let cache = PrincipalCache::new();
        let before = Utc::now() - chrono::Duration::seconds(1);
        cache.invalidate_user(UserId::new(1)).await;

        assert!(cache.is_stale(&principal(1, before)).await);
        assert!(!cache.is_stale(&principal(2, before)).await);
    }

    #[tokio::test]
    async fn test_global_invalidation_affects_everyone() {
        let cache = PrincipalCache::new();
        let before = Utc::now() - chrono::Duration::seconds(1);
        cache.invalidate_all().await;

        assert!(cache.is_stale(&principal(1, before)).await);
        assert!(cache.is_stale(&principal(2, before)).await);
    }

    #[tokio::test]
    async fn test_refreshed_principal_is_not_stale() {
        let cache = PrincipalCache::new();
        cache.invalidate_user(UserId::new(1)).await;
        let after = Utc::now() + chrono::Duration::seconds(1);

        assert!(!cache.is_stale(&principal(1, after)).await);
    }
}
