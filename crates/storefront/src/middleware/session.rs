//! Session middleware configuration.
//!
//! Sessions are server-side; the cookie only carries the session ID. The
//! store is a parameter so tests can run against `MemoryStore` while the
//! binary uses `PostgresStore`.

use tower_sessions::{Expiry, SessionManagerLayer, SessionStore, cookie::time::OffsetDateTime};

use crate::config::StorefrontConfig;
use crate::services::principal_cache::SESSION_LIFETIME;

/// Session cookie name.
pub const SESSION_COOKIE_NAME: &str = "bs_session";

/// Create the session layer over `store`.
///
/// Anonymous sessions expire after a day of inactivity. A login replaces
/// this with an absolute expiry, see [`login_expiry`].
#[must_use]
pub fn create_session_layer<S>(store: S, config: &StorefrontConfig) -> SessionManagerLayer<S>
where
    S: SessionStore + Clone,
{
    SessionManagerLayer::new(store)
        .with_name(SESSION_COOKIE_NAME)
        .with_expiry(Expiry::OnInactivity(lifetime()))
        .with_secure(config.secure_cookies())
        .with_same_site(tower_sessions::cookie::SameSite::Lax)
        .with_http_only(true)
        .with_path("/")
}

/// Absolute expiry for a session that just logged in.
#[must_use]
pub fn login_expiry() -> Expiry {
    Expiry::AtDateTime(OffsetDateTime::now_utc() + lifetime())
}

fn lifetime() -> tower_sessions::cookie::time::Duration {
    tower_sessions::cookie::time::Duration::seconds(
        i64::try_from(SESSION_LIFETIME.as_secs()).unwrap_or(i64::MAX),
    )
}
