//! Session gate: authentication and role extractors.
//!
//! A request is authenticated when its session holds a [`CurrentUser`]. The
//! principal's role is a copy taken at login; when the [`PrincipalCache`]
//! reports an invalidation newer than that copy, the gate reloads the user
//! from the credential store before trusting it. A user that no longer exists,
//! or whose id now names a different account, has their session flushed. A store failure during the reload leaves the
//! request unauthenticated.
//!
//! Denials:
//!
//! An API request is one under `/api/`, one sending a JSON body, one whose
//! `Accept` asks for JSON, or an `XMLHttpRequest`.
//!
//! | Situation | Page request | API request |
//! |-----------|--------------|-------------|
//! | not logged in | redirect `/auth/login` | 401 |
//! | role too low | redirect `/shop?error=...` | 403 |
//!
//! [`PrincipalCache`]: crate::services::PrincipalCache

use std::marker::PhantomData;

use axum::{
    extract::{FromRef, FromRequestParts},
    http::{HeaderMap, HeaderName, StatusCode, header, request::Parts},
    response::{IntoResponse, Redirect, Response},
};
use chrono::Utc;
use tower_sessions::Session;

use brokeshop_core::{Decision, Role, authorize};

use crate::db::UserRepository;
use crate::models::{CurrentUser, session::keys};
use crate::routes::flash;
use crate::state::AppState;

/// Where unauthenticated page requests are sent.
pub const LOGIN_PATH: &str = "/auth/login";

/// Where authenticated but unauthorized page requests are sent.
pub const HOME_PATH: &str = "/shop";

const X_REQUESTED_WITH: HeaderName = HeaderName::from_static("x-requested-with");

/// Error returned when the gate denies a request.
#[derive(Debug)]
pub enum AuthRejection {
    /// Redirect to login page (for page requests).
    RedirectToLogin,
    /// Unauthorized response (for API requests).
    Unauthorized,
    /// Redirect home with a message (for page requests).
    RedirectForbidden,
    /// Forbidden response (for API requests).
    Forbidden,
}

impl AuthRejection {
    fn unauthenticated(parts: &Parts) -> Self {
        if is_api(parts) {
            Self::Unauthorized
        } else {
            Self::RedirectToLogin
        }
    }

    fn forbidden(parts: &Parts) -> Self {
        if is_api(parts) {
            Self::Forbidden
        } else {
            Self::RedirectForbidden
        }
    }
}

impl IntoResponse for AuthRejection {
    fn into_response(self) -> Response {
        match self {
            Self::RedirectToLogin => Redirect::to(LOGIN_PATH).into_response(),
            Self::Unauthorized => StatusCode::UNAUTHORIZED.into_response(),
            Self::RedirectForbidden => {
                flash::error(HOME_PATH, "Access denied: insufficient privileges").into_response()
            }
            Self::Forbidden => StatusCode::FORBIDDEN.into_response(),
        }
    }
}

fn is_api(parts: &Parts) -> bool {
    parts.uri.path().starts_with("/api/") || wants_json(&parts.headers)
}

/// Whether the client sends JSON, asks for JSON back, or is a script
/// (`X-Requested-With: XMLHttpRequest`).
#[must_use]
pub fn wants_json(headers: &HeaderMap) -> bool {
    header_str(headers, header::CONTENT_TYPE).is_some_and(|ct| ct.starts_with("application/json"))
        || header_str(headers, header::ACCEPT)
            .is_some_and(|accept| accept.contains("application/json"))
        || header_str(headers, X_REQUESTED_WITH)
            .is_some_and(|x| x.eq_ignore_ascii_case("XMLHttpRequest"))
}

fn header_str(headers: &HeaderMap, name: HeaderName) -> Option<&str> {
    headers.get(name).and_then(|v| v.to_str().ok())
}

/// Resolve the session's principal, refreshing a stale cached role.
///
/// Returns `None` for every way authentication can fail.
async fn authenticate(parts: &Parts, state: &AppState) -> Option<CurrentUser> {
    let session = parts.extensions.get::<Session>()?;

    let principal = match session.get::<CurrentUser>(keys::CURRENT_USER).await {
        Ok(principal) => principal?,
        Err(e) => {
            tracing::warn!(error = %e, "Failed to read session");
            return None;
        }
    };

    if !state.principals().is_stale(&principal).await {
        return Some(principal);
    }

    let user = match UserRepository::new(state.pool()).get_by_id(principal.id).await {
        Ok(user) => user,
        Err(e) => {
            tracing::warn!(user_id = %principal.id, error = %e, "Principal refresh failed");
            return None;
        }
    };

    match user.and_then(|user| principal.refreshed(&user, Utc::now())) {
        Some(refreshed) => {
            if refreshed.role != principal.role {
                tracing::info!(
                    user_id = %refreshed.id,
                    from = %principal.role,
                    to = %refreshed.role,
                    "Cached role refreshed"
                );
            }
            if let Err(e) = set_current_user(session, &refreshed).await {
                tracing::warn!(error = %e, "Failed to store refreshed principal");
            }
            Some(refreshed)
        }
        None => {
            tracing::info!(user_id = %principal.id, "Session account no longer exists");
            if let Err(e) = session.flush().await {
                tracing::warn!(error = %e, "Failed to flush session");
            }
            None
        }
    }
}

/// Extractor that requires an authenticated user of any role.
///
/// # Example
///
/// ```rust,ignore
/// async fn protected_handler(
///     RequireAuth(user): RequireAuth,
/// ) -> impl IntoResponse {
///     format!("Hello, {}!", user.username)
/// }
/// ```
pub struct RequireAuth(pub CurrentUser);

impl<S> FromRequestParts<S> for RequireAuth
where
    AppState: FromRef<S>,
    S: Send + Sync,
{
    type Rejection = AuthRejection;

    async fn from_request_parts(parts: &mut Parts, state: &S) -> Result<Self, Self::Rejection> {
        let state = AppState::from_ref(state);
        authenticate(parts, &state)
            .await
            .map(Self)
            .ok_or_else(|| AuthRejection::unauthenticated(parts))
    }
}

/// Extractor that optionally gets the current user.
///
/// Unlike `RequireAuth`, this does not reject the request if nobody is logged in.
pub struct OptionalAuth(pub Option<CurrentUser>);

impl<S> FromRequestParts<S> for OptionalAuth
where
    AppState: FromRef<S>,
    S: Send + Sync,
{
    type Rejection = std::convert::Infallible;

    async fn from_request_parts(parts: &mut Parts, state: &S) -> Result<Self, Self::Rejection> {
        let state = AppState::from_ref(state);
        Ok(Self(authenticate(parts, &state).await))
    }
}

/// A minimum role, as a type.
pub trait RoleGate: Send + Sync {
    /// Lowest role admitted.
    const REQUIRED: Role;
}

/// Admits admin and root.
pub struct AdminGate;

impl RoleGate for AdminGate {
    const REQUIRED: Role = Role::Admin;
}

/// Admits root only.
pub struct RootGate;

impl RoleGate for RootGate {
    const REQUIRED: Role = Role::Root;
}

/// Extractor that requires an authenticated user whose role satisfies `G`.
pub struct RequireRole<G> {
    pub user: CurrentUser,
    _gate: PhantomData<G>,
}

impl<G> RequireRole<G> {
    /// The authorized principal.
    #[must_use]
    pub fn into_inner(self) -> CurrentUser {
        self.user
    }
}

/// Back-office access: admin or root.
pub type RequireAdmin = RequireRole<AdminGate>;

/// Catalog management and destructive operations: root only.
pub type RequireRoot = RequireRole<RootGate>;

impl<S, G> FromRequestParts<S> for RequireRole<G>
where
    AppState: FromRef<S>,
    S: Send + Sync,
    G: RoleGate,
{
    type Rejection = AuthRejection;

    async fn from_request_parts(parts: &mut Parts, state: &S) -> Result<Self, Self::Rejection> {
        let RequireAuth(user) = RequireAuth::from_request_parts(parts, state).await?;

        match authorize(user.role, G::REQUIRED) {
            Decision::Allow => Ok(Self {
                user,
                _gate: PhantomData,
            }),
            Decision::Deny => {
                tracing::info!(
                    user_id = %user.id,
                    role = %user.role,
                    required = %G::REQUIRED,
                    path = %parts.uri.path(),
                    "Access denied"
                );
                Err(AuthRejection::forbidden(parts))
            }
        }
    }
}

/// Store the principal in the session.
///
/// # Errors
///
/// Returns an error if the session cannot be modified.
pub async fn set_current_user(
    session: &Session,
    user: &CurrentUser,
) -> Result<(), tower_sessions::session::Error> {
    session.insert(keys::CURRENT_USER, user).await
}

/// End the session entirely (logout).
///
/// # Errors
///
/// Returns an error if the session store cannot delete the record.
pub async fn clear_current_user(session: &Session) -> Result<(), tower_sessions::session::Error> {
    session.flush().await
}
