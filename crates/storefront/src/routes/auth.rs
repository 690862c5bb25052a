//! Authentication route handlers.
//!
//! Registration, login and logout. Successful login rotates the session ID
//! and pins the session to a 24-hour absolute expiry.

use axum::{
    Form, Json,
    extract::{Query, State},
    response::{IntoResponse, Redirect, Response},
};
use chrono::Utc;
use serde::{Deserialize, Serialize};
use tower_sessions::Session;
use tracing::instrument;

use crate::error::{AppError, clear_sentry_user, set_sentry_user};
use crate::middleware::{OptionalAuth, clear_current_user, login_expiry, set_current_user};
use crate::models::CurrentUser;
use crate::routes::flash::{self, FlashQuery};
use crate::services::auth::{AuthService, MIN_PASSWORD_LENGTH, Registration};
use crate::state::AppState;

const LOGIN_PATH: &str = "/auth/login";
const REGISTER_PATH: &str = "/auth/register";
const HOME_PATH: &str = "/shop";

// =============================================================================
// Form Types
// =============================================================================

/// Login form data.
#[derive(Deserialize)]
pub struct LoginForm {
    #[serde(default)]
    pub username: String,
    #[serde(default)]
    pub password: String,
    /// Checkbox; present when ticked.
    #[serde(default)]
    pub privacy: Option<String>,
}

/// Registration form data.
#[derive(Deserialize)]
pub struct RegisterForm {
    #[serde(default)]
    pub username: String,
    #[serde(default)]
    pub email: String,
    #[serde(default)]
    pub password: String,
    #[serde(default)]
    pub confirm_password: String,
    #[serde(default)]
    pub privacy: Option<String>,
}

fn is_ticked(checkbox: Option<&str>) -> bool {
    checkbox.is_some_and(|v| !v.is_empty() && v != "false" && v != "off")
}

// =============================================================================
// View Models
// =============================================================================

/// Login and registration page view.
#[derive(Debug, Serialize)]
pub struct AuthPageView {
    pub page: &'static str,
    pub min_password_length: usize,
    #[serde(flatten)]
    pub flash: FlashQuery,
}

fn session_error(e: &tower_sessions::session::Error) -> AppError {
    AppError::Internal(format!("session error: {e}"))
}

// =============================================================================
// Login Routes
// =============================================================================

/// Display the login page.
pub async fn login_page(
    OptionalAuth(user): OptionalAuth,
    Query(flash): Query<FlashQuery>,
) -> Response {
    if user.is_some() {
        return Redirect::to(HOME_PATH).into_response();
    }
    Json(AuthPageView {
        page: "login",
        min_password_length: MIN_PASSWORD_LENGTH,
        flash,
    })
    .into_response()
}

/// Handle login form submission.
#[instrument(skip(state, session, form), fields(username = %form.username.trim()))]
pub async fn login(
    State(state): State<AppState>,
    session: Session,
    Form(form): Form<LoginForm>,
) -> Response {
    let auth = AuthService::new(state.pool());
    let user = match auth
        .login(&form.username, &form.password, is_ticked(form.privacy.as_deref()))
        .await
    {
        Ok(user) => user,
        Err(e) => return flash::failure(LOGIN_PATH, e),
    };

    // Fixation protection: a fresh ID for the authenticated session.
    if let Err(e) = session.cycle_id().await {
        return session_error(&e).into_response();
    }
    session.set_expiry(Some(login_expiry()));

    let principal = CurrentUser::from_user(&user, Utc::now());
    if let Err(e) = set_current_user(&session, &principal).await {
        return session_error(&e).into_response();
    }

    set_sentry_user(&user.id, Some(user.username.as_str()));
    tracing::info!(user_id = %user.id, role = %user.role, "User logged in");

    flash::success(HOME_PATH, &format!("Welcome, {}!", user.username)).into_response()
}

// =============================================================================
// Registration Routes
// =============================================================================

/// Display the registration page.
pub async fn register_page(
    OptionalAuth(user): OptionalAuth,
    Query(flash): Query<FlashQuery>,
) -> Response {
    if user.is_some() {
        return Redirect::to(HOME_PATH).into_response();
    }
    Json(AuthPageView {
        page: "register",
        min_password_length: MIN_PASSWORD_LENGTH,
        flash,
    })
    .into_response()
}

/// Handle registration form submission.
#[instrument(skip(state, form), fields(username = %form.username.trim()))]
pub async fn register(State(state): State<AppState>, Form(form): Form<RegisterForm>) -> Response {
    let registration = Registration {
        privacy_accepted: is_ticked(form.privacy.as_deref()),
        username: form.username,
        email: form.email,
        password: form.password,
        confirm_password: form.confirm_password,
    };

    match AuthService::new(state.pool()).register(&registration).await {
        Ok(user) => {
            tracing::info!(user_id = %user.id, "User registered");
            flash::success(LOGIN_PATH, "Registration successful, please log in").into_response()
        }
        Err(e) => flash::failure(REGISTER_PATH, e),
    }
}

// =============================================================================
// Logout
// =============================================================================

/// Handle logout.
#[instrument(skip(session))]
pub async fn logout(session: Session) -> Response {
    if let Err(e) = clear_current_user(&session).await {
        tracing::error!("Failed to clear session: {e}");
    }
    clear_sentry_user();

    flash::success(LOGIN_PATH, "You have been logged out").into_response()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_checkbox_values() {
        assert!(is_ticked(Some("on")));
        assert!(is_ticked(Some("true")));
        assert!(!is_ticked(Some("")));
        assert!(!is_ticked(Some("off")));
        assert!(!is_ticked(None));
    }
}
