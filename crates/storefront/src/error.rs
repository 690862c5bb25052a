//! Unified error handling with Sentry integration.
//!
//! Provides a unified `AppError` type that captures errors to Sentry before
//! responding to the client. All route handlers should return `Result<T, AppError>`.

use axum::{
    http::{HeaderValue, StatusCode, header},
    response::{IntoResponse, Response},
};
use thiserror::Error;

use crate::db::{RepositoryError, cart::CartError};
use crate::services::{AdminError, AuthError, CheckoutError, ReviewError, SnapshotError};

/// Seconds a client should wait after a 503 from a store timeout.
const RETRY_AFTER_SECS: &str = "5";

/// Application-level error type for the storefront.
#[derive(Debug, Error)]
pub enum AppError {
    /// Database operation failed.
    #[error("Database error: {0}")]
    Database(#[from] RepositoryError),

    /// Authentication operation failed.
    #[error("Auth error: {0}")]
    Auth(#[from] AuthError),

    /// Cart mutation failed.
    #[error("Cart error: {0}")]
    Cart(#[from] CartError),

    /// Checkout failed; nothing was written.
    #[error("Checkout error: {0}")]
    Checkout(#[from] CheckoutError),

    /// Review operation failed.
    #[error("Review error: {0}")]
    Review(#[from] ReviewError),

    /// User management failed.
    #[error("Admin error: {0}")]
    Admin(#[from] AdminError),

    /// Snapshot export or import failed.
    #[error("Snapshot error: {0}")]
    Snapshot(#[from] SnapshotError),

    /// Resource not found.
    #[error("Not found: {0}")]
    NotFound(String),

    /// Bad request from client.
    #[error("Bad request: {0}")]
    BadRequest(String),

    /// Internal server error.
    #[error("Internal error: {0}")]
    Internal(String),
}

impl AppError {
    /// The repository error underneath, if any.
    fn repository(&self) -> Option<&RepositoryError> {
        match self {
            Self::Database(e)
            | Self::Auth(AuthError::Repository(e))
            | Self::Cart(CartError::Repository(e))
            | Self::Checkout(CheckoutError::Repository(e))
            | Self::Review(ReviewError::Repository(e))
            | Self::Admin(AdminError::Repository(e))
            | Self::Snapshot(SnapshotError::Repository(e)) => Some(e),
            _ => None,
        }
    }

    /// HTTP status for this error.
    #[must_use]
    pub fn status(&self) -> StatusCode {
        if let Some(e) = self.repository() {
            return match e {
                RepositoryError::Timeout => StatusCode::SERVICE_UNAVAILABLE,
                RepositoryError::NotFound => StatusCode::NOT_FOUND,
                RepositoryError::Conflict(_) => StatusCode::CONFLICT,
                RepositoryError::Database(_) | RepositoryError::DataCorruption(_) => {
                    StatusCode::INTERNAL_SERVER_ERROR
                }
            };
        }

        match self {
            Self::Auth(err) => match err {
                AuthError::InvalidCredentials | AuthError::UserNotFound => StatusCode::UNAUTHORIZED,
                AuthError::UserAlreadyExists => StatusCode::CONFLICT,
                AuthError::PasswordHash => StatusCode::INTERNAL_SERVER_ERROR,
                _ => StatusCode::BAD_REQUEST,
            },
            Self::Cart(CartError::ProductNotFound) => StatusCode::NOT_FOUND,
            Self::Review(err) => match err {
                ReviewError::AlreadyReviewed | ReviewError::AlreadyModerated(_) => {
                    StatusCode::CONFLICT
                }
                ReviewError::ProductNotFound | ReviewError::NotFound => StatusCode::NOT_FOUND,
                ReviewError::Forbidden => StatusCode::FORBIDDEN,
                _ => StatusCode::BAD_REQUEST,
            },
            Self::Admin(err) => match err {
                AdminError::UserNotFound => StatusCode::NOT_FOUND,
                AdminError::LastRoot => StatusCode::CONFLICT,
                _ => StatusCode::FORBIDDEN,
            },
            Self::NotFound(_) => StatusCode::NOT_FOUND,
            Self::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
            Self::Cart(_) | Self::Checkout(_) | Self::Snapshot(_) | Self::BadRequest(_) => {
                StatusCode::BAD_REQUEST
            }
            // Repository-backed variants returned above.
            Self::Database(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    /// Whether this error should be reported to the caller as their fault.
    #[must_use]
    pub fn is_client_error(&self) -> bool {
        self.status().is_client_error()
    }

    /// Message safe to show the caller. Internal details are never included.
    #[must_use]
    pub fn public_message(&self) -> String {
        match self.repository() {
            Some(RepositoryError::Timeout) => {
                return "Service temporarily unavailable, please retry".to_owned();
            }
            Some(RepositoryError::NotFound) => return "Not found".to_owned(),
            Some(RepositoryError::Conflict(what)) => return what.clone(),
            Some(_) => return "Internal server error".to_owned(),
            None => {}
        }

        match self {
            Self::Auth(err) => err.user_message(),
            Self::Cart(err) => err.to_string(),
            Self::Checkout(err) => err.to_string(),
            Self::Review(err) => err.to_string(),
            Self::Admin(err) => err.to_string(),
            Self::Snapshot(err) => err.to_string(),
            Self::NotFound(what) => format!("{what} not found"),
            Self::BadRequest(msg) => msg.clone(),
            Self::Internal(_) | Self::Database(_) => "Internal server error".to_owned(),
        }
    }

    /// Log and report server-side failures; client errors are only traced.
    pub(crate) fn report(&self) {
        let status = self.status();
        if status.is_server_error() {
            let event_id = sentry::capture_error(self);
            tracing::error!(
                error = %self,
                sentry_event_id = %event_id,
                "Request error"
            );
        } else {
            tracing::debug!(error = %self, %status, "Request rejected");
        }
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        self.report();

        let status = self.status();
        let mut response = (status, self.public_message()).into_response();
        if status == StatusCode::SERVICE_UNAVAILABLE {
            response
                .headers_mut()
                .insert(header::RETRY_AFTER, HeaderValue::from_static(RETRY_AFTER_SECS));
        }
        response
    }
}

/// Result type alias for `AppError`.
pub type Result<T> = std::result::Result<T, AppError>;

/// Set the Sentry user context.
///
/// Call this after successful authentication to associate errors with users.
pub fn set_sentry_user(user_id: &impl ToString, username: Option<&str>) {
    sentry::configure_scope(|scope| {
        scope.set_user(Some(sentry::User {
            id: Some(user_id.to_string()),
            username: username.map(String::from),
            ..Default::default()
        }));
    });
}

/// Clear the Sentry user context.
///
/// Call this on logout to stop associating errors with the user.
pub fn clear_sentry_user() {
    sentry::configure_scope(|scope| {
        scope.set_user(None);
    });
}

/// Add a breadcrumb for user actions.
///
/// Breadcrumbs appear in Sentry error reports to show the trail of user actions
/// leading up to an error.
///
/// # Example
///
/// ```rust,ignore
/// add_breadcrumb("cart", "Added to cart", Some(&[("product_id", "3")]));
/// ```
pub fn add_breadcrumb(category: &str, message: &str, data: Option<&[(&str, &str)]>) {
    let mut breadcrumb = sentry::Breadcrumb {
        category: Some(category.to_string()),
        message: Some(message.to_string()),
        level: sentry::Level::Info,
        ..Default::default()
    };

    if let Some(pairs) = data {
        for (key, value) in pairs {
            breadcrumb.data.insert(
                (*key).to_string(),
                serde_json::Value::String((*value).to_string()),
            );
        }
    }

    sentry::add_breadcrumb(breadcrumb);
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use brokeshop_core::ModerationError;
    use brokeshop_core::ReviewStatus;

    use super::*;

    fn get_status(err: AppError) -> StatusCode {
        err.into_response().status()
    }

    #[test]
    fn test_app_error_display() {
        let err = AppError::NotFound("product-123".to_string());
        assert_eq!(err.to_string(), "Not found: product-123");

        let err = AppError::BadRequest("invalid input".to_string());
        assert_eq!(err.to_string(), "Bad request: invalid input");
    }

    #[test]
    fn test_app_error_status_codes() {
        assert_eq!(
            get_status(AppError::NotFound("test".to_string())),
            StatusCode::NOT_FOUND
        );
        assert_eq!(
            get_status(AppError::BadRequest("test".to_string())),
            StatusCode::BAD_REQUEST
        );
        assert_eq!(
            get_status(AppError::Internal("test".to_string())),
            StatusCode::INTERNAL_SERVER_ERROR
        );
    }

    #[test]
    fn test_domain_error_status_codes() {
        assert_eq!(
            get_status(ReviewError::AlreadyReviewed.into()),
            StatusCode::CONFLICT
        );
        assert_eq!(
            get_status(
                ReviewError::AlreadyModerated(ModerationError::AlreadyModerated(
                    ReviewStatus::Approved
                ))
                .into()
            ),
            StatusCode::CONFLICT
        );
        assert_eq!(
            get_status(AdminError::InsufficientPrivilege.into()),
            StatusCode::FORBIDDEN
        );
        assert_eq!(get_status(AdminError::LastRoot.into()), StatusCode::CONFLICT);
        assert_eq!(
            get_status(CheckoutError::EmptyCart.into()),
            StatusCode::BAD_REQUEST
        );
        assert_eq!(
            get_status(CartError::ProductNotFound.into()),
            StatusCode::NOT_FOUND
        );
        assert_eq!(
            get_status(AuthError::UserAlreadyExists.into()),
            StatusCode::CONFLICT
        );
    }

    #[test]
    fn test_timeout_is_503_with_retry_after() {
        let response = AppError::from(CheckoutError::Repository(RepositoryError::Timeout))
            .into_response();
        assert_eq!(response.status(), StatusCode::SERVICE_UNAVAILABLE);
        assert_eq!(
            response.headers().get(header::RETRY_AFTER).unwrap(),
            RETRY_AFTER_SECS
        );
    }

    #[test]
    fn test_internal_details_hidden() {
        let err = AppError::Internal("connection string postgres://secret".to_owned());
        assert_eq!(err.public_message(), "Internal server error");

        let err = AppError::Database(RepositoryError::DataCorruption("row 7".to_owned()));
        assert_eq!(err.public_message(), "Internal server error");
    }

    #[test]
    fn test_public_messages() {
        assert_eq!(
            AppError::from(ReviewError::AlreadyReviewed).public_message(),
            "already reviewed"
        );
        assert_eq!(
            AppError::from(AuthError::UserAlreadyExists).public_message(),
            "username already exists"
        );
        assert_eq!(
            AppError::from(CheckoutError::EmptyCart).public_message(),
            "cart is empty"
        );
    }
}
