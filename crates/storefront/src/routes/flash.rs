//! Redirect-with-message responses for form posts.
//!
//! A form handler answers with a `303 See Other` to a page, carrying the
//! outcome as `?success=` or `?error=`. The page's GET handler echoes the
//! message back in its view model through [`FlashQuery`].

use axum::response::{IntoResponse, Redirect, Response};
use serde::{Deserialize, Serialize};

use crate::error::AppError;

/// Flash message query parameters accepted by page views.
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct FlashQuery {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub success: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

fn with_message(path: &str, key: &str, message: &str) -> Redirect {
    let separator = if path.contains('?') { '&' } else { '?' };
    Redirect::to(&format!(
        "{path}{separator}{key}={}",
        urlencoding::encode(message)
    ))
}

/// Redirect to `path` with a success message.
#[must_use]
pub fn success(path: &str, message: &str) -> Redirect {
    with_message(path, "success", message)
}

/// Redirect to `path` with an error message.
#[must_use]
pub fn error(path: &str, message: &str) -> Redirect {
    with_message(path, "error", message)
}

/// Answer a failed form post.
///
/// Client errors go back to `path` with their public message. Server errors
/// are rendered as an error response and reported.
pub fn failure(path: &str, err: impl Into<AppError>) -> Response {
    let err = err.into();
    if err.is_client_error() {
        err.report();
        error(path, &err.public_message()).into_response()
    } else {
        err.into_response()
    }
}
