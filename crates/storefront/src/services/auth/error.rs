//! Authentication error types.

use thiserror::Error;

use brokeshop_core::{EmailError, UsernameError};

use crate::db::RepositoryError;

/// Errors that can occur during authentication operations.
#[derive(Debug, Error)]
pub enum AuthError {
    /// A required form field was blank.
    #[error("{0} is required")]
    MissingField(&'static str),

    /// Invalid username format.
    #[error("invalid username: {0}")]
    InvalidUsername(#[from] UsernameError),

    /// Invalid email format.
    #[error("invalid email: {0}")]
    InvalidEmail(#[from] EmailError),

    /// Password too weak or invalid.
    #[error("password validation failed: {0}")]
    WeakPassword(String),

    /// Password and confirmation differ.
    #[error("passwords do not match")]
    PasswordMismatch,

    /// The privacy agreement checkbox was not ticked.
    #[error("privacy agreement must be accepted")]
    PrivacyNotAccepted,

    /// Invalid credentials (wrong password or user not found).
    #[error("invalid credentials")]
    InvalidCredentials,

    /// User not found.
    #[error("user not found")]
    UserNotFound,

    /// Username or email already taken.
    #[error("user already exists")]
    UserAlreadyExists,

    /// Repository/database error.
    #[error("database error: {0}")]
    Repository(#[from] RepositoryError),

    /// Password hashing error.
    #[error("password hashing error")]
    PasswordHash,
}

impl AuthError {
    /// Whether the caller supplied bad input, as opposed to a server fault.
    #[must_use]
    pub const fn is_client_error(&self) -> bool {
        !matches!(self, Self::Repository(_) | Self::PasswordHash)
    }

    /// Message safe to show on the registration or login form.
    ///
    /// Duplicate accounts get one message regardless of which field collided.
    #[must_use]
    pub fn user_message(&self) -> String {
        match self {
            Self::InvalidCredentials | Self::UserNotFound => {
                "Invalid username or password".to_owned()
            }
            Self::UserAlreadyExists => "username already exists".to_owned(),
            Self::Repository(_) | Self::PasswordHash => "Internal server error".to_owned(),
            other => other.to_string(),
        }
    }
}
