//! Authentication service: registration, login and account creation.
//!
//! Passwords are hashed with Argon2id into PHC strings. A stored hash in any
//! other format (for example bcrypt from an old import) never verifies, so
//! such accounts cannot log in until an operator resets them.

mod error;

pub use error::AuthError;

use argon2::{
    Argon2,
    password_hash::{PasswordHash, PasswordHasher, PasswordVerifier, SaltString, rand_core::OsRng},
};
use sqlx::PgPool;

use brokeshop_core::{Email, Role, UserId, Username};

use crate::db::RepositoryError;
use crate::db::users::UserRepository;
use crate::models::User;

/// Minimum password length.
pub const MIN_PASSWORD_LENGTH: usize = 6;

/// Maximum password length, bounding hashing cost.
const MAX_PASSWORD_LENGTH: usize = 128;

/// Registration form input.
#[derive(Debug, Clone, Default)]
pub struct Registration {
    pub username: String,
    pub email: String,
    pub password: String,
    pub confirm_password: String,
    pub privacy_accepted: bool,
}

/// Authentication service.
pub struct AuthService<'a> {
    users: UserRepository<'a>,
}

impl<'a> AuthService<'a> {
    /// Create a new authentication service.
    #[must_use]
    pub const fn new(pool: &'a PgPool) -> Self {
        Self {
            users: UserRepository::new(pool),
        }
    }

    /// Register a new shopper account with the `user` role.
    ///
    /// # Errors
    ///
    /// Returns a validation variant if any field is missing or malformed.
    /// Returns `AuthError::UserAlreadyExists` if the username or email is taken.
    pub async fn register(&self, form: &Registration) -> Result<User, AuthError> {
        let (username, email) = validate_registration(form)?;
        self.create_account(&username, &email, &form.password, Role::User)
            .await
    }

    /// Create an account with an explicit role, skipping form-only checks.
    ///
    /// # Errors
    ///
    /// Returns `AuthError::WeakPassword` if the password doesn't meet requirements.
    /// Returns `AuthError::UserAlreadyExists` if the username or email is taken.
    pub async fn create_account(
        &self,
        username: &Username,
        email: &Email,
        password: &str,
        role: Role,
    ) -> Result<User, AuthError> {
        validate_password(password)?;
        let password_hash = hash_password(password)?;

        let user = self
            .users
            .create(username, email, &password_hash, role)
            .await
            .map_err(|e| match e {
                RepositoryError::Conflict(_) => AuthError::UserAlreadyExists,
                other => AuthError::Repository(other),
            })?;

        tracing::info!(user_id = %user.id, role = %user.role, "Account created");
        Ok(user)
    }

    /// Login with username and password.
    ///
    /// # Errors
    ///
    /// Returns `AuthError::PrivacyNotAccepted` if the agreement wasn't ticked.
    /// Returns `AuthError::InvalidCredentials` if the username/password is wrong.
    pub async fn login(
        &self,
        username: &str,
        password: &str,
        privacy_accepted: bool,
    ) -> Result<User, AuthError> {
        let username = username.trim();
        if username.is_empty() {
            return Err(AuthError::MissingField("username"));
        }
        if password.is_empty() {
            return Err(AuthError::MissingField("password"));
        }
        if !privacy_accepted {
            return Err(AuthError::PrivacyNotAccepted);
        }

        // Stored names may predate current validation, so look up verbatim.
        let lookup = Username::from_stored(username.to_owned());
        let (user, password_hash) = self
            .users
            .get_credentials(&lookup)
            .await?
            .ok_or(AuthError::InvalidCredentials)?;

        verify_password(password, &password_hash)?;

        Ok(user)
    }

    /// Get a user by ID.
    ///
    /// # Errors
    ///
    /// Returns `AuthError::UserNotFound` if the user doesn't exist.
    pub async fn get_user(&self, user_id: UserId) -> Result<User, AuthError> {
        self.users
            .get_by_id(user_id)
            .await?
            .ok_or(AuthError::UserNotFound)
    }
}

// =============================================================================
// Helpers
// =============================================================================

/// Validate a registration form without touching the store.
///
/// # Errors
///
/// Returns the first failing check, in form order.
pub fn validate_registration(form: &Registration) -> Result<(Username, Email), AuthError> {
    if form.username.trim().is_empty() {
        return Err(AuthError::MissingField("username"));
    }
    if form.email.trim().is_empty() {
        return Err(AuthError::MissingField("email"));
    }
    if form.password.is_empty() {
        return Err(AuthError::MissingField("password"));
    }
    if form.confirm_password.is_empty() {
        return Err(AuthError::MissingField("password confirmation"));
    }
    if !form.privacy_accepted {
        return Err(AuthError::PrivacyNotAccepted);
    }
    if form.password != form.confirm_password {
        return Err(AuthError::PasswordMismatch);
    }
    validate_password(&form.password)?;

    let username = Username::parse(&form.username)?;
    let email = Email::parse(&form.email)?;
    Ok((username, email))
}

/// Validate password strength.
fn validate_password(password: &str) -> Result<(), AuthError> {
    let len = password.chars().count();
    if len < MIN_PASSWORD_LENGTH {
        return Err(AuthError::WeakPassword(format!(
            "password must be at least {MIN_PASSWORD_LENGTH} characters"
        )));
    }
    if len > MAX_PASSWORD_LENGTH {
        return Err(AuthError::WeakPassword(format!(
            "password must be at most {MAX_PASSWORD_LENGTH} characters"
        )));
    }
    Ok(())
}

/// Hash a password using Argon2id.
///
/// # Errors
///
/// Returns `AuthError::PasswordHash` if hashing fails.
pub fn hash_password(password: &str) -> Result<String, AuthError> {
    let salt = SaltString::generate(&mut OsRng);
    let argon2 = Argon2::default();

    argon2
        .hash_password(password.as_bytes(), &salt)
        .map(|hash| hash.to_string())
        .map_err(|_| AuthError::PasswordHash)
}

/// Verify a password against a stored hash.
///
/// # Errors
///
/// Returns `AuthError::InvalidCredentials` if the hash is malformed or the
/// password doesn't match.
pub fn verify_password(password: &str, hash: &str) -> Result<(), AuthError> {
    let parsed_hash = PasswordHash::new(hash).map_err(|_| AuthError::InvalidCredentials)?;
    let argon2 = Argon2::default();

    argon2
        .verify_password(password.as_bytes(), &parsed_hash)
        .map_err(|_| AuthError::InvalidCredentials)
}
