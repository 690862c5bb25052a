//! User domain types.

use chrono::{DateTime, Utc};
use serde::Serialize;

use brokeshop_core::{Email, Role, UserId, Username};

/// A shop account (domain type).
///
/// The password hash never leaves the credential store through this type.
#[derive(Debug, Clone, Serialize)]
pub struct User {
    /// Unique user ID.
    pub id: UserId,
    /// Login name.
    pub username: Username,
    /// Contact email address.
    pub email: Email,
    /// Privilege level.
    pub role: Role,
    /// When the account was created.
    pub created_at: DateTime<Utc>,
}
