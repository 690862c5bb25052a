//! Role Policy: the fixed privilege order `user < admin < root`.
//!
//! Roles are compared by position, so a route gated at [`Role::Admin`] also
//! admits [`Role::Root`]. The order is the derive order of the enum variants;
//! do not reorder them.

use core::fmt;

use serde::{Deserialize, Serialize};

/// Error returned when a role literal is not one of `user`, `admin`, `root`.
#[derive(thiserror::Error, Debug, Clone, PartialEq, Eq)]
#[error("invalid role: {0}")]
pub struct RoleError(pub String);

/// Account privilege level.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize, Default,
)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    /// Regular shopper.
    #[default]
    User,
    /// Back-office staff: users, orders and review moderation.
    Admin,
    /// Full access, including the catalog and destructive imports.
    Root,
}

impl Role {
    /// All roles, lowest privilege first.
    pub const ALL: [Self; 3] = [Self::User, Self::Admin, Self::Root];

    /// The literal stored in the database.
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::User => "user",
            Self::Admin => "admin",
            Self::Root => "root",
        }
    }

    /// Whether this role meets or exceeds `required`.
    #[must_use]
    pub fn satisfies(self, required: Self) -> bool {
        self >= required
    }

    /// Whether this role may moderate reviews and use the back-office.
    #[must_use]
    pub fn is_staff(self) -> bool {
        self.satisfies(Self::Admin)
    }

    /// Interpret a stored role literal, falling back to [`Role::User`].
    ///
    /// An unrecognised value never grants privilege.
    #[must_use]
    pub fn from_stored_lossy(s: &str) -> Self {
        s.parse().unwrap_or(Self::User)
    }
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for Role {
    type Err = RoleError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim() {
            "user" => Ok(Self::User),
            "admin" => Ok(Self::Admin),
            "root" => Ok(Self::Root),
            other => Err(RoleError(other.to_owned())),
        }
    }
}

/// Outcome of an authorization check.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Decision {
    /// The principal may proceed.
    Allow,
    /// The principal lacks the required role.
    Deny,
}

impl Decision {
    /// Whether this is [`Decision::Allow`].
    #[must_use]
    pub const fn is_allowed(self) -> bool {
        matches!(self, Self::Allow)
    }
}

/// Decide whether a principal holding `role` may access something gated at
/// `required`.
#[must_use]
pub fn authorize(role: Role, required: Role) -> Decision {
    if role.satisfies(required) {
        Decision::Allow
    } else {
        Decision::Deny
    }
}
