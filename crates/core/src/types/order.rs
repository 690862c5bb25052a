//! Order status literal.
//!
//! The back-office may set any lowercase status; only a few have meaning to
//! the rest of the system (revenue counts `confirmed` and `delivered`, the
//! dashboard counts `pending`).

use core::fmt;

use serde::{Deserialize, Serialize};

/// Errors that can occur when parsing an [`OrderStatus`].
#[derive(thiserror::Error, Debug, Clone, PartialEq, Eq)]
pub enum OrderStatusError {
    /// The input is empty.
    #[error("order status cannot be empty")]
    Empty,
    /// The input is longer than the maximum length.
    #[error("order status must be at most {max} characters")]
    TooLong {
        /// Maximum allowed length.
        max: usize,
    },
    /// The input contains characters outside `[a-z_]`.
    #[error("order status may only contain lowercase letters and '_'")]
    InvalidCharacter,
}

/// Status of a placed order.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct OrderStatus(String);

impl OrderStatus {
    /// Maximum length of a status literal.
    pub const MAX_LENGTH: usize = 32;

    /// Literal for a freshly placed order.
    pub const PENDING: &'static str = "pending";
    /// Literal for an order accepted by staff.
    pub const CONFIRMED: &'static str = "confirmed";
    /// Literal for a completed order.
    pub const DELIVERED: &'static str = "delivered";

    /// Statuses that count towards revenue.
    pub const REVENUE: [&'static str; 2] = [Self::CONFIRMED, Self::DELIVERED];

    /// Status of a freshly placed order.
    #[must_use]
    pub fn pending() -> Self {
        Self(Self::PENDING.to_owned())
    }

    /// Parse a status submitted by staff.
    ///
    /// # Errors
    ///
    /// Returns an error unless the trimmed input is 1-32 characters of `[a-z_]`.
    pub fn parse(s: &str) -> Result<Self, OrderStatusError> {
        let s = s.trim();
        if s.is_empty() {
            return Err(OrderStatusError::Empty);
        }
        if s.len() > Self::MAX_LENGTH {
            return Err(OrderStatusError::TooLong {
                max: Self::MAX_LENGTH,
            });
        }
        if !s.chars().all(|c| c.is_ascii_lowercase() || c == '_') {
            return Err(OrderStatusError::InvalidCharacter);
        }
        Ok(Self(s.to_owned()))
    }

    /// Returns the status as a string slice.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Whether the order is still awaiting staff action.
    #[must_use]
    pub fn is_pending(&self) -> bool {
        self.0 == Self::PENDING
    }

    /// Whether the order counts towards revenue.
    #[must_use]
    pub fn counts_as_revenue(&self) -> bool {
        Self::REVENUE.contains(&self.0.as_str())
    }
}

impl Default for OrderStatus {
    fn default() -> Self {
        Self::pending()
    }
}

impl TryFrom<String> for OrderStatus {
    type Error = OrderStatusError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::parse(&value)
    }
}

impl From<OrderStatus> for String {
    fn from(status: OrderStatus) -> Self {
        status.0
    }
}

impl fmt::Display for OrderStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl std::str::FromStr for OrderStatus {
    type Err = OrderStatusError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}
