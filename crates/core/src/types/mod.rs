//! Core types for BrokeShop.
//!
//! This module provides type-safe wrappers for the shop's domain concepts.

pub mod id;
pub mod identity;
pub mod money;
pub mod order;
pub mod review;
pub mod role;

pub use id::*;
pub use identity::{Email, EmailError, Username, UsernameError};
pub use money::{Price, PriceError, Quantity, QuantityError, cart_total};
pub use order::{OrderStatus, OrderStatusError};
pub use review::{ModerationDecision, ModerationError, Rating, RatingError, RatingSummary, ReviewStatus};
pub use role::{Decision, Role, RoleError, authorize};
