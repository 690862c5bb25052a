//! Business logic services for the storefront.
//!
//! # Services
//!
//! - `auth` - Registration, login and password hashing
//! - `checkout` - Cart to order, in one transaction
//! - `principal_cache` - Invalidation records for session-cached roles
//! - `reviews` - Review submission and moderation
//! - `snapshot` - Product and account export/import
//! - `users` - Back-office user management
//!
//! Services borrow the pool for the length of one request; the only state
//! shared across requests is the [`PrincipalCache`].

pub mod auth;
pub mod checkout;
pub mod principal_cache;
pub mod reviews;
pub mod snapshot;
pub mod users;

pub use auth::{AuthError, AuthService, Registration};
pub use checkout::{CheckoutError, CheckoutForm, CheckoutService};
pub use principal_cache::PrincipalCache;
pub use reviews::{ReviewError, ReviewService};
pub use snapshot::{Snapshot, SnapshotError, SnapshotService};
pub use users::{AdminError, UserAdminService};
