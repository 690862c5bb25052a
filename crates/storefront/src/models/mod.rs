//! Domain models for the storefront.
//!
//! These are validated domain objects, separate from the database row types
//! in [`crate::db`]. Most derive `Serialize` because GET endpoints return
//! them as JSON view models.

pub mod cart;
pub mod order;
pub mod product;
pub mod review;
pub mod session;
pub mod user;

pub use cart::{Cart, CartLine};
pub use order::{CheckoutReceipt, DeliveryAddress, Order, OrderItem, OrderSummary, PaymentDetails};
pub use product::{Product, ProductDraft};
pub use review::{Review, ReviewWithAuthor};
pub use session::CurrentUser;
pub use user::User;
