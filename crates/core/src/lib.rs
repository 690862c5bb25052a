//! BrokeShop Core - Shared domain types.
//!
//! This crate provides the types used across all BrokeShop components:
//! - `storefront` - The shop web application (catalog, cart, checkout, back-office)
//! - `cli` - Command-line tools for migrations, seeding and snapshots
//!
//! # Architecture
//!
//! The core crate contains only types and pure rules - no I/O, no database
//! access, no HTTP. The role policy, review moderation state machine and
//! price arithmetic live here so they can be tested without a store.
//!
//! # Modules
//!
//! - [`types`] - Typed IDs, identities, roles, money, order and review types

#![cfg_attr(not(test), forbid(unsafe_code))]

pub mod types;

pub use types::*;
