//! ModernStore Core - Shared domain types.
//!
//! The storefront binary talks to an external commerce backend that owns
//! inventory, pricing and order state. This crate holds the small amount of
//! domain knowledge the storefront still needs on its side:
//!
//! - type-safe ids for backend entities
//! - decimal prices and their display format
//! - order status labels and which statuses a customer may cancel
//! - stock level bands used by the admin product table
//! - the shipping estimate shown on the cart page
//!
//! # Architecture
//!
//! The core crate contains only types and pure functions - no I/O, no HTTP
//! clients, no session access. This keeps it trivially unit-testable.
//!
//! # Modules
//!
//! - [`types`] - Newtype wrappers and enums for ids, prices, emails and statuses
//! - [`shipping`] - Shipping policy and cart totals

#![cfg_attr(not(test), forbid(unsafe_code))]

pub mod shipping;
pub mod types;

pub use shipping::{CartLine, CartTotals, ShippingPolicy};
pub use types::*;
