//! Emporium Core - Shared domain types.
//!
//! This crate provides common types used across all Emporium components:
//! - `server` - Storefront and admin JSON API
//! - `cli` - Migrations, admin bootstrap and maintenance scripts
//!
//! # Architecture
//!
//! The core crate contains only types and pure functions - no I/O, no database
//! access, no HTTP clients. This keeps it lightweight and allows it to be used
//! anywhere.
//!
//! # Modules
//!
//! - [`types`] - Newtype wrappers for type-safe IDs, money, emails, coupon codes,
//!   slugs and statuses
//! - [`pricing`] - Line totals, coupon discounts and order totals

#![cfg_attr(not(test), forbid(unsafe_code))]

pub mod pricing;
pub mod types;

pub use pricing::OrderTotals;
pub use types::*;
