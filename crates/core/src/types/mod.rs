//! Core types for Emporium.
//!
//! This module provides type-safe wrappers for common domain concepts.

pub mod coupon_code;
pub mod email;
pub mod id;
pub mod money;
pub mod slug;
pub mod status;

pub use coupon_code::{CouponCode, CouponCodeError};
pub use email::{Email, EmailError};
pub use id::*;
pub use money::{CurrencyCode, Money, UnsupportedCurrency, round_money};
pub use slug::{Slug, SlugError};
pub use status::*;
