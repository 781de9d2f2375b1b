//! Business logic and third-party integrations.

pub mod auth;
pub mod catalog;
pub mod chat;
pub mod checkout;
pub mod coupons;
pub mod email;
pub mod payments;
pub mod realtime;
pub mod shipping;
pub mod storage;
