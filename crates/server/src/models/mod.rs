//! Domain models.
//!
//! These types represent validated domain objects separate from database row
//! types (see [`crate::db`]). Most are serialized directly into API responses.

pub mod address;
pub mod catalog;
pub mod chat;
pub mod coupon;
pub mod order;
pub mod session;
pub mod user;

pub use address::Address;
pub use catalog::{Category, CategoryInput, Product, ProductFilter, ProductInput, SeedCategory};
pub use chat::{ChatMessage, Conversation};
pub use coupon::{Coupon, CouponInput};
pub use order::{NewOrder, NewOrderItem, Order, OrderItem, OrderStats, StatusCount};
pub use session::{CurrentUser, PlacedOrders, SessionConversations};
pub use user::User;
