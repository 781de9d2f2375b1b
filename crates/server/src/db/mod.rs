//! Database operations for `PostgreSQL`.
//!
//! ## Tables
//!
//! - `users` - Customer and admin accounts
//! - `password_reset_tokens` - Hashed single-use reset tokens
//! - `categories`, `products` - Catalog
//! - `coupons` - Discount codes
//! - `orders`, `order_items` - Placed orders, priced at purchase time
//! - `chat_conversations`, `chat_messages` - Support chat
//! - `tower_sessions.session` - Session storage (created by `emporium migrate`)
//!
//! # Migrations
//!
//! Migrations are stored in `crates/server/migrations/` and run via:
//! ```bash
//! cargo run -p emporium-cli -- migrate
//! ```
//!
//! Queries are built at runtime (`query_as::<_, Row>`) so the crate compiles
//! without a live database; each repository maps its row types into
//! [`crate::models`] types.

pub mod categories;
pub mod chat;
pub mod coupons;
pub mod orders;
pub mod password_resets;
pub mod products;
pub mod users;

use std::time::Duration;

use secrecy::ExposeSecret;
use sqlx::PgPool;
use sqlx::postgres::PgPoolOptions;
use thiserror::Error;

pub use categories::CategoryRepository;
pub use chat::ChatRepository;
pub use coupons::CouponRepository;
pub use orders::{OrderFilter, OrderRepository};
pub use password_resets::{PasswordResetRepository, PasswordResetToken};
pub use products::ProductRepository;
pub use users::UserRepository;

/// Errors that can occur during repository operations.
#[derive(Debug, Error)]
pub enum RepositoryError {
    /// Database error from sqlx.
    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),

    /// Data in the database is corrupted or invalid.
    #[error("data corruption: {0}")]
    DataCorruption(String),

    /// Requested entity was not found.
    #[error("not found")]
    NotFound,

    /// Constraint violation (e.g., unique email).
    #[error("constraint violation: {0}")]
    Conflict(String),
}

/// Map a unique violation to `Conflict`, anything else to `Database`.
pub(crate) fn conflict_on_unique(message: &str) -> impl FnOnce(sqlx::Error) -> RepositoryError {
    move |e| {
        if let sqlx::Error::Database(ref db_err) = e
            && db_err.is_unique_violation()
        {
            return RepositoryError::Conflict(message.to_owned());
        }
        RepositoryError::Database(e)
    }
}

/// Page of results, as requested by `?page=&per_page=`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Page {
    pub limit: i64,
    pub offset: i64,
}

impl Page {
    pub const DEFAULT_PER_PAGE: u32 = 20;
    pub const MAX_PER_PAGE: u32 = 100;

    /// Build a page from 1-based `page` and `per_page`, clamping both.
    #[must_use]
    pub fn new(page: Option<u32>, per_page: Option<u32>) -> Self {
        let page = page.unwrap_or(1).max(1);
        let per_page = per_page
            .unwrap_or(Self::DEFAULT_PER_PAGE)
            .clamp(1, Self::MAX_PER_PAGE);
        Self {
            limit: i64::from(per_page),
            offset: i64::from(page - 1) * i64::from(per_page),
        }
    }
}

impl Default for Page {
    fn default() -> Self {
        Self::new(None, None)
    }
}

/// Create a `PostgreSQL` connection pool with sensible defaults.
///
/// # Arguments
///
/// * `database_url` - `PostgreSQL` connection string (wrapped in `SecretString`)
///
/// # Errors
///
/// Returns `sqlx::Error` if the connection cannot be established.
pub async fn create_pool(database_url: &secrecy::SecretString) -> Result<PgPool, sqlx::Error> {
    PgPoolOptions::new()
        .max_connections(10)
        .min_connections(2)
        .acquire_timeout(Duration::from_secs(10))
        .connect(database_url.expose_secret())
        .await
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_page_defaults() {
        let page = Page::default();
        assert_eq!(page, Page { limit: 20, offset: 0 });
    }

    #[test]
    fn test_page_offset() {
        let page = Page::new(Some(3), Some(10));
        assert_eq!(page.offset, 20);
        assert_eq!(page.limit, 10);
    }

    #[test]
    fn test_page_clamps() {
        let page = Page::new(Some(0), Some(500));
        assert_eq!(page, Page { limit: 100, offset: 0 });
        assert_eq!(Page::new(None, Some(0)).limit, 1);
    }
}
