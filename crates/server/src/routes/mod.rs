//! HTTP route handlers for the JSON API.
//!
//! # Route Structure
//!
//! ```text
//! # Auth (rate limited: auth)
//! POST /api/auth/register              - Create customer account and log in
//! POST /api/auth/login                 - Password login
//! POST /api/auth/logout                - Clear session
//! GET  /api/auth/me                    - Current user
//! POST /api/auth/password/forgot       - Email a reset link
//! POST /api/auth/password/reset        - Set a new password from a token
//!
//! # Catalog
//! GET  /api/categories                 - Category list
//! GET  /api/categories/{slug}          - Category with its products
//! GET  /api/products                   - Product listing (?category=&q=&page=&per_page=)
//! GET  /api/products/{slug}            - Product detail
//! POST /api/coupons/validate           - Check a coupon against a subtotal
//!
//! # Checkout (rate limited: checkout)
//! POST /api/shipping/quote             - Shipping rates for an address
//! POST /api/checkout                   - Place order, create PaymentIntent
//!
//! # Orders
//! GET  /api/orders                     - Orders of the logged-in user
//! GET  /api/orders/{id}                - Order detail
//! GET  /api/orders/{id}/payment-status - Reconcile payment with Stripe
//!
//! # Payments (not rate limited)
//! POST /api/payments/webhook           - Stripe webhook
//!
//! # Chat
//! POST /api/chat/conversations                - Start conversation
//! GET  /api/chat/conversations/{id}/messages  - Messages
//! POST /api/chat/conversations/{id}/messages  - Send message
//! POST /api/chat/realtime/auth                - Pusher channel authorization
//!
//! # Admin
//! /api/admin/...                       - See [`admin`]
//! ```

pub mod admin;
pub mod auth;
pub mod catalog;
pub mod chat;
pub mod checkout;
pub mod coupons;
pub mod orders;
pub mod payments;

use axum::{
    Router,
    routing::{get, post},
};

use crate::middleware::{api_rate_limiter, auth_rate_limiter, checkout_rate_limiter};
use crate::state::AppState;

/// Create the auth routes router.
pub fn auth_routes() -> Router<AppState> {
    Router::new()
        .route("/register", post(auth::register))
        .route("/login", post(auth::login))
        .route("/logout", post(auth::logout))
        .route("/me", get(auth::me))
        .route("/password/forgot", post(auth::forgot_password))
        .route("/password/reset", post(auth::reset_password))
}

/// Create the checkout routes router.
pub fn checkout_routes() -> Router<AppState> {
    Router::new()
        .route("/shipping/quote", post(checkout::quote_shipping))
        .route("/checkout", post(checkout::place_order))
}

/// Create the catalog, order and chat routes router.
pub fn store_routes() -> Router<AppState> {
    Router::new()
        .route("/categories", get(catalog::list_categories))
        .route("/categories/{slug}", get(catalog::category_detail))
        .route("/products", get(catalog::list_products))
        .route("/products/{slug}", get(catalog::product_detail))
        .route("/coupons/validate", post(coupons::validate))
        .route("/orders", get(orders::list))
        .route("/orders/{id}", get(orders::detail))
        .route("/orders/{id}/payment-status", get(orders::payment_status))
        .route("/chat/conversations", post(chat::start_conversation))
        .route(
            "/chat/conversations/{id}/messages",
            get(chat::list_messages).post(chat::post_message),
        )
        .route("/chat/realtime/auth", post(chat::authorize_channel))
        .nest("/admin", admin::routes())
}

/// Create all API routes, mounted under `/api`.
pub fn routes() -> Router<AppState> {
    let api = Router::new()
        .nest("/auth", auth_routes().layer(auth_rate_limiter()))
        .merge(checkout_routes().layer(checkout_rate_limiter()))
        .merge(store_routes().layer(api_rate_limiter()))
        // Stripe retries on failure; never throttle it
        .route("/payments/webhook", post(payments::webhook));

    Router::new().nest("/api", api)
}
