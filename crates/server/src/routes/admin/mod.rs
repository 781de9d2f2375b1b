//! Admin API, mounted at `/api/admin`. Every handler requires an admin.
//!
//! # Route Structure
//!
//! ```text
//! GET    /stats                           - Dashboard figures
//! GET    /products                        - All products (incl. inactive)
//! POST   /products                        - Create product
//! GET    /products/{id}                   - Product detail
//! PUT    /products/{id}                   - Update product
//! DELETE /products/{id}                   - Delete product
//! POST   /products/{id}/active            - Show/hide on storefront
//! POST   /products/{id}/images            - Upload image (multipart)
//! POST   /uploads                         - Upload image, returns URL
//! GET    /categories                      - Categories
//! POST   /categories                      - Create category
//! PUT    /categories/{id}                 - Update category
//! DELETE /categories/{id}                 - Delete category
//! GET    /coupons                         - Coupons
//! POST   /coupons                         - Create coupon
//! PUT    /coupons/{id}                    - Update coupon
//! DELETE /coupons/{id}                    - Delete coupon
//! GET    /orders                          - Orders (?status=&page=&per_page=)
//! GET    /orders/{id}                     - Order detail
//! POST   /orders/{id}/status              - Change status
//! POST   /orders/{id}/tracking            - Ship with tracking number
//! POST   /orders/{id}/refund              - Refund through Stripe
//! GET    /orders/{id}/print               - Invoice or packing slip (?type=)
//! GET    /users                           - Users
//! POST   /users/{id}/role                 - Change role
//! GET    /chat/conversations              - Conversations (?status=)
//! GET    /chat/conversations/{id}         - Conversation with messages
//! POST   /chat/conversations/{id}/messages - Agent reply
//! POST   /chat/conversations/{id}/close   - Close conversation
//! ```

pub mod categories;
pub mod chat;
pub mod coupons;
pub mod dashboard;
pub mod orders;
pub mod print;
pub mod products;
pub mod users;

use axum::{
    Router,
    extract::DefaultBodyLimit,
    routing::{get, post, put},
};

use crate::services::storage::MAX_UPLOAD_BYTES;
use crate::state::AppState;

/// Multipart overhead allowed on top of the file itself.
const MULTIPART_OVERHEAD_BYTES: usize = 64 * 1024;

/// Create the admin router.
pub fn routes() -> Router<AppState> {
    let uploads = Router::new()
        .route("/products/{id}/images", post(products::upload_image))
        .route("/uploads", post(products::upload))
        .layer(DefaultBodyLimit::max(
            MAX_UPLOAD_BYTES + MULTIPART_OVERHEAD_BYTES,
        ));

    Router::new()
        .route("/stats", get(dashboard::stats))
        .route("/products", get(products::list).post(products::create))
        .route(
            "/products/{id}",
            get(products::show)
                .put(products::update)
                .delete(products::delete),
        )
        .route("/products/{id}/active", post(products::set_active))
        .route(
            "/categories",
            get(categories::list).post(categories::create),
        )
        .route(
            "/categories/{id}",
            put(categories::update).delete(categories::delete),
        )
        .route("/coupons", get(coupons::list).post(coupons::create))
        .route(
            "/coupons/{id}",
            put(coupons::update).delete(coupons::delete),
        )
        .route("/orders", get(orders::list))
        .route("/orders/{id}", get(orders::show))
        .route("/orders/{id}/status", post(orders::set_status))
        .route("/orders/{id}/tracking", post(orders::set_tracking))
        .route("/orders/{id}/refund", post(orders::refund))
        .route("/orders/{id}/print", get(print::print))
        .route("/users", get(users::list))
        .route("/users/{id}/role", post(users::set_role))
        .route("/chat/conversations", get(chat::list))
        .route("/chat/conversations/{id}", get(chat::show))
        .route("/chat/conversations/{id}/messages", post(chat::reply))
        .route("/chat/conversations/{id}/close", post(chat::close))
        .merge(uploads)
}
