//! Integration tests for Emporium.
//!
//! The tests talk to a running server over HTTP and are `#[ignore]`d by
//! default.
//!
//! # Running Tests
//!
//! ```bash
//! emporium migrate
//! emporium admin create -e admin@example.com -n Admin --password ...
//! cargo run -p emporium-server &
//! EMPORIUM_ADMIN_EMAIL=admin@example.com EMPORIUM_ADMIN_PASSWORD=... \
//!     cargo test -p emporium-integration-tests -- --ignored
//! ```
//!
//! # Environment Variables
//!
//! - `EMPORIUM_BASE_URL` - server address (default `http://localhost:3000`)
//! - `EMPORIUM_ADMIN_EMAIL`, `EMPORIUM_ADMIN_PASSWORD` - an existing admin
//! - `STRIPE_WEBHOOK_SECRET` - the server's webhook secret, for signed events
//! - `DATABASE_URL` - the server's database, for repository tests

#![allow(clippy::missing_panics_doc)]

use hmac::{Hmac, Mac};
use reqwest::{Client, StatusCode};
use serde_json::{Value, json};
use sha2::Sha256;
use sqlx::PgPool;
use uuid::Uuid;

/// Base URL of the server under test.
#[must_use]
pub fn base_url() -> String {
    std::env::var("EMPORIUM_BASE_URL").unwrap_or_else(|_| "http://localhost:3000".to_string())
}

/// Absolute URL for an API path such as `/api/products`.
#[must_use]
pub fn url(path: &str) -> String {
    format!("{}{path}", base_url().trim_end_matches('/'))
}

/// A client that keeps the session cookie between requests.
#[must_use]
pub fn client() -> Client {
    Client::builder()
        .cookie_store(true)
        .build()
        .expect("Failed to create HTTP client")
}

/// A unique throwaway email address.
#[must_use]
pub fn unique_email() -> String {
    format!("test-{}@example.com", Uuid::new_v4().simple())
}

/// Register a new customer and return a client logged in as them.
pub async fn customer_client() -> (Client, Value) {
    let client = client();
    let resp = client
        .post(url("/api/auth/register"))
        .json(&json!({
            "email": unique_email(),
            "name": "Test Customer",
            "password": "correct horse battery",
        }))
        .send()
        .await
        .expect("Failed to register");

    assert_eq!(resp.status(), StatusCode::CREATED);
    let user = resp.json().await.expect("Failed to read user");
    (client, user)
}

/// Log in as the admin named by `EMPORIUM_ADMIN_EMAIL`/`EMPORIUM_ADMIN_PASSWORD`.
pub async fn admin_client() -> Client {
    let email = std::env::var("EMPORIUM_ADMIN_EMAIL").expect("EMPORIUM_ADMIN_EMAIL not set");
    let password =
        std::env::var("EMPORIUM_ADMIN_PASSWORD").expect("EMPORIUM_ADMIN_PASSWORD not set");

    let client = client();
    let resp = client
        .post(url("/api/auth/login"))
        .json(&json!({ "email": email, "password": password }))
        .send()
        .await
        .expect("Failed to log in");

    assert_eq!(resp.status(), StatusCode::OK);
    client
}

/// A shipping address accepted by checkout.
#[must_use]
pub fn test_address() -> Value {
    json!({
        "name": "Test Customer",
        "street1": "1 Main St",
        "city": "Springfield",
        "state": "IL",
        "postal_code": "62701",
        "country": "US",
    })
}

/// Connect to the database named by `DATABASE_URL`.
pub async fn pool() -> PgPool {
    let url = std::env::var("DATABASE_URL").expect("DATABASE_URL not set");
    PgPool::connect(&url)
        .await
        .expect("Failed to connect to database")
}

/// A `Stripe-Signature` header for `payload`, signed with `STRIPE_WEBHOOK_SECRET`.
#[must_use]
pub fn stripe_signature(payload: &str) -> String {
    let secret = std::env::var("STRIPE_WEBHOOK_SECRET").expect("STRIPE_WEBHOOK_SECRET not set");
    let timestamp = chrono::Utc::now().timestamp();

    let mut mac =
        Hmac::<Sha256>::new_from_slice(secret.as_bytes()).expect("HMAC accepts any key length");
    mac.update(format!("{timestamp}.{payload}").as_bytes());
    let signature = hex::encode(mac.finalize().into_bytes());

    format!("t={timestamp},v1={signature}")
}

/// Deliver a signed Stripe event to the webhook endpoint.
pub async fn send_stripe_event(event: &Value) -> StatusCode {
    let payload = event.to_string();
    client()
        .post(url("/api/payments/webhook"))
        .header("Stripe-Signature", stripe_signature(&payload))
        .header("Content-Type", "application/json")
        .body(payload)
        .send()
        .await
        .expect("Failed to deliver webhook")
        .status()
}

/// A unique uppercase coupon code.
#[must_use]
pub fn unique_code() -> String {
    let suffix: String = Uuid::new_v4().simple().to_string().chars().take(8).collect();
    format!("IT{suffix}").to_uppercase()
}
