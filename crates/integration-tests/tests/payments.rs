//! Payment confirmation through signed Stripe webhooks.
//!
//! Requires a running server with Stripe test keys, the server's
//! `STRIPE_WEBHOOK_SECRET`, and admin credentials.

#![allow(clippy::unwrap_used)]

use emporium_integration_tests::{
    admin_client, client, send_stripe_event, test_address, unique_code, unique_email, url,
};
use reqwest::{Client, StatusCode};
use serde_json::{Value, json};
use uuid::Uuid;

/// An active product with `stock` units at 20.00.
async fn create_product(admin: &Client, stock: i64) -> Value {
    let resp = admin
        .post(url("/api/admin/products"))
        .json(&json!({
            "name": format!("Webhook Lamp {}", Uuid::new_v4().simple()),
            "description": "Lights a desk",
            "price": "20.00",
            "stock": stock,
            "is_active": true,
        }))
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), StatusCode::CREATED);
    resp.json().await.unwrap()
}

async fn create_coupon(admin: &Client) -> String {
    let code = unique_code();
    let resp = admin
        .post(url("/api/admin/coupons"))
        .json(&json!({ "code": code, "discount_type": "percentage", "value": "10" }))
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), StatusCode::CREATED);
    code
}

async fn place_order(
    guest: &Client,
    product: &Value,
    quantity: u32,
    coupon: Option<&str>,
) -> Value {
    let resp = guest
        .post(url("/api/checkout"))
        .json(&json!({
            "email": unique_email(),
            "items": [{ "product_id": product["id"], "quantity": quantity }],
            "shipping_address": test_address(),
            "coupon_code": coupon,
        }))
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), StatusCode::CREATED);
    resp.json().await.unwrap()
}

/// `pi_…` id embedded in a `pi_…_secret_…` client secret.
fn intent_id(placed: &Value) -> String {
    let secret = placed["client_secret"].as_str().unwrap();
    secret.split("_secret_").next().unwrap().to_string()
}

/// Order total in cents.
fn total_minor_units(placed: &Value) -> i64 {
    let total = placed["totals"]["total"].as_str().unwrap();
    let (units, cents) = total.split_once('.').unwrap_or((total, "0"));
    let cents = format!("{cents:0<2}");
    units.parse::<i64>().unwrap() * 100 + cents[..2].parse::<i64>().unwrap()
}

fn succeeded_event(placed: &Value, amount: i64) -> Value {
    json!({
        "id": format!("evt_{}", Uuid::new_v4().simple()),
        "type": "payment_intent.succeeded",
        "data": {
            "object": {
                "id": intent_id(placed),
                "status": "succeeded",
                "amount": amount,
                "currency": placed["currency"].as_str().unwrap().to_lowercase(),
                "metadata": { "order_id": placed["order_id"].to_string() },
            }
        }
    })
}

async fn order(guest: &Client, placed: &Value) -> Value {
    guest
        .get(url(&format!("/api/orders/{}", placed["order_id"])))
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap()
}

async fn product_stock(admin: &Client, product: &Value) -> i64 {
    let product: Value = admin
        .get(url(&format!("/api/admin/products/{}", product["id"])))
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    product["stock"].as_i64().unwrap()
}

async fn coupon_uses(admin: &Client, code: &str) -> i64 {
    let coupons: Value = admin
        .get(url("/api/admin/coupons"))
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    coupons
        .as_array()
        .unwrap()
        .iter()
        .find(|c| c["code"] == code)
        .map(|c| c["times_used"].as_i64().unwrap())
        .unwrap()
}

#[tokio::test]
#[ignore = "Requires running server, Stripe test keys and admin credentials"]
async fn test_success_webhook_pays_order_once() {
    let admin = admin_client().await;
    let product = create_product(&admin, 5).await;
    let code = create_coupon(&admin).await;

    let guest = client();
    let placed = place_order(&guest, &product, 2, Some(&code)).await;
    let discount: f64 = placed["totals"]["discount"].as_str().unwrap().parse().unwrap();
    assert!((discount - 4.0).abs() < f64::EPSILON);
    let event = succeeded_event(&placed, total_minor_units(&placed));

    assert_eq!(send_stripe_event(&event).await, StatusCode::OK);
    // Stripe redelivers events; the second delivery must change nothing
    assert_eq!(send_stripe_event(&event).await, StatusCode::OK);

    let order = order(&guest, &placed).await;
    assert_eq!(order["payment_status"], "paid");
    assert_eq!(order["status"], "paid");
    assert_eq!(product_stock(&admin, &product).await, 3);
    assert_eq!(coupon_uses(&admin, &code).await, 1);
}

#[tokio::test]
#[ignore = "Requires running server, Stripe test keys and admin credentials"]
async fn test_success_webhook_with_wrong_amount_is_ignored() {
    let admin = admin_client().await;
    let product = create_product(&admin, 5).await;

    let guest = client();
    let placed = place_order(&guest, &product, 1, None).await;
    let event = succeeded_event(&placed, total_minor_units(&placed) - 1);

    assert_eq!(send_stripe_event(&event).await, StatusCode::OK);

    let order = order(&guest, &placed).await;
    assert_eq!(order["payment_status"], "unpaid");
    assert_eq!(order["status"], "pending");
    assert_eq!(product_stock(&admin, &product).await, 5);
}

#[tokio::test]
#[ignore = "Requires running server, Stripe test keys and admin credentials"]
async fn test_cancelled_order_ignores_late_payment() {
    let admin = admin_client().await;
    let product = create_product(&admin, 5).await;

    let guest = client();
    let placed = place_order(&guest, &product, 1, None).await;

    let resp = admin
        .post(url(&format!("/api/admin/orders/{}/status", placed["order_id"])))
        .json(&json!({ "status": "cancelled" }))
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), StatusCode::OK);

    let event = succeeded_event(&placed, total_minor_units(&placed));
    assert_eq!(send_stripe_event(&event).await, StatusCode::OK);

    let order = order(&guest, &placed).await;
    assert_eq!(order["status"], "cancelled");
    assert_eq!(order["payment_status"], "unpaid");
    assert_eq!(product_stock(&admin, &product).await, 5);
}

#[tokio::test]
#[ignore = "Requires running server, Stripe test keys and admin credentials"]
async fn test_paid_order_cannot_be_cancelled() {
    let admin = admin_client().await;
    let product = create_product(&admin, 5).await;

    let guest = client();
    let placed = place_order(&guest, &product, 1, None).await;
    let event = succeeded_event(&placed, total_minor_units(&placed));
    assert_eq!(send_stripe_event(&event).await, StatusCode::OK);

    let resp = admin
        .post(url(&format!("/api/admin/orders/{}/status", placed["order_id"])))
        .json(&json!({ "status": "cancelled" }))
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), StatusCode::CONFLICT);

    let order = order(&guest, &placed).await;
    assert_eq!(order["payment_status"], "paid");
}
