//! Admin API.
//!
//! Requires a running server and an existing admin account
//! (`EMPORIUM_ADMIN_EMAIL`, `EMPORIUM_ADMIN_PASSWORD`).

#![allow(clippy::unwrap_used)]

use emporium_integration_tests::{admin_client, client, customer_client, unique_code, url};
use reqwest::StatusCode;
use serde_json::{Value, json};
use uuid::Uuid;

#[tokio::test]
#[ignore = "Requires running server"]
async fn test_admin_routes_reject_anonymous_and_customers() {
    let resp = client().get(url("/api/admin/stats")).send().await.unwrap();
    assert_eq!(resp.status(), StatusCode::UNAUTHORIZED);

    let (customer, _) = customer_client().await;
    let resp = customer.get(url("/api/admin/stats")).send().await.unwrap();
    assert_eq!(resp.status(), StatusCode::FORBIDDEN);
}

#[tokio::test]
#[ignore = "Requires running server and admin credentials"]
async fn test_dashboard_stats() {
    let admin = admin_client().await;
    let resp = admin.get(url("/api/admin/stats")).send().await.unwrap();
    assert_eq!(resp.status(), StatusCode::OK);

    let stats: Value = resp.json().await.unwrap();
    assert!(stats["total_orders"].is_number());
    assert!(stats["orders_by_status"].is_array());
}

#[tokio::test]
#[ignore = "Requires running server and admin credentials"]
async fn test_product_lifecycle() {
    let admin = admin_client().await;
    let name = format!("Integration Mug {}", Uuid::new_v4().simple());

    let resp = admin
        .post(url("/api/admin/products"))
        .json(&json!({
            "name": name,
            "description": "Holds coffee",
            "price": "12.50",
            "stock": 3,
            "is_active": false,
        }))
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), StatusCode::CREATED);
    let product: Value = resp.json().await.unwrap();
    let id = product["id"].as_i64().unwrap();
    let slug = product["slug"].as_str().unwrap().to_string();

    // Hidden from the storefront while inactive
    let resp = client()
        .get(url(&format!("/api/products/{slug}")))
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), StatusCode::NOT_FOUND);

    let resp = admin
        .post(url(&format!("/api/admin/products/{id}/active")))
        .json(&json!({ "active": true }))
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), StatusCode::OK);

    let resp = client()
        .get(url(&format!("/api/products/{slug}")))
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), StatusCode::OK);

    let resp = admin
        .delete(url(&format!("/api/admin/products/{id}")))
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), StatusCode::NO_CONTENT);
}

#[tokio::test]
#[ignore = "Requires running server and admin credentials"]
async fn test_coupon_is_case_insensitive() {
    let admin = admin_client().await;
    let code = unique_code();

    let resp = admin
        .post(url("/api/admin/coupons"))
        .json(&json!({
            "code": code.to_lowercase(),
            "discount_type": "percentage",
            "value": "10",
        }))
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), StatusCode::CREATED);
    let coupon: Value = resp.json().await.unwrap();
    assert_eq!(coupon["code"], code);

    let resp = client()
        .post(url("/api/coupons/validate"))
        .json(&json!({ "code": code.to_lowercase(), "subtotal": "50.00" }))
        .send()
        .await
        .unwrap();
    let body: Value = resp.json().await.unwrap();
    assert_eq!(body["valid"], true);

    let id = coupon["id"].as_i64().unwrap();
    let resp = admin
        .delete(url(&format!("/api/admin/coupons/{id}")))
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), StatusCode::NO_CONTENT);
}

#[tokio::test]
#[ignore = "Requires running server and admin credentials"]
async fn test_order_list_filters_by_status() {
    let admin = admin_client().await;
    let resp = admin
        .get(url("/api/admin/orders?status=paid&per_page=10"))
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), StatusCode::OK);

    let orders: Value = resp.json().await.unwrap();
    for order in orders.as_array().unwrap() {
        assert_eq!(order["status"], "paid");
    }
}

#[tokio::test]
#[ignore = "Requires running server and admin credentials"]
async fn test_agent_reply_and_close() {
    let guest = client();
    let resp = guest
        .post(url("/api/chat/conversations"))
        .json(&json!({
            "name": "Grace",
            "email": "grace@example.com",
            "message": "Hello?",
        }))
        .send()
        .await
        .unwrap();
    let view: Value = resp.json().await.unwrap();
    let id = view["conversation"]["id"].as_i64().unwrap();

    let admin = admin_client().await;
    let resp = admin
        .post(url(&format!("/api/admin/chat/conversations/{id}/messages")))
        .json(&json!({ "body": "Hi Grace, how can we help?" }))
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), StatusCode::CREATED);
    let message: Value = resp.json().await.unwrap();
    assert_eq!(message["sender"], "agent");

    let resp = admin
        .post(url(&format!("/api/admin/chat/conversations/{id}/close")))
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), StatusCode::OK);

    // Closed conversations take no more messages
    let resp = guest
        .post(url(&format!("/api/chat/conversations/{id}/messages")))
        .json(&json!({ "body": "One more thing" }))
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), StatusCode::CONFLICT);
}
