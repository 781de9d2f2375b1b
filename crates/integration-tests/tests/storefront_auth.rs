//! Customer account flows.
//!
//! Requires a running server and database.

#![allow(clippy::unwrap_used)]

use emporium_integration_tests::{client, customer_client, unique_email, url};
use reqwest::StatusCode;
use serde_json::{Value, json};

#[tokio::test]
#[ignore = "Requires running server"]
async fn test_register_then_me() {
    let (client, user) = customer_client().await;
    assert_eq!(user["role"], "customer");

    let resp = client.get(url("/api/auth/me")).send().await.unwrap();
    assert_eq!(resp.status(), StatusCode::OK);
    let me: Value = resp.json().await.unwrap();
    assert_eq!(me["id"], user["id"]);
}

#[tokio::test]
#[ignore = "Requires running server"]
async fn test_me_requires_login() {
    let resp = client().get(url("/api/auth/me")).send().await.unwrap();
    assert_eq!(resp.status(), StatusCode::UNAUTHORIZED);
}

#[tokio::test]
#[ignore = "Requires running server"]
async fn test_duplicate_registration_conflicts() {
    let email = unique_email();
    let body = json!({ "email": email, "name": "Dup", "password": "correct horse battery" });

    let first = client()
        .post(url("/api/auth/register"))
        .json(&body)
        .send()
        .await
        .unwrap();
    assert_eq!(first.status(), StatusCode::CREATED);

    let second = client()
        .post(url("/api/auth/register"))
        .json(&body)
        .send()
        .await
        .unwrap();
    assert_eq!(second.status(), StatusCode::CONFLICT);
}

#[tokio::test]
#[ignore = "Requires running server"]
async fn test_wrong_password_is_unauthorized() {
    let resp = client()
        .post(url("/api/auth/login"))
        .json(&json!({ "email": unique_email(), "password": "not the password" }))
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), StatusCode::UNAUTHORIZED);
}

#[tokio::test]
#[ignore = "Requires running server"]
async fn test_logout_ends_session() {
    let (client, _) = customer_client().await;

    let resp = client.post(url("/api/auth/logout")).send().await.unwrap();
    assert_eq!(resp.status(), StatusCode::NO_CONTENT);

    let resp = client.get(url("/api/auth/me")).send().await.unwrap();
    assert_eq!(resp.status(), StatusCode::UNAUTHORIZED);
}

#[tokio::test]
#[ignore = "Requires running server"]
async fn test_forgot_password_does_not_reveal_accounts() {
    let resp = client()
        .post(url("/api/auth/password/forgot"))
        .json(&json!({ "email": unique_email() }))
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), StatusCode::OK);
}

#[tokio::test]
#[ignore = "Requires running server"]
async fn test_reset_with_unknown_token_fails() {
    let resp = client()
        .post(url("/api/auth/password/reset"))
        .json(&json!({ "token": "bogus", "password": "another good password" }))
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), StatusCode::BAD_REQUEST);
}
