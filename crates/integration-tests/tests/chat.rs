//! Support chat from the customer side.
//!
//! Requires a running server and database.

#![allow(clippy::unwrap_used)]

use emporium_integration_tests::{client, unique_email, url};
use reqwest::StatusCode;
use serde_json::{Value, json};

#[tokio::test]
#[ignore = "Requires running server"]
async fn test_guest_conversation_roundtrip() {
    let guest = client();

    let resp = guest
        .post(url("/api/chat/conversations"))
        .json(&json!({
            "name": "Grace",
            "email": unique_email(),
            "message": "Where is my order?",
        }))
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), StatusCode::CREATED);

    let view: Value = resp.json().await.unwrap();
    let id = view["conversation"]["id"].as_i64().unwrap();
    assert_eq!(view["channel"], format!("private-chat-{id}"));

    let resp = guest
        .post(url(&format!("/api/chat/conversations/{id}/messages")))
        .json(&json!({ "body": "It was #000042" }))
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), StatusCode::CREATED);

    let resp = guest
        .get(url(&format!("/api/chat/conversations/{id}/messages")))
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), StatusCode::OK);
    let view: Value = resp.json().await.unwrap();
    assert_eq!(view["messages"].as_array().unwrap().len(), 2);

    // A different visitor cannot read it
    let resp = client()
        .get(url(&format!("/api/chat/conversations/{id}/messages")))
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), StatusCode::NOT_FOUND);
}

#[tokio::test]
#[ignore = "Requires running server"]
async fn test_empty_message_rejected() {
    let resp = client()
        .post(url("/api/chat/conversations"))
        .json(&json!({ "name": "Grace", "email": unique_email(), "message": "   " }))
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), StatusCode::BAD_REQUEST);
}
