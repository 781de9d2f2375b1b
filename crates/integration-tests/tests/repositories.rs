//! Repository operations: the `emporium maintenance` tasks, coupon usage
//! and chat conversations.
//!
//! Requires a migrated database at `DATABASE_URL`.

#![allow(clippy::unwrap_used)]

use emporium_core::ProductId;
use emporium_integration_tests::{pool, unique_code, unique_email};
use emporium_server::db::{
    CategoryRepository, ChatRepository, CouponRepository, ProductRepository,
};
use emporium_server::models::SeedCategory;
use sqlx::PgPool;
use uuid::Uuid;

async fn insert_coupon(pool: &PgPool, code: &str) -> i32 {
    let (id,): (i32,) = sqlx::query_as(
        "INSERT INTO coupons (code, discount_type, value) VALUES ($1, 'percentage', 10)
         RETURNING id",
    )
    .bind(code)
    .fetch_one(pool)
    .await
    .unwrap();
    id
}

async fn coupon_row(pool: &PgPool, id: i32) -> (String, i32) {
    sqlx::query_as("SELECT code, times_used FROM coupons WHERE id = $1")
        .bind(id)
        .fetch_one(pool)
        .await
        .unwrap()
}

#[tokio::test]
#[ignore = "Requires database"]
async fn test_activate_products() {
    let pool = pool().await;
    let slug = format!("dormant-{}", Uuid::new_v4().simple());
    let (id,): (i32,) = sqlx::query_as(
        "INSERT INTO products (name, slug, price, is_active) VALUES ('Dormant', $1, 5, FALSE)
         RETURNING id",
    )
    .bind(&slug)
    .fetch_one(&pool)
    .await
    .unwrap();

    let products = ProductRepository::new(&pool);
    assert!(products.activate_all_inactive().await.unwrap() >= 1);

    let product = products.get_by_id(ProductId::new(id)).await.unwrap().unwrap();
    assert!(product.is_active);
}

#[tokio::test]
#[ignore = "Requires database"]
async fn test_uppercase_coupons_skips_collisions() {
    let pool = pool().await;
    let lone = unique_code();
    let taken = unique_code();

    let lone_id = insert_coupon(&pool, &lone.to_lowercase()).await;
    let upper_id = insert_coupon(&pool, &taken).await;
    let lower_id = insert_coupon(&pool, &taken.to_lowercase()).await;

    CouponRepository::new(&pool).uppercase_all_codes().await.unwrap();

    assert_eq!(coupon_row(&pool, lone_id).await.0, lone);
    assert_eq!(coupon_row(&pool, upper_id).await.0, taken);
    // Uppercasing would clash with the existing row, so it stays as it was
    assert_eq!(coupon_row(&pool, lower_id).await.0, taken.to_lowercase());
}

#[tokio::test]
#[ignore = "Requires database"]
async fn test_coupon_usage_counts_only_the_redeemed_code() {
    let pool = pool().await;
    let code = unique_code();
    let upper_id = insert_coupon(&pool, &code).await;
    let lower_id = insert_coupon(&pool, &code.to_lowercase()).await;

    let mut tx = pool.begin().await.unwrap();
    CouponRepository::increment_usage(&mut tx, &code).await.unwrap();
    tx.commit().await.unwrap();

    assert_eq!(coupon_row(&pool, upper_id).await.1, 1);
    assert_eq!(coupon_row(&pool, lower_id).await.1, 0);
}

#[tokio::test]
#[ignore = "Requires database"]
async fn test_seed_categories_inserts_only_missing_slugs() {
    let pool = pool().await;
    let name = format!("Seeded {}", Uuid::new_v4().simple());
    let seeds = vec![SeedCategory {
        name: name.clone(),
        description: Some("From the seed list".to_string()),
    }];

    let categories = CategoryRepository::new(&pool);
    assert_eq!(categories.seed_defaults(&seeds).await.unwrap(), 1);
    assert_eq!(categories.seed_defaults(&seeds).await.unwrap(), 0);

    let (count,): (i64,) = sqlx::query_as("SELECT COUNT(*) FROM categories WHERE name = $1")
        .bind(&name)
        .fetch_one(&pool)
        .await
        .unwrap();
    assert_eq!(count, 1);
}

#[tokio::test]
#[ignore = "Requires database"]
async fn test_start_conversation_is_atomic() {
    let pool = pool().await;
    let chat = ChatRepository::new(&pool);

    let email = unique_email();
    let (conversation, message) = chat
        .start_conversation(None, "Ada", &email, "Where is my parcel?")
        .await
        .unwrap();
    assert_eq!(message.conversation_id, conversation.id);
    assert_eq!(chat.list_messages(conversation.id).await.unwrap().len(), 1);

    // Postgres rejects NUL in text, failing the message insert
    let email = unique_email();
    assert!(
        chat.start_conversation(None, "Ada", &email, "bad\0body")
            .await
            .is_err()
    );
    let (count,): (i64,) =
        sqlx::query_as("SELECT COUNT(*) FROM chat_conversations WHERE customer_email = $1")
            .bind(&email)
            .fetch_one(&pool)
            .await
            .unwrap();
    assert_eq!(count, 0);
}
