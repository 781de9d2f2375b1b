//! Storefront catalog: categories and active products.

use axum::{
    Json,
    extract::{Path, Query, State},
};
use serde::{Deserialize, Serialize};

use crate::db::{CategoryRepository, Page, ProductRepository};
use crate::error::{AppError, Result};
use crate::models::{Category, Product, ProductFilter};
use crate::state::AppState;

/// Query parameters for product listings.
#[derive(Debug, Default, Deserialize)]
pub struct ProductQuery {
    /// Category slug
    pub category: Option<String>,
    /// Search text
    pub q: Option<String>,
    pub page: Option<u32>,
    pub per_page: Option<u32>,
}

/// One page of products.
#[derive(Debug, Serialize)]
pub struct ProductPage {
    pub products: Vec<Product>,
    pub page: u32,
    pub per_page: i64,
    pub total: i64,
}

/// A category with one page of its products.
#[derive(Debug, Serialize)]
pub struct CategoryDetail {
    pub category: Category,
    #[serde(flatten)]
    pub products: ProductPage,
}

async fn product_page(state: &AppState, query: ProductQuery) -> Result<ProductPage> {
    let page = Page::new(query.page, query.per_page);
    let filter = ProductFilter {
        category: query.category.filter(|c| !c.trim().is_empty()),
        search: query.q.map(|q| q.trim().to_string()).filter(|q| !q.is_empty()),
        limit: page.limit,
        offset: page.offset,
    };

    let products = ProductRepository::new(state.pool());
    let total = products.count_active(&filter).await?;
    let items = products.list_active(&filter).await?;

    Ok(ProductPage {
        products: items,
        page: query.page.unwrap_or(1).max(1),
        per_page: page.limit,
        total,
    })
}

/// All categories.
pub async fn list_categories(State(state): State<AppState>) -> Result<Json<Vec<Category>>> {
    let categories = state.catalog().categories(state.pool()).await?;
    Ok(Json(categories))
}

/// A category and its active products.
pub async fn category_detail(
    State(state): State<AppState>,
    Path(slug): Path<String>,
    Query(query): Query<ProductQuery>,
) -> Result<Json<CategoryDetail>> {
    let category = CategoryRepository::new(state.pool())
        .get_by_slug(&slug)
        .await?
        .ok_or_else(|| AppError::NotFound("Category".to_string()))?;

    let products = product_page(
        &state,
        ProductQuery {
            category: Some(category.slug.as_str().to_string()),
            ..query
        },
    )
    .await?;

    Ok(Json(CategoryDetail { category, products }))
}

/// Active products, filtered and paginated.
pub async fn list_products(
    State(state): State<AppState>,
    Query(query): Query<ProductQuery>,
) -> Result<Json<ProductPage>> {
    Ok(Json(product_page(&state, query).await?))
}

/// An active product by slug.
pub async fn product_detail(
    State(state): State<AppState>,
    Path(slug): Path<String>,
) -> Result<Json<Product>> {
    let product = state
        .catalog()
        .product(state.pool(), &slug)
        .await?
        .ok_or_else(|| AppError::NotFound("Product".to_string()))?;
    Ok(Json(product))
}
