//! Cached catalog reads for the storefront.
//!
//! Category lists and product details are served from an in-memory `moka`
//! cache (5-minute TTL). Admin writes call [`CatalogCache::invalidate`] so
//! edits show up immediately.

use std::time::Duration;

use moka::future::Cache;
use sqlx::PgPool;
use tracing::debug;

use crate::db::{CategoryRepository, ProductRepository, RepositoryError};
use crate::models::{Category, Product};

const CACHE_TTL: Duration = Duration::from_secs(300);

/// Cache key for catalog reads.
#[derive(Debug, Clone, Hash, PartialEq, Eq)]
enum CacheKey {
    Categories,
    Product(String),
}

/// Cached value types.
#[derive(Debug, Clone)]
enum CacheValue {
    Categories(Vec<Category>),
    Product(Box<Product>),
}

/// In-memory cache in front of the catalog repositories.
#[derive(Clone)]
pub struct CatalogCache {
    cache: Cache<CacheKey, CacheValue>,
}

impl Default for CatalogCache {
    fn default() -> Self {
        Self::new()
    }
}

impl CatalogCache {
    #[must_use]
    pub fn new() -> Self {
        let cache = Cache::builder()
            .max_capacity(1000)
            .time_to_live(CACHE_TTL)
            .build();
        Self { cache }
    }

    /// All categories, alphabetically.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError` on a cache miss that fails to load.
    pub async fn categories(&self, pool: &PgPool) -> Result<Vec<Category>, RepositoryError> {
        if let Some(CacheValue::Categories(categories)) =
            self.cache.get(&CacheKey::Categories).await
        {
            debug!("Cache hit for categories");
            return Ok(categories);
        }

        let categories = CategoryRepository::new(pool).list().await?;
        self.cache
            .insert(
                CacheKey::Categories,
                CacheValue::Categories(categories.clone()),
            )
            .await;
        Ok(categories)
    }

    /// An active product by slug. Misses are not cached.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError` on a cache miss that fails to load.
    pub async fn product(
        &self,
        pool: &PgPool,
        slug: &str,
    ) -> Result<Option<Product>, RepositoryError> {
        let key = CacheKey::Product(slug.to_string());
        if let Some(CacheValue::Product(product)) = self.cache.get(&key).await {
            debug!(slug = %slug, "Cache hit for product");
            return Ok(Some(*product));
        }

        let product = ProductRepository::new(pool).get_active_by_slug(slug).await?;
        if let Some(product) = &product {
            self.cache
                .insert(key, CacheValue::Product(Box::new(product.clone())))
                .await;
        }
        Ok(product)
    }

    /// Drop every cached entry.
    pub fn invalidate(&self) {
        self.cache.invalidate_all();
    }
}
