//! Product repository.

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use sqlx::{PgConnection, PgPool};

use emporium_core::{CategoryId, ProductId, Slug};

use super::{Page, RepositoryError, conflict_on_unique};
use crate::models::{Product, ProductFilter, ProductInput};

const PRODUCT_COLUMNS: &str = "p.id, p.category_id, p.name, p.slug, p.description, p.price, \
     p.compare_at_price, p.stock, p.weight_grams, p.image_urls, p.is_active, \
     p.created_at, p.updated_at";

/// Storefront listing predicate; `$1` is the category slug, `$2` the search pattern.
const ACTIVE_FILTER: &str = "p.is_active
     AND ($1::text IS NULL OR c.slug = $1)
     AND ($2::text IS NULL OR p.name ILIKE $2 OR p.description ILIKE $2)";

#[derive(Debug, sqlx::FromRow)]
struct ProductRow {
    id: ProductId,
    category_id: Option<CategoryId>,
    name: String,
    slug: String,
    description: String,
    price: Decimal,
    compare_at_price: Option<Decimal>,
    stock: i32,
    weight_grams: i32,
    image_urls: Vec<String>,
    is_active: bool,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

impl TryFrom<ProductRow> for Product {
    type Error = RepositoryError;

    fn try_from(row: ProductRow) -> Result<Self, Self::Error> {
        let slug = Slug::parse(&row.slug).map_err(|e| {
            RepositoryError::DataCorruption(format!("invalid product slug in database: {e}"))
        })?;

        Ok(Self {
            id: row.id,
            category_id: row.category_id,
            name: row.name,
            slug,
            description: row.description,
            price: row.price,
            compare_at_price: row.compare_at_price,
            stock: row.stock,
            weight_grams: row.weight_grams,
            image_urls: row.image_urls,
            is_active: row.is_active,
            created_at: row.created_at,
            updated_at: row.updated_at,
        })
    }
}

fn into_products(rows: Vec<ProductRow>) -> Result<Vec<Product>, RepositoryError> {
    rows.into_iter().map(Product::try_from).collect()
}

/// Turn free-text search into an `ILIKE` pattern, escaping wildcards.
fn search_pattern(search: Option<&str>) -> Option<String> {
    let term = search.map(str::trim).filter(|s| !s.is_empty())?;
    let mut escaped = String::with_capacity(term.len() + 2);
    escaped.push('%');
    for c in term.chars() {
        if matches!(c, '%' | '_' | '\\') {
            escaped.push('\\');
        }
        escaped.push(c);
    }
    escaped.push('%');
    Some(escaped)
}

/// Repository for product database operations.
pub struct ProductRepository<'a> {
    pool: &'a PgPool,
}

impl<'a> ProductRepository<'a> {
    #[must_use]
    pub const fn new(pool: &'a PgPool) -> Self {
        Self { pool }
    }

    /// List active products matching `filter`, newest first.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    pub async fn list_active(&self, filter: &ProductFilter) -> Result<Vec<Product>, RepositoryError> {
        let rows = sqlx::query_as::<_, ProductRow>(&format!(
            "SELECT {PRODUCT_COLUMNS}
             FROM products p LEFT JOIN categories c ON c.id = p.category_id
             WHERE {ACTIVE_FILTER}
             ORDER BY p.created_at DESC, p.id DESC
             LIMIT $3 OFFSET $4"
        ))
        .bind(filter.category.as_deref())
        .bind(search_pattern(filter.search.as_deref()))
        .bind(filter.limit)
        .bind(filter.offset)
        .fetch_all(self.pool)
        .await?;

        into_products(rows)
    }

    /// Count active products matching `filter` (ignoring pagination).
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    pub async fn count_active(&self, filter: &ProductFilter) -> Result<i64, RepositoryError> {
        let (count,): (i64,) = sqlx::query_as(&format!(
            "SELECT COUNT(*)
             FROM products p LEFT JOIN categories c ON c.id = p.category_id
             WHERE {ACTIVE_FILTER}"
        ))
        .bind(filter.category.as_deref())
        .bind(search_pattern(filter.search.as_deref()))
        .fetch_one(self.pool)
        .await?;

        Ok(count)
    }

    /// Get an active product by slug.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    pub async fn get_active_by_slug(&self, slug: &str) -> Result<Option<Product>, RepositoryError> {
        sqlx::query_as::<_, ProductRow>(&format!(
            "SELECT {PRODUCT_COLUMNS} FROM products p WHERE p.slug = $1 AND p.is_active"
        ))
        .bind(slug)
        .fetch_optional(self.pool)
        .await?
        .map(Product::try_from)
        .transpose()
    }

    /// Get any product (active or not) by ID.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    pub async fn get_by_id(&self, id: ProductId) -> Result<Option<Product>, RepositoryError> {
        sqlx::query_as::<_, ProductRow>(&format!(
            "SELECT {PRODUCT_COLUMNS} FROM products p WHERE p.id = $1"
        ))
        .bind(id)
        .fetch_optional(self.pool)
        .await?
        .map(Product::try_from)
        .transpose()
    }

    /// Get several products by ID. Missing IDs are silently absent.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    pub async fn get_many(&self, ids: &[ProductId]) -> Result<Vec<Product>, RepositoryError> {
        let ids: Vec<i32> = ids.iter().map(ProductId::as_i32).collect();
        let rows = sqlx::query_as::<_, ProductRow>(&format!(
            "SELECT {PRODUCT_COLUMNS} FROM products p WHERE p.id = ANY($1)"
        ))
        .bind(&ids)
        .fetch_all(self.pool)
        .await?;

        into_products(rows)
    }

    /// List every product including inactive ones, newest first.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    pub async fn list_all(&self, page: Page) -> Result<Vec<Product>, RepositoryError> {
        let rows = sqlx::query_as::<_, ProductRow>(&format!(
            "SELECT {PRODUCT_COLUMNS} FROM products p
             ORDER BY p.created_at DESC, p.id DESC LIMIT $1 OFFSET $2"
        ))
        .bind(page.limit)
        .bind(page.offset)
        .fetch_all(self.pool)
        .await?;

        into_products(rows)
    }

    /// Create a product.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Conflict` if the slug is taken.
    pub async fn create(&self, input: &ProductInput, slug: &Slug) -> Result<Product, RepositoryError> {
        sqlx::query_as::<_, ProductRow>(&format!(
            "INSERT INTO products AS p (category_id, name, slug, description, price,
                 compare_at_price, stock, weight_grams, image_urls, is_active)
             VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10)
             RETURNING {PRODUCT_COLUMNS}"
        ))
        .bind(input.category_id)
        .bind(input.name.trim())
        .bind(slug.as_str())
        .bind(&input.description)
        .bind(input.price)
        .bind(input.compare_at_price)
        .bind(input.stock)
        .bind(input.weight_grams)
        .bind(&input.image_urls)
        .bind(input.is_active)
        .fetch_one(self.pool)
        .await
        .map_err(conflict_on_unique("product slug already exists"))?
        .try_into()
    }

    /// Replace a product's editable fields.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::NotFound` if the product doesn't exist, or
    /// `RepositoryError::Conflict` if the new slug is taken.
    pub async fn update(
        &self,
        id: ProductId,
        input: &ProductInput,
        slug: &Slug,
    ) -> Result<Product, RepositoryError> {
        sqlx::query_as::<_, ProductRow>(&format!(
            "UPDATE products AS p SET category_id = $1, name = $2, slug = $3, description = $4,
                 price = $5, compare_at_price = $6, stock = $7, weight_grams = $8,
                 image_urls = $9, is_active = $10
             WHERE p.id = $11
             RETURNING {PRODUCT_COLUMNS}"
        ))
        .bind(input.category_id)
        .bind(input.name.trim())
        .bind(slug.as_str())
        .bind(&input.description)
        .bind(input.price)
        .bind(input.compare_at_price)
        .bind(input.stock)
        .bind(input.weight_grams)
        .bind(&input.image_urls)
        .bind(input.is_active)
        .bind(id)
        .fetch_optional(self.pool)
        .await
        .map_err(conflict_on_unique("product slug already exists"))?
        .ok_or(RepositoryError::NotFound)?
        .try_into()
    }

    /// Delete a product. Past order lines keep their name and price.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::NotFound` if the product doesn't exist.
    pub async fn delete(&self, id: ProductId) -> Result<(), RepositoryError> {
        let result = sqlx::query("DELETE FROM products WHERE id = $1")
            .bind(id)
            .execute(self.pool)
            .await?;

        if result.rows_affected() == 0 {
            return Err(RepositoryError::NotFound);
        }

        Ok(())
    }

    /// Show or hide a product on the storefront.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::NotFound` if the product doesn't exist.
    pub async fn set_active(&self, id: ProductId, active: bool) -> Result<Product, RepositoryError> {
        sqlx::query_as::<_, ProductRow>(&format!(
            "UPDATE products AS p SET is_active = $1 WHERE p.id = $2 RETURNING {PRODUCT_COLUMNS}"
        ))
        .bind(active)
        .bind(id)
        .fetch_optional(self.pool)
        .await?
        .ok_or(RepositoryError::NotFound)?
        .try_into()
    }

    /// Activate every inactive product. Returns the number of rows changed.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the update fails.
    pub async fn activate_all_inactive(&self) -> Result<u64, RepositoryError> {
        let result = sqlx::query("UPDATE products SET is_active = TRUE WHERE NOT is_active")
            .execute(self.pool)
            .await?;

        Ok(result.rows_affected())
    }

    /// Take `quantity` units out of stock inside a transaction.
    ///
    /// Returns `false` (and changes nothing) when stock is insufficient.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the update fails.
    pub async fn decrement_stock(
        conn: &mut PgConnection,
        id: ProductId,
        quantity: i32,
    ) -> Result<bool, RepositoryError> {
        let result =
            sqlx::query("UPDATE products SET stock = stock - $1 WHERE id = $2 AND stock >= $1")
                .bind(quantity)
                .bind(id)
                .execute(conn)
                .await?;

        Ok(result.rows_affected() == 1)
    }

    /// Append an image URL to a product's gallery.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::NotFound` if the product doesn't exist.
    pub async fn add_image(&self, id: ProductId, url: &str) -> Result<Product, RepositoryError> {
        sqlx::query_as::<_, ProductRow>(&format!(
            "UPDATE products AS p SET image_urls = array_append(p.image_urls, $1) WHERE p.id = $2
             RETURNING {PRODUCT_COLUMNS}"
        ))
        .bind(url)
        .bind(id)
        .fetch_optional(self.pool)
        .await?
        .ok_or(RepositoryError::NotFound)?
        .try_into()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_search_pattern_escapes_wildcards() {
        assert_eq!(search_pattern(Some("50%_off")), Some("%50\\%\\_off%".to_string()));
    }

    #[test]
    fn test_search_pattern_blank_is_none() {
        assert_eq!(search_pattern(Some("   ")), None);
        assert_eq!(search_pattern(None), None);
    }

    #[test]
    fn test_search_pattern_trims() {
        assert_eq!(search_pattern(Some(" mug ")), Some("%mug%".to_string()));
    }
}
