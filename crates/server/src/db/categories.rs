//! Category repository.

use chrono::{DateTime, Utc};
use sqlx::PgPool;

use emporium_core::{CategoryId, Slug};

use super::{RepositoryError, conflict_on_unique};
use crate::models::{Category, SeedCategory};

const CATEGORY_COLUMNS: &str = "id, name, slug, description, created_at, updated_at";

#[derive(Debug, sqlx::FromRow)]
struct CategoryRow {
    id: CategoryId,
    name: String,
    slug: String,
    description: Option<String>,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

impl TryFrom<CategoryRow> for Category {
    type Error = RepositoryError;

    fn try_from(row: CategoryRow) -> Result<Self, Self::Error> {
        let slug = Slug::parse(&row.slug).map_err(|e| {
            RepositoryError::DataCorruption(format!("invalid category slug in database: {e}"))
        })?;

        Ok(Self {
            id: row.id,
            name: row.name,
            slug,
            description: row.description,
            created_at: row.created_at,
            updated_at: row.updated_at,
        })
    }
}

/// Repository for category database operations.
pub struct CategoryRepository<'a> {
    pool: &'a PgPool,
}

impl<'a> CategoryRepository<'a> {
    #[must_use]
    pub const fn new(pool: &'a PgPool) -> Self {
        Self { pool }
    }

    /// List all categories by name.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    pub async fn list(&self) -> Result<Vec<Category>, RepositoryError> {
        sqlx::query_as::<_, CategoryRow>(&format!(
            "SELECT {CATEGORY_COLUMNS} FROM categories ORDER BY name"
        ))
        .fetch_all(self.pool)
        .await?
        .into_iter()
        .map(Category::try_from)
        .collect()
    }

    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    pub async fn get_by_id(&self, id: CategoryId) -> Result<Option<Category>, RepositoryError> {
        sqlx::query_as::<_, CategoryRow>(&format!(
            "SELECT {CATEGORY_COLUMNS} FROM categories WHERE id = $1"
        ))
        .bind(id)
        .fetch_optional(self.pool)
        .await?
        .map(Category::try_from)
        .transpose()
    }

    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    pub async fn get_by_slug(&self, slug: &str) -> Result<Option<Category>, RepositoryError> {
        sqlx::query_as::<_, CategoryRow>(&format!(
            "SELECT {CATEGORY_COLUMNS} FROM categories WHERE slug = $1"
        ))
        .bind(slug)
        .fetch_optional(self.pool)
        .await?
        .map(Category::try_from)
        .transpose()
    }

    /// Create a category.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Conflict` if the slug is taken.
    pub async fn create(
        &self,
        name: &str,
        slug: &Slug,
        description: Option<&str>,
    ) -> Result<Category, RepositoryError> {
        sqlx::query_as::<_, CategoryRow>(&format!(
            "INSERT INTO categories (name, slug, description) VALUES ($1, $2, $3)
             RETURNING {CATEGORY_COLUMNS}"
        ))
        .bind(name.trim())
        .bind(slug.as_str())
        .bind(description)
        .fetch_one(self.pool)
        .await
        .map_err(conflict_on_unique("category slug already exists"))?
        .try_into()
    }

    /// Update a category.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::NotFound` if the category doesn't exist, or
    /// `RepositoryError::Conflict` if the new slug is taken.
    pub async fn update(
        &self,
        id: CategoryId,
        name: &str,
        slug: &Slug,
        description: Option<&str>,
    ) -> Result<Category, RepositoryError> {
        sqlx::query_as::<_, CategoryRow>(&format!(
            "UPDATE categories SET name = $1, slug = $2, description = $3 WHERE id = $4
             RETURNING {CATEGORY_COLUMNS}"
        ))
        .bind(name.trim())
        .bind(slug.as_str())
        .bind(description)
        .bind(id)
        .fetch_optional(self.pool)
        .await
        .map_err(conflict_on_unique("category slug already exists"))?
        .ok_or(RepositoryError::NotFound)?
        .try_into()
    }

    /// Delete a category. Its products stay, uncategorized.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::NotFound` if the category doesn't exist.
    pub async fn delete(&self, id: CategoryId) -> Result<(), RepositoryError> {
        let result = sqlx::query("DELETE FROM categories WHERE id = $1")
            .bind(id)
            .execute(self.pool)
            .await?;

        if result.rows_affected() == 0 {
            return Err(RepositoryError::NotFound);
        }

        Ok(())
    }

    /// Insert seed categories whose slug is not present yet.
    ///
    /// Returns the number of rows inserted.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if an insert fails.
    pub async fn seed_defaults(&self, seeds: &[SeedCategory]) -> Result<u64, RepositoryError> {
        let mut inserted = 0;

        for seed in seeds {
            let slug = match Slug::from_name(&seed.name) {
                Ok(slug) => slug,
                Err(e) => {
                    tracing::warn!(name = %seed.name, error = %e, "Skipping seed category");
                    continue;
                }
            };

            let result = sqlx::query(
                "INSERT INTO categories (name, slug, description) VALUES ($1, $2, $3)
                 ON CONFLICT (slug) DO NOTHING",
            )
            .bind(seed.name.trim())
            .bind(slug.as_str())
            .bind(seed.description.as_deref())
            .execute(self.pool)
            .await?;

            if result.rows_affected() == 0 {
                tracing::debug!(slug = %slug, "Category already exists");
            }
            inserted += result.rows_affected();
        }

        Ok(inserted)
    }
}
