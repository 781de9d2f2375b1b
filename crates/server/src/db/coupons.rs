//! Coupon repository.

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use sqlx::{PgConnection, PgPool};

use emporium_core::{CouponCode, CouponId, DiscountType};

use super::{RepositoryError, conflict_on_unique};
use crate::models::{Coupon, CouponInput};

const COUPON_COLUMNS: &str = "id, code, description, discount_type, value, min_subtotal, \
     max_uses, times_used, starts_at, expires_at, is_active, created_at, updated_at";

#[derive(Debug, sqlx::FromRow)]
struct CouponRow {
    id: CouponId,
    code: String,
    description: Option<String>,
    discount_type: DiscountType,
    value: Decimal,
    min_subtotal: Option<Decimal>,
    max_uses: Option<i32>,
    times_used: i32,
    starts_at: Option<DateTime<Utc>>,
    expires_at: Option<DateTime<Utc>>,
    is_active: bool,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

impl From<CouponRow> for Coupon {
    fn from(row: CouponRow) -> Self {
        Self {
            id: row.id,
            code: row.code,
            description: row.description,
            discount_type: row.discount_type,
            value: row.value,
            min_subtotal: row.min_subtotal,
            max_uses: row.max_uses,
            times_used: row.times_used,
            starts_at: row.starts_at,
            expires_at: row.expires_at,
            is_active: row.is_active,
            created_at: row.created_at,
            updated_at: row.updated_at,
        }
    }
}

/// Repository for coupon database operations.
pub struct CouponRepository<'a> {
    pool: &'a PgPool,
}

impl<'a> CouponRepository<'a> {
    #[must_use]
    pub const fn new(pool: &'a PgPool) -> Self {
        Self { pool }
    }

    /// Look up a coupon by code, case-insensitively.
    ///
    /// An exact match wins over a legacy row differing only in case.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    pub async fn get_by_code(&self, code: &str) -> Result<Option<Coupon>, RepositoryError> {
        let normalized = CouponCode::normalize(code);
        let row = sqlx::query_as::<_, CouponRow>(&format!(
            "SELECT {COUPON_COLUMNS} FROM coupons
             WHERE UPPER(code) = $1
             ORDER BY (code = $1) DESC, id
             LIMIT 1"
        ))
        .bind(&normalized)
        .fetch_optional(self.pool)
        .await?;

        Ok(row.map(Coupon::from))
    }

    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    pub async fn get_by_id(&self, id: CouponId) -> Result<Option<Coupon>, RepositoryError> {
        let row = sqlx::query_as::<_, CouponRow>(&format!(
            "SELECT {COUPON_COLUMNS} FROM coupons WHERE id = $1"
        ))
        .bind(id)
        .fetch_optional(self.pool)
        .await?;

        Ok(row.map(Coupon::from))
    }

    /// List all coupons, newest first.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    pub async fn list(&self) -> Result<Vec<Coupon>, RepositoryError> {
        let rows = sqlx::query_as::<_, CouponRow>(&format!(
            "SELECT {COUPON_COLUMNS} FROM coupons ORDER BY created_at DESC, id DESC"
        ))
        .fetch_all(self.pool)
        .await?;

        Ok(rows.into_iter().map(Coupon::from).collect())
    }

    /// Create a coupon. The code is stored uppercase.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Conflict` if the code is taken.
    pub async fn create(
        &self,
        code: &CouponCode,
        input: &CouponInput,
    ) -> Result<Coupon, RepositoryError> {
        let row = sqlx::query_as::<_, CouponRow>(&format!(
            "INSERT INTO coupons (code, description, discount_type, value, min_subtotal,
                 max_uses, starts_at, expires_at, is_active)
             VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9)
             RETURNING {COUPON_COLUMNS}"
        ))
        .bind(code.as_str())
        .bind(input.description.as_deref())
        .bind(input.discount_type)
        .bind(input.value)
        .bind(input.min_subtotal)
        .bind(input.max_uses)
        .bind(input.starts_at)
        .bind(input.expires_at)
        .bind(input.is_active)
        .fetch_one(self.pool)
        .await
        .map_err(conflict_on_unique("coupon code already exists"))?;

        Ok(row.into())
    }

    /// Replace a coupon's editable fields. Usage count is preserved.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::NotFound` if the coupon doesn't exist, or
    /// `RepositoryError::Conflict` if the new code is taken.
    pub async fn update(
        &self,
        id: CouponId,
        code: &CouponCode,
        input: &CouponInput,
    ) -> Result<Coupon, RepositoryError> {
        let row = sqlx::query_as::<_, CouponRow>(&format!(
            "UPDATE coupons SET code = $1, description = $2, discount_type = $3, value = $4,
                 min_subtotal = $5, max_uses = $6, starts_at = $7, expires_at = $8, is_active = $9
             WHERE id = $10
             RETURNING {COUPON_COLUMNS}"
        ))
        .bind(code.as_str())
        .bind(input.description.as_deref())
        .bind(input.discount_type)
        .bind(input.value)
        .bind(input.min_subtotal)
        .bind(input.max_uses)
        .bind(input.starts_at)
        .bind(input.expires_at)
        .bind(input.is_active)
        .bind(id)
        .fetch_optional(self.pool)
        .await
        .map_err(conflict_on_unique("coupon code already exists"))?
        .ok_or(RepositoryError::NotFound)?;

        Ok(row.into())
    }

    /// # Errors
    ///
    /// Returns `RepositoryError::NotFound` if the coupon doesn't exist.
    pub async fn delete(&self, id: CouponId) -> Result<(), RepositoryError> {
        let result = sqlx::query("DELETE FROM coupons WHERE id = $1")
            .bind(id)
            .execute(self.pool)
            .await?;

        if result.rows_affected() == 0 {
            return Err(RepositoryError::NotFound);
        }

        Ok(())
    }

    /// Record one redemption of `code` inside a transaction.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the update fails.
    pub async fn increment_usage(conn: &mut PgConnection, code: &str) -> Result<(), RepositoryError> {
        sqlx::query("UPDATE coupons SET times_used = times_used + 1 WHERE code = $1")
            .bind(code)
            .execute(conn)
            .await?;

        Ok(())
    }

    /// Rewrite every coupon code in uppercase.
    ///
    /// A code whose uppercase form already belongs to another coupon is left
    /// untouched and reported with a warning. Returns the number of rows changed.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if a query fails.
    pub async fn uppercase_all_codes(&self) -> Result<u64, RepositoryError> {
        let pending: Vec<(CouponId, String)> =
            sqlx::query_as("SELECT id, code FROM coupons WHERE code <> UPPER(code) ORDER BY id")
                .fetch_all(self.pool)
                .await?;

        let mut changed = 0;
        for (id, code) in pending {
            let result = sqlx::query("UPDATE coupons SET code = UPPER(code) WHERE id = $1")
                .bind(id)
                .execute(self.pool)
                .await
                .map_err(conflict_on_unique("uppercase code already exists"));

            match result {
                Ok(r) => changed += r.rows_affected(),
                Err(RepositoryError::Conflict(_)) => {
                    tracing::warn!(
                        coupon_id = %id,
                        code = %code,
                        "Skipping coupon: uppercase code collides with an existing coupon"
                    );
                }
                Err(e) => return Err(e),
            }
        }

        Ok(changed)
    }
}
