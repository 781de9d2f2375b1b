//! Coupon domain types.

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use emporium_core::{CouponCode, CouponId, DiscountType};

/// A discount coupon.
///
/// `code` is kept as stored: rows created before codes were normalized may
/// still be lowercase until the `uppercase-coupons` maintenance script runs.
#[derive(Debug, Clone, Serialize)]
pub struct Coupon {
    pub id: CouponId,
    pub code: String,
    pub description: Option<String>,
    pub discount_type: DiscountType,
    /// Percentage (0-100) or fixed amount, depending on `discount_type`.
    pub value: Decimal,
    /// Subtotal the cart must reach for the coupon to apply.
    pub min_subtotal: Option<Decimal>,
    pub max_uses: Option<i32>,
    pub times_used: i32,
    pub starts_at: Option<DateTime<Utc>>,
    pub expires_at: Option<DateTime<Utc>>,
    pub is_active: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Fields accepted when creating or updating a coupon.
#[derive(Debug, Clone, Deserialize)]
pub struct CouponInput {
    pub code: String,
    #[serde(default)]
    pub description: Option<String>,
    pub discount_type: DiscountType,
    pub value: Decimal,
    #[serde(default)]
    pub min_subtotal: Option<Decimal>,
    #[serde(default)]
    pub max_uses: Option<i32>,
    #[serde(default)]
    pub starts_at: Option<DateTime<Utc>>,
    #[serde(default)]
    pub expires_at: Option<DateTime<Utc>>,
    #[serde(default = "default_true")]
    pub is_active: bool,
}

const fn default_true() -> bool {
    true
}

impl CouponInput {
    /// Validate the input and normalize its code.
    ///
    /// # Errors
    ///
    /// Returns a message describing the first invalid field.
    pub fn validate(&self) -> Result<CouponCode, String> {
        let code = CouponCode::parse(&self.code).map_err(|e| e.to_string())?;

        if self.value <= Decimal::ZERO {
            return Err("value must be greater than zero".to_string());
        }
        if self.discount_type == DiscountType::Percentage && self.value > Decimal::ONE_HUNDRED {
            return Err("percentage must be at most 100".to_string());
        }
        if self.min_subtotal.is_some_and(|m| m.is_sign_negative()) {
            return Err("min_subtotal must not be negative".to_string());
        }
        if self.max_uses.is_some_and(|m| m < 1) {
            return Err("max_uses must be at least 1".to_string());
        }
        if let (Some(starts), Some(expires)) = (self.starts_at, self.expires_at)
            && expires <= starts
        {
            return Err("expires_at must be after starts_at".to_string());
        }

        Ok(code)
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use chrono::Duration;

    use super::*;

    fn input() -> CouponInput {
        CouponInput {
            code: "spring-10".to_string(),
            description: None,
            discount_type: DiscountType::Percentage,
            value: Decimal::TEN,
            min_subtotal: None,
            max_uses: None,
            starts_at: None,
            expires_at: None,
            is_active: true,
        }
    }

    #[test]
    fn test_validate_normalizes_code() {
        assert_eq!(input().validate().unwrap().as_str(), "SPRING-10");
    }

    #[test]
    fn test_validate_percentage_over_100() {
        let mut i = input();
        i.value = Decimal::from(120);
        assert!(i.validate().is_err());

        i.discount_type = DiscountType::FixedAmount;
        assert!(i.validate().is_ok());
    }

    #[test]
    fn test_validate_zero_value() {
        let mut i = input();
        i.value = Decimal::ZERO;
        assert!(i.validate().is_err());
    }

    #[test]
    fn test_validate_window() {
        let mut i = input();
        let now = Utc::now();
        i.starts_at = Some(now);
        i.expires_at = Some(now - Duration::days(1));
        assert_eq!(
            i.validate().unwrap_err(),
            "expires_at must be after starts_at".to_string()
        );
    }

    #[test]
    fn test_is_active_defaults_true() {
        let i: CouponInput = serde_json::from_str(
            r#"{"code":"TAKE5","discount_type":"fixed_amount","value":"5"}"#,
        )
        .unwrap();
        assert!(i.is_active);
        assert_eq!(i.value, Decimal::from(5));
    }
}
