//! Coupon eligibility rules.

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use thiserror::Error;

use emporium_core::pricing::discount_amount;

use crate::models::Coupon;

/// Reason a coupon cannot be applied to an order.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum CouponRejection {
    #[error("coupon not found")]
    NotFound,

    #[error("coupon is not active")]
    Inactive,

    #[error("coupon is not valid yet")]
    NotStarted,

    #[error("coupon has expired")]
    Expired,

    #[error("coupon usage limit reached")]
    UsageLimitReached,

    #[error("order subtotal must be at least {minimum}")]
    MinimumNotMet { minimum: Decimal },
}

/// Check `coupon` against an order subtotal and return the discount it grants.
///
/// # Errors
///
/// Returns the first [`CouponRejection`] that applies.
pub fn validate_coupon(
    coupon: &Coupon,
    subtotal: Decimal,
    now: DateTime<Utc>,
) -> Result<Decimal, CouponRejection> {
    if !coupon.is_active {
        return Err(CouponRejection::Inactive);
    }
    if coupon.starts_at.is_some_and(|starts| now < starts) {
        return Err(CouponRejection::NotStarted);
    }
    if coupon.expires_at.is_some_and(|expires| now >= expires) {
        return Err(CouponRejection::Expired);
    }
    if coupon
        .max_uses
        .is_some_and(|max| coupon.times_used >= max)
    {
        return Err(CouponRejection::UsageLimitReached);
    }
    if let Some(minimum) = coupon.min_subtotal
        && subtotal < minimum
    {
        return Err(CouponRejection::MinimumNotMet { minimum });
    }

    Ok(discount_amount(coupon.discount_type, coupon.value, subtotal))
}

#[cfg(test)]
mod tests {
    use chrono::Duration;

    use emporium_core::{CouponId, DiscountType};

    use super::*;

    fn coupon() -> Coupon {
        let now = Utc::now();
        Coupon {
            id: CouponId::new(1),
            code: "SAVE10".to_string(),
            description: None,
            discount_type: DiscountType::Percentage,
            value: Decimal::TEN,
            min_subtotal: None,
            max_uses: None,
            times_used: 0,
            starts_at: None,
            expires_at: None,
            is_active: true,
            created_at: now,
            updated_at: now,
        }
    }

    #[test]
    fn test_valid_coupon_returns_discount() {
        assert_eq!(
            validate_coupon(&coupon(), Decimal::from(80), Utc::now()),
            Ok(Decimal::from(8))
        );
    }

    #[test]
    fn test_inactive_coupon() {
        let mut c = coupon();
        c.is_active = false;
        assert_eq!(
            validate_coupon(&c, Decimal::from(80), Utc::now()),
            Err(CouponRejection::Inactive)
        );
    }

    #[test]
    fn test_window() {
        let now = Utc::now();
        let mut c = coupon();
        c.starts_at = Some(now + Duration::hours(1));
        assert_eq!(
            validate_coupon(&c, Decimal::ONE, now),
            Err(CouponRejection::NotStarted)
        );

        c.starts_at = None;
        c.expires_at = Some(now);
        assert_eq!(
            validate_coupon(&c, Decimal::ONE, now),
            Err(CouponRejection::Expired)
        );
    }

    #[test]
    fn test_usage_limit() {
        let mut c = coupon();
        c.max_uses = Some(3);
        c.times_used = 3;
        assert_eq!(
            validate_coupon(&c, Decimal::ONE, Utc::now()),
            Err(CouponRejection::UsageLimitReached)
        );
        c.times_used = 2;
        assert!(validate_coupon(&c, Decimal::ONE, Utc::now()).is_ok());
    }

    #[test]
    fn test_minimum_subtotal() {
        let mut c = coupon();
        c.min_subtotal = Some(Decimal::from(50));
        assert_eq!(
            validate_coupon(&c, Decimal::from(49), Utc::now()),
            Err(CouponRejection::MinimumNotMet {
                minimum: Decimal::from(50)
            })
        );
        assert!(validate_coupon(&c, Decimal::from(50), Utc::now()).is_ok());
    }
}
