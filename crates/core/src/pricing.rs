//! Order pricing rules.
//!
//! All amounts are in the store currency's standard unit. Line totals and
//! subtotals are exact; discounts are rounded to cents.

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::types::{DiscountType, round_money};

/// Price of `quantity` units at `unit_price`.
#[must_use]
pub fn line_total(unit_price: Decimal, quantity: u32) -> Decimal {
    unit_price * Decimal::from(quantity)
}

/// Sum of `(unit_price, quantity)` lines.
#[must_use]
pub fn subtotal<I>(lines: I) -> Decimal
where
    I: IntoIterator<Item = (Decimal, u32)>,
{
    lines
        .into_iter()
        .map(|(price, qty)| line_total(price, qty))
        .sum()
}

/// Discount granted by a coupon on `subtotal`.
///
/// Percentages are clamped to 0-100 and the result rounded to cents; fixed
/// amounts never exceed the subtotal. The result is never negative.
///
/// ```
/// use emporium_core::DiscountType;
/// use emporium_core::pricing::discount_amount;
/// use rust_decimal::Decimal;
///
/// let off = discount_amount(DiscountType::Percentage, Decimal::from(15), Decimal::new(3333, 2));
/// assert_eq!(off, Decimal::new(500, 2));
/// ```
#[must_use]
pub fn discount_amount(kind: DiscountType, value: Decimal, subtotal: Decimal) -> Decimal {
    if subtotal <= Decimal::ZERO || value <= Decimal::ZERO {
        return Decimal::ZERO;
    }

    match kind {
        DiscountType::Percentage => {
            let pct = value.min(Decimal::ONE_HUNDRED);
            round_money(subtotal * pct / Decimal::ONE_HUNDRED)
        }
        DiscountType::FixedAmount => round_money(value.min(subtotal)),
    }
}

/// Computed monetary totals of an order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct OrderTotals {
    pub subtotal: Decimal,
    pub discount: Decimal,
    pub shipping: Decimal,
    pub total: Decimal,
}

impl OrderTotals {
    /// Combine subtotal, discount and shipping into a total.
    ///
    /// The discount only applies to merchandise; shipping is always charged.
    #[must_use]
    pub fn compute(subtotal: Decimal, discount: Decimal, shipping: Decimal) -> Self {
        let discount = discount.max(Decimal::ZERO).min(subtotal.max(Decimal::ZERO));
        let shipping = shipping.max(Decimal::ZERO);
        let merchandise = (subtotal - discount).max(Decimal::ZERO);

        Self {
            subtotal,
            discount,
            shipping,
            total: round_money(merchandise + shipping),
        }
    }

    /// Whether nothing is owed.
    #[must_use]
    pub fn is_free(&self) -> bool {
        self.total.is_zero()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn d(units: i64, scale: u32) -> Decimal {
        Decimal::new(units, scale)
    }

    #[test]
    fn test_line_total() {
        assert_eq!(line_total(d(1999, 2), 3), d(5997, 2));
        assert_eq!(line_total(d(1999, 2), 0), Decimal::ZERO);
    }

    #[test]
    fn test_subtotal_sums_lines() {
        let lines = vec![(d(1000, 2), 2), (d(250, 2), 4)];
        assert_eq!(subtotal(lines), d(3000, 2));
        assert_eq!(subtotal(Vec::new()), Decimal::ZERO);
    }

    #[test]
    fn test_percentage_discount_rounds_to_cents() {
        // 10% of 19.99 = 1.999
        assert_eq!(
            discount_amount(DiscountType::Percentage, Decimal::TEN, d(1999, 2)),
            d(200, 2)
        );
    }

    #[test]
    fn test_percentage_discount_clamped() {
        assert_eq!(
            discount_amount(DiscountType::Percentage, Decimal::from(150), d(5000, 2)),
            d(5000, 2)
        );
        assert_eq!(
            discount_amount(DiscountType::Percentage, Decimal::from(-5), d(5000, 2)),
            Decimal::ZERO
        );
    }

    #[test]
    fn test_fixed_discount_capped_at_subtotal() {
        assert_eq!(
            discount_amount(DiscountType::FixedAmount, Decimal::from(25), d(1500, 2)),
            d(1500, 2)
        );
        assert_eq!(
            discount_amount(DiscountType::FixedAmount, Decimal::from(5), d(1500, 2)),
            Decimal::from(5)
        );
    }

    #[test]
    fn test_discount_on_empty_subtotal() {
        assert_eq!(
            discount_amount(DiscountType::FixedAmount, Decimal::TEN, Decimal::ZERO),
            Decimal::ZERO
        );
    }

    #[test]
    fn test_totals_add_shipping_after_discount() {
        let totals = OrderTotals::compute(d(5000, 2), d(1000, 2), d(599, 2));
        assert_eq!(totals.total, d(4599, 2));
        assert!(!totals.is_free());
    }

    #[test]
    fn test_totals_never_negative() {
        let totals = OrderTotals::compute(d(1000, 2), d(2000, 2), Decimal::ZERO);
        assert_eq!(totals.discount, d(1000, 2));
        assert_eq!(totals.total, Decimal::ZERO);
        assert!(totals.is_free());
    }

    #[test]
    fn test_free_order_still_pays_shipping() {
        let totals = OrderTotals::compute(d(1000, 2), d(1000, 2), d(500, 2));
        assert_eq!(totals.total, d(500, 2));
    }
}
