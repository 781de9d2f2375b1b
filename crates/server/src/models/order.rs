//! Order domain types.

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::Serialize;

use emporium_core::{
    OrderId, OrderItemId, OrderStatus, OrderTotals, PaymentStatus, ProductId, UserId,
};

use super::Address;

/// A placed order.
#[derive(Debug, Clone, Serialize)]
pub struct Order {
    pub id: OrderId,
    /// `None` for guest checkouts.
    pub user_id: Option<UserId>,
    pub email: String,
    pub status: OrderStatus,
    pub payment_status: PaymentStatus,
    #[serde(skip_serializing)]
    pub payment_intent_id: Option<String>,
    pub currency: String,
    pub subtotal: Decimal,
    pub discount: Decimal,
    pub shipping: Decimal,
    pub total: Decimal,
    pub coupon_code: Option<String>,
    pub shipping_address: Address,
    pub shipping_method: Option<String>,
    pub carrier: Option<String>,
    pub tracking_number: Option<String>,
    pub notes: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    pub paid_at: Option<DateTime<Utc>>,
}

impl Order {
    /// Whether `user_id` placed this order.
    #[must_use]
    pub fn is_owned_by(&self, user_id: UserId) -> bool {
        self.user_id == Some(user_id)
    }

    /// Short human-facing reference, e.g. `#001042`.
    #[must_use]
    pub fn reference(&self) -> String {
        format!("#{:06}", self.id.as_i32())
    }
}

/// A line of an order, priced at the time of purchase.
#[derive(Debug, Clone, Serialize)]
pub struct OrderItem {
    pub id: OrderItemId,
    pub order_id: OrderId,
    /// `None` once the product has been deleted.
    pub product_id: Option<ProductId>,
    pub product_name: String,
    pub unit_price: Decimal,
    pub quantity: i32,
    pub line_total: Decimal,
}

/// An order ready to be inserted.
#[derive(Debug, Clone)]
pub struct NewOrder {
    pub user_id: Option<UserId>,
    pub email: String,
    pub currency: String,
    pub totals: OrderTotals,
    pub coupon_code: Option<String>,
    pub shipping_address: Address,
    pub shipping_method: Option<String>,
    pub notes: Option<String>,
    pub items: Vec<NewOrderItem>,
}

/// A line of a [`NewOrder`].
#[derive(Debug, Clone)]
pub struct NewOrderItem {
    pub product_id: ProductId,
    pub product_name: String,
    pub unit_price: Decimal,
    pub quantity: i32,
    pub line_total: Decimal,
}

/// Dashboard figures.
#[derive(Debug, Clone, Serialize)]
pub struct OrderStats {
    /// Counts for every status with at least one order.
    pub orders_by_status: Vec<StatusCount>,
    pub total_orders: i64,
    /// Sum of totals of paid, non-refunded orders.
    pub revenue: Decimal,
    pub product_count: i64,
    pub active_product_count: i64,
}

/// Number of orders in one status.
#[derive(Debug, Clone, Copy, Serialize)]
pub struct StatusCount {
    pub status: OrderStatus,
    pub count: i64,
}
