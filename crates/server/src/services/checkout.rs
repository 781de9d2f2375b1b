//! Checkout and payment confirmation.
//!
//! Placing an order prices the cart from the database (never from client
//! input), applies a coupon, resolves shipping, stores the order and creates
//! a Stripe `PaymentIntent` for the browser to confirm. Stock and coupon
//! usage are only consumed once the payment is confirmed, either by the
//! webhook or by reconciling with Stripe.

use std::collections::HashMap;

use chrono::Utc;
use rust_decimal::Decimal;
use serde::Deserialize;
use sqlx::PgPool;
use thiserror::Error;
use tracing::{info, instrument, warn};

use emporium_core::pricing::{line_total, subtotal};
use emporium_core::{
    CouponCode, CurrencyCode, Email, Money, OrderId, OrderStatus, OrderTotals, PaymentStatus,
    ProductId, UserId,
};

use crate::db::{CouponRepository, OrderRepository, ProductRepository, RepositoryError};
use crate::models::{Address, NewOrder, NewOrderItem, Order, OrderItem, Product};
use crate::services::coupons::{CouponRejection, validate_coupon};
use crate::services::email::EmailService;
use crate::services::payments::{PaymentError, PaymentIntent, PaymentIntentStatus, StripeClient};
use crate::services::shipping::{Parcel, ShippingError, ShippingRate, ShippoClient};

/// Most units of one product per order.
pub const MAX_QUANTITY: u32 = 99;

/// Most distinct products per order.
pub const MAX_LINES: usize = 50;

const MAX_NOTES_LENGTH: usize = 1000;

const FLAT_RATE_LABEL: &str = "Flat rate";

/// A product and quantity in the customer's cart.
#[derive(Debug, Clone, Copy, Deserialize)]
pub struct CartLine {
    pub product_id: ProductId,
    pub quantity: u32,
}

/// Everything the browser sends to place an order.
#[derive(Debug, Clone, Deserialize)]
pub struct CheckoutRequest {
    /// Required for guests; defaults to the account email when logged in.
    #[serde(default)]
    pub email: Option<String>,
    pub items: Vec<CartLine>,
    pub shipping_address: Address,
    /// Shippo rate chosen from a quote; flat rate when absent.
    #[serde(default)]
    pub shipping_rate_id: Option<String>,
    #[serde(default)]
    pub coupon_code: Option<String>,
    #[serde(default)]
    pub notes: Option<String>,
}

/// Result of placing an order.
#[derive(Debug, Clone)]
pub struct PlacedOrder {
    pub order: Order,
    pub items: Vec<OrderItem>,
    /// `PaymentIntent` client secret; `None` when nothing is owed.
    pub client_secret: Option<String>,
}

/// Errors that can occur during checkout.
#[derive(Debug, Error)]
pub enum CheckoutError {
    #[error("cart is empty")]
    EmptyCart,

    #[error("cart has more than {MAX_LINES} products")]
    TooManyLines,

    #[error("quantity for product {0} must be between 1 and {MAX_QUANTITY}")]
    InvalidQuantity(ProductId),

    #[error("product {0} is not available")]
    ProductUnavailable(ProductId),

    #[error("only {available} of {name} left in stock")]
    InsufficientStock { name: String, available: i32 },

    #[error("invalid email address")]
    InvalidEmail,

    #[error("{0}")]
    InvalidAddress(String),

    #[error("notes must be at most {MAX_NOTES_LENGTH} characters")]
    NotesTooLong,

    #[error("{0}")]
    Coupon(#[from] CouponRejection),

    #[error("live shipping rates are not available")]
    ShippingUnavailable,

    #[error("shipping rate is invalid or expired")]
    InvalidShippingRate,

    #[error("order not found")]
    OrderNotFound,

    #[error("order cannot be refunded in its current state")]
    NotRefundable,

    #[error("order has been paid, refund it instead of cancelling")]
    CancelPaidOrder,

    #[error("order cannot be cancelled in its current state")]
    NotCancellable,

    #[error("order changed, reload and retry")]
    OrderChanged,

    #[error("database error: {0}")]
    Repository(#[from] RepositoryError),

    #[error("payment error: {0}")]
    Payment(#[from] PaymentError),

    #[error("shipping error: {0}")]
    Shipping(#[from] ShippingError),
}

/// Checkout service.
pub struct CheckoutService<'a> {
    pool: &'a PgPool,
    stripe: &'a StripeClient,
    shippo: Option<&'a ShippoClient>,
    email: Option<&'a EmailService>,
    currency: CurrencyCode,
    flat_shipping_rate: Decimal,
}

impl<'a> CheckoutService<'a> {
    /// Create a new checkout service.
    #[must_use]
    pub const fn new(
        pool: &'a PgPool,
        stripe: &'a StripeClient,
        shippo: Option<&'a ShippoClient>,
        email: Option<&'a EmailService>,
        currency: CurrencyCode,
        flat_shipping_rate: Decimal,
    ) -> Self {
        Self {
            pool,
            stripe,
            shippo,
            email,
            currency,
            flat_shipping_rate,
        }
    }

    /// Quote live shipping rates for a cart.
    ///
    /// # Errors
    ///
    /// Returns `CheckoutError::ShippingUnavailable` without Shippo, and cart
    /// or address validation errors as for [`Self::place_order`].
    #[instrument(skip_all)]
    pub async fn quote_shipping(
        &self,
        address: &Address,
        items: &[CartLine],
    ) -> Result<Vec<ShippingRate>, CheckoutError> {
        let shippo = self.shippo.ok_or(CheckoutError::ShippingUnavailable)?;
        address.validate().map_err(CheckoutError::InvalidAddress)?;

        let lines = merge_lines(items)?;
        let products = self.load_products(&lines).await?;
        let parcel = Parcel::for_weight(parcel_weight(&lines, &products));

        Ok(shippo.quote(address, parcel).await?)
    }

    /// Validate and store an order, and start its payment.
    ///
    /// # Errors
    ///
    /// Returns a validation `CheckoutError` for a bad cart, address, coupon or
    /// shipping rate, and `Payment` if Stripe refuses the intent.
    #[instrument(skip_all, fields(user_id = ?user.map(|(id, _)| id)))]
    pub async fn place_order(
        &self,
        request: CheckoutRequest,
        user: Option<(UserId, &Email)>,
    ) -> Result<PlacedOrder, CheckoutError> {
        let email = match (request.email.as_deref(), user) {
            (Some(email), _) => Email::parse(email).map_err(|_| CheckoutError::InvalidEmail)?,
            (None, Some((_, email))) => email.clone(),
            (None, None) => return Err(CheckoutError::InvalidEmail),
        };
        request
            .shipping_address
            .validate()
            .map_err(CheckoutError::InvalidAddress)?;
        let notes = request
            .notes
            .as_deref()
            .map(str::trim)
            .filter(|n| !n.is_empty())
            .map(String::from);
        if notes
            .as_ref()
            .is_some_and(|n| n.chars().count() > MAX_NOTES_LENGTH)
        {
            return Err(CheckoutError::NotesTooLong);
        }

        let lines = merge_lines(&request.items)?;
        let products = self.load_products(&lines).await?;
        let items = price_lines(&lines, &products)?;
        let subtotal = subtotal(
            items
                .iter()
                .map(|item| (item.unit_price, item.quantity.unsigned_abs())),
        );

        let (coupon_code, discount) = match request
            .coupon_code
            .as_deref()
            .map(str::trim)
            .filter(|c| !c.is_empty())
        {
            Some(code) => {
                let (code, discount) = self.apply_coupon(code, subtotal).await?;
                (Some(code), discount)
            }
            None => (None, Decimal::ZERO),
        };

        let (shipping_method, shipping) = match request.shipping_rate_id.as_deref() {
            Some(rate_id) => {
                let rate = self.resolve_rate(rate_id).await?;
                (rate.label(), rate.amount)
            }
            None => (FLAT_RATE_LABEL.to_string(), self.flat_shipping_rate),
        };

        let totals = OrderTotals::compute(subtotal, discount, shipping);
        let new_order = NewOrder {
            user_id: user.map(|(id, _)| id),
            email: email.into_inner(),
            currency: self.currency.code().to_string(),
            totals,
            coupon_code,
            shipping_address: request.shipping_address,
            shipping_method: Some(shipping_method),
            notes,
            items,
        };

        let mut tx = self.pool.begin().await.map_err(RepositoryError::from)?;
        let (order, items) = OrderRepository::create_with_items(&mut tx, &new_order).await?;
        tx.commit().await.map_err(RepositoryError::from)?;

        info!(order_id = %order.id, total = %order.total, "Order placed");

        if totals.is_free() {
            let order = self.confirm_payment(order.id).await?;
            return Ok(PlacedOrder {
                order,
                items,
                client_secret: None,
            });
        }

        let intent = match self.start_payment(&order).await {
            Ok(intent) => intent,
            Err(e) => {
                // Nothing can be paid for this order anymore.
                let orders = OrderRepository::new(self.pool);
                if let Err(cancel_err) = orders
                    .update_status(order.id, OrderStatus::Pending, OrderStatus::Cancelled)
                    .await
                {
                    warn!(order_id = %order.id, error = %cancel_err, "Failed to cancel unpayable order");
                }
                return Err(e);
            }
        };

        Ok(PlacedOrder {
            order,
            items,
            client_secret: intent.client_secret,
        })
    }

    /// Record that an order has been paid.
    ///
    /// Idempotent: stock and coupon usage are consumed, and the confirmation
    /// email is sent, only by the call that moves the order to paid.
    ///
    /// # Errors
    ///
    /// Returns `CheckoutError::OrderNotFound` if the order doesn't exist.
    #[instrument(skip(self))]
    pub async fn confirm_payment(&self, order_id: OrderId) -> Result<Order, CheckoutError> {
        let mut tx = self.pool.begin().await.map_err(RepositoryError::from)?;

        if !OrderRepository::mark_paid(&mut tx, order_id).await? {
            drop(tx);
            return self.get_order(order_id).await;
        }

        let items = OrderRepository::get_items_with(&mut *tx, order_id).await?;
        for item in &items {
            let Some(product_id) = item.product_id else {
                continue;
            };
            if !ProductRepository::decrement_stock(&mut tx, product_id, item.quantity).await? {
                warn!(
                    order_id = %order_id,
                    product_id = %product_id,
                    quantity = item.quantity,
                    "Paid order exceeds remaining stock"
                );
            }
        }

        let order = self.get_order_in(&mut tx, order_id).await?;
        if let Some(code) = order.coupon_code.as_deref() {
            CouponRepository::increment_usage(&mut tx, code).await?;
        }

        tx.commit().await.map_err(RepositoryError::from)?;
        info!(order_id = %order_id, "Payment confirmed");

        if let Some(email) = self.email
            && let Err(e) = email.send_order_confirmation(&order, &items).await
        {
            warn!(order_id = %order_id, error = %e, "Failed to send order confirmation");
        }

        Ok(order)
    }

    /// Bring an unpaid order up to date with its `PaymentIntent`.
    ///
    /// # Errors
    ///
    /// Returns `Payment` if Stripe cannot be reached.
    #[instrument(skip(self, order), fields(order_id = %order.id))]
    pub async fn reconcile(&self, order: Order) -> Result<Order, CheckoutError> {
        if !matches!(
            order.payment_status,
            PaymentStatus::Unpaid | PaymentStatus::Failed
        ) {
            return Ok(order);
        }
        let Some(intent_id) = order.payment_intent_id.as_deref() else {
            return Ok(order);
        };

        let intent = self.stripe.retrieve_payment_intent(intent_id).await?;
        self.apply_intent(order, &intent).await
    }

    /// Handle a `payment_intent.succeeded` webhook.
    ///
    /// # Errors
    ///
    /// Returns `CheckoutError::OrderNotFound` if no order uses the intent.
    pub async fn payment_succeeded(&self, intent: &PaymentIntent) -> Result<Order, CheckoutError> {
        let order = self.order_for_intent(intent).await?;
        self.apply_intent(order, intent).await
    }

    /// Handle a `payment_intent.payment_failed` webhook.
    ///
    /// # Errors
    ///
    /// Returns `CheckoutError::OrderNotFound` if no order uses the intent.
    pub async fn payment_failed(&self, intent: &PaymentIntent) -> Result<Order, CheckoutError> {
        let order = self.order_for_intent(intent).await?;
        self.mark_failed(order).await
    }

    /// Handle a refund issued outside the admin (e.g. the Stripe dashboard).
    ///
    /// # Errors
    ///
    /// Returns `CheckoutError::OrderNotFound` if no order uses the intent.
    pub async fn payment_refunded(&self, payment_intent_id: &str) -> Result<Order, CheckoutError> {
        let orders = OrderRepository::new(self.pool);
        let order = orders
            .get_by_payment_intent(payment_intent_id)
            .await?
            .ok_or(CheckoutError::OrderNotFound)?;

        if order.status == OrderStatus::Refunded {
            return Ok(order);
        }
        Ok(orders.mark_refunded(order.id).await?)
    }

    /// Refund a paid order in full through Stripe.
    ///
    /// # Errors
    ///
    /// Returns `CheckoutError::NotRefundable` unless the order is paid and its
    /// status allows a refund, and `Payment` if Stripe refuses.
    #[instrument(skip(self))]
    pub async fn refund(&self, order_id: OrderId) -> Result<Order, CheckoutError> {
        let order = self.get_order(order_id).await?;
        if order.payment_status != PaymentStatus::Paid
            || !order.status.can_transition_to(OrderStatus::Refunded)
        {
            return Err(CheckoutError::NotRefundable);
        }

        // Orders with nothing to pay never had an intent.
        if let Some(intent_id) = order.payment_intent_id.as_deref() {
            self.stripe.create_refund(intent_id).await?;
        }

        let order = OrderRepository::new(self.pool).mark_refunded(order_id).await?;
        info!(order_id = %order_id, "Order refunded");
        Ok(order)
    }

    /// Cancel an order that has not been paid.
    ///
    /// An open `PaymentIntent` is cancelled first so the browser can no
    /// longer complete it. If Stripe reports the intent already succeeded,
    /// the payment is recorded and the cancellation refused.
    ///
    /// # Errors
    ///
    /// Returns `CheckoutError::CancelPaidOrder` for a paid order,
    /// `NotCancellable` if the status forbids it, and `Payment` if Stripe
    /// refuses to cancel the intent.
    #[instrument(skip(self))]
    pub async fn cancel(&self, order_id: OrderId) -> Result<Order, CheckoutError> {
        let order = self.get_order(order_id).await?;
        check_cancellable(&order)?;

        if let Some(intent_id) = order.payment_intent_id.clone() {
            let intent = self.stripe.retrieve_payment_intent(&intent_id).await?;
            match intent.status {
                PaymentIntentStatus::Canceled => {}
                PaymentIntentStatus::Succeeded => {
                    self.apply_intent(order, &intent).await?;
                    return Err(CheckoutError::CancelPaidOrder);
                }
                _ => {
                    self.stripe.cancel_payment_intent(&intent_id).await?;
                }
            }
        }

        let order = OrderRepository::new(self.pool)
            .update_status(order_id, order.status, OrderStatus::Cancelled)
            .await?
            .ok_or(CheckoutError::OrderChanged)?;
        info!(order_id = %order_id, "Order cancelled");
        Ok(order)
    }

    // =========================================================================
    // Helpers
    // =========================================================================

    async fn load_products(
        &self,
        lines: &[(ProductId, u32)],
    ) -> Result<HashMap<ProductId, Product>, CheckoutError> {
        let ids: Vec<ProductId> = lines.iter().map(|(id, _)| *id).collect();
        let products = ProductRepository::new(self.pool).get_many(&ids).await?;
        Ok(products.into_iter().map(|p| (p.id, p)).collect())
    }

    async fn apply_coupon(
        &self,
        code: &str,
        subtotal: Decimal,
    ) -> Result<(String, Decimal), CheckoutError> {
        CouponCode::parse(code).map_err(|_| CouponRejection::NotFound)?;
        let coupon = CouponRepository::new(self.pool)
            .get_by_code(code)
            .await?
            .ok_or(CouponRejection::NotFound)?;

        let discount = validate_coupon(&coupon, subtotal, Utc::now())?;
        Ok((coupon.code, discount))
    }

    async fn resolve_rate(&self, rate_id: &str) -> Result<ShippingRate, CheckoutError> {
        let shippo = self.shippo.ok_or(CheckoutError::ShippingUnavailable)?;
        let rate = match shippo.get_rate(rate_id).await {
            Ok(rate) => rate,
            Err(ShippingError::RateNotFound) => return Err(CheckoutError::InvalidShippingRate),
            Err(e) => return Err(e.into()),
        };

        if !rate.currency.eq_ignore_ascii_case(self.currency.code()) {
            warn!(rate_currency = %rate.currency, "Shipping rate in foreign currency");
            return Err(CheckoutError::InvalidShippingRate);
        }
        Ok(rate)
    }

    async fn start_payment(&self, order: &Order) -> Result<PaymentIntent, CheckoutError> {
        let amount_minor = Money::new(order.total, self.currency)
            .to_minor_units()
            .ok_or_else(|| PaymentError::InvalidAmount(order.total.to_string()))?;

        let intent = self
            .stripe
            .create_payment_intent(amount_minor, self.currency, order.id, &order.email)
            .await?;
        OrderRepository::new(self.pool)
            .set_payment_intent(order.id, &intent.id)
            .await?;

        Ok(intent)
    }

    async fn apply_intent(
        &self,
        order: Order,
        intent: &PaymentIntent,
    ) -> Result<Order, CheckoutError> {
        match intent.status {
            PaymentIntentStatus::Succeeded if order.status == OrderStatus::Cancelled => {
                warn!(
                    order_id = %order.id,
                    payment_intent = %intent.id,
                    "Payment succeeded for a cancelled order"
                );
                Ok(order)
            }
            PaymentIntentStatus::Succeeded => {
                let expected = Money::new(order.total, self.currency).to_minor_units();
                if expected != Some(intent.amount) {
                    warn!(
                        order_id = %order.id,
                        expected = ?expected,
                        received = intent.amount,
                        "PaymentIntent amount does not match order total"
                    );
                    return Ok(order);
                }
                self.confirm_payment(order.id).await
            }
            _ if intent.has_failed_attempt() => self.mark_failed(order).await,
            _ => Ok(order),
        }
    }

    async fn mark_failed(&self, order: Order) -> Result<Order, CheckoutError> {
        if order.payment_status != PaymentStatus::Unpaid {
            return Ok(order);
        }
        OrderRepository::new(self.pool)
            .set_payment_status(order.id, PaymentStatus::Failed)
            .await?;
        info!(order_id = %order.id, "Payment failed");
        self.get_order(order.id).await
    }

    async fn order_for_intent(&self, intent: &PaymentIntent) -> Result<Order, CheckoutError> {
        let orders = OrderRepository::new(self.pool);
        if let Some(order) = orders.get_by_payment_intent(&intent.id).await? {
            return Ok(order);
        }

        // The webhook can arrive before the intent id was stored.
        let order_id = intent.order_id().ok_or(CheckoutError::OrderNotFound)?;
        let order = self.get_order(OrderId::new(order_id)).await?;
        if order.payment_intent_id.is_some() {
            return Err(CheckoutError::OrderNotFound);
        }
        orders.set_payment_intent(order.id, &intent.id).await?;
        Ok(order)
    }

    async fn get_order(&self, id: OrderId) -> Result<Order, CheckoutError> {
        OrderRepository::new(self.pool)
            .get_by_id(id)
            .await?
            .ok_or(CheckoutError::OrderNotFound)
    }

    async fn get_order_in(
        &self,
        conn: &mut sqlx::PgConnection,
        id: OrderId,
    ) -> Result<Order, CheckoutError> {
        OrderRepository::get_by_id_with(conn, id)
            .await?
            .ok_or(CheckoutError::OrderNotFound)
    }
}

// =============================================================================
// Cart helpers
// =============================================================================

/// Whether an admin may cancel `order` without a refund.
fn check_cancellable(order: &Order) -> Result<(), CheckoutError> {
    if order.payment_status == PaymentStatus::Paid {
        return Err(CheckoutError::CancelPaidOrder);
    }
    if !order.status.can_transition_to(OrderStatus::Cancelled) {
        return Err(CheckoutError::NotCancellable);
    }
    Ok(())
}

/// Validate cart lines and merge repeated products, keeping first-seen order.
fn merge_lines(items: &[CartLine]) -> Result<Vec<(ProductId, u32)>, CheckoutError> {
    if items.is_empty() {
        return Err(CheckoutError::EmptyCart);
    }

    let mut merged: Vec<(ProductId, u32)> = Vec::with_capacity(items.len());
    for line in items {
        if line.quantity == 0 || line.quantity > MAX_QUANTITY {
            return Err(CheckoutError::InvalidQuantity(line.product_id));
        }
        match merged.iter_mut().find(|(id, _)| *id == line.product_id) {
            Some((_, quantity)) => {
                *quantity += line.quantity;
                if *quantity > MAX_QUANTITY {
                    return Err(CheckoutError::InvalidQuantity(line.product_id));
                }
            }
            None => merged.push((line.product_id, line.quantity)),
        }
    }

    if merged.len() > MAX_LINES {
        return Err(CheckoutError::TooManyLines);
    }
    Ok(merged)
}

/// Price merged cart lines against current product data.
fn price_lines(
    lines: &[(ProductId, u32)],
    products: &HashMap<ProductId, Product>,
) -> Result<Vec<NewOrderItem>, CheckoutError> {
    lines
        .iter()
        .map(|&(product_id, quantity)| {
            let product = products
                .get(&product_id)
                .filter(|p| p.is_active)
                .ok_or(CheckoutError::ProductUnavailable(product_id))?;
            if !product.can_fulfill(quantity) {
                return Err(CheckoutError::InsufficientStock {
                    name: product.name.clone(),
                    available: product.stock.max(0),
                });
            }

            Ok(NewOrderItem {
                product_id,
                product_name: product.name.clone(),
                unit_price: product.price,
                quantity: i32::try_from(quantity)
                    .map_err(|_| CheckoutError::InvalidQuantity(product_id))?,
                line_total: line_total(product.price, quantity),
            })
        })
        .collect()
}

/// Total product weight of the cart in grams. Unknown products weigh nothing.
fn parcel_weight(lines: &[(ProductId, u32)], products: &HashMap<ProductId, Product>) -> u32 {
    lines
        .iter()
        .filter_map(|(id, quantity)| {
            let grams = u32::try_from(products.get(id)?.weight_grams).unwrap_or(0);
            Some(grams.saturating_mul(*quantity))
        })
        .fold(0u32, u32::saturating_add)
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use emporium_core::Slug;

    use super::*;

    fn line(id: i32, quantity: u32) -> CartLine {
        CartLine {
            product_id: ProductId::new(id),
            quantity,
        }
    }

    fn product(id: i32, price: Decimal, stock: i32) -> Product {
        let now = Utc::now();
        Product {
            id: ProductId::new(id),
            category_id: None,
            name: format!("Product {id}"),
            slug: Slug::from_name(&format!("product {id}")).unwrap(),
            description: String::new(),
            price,
            compare_at_price: None,
            stock,
            weight_grams: 250,
            image_urls: Vec::new(),
            is_active: true,
            created_at: now,
            updated_at: now,
        }
    }

    fn order(status: OrderStatus, payment_status: PaymentStatus) -> Order {
        let now = Utc::now();
        Order {
            id: OrderId::new(7),
            user_id: None,
            email: "guest@example.com".to_string(),
            status,
            payment_status,
            payment_intent_id: Some("pi_123".to_string()),
            currency: "USD".to_string(),
            subtotal: Decimal::TEN,
            discount: Decimal::ZERO,
            shipping: Decimal::ZERO,
            total: Decimal::TEN,
            coupon_code: None,
            shipping_address: Address {
                name: "Ada Lovelace".to_string(),
                street1: "1 Main St".to_string(),
                street2: None,
                city: "Springfield".to_string(),
                state: "IL".to_string(),
                postal_code: "62701".to_string(),
                country: "US".to_string(),
                phone: None,
            },
            shipping_method: None,
            carrier: None,
            tracking_number: None,
            notes: None,
            created_at: now,
            updated_at: now,
            paid_at: None,
        }
    }

    fn catalog(products: Vec<Product>) -> HashMap<ProductId, Product> {
        products.into_iter().map(|p| (p.id, p)).collect()
    }

    #[test]
    fn test_merge_lines_combines_duplicates() {
        let merged = merge_lines(&[line(2, 1), line(1, 3), line(2, 4)]).unwrap();
        assert_eq!(merged, vec![(ProductId::new(2), 5), (ProductId::new(1), 3)]);
    }

    #[test]
    fn test_merge_lines_rejects_empty_and_bad_quantities() {
        assert!(matches!(merge_lines(&[]), Err(CheckoutError::EmptyCart)));
        assert!(matches!(
            merge_lines(&[line(1, 0)]),
            Err(CheckoutError::InvalidQuantity(_))
        ));
        assert!(matches!(
            merge_lines(&[line(1, 100)]),
            Err(CheckoutError::InvalidQuantity(_))
        ));
        // 60 + 60 exceeds the per-product limit once merged
        assert!(matches!(
            merge_lines(&[line(1, 60), line(1, 60)]),
            Err(CheckoutError::InvalidQuantity(_))
        ));
    }

    #[test]
    fn test_merge_lines_limits_distinct_products() {
        let items: Vec<_> = (0..=50).map(|id| line(id, 1)).collect();
        assert!(matches!(merge_lines(&items), Err(CheckoutError::TooManyLines)));
    }

    #[test]
    fn test_price_lines_uses_catalog_price() {
        let products = catalog(vec![product(1, Decimal::new(1250, 2), 10)]);
        let items = price_lines(&[(ProductId::new(1), 3)], &products).unwrap();
        assert_eq!(items.len(), 1);
        assert_eq!(items[0].unit_price, Decimal::new(1250, 2));
        assert_eq!(items[0].line_total, Decimal::new(3750, 2));
        assert_eq!(items[0].quantity, 3);
    }

    #[test]
    fn test_price_lines_unknown_or_inactive_product() {
        let mut inactive = product(2, Decimal::ONE, 10);
        inactive.is_active = false;
        let products = catalog(vec![inactive]);

        assert!(matches!(
            price_lines(&[(ProductId::new(1), 1)], &products),
            Err(CheckoutError::ProductUnavailable(_))
        ));
        assert!(matches!(
            price_lines(&[(ProductId::new(2), 1)], &products),
            Err(CheckoutError::ProductUnavailable(_))
        ));
    }

    #[test]
    fn test_price_lines_insufficient_stock() {
        let products = catalog(vec![product(1, Decimal::ONE, 2)]);
        let err = price_lines(&[(ProductId::new(1), 3)], &products).unwrap_err();
        assert!(matches!(
            err,
            CheckoutError::InsufficientStock { available: 2, .. }
        ));
        assert_eq!(err.to_string(), "only 2 of Product 1 left in stock");
    }

    #[test]
    fn test_unpaid_orders_can_be_cancelled() {
        assert!(check_cancellable(&order(OrderStatus::Pending, PaymentStatus::Unpaid)).is_ok());
        assert!(check_cancellable(&order(OrderStatus::Pending, PaymentStatus::Failed)).is_ok());
    }

    #[test]
    fn test_paid_orders_must_be_refunded_not_cancelled() {
        for status in [OrderStatus::Paid, OrderStatus::Processing] {
            assert!(matches!(
                check_cancellable(&order(status, PaymentStatus::Paid)),
                Err(CheckoutError::CancelPaidOrder)
            ));
        }
    }

    #[test]
    fn test_finished_orders_cannot_be_cancelled() {
        for status in [OrderStatus::Shipped, OrderStatus::Cancelled] {
            assert!(matches!(
                check_cancellable(&order(status, PaymentStatus::Unpaid)),
                Err(CheckoutError::NotCancellable)
            ));
        }
    }

    #[test]
    fn test_parcel_weight() {
        let products = catalog(vec![product(1, Decimal::ONE, 5), product(2, Decimal::ONE, 5)]);
        let lines = [
            (ProductId::new(1), 2),
            (ProductId::new(2), 1),
            (ProductId::new(9), 4),
        ];
        assert_eq!(parcel_weight(&lines, &products), 750);
    }

    #[test]
    fn test_checkout_request_defaults() {
        let request: CheckoutRequest = serde_json::from_value(serde_json::json!({
            "items": [{ "product_id": 1, "quantity": 2 }],
            "shipping_address": {
                "name": "Ada", "street1": "1 Main St", "city": "Portland",
                "state": "OR", "postal_code": "97201", "country": "US"
            }
        }))
        .unwrap();
        assert!(request.email.is_none());
        assert!(request.coupon_code.is_none());
        assert!(request.shipping_rate_id.is_none());
        assert_eq!(request.items[0].quantity, 2);
    }
}
