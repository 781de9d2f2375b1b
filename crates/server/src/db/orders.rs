//! Order repository.

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use sqlx::types::Json;
use sqlx::{PgConnection, PgPool};

use emporium_core::{OrderId, OrderItemId, OrderStatus, PaymentStatus, ProductId, UserId};

use super::{Page, RepositoryError};
use crate::models::{Address, NewOrder, Order, OrderItem, OrderStats, StatusCount};

const ORDER_COLUMNS: &str = "id, user_id, email, status, payment_status, payment_intent_id, \
     currency, subtotal, discount, shipping, total, coupon_code, shipping_address, \
     shipping_method, carrier, tracking_number, notes, created_at, updated_at, paid_at";

const ITEM_COLUMNS: &str = "id, order_id, product_id, product_name, unit_price, quantity, line_total";

#[derive(Debug, sqlx::FromRow)]
struct OrderRow {
    id: OrderId,
    user_id: Option<UserId>,
    email: String,
    status: OrderStatus,
    payment_status: PaymentStatus,
    payment_intent_id: Option<String>,
    currency: String,
    subtotal: Decimal,
    discount: Decimal,
    shipping: Decimal,
    total: Decimal,
    coupon_code: Option<String>,
    shipping_address: Json<Address>,
    shipping_method: Option<String>,
    carrier: Option<String>,
    tracking_number: Option<String>,
    notes: Option<String>,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
    paid_at: Option<DateTime<Utc>>,
}

impl From<OrderRow> for Order {
    fn from(row: OrderRow) -> Self {
        Self {
            id: row.id,
            user_id: row.user_id,
            email: row.email,
            status: row.status,
            payment_status: row.payment_status,
            payment_intent_id: row.payment_intent_id,
            currency: row.currency,
            subtotal: row.subtotal,
            discount: row.discount,
            shipping: row.shipping,
            total: row.total,
            coupon_code: row.coupon_code,
            shipping_address: row.shipping_address.0,
            shipping_method: row.shipping_method,
            carrier: row.carrier,
            tracking_number: row.tracking_number,
            notes: row.notes,
            created_at: row.created_at,
            updated_at: row.updated_at,
            paid_at: row.paid_at,
        }
    }
}

#[derive(Debug, sqlx::FromRow)]
struct OrderItemRow {
    id: OrderItemId,
    order_id: OrderId,
    product_id: Option<ProductId>,
    product_name: String,
    unit_price: Decimal,
    quantity: i32,
    line_total: Decimal,
}

impl From<OrderItemRow> for OrderItem {
    fn from(row: OrderItemRow) -> Self {
        Self {
            id: row.id,
            order_id: row.order_id,
            product_id: row.product_id,
            product_name: row.product_name,
            unit_price: row.unit_price,
            quantity: row.quantity,
            line_total: row.line_total,
        }
    }
}

/// Admin order listing filter.
#[derive(Debug, Clone, Copy, Default)]
pub struct OrderFilter {
    pub status: Option<OrderStatus>,
    pub page: Page,
}

/// Repository for order database operations.
pub struct OrderRepository<'a> {
    pool: &'a PgPool,
}

impl<'a> OrderRepository<'a> {
    #[must_use]
    pub const fn new(pool: &'a PgPool) -> Self {
        Self { pool }
    }

    /// Insert an order and its items inside a transaction.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if an insert fails.
    pub async fn create_with_items(
        conn: &mut PgConnection,
        order: &NewOrder,
    ) -> Result<(Order, Vec<OrderItem>), RepositoryError> {
        let row = sqlx::query_as::<_, OrderRow>(&format!(
            "INSERT INTO orders (user_id, email, currency, subtotal, discount, shipping, total,
                 coupon_code, shipping_address, shipping_method, notes)
             VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11)
             RETURNING {ORDER_COLUMNS}"
        ))
        .bind(order.user_id)
        .bind(&order.email)
        .bind(&order.currency)
        .bind(order.totals.subtotal)
        .bind(order.totals.discount)
        .bind(order.totals.shipping)
        .bind(order.totals.total)
        .bind(order.coupon_code.as_deref())
        .bind(Json(&order.shipping_address))
        .bind(order.shipping_method.as_deref())
        .bind(order.notes.as_deref())
        .fetch_one(&mut *conn)
        .await?;

        let created: Order = row.into();

        let mut items = Vec::with_capacity(order.items.len());
        for item in &order.items {
            let row = sqlx::query_as::<_, OrderItemRow>(&format!(
                "INSERT INTO order_items (order_id, product_id, product_name, unit_price,
                     quantity, line_total)
                 VALUES ($1, $2, $3, $4, $5, $6)
                 RETURNING {ITEM_COLUMNS}"
            ))
            .bind(created.id)
            .bind(item.product_id)
            .bind(&item.product_name)
            .bind(item.unit_price)
            .bind(item.quantity)
            .bind(item.line_total)
            .fetch_one(&mut *conn)
            .await?;
            items.push(row.into());
        }

        Ok((created, items))
    }

    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    pub async fn get_by_id(&self, id: OrderId) -> Result<Option<Order>, RepositoryError> {
        Self::get_by_id_with(self.pool, id).await
    }

    /// [`Self::get_by_id`] on an explicit executor (e.g. a transaction).
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    pub async fn get_by_id_with<'e, E>(
        executor: E,
        id: OrderId,
    ) -> Result<Option<Order>, RepositoryError>
    where
        E: sqlx::Executor<'e, Database = sqlx::Postgres>,
    {
        let row = sqlx::query_as::<_, OrderRow>(&format!(
            "SELECT {ORDER_COLUMNS} FROM orders WHERE id = $1"
        ))
        .bind(id)
        .fetch_optional(executor)
        .await?;

        Ok(row.map(Order::from))
    }

    /// Items of an order, in insertion order.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    pub async fn get_items(&self, order_id: OrderId) -> Result<Vec<OrderItem>, RepositoryError> {
        Self::get_items_with(self.pool, order_id).await
    }

    /// [`Self::get_items`] on an explicit executor (e.g. a transaction).
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    pub async fn get_items_with<'e, E>(
        executor: E,
        order_id: OrderId,
    ) -> Result<Vec<OrderItem>, RepositoryError>
    where
        E: sqlx::Executor<'e, Database = sqlx::Postgres>,
    {
        let rows = sqlx::query_as::<_, OrderItemRow>(&format!(
            "SELECT {ITEM_COLUMNS} FROM order_items WHERE order_id = $1 ORDER BY id"
        ))
        .bind(order_id)
        .fetch_all(executor)
        .await?;

        Ok(rows.into_iter().map(OrderItem::from).collect())
    }

    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    pub async fn get_by_payment_intent(
        &self,
        payment_intent_id: &str,
    ) -> Result<Option<Order>, RepositoryError> {
        let row = sqlx::query_as::<_, OrderRow>(&format!(
            "SELECT {ORDER_COLUMNS} FROM orders WHERE payment_intent_id = $1"
        ))
        .bind(payment_intent_id)
        .fetch_optional(self.pool)
        .await?;

        Ok(row.map(Order::from))
    }

    /// Orders placed by a user, newest first.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    pub async fn list_for_user(
        &self,
        user_id: UserId,
        page: Page,
    ) -> Result<Vec<Order>, RepositoryError> {
        let rows = sqlx::query_as::<_, OrderRow>(&format!(
            "SELECT {ORDER_COLUMNS} FROM orders WHERE user_id = $1
             ORDER BY created_at DESC, id DESC LIMIT $2 OFFSET $3"
        ))
        .bind(user_id)
        .bind(page.limit)
        .bind(page.offset)
        .fetch_all(self.pool)
        .await?;

        Ok(rows.into_iter().map(Order::from).collect())
    }

    /// All orders, optionally filtered by status, newest first.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    pub async fn list(&self, filter: OrderFilter) -> Result<Vec<Order>, RepositoryError> {
        let rows = sqlx::query_as::<_, OrderRow>(&format!(
            "SELECT {ORDER_COLUMNS} FROM orders
             WHERE ($1::order_status IS NULL OR status = $1)
             ORDER BY created_at DESC, id DESC LIMIT $2 OFFSET $3"
        ))
        .bind(filter.status)
        .bind(filter.page.limit)
        .bind(filter.page.offset)
        .fetch_all(self.pool)
        .await?;

        Ok(rows.into_iter().map(Order::from).collect())
    }

    /// Attach the processor's payment intent to an order.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::NotFound` if the order doesn't exist.
    pub async fn set_payment_intent(
        &self,
        id: OrderId,
        payment_intent_id: &str,
    ) -> Result<(), RepositoryError> {
        let result = sqlx::query("UPDATE orders SET payment_intent_id = $1 WHERE id = $2")
            .bind(payment_intent_id)
            .bind(id)
            .execute(self.pool)
            .await?;

        if result.rows_affected() == 0 {
            return Err(RepositoryError::NotFound);
        }

        Ok(())
    }

    /// Record a successful payment inside a transaction.
    ///
    /// Only an order that has not been paid yet (unpaid, or failed on an
    /// earlier attempt) changes; a pending order also moves to `Paid`.
    /// Returns whether this call made the change.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the update fails.
    pub async fn mark_paid(conn: &mut PgConnection, id: OrderId) -> Result<bool, RepositoryError> {
        let result = sqlx::query(
            "UPDATE orders
             SET payment_status = 'paid',
                 status = CASE WHEN status = 'pending' THEN 'paid'::order_status ELSE status END,
                 paid_at = NOW()
             WHERE id = $1
               AND payment_status IN ('unpaid', 'failed')
               AND status <> 'cancelled'",
        )
        .bind(id)
        .execute(conn)
        .await?;

        Ok(result.rows_affected() == 1)
    }

    /// # Errors
    ///
    /// Returns `RepositoryError::NotFound` if the order doesn't exist.
    pub async fn set_payment_status(
        &self,
        id: OrderId,
        status: PaymentStatus,
    ) -> Result<(), RepositoryError> {
        let result = sqlx::query("UPDATE orders SET payment_status = $1 WHERE id = $2")
            .bind(status)
            .bind(id)
            .execute(self.pool)
            .await?;

        if result.rows_affected() == 0 {
            return Err(RepositoryError::NotFound);
        }

        Ok(())
    }

    /// Move an order from `from` to `to`.
    ///
    /// Returns `None` if the order is no longer in `from` (changed concurrently).
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the update fails.
    pub async fn update_status(
        &self,
        id: OrderId,
        from: OrderStatus,
        to: OrderStatus,
    ) -> Result<Option<Order>, RepositoryError> {
        let row = sqlx::query_as::<_, OrderRow>(&format!(
            "UPDATE orders SET status = $1 WHERE id = $2 AND status = $3
             RETURNING {ORDER_COLUMNS}"
        ))
        .bind(to)
        .bind(id)
        .bind(from)
        .fetch_optional(self.pool)
        .await?;

        Ok(row.map(Order::from))
    }

    /// Record carrier and tracking number and move the order to `Shipped`.
    ///
    /// Returns `None` if the order is no longer in `from`.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the update fails.
    pub async fn set_tracking(
        &self,
        id: OrderId,
        from: OrderStatus,
        carrier: &str,
        tracking_number: &str,
    ) -> Result<Option<Order>, RepositoryError> {
        let row = sqlx::query_as::<_, OrderRow>(&format!(
            "UPDATE orders SET carrier = $1, tracking_number = $2, status = 'shipped'
             WHERE id = $3 AND status = $4
             RETURNING {ORDER_COLUMNS}"
        ))
        .bind(carrier)
        .bind(tracking_number)
        .bind(id)
        .bind(from)
        .fetch_optional(self.pool)
        .await?;

        Ok(row.map(Order::from))
    }

    /// Mark an order refunded (both fulfillment and payment status).
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::NotFound` if the order doesn't exist.
    pub async fn mark_refunded(&self, id: OrderId) -> Result<Order, RepositoryError> {
        let row = sqlx::query_as::<_, OrderRow>(&format!(
            "UPDATE orders SET status = 'refunded', payment_status = 'refunded' WHERE id = $1
             RETURNING {ORDER_COLUMNS}"
        ))
        .bind(id)
        .fetch_optional(self.pool)
        .await?
        .ok_or(RepositoryError::NotFound)?;

        Ok(row.into())
    }

    /// Dashboard statistics.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if a query fails.
    pub async fn stats(&self) -> Result<OrderStats, RepositoryError> {
        let by_status: Vec<(OrderStatus, i64)> = sqlx::query_as(
            "SELECT status, COUNT(*) FROM orders GROUP BY status ORDER BY status",
        )
        .fetch_all(self.pool)
        .await?;

        let (revenue,): (Option<Decimal>,) = sqlx::query_as(
            "SELECT SUM(total) FROM orders WHERE payment_status = 'paid'",
        )
        .fetch_one(self.pool)
        .await?;

        let (product_count, active_product_count): (i64, i64) = sqlx::query_as(
            "SELECT COUNT(*), COUNT(*) FILTER (WHERE is_active) FROM products",
        )
        .fetch_one(self.pool)
        .await?;

        let total_orders = by_status.iter().map(|(_, count)| count).sum();

        Ok(OrderStats {
            orders_by_status: by_status
                .into_iter()
                .map(|(status, count)| StatusCount { status, count })
                .collect(),
            total_orders,
            revenue: revenue.unwrap_or_default(),
            product_count,
            active_product_count,
        })
    }
}
