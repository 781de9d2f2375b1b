//! Admin order management: listing, fulfillment and refunds.

use axum::{
    Json,
    extract::{Path, Query, State},
};
use serde::Deserialize;
use tracing::{info, instrument, warn};

use emporium_core::{OrderId, OrderStatus};

use crate::db::{OrderFilter, OrderRepository, Page};
use crate::error::{AppError, Result};
use crate::middleware::RequireAdmin;
use crate::models::Order;
use crate::routes::orders::OrderDetail;
use crate::state::AppState;

#[derive(Debug, Default, Deserialize)]
pub struct OrderListQuery {
    pub status: Option<OrderStatus>,
    pub page: Option<u32>,
    pub per_page: Option<u32>,
}

#[derive(Debug, Deserialize)]
pub struct SetStatusRequest {
    pub status: OrderStatus,
}

#[derive(Debug, Deserialize)]
pub struct SetTrackingRequest {
    pub carrier: String,
    pub tracking_number: String,
}

async fn load(state: &AppState, id: OrderId) -> Result<Order> {
    OrderRepository::new(state.pool())
        .get_by_id(id)
        .await?
        .ok_or_else(|| AppError::NotFound("Order".to_string()))
}

fn invalid_transition(from: OrderStatus, to: OrderStatus) -> AppError {
    if from.is_terminal() {
        return AppError::Conflict(format!("Order is {from} and can no longer change"));
    }
    AppError::Conflict(format!("Cannot move an order from {from} to {to}"))
}

pub async fn list(
    RequireAdmin(_admin): RequireAdmin,
    State(state): State<AppState>,
    Query(query): Query<OrderListQuery>,
) -> Result<Json<Vec<Order>>> {
    let orders = OrderRepository::new(state.pool())
        .list(OrderFilter {
            status: query.status,
            page: Page::new(query.page, query.per_page),
        })
        .await?;
    Ok(Json(orders))
}

pub async fn show(
    RequireAdmin(_admin): RequireAdmin,
    State(state): State<AppState>,
    Path(id): Path<OrderId>,
) -> Result<Json<OrderDetail>> {
    let order = load(&state, id).await?;
    let items = OrderRepository::new(state.pool()).get_items(id).await?;
    Ok(Json(OrderDetail {
        reference: order.reference(),
        order,
        items,
    }))
}

/// Move an order along its lifecycle.
///
/// `paid` is reached only through payment and `refunded` only through the
/// refund endpoint. Cancelling also cancels the Stripe payment; paid orders
/// must be refunded instead.
#[instrument(skip(admin, state), fields(admin_id = %admin.id))]
pub async fn set_status(
    RequireAdmin(admin): RequireAdmin,
    State(state): State<AppState>,
    Path(id): Path<OrderId>,
    Json(body): Json<SetStatusRequest>,
) -> Result<Json<Order>> {
    match body.status {
        OrderStatus::Paid => {
            return Err(AppError::BadRequest(
                "Orders are marked paid by the payment processor".to_string(),
            ));
        }
        OrderStatus::Refunded => {
            return Err(AppError::BadRequest(
                "Use the refund endpoint to refund an order".to_string(),
            ));
        }
        OrderStatus::Cancelled => {
            return Ok(Json(state.checkout().cancel(id).await?));
        }
        _ => {}
    }

    let order = load(&state, id).await?;
    if !order.status.can_transition_to(body.status) {
        return Err(invalid_transition(order.status, body.status));
    }

    let updated = OrderRepository::new(state.pool())
        .update_status(id, order.status, body.status)
        .await?
        .ok_or_else(|| AppError::Conflict("Order changed, reload and retry".to_string()))?;

    info!(order_id = %id, from = %order.status, to = %updated.status, "Order status changed");
    Ok(Json(updated))
}

/// Record carrier and tracking number, mark the order shipped and tell the
/// customer.
#[instrument(skip(admin, state, body), fields(admin_id = %admin.id))]
pub async fn set_tracking(
    RequireAdmin(admin): RequireAdmin,
    State(state): State<AppState>,
    Path(id): Path<OrderId>,
    Json(body): Json<SetTrackingRequest>,
) -> Result<Json<Order>> {
    let carrier = body.carrier.trim();
    let tracking_number = body.tracking_number.trim();
    if carrier.is_empty() || tracking_number.is_empty() {
        return Err(AppError::BadRequest(
            "carrier and tracking_number are required".to_string(),
        ));
    }

    let order = load(&state, id).await?;
    if !order.status.can_transition_to(OrderStatus::Shipped) {
        return Err(invalid_transition(order.status, OrderStatus::Shipped));
    }

    let updated = OrderRepository::new(state.pool())
        .set_tracking(id, order.status, carrier, tracking_number)
        .await?
        .ok_or_else(|| AppError::Conflict("Order changed, reload and retry".to_string()))?;

    info!(order_id = %id, carrier = %carrier, "Order shipped");

    if let Some(email) = state.email()
        && let Err(e) = email.send_shipping_notification(&updated).await
    {
        warn!(order_id = %id, error = %e, "Failed to send shipping notification");
    }

    Ok(Json(updated))
}

/// Refund a paid order in full.
#[instrument(skip(admin, state), fields(admin_id = %admin.id))]
pub async fn refund(
    RequireAdmin(admin): RequireAdmin,
    State(state): State<AppState>,
    Path(id): Path<OrderId>,
) -> Result<Json<Order>> {
    let order = state.checkout().refund(id).await?;
    Ok(Json(order))
}
