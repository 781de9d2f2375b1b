//! Customer order views.

use axum::{
    Json,
    extract::{Path, Query, State},
};
use serde::{Deserialize, Serialize};
use tower_sessions::Session;
use tracing::instrument;

use emporium_core::{OrderId, OrderStatus, PaymentStatus};

use crate::db::{OrderRepository, Page};
use crate::error::{AppError, Result};
use crate::middleware::{OptionalAuth, RequireAuth, placed_orders};
use crate::models::{CurrentUser, Order, OrderItem};
use crate::state::AppState;

#[derive(Debug, Default, Deserialize)]
pub struct PageQuery {
    pub page: Option<u32>,
    pub per_page: Option<u32>,
}

/// An order with its lines.
#[derive(Debug, Serialize)]
pub struct OrderDetail {
    #[serde(flatten)]
    pub order: Order,
    pub reference: String,
    pub items: Vec<OrderItem>,
}

#[derive(Debug, Serialize)]
pub struct PaymentStatusResponse {
    pub order_id: OrderId,
    pub status: OrderStatus,
    pub payment_status: PaymentStatus,
}

/// Load an order the requester may read: its owner, an admin, or the
/// session that placed it as a guest.
///
/// Orders the requester may not see are reported as missing.
async fn readable_order(
    state: &AppState,
    user: Option<&CurrentUser>,
    session: &Session,
    id: OrderId,
) -> Result<Order> {
    let order = OrderRepository::new(state.pool())
        .get_by_id(id)
        .await?
        .ok_or_else(|| AppError::NotFound("Order".to_string()))?;

    let allowed = match user {
        Some(user) if user.is_admin() || order.is_owned_by(user.id) => true,
        _ => placed_orders(session).await.contains(id),
    };

    if allowed {
        Ok(order)
    } else {
        Err(AppError::NotFound("Order".to_string()))
    }
}

/// Orders of the logged-in user, newest first.
pub async fn list(
    State(state): State<AppState>,
    RequireAuth(user): RequireAuth,
    Query(query): Query<PageQuery>,
) -> Result<Json<Vec<Order>>> {
    let orders = OrderRepository::new(state.pool())
        .list_for_user(user.id, Page::new(query.page, query.per_page))
        .await?;
    Ok(Json(orders))
}

/// An order and its items.
pub async fn detail(
    State(state): State<AppState>,
    OptionalAuth(user): OptionalAuth,
    session: Session,
    Path(id): Path<OrderId>,
) -> Result<Json<OrderDetail>> {
    let order = readable_order(&state, user.as_ref(), &session, id).await?;
    let items = OrderRepository::new(state.pool()).get_items(id).await?;

    Ok(Json(OrderDetail {
        reference: order.reference(),
        order,
        items,
    }))
}

/// Reconcile an unpaid order with Stripe and report its status.
///
/// The browser polls this after `confirmPayment` in case the webhook is slow.
#[instrument(skip(state, user, session))]
pub async fn payment_status(
    State(state): State<AppState>,
    OptionalAuth(user): OptionalAuth,
    session: Session,
    Path(id): Path<OrderId>,
) -> Result<Json<PaymentStatusResponse>> {
    let order = readable_order(&state, user.as_ref(), &session, id).await?;
    let was_paid = order.payment_status == PaymentStatus::Paid;

    let order = state.checkout().reconcile(order).await?;
    if !was_paid && order.payment_status == PaymentStatus::Paid {
        state.catalog().invalidate();
    }

    Ok(Json(PaymentStatusResponse {
        order_id: order.id,
        status: order.status,
        payment_status: order.payment_status,
    }))
}
