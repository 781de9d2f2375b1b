//! Shipping quotes and order placement.

use axum::{
    Json,
    extract::State,
    http::StatusCode,
    response::IntoResponse,
};
use serde::{Deserialize, Serialize};
use tower_sessions::Session;
use tracing::instrument;

use emporium_core::{OrderId, OrderStatus, OrderTotals, PaymentStatus};

use crate::error::{Result, add_breadcrumb};
use crate::middleware::{OptionalAuth, grant_order};
use crate::models::{Address, OrderItem};
use crate::services::checkout::{CartLine, CheckoutRequest};
use crate::services::shipping::ShippingRate;
use crate::state::AppState;

#[derive(Debug, Deserialize)]
pub struct ShippingQuoteRequest {
    pub address: Address,
    pub items: Vec<CartLine>,
}

#[derive(Debug, Serialize)]
pub struct ShippingQuoteResponse {
    pub rates: Vec<ShippingRate>,
}

/// Response to a placed order.
#[derive(Debug, Serialize)]
pub struct CheckoutResponse {
    pub order_id: OrderId,
    pub reference: String,
    pub status: OrderStatus,
    pub payment_status: PaymentStatus,
    /// For Stripe.js `confirmPayment`; absent when nothing is owed.
    pub client_secret: Option<String>,
    pub publishable_key: Option<String>,
    pub currency: String,
    pub totals: OrderTotals,
    pub items: Vec<OrderItem>,
}

/// Live shipping rates for a cart and destination.
#[instrument(skip_all)]
pub async fn quote_shipping(
    State(state): State<AppState>,
    Json(body): Json<ShippingQuoteRequest>,
) -> Result<Json<ShippingQuoteResponse>> {
    let rates = state
        .checkout()
        .quote_shipping(&body.address, &body.items)
        .await?;
    Ok(Json(ShippingQuoteResponse { rates }))
}

/// Place an order and start its payment.
///
/// Guests may check out; the order id is remembered in the session so the
/// guest can read it back.
#[instrument(skip_all, fields(user_id = ?user.as_ref().map(|u| u.id)))]
pub async fn place_order(
    State(state): State<AppState>,
    OptionalAuth(user): OptionalAuth,
    session: Session,
    Json(body): Json<CheckoutRequest>,
) -> Result<impl IntoResponse> {
    let placed = state
        .checkout()
        .place_order(body, user.as_ref().map(|u| (u.id, &u.email)))
        .await?;

    grant_order(&session, placed.order.id).await?;
    if placed.order.payment_status == PaymentStatus::Paid {
        // Free orders consume stock immediately
        state.catalog().invalidate();
    }

    let order_id = placed.order.id.to_string();
    add_breadcrumb("checkout", "Order placed", Some(&[("order_id", &order_id)]));

    let order = placed.order;
    Ok((
        StatusCode::CREATED,
        Json(CheckoutResponse {
            order_id: order.id,
            reference: order.reference(),
            status: order.status,
            payment_status: order.payment_status,
            client_secret: placed.client_secret,
            publishable_key: state.config().stripe.publishable_key.clone(),
            currency: order.currency,
            totals: OrderTotals {
                subtotal: order.subtotal,
                discount: order.discount,
                shipping: order.shipping,
                total: order.total,
            },
            items: placed.items,
        }),
    ))
}
