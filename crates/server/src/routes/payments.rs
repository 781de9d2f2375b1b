//! Stripe webhook receiver.

use axum::{
    extract::State,
    http::{HeaderMap, StatusCode},
};
use chrono::Utc;
use tracing::{debug, info, instrument, warn};

use crate::error::{AppError, Result};
use crate::services::checkout::CheckoutError;
use crate::services::payments::WebhookAction;
use crate::state::AppState;

/// Handle a Stripe webhook.
///
/// Signature failures answer 400. Events for unknown orders answer 200 so
/// Stripe stops retrying; other failures answer 5xx so it retries.
#[instrument(skip(state, headers, body))]
pub async fn webhook(
    State(state): State<AppState>,
    headers: HeaderMap,
    body: String,
) -> Result<StatusCode> {
    let signature = headers
        .get("Stripe-Signature")
        .and_then(|v| v.to_str().ok())
        .ok_or_else(|| AppError::BadRequest("Missing Stripe-Signature header".into()))?;

    let event = state
        .stripe()
        .verify_webhook(&body, signature, Utc::now().timestamp())
        .map_err(|e| {
            warn!(error = %e, "Rejected Stripe webhook");
            AppError::BadRequest("Invalid webhook signature".into())
        })?;

    debug!(event_id = %event.id, event_type = %event.event_type, "Stripe webhook received");

    let checkout = state.checkout();
    let action = event
        .action()
        .map_err(|e| AppError::BadRequest(e.to_string()))?;
    let result = match action {
        WebhookAction::PaymentSucceeded(intent) => {
            let order = checkout.payment_succeeded(&intent).await;
            if order.is_ok() {
                state.catalog().invalidate();
            }
            order
        }
        WebhookAction::PaymentFailed(intent) => checkout.payment_failed(&intent).await,
        WebhookAction::Refunded { payment_intent_id } => {
            checkout.payment_refunded(&payment_intent_id).await
        }
        WebhookAction::PartiallyRefunded {
            payment_intent_id,
            amount_refunded,
        } => {
            info!(
                event_id = %event.id,
                payment_intent = %payment_intent_id,
                amount_refunded,
                "Partial refund recorded by Stripe; order left as is"
            );
            return Ok(StatusCode::OK);
        }
        WebhookAction::Ignored => return Ok(StatusCode::OK),
    };

    match result {
        Ok(order) => {
            info!(
                event_id = %event.id,
                order_id = %order.id,
                payment_status = ?order.payment_status,
                "Stripe webhook applied"
            );
            Ok(StatusCode::OK)
        }
        Err(CheckoutError::OrderNotFound) => {
            warn!(event_id = %event.id, "Stripe webhook for unknown order");
            Ok(StatusCode::OK)
        }
        Err(e) => Err(e.into()),
    }
}
