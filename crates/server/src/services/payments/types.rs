//! Stripe API objects used by the store.

use std::collections::HashMap;

use serde::Deserialize;

/// Lifecycle state of a `PaymentIntent`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PaymentIntentStatus {
    RequiresPaymentMethod,
    RequiresConfirmation,
    RequiresAction,
    Processing,
    RequiresCapture,
    Canceled,
    Succeeded,
    #[serde(other)]
    Unknown,
}

/// Error attached to the last failed payment attempt.
#[derive(Debug, Clone, Deserialize)]
pub struct LastPaymentError {
    #[serde(default)]
    pub code: Option<String>,
    #[serde(default)]
    pub message: Option<String>,
}

/// A Stripe `PaymentIntent`.
#[derive(Debug, Clone, Deserialize)]
pub struct PaymentIntent {
    pub id: String,
    /// Secret the browser needs to confirm the payment.
    #[serde(default)]
    pub client_secret: Option<String>,
    pub status: PaymentIntentStatus,
    /// Amount in minor units.
    pub amount: i64,
    pub currency: String,
    #[serde(default)]
    pub metadata: HashMap<String, String>,
    #[serde(default)]
    pub last_payment_error: Option<LastPaymentError>,
}

impl PaymentIntent {
    /// Order id stored in the intent metadata at creation.
    #[must_use]
    pub fn order_id(&self) -> Option<i32> {
        self.metadata.get("order_id")?.parse().ok()
    }

    /// Whether a payment attempt was made and declined.
    #[must_use]
    pub fn has_failed_attempt(&self) -> bool {
        match self.status {
            PaymentIntentStatus::Canceled => true,
            PaymentIntentStatus::RequiresPaymentMethod => self.last_payment_error.is_some(),
            _ => false,
        }
    }
}

/// A Stripe refund.
#[derive(Debug, Clone, Deserialize)]
pub struct Refund {
    pub id: String,
    pub amount: i64,
    #[serde(default)]
    pub status: Option<String>,
}

/// Error envelope returned by the Stripe API.
#[derive(Debug, Deserialize)]
pub(super) struct ErrorEnvelope {
    pub error: ApiErrorBody,
}

#[derive(Debug, Deserialize)]
pub(super) struct ApiErrorBody {
    #[serde(default)]
    pub message: Option<String>,
    #[serde(default, rename = "type")]
    pub kind: Option<String>,
}

/// Webhook event delivered by Stripe.
#[derive(Debug, Clone, Deserialize)]
pub struct WebhookEvent {
    pub id: String,
    #[serde(rename = "type")]
    pub event_type: String,
    pub data: EventData,
}

/// Payload wrapper of a webhook event.
#[derive(Debug, Clone, Deserialize)]
pub struct EventData {
    pub object: serde_json::Value,
}

/// The parts of a Stripe `Charge` the refund handling reads.
#[derive(Debug, Clone, Deserialize)]
struct Charge {
    #[serde(default)]
    payment_intent: Option<String>,
    #[serde(default)]
    amount: i64,
    #[serde(default)]
    amount_refunded: i64,
    #[serde(default)]
    refunded: bool,
}

impl Charge {
    fn is_fully_refunded(&self) -> bool {
        self.refunded || (self.amount > 0 && self.amount_refunded >= self.amount)
    }
}

/// What the store should do in response to a webhook event.
#[derive(Debug, Clone)]
pub enum WebhookAction {
    /// Payment completed.
    PaymentSucceeded(PaymentIntent),
    /// Payment attempt declined.
    PaymentFailed(PaymentIntent),
    /// A charge for this payment intent was refunded (outside the admin).
    Refunded {
        /// Payment intent the refunded charge belongs to.
        payment_intent_id: String,
    },
    /// Part of a charge was refunded; the order stays paid.
    PartiallyRefunded {
        payment_intent_id: String,
        /// Minor units refunded so far.
        amount_refunded: i64,
    },
    /// Event the store does not act on.
    Ignored,
}

impl WebhookEvent {
    /// Interpret the event.
    ///
    /// # Errors
    ///
    /// Returns `PaymentError::InvalidPayload` if a handled event carries an
    /// object of the wrong shape.
    pub fn action(&self) -> Result<WebhookAction, super::PaymentError> {
        match self.event_type.as_str() {
            "payment_intent.succeeded" => Ok(WebhookAction::PaymentSucceeded(self.intent()?)),
            "payment_intent.payment_failed" => Ok(WebhookAction::PaymentFailed(self.intent()?)),
            "charge.refunded" => {
                let charge: Charge = serde_json::from_value(self.data.object.clone())
                    .map_err(|e| super::PaymentError::InvalidPayload(e.to_string()))?;
                let payment_intent_id = charge.payment_intent.clone().ok_or_else(|| {
                    super::PaymentError::InvalidPayload(
                        "charge without payment_intent".to_string(),
                    )
                })?;
                if charge.is_fully_refunded() {
                    Ok(WebhookAction::Refunded { payment_intent_id })
                } else {
                    Ok(WebhookAction::PartiallyRefunded {
                        payment_intent_id,
                        amount_refunded: charge.amount_refunded,
                    })
                }
            }
            _ => Ok(WebhookAction::Ignored),
        }
    }

    fn intent(&self) -> Result<PaymentIntent, super::PaymentError> {
        serde_json::from_value(self.data.object.clone())
            .map_err(|e| super::PaymentError::InvalidPayload(e.to_string()))
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    fn event(kind: &str, object: serde_json::Value) -> WebhookEvent {
        serde_json::from_value(serde_json::json!({
            "id": "evt_1",
            "type": kind,
            "data": { "object": object }
        }))
        .unwrap()
    }

    #[test]
    fn test_succeeded_event() {
        let e = event(
            "payment_intent.succeeded",
            serde_json::json!({
                "id": "pi_123",
                "status": "succeeded",
                "amount": 4599,
                "currency": "usd",
                "metadata": { "order_id": "42" }
            }),
        );
        let WebhookAction::PaymentSucceeded(intent) = e.action().unwrap() else {
            panic!("expected PaymentSucceeded");
        };
        assert_eq!(intent.id, "pi_123");
        assert_eq!(intent.order_id(), Some(42));
    }

    #[test]
    fn test_unknown_status_is_tolerated() {
        let intent: PaymentIntent = serde_json::from_value(serde_json::json!({
            "id": "pi_1", "status": "brand_new_state", "amount": 1, "currency": "usd"
        }))
        .unwrap();
        assert_eq!(intent.status, PaymentIntentStatus::Unknown);
        assert_eq!(intent.order_id(), None);
    }

    #[test]
    fn test_refund_event_needs_payment_intent() {
        let e = event("charge.refunded", serde_json::json!({ "id": "ch_1" }));
        assert!(e.action().is_err());

        let e = event(
            "charge.refunded",
            serde_json::json!({
                "id": "ch_1",
                "payment_intent": "pi_9",
                "amount": 4599,
                "amount_refunded": 4599,
                "refunded": true
            }),
        );
        assert!(matches!(
            e.action().unwrap(),
            WebhookAction::Refunded { payment_intent_id } if payment_intent_id == "pi_9"
        ));
    }

    #[test]
    fn test_partial_refund_keeps_order_paid() {
        let e = event(
            "charge.refunded",
            serde_json::json!({
                "id": "ch_1",
                "payment_intent": "pi_9",
                "amount": 4599,
                "amount_refunded": 1000,
                "refunded": false
            }),
        );
        assert!(matches!(
            e.action().unwrap(),
            WebhookAction::PartiallyRefunded { amount_refunded: 1000, .. }
        ));
    }

    #[test]
    fn test_other_events_ignored() {
        let e = event("customer.created", serde_json::json!({}));
        assert!(matches!(e.action().unwrap(), WebhookAction::Ignored));
    }

    #[test]
    fn test_failed_attempt_detection() {
        let mut intent: PaymentIntent = serde_json::from_value(serde_json::json!({
            "id": "pi_1", "status": "requires_payment_method", "amount": 1, "currency": "usd"
        }))
        .unwrap();
        assert!(!intent.has_failed_attempt());

        intent.last_payment_error = Some(LastPaymentError {
            code: Some("card_declined".to_string()),
            message: None,
        });
        assert!(intent.has_failed_attempt());
    }
}
