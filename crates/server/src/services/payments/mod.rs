//! Stripe payment processing.
//!
//! Creates and inspects `PaymentIntent`s, issues refunds, and verifies
//! webhook deliveries.

mod error;
mod types;

pub use error::PaymentError;
pub use types::{
    EventData, LastPaymentError, PaymentIntent, PaymentIntentStatus, Refund, WebhookAction,
    WebhookEvent,
};

use hmac::{Hmac, Mac};
use reqwest::{Client, Response};
use secrecy::{ExposeSecret, SecretString};
use serde::de::DeserializeOwned;
use sha2::Sha256;
use tracing::{debug, error, instrument};

use emporium_core::{CurrencyCode, OrderId};

use crate::config::StripeConfig;

/// Stripe API base URL.
const STRIPE_API_BASE: &str = "https://api.stripe.com/v1";

/// Maximum age of a webhook delivery, in seconds.
pub const WEBHOOK_TOLERANCE_SECS: u64 = 300;

/// Stripe API client.
#[derive(Clone)]
pub struct StripeClient {
    client: Client,
    secret_key: SecretString,
    webhook_secret: SecretString,
}

impl std::fmt::Debug for StripeClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("StripeClient")
            .field("secret_key", &"[REDACTED]")
            .field("webhook_secret", &"[REDACTED]")
            .finish_non_exhaustive()
    }
}

impl StripeClient {
    /// Create a new Stripe client.
    #[must_use]
    pub fn new(config: &StripeConfig) -> Self {
        Self {
            client: Client::new(),
            secret_key: config.secret_key.clone(),
            webhook_secret: config.webhook_secret.clone(),
        }
    }

    /// Create a `PaymentIntent` for an order.
    ///
    /// The order id is used as idempotency key so that retrying checkout for
    /// the same order never creates a second intent.
    ///
    /// # Errors
    ///
    /// Returns error if the API request fails or Stripe rejects it.
    #[instrument(skip(self, receipt_email), fields(order_id = %order_id))]
    pub async fn create_payment_intent(
        &self,
        amount_minor: i64,
        currency: CurrencyCode,
        order_id: OrderId,
        receipt_email: &str,
    ) -> Result<PaymentIntent, PaymentError> {
        if amount_minor <= 0 {
            return Err(PaymentError::InvalidAmount(format!(
                "amount must be positive (got {amount_minor})"
            )));
        }

        let params = [
            ("amount", amount_minor.to_string()),
            ("currency", currency.lowercase_code().to_string()),
            ("receipt_email", receipt_email.to_string()),
            ("metadata[order_id]", order_id.to_string()),
            ("automatic_payment_methods[enabled]", "true".to_string()),
        ];

        let response = self
            .client
            .post(format!("{STRIPE_API_BASE}/payment_intents"))
            .bearer_auth(self.secret_key.expose_secret())
            .header("Idempotency-Key", format!("order-{order_id}-payment-intent"))
            .form(&params)
            .send()
            .await
            .map_err(|e| PaymentError::Request(e.to_string()))?;

        let intent: PaymentIntent = parse_response(response).await?;
        debug!(payment_intent = %intent.id, "PaymentIntent created");
        Ok(intent)
    }

    /// Fetch the current state of a `PaymentIntent`.
    ///
    /// # Errors
    ///
    /// Returns error if the API request fails or Stripe rejects it.
    #[instrument(skip(self))]
    pub async fn retrieve_payment_intent(&self, id: &str) -> Result<PaymentIntent, PaymentError> {
        let response = self
            .client
            .get(format!(
                "{STRIPE_API_BASE}/payment_intents/{}",
                urlencoding::encode(id)
            ))
            .bearer_auth(self.secret_key.expose_secret())
            .send()
            .await
            .map_err(|e| PaymentError::Request(e.to_string()))?;

        parse_response(response).await
    }

    /// Cancel a `PaymentIntent` so it can no longer be confirmed.
    ///
    /// # Errors
    ///
    /// Returns error if the API request fails or Stripe rejects it (for
    /// example because the intent already succeeded).
    #[instrument(skip(self))]
    pub async fn cancel_payment_intent(&self, id: &str) -> Result<PaymentIntent, PaymentError> {
        let response = self
            .client
            .post(format!(
                "{STRIPE_API_BASE}/payment_intents/{}/cancel",
                urlencoding::encode(id)
            ))
            .bearer_auth(self.secret_key.expose_secret())
            .form(&[("cancellation_reason", "abandoned")])
            .send()
            .await
            .map_err(|e| PaymentError::Request(e.to_string()))?;

        let intent: PaymentIntent = parse_response(response).await?;
        debug!(payment_intent = %intent.id, "PaymentIntent canceled");
        Ok(intent)
    }

    /// Refund the full amount captured by a `PaymentIntent`.
    ///
    /// # Errors
    ///
    /// Returns error if the API request fails or Stripe rejects it.
    #[instrument(skip(self))]
    pub async fn create_refund(&self, payment_intent_id: &str) -> Result<Refund, PaymentError> {
        let response = self
            .client
            .post(format!("{STRIPE_API_BASE}/refunds"))
            .bearer_auth(self.secret_key.expose_secret())
            .header(
                "Idempotency-Key",
                format!("refund-{payment_intent_id}"),
            )
            .form(&[("payment_intent", payment_intent_id)])
            .send()
            .await
            .map_err(|e| PaymentError::Request(e.to_string()))?;

        let refund: Refund = parse_response(response).await?;
        debug!(refund = %refund.id, amount = refund.amount, "Refund created");
        Ok(refund)
    }

    /// Verify a webhook delivery and parse its event.
    ///
    /// `signature_header` is the raw `Stripe-Signature` header
    /// (`t=<unix>,v1=<hex>[,v1=<hex>...]`); `now` is the current unix time.
    ///
    /// # Errors
    ///
    /// Returns `PaymentError::InvalidSignature` if the header is malformed,
    /// too old, or no `v1` signature matches, and
    /// `PaymentError::InvalidPayload` if the body is not an event.
    pub fn verify_webhook(
        &self,
        payload: &str,
        signature_header: &str,
        now: i64,
    ) -> Result<WebhookEvent, PaymentError> {
        verify_signature(
            self.webhook_secret.expose_secret(),
            payload,
            signature_header,
            now,
        )?;

        serde_json::from_str(payload).map_err(|e| PaymentError::InvalidPayload(e.to_string()))
    }
}

/// Decode a successful response or turn Stripe's error envelope into an error.
async fn parse_response<T: DeserializeOwned>(response: Response) -> Result<T, PaymentError> {
    let status = response.status();
    let body = response
        .text()
        .await
        .map_err(|e| PaymentError::Response(e.to_string()))?;

    if !status.is_success() {
        let message = serde_json::from_str::<types::ErrorEnvelope>(&body)
            .ok()
            .and_then(|env| {
                env.error
                    .message
                    .or(env.error.kind)
            })
            .unwrap_or_else(|| "Unknown error".to_string());
        error!(status = %status, message = %message, "Stripe API error");
        return Err(PaymentError::Api {
            status: status.as_u16(),
            message,
        });
    }

    serde_json::from_str(&body).map_err(|e| PaymentError::Response(e.to_string()))
}

/// Check a `Stripe-Signature` header against the payload.
fn verify_signature(
    secret: &str,
    payload: &str,
    header: &str,
    now: i64,
) -> Result<(), PaymentError> {
    let mut timestamp = None;
    let mut signatures = Vec::new();

    for part in header.split(',') {
        match part.trim().split_once('=') {
            Some(("t", value)) => timestamp = Some(value),
            Some(("v1", value)) => signatures.push(value),
            _ => {}
        }
    }

    let timestamp = timestamp
        .ok_or_else(|| PaymentError::InvalidSignature("Missing timestamp".to_string()))?;
    if signatures.is_empty() {
        return Err(PaymentError::InvalidSignature(
            "No v1 signature".to_string(),
        ));
    }

    let ts: i64 = timestamp
        .parse()
        .map_err(|_| PaymentError::InvalidSignature("Invalid timestamp".to_string()))?;
    let within_tolerance = now
        .checked_sub(ts)
        .map(i64::unsigned_abs)
        .is_some_and(|skew| skew <= WEBHOOK_TOLERANCE_SECS);
    if !within_tolerance {
        return Err(PaymentError::InvalidSignature(
            "Timestamp outside tolerance".to_string(),
        ));
    }

    let expected = sign_payload(secret, timestamp, payload)?;
    if !signatures
        .iter()
        .any(|candidate| constant_time_compare(&expected, candidate))
    {
        return Err(PaymentError::InvalidSignature(
            "Signature mismatch".to_string(),
        ));
    }

    debug!("Stripe signature verified");
    Ok(())
}

/// Hex HMAC-SHA256 of `"{timestamp}.{payload}"`.
fn sign_payload(secret: &str, timestamp: &str, payload: &str) -> Result<String, PaymentError> {
    let mut mac = Hmac::<Sha256>::new_from_slice(secret.as_bytes())
        .map_err(|e| PaymentError::InvalidSignature(e.to_string()))?;
    mac.update(timestamp.as_bytes());
    mac.update(b".");
    mac.update(payload.as_bytes());
    Ok(hex::encode(mac.finalize().into_bytes()))
}

/// Constant-time string comparison to prevent timing attacks.
pub(crate) fn constant_time_compare(a: &str, b: &str) -> bool {
    if a.len() != b.len() {
        return false;
    }

    let mut result: u8 = 0;
    for (x, y) in a.bytes().zip(b.bytes()) {
        result |= x ^ y;
    }

    result == 0
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    const SECRET: &str = "whsec_Tq8vN3kLw2Zp7Rx4";
    const NOW: i64 = 1_767_225_600;
    const PAYLOAD: &str = r#"{"id":"evt_1","type":"customer.created","data":{"object":{}}}"#;

    fn client() -> StripeClient {
        StripeClient::new(&StripeConfig {
            secret_key: SecretString::from("sk_test_Xk29dLq0"),
            webhook_secret: SecretString::from(SECRET),
            publishable_key: None,
        })
    }

    fn header(ts: i64, payload: &str) -> String {
        let sig = sign_payload(SECRET, &ts.to_string(), payload).unwrap();
        format!("t={ts},v1={sig}")
    }

    #[test]
    fn test_constant_time_compare() {
        assert!(constant_time_compare("abc", "abc"));
        assert!(!constant_time_compare("abc", "abd"));
        assert!(!constant_time_compare("abc", "abcd"));
    }

    #[test]
    fn test_verify_webhook_valid() {
        let event = client()
            .verify_webhook(PAYLOAD, &header(NOW, PAYLOAD), NOW)
            .unwrap();
        assert_eq!(event.id, "evt_1");
        assert_eq!(event.event_type, "customer.created");
    }

    #[test]
    fn test_verify_webhook_accepts_any_matching_v1() {
        let good = header(NOW, PAYLOAD);
        let with_rotated = format!("{good},v1=deadbeef,v0=ignored");
        assert!(client().verify_webhook(PAYLOAD, &with_rotated, NOW).is_ok());
    }

    #[test]
    fn test_verify_webhook_tampered_payload() {
        let header = header(NOW, PAYLOAD);
        let tampered = PAYLOAD.replace("evt_1", "evt_2");
        assert!(matches!(
            client().verify_webhook(&tampered, &header, NOW),
            Err(PaymentError::InvalidSignature(_))
        ));
    }

    #[test]
    fn test_verify_webhook_outside_tolerance() {
        let header = header(NOW - 301, PAYLOAD);
        assert!(matches!(
            client().verify_webhook(PAYLOAD, &header, NOW),
            Err(PaymentError::InvalidSignature(_))
        ));

        let header = self::header(NOW - 300, PAYLOAD);
        assert!(client().verify_webhook(PAYLOAD, &header, NOW).is_ok());
    }

    #[test]
    fn test_verify_webhook_malformed_header() {
        for header in ["", "v1=abc", "t=123", "t=abc,v1=00"] {
            assert!(
                client().verify_webhook(PAYLOAD, header, NOW).is_err(),
                "{header}"
            );
        }
    }

    #[test]
    fn test_verify_webhook_extreme_timestamps() {
        for ts in [i64::MIN, i64::MAX, -1] {
            let header = format!("t={ts},v1=00");
            assert!(matches!(
                verify_signature(SECRET, PAYLOAD, &header, NOW),
                Err(PaymentError::InvalidSignature(_))
            ));
        }
        assert!(verify_signature(SECRET, PAYLOAD, &header(NOW, PAYLOAD), i64::MIN).is_err());
    }

    #[test]
    fn test_verify_webhook_bad_json() {
        let payload = "not json";
        assert!(matches!(
            client().verify_webhook(payload, &header(NOW, payload), NOW),
            Err(PaymentError::InvalidPayload(_))
        ));
    }

    #[test]
    fn test_debug_redacts_keys() {
        let debug = format!("{:?}", client());
        assert!(!debug.contains("sk_test_Xk29dLq0"));
        assert!(!debug.contains(SECRET));
    }
}
