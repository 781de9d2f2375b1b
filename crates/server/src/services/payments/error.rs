//! Payment processor errors.

use thiserror::Error;

/// Errors that can occur when talking to Stripe.
#[derive(Debug, Error)]
pub enum PaymentError {
    /// HTTP request failed.
    #[error("Stripe request failed: {0}")]
    Request(String),

    /// Failed to parse response.
    #[error("Stripe response error: {0}")]
    Response(String),

    /// Stripe rejected the call.
    #[error("Stripe API error ({status}): {message}")]
    Api {
        /// HTTP status returned by Stripe.
        status: u16,
        /// Message from the error object.
        message: String,
    },

    /// Amount cannot be expressed in minor units.
    #[error("invalid amount: {0}")]
    InvalidAmount(String),

    /// Invalid webhook signature.
    #[error("Invalid Stripe signature: {0}")]
    InvalidSignature(String),

    /// Webhook body is not a valid event.
    #[error("Invalid webhook payload: {0}")]
    InvalidPayload(String),
}
