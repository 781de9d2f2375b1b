//! Pusher Channels client for realtime chat events.
//!
//! Events are published through the Pusher HTTP API; browsers subscribe to
//! private channels after [`PusherClient::authorize_channel`] signs their
//! subscription.

use std::time::{SystemTime, UNIX_EPOCH};

use hmac::{Hmac, Mac};
use md5::{Digest, Md5};
use reqwest::Client;
use secrecy::{ExposeSecret, SecretString};
use serde::Serialize;
use sha2::Sha256;
use thiserror::Error;
use tracing::{debug, instrument, warn};

use crate::config::PusherConfig;

/// Channel agents subscribe to for new conversations and messages.
pub const ADMIN_CHANNEL: &str = "private-admin-chat";

/// Event names published on chat channels.
pub mod events {
    pub const CONVERSATION_CREATED: &str = "conversation.created";
    pub const MESSAGE_CREATED: &str = "message.created";
    pub const CONVERSATION_CLOSED: &str = "conversation.closed";
}

/// Pusher rejects requests naming more channels than this.
const MAX_CHANNELS: usize = 100;

/// Pusher rejects event data larger than this many bytes.
const MAX_EVENT_BYTES: usize = 10 * 1024;

/// Errors that can occur when publishing realtime events.
#[derive(Debug, Error)]
pub enum RealtimeError {
    /// HTTP request failed.
    #[error("Pusher request failed: {0}")]
    Request(String),

    /// Pusher returned a non-success status.
    #[error("Pusher API error ({status}): {body}")]
    Api { status: u16, body: String },

    /// Event cannot be published as given.
    #[error("invalid event: {0}")]
    InvalidEvent(String),

    /// Socket id or channel name is not acceptable for authorization.
    #[error("invalid subscription: {0}")]
    InvalidSubscription(String),
}

/// Signature returned to the Pusher JS client for a private channel.
#[derive(Debug, Clone, Serialize)]
pub struct ChannelAuth {
    pub auth: String,
}

#[derive(Serialize)]
struct TriggerBody<'a> {
    name: &'a str,
    channels: &'a [String],
    /// JSON-encoded event payload.
    data: String,
}

/// Pusher HTTP API client.
#[derive(Clone)]
pub struct PusherClient {
    client: Client,
    app_id: String,
    key: String,
    secret: SecretString,
    host: String,
}

impl std::fmt::Debug for PusherClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PusherClient")
            .field("app_id", &self.app_id)
            .field("key", &self.key)
            .field("secret", &"[REDACTED]")
            .field("host", &self.host)
            .finish_non_exhaustive()
    }
}

impl PusherClient {
    /// Create a new Pusher client.
    #[must_use]
    pub fn new(config: &PusherConfig) -> Self {
        Self {
            client: Client::new(),
            app_id: config.app_id.clone(),
            key: config.key.clone(),
            secret: config.secret.clone(),
            host: format!("api-{}.pusher.com", config.cluster),
        }
    }

    /// Public application key (the browser needs it to connect).
    #[must_use]
    pub fn key(&self) -> &str {
        &self.key
    }

    /// Publish `event` with `data` on each of `channels`.
    ///
    /// # Errors
    ///
    /// Returns error if the event is too large, the request fails, or Pusher
    /// answers with a non-success status.
    #[instrument(skip(self, data), fields(event = %event))]
    pub async fn trigger<T: Serialize + Sync>(
        &self,
        channels: &[String],
        event: &str,
        data: &T,
    ) -> Result<(), RealtimeError> {
        if channels.is_empty() || channels.len() > MAX_CHANNELS {
            return Err(RealtimeError::InvalidEvent(format!(
                "between 1 and {MAX_CHANNELS} channels required"
            )));
        }

        let data =
            serde_json::to_string(data).map_err(|e| RealtimeError::InvalidEvent(e.to_string()))?;
        if data.len() > MAX_EVENT_BYTES {
            return Err(RealtimeError::InvalidEvent(format!(
                "event data exceeds {MAX_EVENT_BYTES} bytes"
            )));
        }

        let body = serde_json::to_string(&TriggerBody {
            name: event,
            channels,
            data,
        })
        .map_err(|e| RealtimeError::InvalidEvent(e.to_string()))?;

        let path = format!("/apps/{}/events", self.app_id);
        let query = self.signed_query("POST", &path, &body, unix_now());

        let response = self
            .client
            .post(format!("https://{}{path}?{query}", self.host))
            .header(reqwest::header::CONTENT_TYPE, "application/json")
            .body(body)
            .send()
            .await
            .map_err(|e| RealtimeError::Request(e.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(RealtimeError::Api {
                status: status.as_u16(),
                body,
            });
        }

        debug!(channels = channels.len(), "Pusher event published");
        Ok(())
    }

    /// Publish an event, logging instead of failing.
    ///
    /// Chat messages are persisted before they are published, so a lost event
    /// only delays what clients see until their next fetch.
    pub async fn publish<T: Serialize + Sync>(&self, channels: &[String], event: &str, data: &T) {
        if let Err(e) = self.trigger(channels, event, data).await {
            warn!(error = %e, event = %event, "Failed to publish realtime event");
        }
    }

    /// Sign a private-channel subscription for the socket `socket_id`.
    ///
    /// # Errors
    ///
    /// Returns `RealtimeError::InvalidSubscription` if the socket id is
    /// malformed or the channel is not private.
    pub fn authorize_channel(
        &self,
        socket_id: &str,
        channel: &str,
    ) -> Result<ChannelAuth, RealtimeError> {
        if !is_valid_socket_id(socket_id) {
            return Err(RealtimeError::InvalidSubscription(
                "malformed socket_id".to_string(),
            ));
        }
        if !channel.starts_with("private-") || channel.len() > 164 {
            return Err(RealtimeError::InvalidSubscription(
                "only private channels can be authorized".to_string(),
            ));
        }

        let signature = hmac_hex(
            self.secret.expose_secret(),
            &format!("{socket_id}:{channel}"),
        );

        Ok(ChannelAuth {
            auth: format!("{}:{signature}", self.key),
        })
    }

    /// Query string carrying the auth parameters and signature of a request.
    fn signed_query(&self, method: &str, path: &str, body: &str, timestamp: u64) -> String {
        // Parameters must be in key order for signing.
        let params = format!(
            "auth_key={}&auth_timestamp={timestamp}&auth_version=1.0&body_md5={}",
            self.key,
            hex::encode(Md5::digest(body.as_bytes())),
        );
        let signature = hmac_hex(
            self.secret.expose_secret(),
            &format!("{method}\n{path}\n{params}"),
        );
        format!("{params}&auth_signature={signature}")
    }
}

/// Whether `socket_id` has Pusher's `<digits>.<digits>` form.
fn is_valid_socket_id(socket_id: &str) -> bool {
    socket_id.split_once('.').is_some_and(|(a, b)| {
        !a.is_empty()
            && !b.is_empty()
            && a.len() <= 20
            && b.len() <= 20
            && a.bytes().all(|c| c.is_ascii_digit())
            && b.bytes().all(|c| c.is_ascii_digit())
    })
}

fn hmac_hex(secret: &str, message: &str) -> String {
    // HMAC accepts keys of any length
    let mut mac =
        Hmac::<Sha256>::new_from_slice(secret.as_bytes()).unwrap_or_else(|_| unreachable!());
    mac.update(message.as_bytes());
    hex::encode(mac.finalize().into_bytes())
}

fn unix_now() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_secs())
        .unwrap_or_default()
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    fn client() -> PusherClient {
        PusherClient::new(&PusherConfig {
            app_id: "3".to_string(),
            key: "278d425bdf160c739803".to_string(),
            secret: SecretString::from("7ad3773142a6692b25b8"),
            cluster: "eu".to_string(),
        })
    }

    #[test]
    fn test_host_uses_cluster() {
        assert_eq!(client().host, "api-eu.pusher.com");
    }

    #[test]
    fn test_authorize_channel_reference_signature() {
        // Worked example from the Pusher channel authorization docs.
        let auth = client()
            .authorize_channel("1234.1234", "private-foobar")
            .unwrap();
        assert_eq!(
            auth.auth,
            "278d425bdf160c739803:58df8b0c36d6982b82c3ecf6b4662e34fe8c25bba48f5369f135bf843651c3a4"
        );
    }

    #[test]
    fn test_authorize_rejects_bad_socket_id() {
        for socket_id in ["", "1234", "abc.123", "1.2.3", "1234.", ".1234"] {
            assert!(
                client().authorize_channel(socket_id, "private-chat-1").is_err(),
                "{socket_id}"
            );
        }
    }

    #[test]
    fn test_authorize_rejects_public_channel() {
        assert!(matches!(
            client().authorize_channel("1.1", "admin-chat"),
            Err(RealtimeError::InvalidSubscription(_))
        ));
    }

    #[test]
    fn test_signed_query_layout() {
        let query = client().signed_query("POST", "/apps/3/events", "{}", 1_353_088_179);
        assert!(query.starts_with(
            "auth_key=278d425bdf160c739803&auth_timestamp=1353088179&auth_version=1.0&body_md5=99914b932bd37a50b983c5e7c90ae93b&auth_signature="
        ));
        let signature = query.rsplit('=').next().unwrap();
        assert_eq!(signature.len(), 64);
    }
}
