//! Application state shared across handlers.

use std::sync::Arc;

use sqlx::PgPool;

use crate::config::ServerConfig;
use crate::services::auth::AuthService;
use crate::services::catalog::CatalogCache;
use crate::services::chat::ChatService;
use crate::services::checkout::CheckoutService;
use crate::services::email::EmailService;
use crate::services::payments::StripeClient;
use crate::services::realtime::PusherClient;
use crate::services::shipping::ShippoClient;
use crate::services::storage::{ObjectStorage, StorageError};

/// Error building the application state.
#[derive(Debug, thiserror::Error)]
pub enum StateError {
    #[error("object storage: {0}")]
    Storage(#[from] StorageError),
    #[error("smtp: {0}")]
    Smtp(#[from] lettre::transport::smtp::Error),
}

/// Application state shared across all handlers.
///
/// This struct is cheaply cloneable via `Arc` and provides access to
/// shared resources like database connections and configuration.
#[derive(Clone)]
pub struct AppState {
    inner: Arc<AppStateInner>,
}

struct AppStateInner {
    config: ServerConfig,
    pool: PgPool,
    stripe: StripeClient,
    pusher: Option<PusherClient>,
    storage: Option<ObjectStorage>,
    shippo: Option<ShippoClient>,
    email: Option<EmailService>,
    catalog: CatalogCache,
}

impl AppState {
    /// Create a new application state.
    ///
    /// Optional integrations are built only when configured.
    ///
    /// # Errors
    ///
    /// Returns an error if object storage or SMTP settings are unusable.
    pub fn new(config: ServerConfig, pool: PgPool) -> Result<Self, StateError> {
        let stripe = StripeClient::new(&config.stripe);
        let pusher = config.pusher.as_ref().map(PusherClient::new);
        let storage = config.storage.as_ref().map(ObjectStorage::new).transpose()?;
        let shippo = config.shippo.as_ref().map(ShippoClient::new);
        let email = config
            .email
            .as_ref()
            .map(|email| EmailService::new(email, &config.base_url, config.currency))
            .transpose()?;

        Ok(Self {
            inner: Arc::new(AppStateInner {
                config,
                pool,
                stripe,
                pusher,
                storage,
                shippo,
                email,
                catalog: CatalogCache::new(),
            }),
        })
    }

    #[must_use]
    pub fn config(&self) -> &ServerConfig {
        &self.inner.config
    }

    /// Get a reference to the database connection pool.
    #[must_use]
    pub fn pool(&self) -> &PgPool {
        &self.inner.pool
    }

    #[must_use]
    pub fn stripe(&self) -> &StripeClient {
        &self.inner.stripe
    }

    /// Pusher client, when realtime chat is configured.
    #[must_use]
    pub fn pusher(&self) -> Option<&PusherClient> {
        self.inner.pusher.as_ref()
    }

    /// Object storage, when uploads are configured.
    #[must_use]
    pub fn storage(&self) -> Option<&ObjectStorage> {
        self.inner.storage.as_ref()
    }

    /// Shippo client, when live shipping quotes are configured.
    #[must_use]
    pub fn shippo(&self) -> Option<&ShippoClient> {
        self.inner.shippo.as_ref()
    }

    /// Email service, when SMTP is configured.
    #[must_use]
    pub fn email(&self) -> Option<&EmailService> {
        self.inner.email.as_ref()
    }

    #[must_use]
    pub fn catalog(&self) -> &CatalogCache {
        &self.inner.catalog
    }

    #[must_use]
    pub fn auth(&self) -> AuthService<'_> {
        AuthService::new(self.pool())
    }

    #[must_use]
    pub fn chat(&self) -> ChatService<'_> {
        ChatService::new(self.pool(), self.pusher())
    }

    /// Checkout service wired to the configured integrations.
    #[must_use]
    pub fn checkout(&self) -> CheckoutService<'_> {
        CheckoutService::new(
            self.pool(),
            self.stripe(),
            self.shippo(),
            self.email(),
            self.config().currency,
            self.config().flat_shipping_rate,
        )
    }
}
