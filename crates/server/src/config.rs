//! Server configuration loaded from environment variables.
//!
//! # Environment Variables
//!
//! ## Required
//! - `DATABASE_URL` - `PostgreSQL` connection string
//! - `BASE_URL` - Public URL of the store (used in emails and cookie security)
//! - `SESSION_SECRET` - Session signing secret (min 32 chars, high entropy)
//! - `STRIPE_SECRET_KEY` - Stripe secret API key
//! - `STRIPE_WEBHOOK_SECRET` - Stripe webhook signing secret
//!
//! ## Optional
//! - `HOST` - Bind address (default: 127.0.0.1)
//! - `PORT` - Listen port (default: 3000)
//! - `STRIPE_PUBLISHABLE_KEY` - Returned to the browser at checkout
//! - `STORE_CURRENCY` - ISO currency code (default: usd)
//! - `FLAT_SHIPPING_RATE` - Shipping charged when no live rate is chosen (default: 0)
//! - `LOG_FORMAT` - `json` for JSON log lines
//! - `SENTRY_DSN`, `SENTRY_ENVIRONMENT`, `SENTRY_SAMPLE_RATE`, `SENTRY_TRACES_SAMPLE_RATE`
//!
//! ## Optional (Pusher - enables realtime chat events)
//! - `PUSHER_APP_ID`, `PUSHER_KEY`, `PUSHER_SECRET`
//! - `PUSHER_CLUSTER` (default: mt1)
//!
//! ## Optional (object storage - enables image uploads)
//! - `STORAGE_BUCKET`, `STORAGE_ACCESS_KEY_ID`, `STORAGE_SECRET_ACCESS_KEY`
//! - `STORAGE_REGION` (default: us-east-1)
//! - `STORAGE_ENDPOINT` (default: `https://s3.<region>.amazonaws.com`)
//! - `STORAGE_PUBLIC_URL` (default: `<endpoint>/<bucket>`)
//!
//! ## Optional (Shippo - enables live shipping quotes)
//! - `SHIPPO_API_TOKEN`
//! - `SHIP_FROM_NAME`, `SHIP_FROM_STREET1`, `SHIP_FROM_CITY`, `SHIP_FROM_STATE`,
//!   `SHIP_FROM_POSTAL_CODE`, `SHIP_FROM_COUNTRY` (default: US), `SHIP_FROM_PHONE`
//!
//! ## Optional (SMTP - enables transactional email)
//! - `SMTP_HOST`, `SMTP_USERNAME`, `SMTP_PASSWORD`, `EMAIL_FROM`
//! - `SMTP_PORT` (default: 587)

use std::collections::HashMap;
use std::net::{IpAddr, SocketAddr};

use rust_decimal::Decimal;
use secrecy::{ExposeSecret, SecretString};
use thiserror::Error;

use emporium_core::CurrencyCode;

use crate::models::Address;

const MIN_SESSION_SECRET_LENGTH: usize = 32;
const MIN_ENTROPY_BITS_PER_CHAR: f64 = 3.3;

/// Blocklist of common placeholder patterns (case-insensitive)
const PLACEHOLDER_PATTERNS: &[&str] = &[
    "your-",
    "changeme",
    "replace",
    "placeholder",
    "example",
    "secret",
    "password",
    "xxx",
    "todo",
    "fixme",
    "insert",
    "enter-",
    "put-your",
    "add-your",
];

/// Configuration errors that can occur during loading.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Missing environment variable: {0}")]
    MissingEnvVar(String),
    #[error("Invalid environment variable {0}: {1}")]
    InvalidEnvVar(String, String),
    #[error("Insecure secret in {0}: {1}")]
    InsecureSecret(String, String),
}

/// Server application configuration.
#[derive(Debug, Clone)]
pub struct ServerConfig {
    /// `PostgreSQL` database connection URL (contains password)
    pub database_url: SecretString,
    /// IP address to bind the server to
    pub host: IpAddr,
    /// Port to listen on
    pub port: u16,
    /// Public base URL, without trailing slash
    pub base_url: String,
    /// Store name shown on printed documents
    pub store_name: String,
    /// Session signing secret
    pub session_secret: SecretString,
    /// Currency all prices are expressed in
    pub currency: CurrencyCode,
    /// Shipping charged when the customer did not pick a live rate
    pub flat_shipping_rate: Decimal,
    /// Stripe configuration
    pub stripe: StripeConfig,
    /// Pusher configuration (realtime chat events)
    pub pusher: Option<PusherConfig>,
    /// Object storage configuration (image uploads)
    pub storage: Option<StorageConfig>,
    /// Shippo configuration (live shipping quotes)
    pub shippo: Option<ShippoConfig>,
    /// SMTP configuration (transactional email)
    pub email: Option<EmailConfig>,
    /// Emit JSON log lines
    pub log_json: bool,
    /// Sentry DSN for error tracking
    pub sentry_dsn: Option<String>,
    /// Sentry environment name
    pub sentry_environment: Option<String>,
    /// Fraction of errors sent to Sentry
    pub sentry_sample_rate: f32,
    /// Fraction of transactions traced
    pub sentry_traces_sample_rate: f32,
}

/// Stripe API configuration.
///
/// Implements `Debug` manually to redact secret fields.
#[derive(Clone)]
pub struct StripeConfig {
    /// Secret API key (`sk_...`)
    pub secret_key: SecretString,
    /// Webhook endpoint signing secret (`whsec_...`)
    pub webhook_secret: SecretString,
    /// Publishable key handed to the browser (`pk_...`)
    pub publishable_key: Option<String>,
}

impl std::fmt::Debug for StripeConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("StripeConfig")
            .field("secret_key", &"[REDACTED]")
            .field("webhook_secret", &"[REDACTED]")
            .field("publishable_key", &self.publishable_key)
            .finish()
    }
}

/// Pusher Channels configuration.
#[derive(Clone)]
pub struct PusherConfig {
    pub app_id: String,
    /// Public application key
    pub key: String,
    pub secret: SecretString,
    pub cluster: String,
}

impl std::fmt::Debug for PusherConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PusherConfig")
            .field("app_id", &self.app_id)
            .field("key", &self.key)
            .field("secret", &"[REDACTED]")
            .field("cluster", &self.cluster)
            .finish()
    }
}

/// S3-compatible object storage configuration.
#[derive(Clone)]
pub struct StorageConfig {
    pub bucket: String,
    pub region: String,
    /// API endpoint, without trailing slash
    pub endpoint: String,
    pub access_key_id: String,
    pub secret_access_key: SecretString,
    /// Base URL under which uploaded objects are publicly served
    pub public_url: String,
}

impl std::fmt::Debug for StorageConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("StorageConfig")
            .field("bucket", &self.bucket)
            .field("region", &self.region)
            .field("endpoint", &self.endpoint)
            .field("access_key_id", &self.access_key_id)
            .field("secret_access_key", &"[REDACTED]")
            .field("public_url", &self.public_url)
            .finish()
    }
}

/// Shippo shipping-rate configuration.
#[derive(Clone)]
pub struct ShippoConfig {
    pub api_token: SecretString,
    /// Warehouse address parcels ship from
    pub ship_from: Address,
}

impl std::fmt::Debug for ShippoConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ShippoConfig")
            .field("api_token", &"[REDACTED]")
            .field("ship_from", &self.ship_from)
            .finish()
    }
}

/// Email (SMTP) configuration.
///
/// Implements `Debug` manually to redact the password.
#[derive(Clone)]
pub struct EmailConfig {
    /// SMTP server hostname
    pub smtp_host: String,
    /// SMTP server port
    pub smtp_port: u16,
    /// SMTP authentication username
    pub smtp_username: String,
    /// SMTP authentication password
    pub smtp_password: SecretString,
    /// Email sender address (From header)
    pub from_address: String,
}

impl std::fmt::Debug for EmailConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("EmailConfig")
            .field("smtp_host", &self.smtp_host)
            .field("smtp_port", &self.smtp_port)
            .field("smtp_username", &self.smtp_username)
            .field("smtp_password", &"[REDACTED]")
            .field("from_address", &self.from_address)
            .finish()
    }
}

impl ServerConfig {
    /// Load configuration from environment variables.
    ///
    /// Calls `dotenvy::dotenv()` to load from `.env` file if present.
    ///
    /// # Errors
    ///
    /// Returns `ConfigError` if required variables are missing, invalid, or
    /// if secrets fail validation (placeholder detection, entropy check).
    pub fn from_env() -> Result<Self, ConfigError> {
        // Load .env file if present (ignore errors if not found)
        let _ = dotenvy::dotenv();

        let database_url = SecretString::from(get_required_env("DATABASE_URL")?);
        let host = get_env_or_default("HOST", "127.0.0.1")
            .parse::<IpAddr>()
            .map_err(|e| ConfigError::InvalidEnvVar("HOST".to_string(), e.to_string()))?;
        let port = get_env_or_default("PORT", "3000")
            .parse::<u16>()
            .map_err(|e| ConfigError::InvalidEnvVar("PORT".to_string(), e.to_string()))?;
        let base_url = get_required_env("BASE_URL")?
            .trim_end_matches('/')
            .to_string();
        let store_name = get_env_or_default("STORE_NAME", "Emporium");
        let session_secret = get_validated_secret("SESSION_SECRET")?;
        validate_session_secret(&session_secret, "SESSION_SECRET")?;

        let currency = get_env_or_default("STORE_CURRENCY", "usd")
            .parse::<CurrencyCode>()
            .map_err(|e| {
                ConfigError::InvalidEnvVar("STORE_CURRENCY".to_string(), e.to_string())
            })?;
        let flat_shipping_rate = parse_amount(
            "FLAT_SHIPPING_RATE",
            &get_env_or_default("FLAT_SHIPPING_RATE", "0"),
        )?;

        let stripe = StripeConfig::from_env()?;
        let pusher = PusherConfig::from_env()?;
        let storage = StorageConfig::from_env()?;
        let shippo = ShippoConfig::from_env()?;
        let email = EmailConfig::from_env()?;

        let log_json =
            get_optional_env("LOG_FORMAT").is_some_and(|f| f.eq_ignore_ascii_case("json"));
        let sentry_dsn = get_optional_env("SENTRY_DSN");
        let sentry_environment = get_optional_env("SENTRY_ENVIRONMENT");
        let sentry_sample_rate = get_optional_env("SENTRY_SAMPLE_RATE")
            .and_then(|s| s.parse().ok())
            .unwrap_or(1.0);
        let sentry_traces_sample_rate = get_optional_env("SENTRY_TRACES_SAMPLE_RATE")
            .and_then(|s| s.parse().ok())
            .unwrap_or(0.1);

        Ok(Self {
            database_url,
            host,
            port,
            base_url,
            store_name,
            session_secret,
            currency,
            flat_shipping_rate,
            stripe,
            pusher,
            storage,
            shippo,
            email,
            log_json,
            sentry_dsn,
            sentry_environment,
            sentry_sample_rate,
            sentry_traces_sample_rate,
        })
    }

    /// Returns the socket address for binding the server.
    #[must_use]
    pub const fn socket_addr(&self) -> SocketAddr {
        SocketAddr::new(self.host, self.port)
    }

    /// Whether cookies must carry the `Secure` attribute.
    #[must_use]
    pub fn secure_cookies(&self) -> bool {
        self.base_url.starts_with("https://")
    }
}

impl StripeConfig {
    fn from_env() -> Result<Self, ConfigError> {
        Ok(Self {
            secret_key: get_validated_secret("STRIPE_SECRET_KEY")?,
            webhook_secret: get_validated_secret("STRIPE_WEBHOOK_SECRET")?,
            publishable_key: get_optional_env("STRIPE_PUBLISHABLE_KEY"),
        })
    }
}

impl PusherConfig {
    fn from_env() -> Result<Option<Self>, ConfigError> {
        let app_id = get_optional_env("PUSHER_APP_ID");
        let key = get_optional_env("PUSHER_KEY");
        let secret = get_optional_env("PUSHER_SECRET");

        match (app_id, key, secret) {
            (Some(app_id), Some(key), Some(secret)) => {
                validate_secret_strength(&secret, "PUSHER_SECRET")?;
                Ok(Some(Self {
                    app_id,
                    key,
                    secret: SecretString::from(secret),
                    cluster: get_env_or_default("PUSHER_CLUSTER", "mt1"),
                }))
            }
            (None, None, None) => Ok(None),
            _ => Err(ConfigError::InvalidEnvVar(
                "PUSHER_*".to_string(),
                "PUSHER_APP_ID, PUSHER_KEY and PUSHER_SECRET must be set together".to_string(),
            )),
        }
    }
}

impl StorageConfig {
    fn from_env() -> Result<Option<Self>, ConfigError> {
        let bucket = get_optional_env("STORAGE_BUCKET");
        let access_key_id = get_optional_env("STORAGE_ACCESS_KEY_ID");
        let secret_access_key = get_optional_env("STORAGE_SECRET_ACCESS_KEY");

        match (bucket, access_key_id, secret_access_key) {
            (Some(bucket), Some(access_key_id), Some(secret_access_key)) => {
                validate_secret_strength(&secret_access_key, "STORAGE_SECRET_ACCESS_KEY")?;
                let region = get_env_or_default("STORAGE_REGION", "us-east-1");
                let endpoint = get_optional_env("STORAGE_ENDPOINT")
                    .unwrap_or_else(|| format!("https://s3.{region}.amazonaws.com"))
                    .trim_end_matches('/')
                    .to_string();
                let public_url = get_optional_env("STORAGE_PUBLIC_URL")
                    .unwrap_or_else(|| format!("{endpoint}/{bucket}"))
                    .trim_end_matches('/')
                    .to_string();

                Ok(Some(Self {
                    bucket,
                    region,
                    endpoint,
                    access_key_id,
                    secret_access_key: SecretString::from(secret_access_key),
                    public_url,
                }))
            }
            (None, None, None) => Ok(None),
            _ => Err(ConfigError::InvalidEnvVar(
                "STORAGE_*".to_string(),
                "STORAGE_BUCKET, STORAGE_ACCESS_KEY_ID and STORAGE_SECRET_ACCESS_KEY must be set together"
                    .to_string(),
            )),
        }
    }
}

impl ShippoConfig {
    fn from_env() -> Result<Option<Self>, ConfigError> {
        let Some(api_token) = get_optional_env("SHIPPO_API_TOKEN") else {
            return Ok(None);
        };
        validate_secret_strength(&api_token, "SHIPPO_API_TOKEN")?;

        let ship_from = Address {
            name: get_required_env("SHIP_FROM_NAME")?,
            street1: get_required_env("SHIP_FROM_STREET1")?,
            street2: get_optional_env("SHIP_FROM_STREET2"),
            city: get_required_env("SHIP_FROM_CITY")?,
            state: get_required_env("SHIP_FROM_STATE")?,
            postal_code: get_required_env("SHIP_FROM_POSTAL_CODE")?,
            country: get_env_or_default("SHIP_FROM_COUNTRY", "US"),
            phone: get_optional_env("SHIP_FROM_PHONE"),
        };

        Ok(Some(Self {
            api_token: SecretString::from(api_token),
            ship_from,
        }))
    }
}

impl EmailConfig {
    fn from_env() -> Result<Option<Self>, ConfigError> {
        let Some(smtp_host) = get_optional_env("SMTP_HOST") else {
            return Ok(None);
        };
        let smtp_port = get_env_or_default("SMTP_PORT", "587")
            .parse::<u16>()
            .map_err(|e| ConfigError::InvalidEnvVar("SMTP_PORT".to_string(), e.to_string()))?;

        Ok(Some(Self {
            smtp_host,
            smtp_port,
            smtp_username: get_required_env("SMTP_USERNAME")?,
            smtp_password: get_validated_secret("SMTP_PASSWORD")?,
            from_address: get_required_env("EMAIL_FROM")?,
        }))
    }
}

// =============================================================================
// Helper Functions
// =============================================================================

/// Get a required environment variable.
fn get_required_env(key: &str) -> Result<String, ConfigError> {
    std::env::var(key).map_err(|_| ConfigError::MissingEnvVar(key.to_string()))
}

/// Get an optional environment variable, treating empty values as unset.
fn get_optional_env(key: &str) -> Option<String> {
    std::env::var(key).ok().filter(|v| !v.trim().is_empty())
}

/// Get an environment variable with a default value.
fn get_env_or_default(key: &str, default: &str) -> String {
    get_optional_env(key).unwrap_or_else(|| default.to_string())
}

/// Parse a non-negative decimal amount.
fn parse_amount(key: &str, value: &str) -> Result<Decimal, ConfigError> {
    let amount = value
        .trim()
        .parse::<Decimal>()
        .map_err(|e| ConfigError::InvalidEnvVar(key.to_string(), e.to_string()))?;
    if amount.is_sign_negative() {
        return Err(ConfigError::InvalidEnvVar(
            key.to_string(),
            "must not be negative".to_string(),
        ));
    }
    Ok(amount)
}

/// Validate that a session secret meets minimum length requirements.
fn validate_session_secret(secret: &SecretString, var_name: &str) -> Result<(), ConfigError> {
    let value = secret.expose_secret();
    if value.len() < MIN_SESSION_SECRET_LENGTH {
        return Err(ConfigError::InsecureSecret(
            var_name.to_string(),
            format!(
                "must be at least {} characters (got {})",
                MIN_SESSION_SECRET_LENGTH,
                value.len()
            ),
        ));
    }
    Ok(())
}

/// Calculate Shannon entropy in bits per character.
fn shannon_entropy(s: &str) -> f64 {
    if s.is_empty() {
        return 0.0;
    }

    let mut freq: HashMap<char, usize> = HashMap::new();
    for c in s.chars() {
        *freq.entry(c).or_insert(0) += 1;
    }

    #[allow(clippy::cast_precision_loss)] // String length will never exceed f64 precision
    let len = s.chars().count() as f64;
    freq.values()
        .map(|&count| {
            #[allow(clippy::cast_precision_loss)]
            let p = count as f64 / len;
            -p * p.log2()
        })
        .sum()
}

/// Validate that a secret is not a placeholder and has sufficient entropy.
fn validate_secret_strength(secret: &str, var_name: &str) -> Result<(), ConfigError> {
    let lower = secret.to_lowercase();

    for pattern in PLACEHOLDER_PATTERNS {
        if lower.contains(pattern) {
            return Err(ConfigError::InsecureSecret(
                var_name.to_string(),
                format!("appears to be a placeholder (contains '{pattern}')"),
            ));
        }
    }

    let entropy = shannon_entropy(secret);
    if entropy < MIN_ENTROPY_BITS_PER_CHAR {
        return Err(ConfigError::InsecureSecret(
            var_name.to_string(),
            format!(
                "entropy too low ({entropy:.2} bits/char, need >= {MIN_ENTROPY_BITS_PER_CHAR:.1}). Use a randomly generated secret."
            ),
        ));
    }

    Ok(())
}

/// Load and validate a secret from environment.
fn get_validated_secret(key: &str) -> Result<SecretString, ConfigError> {
    let value = get_required_env(key)?;
    validate_secret_strength(&value, key)?;
    Ok(SecretString::from(value))
}
