//! S3-compatible object storage for product images.
//!
//! Requests are signed with AWS Signature Version 4 and use path-style
//! addressing (`<endpoint>/<bucket>/<key>`), which S3, R2, MinIO and
//! DigitalOcean Spaces all accept.

use chrono::{DateTime, Utc};
use hmac::{Hmac, Mac};
use reqwest::Client;
use secrecy::{ExposeSecret, SecretString};
use sha2::{Digest, Sha256};
use thiserror::Error;
use tracing::{debug, instrument};
use url::Url;

use crate::config::StorageConfig;

/// Largest upload accepted, in bytes.
pub const MAX_UPLOAD_BYTES: usize = 10 * 1024 * 1024;

/// Content types accepted for product images.
pub const ALLOWED_IMAGE_TYPES: &[&str] = &["image/jpeg", "image/png", "image/webp", "image/gif"];

const MAX_FILE_NAME_LEN: usize = 80;

/// Errors that can occur when storing objects.
#[derive(Debug, Error)]
pub enum StorageError {
    /// HTTP request failed.
    #[error("storage request failed: {0}")]
    Request(String),

    /// Storage service returned a non-success status.
    #[error("storage API error ({status}): {body}")]
    Api { status: u16, body: String },

    /// Endpoint configuration is unusable.
    #[error("storage configuration error: {0}")]
    Config(String),
}

/// Client for an S3-compatible bucket.
#[derive(Clone)]
pub struct ObjectStorage {
    client: Client,
    bucket: String,
    region: String,
    endpoint: Url,
    access_key_id: String,
    secret_access_key: SecretString,
    public_url: String,
}

impl std::fmt::Debug for ObjectStorage {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ObjectStorage")
            .field("bucket", &self.bucket)
            .field("region", &self.region)
            .field("endpoint", &self.endpoint.as_str())
            .field("secret_access_key", &"[REDACTED]")
            .finish_non_exhaustive()
    }
}

impl ObjectStorage {
    /// Create a storage client.
    ///
    /// # Errors
    ///
    /// Returns `StorageError::Config` if the endpoint is not a valid URL.
    pub fn new(config: &StorageConfig) -> Result<Self, StorageError> {
        let endpoint = Url::parse(&config.endpoint)
            .map_err(|e| StorageError::Config(format!("STORAGE_ENDPOINT: {e}")))?;
        if endpoint.host_str().is_none() {
            return Err(StorageError::Config(
                "STORAGE_ENDPOINT must have a host".to_string(),
            ));
        }

        Ok(Self {
            client: Client::new(),
            bucket: config.bucket.clone(),
            region: config.region.clone(),
            endpoint,
            access_key_id: config.access_key_id.clone(),
            secret_access_key: config.secret_access_key.clone(),
            public_url: config.public_url.clone(),
        })
    }

    /// Upload `body` under `key` and return the object's public URL.
    ///
    /// # Errors
    ///
    /// Returns error if the request fails or the service rejects it.
    #[instrument(skip(self, body), fields(bytes = body.len()))]
    pub async fn put_object(
        &self,
        key: &str,
        body: Vec<u8>,
        content_type: &str,
    ) -> Result<String, StorageError> {
        let path = format!("/{}/{}", self.bucket, encode_key(key));
        let host = self.host();
        let now = Utc::now();
        let payload_hash = hex::encode(Sha256::digest(&body));

        let request = SignedRequest {
            method: "PUT",
            host: &host,
            path: &path,
            content_type,
            payload_hash: &payload_hash,
            timestamp: now,
        };
        let authorization = request.authorization(
            &self.access_key_id,
            self.secret_access_key.expose_secret(),
            &self.region,
        );

        let mut url = self.endpoint.clone();
        url.set_path(&path);

        let response = self
            .client
            .put(url)
            .header("x-amz-date", amz_date(now))
            .header("x-amz-content-sha256", &payload_hash)
            .header(reqwest::header::CONTENT_TYPE, content_type)
            .header(reqwest::header::AUTHORIZATION, authorization)
            .body(body)
            .send()
            .await
            .map_err(|e| StorageError::Request(e.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(StorageError::Api {
                status: status.as_u16(),
                body,
            });
        }

        debug!(key = %key, "Object stored");
        Ok(format!("{}/{}", self.public_url, encode_key(key)))
    }

    /// `Host` header value for the endpoint.
    fn host(&self) -> String {
        let host = self.endpoint.host_str().unwrap_or_default();
        match self.endpoint.port() {
            Some(port) => format!("{host}:{port}"),
            None => host.to_string(),
        }
    }
}

/// Object key for an uploaded product image: `products/<uuid>-<name>`.
///
/// The file name is lowercased and reduced to `a-z 0-9 . - _`.
#[must_use]
pub fn object_key_for(file_name: &str) -> String {
    format!(
        "products/{}-{}",
        uuid::Uuid::new_v4(),
        sanitize_file_name(file_name)
    )
}

fn sanitize_file_name(file_name: &str) -> String {
    // Browsers on Windows may send the full path.
    let base = file_name.rsplit(['/', '\\']).next().unwrap_or(file_name);

    let mut out = String::with_capacity(base.len());
    for c in base.chars() {
        let c = c.to_ascii_lowercase();
        if c == '.' {
            if out.ends_with('-') {
                out.pop();
            }
            out.push(c);
        } else if c.is_ascii_alphanumeric() || c == '_' {
            out.push(c);
        } else if !out.ends_with('-') {
            out.push('-');
        }
    }

    let trimmed: String = out
        .trim_matches(|c| c == '-' || c == '.')
        .chars()
        .rev()
        .take(MAX_FILE_NAME_LEN)
        .collect::<Vec<_>>()
        .into_iter()
        .rev()
        .collect();

    if trimmed.is_empty() {
        "upload".to_string()
    } else {
        trimmed
    }
}

/// URI-encode each segment of an object key, keeping `/` separators.
fn encode_key(key: &str) -> String {
    key.split('/')
        .map(|segment| urlencoding::encode(segment).into_owned())
        .collect::<Vec<_>>()
        .join("/")
}

fn amz_date(at: DateTime<Utc>) -> String {
    at.format("%Y%m%dT%H%M%SZ").to_string()
}

/// The parts of a request covered by the signature.
struct SignedRequest<'a> {
    method: &'a str,
    host: &'a str,
    /// Already URI-encoded.
    path: &'a str,
    content_type: &'a str,
    payload_hash: &'a str,
    timestamp: DateTime<Utc>,
}

const SIGNED_HEADERS: &str = "content-type;host;x-amz-content-sha256;x-amz-date";

impl SignedRequest<'_> {
    fn canonical_request(&self) -> String {
        format!(
            "{method}\n{path}\n\ncontent-type:{content_type}\nhost:{host}\nx-amz-content-sha256:{hash}\nx-amz-date:{date}\n\n{SIGNED_HEADERS}\n{hash}",
            method = self.method,
            path = self.path,
            content_type = self.content_type,
            host = self.host,
            hash = self.payload_hash,
            date = amz_date(self.timestamp),
        )
    }

    fn authorization(&self, access_key_id: &str, secret: &str, region: &str) -> String {
        let date = self.timestamp.format("%Y%m%d").to_string();
        let scope = format!("{date}/{region}/s3/aws4_request");
        let string_to_sign = format!(
            "AWS4-HMAC-SHA256\n{}\n{scope}\n{}",
            amz_date(self.timestamp),
            hex::encode(Sha256::digest(self.canonical_request().as_bytes())),
        );

        let key = signing_key(secret, &date, region, "s3");
        let signature = hex::encode(hmac(&key, string_to_sign.as_bytes()));

        format!(
            "AWS4-HMAC-SHA256 Credential={access_key_id}/{scope}, SignedHeaders={SIGNED_HEADERS}, Signature={signature}"
        )
    }
}

fn hmac(key: &[u8], data: &[u8]) -> Vec<u8> {
    // HMAC accepts keys of any length
    let mut mac = Hmac::<Sha256>::new_from_slice(key).unwrap_or_else(|_| unreachable!());
    mac.update(data);
    mac.finalize().into_bytes().to_vec()
}

/// Derive the SigV4 signing key for a date, region and service.
fn signing_key(secret: &str, date: &str, region: &str, service: &str) -> Vec<u8> {
    let k_date = hmac(format!("AWS4{secret}").as_bytes(), date.as_bytes());
    let k_region = hmac(&k_date, region.as_bytes());
    let k_service = hmac(&k_region, service.as_bytes());
    hmac(&k_service, b"aws4_request")
}
