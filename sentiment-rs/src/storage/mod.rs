//! Object storage upload URLs
//!
//! Clients upload videos straight to object storage using a short-lived
//! signed URL; the service only records the key.
//!
//! - [`plan_upload`]: validates the requested file type and picks a key
//! - [`UploadSigner`]: issues signed upload URLs for a key
//! - [`HmacUploadSigner`]: HMAC-SHA256 signer for an S3-compatible gateway

use chrono::{DateTime, Duration, Utc};
use hmac::{Hmac, Mac};
use regex::Regex;
use serde::Serialize;
use sha2::Sha256;
use std::sync::OnceLock;
use tracing::debug;
use url::Url;
use uuid::Uuid;

use crate::config::StorageConfig;
use crate::error::{Result, SentimentError};

type HmacSha256 = Hmac<Sha256>;

/// Prefix under which uploaded videos are stored
pub const UPLOAD_PREFIX: &str = "inference";

fn video_extension() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| Regex::new(r"(?i)\.(mp4|mov|avi)$").expect("static regex"))
}

/// Where a new upload will land
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UploadTarget {
    pub file_id: Uuid,
    /// Normalized extension including the dot, e.g. `.mp4`
    pub extension: String,
    pub key: String,
    pub content_type: String,
}

/// Validate `file_type` (e.g. `.mp4`) and allocate a fresh object key
pub fn plan_upload(file_type: &str) -> Result<UploadTarget> {
    let captures = video_extension()
        .captures(file_type.trim())
        .ok_or_else(|| SentimentError::InvalidRequest("Invalid file type".to_string()))?;

    let ext = captures[1].to_ascii_lowercase();
    let file_id = Uuid::new_v4();

    Ok(UploadTarget {
        file_id,
        key: format!("{}/{}.{}", UPLOAD_PREFIX, file_id, ext),
        content_type: format!("video/{}", ext),
        extension: format!(".{}", ext),
    })
}

/// A signed, time-limited upload URL
#[derive(Debug, Clone, Serialize)]
pub struct UploadUrl {
    pub url: String,
    pub expires_at: DateTime<Utc>,
}

/// Issues upload URLs and names stored objects for the inference endpoint
pub trait UploadSigner: Send + Sync {
    fn sign_upload(&self, key: &str, content_type: &str, now: DateTime<Utc>) -> Result<UploadUrl>;

    /// Location of `key` as understood by the inference endpoint
    fn storage_uri(&self, key: &str) -> String;
}

/// Signs upload URLs with a shared HMAC-SHA256 secret
pub struct HmacUploadSigner {
    base_url: Url,
    bucket: String,
    secret: Vec<u8>,
    expiry: Duration,
}

impl HmacUploadSigner {
    pub fn new(base_url: &str, bucket: &str, secret: &str, expiry_secs: u64) -> Result<Self> {
        let base_url = Url::parse(base_url)
            .map_err(|e| SentimentError::Config(format!("Invalid upload base URL '{}': {}", base_url, e)))?;
        if base_url.cannot_be_a_base() {
            return Err(SentimentError::Config(format!(
                "Upload base URL cannot be a base: {}",
                base_url
            )));
        }

        let expiry_secs = i64::try_from(expiry_secs)
            .map_err(|_| SentimentError::Config("url_expiry_secs too large".to_string()))?;

        Ok(Self {
            base_url,
            bucket: bucket.to_string(),
            secret: secret.as_bytes().to_vec(),
            expiry: Duration::seconds(expiry_secs),
        })
    }

    pub fn from_config(config: &StorageConfig) -> Result<Self> {
        Self::new(
            &config.upload_base_url,
            &config.bucket,
            &config.signing_secret,
            config.url_expiry_secs,
        )
    }

    fn mac(&self, key: &str, content_type: &str, expires: i64) -> Result<HmacSha256> {
        let mut mac = HmacSha256::new_from_slice(&self.secret)
            .map_err(|e| SentimentError::Storage(format!("Invalid signing key: {}", e)))?;
        mac.update(self.bucket.as_bytes());
        mac.update(b"\n");
        mac.update(key.as_bytes());
        mac.update(b"\n");
        mac.update(content_type.as_bytes());
        mac.update(b"\n");
        mac.update(expires.to_string().as_bytes());
        Ok(mac)
    }

    /// Check a signature presented by the storage gateway
    pub fn verify(
        &self,
        key: &str,
        content_type: &str,
        expires: i64,
        signature: &str,
        now: DateTime<Utc>,
    ) -> bool {
        if now.timestamp() > expires {
            return false;
        }
        let Ok(signature) = hex::decode(signature) else {
            return false;
        };
        match self.mac(key, content_type, expires) {
            Ok(mac) => mac.verify_slice(&signature).is_ok(),
            Err(_) => false,
        }
    }
}

impl UploadSigner for HmacUploadSigner {
    fn sign_upload(&self, key: &str, content_type: &str, now: DateTime<Utc>) -> Result<UploadUrl> {
        let expires_at = now + self.expiry;
        let expires = expires_at.timestamp();
        let signature = hex::encode(self.mac(key, content_type, expires)?.finalize().into_bytes());

        let mut url = self.base_url.clone();
        url.path_segments_mut()
            .map_err(|_| SentimentError::Storage("Upload base URL cannot be a base".to_string()))?
            .pop_if_empty()
            .push(&self.bucket)
            .extend(key.split('/'));
        url.query_pairs_mut()
            .append_pair("content-type", content_type)
            .append_pair("expires", &expires.to_string())
            .append_pair("signature", &signature);

        debug!("Signed upload URL for {} (expires {})", key, expires_at);
        Ok(UploadUrl {
            url: url.to_string(),
            expires_at,
        })
    }

    fn storage_uri(&self, key: &str) -> String {
        format!("s3://{}/{}", self.bucket, key)
    }
}
