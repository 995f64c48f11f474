//! Shared-key signatures for the log ingestion API.
//!
//! The ingestion endpoint authenticates each POST with
//! `Authorization: SharedKey <customer id>:<digest>`, where the digest is
//! the base64 HMAC-SHA256 of a canonical request string keyed with the
//! workspace's decoded shared key:
//!
//! ```text
//! POST\n<content length>\napplication/json\nx-ms-date:<RFC 1123 date>\n/api/logs
//! ```

use crate::config::ConfigError;
use base64::{Engine as _, engine::general_purpose::STANDARD};
use chrono::{DateTime, Utc};
use hmac::{Hmac, Mac};
use sha2::Sha256;
use std::fmt;

/// Media type of every published body
pub const JSON_CONTENT_TYPE: &str = "application/json";

type HmacSha256 = Hmac<Sha256>;

/// Decoded shared key, ready to sign.
#[derive(Clone)]
pub struct SharedKey {
    mac: HmacSha256,
}

impl SharedKey {
    /// Decode a base64 shared key.
    pub fn from_base64(encoded: &str) -> Result<Self, ConfigError> {
        let key = STANDARD
            .decode(encoded.trim())
            .map_err(ConfigError::InvalidSharedKey)?;
        let mac = HmacSha256::new_from_slice(&key)
            .map_err(|e| ConfigError::invalid("AZURE_SHARED_KEY", e))?;
        Ok(Self { mac })
    }
}

impl fmt::Debug for SharedKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("SharedKey(<redacted>)")
    }
}

/// Canonical string covered by the signature.
pub fn string_to_sign(method: &str, content_length: usize, date: &str, resource: &str) -> String {
    format!(
        "{}\n{}\n{}\nx-ms-date:{}\n{}",
        method, content_length, JSON_CONTENT_TYPE, date, resource
    )
}

/// Compute the `Authorization` header value.
pub fn sign(
    customer_id: &str,
    key: &SharedKey,
    date: &str,
    content_length: usize,
    method: &str,
    resource: &str,
) -> String {
    let mut mac = key.mac.clone();
    mac.update(string_to_sign(method, content_length, date, resource).as_bytes());
    let digest = mac.finalize().into_bytes();
    format!("SharedKey {}:{}", customer_id, STANDARD.encode(digest))
}

/// Like [`sign`], decoding the base64 key first.
pub fn sign_with_encoded_key(
    customer_id: &str,
    shared_key: &str,
    date: &str,
    content_length: usize,
    method: &str,
    resource: &str,
) -> Result<String, ConfigError> {
    let key = SharedKey::from_base64(shared_key)?;
    Ok(sign(customer_id, &key, date, content_length, method, resource))
}

/// Format a timestamp the way `x-ms-date` expects (RFC 1123, `GMT`).
pub fn rfc1123(at: DateTime<Utc>) -> String {
    at.format("%a, %d %b %Y %H:%M:%S GMT").to_string()
}
