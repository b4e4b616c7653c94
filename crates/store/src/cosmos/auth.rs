//! Master-key request signing.
//!
//! Every request carries an `authorization` header holding an HMAC-SHA256
//! over the verb, resource type, resource link and `x-ms-date` value, keyed
//! with the base64-decoded account key.

use base64::engine::general_purpose::STANDARD;
use base64::Engine;
use chrono::{DateTime, Utc};
use hmac::{Hmac, Mac};
use sha2::Sha256;

use latency_core::MasterKey;

use crate::error::StoreError;

type HmacSha256 = Hmac<Sha256>;

/// Signs requests with an account master key.
pub struct MasterKeySigner {
    key: Vec<u8>,
}

impl MasterKeySigner {
    pub fn new(master_key: &MasterKey) -> Result<Self, StoreError> {
        let key = STANDARD
            .decode(master_key.expose().trim())
            .map_err(|e| StoreError::Auth(format!("master key is not valid base64: {e}")))?;
        if key.is_empty() {
            return Err(StoreError::Auth("master key is empty".into()));
        }
        Ok(Self { key })
    }

    /// Base64 signature over the canonical request string.
    pub fn signature(
        &self,
        verb: &str,
        resource_type: &str,
        resource_link: &str,
        date: &str,
    ) -> Result<String, StoreError> {
        let payload = format!(
            "{}\n{}\n{}\n{}\n\n",
            verb.to_lowercase(),
            resource_type.to_lowercase(),
            resource_link,
            date.to_lowercase()
        );
        let mut mac = HmacSha256::new_from_slice(&self.key)
            .map_err(|e| StoreError::Auth(format!("invalid HMAC key: {e}")))?;
        mac.update(payload.as_bytes());
        Ok(STANDARD.encode(mac.finalize().into_bytes()))
    }

    /// URL-encoded value for the `authorization` header.
    pub fn authorization(
        &self,
        verb: &str,
        resource_type: &str,
        resource_link: &str,
        date: &str,
    ) -> Result<String, StoreError> {
        let sig = self.signature(verb, resource_type, resource_link, date)?;
        let token = format!("type=master&ver=1.0&sig={sig}");
        Ok(urlencoding::encode(&token).into_owned())
    }
}

/// RFC 1123 date as expected in `x-ms-date`.
pub fn http_date(at: DateTime<Utc>) -> String {
    at.format("%a, %d %b %Y %H:%M:%S GMT").to_string()
}
