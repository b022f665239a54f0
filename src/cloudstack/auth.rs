//! CloudStack Authentication
//!
//! Requests are authenticated with an API key pair: every query carries the
//! `apiKey` and a `signature` computed over the sorted, lowercased query
//! string with HMAC-SHA1 keyed by the secret.

use super::ClientError;
use base64::engine::general_purpose::STANDARD;
use base64::Engine;
use hmac::{Hmac, Mac};
use sha1::Sha1;
use std::fmt;

type HmacSha1 = Hmac<Sha1>;

/// API key pair
#[derive(Clone)]
pub struct ApiCredentials {
    key: String,
    secret: String,
}

impl fmt::Debug for ApiCredentials {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ApiCredentials")
            .field("key", &self.key)
            .field("secret", &"<redacted>")
            .finish()
    }
}

impl ApiCredentials {
    pub fn new(key: &str, secret: &str) -> Self {
        Self {
            key: key.to_string(),
            secret: secret.to_string(),
        }
    }

    pub fn key(&self) -> &str {
        &self.key
    }

    /// Build the final, signed query string for `params`
    ///
    /// `apiKey` is added here; callers pass command, response format and
    /// scoping parameters only.
    pub fn signed_query(&self, params: &[(String, String)]) -> Result<String, ClientError> {
        let mut pairs: Vec<(String, String)> = params.to_vec();
        pairs.push(("apiKey".to_string(), self.key.clone()));
        pairs.sort_by(|a, b| a.0.to_lowercase().cmp(&b.0.to_lowercase()));

        let query = pairs
            .iter()
            .map(|(k, v)| format!("{}={}", k, encode(v)))
            .collect::<Vec<_>>()
            .join("&");

        let signature = self.sign(&query)?;
        Ok(format!("{}&signature={}", query, encode(&signature)))
    }

    /// Base64 HMAC-SHA1 of the lowercased query
    pub fn sign(&self, query: &str) -> Result<String, ClientError> {
        let mut mac = HmacSha1::new_from_slice(self.secret.as_bytes())
            .map_err(|e| ClientError::Setup(format!("invalid API secret: {}", e)))?;
        mac.update(query.to_lowercase().as_bytes());
        Ok(STANDARD.encode(mac.finalize().into_bytes()))
    }
}

/// Percent-encode a query value the way the management server expects
/// (spaces as `%20`, never `+`)
fn encode(value: &str) -> String {
    urlencoding::encode(value).into_owned()
}
