//! HTTP utilities for CloudStack API calls

use super::ClientError;
use reqwest::Client;
use serde_json::Value;
use std::time::Duration;

/// Maximum length of response body to log (to avoid logging sensitive data)
const MAX_LOG_BODY_LENGTH: usize = 200;

/// Sanitize response body for logging
/// Truncates long responses and strips control characters
fn sanitize_for_log(body: &str) -> String {
    let truncated = if body.len() > MAX_LOG_BODY_LENGTH {
        let mut end = MAX_LOG_BODY_LENGTH;
        while !body.is_char_boundary(end) {
            end -= 1;
        }
        format!("{}... [truncated, {} bytes total]", &body[..end], body.len())
    } else {
        body.to_string()
    };

    truncated.replace(|c: char| !c.is_ascii_graphic() && c != ' ', "")
}

/// HTTP client wrapper for management server calls
#[derive(Clone)]
pub struct ApiHttpClient {
    client: Client,
}

impl ApiHttpClient {
    /// Create a new HTTP client with a per-request timeout
    pub fn new(timeout: Duration) -> Result<Self, ClientError> {
        let client = Client::builder()
            .user_agent(concat!("cs-zone-cloner/", env!("CARGO_PKG_VERSION")))
            .timeout(timeout)
            .build()?;

        Ok(Self { client })
    }

    /// GET a fully signed URL and return the `response_key` envelope
    ///
    /// The query string is logged without its signature.
    pub async fn get(&self, url: &str, response_key: &str) -> Result<Value, ClientError> {
        tracing::debug!("GET {}", redact_signature(url));

        let response = self.client.get(url).send().await?;
        let status = response.status();
        let body = response.text().await?;

        let parsed: Option<Value> = serde_json::from_str(&body).ok();

        if !status.is_success() {
            tracing::error!("API error: {} - {}", status, sanitize_for_log(&body));
            let (code, text) = parsed
                .as_ref()
                .and_then(|v| api_error(v, response_key))
                .unwrap_or((i64::from(status.as_u16()), status.to_string()));
            return Err(ClientError::Api {
                status: status.as_u16(),
                code,
                text,
            });
        }

        let Some(parsed) = parsed else {
            return Err(ClientError::Decode {
                command: response_key.to_string(),
                reason: format!("body is not JSON: {}", sanitize_for_log(&body)),
            });
        };

        // Some versions report failures with a 200 status
        if let Some((code, text)) = api_error(&parsed, response_key) {
            tracing::error!("API error: {} - {}", code, text);
            return Err(ClientError::Api {
                status: status.as_u16(),
                code,
                text,
            });
        }

        match parsed.get(response_key) {
            Some(envelope) => Ok(envelope.clone()),
            None => Err(ClientError::Decode {
                command: response_key.to_string(),
                reason: "missing response envelope".to_string(),
            }),
        }
    }
}

/// Extract `(errorcode, errortext)` from an error envelope
fn api_error(body: &Value, response_key: &str) -> Option<(i64, String)> {
    let envelope = body
        .get(response_key)
        .or_else(|| body.get("errorresponse"))?;
    let code = envelope.get("errorcode")?.as_i64()?;
    let text = envelope
        .get("errortext")
        .and_then(|v| v.as_str())
        .unwrap_or("unknown error")
        .to_string();
    Some((code, text))
}

fn redact_signature(url: &str) -> String {
    match url.find("&signature=") {
        Some(idx) => format!("{}&signature=<redacted>", &url[..idx]),
        None => url.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_sanitize_truncates_long_bodies() {
        let body = "x".repeat(500);
        let sanitized = sanitize_for_log(&body);
        assert!(sanitized.contains("[truncated, 500 bytes total]"));
    }

    #[test]
    fn test_sanitize_strips_control_chars() {
        assert_eq!(sanitize_for_log("a\nb\tc"), "abc");
    }

    #[test]
    fn test_api_error_from_envelope() {
        let body = json!({"listpodsresponse": {"errorcode": 431, "errortext": "bad zone"}});
        assert_eq!(
            api_error(&body, "listpodsresponse"),
            Some((431, "bad zone".to_string()))
        );
    }

    #[test]
    fn test_api_error_absent_on_success() {
        let body = json!({"listpodsresponse": {"count": 1, "pod": []}});
        assert_eq!(api_error(&body, "listpodsresponse"), None);
    }

    #[test]
    fn test_redact_signature() {
        assert_eq!(
            redact_signature("http://h/client/api?command=x&signature=abc"),
            "http://h/client/api?command=x&signature=<redacted>"
        );
    }
}
