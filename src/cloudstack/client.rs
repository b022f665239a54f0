//! CloudStack Client
//!
//! Main client for the management server API, combining request signing,
//! the HTTP transport and page-by-page collection of list results.

use super::auth::ApiCredentials;
use super::http::ApiHttpClient;
use super::{ClientError, ListParams, ResourceClient, ResourceKind};
use crate::config::ConnectionConfig;
use futures::future::BoxFuture;
use futures::FutureExt;
use serde_json::Value;
use url::Url;

/// Records requested per page
pub const DEFAULT_PAGE_SIZE: usize = 500;

/// Main CloudStack client
#[derive(Clone)]
pub struct CloudStackClient {
    credentials: ApiCredentials,
    http: ApiHttpClient,
    endpoint: Url,
    page_size: usize,
}

impl CloudStackClient {
    /// Create a new client for the given connection settings
    pub fn new(conn: &ConnectionConfig) -> Result<Self, ClientError> {
        let raw = format!("{}://{}{}", conn.scheme, conn.host, conn.path);
        let endpoint =
            Url::parse(&raw).map_err(|e| ClientError::Setup(format!("{}: {}", raw, e)))?;

        Ok(Self {
            credentials: ApiCredentials::new(&conn.key, &conn.secret),
            http: ApiHttpClient::new(conn.timeout)?,
            endpoint,
            page_size: DEFAULT_PAGE_SIZE,
        })
    }

    /// Override the page size (mostly useful against small test fixtures)
    pub fn with_page_size(mut self, page_size: usize) -> Self {
        self.page_size = page_size.max(1);
        self
    }

    pub fn endpoint(&self) -> &Url {
        &self.endpoint
    }

    /// Build the signed request URL for one page of a list call
    fn page_url(
        &self,
        kind: ResourceKind,
        params: &ListParams,
        page: usize,
    ) -> Result<String, ClientError> {
        let mut query = vec![
            ("command".to_string(), kind.command().to_string()),
            ("response".to_string(), "json".to_string()),
            ("page".to_string(), page.to_string()),
            ("pagesize".to_string(), self.page_size.to_string()),
        ];
        query.extend(params.to_query());

        Ok(format!("{}?{}", self.endpoint, self.credentials.signed_query(&query)?))
    }

    /// Fetch all pages of a list call
    async fn list_all(
        &self,
        kind: ResourceKind,
        params: &ListParams,
    ) -> Result<Vec<Value>, ClientError> {
        let response_key = kind.response_key();
        let mut all_items = Vec::new();
        let mut page = 1;

        loop {
            let url = self.page_url(kind, params, page)?;
            let envelope = self.http.get(&url, &response_key).await?;
            let (items, count) = extract_page(&envelope, kind)?;
            let received = items.len();
            all_items.extend(items);

            let total_reached = count.map_or(true, |c| all_items.len() >= c);
            if received < self.page_size || total_reached {
                break;
            }
            page += 1;
        }

        tracing::debug!("{} returned {} records", kind, all_items.len());
        Ok(all_items)
    }
}

impl ResourceClient for CloudStackClient {
    fn list<'a>(
        &'a self,
        kind: ResourceKind,
        params: &'a ListParams,
    ) -> BoxFuture<'a, Result<Vec<Value>, ClientError>> {
        self.list_all(kind, params).boxed()
    }
}

/// Split a response envelope into its items and the advertised total
///
/// An empty envelope (`{}`) is how the API reports zero results.
fn extract_page(
    envelope: &Value,
    kind: ResourceKind,
) -> Result<(Vec<Value>, Option<usize>), ClientError> {
    let count = envelope
        .get("count")
        .and_then(|v| v.as_u64())
        .map(|c| c as usize);

    let items = match envelope.get(kind.item_key()) {
        None | Some(Value::Null) => Vec::new(),
        Some(Value::Array(items)) => items.clone(),
        Some(_) => {
            return Err(ClientError::Decode {
                command: kind.command().to_string(),
                reason: format!("\"{}\" is not an array", kind.item_key()),
            })
        }
    };

    Ok((items, count))
}
