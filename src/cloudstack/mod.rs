//! CloudStack API interaction module
//!
//! The core only talks to the management server through the
//! [`ResourceClient`] capability: one `list` operation per resource kind,
//! scoped by the parameters in [`ListParams`]. [`client::CloudStackClient`]
//! is the HTTP implementation used by the binary; tests substitute fakes.
//!
//! # Module Structure
//!
//! - [`auth`] - API key/secret holder and request signing
//! - [`client`] - `ResourceClient` implementation with pagination
//! - [`http`] - HTTP utilities for signed GET calls
//!
//! # Example
//!
//! ```ignore
//! use cs_zone_cloner::cloudstack::{ListParams, ResourceClient, ResourceKind};
//!
//! async fn pods(client: &dyn ResourceClient, zone_id: &str) -> Result<usize, ClientError> {
//!     let items = client.list(ResourceKind::Pods, &ListParams::in_zone(zone_id)).await?;
//!     Ok(items.len())
//! }
//! ```

pub mod auth;
pub mod client;
pub mod http;

use futures::future::BoxFuture;
use futures::FutureExt;
use serde_json::Value;
use std::fmt;

/// Errors surfaced by a [`ResourceClient`]
#[derive(Debug, thiserror::Error)]
pub enum ClientError {
    /// The request never produced a response (connect, TLS, timeout...)
    #[error("request failed: {0}")]
    Http(#[from] reqwest::Error),

    /// The management server answered with an error
    #[error("API error {status} ({code}): {text}")]
    Api {
        status: u16,
        code: i64,
        text: String,
    },

    /// The response body was not what the command promises
    #[error("unexpected response to {command}: {reason}")]
    Decode { command: String, reason: String },

    /// Client could not be constructed from its configuration
    #[error("invalid client configuration: {0}")]
    Setup(String),
}

/// Resource kinds the core knows how to list
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ResourceKind {
    Zones,
    Pods,
    Clusters,
    Hosts,
    StoragePools,
    ImageStores,
    PhysicalNetworks,
    TrafficTypes,
    Networks,
    ServiceOfferings,
    DiskOfferings,
    Templates,
    Configurations,
}

impl ResourceKind {
    /// API command that lists this kind
    pub fn command(self) -> &'static str {
        match self {
            Self::Zones => "listZones",
            Self::Pods => "listPods",
            Self::Clusters => "listClusters",
            Self::Hosts => "listHosts",
            Self::StoragePools => "listStoragePools",
            Self::ImageStores => "listImageStores",
            Self::PhysicalNetworks => "listPhysicalNetworks",
            Self::TrafficTypes => "listTrafficTypes",
            Self::Networks => "listNetworks",
            Self::ServiceOfferings => "listServiceOfferings",
            Self::DiskOfferings => "listDiskOfferings",
            Self::Templates => "listTemplates",
            Self::Configurations => "listConfigurations",
        }
    }

    /// Key of the item array inside the command's response object
    pub fn item_key(self) -> &'static str {
        match self {
            Self::Zones => "zone",
            Self::Pods => "pod",
            Self::Clusters => "cluster",
            Self::Hosts => "host",
            Self::StoragePools => "storagepool",
            Self::ImageStores => "imagestore",
            Self::PhysicalNetworks => "physicalnetwork",
            Self::TrafficTypes => "traffictype",
            Self::Networks => "network",
            Self::ServiceOfferings => "serviceoffering",
            Self::DiskOfferings => "diskoffering",
            Self::Templates => "template",
            Self::Configurations => "configuration",
        }
    }

    /// Key of the response envelope, e.g. `listpodsresponse`
    pub fn response_key(self) -> String {
        format!("{}response", self.command().to_lowercase())
    }
}

impl fmt::Display for ResourceKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.command())
    }
}

/// Scoping parameters for a list call
///
/// Unset fields are not sent.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ListParams {
    pub zone_id: Option<String>,
    pub id: Option<String>,
    pub name: Option<String>,
    pub physical_network_id: Option<String>,
    pub traffic_type: Option<String>,
    pub template_filter: Option<String>,
    pub is_system: Option<bool>,
    pub is_recursive: Option<bool>,
    pub list_all: Option<bool>,
}

impl ListParams {
    /// Params scoped to a single zone
    pub fn in_zone(zone_id: &str) -> Self {
        Self {
            zone_id: Some(zone_id.to_string()),
            ..Self::default()
        }
    }

    pub fn with_recursive(mut self) -> Self {
        self.is_recursive = Some(true);
        self
    }

    pub fn with_list_all(mut self) -> Self {
        self.list_all = Some(true);
        self
    }

    pub fn with_system(mut self, is_system: bool) -> Self {
        self.is_system = Some(is_system);
        self
    }

    /// Flatten into API query pairs (without command/credentials)
    pub fn to_query(&self) -> Vec<(String, String)> {
        let mut pairs = Vec::new();
        let mut push = |key: &str, value: Option<String>| {
            if let Some(value) = value {
                pairs.push((key.to_string(), value));
            }
        };

        push("zoneid", self.zone_id.clone());
        push("id", self.id.clone());
        push("name", self.name.clone());
        push("physicalnetworkid", self.physical_network_id.clone());
        push("traffictype", self.traffic_type.clone());
        push("templatefilter", self.template_filter.clone());
        push("issystem", self.is_system.map(|b| b.to_string()));
        push("isrecursive", self.is_recursive.map(|b| b.to_string()));
        push("listall", self.list_all.map(|b| b.to_string()));

        pairs
    }
}

/// The capability the fetch pipeline needs from the management API
///
/// Implementations own transport concerns (signing, retries, pagination,
/// timeouts). Any error is treated as fatal by the caller.
pub trait ResourceClient: Send + Sync {
    /// List every record of `kind` matching `params`, in server order
    fn list<'a>(
        &'a self,
        kind: ResourceKind,
        params: &'a ListParams,
    ) -> BoxFuture<'a, Result<Vec<Value>, ClientError>>;

    /// Look a zone up by ID, returning it with the number of matches
    fn get_zone_by_id<'a>(
        &'a self,
        id: &'a str,
    ) -> BoxFuture<'a, Result<(Option<Value>, usize), ClientError>> {
        async move {
            let params = ListParams {
                id: Some(id.to_string()),
                ..ListParams::default()
            };
            let zones = self.list(ResourceKind::Zones, &params).await?;
            Ok(first_with_count(zones))
        }
        .boxed()
    }

    /// Look a zone up by exact name, returning it with the number of matches
    fn get_zone_by_name<'a>(
        &'a self,
        name: &'a str,
    ) -> BoxFuture<'a, Result<(Option<Value>, usize), ClientError>> {
        async move {
            let params = ListParams {
                name: Some(name.to_string()),
                ..ListParams::default()
            };
            let zones = self.list(ResourceKind::Zones, &params).await?;
            // listZones matches names loosely on some versions
            let exact: Vec<Value> = zones
                .into_iter()
                .filter(|z| z.get("name").and_then(|v| v.as_str()) == Some(name))
                .collect();
            Ok(first_with_count(exact))
        }
        .boxed()
    }
}

fn first_with_count(mut items: Vec<Value>) -> (Option<Value>, usize) {
    let count = items.len();
    if count == 0 {
        (None, 0)
    } else {
        (Some(items.swap_remove(0)), count)
    }
}
