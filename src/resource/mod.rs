//! Resource fetch layer
//!
//! A [`Fetcher`] is a named unit that fills one segment of a
//! [`Definition`](crate::definition::Definition) from the management API.
//! Fetchers are looked up by name in a [`FetcherRegistry`] and run in order
//! by the [`orchestrator`](crate::orchestrator).
//!
//! # Architecture
//!
//! - [`registry`] - Name -> fetcher map and the default execution order
//! - [`fetcher`] - Single-call list fetchers (pods, hosts, offerings...)
//! - [`networks`] - Physical network -> traffic type -> network expansion
//! - [`configs`] - Global and zone-scoped configuration merge
//!
//! # Example
//!
//! ```ignore
//! use cs_zone_cloner::resource::FetcherRegistry;
//!
//! let registry = FetcherRegistry::with_defaults();
//! let fetchers = registry.resolve(&["pods", "clusters"])?;
//! ```

pub mod configs;
pub mod fetcher;
pub mod networks;
pub mod registry;

pub use configs::{merge_configurations, ConfigOverride, GlobalConfigsFetcher, ZoneConfigsFetcher};
pub use fetcher::{builtin_list_fetchers, ListFetcher};
pub use networks::{network_key, PhysicalNetworksFetcher};
pub use registry::{FetcherRegistry, DEFAULT_FETCHERS};

use crate::cloudstack::{ClientError, ResourceClient, ResourceKind};
use crate::definition::Definition;
use futures::future::BoxFuture;
use serde::de::DeserializeOwned;
use serde_json::Value;

/// A named unit of work populating one segment of a definition
///
/// A fetcher writes only the segment it owns and returns the first client
/// error it meets; it never retries.
pub trait Fetcher: Send + Sync {
    /// Stable name used for registry keys and `--fetch`
    fn name(&self) -> &str;

    fn fetch<'a>(
        &'a self,
        client: &'a dyn ResourceClient,
        definition: &'a mut Definition,
    ) -> BoxFuture<'a, Result<(), ClientError>>;
}

/// Decode raw API records into `T`
pub(crate) fn decode_all<T: DeserializeOwned>(
    kind: ResourceKind,
    items: Vec<Value>,
) -> Result<Vec<T>, ClientError> {
    items
        .into_iter()
        .map(|item| {
            serde_json::from_value(item).map_err(|e| ClientError::Decode {
                command: kind.command().to_string(),
                reason: e.to_string(),
            })
        })
        .collect()
}
