//! Fetcher Registry
//!
//! Maps fetcher names to implementations. The registry is an explicit object
//! owned by the application and handed to whoever needs to resolve names;
//! it is safe to register and look up from several threads.

use super::configs::{GlobalConfigsFetcher, ZoneConfigsFetcher};
use super::fetcher::builtin_list_fetchers;
use super::networks::PhysicalNetworksFetcher;
use super::Fetcher;
use crate::error::BackupError;
use std::collections::HashMap;
use std::sync::{Arc, Mutex};

/// Built-in fetchers in execution order
///
/// `global-configs` precedes `zone-configs` so zone values override
/// global ones.
pub const DEFAULT_FETCHERS: &[&str] = &[
    "pods",
    "clusters",
    "hosts",
    "primary-storage-pools",
    "secondary-storage-pools",
    PhysicalNetworksFetcher::NAME,
    "compute-offerings",
    "disk-offerings",
    "templates",
    GlobalConfigsFetcher::NAME,
    ZoneConfigsFetcher::NAME,
];

/// Name -> fetcher map
pub struct FetcherRegistry {
    fetchers: Mutex<HashMap<String, Arc<dyn Fetcher>>>,
}

impl FetcherRegistry {
    /// Registry without any fetcher
    pub fn empty() -> Self {
        Self {
            fetchers: Mutex::new(HashMap::new()),
        }
    }

    /// Registry holding every built-in fetcher
    pub fn with_defaults() -> Self {
        let registry = Self::empty();
        for fetcher in builtin_list_fetchers() {
            registry.register(fetcher);
        }
        registry.register(PhysicalNetworksFetcher);
        registry.register(GlobalConfigsFetcher);
        registry.register(ZoneConfigsFetcher);
        registry
    }

    /// Store `fetcher` under its name, replacing any previous entry
    pub fn register<F: Fetcher + 'static>(&self, fetcher: F) {
        self.register_arc(Arc::new(fetcher));
    }

    pub fn register_arc(&self, fetcher: Arc<dyn Fetcher>) {
        let mut fetchers = self
            .fetchers
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner());
        let name = fetcher.name().to_string();
        if fetchers.insert(name.clone(), fetcher).is_some() {
            tracing::debug!("Fetcher {} re-registered", name);
        }
    }

    /// Look a fetcher up by exact name
    pub fn get(&self, name: &str) -> Option<Arc<dyn Fetcher>> {
        let fetchers = self
            .fetchers
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner());
        fetchers.get(name).cloned()
    }

    /// Names of the built-in fetchers in execution order
    pub fn default_names(&self) -> Vec<String> {
        DEFAULT_FETCHERS.iter().map(|s| s.to_string()).collect()
    }

    /// Every registered name, sorted
    pub fn names(&self) -> Vec<String> {
        let fetchers = self
            .fetchers
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner());
        let mut names: Vec<String> = fetchers.keys().cloned().collect();
        names.sort();
        names
    }

    /// Resolve `names` in order, reporting every unknown name at once
    pub fn resolve<S: AsRef<str>>(&self, names: &[S]) -> Result<Vec<Arc<dyn Fetcher>>, BackupError> {
        let mut resolved = Vec::with_capacity(names.len());
        let mut unknown = Vec::new();

        for name in names {
            let name = name.as_ref().trim();
            match self.get(name) {
                Some(fetcher) => resolved.push(fetcher),
                None => unknown.push(format!("\"{}\"", name)),
            }
        }

        if !unknown.is_empty() {
            return Err(BackupError::Config(format!(
                "no fetcher {} defined",
                unknown.join(", ")
            )));
        }
        Ok(resolved)
    }

    /// The built-in fetchers in execution order
    pub fn defaults(&self) -> Result<Vec<Arc<dyn Fetcher>>, BackupError> {
        self.resolve(DEFAULT_FETCHERS)
    }
}

impl Default for FetcherRegistry {
    fn default() -> Self {
        Self::with_defaults()
    }
}
