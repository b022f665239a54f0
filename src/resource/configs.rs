//! Configuration merge
//!
//! `global-configs` stores the unscoped configuration. `zone-configs` starts
//! from that global map and lays the zone-scoped entries over it, so the zone
//! map ends up holding every setting with zone values winning. Each override
//! is logged and reported.
//!
//! `global-configs` must therefore run before `zone-configs`; run the other
//! way round, the zone map only holds the zone-scoped entries.

use super::{decode_all, Fetcher};
use crate::cloudstack::{ClientError, ListParams, ResourceClient, ResourceKind};
use crate::definition::{Configuration, Definition};
use futures::future::BoxFuture;
use futures::FutureExt;
use std::collections::{BTreeMap, HashSet};

/// A global value replaced by a zone-scoped one
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConfigOverride {
    pub name: String,
    pub old_value: Option<String>,
    pub new_value: Option<String>,
}

/// Lay `scoped` entries over `base`
///
/// Returns the merged map and one override per name present in both. A name
/// repeated in `scoped` keeps its last value and is still one override at
/// most.
pub fn merge_configurations(
    base: &BTreeMap<String, Configuration>,
    scoped: Vec<Configuration>,
) -> (BTreeMap<String, Configuration>, Vec<ConfigOverride>) {
    let mut merged = base.clone();
    let mut overrides: Vec<ConfigOverride> = Vec::new();
    let mut seen = HashSet::new();

    for entry in scoped {
        if !seen.insert(entry.name.clone()) {
            tracing::debug!(
                "  Zone Config {} repeated, keeping {}",
                entry.name,
                entry.display_value()
            );
            if let Some(existing) = overrides.iter_mut().find(|o| o.name == entry.name) {
                existing.new_value = entry.value.clone();
            }
        } else if let Some(previous) = base.get(&entry.name) {
            tracing::info!(
                "  Overwriting Global Config {} value {} with {}",
                entry.name,
                previous.display_value(),
                entry.display_value()
            );
            overrides.push(ConfigOverride {
                name: entry.name.clone(),
                old_value: previous.value.clone(),
                new_value: entry.value.clone(),
            });
        } else {
            tracing::info!("  Setting Config {} to {}", entry.name, entry.display_value());
        }

        merged.insert(entry.name.clone(), entry);
    }

    (merged, overrides)
}

/// Fetches unscoped configuration into `GlobalConfiguration`
#[derive(Debug, Clone, Copy, Default)]
pub struct GlobalConfigsFetcher;

impl GlobalConfigsFetcher {
    pub const NAME: &'static str = "global-configs";

    async fn run(
        &self,
        client: &dyn ResourceClient,
        definition: &mut Definition,
    ) -> Result<(), ClientError> {
        tracing::info!("Fetching Global Configuration...");
        let items = client
            .list(ResourceKind::Configurations, &ListParams::default())
            .await?;
        let entries: Vec<Configuration> = decode_all(ResourceKind::Configurations, items)?;
        tracing::info!("Global Configuration fetched");

        for entry in entries {
            tracing::debug!("  {}: {}", entry.name, entry.display_value());
            definition.global_configuration.insert(entry.name.clone(), entry);
        }
        Ok(())
    }
}

impl Fetcher for GlobalConfigsFetcher {
    fn name(&self) -> &str {
        Self::NAME
    }

    fn fetch<'a>(
        &'a self,
        client: &'a dyn ResourceClient,
        definition: &'a mut Definition,
    ) -> BoxFuture<'a, Result<(), ClientError>> {
        self.run(client, definition).boxed()
    }
}

/// Fetches zone-scoped configuration and merges it over the global map
/// into `ZoneConfiguration`
#[derive(Debug, Clone, Copy, Default)]
pub struct ZoneConfigsFetcher;

impl ZoneConfigsFetcher {
    pub const NAME: &'static str = "zone-configs";

    async fn run(
        &self,
        client: &dyn ResourceClient,
        definition: &mut Definition,
    ) -> Result<(), ClientError> {
        tracing::info!("Fetching Zone-specific Configuration...");
        let items = client
            .list(
                ResourceKind::Configurations,
                &ListParams::in_zone(&definition.zone.id),
            )
            .await?;
        let entries: Vec<Configuration> = decode_all(ResourceKind::Configurations, items)?;
        tracing::info!("Zone-specific Configuration fetched");

        if definition.global_configuration.is_empty() {
            tracing::warn!("No global configuration loaded; zone configuration is not merged");
        }

        let (merged, overrides) = merge_configurations(&definition.global_configuration, entries);
        tracing::info!("{} global values overridden for this zone", overrides.len());
        definition.zone_configuration = merged;
        Ok(())
    }
}

impl Fetcher for ZoneConfigsFetcher {
    fn name(&self) -> &str {
        Self::NAME
    }

    fn fetch<'a>(
        &'a self,
        client: &'a dyn ResourceClient,
        definition: &'a mut Definition,
    ) -> BoxFuture<'a, Result<(), ClientError>> {
        self.run(client, definition).boxed()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::definition::Resource;
    use crate::resource::testing::FakeClient;
    use proptest::prelude::*;
    use serde_json::json;
    use std::collections::HashMap;

    fn entry(name: &str, value: &str) -> Configuration {
        Configuration {
            name: name.to_string(),
            value: Some(value.to_string()),
            ..Configuration::default()
        }
    }

    fn map(entries: &[(&str, &str)]) -> BTreeMap<String, Configuration> {
        entries
            .iter()
            .map(|(n, v)| (n.to_string(), entry(n, v)))
            .collect()
    }

    fn values(map: &BTreeMap<String, Configuration>) -> BTreeMap<String, String> {
        map.iter()
            .map(|(k, c)| (k.clone(), c.value.clone().unwrap_or_default()))
            .collect()
    }

    fn definition() -> Definition {
        Definition::new(Resource::from_value(json!({"id": "z1", "name": "lab"})).unwrap())
    }

    #[test]
    fn test_merge_example() {
        let global = map(&[("a", "1"), ("b", "2")]);
        let zone = vec![entry("b", "9"), entry("c", "3")];

        let (merged, overrides) = merge_configurations(&global, zone);

        assert_eq!(
            values(&merged),
            BTreeMap::from([
                ("a".to_string(), "1".to_string()),
                ("b".to_string(), "9".to_string()),
                ("c".to_string(), "3".to_string()),
            ])
        );
        assert_eq!(
            overrides,
            vec![ConfigOverride {
                name: "b".to_string(),
                old_value: Some("2".to_string()),
                new_value: Some("9".to_string()),
            }]
        );
    }

    #[test]
    fn test_merge_leaves_base_untouched() {
        let global = map(&[("a", "1")]);
        let (_, _) = merge_configurations(&global, vec![entry("a", "2")]);
        assert_eq!(global["a"].value.as_deref(), Some("1"));
    }

    #[test]
    fn test_repeated_zone_entry_is_not_a_global_override() {
        let global = map(&[("a", "1")]);
        let zone = vec![entry("b", "5"), entry("b", "6"), entry("a", "7"), entry("a", "8")];

        let (merged, overrides) = merge_configurations(&global, zone);

        assert_eq!(merged["b"].value.as_deref(), Some("6"));
        assert_eq!(merged["a"].value.as_deref(), Some("8"));
        assert_eq!(
            overrides,
            vec![ConfigOverride {
                name: "a".to_string(),
                old_value: Some("1".to_string()),
                new_value: Some("8".to_string()),
            }]
        );
    }

    #[tokio::test]
    async fn test_fetchers_merge_global_then_zone() {
        let client = FakeClient::new().respond_with(ResourceKind::Configurations, |params| {
            if params.zone_id.is_some() {
                Ok(vec![
                    json!({"name": "b", "value": "9", "scope": "zone"}),
                    json!({"name": "c", "value": "3", "scope": "zone"}),
                ])
            } else {
                Ok(vec![
                    json!({"name": "a", "value": "1", "category": "Advanced"}),
                    json!({"name": "b", "value": "2", "category": "Advanced"}),
                ])
            }
        });
        let mut def = definition();

        GlobalConfigsFetcher.fetch(&client, &mut def).await.unwrap();
        ZoneConfigsFetcher.fetch(&client, &mut def).await.unwrap();

        assert_eq!(values(&def.global_configuration).len(), 2);
        assert_eq!(def.global_configuration["b"].value.as_deref(), Some("2"));
        assert_eq!(def.zone_configuration["a"].value.as_deref(), Some("1"));
        assert_eq!(def.zone_configuration["b"].value.as_deref(), Some("9"));
        assert_eq!(def.zone_configuration["c"].value.as_deref(), Some("3"));
        assert_eq!(def.zone_configuration["b"].attributes["scope"], json!("zone"));

        let calls = client.calls();
        assert_eq!(calls[0].1, ListParams::default());
        assert_eq!(calls[1].1, ListParams::in_zone("z1"));
    }

    #[tokio::test]
    async fn test_zone_first_never_overrides() {
        let client = FakeClient::new().respond_with(ResourceKind::Configurations, |params| {
            if params.zone_id.is_some() {
                Ok(vec![json!({"name": "b", "value": "9"})])
            } else {
                Ok(vec![json!({"name": "a", "value": "1"}), json!({"name": "b", "value": "2"})])
            }
        });
        let mut def = definition();

        ZoneConfigsFetcher.fetch(&client, &mut def).await.unwrap();
        GlobalConfigsFetcher.fetch(&client, &mut def).await.unwrap();

        assert_eq!(values(&def.zone_configuration).len(), 1);
        assert!(!def.zone_configuration.contains_key("a"));
    }

    #[tokio::test]
    async fn test_null_values_survive() {
        let client = FakeClient::new().respond(
            ResourceKind::Configurations,
            vec![json!({"name": "unset.setting", "value": null})],
        );
        let mut def = definition();

        GlobalConfigsFetcher.fetch(&client, &mut def).await.unwrap();

        assert_eq!(def.global_configuration["unset.setting"].value, None);
    }

    proptest! {
        /// keys(R) = keys(G) ∪ keys(Z); Z wins on overlap; G kept elsewhere
        #[test]
        fn merged_is_union_with_zone_precedence(
            global in prop::collection::hash_map("[a-e]{1,2}", "[0-9]{1,3}", 0..12),
            zone in prop::collection::hash_map("[a-e]{1,2}", "[0-9]{1,3}", 0..12),
        ) {
            let base: BTreeMap<String, Configuration> = global
                .iter()
                .map(|(k, v)| (k.clone(), entry(k, v)))
                .collect();
            let scoped: Vec<Configuration> = zone.iter().map(|(k, v)| entry(k, v)).collect();

            let (merged, overrides) = merge_configurations(&base, scoped);
            let merged = values(&merged);

            let mut expected: HashMap<String, String> = global.clone();
            expected.extend(zone.clone());
            prop_assert_eq!(merged.len(), expected.len());
            for (k, v) in &expected {
                prop_assert_eq!(merged.get(k), Some(v));
            }

            let overlap = zone.keys().filter(|k| global.contains_key(*k)).count();
            prop_assert_eq!(overrides.len(), overlap);
        }
    }
}
