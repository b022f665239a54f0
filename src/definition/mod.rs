//! Zone definition model
//!
//! A [`Definition`] is the serializable snapshot of one zone: the zone record
//! itself plus one map per resource segment. Raw API records are kept
//! verbatim; only the key fields the pipeline needs are typed.
//!
//! - [`format`] - Named serializers turning a definition into bytes

pub mod format;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::collections::{BTreeMap, HashMap};
use uuid::Uuid;

/// A raw API record with its identifying fields pulled out
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct Resource {
    #[serde(default)]
    pub id: String,
    #[serde(default)]
    pub name: String,
    #[serde(flatten)]
    pub attributes: Map<String, Value>,
}

impl Resource {
    /// Decode an API record
    pub fn from_value(value: Value) -> Result<Self, serde_json::Error> {
        serde_json::from_value(value)
    }

    /// String attribute other than `id`/`name`
    pub fn attribute(&self, key: &str) -> Option<&str> {
        self.attributes.get(key).and_then(|v| v.as_str())
    }
}

/// A traffic type record, named by its `traffictype` field
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct TrafficTypeRecord {
    #[serde(default)]
    pub id: String,
    #[serde(default)]
    pub traffictype: String,
    #[serde(flatten)]
    pub attributes: Map<String, Value>,
}

/// A configuration entry
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct Configuration {
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub value: Option<String>,
    #[serde(flatten)]
    pub attributes: Map<String, Value>,
}

impl Configuration {
    /// Value for display, `<unset>` when the API returned none
    pub fn display_value(&self) -> &str {
        self.value.as_deref().unwrap_or("<unset>")
    }
}

/// Traffic type with the networks carrying it
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct TrafficType {
    #[serde(flatten)]
    pub traffic_type: TrafficTypeRecord,
    #[serde(rename = "Networks", default)]
    pub networks: BTreeMap<String, Resource>,
}

/// Physical network with its traffic types
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct PhysicalNetwork {
    #[serde(flatten)]
    pub physical_network: Resource,
    #[serde(rename = "TrafficTypes", default)]
    pub traffic_types: BTreeMap<String, TrafficType>,
}

/// Database connection details carried along for a later restore
///
/// Never used to connect to anything.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct DatabaseConfig {
    pub server: String,
    pub port: u16,
    pub schema: String,
    pub user: String,
    pub password: String,
}

/// Run-local metadata, ignored when comparing definitions
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct RunInfo {
    pub id: Uuid,
    pub created_at: DateTime<Utc>,
    pub tool_version: String,
}

impl RunInfo {
    pub fn new() -> Self {
        Self {
            id: Uuid::new_v4(),
            created_at: Utc::now(),
            tool_version: env!("CARGO_PKG_VERSION").to_string(),
        }
    }
}

impl Default for RunInfo {
    fn default() -> Self {
        Self::new()
    }
}

/// Snapshot of one zone's configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct Definition {
    pub zone: Resource,
    #[serde(default)]
    pub pods: BTreeMap<String, Resource>,
    #[serde(default)]
    pub clusters: BTreeMap<String, Resource>,
    #[serde(default)]
    pub hosts: BTreeMap<String, Resource>,
    #[serde(default)]
    pub primary_storage_pools: BTreeMap<String, Resource>,
    #[serde(default)]
    pub secondary_storage_pools: BTreeMap<String, Resource>,
    #[serde(default)]
    pub physical_networks: BTreeMap<String, PhysicalNetwork>,
    #[serde(default)]
    pub compute_offerings: BTreeMap<String, Resource>,
    #[serde(default)]
    pub disk_offerings: BTreeMap<String, Resource>,
    #[serde(default)]
    pub templates: BTreeMap<String, Resource>,
    #[serde(default)]
    pub global_configuration: BTreeMap<String, Configuration>,
    #[serde(default)]
    pub zone_configuration: BTreeMap<String, Configuration>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub database: Option<DatabaseConfig>,

    #[serde(default)]
    pub run: RunInfo,

    /// Free-form data for caller-defined fetchers; never serialized
    #[serde(skip)]
    pub custom: HashMap<String, Value>,
}

/// Number of entries per segment
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Summary {
    pub pods: usize,
    pub clusters: usize,
    pub hosts: usize,
    pub primary_storage_pools: usize,
    pub secondary_storage_pools: usize,
    pub physical_networks: usize,
    pub traffic_types: usize,
    pub networks: usize,
    pub compute_offerings: usize,
    pub disk_offerings: usize,
    pub templates: usize,
    pub global_configuration: usize,
    pub zone_configuration: usize,
}

impl Definition {
    /// Empty definition for `zone`
    pub fn new(zone: Resource) -> Self {
        Self {
            zone,
            pods: BTreeMap::new(),
            clusters: BTreeMap::new(),
            hosts: BTreeMap::new(),
            primary_storage_pools: BTreeMap::new(),
            secondary_storage_pools: BTreeMap::new(),
            physical_networks: BTreeMap::new(),
            compute_offerings: BTreeMap::new(),
            disk_offerings: BTreeMap::new(),
            templates: BTreeMap::new(),
            global_configuration: BTreeMap::new(),
            zone_configuration: BTreeMap::new(),
            database: None,
            run: RunInfo::new(),
            custom: HashMap::new(),
        }
    }

    pub fn summary(&self) -> Summary {
        let traffic_types = self
            .physical_networks
            .values()
            .map(|pn| pn.traffic_types.len())
            .sum();
        let networks = self
            .physical_networks
            .values()
            .flat_map(|pn| pn.traffic_types.values())
            .map(|tt| tt.networks.len())
            .sum();

        Summary {
            pods: self.pods.len(),
            clusters: self.clusters.len(),
            hosts: self.hosts.len(),
            primary_storage_pools: self.primary_storage_pools.len(),
            secondary_storage_pools: self.secondary_storage_pools.len(),
            physical_networks: self.physical_networks.len(),
            traffic_types,
            networks,
            compute_offerings: self.compute_offerings.len(),
            disk_offerings: self.disk_offerings.len(),
            templates: self.templates.len(),
            global_configuration: self.global_configuration.len(),
            zone_configuration: self.zone_configuration.len(),
        }
    }

    /// Compare everything except run-local metadata and the custom map
    pub fn same_content(&self, other: &Definition) -> bool {
        self.zone == other.zone
            && self.pods == other.pods
            && self.clusters == other.clusters
            && self.hosts == other.hosts
            && self.primary_storage_pools == other.primary_storage_pools
            && self.secondary_storage_pools == other.secondary_storage_pools
            && self.physical_networks == other.physical_networks
            && self.compute_offerings == other.compute_offerings
            && self.disk_offerings == other.disk_offerings
            && self.templates == other.templates
            && self.global_configuration == other.global_configuration
            && self.zone_configuration == other.zone_configuration
            && self.database == other.database
    }
}

impl std::fmt::Display for Summary {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "{} pods, {} clusters, {} hosts, {} primary / {} secondary storage pools, \
             {} physical networks ({} traffic types, {} networks), \
             {} compute / {} disk offerings, {} templates, \
             {} global / {} zone configuration entries",
            self.pods,
            self.clusters,
            self.hosts,
            self.primary_storage_pools,
            self.secondary_storage_pools,
            self.physical_networks,
            self.traffic_types,
            self.networks,
            self.compute_offerings,
            self.disk_offerings,
            self.templates,
            self.global_configuration,
            self.zone_configuration
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn zone() -> Resource {
        Resource::from_value(json!({"id": "z1", "name": "lab", "networktype": "Advanced"}))
            .unwrap()
    }

    fn populated() -> Definition {
        let mut def = Definition::new(zone());
        def.pods.insert(
            "pod-a".to_string(),
            Resource::from_value(json!({"id": "p1", "name": "pod-a", "gateway": "10.0.0.1"}))
                .unwrap(),
        );

        let mut tt = TrafficType {
            traffic_type: serde_json::from_value(
                json!({"id": "tt1", "traffictype": "Guest", "kvmnetworklabel": "cloudbr0"}),
            )
            .unwrap(),
            networks: BTreeMap::new(),
        };
        tt.networks.insert(
            "id1".to_string(),
            Resource::from_value(json!({"id": "id1", "name": ""})).unwrap(),
        );
        let mut pn = PhysicalNetwork {
            physical_network: Resource::from_value(
                json!({"id": "pn1", "name": "pnet1", "state": "Enabled"}),
            )
            .unwrap(),
            traffic_types: BTreeMap::new(),
        };
        pn.traffic_types.insert("Guest".to_string(), tt);
        def.physical_networks.insert("pnet1".to_string(), pn);

        def.zone_configuration.insert(
            "a".to_string(),
            serde_json::from_value(json!({"name": "a", "value": "1", "category": "Advanced"}))
                .unwrap(),
        );
        def.database = Some(DatabaseConfig {
            server: "localhost".to_string(),
            port: 3306,
            ..DatabaseConfig::default()
        });
        def
    }

    #[test]
    fn test_new_definition_is_empty() {
        let def = Definition::new(zone());
        assert_eq!(def.summary(), Summary::default());
        assert_eq!(def.zone.name, "lab");
    }

    #[test]
    fn test_raw_attributes_survive_round_trip() {
        let def = populated();
        let text = serde_json::to_string(&def).unwrap();
        let parsed: Definition = serde_json::from_str(&text).unwrap();

        assert!(def.same_content(&parsed));
        assert_eq!(parsed.run, def.run);
        assert_eq!(parsed.pods["pod-a"].attribute("gateway"), Some("10.0.0.1"));
        let guest = &parsed.physical_networks["pnet1"].traffic_types["Guest"];
        assert_eq!(
            guest.traffic_type.attributes["kvmnetworklabel"],
            json!("cloudbr0")
        );
        assert!(guest.networks.contains_key("id1"));
    }

    #[test]
    fn test_serialized_field_names() {
        let value = serde_json::to_value(populated()).unwrap();
        assert!(value.get("Zone").is_some());
        assert!(value.get("PhysicalNetworks").is_some());
        assert!(value.get("Custom").is_none());
        assert_eq!(value["Database"]["Port"], json!(3306));

        let pnet = &value["PhysicalNetworks"]["pnet1"];
        assert_eq!(pnet["state"], json!("Enabled"));
        assert_eq!(pnet["TrafficTypes"]["Guest"]["traffictype"], json!("Guest"));
    }

    #[test]
    fn test_database_omitted_when_absent() {
        let value = serde_json::to_value(Definition::new(zone())).unwrap();
        assert!(value.get("Database").is_none());
    }

    #[test]
    fn test_custom_is_not_serialized() {
        let mut def = Definition::new(zone());
        def.custom.insert("extra".to_string(), json!({"k": "v"}));
        let text = serde_json::to_string(&def).unwrap();
        assert!(!text.contains("extra"));
    }

    #[test]
    fn test_same_content_ignores_run_info() {
        let a = populated();
        let mut b = populated();
        b.run = RunInfo::new();
        assert_ne!(a.run.id, b.run.id);
        assert!(a.same_content(&b));
    }

    #[test]
    fn test_summary_counts_nested_networks() {
        let summary = populated().summary();
        assert_eq!(summary.physical_networks, 1);
        assert_eq!(summary.traffic_types, 1);
        assert_eq!(summary.networks, 1);
        assert_eq!(summary.zone_configuration, 1);
    }
}
