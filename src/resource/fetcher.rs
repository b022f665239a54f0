//! List Fetchers
//!
//! Most segments of a definition come from a single list call scoped to the
//! zone, keyed by the record's `name`. [`ListFetcher`] describes such a call
//! as data; [`builtin_list_fetchers`] returns the built-in set.

use super::{decode_all, Fetcher};
use crate::cloudstack::{ClientError, ListParams, ResourceClient, ResourceKind};
use crate::definition::{Definition, Resource};
use futures::future::BoxFuture;
use futures::FutureExt;
use std::collections::BTreeMap;

type Segment = fn(&mut Definition) -> &mut BTreeMap<String, Resource>;
type Scope = fn(&Resource) -> ListParams;

/// Fetcher for one resource kind listed in a single call
///
/// Records with the same name overwrite each other; only networks fall
/// back to their ID.
#[derive(Clone)]
pub struct ListFetcher {
    name: &'static str,
    label: &'static str,
    item_label: &'static str,
    kind: ResourceKind,
    scope: Scope,
    segment: Segment,
}

impl ListFetcher {
    pub fn kind(&self) -> ResourceKind {
        self.kind
    }

    async fn run(
        &self,
        client: &dyn ResourceClient,
        definition: &mut Definition,
    ) -> Result<(), ClientError> {
        tracing::info!("Fetching {}...", self.label);
        let params = (self.scope)(&definition.zone);
        let items = client.list(self.kind, &params).await?;
        let records: Vec<Resource> = decode_all(self.kind, items)?;
        tracing::info!("{} fetched", self.label);

        let segment = (self.segment)(definition);
        for record in records {
            tracing::info!("  {}: {}", self.item_label, record.name);
            if let Some(previous) = segment.insert(record.name.clone(), record) {
                tracing::debug!(
                    "  {} {} (id {}) replaced by a record with the same name",
                    self.item_label,
                    previous.name,
                    previous.id
                );
            }
        }
        Ok(())
    }
}

impl Fetcher for ListFetcher {
    fn name(&self) -> &str {
        self.name
    }

    fn fetch<'a>(
        &'a self,
        client: &'a dyn ResourceClient,
        definition: &'a mut Definition,
    ) -> BoxFuture<'a, Result<(), ClientError>> {
        self.run(client, definition).boxed()
    }
}

fn zone_scope(zone: &Resource) -> ListParams {
    ListParams::in_zone(&zone.id)
}

fn compute_offering_scope(zone: &Resource) -> ListParams {
    ListParams::in_zone(&zone.id)
        .with_recursive()
        .with_list_all()
        .with_system(false)
}

fn disk_offering_scope(zone: &Resource) -> ListParams {
    ListParams::in_zone(&zone.id).with_recursive().with_list_all()
}

fn template_scope(zone: &Resource) -> ListParams {
    ListParams {
        template_filter: Some("all".to_string()),
        ..ListParams::in_zone(&zone.id).with_recursive().with_list_all()
    }
}

fn pods(d: &mut Definition) -> &mut BTreeMap<String, Resource> {
    &mut d.pods
}

fn clusters(d: &mut Definition) -> &mut BTreeMap<String, Resource> {
    &mut d.clusters
}

fn hosts(d: &mut Definition) -> &mut BTreeMap<String, Resource> {
    &mut d.hosts
}

fn primary_storage_pools(d: &mut Definition) -> &mut BTreeMap<String, Resource> {
    &mut d.primary_storage_pools
}

fn secondary_storage_pools(d: &mut Definition) -> &mut BTreeMap<String, Resource> {
    &mut d.secondary_storage_pools
}

fn compute_offerings(d: &mut Definition) -> &mut BTreeMap<String, Resource> {
    &mut d.compute_offerings
}

fn disk_offerings(d: &mut Definition) -> &mut BTreeMap<String, Resource> {
    &mut d.disk_offerings
}

fn templates(d: &mut Definition) -> &mut BTreeMap<String, Resource> {
    &mut d.templates
}

/// Built-in single-call fetchers
pub fn builtin_list_fetchers() -> Vec<ListFetcher> {
    vec![
        ListFetcher {
            name: "pods",
            label: "Pods",
            item_label: "Pod",
            kind: ResourceKind::Pods,
            scope: zone_scope,
            segment: pods,
        },
        ListFetcher {
            name: "clusters",
            label: "Clusters",
            item_label: "Cluster",
            kind: ResourceKind::Clusters,
            scope: zone_scope,
            segment: clusters,
        },
        ListFetcher {
            name: "hosts",
            label: "Hosts",
            item_label: "Host",
            kind: ResourceKind::Hosts,
            scope: zone_scope,
            segment: hosts,
        },
        ListFetcher {
            name: "primary-storage-pools",
            label: "Primary Storage Pools",
            item_label: "Pool",
            kind: ResourceKind::StoragePools,
            scope: zone_scope,
            segment: primary_storage_pools,
        },
        ListFetcher {
            name: "secondary-storage-pools",
            label: "Secondary (Image) Storage Pools",
            item_label: "Pool",
            kind: ResourceKind::ImageStores,
            scope: zone_scope,
            segment: secondary_storage_pools,
        },
        ListFetcher {
            name: "compute-offerings",
            label: "Compute Offerings",
            item_label: "Offering",
            kind: ResourceKind::ServiceOfferings,
            scope: compute_offering_scope,
            segment: compute_offerings,
        },
        ListFetcher {
            name: "disk-offerings",
            label: "Disk Offerings",
            item_label: "Offering",
            kind: ResourceKind::DiskOfferings,
            scope: disk_offering_scope,
            segment: disk_offerings,
        },
        ListFetcher {
            name: "templates",
            label: "Templates",
            item_label: "Template",
            kind: ResourceKind::Templates,
            scope: template_scope,
            segment: templates,
        },
    ]
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::resource::testing::FakeClient;
    use serde_json::json;

    fn definition() -> Definition {
        Definition::new(Resource::from_value(json!({"id": "z1", "name": "lab"})).unwrap())
    }

    fn fetcher(name: &str) -> ListFetcher {
        builtin_list_fetchers()
            .into_iter()
            .find(|f| f.name() == name)
            .unwrap()
    }

    #[tokio::test]
    async fn test_pods_keyed_by_name() {
        let client = FakeClient::new().respond(
            ResourceKind::Pods,
            vec![
                json!({"id": "p1", "name": "pod-a"}),
                json!({"id": "p2", "name": "pod-b"}),
            ],
        );
        let mut def = definition();

        fetcher("pods").fetch(&client, &mut def).await.unwrap();

        assert_eq!(def.pods.len(), 2);
        assert_eq!(def.pods["pod-b"].id, "p2");
        assert_eq!(client.calls()[0].1, ListParams::in_zone("z1"));
    }

    #[tokio::test]
    async fn test_duplicate_names_last_wins() {
        let client = FakeClient::new().respond(
            ResourceKind::Hosts,
            vec![
                json!({"id": "h1", "name": "dup"}),
                json!({"id": "h2", "name": "dup"}),
            ],
        );
        let mut def = definition();

        fetcher("hosts").fetch(&client, &mut def).await.unwrap();

        assert_eq!(def.hosts.len(), 1);
        assert_eq!(def.hosts["dup"].id, "h2");
    }

    #[tokio::test]
    async fn test_fetcher_only_touches_its_segment() {
        let client = FakeClient::new()
            .respond(ResourceKind::Clusters, vec![json!({"id": "c1", "name": "c"})]);
        let mut def = definition();

        fetcher("clusters").fetch(&client, &mut def).await.unwrap();

        let summary = def.summary();
        assert_eq!(summary.clusters, 1);
        assert_eq!(summary.pods, 0);
        assert_eq!(summary.hosts, 0);
    }

    #[tokio::test]
    async fn test_error_propagates_without_writes() {
        let client = FakeClient::new().fail(ResourceKind::Templates, "boom");
        let mut def = definition();

        let err = fetcher("templates").fetch(&client, &mut def).await.unwrap_err();

        assert!(matches!(err, ClientError::Api { .. }));
        assert!(def.templates.is_empty());
    }

    #[tokio::test]
    async fn test_offering_scopes() {
        let client = FakeClient::new();
        let mut def = definition();

        fetcher("compute-offerings")
            .fetch(&client, &mut def)
            .await
            .unwrap();
        fetcher("disk-offerings")
            .fetch(&client, &mut def)
            .await
            .unwrap();

        let calls = client.calls();
        let compute = &calls[0].1;
        assert_eq!(compute.is_system, Some(false));
        assert_eq!(compute.is_recursive, Some(true));
        assert_eq!(compute.list_all, Some(true));

        let disk = &calls[1].1;
        assert_eq!(disk.is_system, None);
        assert_eq!(disk.is_recursive, Some(true));
        assert_eq!(disk.list_all, Some(true));
    }

    #[tokio::test]
    async fn test_templates_use_all_filter() {
        let client = FakeClient::new();
        let mut def = definition();

        fetcher("templates").fetch(&client, &mut def).await.unwrap();

        assert_eq!(
            client.calls()[0].1.template_filter.as_deref(),
            Some("all")
        );
    }

    #[tokio::test]
    async fn test_undecodable_record_is_decode_error() {
        let client = FakeClient::new().respond(ResourceKind::Pods, vec![json!("not an object")]);
        let mut def = definition();

        let err = fetcher("pods").fetch(&client, &mut def).await.unwrap_err();
        assert!(matches!(err, ClientError::Decode { .. }));
    }
}
