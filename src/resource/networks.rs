//! Physical network expansion
//!
//! Physical networks are the one nested segment: each physical network is
//! expanded into its traffic types, and each traffic type into the networks
//! carrying it. Every level returns either a complete composite or the first
//! error, so a failed expansion never leaves a partial entry behind.

use super::{decode_all, Fetcher};
use crate::cloudstack::{ClientError, ListParams, ResourceClient, ResourceKind};
use crate::definition::{Definition, PhysicalNetwork, Resource, TrafficType, TrafficTypeRecord};
use futures::future::BoxFuture;
use futures::FutureExt;
use std::collections::BTreeMap;

/// Map key for a network: its name, or its ID when the name is empty
pub fn network_key(network: &Resource) -> String {
    if network.name.is_empty() {
        network.id.clone()
    } else {
        network.name.clone()
    }
}

/// Fetches physical networks with their traffic types and networks
#[derive(Debug, Clone, Copy, Default)]
pub struct PhysicalNetworksFetcher;

impl PhysicalNetworksFetcher {
    pub const NAME: &'static str = "physical-networks";

    async fn run(
        &self,
        client: &dyn ResourceClient,
        definition: &mut Definition,
    ) -> Result<(), ClientError> {
        tracing::info!("Fetching Physical Networks...");
        let zone_id = definition.zone.id.clone();
        let items = client
            .list(ResourceKind::PhysicalNetworks, &ListParams::in_zone(&zone_id))
            .await?;
        let physical_networks: Vec<Resource> = decode_all(ResourceKind::PhysicalNetworks, items)?;
        tracing::info!("Physical Networks fetched");

        let mut expanded = BTreeMap::new();
        for physical_network in physical_networks {
            let name = physical_network.name.clone();
            let composite = expand_physical_network(client, &zone_id, physical_network).await?;
            expanded.insert(name, composite);
        }

        definition.physical_networks.extend(expanded);
        Ok(())
    }
}

impl Fetcher for PhysicalNetworksFetcher {
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

/// Expand one physical network into its traffic types
///
/// Traffic types are listed by physical network ID, not by zone.
pub async fn expand_physical_network(
    client: &dyn ResourceClient,
    zone_id: &str,
    physical_network: Resource,
) -> Result<PhysicalNetwork, ClientError> {
    tracing::info!("  Expanding Physical Network {}...", physical_network.name);
    let params = ListParams {
        physical_network_id: Some(physical_network.id.clone()),
        ..ListParams::default()
    };
    let items = client.list(ResourceKind::TrafficTypes, &params).await?;
    let records: Vec<TrafficTypeRecord> = decode_all(ResourceKind::TrafficTypes, items)?;
    tracing::info!(
        "  Physical Network {} Traffic Types fetched",
        physical_network.name
    );

    let mut traffic_types = BTreeMap::new();
    for record in records {
        let name = record.traffictype.clone();
        let traffic_type = expand_traffic_type(client, zone_id, record).await?;
        traffic_types.insert(name, traffic_type);
    }

    Ok(PhysicalNetwork {
        physical_network,
        traffic_types,
    })
}

/// Expand one traffic type into the networks carrying it
///
/// System networks are included so management/storage/public traffic is
/// captured alongside guest networks.
pub async fn expand_traffic_type(
    client: &dyn ResourceClient,
    zone_id: &str,
    record: TrafficTypeRecord,
) -> Result<TrafficType, ClientError> {
    tracing::info!("    Expanding Traffic Type {}...", record.traffictype);
    let params = ListParams {
        traffic_type: Some(record.traffictype.clone()),
        ..ListParams::in_zone(zone_id).with_system(true).with_list_all()
    };
    let items = client.list(ResourceKind::Networks, &params).await?;
    let networks: Vec<Resource> = decode_all(ResourceKind::Networks, items)?;
    tracing::info!("    Traffic Type {} Networks fetched", record.traffictype);

    let networks = networks
        .into_iter()
        .map(|network| {
            let key = network_key(&network);
            tracing::info!("      Network: {}", key);
            (key, network)
        })
        .collect();

    Ok(TrafficType {
        traffic_type: record,
        networks,
    })
}
