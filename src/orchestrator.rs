//! Fetch Orchestrator
//!
//! Resolves the target zone, then runs an ordered list of fetchers against a
//! fresh [`Definition`]. The first failure stops the run and the partial
//! definition is dropped; callers only ever see a complete definition.
//!
//! ```text
//! Idle -> ResolvingZone -> Fetching(0) -> ... -> Fetching(n-1) -> Done
//!            \________________\____________________\-----------> Failed
//! ```

use crate::cloudstack::{ClientError, ResourceClient};
use crate::config::{BuildConfig, ZoneSelector};
use crate::definition::{Definition, Resource};
use crate::error::BackupError;
use crate::resource::Fetcher;
use std::fmt;
use std::sync::Arc;

/// Where a build currently is
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BuildState {
    Idle,
    ResolvingZone,
    Fetching { index: usize, fetcher: String },
    Done,
    Failed,
}

impl fmt::Display for BuildState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Idle => write!(f, "idle"),
            Self::ResolvingZone => write!(f, "resolving zone"),
            Self::Fetching { index, fetcher } => write!(f, "fetching #{} ({})", index, fetcher),
            Self::Done => write!(f, "done"),
            Self::Failed => write!(f, "failed"),
        }
    }
}

/// Drives one backup run against a resource client
pub struct Orchestrator<'c> {
    client: &'c dyn ResourceClient,
    fetchers: Vec<Arc<dyn Fetcher>>,
    state: BuildState,
}

impl<'c> Orchestrator<'c> {
    pub fn new(client: &'c dyn ResourceClient, fetchers: Vec<Arc<dyn Fetcher>>) -> Self {
        Self {
            client,
            fetchers,
            state: BuildState::Idle,
        }
    }

    pub fn state(&self) -> &BuildState {
        &self.state
    }

    fn transition(&mut self, next: BuildState) {
        tracing::debug!("Build state: {} -> {}", self.state, next);
        self.state = next;
    }

    /// Build a definition; the orchestrator is single-use
    pub async fn build(&mut self, config: &BuildConfig) -> Result<Definition, BackupError> {
        if self.state != BuildState::Idle {
            return Err(BackupError::Config(format!(
                "orchestrator already used (state: {})",
                self.state
            )));
        }

        let result = self.run(config).await;
        match &result {
            Ok(_) => self.transition(BuildState::Done),
            Err(e) => {
                tracing::error!("Build failed during {}: {}", self.state, e);
                self.transition(BuildState::Failed);
            }
        }
        result
    }

    async fn run(&mut self, config: &BuildConfig) -> Result<Definition, BackupError> {
        let selector = config.validate()?;

        self.transition(BuildState::ResolvingZone);
        let zone = resolve_zone(self.client, &selector).await?;
        tracing::info!("Zone found");
        tracing::info!("  ID: {}", zone.id);
        tracing::info!("  Name: {}", zone.name);
        if let Some(description) = zone.attribute("description") {
            tracing::info!("  Description: {}", description);
        }

        let mut definition = Definition::new(zone);

        let fetchers = self.fetchers.clone();
        for (index, fetcher) in fetchers.iter().enumerate() {
            let name = fetcher.name().to_string();
            self.transition(BuildState::Fetching {
                index,
                fetcher: name.clone(),
            });

            // On error the partially built definition is dropped here
            fetcher
                .fetch(self.client, &mut definition)
                .await
                .map_err(|source| BackupError::Fetch {
                    fetcher: name,
                    source,
                })?;
        }

        if let Some(database) = &config.database {
            definition.database = Some(database.clone());
        }

        tracing::info!("Definition built: {}", definition.summary());
        Ok(definition)
    }
}

/// Build a definition with `fetchers` in order
pub async fn build_definition(
    config: &BuildConfig,
    client: &dyn ResourceClient,
    fetchers: Vec<Arc<dyn Fetcher>>,
) -> Result<Definition, BackupError> {
    Orchestrator::new(client, fetchers).build(config).await
}

/// Find exactly one zone for `selector`
pub async fn resolve_zone(
    client: &dyn ResourceClient,
    selector: &ZoneSelector,
) -> Result<Resource, BackupError> {
    tracing::info!("Attempting to fetch zone {}", selector);

    let lookup = match selector {
        ZoneSelector::Id(id) => client.get_zone_by_id(id).await,
        ZoneSelector::Name(name) => client.get_zone_by_name(name).await,
    };
    let (zone, count) = lookup.map_err(|source| BackupError::ZoneLookup {
        selector: selector.to_string(),
        source,
    })?;

    match (zone, count) {
        (Some(zone), 1) => Resource::from_value(zone).map_err(|e| BackupError::ZoneLookup {
            selector: selector.to_string(),
            source: ClientError::Decode {
                command: "listZones".to_string(),
                reason: e.to_string(),
            },
        }),
        (_, 0) | (None, _) => Err(BackupError::ZoneNotFound(selector.to_string())),
        (Some(_), count) => Err(BackupError::ZoneAmbiguous {
            selector: selector.to_string(),
            count,
        }),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cloudstack::{ListParams, ResourceKind};
    use crate::config::ConnectionConfig;
    use crate::definition::DatabaseConfig;
    use crate::resource::testing::FakeClient;
    use crate::resource::FetcherRegistry;
    use futures::future::BoxFuture;
    use futures::FutureExt;
    use serde_json::json;
    use std::sync::Mutex;

    /// Records its name in a shared log, optionally failing
    struct Recorder {
        name: &'static str,
        fail: bool,
        log: Arc<Mutex<Vec<&'static str>>>,
    }

    impl Fetcher for Recorder {
        fn name(&self) -> &str {
            self.name
        }

        fn fetch<'a>(
            &'a self,
            _client: &'a dyn ResourceClient,
            definition: &'a mut Definition,
        ) -> BoxFuture<'a, Result<(), ClientError>> {
            self.log.lock().unwrap().push(self.name);
            definition
                .custom
                .insert(self.name.to_string(), json!(true));
            let result = if self.fail {
                Err(ClientError::Api {
                    status: 500,
                    code: 530,
                    text: format!("{} exploded", self.name),
                })
            } else {
                Ok(())
            };
            async move { result }.boxed()
        }
    }

    fn recorders(
        setup: &[(&'static str, bool)],
    ) -> (Vec<Arc<dyn Fetcher>>, Arc<Mutex<Vec<&'static str>>>) {
        let log = Arc::new(Mutex::new(Vec::new()));
        let fetchers = setup
            .iter()
            .map(|(name, fail)| {
                Arc::new(Recorder {
                    name: *name,
                    fail: *fail,
                    log: Arc::clone(&log),
                }) as Arc<dyn Fetcher>
            })
            .collect();
        (fetchers, log)
    }

    fn config_by_id(id: &str) -> BuildConfig {
        BuildConfig {
            connection: ConnectionConfig {
                key: "key".to_string(),
                secret: "secret".to_string(),
                ..ConnectionConfig::default()
            },
            zone_id: Some(id.to_string()),
            ..BuildConfig::default()
        }
    }

    fn zone_client() -> FakeClient {
        FakeClient::new().respond_with(ResourceKind::Zones, |params: &ListParams| {
            let zone = json!({"id": "z1", "name": "lab", "description": "Lab zone"});
            match (params.id.as_deref(), params.name.as_deref()) {
                (Some("z1"), _) | (_, Some("lab")) => Ok(vec![zone]),
                (_, Some("dup")) => Ok(vec![
                    json!({"id": "z2", "name": "dup"}),
                    json!({"id": "z3", "name": "dup"}),
                ]),
                _ => Ok(vec![]),
            }
        })
    }

    #[tokio::test]
    async fn test_fetchers_run_in_order() {
        let client = zone_client();
        let (fetchers, log) = recorders(&[("c", false), ("a", false), ("b", false)]);

        let mut orchestrator = Orchestrator::new(&client, fetchers);
        let def = orchestrator.build(&config_by_id("z1")).await.unwrap();

        assert_eq!(*log.lock().unwrap(), vec!["c", "a", "b"]);
        assert_eq!(orchestrator.state(), &BuildState::Done);
        assert_eq!(def.zone.id, "z1");
        assert_eq!(def.custom.len(), 3);
    }

    #[tokio::test]
    async fn test_first_failure_stops_the_run() {
        let client = zone_client();
        let (fetchers, log) = recorders(&[("pods", false), ("clusters", true), ("hosts", false)]);

        let mut orchestrator = Orchestrator::new(&client, fetchers);
        let err = orchestrator.build(&config_by_id("z1")).await.unwrap_err();

        assert_eq!(err.fetcher(), Some("clusters"));
        assert!(err.to_string().contains("clusters exploded"));
        assert_eq!(*log.lock().unwrap(), vec!["pods", "clusters"]);
        assert_eq!(orchestrator.state(), &BuildState::Failed);
    }

    #[tokio::test]
    async fn test_invalid_config_makes_no_calls() {
        let client = zone_client();
        let (fetchers, log) = recorders(&[("pods", false)]);
        let mut config = config_by_id("z1");
        config.connection.secret.clear();

        let err = build_definition(&config, &client, fetchers).await.unwrap_err();

        assert!(matches!(err, BackupError::Config(_)));
        assert!(client.calls().is_empty());
        assert!(log.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_zone_not_found_runs_nothing() {
        let client = zone_client();
        let (fetchers, log) = recorders(&[("pods", false)]);
        let config = BuildConfig {
            zone_id: None,
            zone_name: Some("missing".to_string()),
            ..config_by_id("unused")
        };

        let err = build_definition(&config, &client, fetchers).await.unwrap_err();

        assert_eq!(err.to_string(), "zone missing not found");
        assert!(log.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_ambiguous_zone_name() {
        let client = zone_client();
        let err = resolve_zone(&client, &ZoneSelector::Name("dup".to_string()))
            .await
            .unwrap_err();
        assert!(matches!(err, BackupError::ZoneAmbiguous { count: 2, .. }));
    }

    #[tokio::test]
    async fn test_zone_lookup_failure() {
        let client = FakeClient::new().fail(ResourceKind::Zones, "unauthorized");
        let err = resolve_zone(&client, &ZoneSelector::Id("z1".to_string()))
            .await
            .unwrap_err();
        assert!(matches!(err, BackupError::ZoneLookup { .. }));
    }

    #[tokio::test]
    async fn test_database_attached_on_success() {
        let client = zone_client();
        let mut config = config_by_id("z1");
        config.database = Some(DatabaseConfig {
            server: "db.local".to_string(),
            port: 3306,
            schema: "cloud".to_string(),
            user: "cloud".to_string(),
            password: "secret".to_string(),
        });

        let def = build_definition(&config, &client, Vec::new()).await.unwrap();

        assert_eq!(def.database, config.database);
    }

    #[tokio::test]
    async fn test_orchestrator_is_single_use() {
        let client = zone_client();
        let mut orchestrator = Orchestrator::new(&client, Vec::new());
        orchestrator.build(&config_by_id("z1")).await.unwrap();

        let err = orchestrator.build(&config_by_id("z1")).await.unwrap_err();
        assert!(matches!(err, BackupError::Config(_)));
    }

    #[tokio::test]
    async fn test_id_and_name_give_same_content() {
        let client = zone_client();
        let registry = FetcherRegistry::with_defaults();

        let by_id = build_definition(&config_by_id("z1"), &client, registry.defaults().unwrap())
            .await
            .unwrap();
        let by_name_config = BuildConfig {
            zone_id: None,
            zone_name: Some("lab".to_string()),
            ..config_by_id("unused")
        };
        let by_name = build_definition(&by_name_config, &client, registry.defaults().unwrap())
            .await
            .unwrap();

        assert!(by_id.same_content(&by_name));
        assert_ne!(by_id.run.id, by_name.run.id);
    }
}
