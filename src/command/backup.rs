//! `backup` subcommand
//!
//! Validates every flag before the first request, builds the definition,
//! formats it and writes it to `--output` or stdout. When the document goes
//! to stdout the log sink is muted so the two never mix; it is unmuted again
//! as soon as anything fails.

use super::{AppContext, ConnectionArgs};
use crate::cloudstack::client::CloudStackClient;
use crate::cloudstack::ResourceClient;
use crate::config::{BuildConfig, DomainSelector, DEFAULT_DB_PORT, DEFAULT_DB_SERVER};
use crate::definition::format::{FormatterRegistry, DEFAULT_FORMAT};
use crate::definition::DatabaseConfig;
use crate::error::BackupError;
use crate::orchestrator::build_definition;
use crate::resource::Fetcher;
use clap::Args;
use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::Arc;

#[derive(Debug, Clone, Args)]
pub struct BackupArgs {
    #[command(flatten)]
    pub connection: ConnectionArgs,

    /// ID of the zone to back up
    #[arg(long)]
    pub zone_id: Option<String>,

    /// Name of the zone to back up
    #[arg(long)]
    pub zone_name: Option<String>,

    /// Restrict to one domain by ID (accepted, not applied yet)
    #[arg(long)]
    pub domain_id: Option<String>,

    /// Restrict to one domain by name (accepted, not applied yet)
    #[arg(long)]
    pub domain_name: Option<String>,

    /// Output format
    #[arg(long, default_value = DEFAULT_FORMAT)]
    pub format: String,

    /// Output file; stdout when omitted
    #[arg(short, long)]
    pub output: Option<PathBuf>,

    /// Database server recorded in the definition [default: localhost]
    #[arg(long)]
    pub db_server: Option<String>,

    /// Database port recorded in the definition [default: 3306]
    #[arg(long)]
    pub db_port: Option<u16>,

    /// Database schema recorded in the definition
    #[arg(long)]
    pub db_schema: Option<String>,

    /// Database user recorded in the definition
    #[arg(long)]
    pub db_user: Option<String>,

    /// Database password recorded in the definition
    #[arg(long)]
    pub db_password: Option<String>,

    /// Comma-separated fetchers to run, in order [default: all built-ins]
    #[arg(long, value_delimiter = ',')]
    pub fetch: Vec<String>,
}

impl BackupArgs {
    /// Database metadata, when any `--db-*` flag was given
    pub fn database(&self) -> Option<DatabaseConfig> {
        let supplied = self.db_server.is_some()
            || self.db_port.is_some()
            || self.db_schema.is_some()
            || self.db_user.is_some()
            || self.db_password.is_some();
        if !supplied {
            return None;
        }
        Some(DatabaseConfig {
            server: self
                .db_server
                .clone()
                .unwrap_or_else(|| DEFAULT_DB_SERVER.to_string()),
            port: self.db_port.unwrap_or(DEFAULT_DB_PORT),
            schema: self.db_schema.clone().unwrap_or_default(),
            user: self.db_user.clone().unwrap_or_default(),
            password: self.db_password.clone().unwrap_or_default(),
        })
    }

    /// Fetcher names to run; the built-in order when `--fetch` is absent
    pub fn fetcher_names(&self, ctx: &AppContext) -> Vec<String> {
        let names: Vec<String> = self
            .fetch
            .iter()
            .map(|s| s.trim().to_string())
            .filter(|s| !s.is_empty())
            .collect();
        if names.is_empty() {
            ctx.fetchers.default_names()
        } else {
            names
        }
    }

    /// Check everything that can be checked offline
    pub fn plan(&self, ctx: &AppContext) -> Result<BackupPlan, BackupError> {
        let config = BuildConfig {
            connection: self.connection.resolve(&ctx.settings),
            zone_id: self.zone_id.clone(),
            zone_name: self.zone_name.clone(),
            database: self.database(),
        };
        config.validate()?;

        let domain =
            DomainSelector::from_options(self.domain_id.as_deref(), self.domain_name.as_deref())?;
        if domain != DomainSelector::All {
            tracing::warn!("Domain filtering is not supported yet; every domain is backed up");
        }

        let fetchers = ctx.fetchers.resolve(&self.fetcher_names(ctx))?;

        Ok(BackupPlan {
            config,
            domain,
            fetchers,
        })
    }
}

/// A validated backup, ready to run against a client
pub struct BackupPlan {
    pub config: BuildConfig,
    pub domain: DomainSelector,
    pub fetchers: Vec<Arc<dyn Fetcher>>,
}

impl BackupPlan {
    /// Build the definition and serialize it with `format`
    pub async fn execute(
        &self,
        client: &dyn ResourceClient,
        formatters: &FormatterRegistry,
        format: &str,
    ) -> Result<Vec<u8>, BackupError> {
        let definition = build_definition(&self.config, client, self.fetchers.clone()).await?;
        formatters.format(&definition, format)
    }
}

/// Run `backup`
pub async fn run(args: &BackupArgs, ctx: &AppContext) -> Result<(), BackupError> {
    if args.output.is_none() {
        ctx.sink.mute();
    }

    let result = run_muted(args, ctx).await;
    if result.is_err() {
        ctx.sink.unmute();
    }
    result
}

async fn run_muted(args: &BackupArgs, ctx: &AppContext) -> Result<(), BackupError> {
    let plan = args.plan(ctx)?;

    let client = CloudStackClient::new(&plan.config.connection)
        .map_err(|e| BackupError::Config(e.to_string()))?;
    tracing::debug!("Management server: {}", client.endpoint());

    let bytes = plan.execute(&client, &ctx.formatters, &args.format).await?;
    write_output(args.output.as_deref(), &bytes)
}

/// Write `bytes` to `path`, or to stdout followed by a newline
pub fn write_output(path: Option<&Path>, bytes: &[u8]) -> Result<(), BackupError> {
    match path {
        Some(path) => {
            std::fs::write(path, bytes).map_err(|source| BackupError::Output {
                path: path.to_path_buf(),
                source,
            })?;
            tracing::info!("Definition written to {}", path.display());
            Ok(())
        }
        None => {
            let mut stdout = std::io::stdout().lock();
            stdout
                .write_all(bytes)
                .and_then(|_| stdout.write_all(b"\n"))
                .and_then(|_| stdout.flush())
                .map_err(|source| BackupError::Output {
                    path: PathBuf::from("<stdout>"),
                    source,
                })
        }
    }
}
