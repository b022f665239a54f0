//! Subcommand runners
//!
//! `main.rs` parses the command line and hands the parsed arguments, along
//! with an [`AppContext`], to [`backup::run`] or [`restore::run`].

pub mod backup;
pub mod restore;

pub use backup::BackupArgs;
pub use restore::RestoreArgs;

use crate::config::{ConnectionConfig, Settings};
use crate::definition::format::FormatterRegistry;
use crate::logging::MutableSink;
use crate::resource::FetcherRegistry;
use clap::Args;

/// State shared by every subcommand of one process
pub struct AppContext {
    pub settings: Settings,
    pub fetchers: FetcherRegistry,
    pub formatters: FormatterRegistry,
    pub sink: MutableSink,
}

impl AppContext {
    /// Context with the settings file loaded and every built-in registered
    pub fn new(sink: MutableSink) -> Self {
        Self::with_settings(Settings::load(), sink)
    }

    pub fn with_settings(settings: Settings, sink: MutableSink) -> Self {
        Self {
            settings,
            fetchers: FetcherRegistry::with_defaults(),
            formatters: FormatterRegistry::with_defaults(),
            sink,
        }
    }
}

/// Management server connection flags
///
/// Anything left out falls back to the settings file, then to the
/// built-in defaults.
#[derive(Debug, Clone, Default, Args)]
pub struct ConnectionArgs {
    /// API key
    #[arg(long)]
    pub key: Option<String>,

    /// API secret key
    #[arg(long)]
    pub secret: Option<String>,

    /// http or https [default: http]
    #[arg(long)]
    pub scheme: Option<String>,

    /// Management server host[:port] [default: 127.0.0.1:8080]
    #[arg(long)]
    pub host: Option<String>,

    /// API path [default: /client/api]
    #[arg(long)]
    pub path: Option<String>,
}

impl ConnectionArgs {
    pub fn resolve(&self, settings: &Settings) -> ConnectionConfig {
        settings.connection(
            self.key.clone(),
            self.secret.clone(),
            self.scheme.clone(),
            self.host.clone(),
            self.path.clone(),
        )
    }
}
