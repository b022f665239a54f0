//! `restore` subcommand
//!
//! Not implemented: the command reads and checks a backup when one is given,
//! reports what it would restore and where, then stops.

use super::{AppContext, ConnectionArgs};
use crate::definition::Definition;
use anyhow::{Context, Result};
use clap::Args;
use std::path::{Path, PathBuf};

#[derive(Debug, Clone, Args)]
pub struct RestoreArgs {
    #[command(flatten)]
    pub connection: ConnectionArgs,

    /// Backup file to restore (JSON, or YAML with a .yaml/.yml extension)
    #[arg(short, long)]
    pub input: Option<PathBuf>,
}

/// Run `restore`
pub fn run(args: &RestoreArgs, ctx: &AppContext) -> Result<()> {
    let connection = args.connection.resolve(&ctx.settings);

    if let Some(input) = &args.input {
        let definition = load_definition(input)?;
        tracing::info!(
            "Loaded definition of zone {} ({}) from {}",
            definition.zone.name,
            definition.zone.id,
            input.display()
        );
        tracing::info!("  {}", definition.summary());
    }

    tracing::info!(
        "Target management server: {}://{}{}",
        connection.scheme,
        connection.host,
        connection.path
    );
    tracing::warn!("Restore is not implemented yet; nothing was changed");
    Ok(())
}

/// Read a definition written by `backup`
pub fn load_definition(path: &Path) -> Result<Definition> {
    let content = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read {}", path.display()))?;

    let is_yaml = matches!(
        path.extension().and_then(|e| e.to_str()),
        Some("yaml") | Some("yml")
    );
    let definition = if is_yaml {
        serde_yaml::from_str(&content)
            .with_context(|| format!("Failed to parse {} as YAML", path.display()))?
    } else {
        serde_json::from_str(&content)
            .with_context(|| format!("Failed to parse {} as JSON", path.display()))?
    };
    Ok(definition)
}
