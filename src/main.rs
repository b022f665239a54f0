use clap::error::ErrorKind;
use clap::{CommandFactory, Parser, Subcommand};
use cs_zone_cloner::command::{self, AppContext, BackupArgs, RestoreArgs};
use cs_zone_cloner::logging::{setup_logging, LogLevel, MutableSink};
use std::collections::HashSet;
use std::path::PathBuf;
use std::process::ExitCode;

/// Back up a CloudStack zone's configuration
#[derive(Parser, Debug)]
#[command(name = "cs-zone-cloner", version, about, long_about = None)]
struct Cli {
    /// Log level
    #[arg(long, value_enum, default_value = "info", global = true)]
    log_level: LogLevel,

    /// Also append logs to this file
    #[arg(long, global = true)]
    log_file: Option<PathBuf>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Write the definition of one zone to a file or stdout
    Backup(BackupArgs),
    /// Restore a zone from a definition (not implemented)
    Restore(RestoreArgs),
}

/// Long flag names across every subcommand
fn long_flags(cmd: &clap::Command, names: &mut HashSet<String>) {
    for arg in cmd.get_arguments() {
        if let Some(long) = arg.get_long() {
            names.insert(long.to_string());
        }
    }
    for sub in cmd.get_subcommands() {
        long_flags(sub, names);
    }
}

/// Accept single-dash long flags (`-zone-id x`) as `--zone-id x`
///
/// Only names of real flags are rewritten, so values starting with a dash
/// pass through unchanged.
fn normalize_go_flags<I: IntoIterator<Item = String>>(args: I) -> Vec<String> {
    let mut known = HashSet::new();
    long_flags(&Cli::command(), &mut known);

    let mut passthrough = false;
    args.into_iter()
        .enumerate()
        .map(|(i, arg)| {
            if i == 0 || passthrough {
                return arg;
            }
            if arg == "--" {
                passthrough = true;
                return arg;
            }
            let Some(flag) = arg.strip_prefix('-').filter(|f| !f.starts_with('-')) else {
                return arg;
            };
            let name = flag.split_once('=').map_or(flag, |(name, _)| name);
            if name.len() > 1 && known.contains(name) {
                format!("-{arg}")
            } else {
                arg
            }
        })
        .collect()
}

/// Exit code for a command line clap rejected
///
/// Help and version requests succeed; every usage error exits with 1 like
/// any other configuration failure.
fn parse_failure_code(err: &clap::Error) -> u8 {
    match err.kind() {
        ErrorKind::DisplayHelp | ErrorKind::DisplayVersion => 0,
        _ => 1,
    }
}

#[tokio::main]
async fn main() -> ExitCode {
    let cli = match Cli::try_parse_from(normalize_go_flags(std::env::args())) {
        Ok(cli) => cli,
        Err(err) => {
            let _ = err.print();
            return ExitCode::from(parse_failure_code(&err));
        }
    };

    let sink = MutableSink::stderr();
    let _log_guard = match setup_logging(cli.log_level, cli.log_file.as_deref(), sink.clone()) {
        Ok(guard) => guard,
        Err(err) => {
            eprintln!("Error: {err:?}");
            return ExitCode::FAILURE;
        }
    };

    tracing::debug!("cs-zone-cloner {} started", env!("CARGO_PKG_VERSION"));
    let ctx = AppContext::new(sink);

    match cli.command {
        Command::Backup(args) => match command::backup::run(&args, &ctx).await {
            Ok(()) => ExitCode::SUCCESS,
            Err(err) => {
                eprintln!("Error: {err}");
                ExitCode::from(u8::try_from(err.exit_code()).unwrap_or(1))
            }
        },
        Command::Restore(args) => match command::restore::run(&args, &ctx) {
            Ok(()) => ExitCode::SUCCESS,
            Err(err) => {
                eprintln!("Error: {err:?}");
                ExitCode::FAILURE
            }
        },
    }
}
