//! Logging setup
//!
//! Log output goes through a [`MutableSink`]. While muted, formatted lines
//! are held in memory instead of being written; [`MutableSink::unmute`]
//! writes the held lines out, so a failed run can still be diagnosed when
//! its normal output was suppressed.

use anyhow::{Context, Result};
use clap::ValueEnum;
use std::io::{self, Write};
use std::path::Path;
use std::sync::{Arc, Mutex, RwLock};
use tracing_subscriber::fmt::writer::MakeWriterExt;
use tracing_subscriber::fmt::MakeWriter;
use tracing_subscriber::EnvFilter;

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum LogLevel {
    Off,
    Error,
    Warn,
    Info,
    Debug,
    Trace,
}

impl LogLevel {
    fn as_filter(self) -> &'static str {
        match self {
            LogLevel::Off => "off",
            LogLevel::Error => "error",
            LogLevel::Warn => "warn",
            LogLevel::Info => "info",
            LogLevel::Debug => "debug",
            LogLevel::Trace => "trace",
        }
    }
}

struct SinkState {
    muted: RwLock<bool>,
    held: Mutex<Vec<u8>>,
    target: Mutex<Box<dyn Write + Send>>,
}

/// Shared, mutable log destination
#[derive(Clone)]
pub struct MutableSink {
    state: Arc<SinkState>,
}

impl MutableSink {
    /// Sink writing to stderr
    pub fn stderr() -> Self {
        Self::with_target(Box::new(io::stderr()))
    }

    pub fn with_target(target: Box<dyn Write + Send>) -> Self {
        Self {
            state: Arc::new(SinkState {
                muted: RwLock::new(false),
                held: Mutex::new(Vec::new()),
                target: Mutex::new(target),
            }),
        }
    }

    pub fn mute(&self) {
        let mut muted = self
            .state
            .muted
            .write()
            .unwrap_or_else(|poisoned| poisoned.into_inner());
        *muted = true;
    }

    /// Stop holding output back and write out everything held so far
    pub fn unmute(&self) {
        let mut muted = self
            .state
            .muted
            .write()
            .unwrap_or_else(|poisoned| poisoned.into_inner());
        if !*muted {
            return;
        }
        *muted = false;

        let held = {
            let mut held = self
                .state
                .held
                .lock()
                .unwrap_or_else(|poisoned| poisoned.into_inner());
            std::mem::take(&mut *held)
        };
        let mut target = self
            .state
            .target
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner());
        // Best effort: there is nowhere left to report a failing log target
        let _ = target.write_all(&held);
        let _ = target.flush();
    }

    pub fn is_muted(&self) -> bool {
        *self
            .state
            .muted
            .read()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    fn write_bytes(&self, buf: &[u8]) -> io::Result<usize> {
        // Holding the read lock keeps unmute from interleaving with us
        let muted = self
            .state
            .muted
            .read()
            .unwrap_or_else(|poisoned| poisoned.into_inner());
        if *muted {
            let mut held = self
                .state
                .held
                .lock()
                .unwrap_or_else(|poisoned| poisoned.into_inner());
            held.extend_from_slice(buf);
            return Ok(buf.len());
        }

        let mut target = self
            .state
            .target
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner());
        target.write_all(buf)?;
        Ok(buf.len())
    }
}

/// Writer handed out per event by [`MutableSink`]
pub struct SinkWriter {
    sink: MutableSink,
}

impl Write for SinkWriter {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        self.sink.write_bytes(buf)
    }

    fn flush(&mut self) -> io::Result<()> {
        if self.sink.is_muted() {
            return Ok(());
        }
        self.sink
            .state
            .target
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .flush()
    }
}

impl<'a> MakeWriter<'a> for MutableSink {
    type Writer = SinkWriter;

    fn make_writer(&'a self) -> Self::Writer {
        SinkWriter { sink: self.clone() }
    }
}

/// Install the global subscriber
///
/// `RUST_LOG` takes precedence over `level`. With `log_file`, every line is
/// also appended to that file through a non-blocking writer; keep the
/// returned guard alive until exit so it gets flushed.
pub fn setup_logging(
    level: LogLevel,
    log_file: Option<&Path>,
    sink: MutableSink,
) -> Result<Option<tracing_appender::non_blocking::WorkerGuard>> {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(level.as_filter()));

    let builder = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_ansi(false)
        .with_target(false);

    let Some(path) = log_file else {
        builder
            .with_writer(sink)
            .try_init()
            .map_err(|e| anyhow::anyhow!(e))?;
        return Ok(None);
    };

    if let Some(parent) = path.parent() {
        if !parent.as_os_str().is_empty() {
            std::fs::create_dir_all(parent)
                .with_context(|| format!("Failed to create {}", parent.display()))?;
        }
    }

    let file = std::fs::OpenOptions::new()
        .create(true)
        .append(true)
        .open(path)
        .with_context(|| format!("Failed to open log file {}", path.display()))?;

    let (non_blocking, guard) = tracing_appender::non_blocking(file);

    builder
        .with_writer(sink.and(non_blocking))
        .try_init()
        .map_err(|e| anyhow::anyhow!(e))?;

    tracing::debug!("Log file: {:?}", path);

    Ok(Some(guard))
}
