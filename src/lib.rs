//! Zone backup for CloudStack
//!
//! Reads the configuration of one zone from a CloudStack management server
//! (pods, clusters, hosts, storage, physical networks, offerings, templates
//! and configuration values) into a single [`Definition`] document.

pub mod cloudstack;
pub mod command;
pub mod config;
pub mod definition;
pub mod error;
pub mod logging;
pub mod orchestrator;
pub mod resource;

pub use definition::Definition;
pub use error::BackupError;
pub use orchestrator::{build_definition, Orchestrator};
