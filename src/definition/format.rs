//! Formatter Registry
//!
//! Named serializers that turn a finished [`Definition`] into bytes.
//! Built-ins: `json` (tab indented), `json-compact` and `yaml`.

use super::Definition;
use crate::error::BackupError;
use serde::Serialize;
use std::collections::HashMap;
use std::sync::{Arc, Mutex};

/// A serializer for definitions
pub type Formatter = Arc<dyn Fn(&Definition) -> Result<Vec<u8>, BackupError> + Send + Sync>;

pub const DEFAULT_FORMAT: &str = "json";

/// Compact JSON
pub fn format_json(definition: &Definition) -> Result<Vec<u8>, BackupError> {
    serde_json::to_vec(definition).map_err(|e| BackupError::Format(e.to_string()))
}

/// JSON indented with tabs
pub fn format_json_indent(definition: &Definition) -> Result<Vec<u8>, BackupError> {
    let mut out = Vec::new();
    let formatter = serde_json::ser::PrettyFormatter::with_indent(b"\t");
    let mut serializer = serde_json::Serializer::with_formatter(&mut out, formatter);
    definition
        .serialize(&mut serializer)
        .map_err(|e| BackupError::Format(e.to_string()))?;
    Ok(out)
}

/// YAML
pub fn format_yaml(definition: &Definition) -> Result<Vec<u8>, BackupError> {
    serde_yaml::to_string(definition)
        .map(String::into_bytes)
        .map_err(|e| BackupError::Format(e.to_string()))
}

/// Name -> formatter map, safe to share between threads
pub struct FormatterRegistry {
    formatters: Mutex<HashMap<String, Formatter>>,
}

impl FormatterRegistry {
    /// Registry without any formatter
    pub fn empty() -> Self {
        Self {
            formatters: Mutex::new(HashMap::new()),
        }
    }

    /// Registry holding the built-in formatters
    pub fn with_defaults() -> Self {
        let registry = Self::empty();
        registry.register(DEFAULT_FORMAT, format_json_indent);
        registry.register("json-compact", format_json);
        registry.register("yaml", format_yaml);
        registry
    }

    /// Register `formatter` under `name`, replacing any previous one
    pub fn register<F>(&self, name: &str, formatter: F)
    where
        F: Fn(&Definition) -> Result<Vec<u8>, BackupError> + Send + Sync + 'static,
    {
        let mut formatters = self
            .formatters
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner());
        formatters.insert(name.to_string(), Arc::new(formatter));
    }

    /// Registered names, sorted
    pub fn names(&self) -> Vec<String> {
        let formatters = self
            .formatters
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner());
        let mut names: Vec<String> = formatters.keys().cloned().collect();
        names.sort();
        names
    }

    /// Serialize `definition` with the formatter registered as `name`
    pub fn format(&self, definition: &Definition, name: &str) -> Result<Vec<u8>, BackupError> {
        // The lock is released before the formatter runs
        let formatter = {
            let formatters = self
                .formatters
                .lock()
                .unwrap_or_else(|poisoned| poisoned.into_inner());
            formatters.get(name).cloned()
        };

        match formatter {
            Some(formatter) => formatter(definition),
            None => Err(BackupError::Format(format!("no formatter named {}", name))),
        }
    }
}

impl Default for FormatterRegistry {
    fn default() -> Self {
        Self::with_defaults()
    }
}
