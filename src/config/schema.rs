//! KDL schema for config.kdl.
//!
//! This module provides:
//! - The [`PrefsConfig`] struct representing the file
//! - Parsing from a KDL document
//! - Validation and loading from disk

use crate::{Error, Result};
use kdl::KdlDocument;
use serde::Serialize;
use std::fs;
use std::path::{Path, PathBuf};

/// Log levels accepted by `log-level`.
pub const LOG_LEVELS: [&str; 5] = ["trace", "debug", "info", "warn", "error"];

/// Tool settings stored in config.kdl.
///
/// # KDL Schema
///
/// ```kdl
/// database "/var/lib/prefs/preferences.db"   // or ":memory:"
/// definitions "/etc/prefs/initial-preferences.kdl" "/etc/prefs/site.kdl"
/// merge-on-startup #true
/// log-level "info"
/// ```
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct PrefsConfig {
    /// Database path, or `:memory:` for the in-memory store
    pub database: Option<String>,

    /// Definition documents, merged in order
    pub definitions: Vec<PathBuf>,

    /// Whether commands merge definitions before running
    pub merge_on_startup: Option<bool>,

    /// Default log filter when `PREFS_LOG` is unset
    pub log_level: Option<String>,
}

impl PrefsConfig {
    /// Create an empty config with no values set.
    pub fn new() -> Self {
        Self::default()
    }

    /// Default config location: `<config_dir>/prefs/config.kdl`.
    pub fn default_path() -> Option<PathBuf> {
        dirs::config_dir().map(|d| d.join("prefs").join("config.kdl"))
    }

    /// Load config from `path`. A missing file is an empty config.
    pub fn load(path: &Path) -> Result<Self> {
        if !path.exists() {
            tracing::debug!(path = %path.display(), "no config file");
            return Ok(Self::new());
        }
        let text = fs::read_to_string(path)?;
        let doc: KdlDocument = text
            .parse()
            .map_err(|e| Error::Config(format!("{}: invalid KDL: {}", path.display(), e)))?;
        let config = Self::from_kdl(&doc);
        config
            .validate()
            .map_err(|e| Error::Config(format!("{}: {}", path.display(), e)))?;
        Ok(config)
    }

    /// Validate the config values.
    ///
    /// Returns an error message if any value is invalid.
    pub fn validate(&self) -> std::result::Result<(), String> {
        if let Some(ref level) = self.log_level
            && !LOG_LEVELS.contains(&level.to_lowercase().as_str())
        {
            return Err(format!(
                "log-level must be one of {}, got '{}'",
                LOG_LEVELS.join(", "),
                level
            ));
        }
        if let Some(ref db) = self.database
            && db.is_empty()
        {
            return Err("database must not be empty".to_string());
        }
        Ok(())
    }

    /// Parse config from a KDL document. Unknown nodes are ignored.
    pub fn from_kdl(doc: &KdlDocument) -> Self {
        let mut config = Self::new();

        if let Some(s) = first_string(doc, "database") {
            config.database = Some(s);
        }

        if let Some(node) = doc.get("definitions") {
            config.definitions = node
                .entries()
                .iter()
                .filter(|e| e.name().is_none())
                .filter_map(|e| e.value().as_string())
                .map(PathBuf::from)
                .collect();
        }

        if let Some(node) = doc.get("merge-on-startup")
            && let Some(entry) = node.entries().first()
        {
            config.merge_on_startup = entry.value().as_bool();
        }

        if let Some(s) = first_string(doc, "log-level") {
            config.log_level = Some(s);
        }

        config
    }
}

fn first_string(doc: &KdlDocument, name: &str) -> Option<String> {
    doc.get(name)?
        .entries()
        .first()?
        .value()
        .as_string()
        .map(str::to_string)
}
