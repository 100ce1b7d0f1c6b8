//! Precedence resolution for tool settings.
//!
//! ## Precedence (highest to lowest)
//!
//! 1. CLI flags (passed at runtime)
//! 2. Environment variables (`PREFS_DB`, `PREFS_DEFINITIONS`, `PREFS_LOG`)
//! 3. config.kdl (`--config` > `PREFS_CONFIG` > `<config_dir>/prefs/config.kdl`)
//! 4. Built-in defaults
//!
//! `merge-on-startup` has no flag or variable; it comes from config.kdl or
//! defaults to true.

use crate::config::PrefsConfig;
use crate::storage::{BackendType, default_database_path};
use crate::{Error, Result};
use serde::{Serialize, Serializer};
use std::path::PathBuf;

/// Environment variable naming the config file.
pub const PREFS_CONFIG_ENV: &str = "PREFS_CONFIG";
/// Environment variable naming the database (`:memory:` allowed).
pub const PREFS_DB_ENV: &str = "PREFS_DB";
/// Environment variable listing definition files, path-list separated.
pub const PREFS_DEFINITIONS_ENV: &str = "PREFS_DEFINITIONS";
/// Environment variable holding the log filter.
pub const PREFS_LOG_ENV: &str = "PREFS_LOG";

/// Log filter used when nothing else is configured.
pub const DEFAULT_LOG_LEVEL: &str = "warn";

/// Tracks where a resolved value came from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ValueSource {
    /// Value from CLI flag
    CliFlag,
    /// Value from environment variable
    EnvVar(String),
    /// Value from config.kdl
    Config,
    /// Built-in default value
    Default,
}

impl std::fmt::Display for ValueSource {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ValueSource::CliFlag => write!(f, "cli"),
            ValueSource::EnvVar(name) => write!(f, "env:{}", name),
            ValueSource::Config => write!(f, "config"),
            ValueSource::Default => write!(f, "default"),
        }
    }
}

impl Serialize for ValueSource {
    fn serialize<S: Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

/// A resolved value with its source.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Resolved<T> {
    /// The resolved value
    pub value: T,
    /// Where the value came from
    pub source: ValueSource,
}

impl<T> Resolved<T> {
    /// Create a new resolved value.
    pub fn new(value: T, source: ValueSource) -> Self {
        Self { value, source }
    }
}

/// CLI overrides for settings resolution.
#[derive(Debug, Clone, Default)]
pub struct ConfigOverrides {
    /// Config file from `--config`
    pub config_path: Option<PathBuf>,
    /// Database from `--db`
    pub database: Option<String>,
    /// Definition files from `--definitions`
    pub definitions: Vec<PathBuf>,
    /// Log filter implied by `-v`
    pub log_level: Option<String>,
}

impl ConfigOverrides {
    /// Create empty overrides.
    pub fn new() -> Self {
        Self::default()
    }

    /// Set config file override.
    pub fn with_config_path(mut self, path: impl Into<PathBuf>) -> Self {
        self.config_path = Some(path.into());
        self
    }

    /// Set database override.
    pub fn with_database(mut self, database: impl Into<String>) -> Self {
        self.database = Some(database.into());
        self
    }

    /// Set definition files override.
    pub fn with_definitions(mut self, definitions: Vec<PathBuf>) -> Self {
        self.definitions = definitions;
        self
    }

    /// Set log filter override.
    pub fn with_log_level(mut self, level: impl Into<String>) -> Self {
        self.log_level = Some(level.into());
        self
    }
}

/// Fully resolved settings with source tracking.
#[derive(Debug, Clone, Serialize)]
pub struct ResolvedSettings {
    /// Config file consulted, if any location could be determined
    pub config_path: Option<Resolved<PathBuf>>,
    pub database: Resolved<BackendType>,
    pub definitions: Resolved<Vec<PathBuf>>,
    pub merge_on_startup: Resolved<bool>,
    pub log_level: Resolved<String>,
}

/// Resolve settings from CLI overrides, the process environment and config.kdl.
pub fn resolve_settings(overrides: &ConfigOverrides) -> Result<ResolvedSettings> {
    resolve_settings_with(overrides, |name| std::env::var(name).ok())
}

/// Resolve settings, reading environment variables through `env`.
pub fn resolve_settings_with<F>(overrides: &ConfigOverrides, env: F) -> Result<ResolvedSettings>
where
    F: Fn(&str) -> Option<String>,
{
    let env = |name: &str| env(name).filter(|v| !v.is_empty());

    let config_path = if let Some(ref path) = overrides.config_path {
        Some(Resolved::new(path.clone(), ValueSource::CliFlag))
    } else if let Some(path) = env(PREFS_CONFIG_ENV) {
        Some(Resolved::new(
            PathBuf::from(path),
            ValueSource::EnvVar(PREFS_CONFIG_ENV.to_string()),
        ))
    } else {
        PrefsConfig::default_path().map(|p| Resolved::new(p, ValueSource::Default))
    };

    let config = match config_path {
        Some(ref path) => PrefsConfig::load(&path.value)?,
        None => PrefsConfig::new(),
    };

    let mut settings = resolve_with_config(overrides, &config, env)?;
    settings.config_path = config_path;
    Ok(settings)
}

/// Resolve settings against an already loaded config.
pub fn resolve_with_config<F>(
    overrides: &ConfigOverrides,
    config: &PrefsConfig,
    env: F,
) -> Result<ResolvedSettings>
where
    F: Fn(&str) -> Option<String>,
{
    let env = |name: &str| env(name).filter(|v| !v.is_empty());

    // Resolve database
    let database = if let Some(ref db) = overrides.database {
        Resolved::new(BackendType::parse(db), ValueSource::CliFlag)
    } else if let Some(db) = env(PREFS_DB_ENV) {
        Resolved::new(
            BackendType::parse(&db),
            ValueSource::EnvVar(PREFS_DB_ENV.to_string()),
        )
    } else if let Some(ref db) = config.database {
        Resolved::new(BackendType::parse(db), ValueSource::Config)
    } else {
        let path = default_database_path().ok_or_else(|| {
            Error::Config("cannot determine a data directory; pass --db".to_string())
        })?;
        Resolved::new(BackendType::Sqlite(path), ValueSource::Default)
    };

    // Resolve definitions
    let definitions = if !overrides.definitions.is_empty() {
        Resolved::new(overrides.definitions.clone(), ValueSource::CliFlag)
    } else if let Some(list) = env(PREFS_DEFINITIONS_ENV) {
        Resolved::new(
            std::env::split_paths(&list).collect(),
            ValueSource::EnvVar(PREFS_DEFINITIONS_ENV.to_string()),
        )
    } else if !config.definitions.is_empty() {
        Resolved::new(config.definitions.clone(), ValueSource::Config)
    } else {
        Resolved::new(Vec::new(), ValueSource::Default)
    };

    // Resolve merge-on-startup
    let merge_on_startup = match config.merge_on_startup {
        Some(merge) => Resolved::new(merge, ValueSource::Config),
        None => Resolved::new(true, ValueSource::Default),
    };

    // Resolve log level
    let log_level = if let Some(ref level) = overrides.log_level {
        Resolved::new(level.clone(), ValueSource::CliFlag)
    } else if let Some(level) = env(PREFS_LOG_ENV) {
        Resolved::new(level, ValueSource::EnvVar(PREFS_LOG_ENV.to_string()))
    } else if let Some(ref level) = config.log_level {
        Resolved::new(level.clone(), ValueSource::Config)
    } else {
        Resolved::new(DEFAULT_LOG_LEVEL.to_string(), ValueSource::Default)
    };

    Ok(ResolvedSettings {
        config_path: None,
        database,
        definitions,
        merge_on_startup,
        log_level,
    })
}
