//! Configuration for the `prefs` tool.
//!
//! ## config.kdl
//!
//! Located at (first match wins):
//! - `--config <path>`
//! - `PREFS_CONFIG`
//! - `~/.config/prefs/config.kdl`
//!
//! Contains:
//! - `database` - SQLite database path, or `:memory:`
//! - `definitions` - Definition documents to merge
//! - `merge-on-startup` - Merge before every command (default `#true`)
//! - `log-level` - Default log filter
//!
//! A missing file is treated as empty.
//!
//! Use the [`resolver`] module for precedence resolution against CLI flags
//! and environment variables.

pub mod resolver;
pub mod schema;

pub use resolver::{
    ConfigOverrides, PREFS_CONFIG_ENV, PREFS_DB_ENV, PREFS_DEFINITIONS_ENV, PREFS_LOG_ENV,
    Resolved, ResolvedSettings, ValueSource, resolve_settings, resolve_settings_with,
};
pub use schema::PrefsConfig;
