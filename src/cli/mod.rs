//! CLI argument definitions for prefs.

use crate::models::{PersistedKey, PreferenceChange, PreferenceType, Scope};
use clap::{ArgAction, Args, Parser, Subcommand};
use std::path::PathBuf;

/// Version string with build metadata.
pub const LONG_VERSION: &str = concat!(
    env!("CARGO_PKG_VERSION"),
    " (",
    env!("PREFS_GIT_COMMIT"),
    ", built ",
    env!("PREFS_BUILD_TIMESTAMP"),
    ")"
);

/// Prefs - hierarchical preference merge and resolution.
///
/// Seeds preferences from definition documents into a store without
/// overwriting live values, and answers scoped lookups.
#[derive(Parser, Debug)]
#[command(name = "prefs")]
#[command(author, version, long_version = LONG_VERSION, about = "Merge and resolve scoped preferences", long_about = None)]
pub struct Cli {
    /// Output in human-readable format instead of JSON
    #[arg(short = 'H', long = "human", global = true)]
    pub human_readable: bool,

    /// Increase log verbosity (-v info, -vv debug)
    #[arg(short = 'v', long = "verbose", action = ArgAction::Count, global = true)]
    pub verbose: u8,

    /// Config file (defaults to PREFS_CONFIG, then ~/.config/prefs/config.kdl)
    #[arg(long = "config", global = true, value_name = "PATH")]
    pub config: Option<PathBuf>,

    /// Database path, or ":memory:" (defaults to PREFS_DB, then config)
    #[arg(long = "db", global = true, value_name = "PATH")]
    pub database: Option<String>,

    /// Definition document to merge; repeat for several
    #[arg(long = "definitions", global = true, value_name = "PATH")]
    pub definitions: Vec<PathBuf>,

    #[command(subcommand)]
    pub command: Commands,
}

/// Top-level commands
#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Merge definition documents into the store
    ///
    /// Inserts every defined preference missing from the store. Existing
    /// preferences keep their stored values.
    #[command(alias = "reload")]
    Merge {
        /// Fail instead of waiting when another merge is running
        #[arg(long)]
        no_wait: bool,
    },

    /// List stored preferences
    List {
        /// Only preferences of this scope
        #[arg(long, value_parser = parse_scope)]
        scope: Option<Scope>,

        /// Owner (module, role or user name) within --scope
        #[arg(long, requires = "scope")]
        owner: Option<String>,

        /// Only preferences in this group
        #[arg(long, requires = "scope")]
        group: Option<String>,

        /// Only preferences of this type
        #[arg(long = "type", value_parser = parse_type)]
        pref_type: Option<PreferenceType>,
    },

    /// Show a single preference
    ///
    /// Address it by full key (`application/timeout`, `user/alice/theme`)
    /// or by --scope, --owner and --key.
    Get {
        /// Full key
        #[arg(value_parser = parse_full_key, required_unless_present = "key")]
        full_key: Option<PersistedKey>,

        #[arg(long, value_parser = parse_scope, requires = "key")]
        scope: Option<Scope>,

        #[arg(long, requires = "key")]
        owner: Option<String>,

        #[arg(long, requires = "scope", conflicts_with = "full_key")]
        key: Option<String>,
    },

    /// Create or update a preference
    Set(WriteArgs),

    /// Create a preference, failing if it already exists
    Create(WriteArgs),

    /// Delete a preference
    ///
    /// A preference seeded from a definition document comes back on the next
    /// merge. With merge-on-startup enabled (the default) that is the next
    /// prefs command; set `merge-on-startup #false` in config.kdl to keep it
    /// deleted until an explicit `prefs merge`.
    Delete {
        /// Full key
        #[arg(value_parser = parse_full_key)]
        full_key: PersistedKey,
    },

    /// Validate definition documents without touching the store
    Check {
        /// Documents to check
        #[arg(required = true)]
        files: Vec<PathBuf>,
    },

    /// Write the stored preferences as a definitions document
    Export {
        /// Write to this file instead of stdout
        #[arg(short, long, value_name = "PATH")]
        output: Option<PathBuf>,
    },

    /// Configuration commands
    Config {
        #[command(subcommand)]
        command: ConfigCommands,
    },
}

/// Arguments shared by `set` and `create`.
#[derive(Args, Debug, Clone)]
pub struct WriteArgs {
    /// Full key
    #[arg(value_parser = parse_full_key)]
    pub full_key: PersistedKey,

    /// New value (checked against the type and bounds)
    pub value: Option<String>,

    /// Value type
    #[arg(long = "type", value_parser = parse_type)]
    pub pref_type: Option<PreferenceType>,

    #[arg(long)]
    pub description: Option<String>,

    /// Lower bound for INT/FLOAT values
    #[arg(long = "min", allow_negative_numbers = true)]
    pub minimum: Option<f64>,

    /// Upper bound for INT/FLOAT values
    #[arg(long = "max", allow_negative_numbers = true)]
    pub maximum: Option<f64>,

    #[arg(long)]
    pub group: Option<String>,
}

impl WriteArgs {
    /// The change set these arguments describe.
    pub fn to_change(&self) -> PreferenceChange {
        PreferenceChange {
            value: self.value.clone(),
            pref_type: self.pref_type,
            description: self.description.clone(),
            minimum: self.minimum,
            maximum: self.maximum,
            group: self.group.clone(),
            ..Default::default()
        }
    }
}

/// Configuration subcommands
#[derive(Subcommand, Debug)]
pub enum ConfigCommands {
    /// Show the resolved configuration and where each value came from
    Show,
}

fn parse_scope(s: &str) -> Result<Scope, String> {
    Scope::parse(s).ok_or_else(|| format!("unknown scope '{}' (application, module, role, user)", s))
}

fn parse_type(s: &str) -> Result<PreferenceType, String> {
    PreferenceType::parse(s)
        .ok_or_else(|| format!("unknown type '{}' (STRING, INT, FLOAT, BOOL, OBJECT)", s))
}

fn parse_full_key(s: &str) -> Result<PersistedKey, String> {
    s.parse().map_err(|e: crate::Error| e.to_string())
}
