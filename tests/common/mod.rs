//! Common test utilities for prefs integration tests.
//!
//! Provides `TestEnv` for isolated test environments that never touch the
//! user's `~/.config/prefs/` or `~/.local/share/prefs/` directories.

#![allow(dead_code)]

use assert_cmd::Command;
use std::path::{Path, PathBuf};
pub use tempfile::TempDir;

/// Definitions document used by most CLI tests.
pub const DEFINITIONS: &str = r#"
preferences {
    application key="timeout" type="INT" val="30" minimum=0 maximum=100 {
        description "Request timeout in seconds"
    }
    module owner="INVENTORY" key="page-size" type="INT" val=50
    role owner="ROLE_ADMIN" key="dashboard" type="OBJECT" val="{\"tiles\":4}"
    user owner="alice" key="theme" type="STRING" val="dark" group="ui"
}
"#;

/// A test environment with an isolated database, config and definitions.
///
/// The `prefs()` method returns a `Command` with `PREFS_DB`, `PREFS_CONFIG`
/// and `PREFS_DEFINITIONS` set per-invocation, making tests parallel-safe.
pub struct TestEnv {
    pub dir: TempDir,
}

impl TestEnv {
    /// Create an environment whose definitions file holds [`DEFINITIONS`].
    pub fn new() -> Self {
        Self::with_definitions(DEFINITIONS)
    }

    /// Create an environment with the given definitions document.
    pub fn with_definitions(definitions: &str) -> Self {
        let env = Self {
            dir: TempDir::new().unwrap(),
        };
        env.write_definitions(definitions);
        env
    }

    /// Replace the definitions document.
    pub fn write_definitions(&self, definitions: &str) {
        std::fs::write(self.definitions_path(), definitions).unwrap();
    }

    /// Get a Command for the prefs binary with isolated paths.
    pub fn prefs(&self) -> Command {
        let mut cmd = Command::new(env!("CARGO_BIN_EXE_prefs"));
        cmd.current_dir(self.dir.path());
        cmd.env("PREFS_DB", self.db_path());
        cmd.env("PREFS_CONFIG", self.config_path());
        cmd.env("PREFS_DEFINITIONS", self.definitions_path());
        cmd.env_remove("PREFS_LOG");
        cmd
    }

    /// Run prefs with `args`, assert success and parse stdout as JSON.
    pub fn json(&self, args: &[&str]) -> serde_json::Value {
        let output = self.prefs().args(args).assert().success();
        serde_json::from_slice(&output.get_output().stdout).unwrap()
    }

    pub fn path(&self) -> &Path {
        self.dir.path()
    }

    pub fn db_path(&self) -> PathBuf {
        self.dir.path().join("preferences.db")
    }

    pub fn config_path(&self) -> PathBuf {
        self.dir.path().join("config.kdl")
    }

    pub fn definitions_path(&self) -> PathBuf {
        self.dir.path().join("initial-preferences.kdl")
    }
}

impl Default for TestEnv {
    fn default() -> Self {
        Self::new()
    }
}
