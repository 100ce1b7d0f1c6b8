//! Store adapter trait.
//!
//! This module defines the boundary to the persistent store:
//! - `MemoryStore` - In-process map (tests, embedding)
//! - `SqliteStore` - SQLite database file (default)
//!
//! The adapter has no merge logic. It is the single mutation point for
//! preferences and serializes concurrent writes to the same key itself
//! (last writer wins).

use crate::Result;
use crate::models::{PersistedKey, Preference, PreferenceType, Scope};

/// Trait for stores that persist preferences.
///
/// `save` followed by `find_by_full_key` for the same key must observe the
/// saved preference.
pub trait PreferenceStore: Send + Sync {
    /// All stored preferences, ordered by key.
    fn find_all(&self) -> Result<Vec<Preference>>;

    /// Preferences of `scope` whose owner equals `owner` (`None` matches
    /// preferences without an owner).
    fn find_all_by_owner_and_scope(&self, owner: Option<&str>, scope: Scope)
    -> Result<Vec<Preference>>;

    /// Preferences of `scope` and `owner` with the given key text.
    fn find_all_by_owner_and_scope_and_key(
        &self,
        owner: Option<&str>,
        scope: Scope,
        key: &str,
    ) -> Result<Vec<Preference>>;

    /// Preferences of `scope` and `owner` in the given group.
    fn find_all_by_owner_and_scope_and_group(
        &self,
        owner: Option<&str>,
        scope: Scope,
        group: &str,
    ) -> Result<Vec<Preference>>;

    /// The preference stored under `key`, if any.
    fn find_by_full_key(&self, key: &PersistedKey) -> Result<Option<Preference>>;

    /// Preferences of the given type.
    fn find_by_type(&self, pref_type: PreferenceType) -> Result<Vec<Preference>>;

    /// Insert or replace the preference stored under its key.
    fn save(&self, preference: Preference) -> Result<Preference>;

    /// Remove the preference stored under `key`; `Error::NotFound` if absent.
    fn delete(&self, key: &PersistedKey) -> Result<()>;

    /// Get the storage location description (for display purposes).
    fn location(&self) -> String;

    /// Get the backend type name.
    fn backend_type(&self) -> &'static str;
}

/// Available store types.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BackendType {
    /// In-process map, lost on exit
    Memory,
    /// SQLite database at the given path
    Sqlite(std::path::PathBuf),
}

impl BackendType {
    /// Marker selecting the in-memory store in configuration.
    pub const MEMORY_MARKER: &'static str = ":memory:";

    /// Parse a database setting: `:memory:` or a file path.
    pub fn parse(s: &str) -> Self {
        if s == Self::MEMORY_MARKER {
            Self::Memory
        } else {
            Self::Sqlite(std::path::PathBuf::from(s))
        }
    }

    /// Get the string representation.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Memory => "memory",
            Self::Sqlite(_) => "sqlite",
        }
    }
}

impl std::fmt::Display for BackendType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Memory => write!(f, "{}", Self::MEMORY_MARKER),
            Self::Sqlite(path) => write!(f, "{}", path.display()),
        }
    }
}

impl serde::Serialize for BackendType {
    fn serialize<S: serde::Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}
