//! Storage layer for preferences.
//!
//! ## Store Backends
//!
//! - **SQLite** (default): a single `preferences` table keyed by
//!   `(scope, owner, key)`, at `<data_dir>/prefs/preferences.db` unless
//!   configured otherwise
//! - **Memory**: a sorted map, selected with the `:memory:` database setting
//!
//! Both order results by persisted key and apply the same owner matching:
//! an absent (or empty) owner matches only preferences without one.

pub mod backend;
pub mod memory;
pub mod sqlite;

pub use backend::{BackendType, PreferenceStore};
pub use memory::MemoryStore;
pub use sqlite::SqliteStore;

use crate::Result;
use crate::models::Preference;
use std::path::PathBuf;
use std::sync::Arc;

/// Failures raised by a store backend.
#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    #[error("database error: {0}")]
    Database(#[from] rusqlite::Error),

    #[error("store lock poisoned")]
    Poisoned,

    #[error("corrupt row {key}: {reason}")]
    Corrupt { key: String, reason: String },
}

/// Open the store selected by `backend`.
pub fn open_store(backend: &BackendType) -> Result<Arc<dyn PreferenceStore>> {
    match backend {
        BackendType::Memory => Ok(Arc::new(MemoryStore::new())),
        BackendType::Sqlite(path) => Ok(Arc::new(SqliteStore::open(path)?)),
    }
}

/// Default database path: `<data_dir>/prefs/preferences.db`.
pub fn default_database_path() -> Option<PathBuf> {
    dirs::data_dir().map(|d| d.join("prefs").join("preferences.db"))
}

/// Normalize an owner filter; the empty string means "no owner".
pub(crate) fn owner_filter(owner: Option<&str>) -> Option<&str> {
    owner.filter(|o| !o.is_empty())
}

/// Whether `pref` belongs to `owner` (already normalized).
pub(crate) fn matches_owner(pref: &Preference, owner: Option<&str>) -> bool {
    pref.key().owner() == owner
}
