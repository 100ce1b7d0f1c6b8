//! Prefs - hierarchical preference merge and resolution.
//!
//! This library provides the core of the `prefs` CLI tool: parsing
//! preference definition documents, seeding them into a persistent store
//! without clobbering live overrides, and answering scoped lookups with
//! type-correct values.

pub mod cli;
pub mod commands;
pub mod config;
pub mod definitions;
pub mod events;
pub mod merge;
pub mod models;
pub mod service;
pub mod storage;

pub use merge::{MergeEngine, MergeFailure, MergeReport};
pub use models::{
    PersistedKey, Preference, PreferenceChange, PreferenceDefinition, PreferenceType, Scope,
    TypedValue,
};
pub use service::PreferencesService;
pub use storage::{MemoryStore, PreferenceStore, SqliteStore, StoreError};

/// Library-level error type for preference operations.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("Invalid key: {0}")]
    InvalidKey(String),

    #[error("Cannot coerce {value:?} to {pref_type}: {reason}")]
    TypeCoercion {
        value: String,
        pref_type: PreferenceType,
        reason: String,
    },

    #[error("Invalid bounds: minimum {minimum} exceeds maximum {maximum}")]
    InvalidBounds { minimum: f64, maximum: f64 },

    #[error("Bounds are only allowed on INT and FLOAT, not {0}")]
    BoundsNotAllowed(PreferenceType),

    #[error("Malformed definition {entry}: {reason}")]
    MalformedDefinition { entry: String, reason: String },

    #[error("A merge is already in progress")]
    MergeInProgress,

    #[error("Preference not found: {0}")]
    NotFound(String),

    #[error("Scope {} {}", .0, .0.owner_rule())]
    ScopeOwnerMismatch(Scope),

    #[error("Preference {0} already exists")]
    AlreadyExists(String),

    #[error("Field '{field}' is part of the preference identity and cannot be changed")]
    ImmutableKeyField { field: &'static str },

    #[error("Store failure: {0}")]
    Store(#[from] StoreError),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Configuration error: {0}")]
    Config(String),
}

impl Error {
    /// Whether the caller may retry the same operation unchanged.
    pub fn is_retryable(&self) -> bool {
        matches!(self, Error::MergeInProgress | Error::Store(_))
    }
}

impl From<rusqlite::Error> for Error {
    fn from(err: rusqlite::Error) -> Self {
        Error::Store(StoreError::Database(err))
    }
}

/// Result type alias for preference operations.
pub type Result<T> = std::result::Result<T, Error>;

/// Test utilities shared by unit tests.
#[cfg(test)]
pub(crate) mod test_utils {
    use std::sync::Arc;

    use crate::definitions::InlineSource;
    use crate::events::EventBus;
    use crate::merge::MergeEngine;
    use crate::service::PreferencesService;
    use crate::storage::MemoryStore;

    /// Definitions used across the engine and service tests.
    pub const SAMPLE_DEFINITIONS: &str = r#"
preferences {
    application key="timeout" type="INT" val="30" minimum=0 maximum=100 {
        description "Request timeout in seconds"
    }
    module owner="INVENTORY" key="page-size" type="INT" val=50
    role owner="ROLE_ADMIN" key="dashboard" type="OBJECT" val="{\"tiles\":4}"
    user owner="alice" key="theme" type="STRING" val="dark" group="ui"
}
"#;

    /// Test environment wiring an in-memory store to a service.
    pub struct TestEnv {
        pub store: Arc<MemoryStore>,
        pub events: EventBus,
        pub service: PreferencesService,
    }

    impl TestEnv {
        /// Create a service seeded from `definitions` (not merged yet).
        pub fn with_definitions(definitions: &str) -> Self {
            let store = Arc::new(MemoryStore::new());
            let events = EventBus::new();
            let engine = MergeEngine::new(
                Box::new(InlineSource::new("test", definitions)),
                store.clone(),
                events.clone(),
            );
            let service = PreferencesService::new(store.clone(), Arc::new(engine), events.clone());
            Self {
                store,
                events,
                service,
            }
        }

        /// Create a service seeded from [`SAMPLE_DEFINITIONS`].
        pub fn new() -> Self {
            Self::with_definitions(SAMPLE_DEFINITIONS)
        }
    }

    impl Default for TestEnv {
        fn default() -> Self {
            Self::new()
        }
    }
}
