//! Resolution service: the public operations on preferences.
//!
//! Reads go straight to the store. Writes coerce the incoming value against
//! the preference's type and bounds, keep identity and provenance intact,
//! and publish a change event once the store has accepted them.

use crate::events::{EventBus, PreferenceEvent};
use crate::merge::{MergeEngine, MergeReport};
use crate::models::{
    PersistedKey, Preference, PreferenceChange, PreferenceType, Scope, build_key,
};
use crate::storage::PreferenceStore;
use crate::{Error, Result};
use std::sync::Arc;

/// Preference operations shared by every caller.
///
/// Calls are independent and may run concurrently; the store serializes
/// writes to the same key.
pub struct PreferencesService {
    store: Arc<dyn PreferenceStore>,
    engine: Arc<MergeEngine>,
    events: EventBus,
}

impl PreferencesService {
    pub fn new(store: Arc<dyn PreferenceStore>, engine: Arc<MergeEngine>, events: EventBus) -> Self {
        Self {
            store,
            engine,
            events,
        }
    }

    /// Every stored preference, ordered by key.
    pub fn find_all(&self) -> Result<Vec<Preference>> {
        self.store.find_all()
    }

    /// Preferences of `scope` belonging to `owner`.
    pub fn find_all_for(&self, owner: Option<&str>, scope: Scope) -> Result<Vec<Preference>> {
        check_owner(owner, scope)?;
        self.store.find_all_by_owner_and_scope(owner, scope)
    }

    /// The preference stored under `key`.
    pub fn find_by_full_key(&self, key: &PersistedKey) -> Result<Preference> {
        self.store
            .find_by_full_key(key)?
            .ok_or_else(|| Error::NotFound(key.to_string()))
    }

    /// The preference identified by `owner`, `scope` and `key`.
    pub fn find_by(&self, owner: Option<&str>, scope: Scope, key: &str) -> Result<Preference> {
        check_owner(owner, scope)?;
        let full_key = build_key(scope, owner, key)?;
        self.store
            .find_all_by_owner_and_scope_and_key(owner, scope, key)?
            .into_iter()
            .next()
            .ok_or_else(|| Error::NotFound(full_key.to_string()))
    }

    /// Preferences of `scope` and `owner` in `group`.
    pub fn find_by_group(
        &self,
        owner: Option<&str>,
        scope: Scope,
        group: &str,
    ) -> Result<Vec<Preference>> {
        check_owner(owner, scope)?;
        self.store
            .find_all_by_owner_and_scope_and_group(owner, scope, group)
    }

    /// Preferences of the given type.
    pub fn find_by_type(&self, pref_type: PreferenceType) -> Result<Vec<Preference>> {
        self.store.find_by_type(pref_type)
    }

    /// Whether a preference is stored under `owner`, `scope` and `key`.
    pub fn exists(&self, owner: Option<&str>, scope: Scope, key: &str) -> Result<bool> {
        let full_key = build_key(scope, owner, key)?;
        Ok(self.store.find_by_full_key(&full_key)?.is_some())
    }

    /// Create a runtime preference; fails with [`Error::AlreadyExists`] when
    /// `key` is taken.
    pub fn create(&self, key: &PersistedKey, change: &PreferenceChange) -> Result<Preference> {
        if self.store.find_by_full_key(key)?.is_some() {
            return Err(Error::AlreadyExists(key.to_string()));
        }
        self.insert(key, change)
    }

    /// Create or update the preference stored under `key`.
    ///
    /// A new preference is created with `from_file = false`. An existing one
    /// keeps its identity and provenance; only value, type, description,
    /// bounds and group change.
    pub fn save(&self, key: &PersistedKey, change: &PreferenceChange) -> Result<Preference> {
        let Some(mut existing) = self.store.find_by_full_key(key)? else {
            return self.insert(key, change);
        };

        existing.apply(change)?;
        let saved = self.store.save(existing)?;
        tracing::debug!(key = %key, "updated preference");
        self.events.publish(PreferenceEvent::Updated {
            preference: saved.clone(),
        });
        Ok(saved)
    }

    /// Delete the preference stored under `key`.
    pub fn delete(&self, key: &PersistedKey) -> Result<()> {
        self.store.delete(key)?;
        tracing::debug!(key = %key, "deleted preference");
        self.events.publish(PreferenceEvent::Deleted {
            full_key: key.to_string(),
        });
        Ok(())
    }

    /// Merge the definition documents again, returning what changed.
    pub fn reload_initial_preferences(&self) -> Result<MergeReport> {
        self.engine.reload()
    }

    pub fn engine(&self) -> &Arc<MergeEngine> {
        &self.engine
    }

    pub fn store(&self) -> &Arc<dyn PreferenceStore> {
        &self.store
    }

    pub fn events(&self) -> &EventBus {
        &self.events
    }

    fn insert(&self, key: &PersistedKey, change: &PreferenceChange) -> Result<Preference> {
        let preference = Preference::create(key.clone(), change)?;
        let saved = self.store.save(preference)?;
        tracing::debug!(key = %key, "created preference");
        self.events.publish(PreferenceEvent::Created {
            preference: saved.clone(),
        });
        Ok(saved)
    }
}

fn check_owner(owner: Option<&str>, scope: Scope) -> Result<()> {
    let has_owner = owner.is_some_and(|o| !o.is_empty());
    if scope.requires_owner() != has_owner {
        return Err(Error::ScopeOwnerMismatch(scope));
    }
    Ok(())
}
