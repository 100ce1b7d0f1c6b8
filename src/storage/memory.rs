//! In-memory store.

use crate::models::{PersistedKey, Preference, PreferenceType, Scope};
use crate::storage::{PreferenceStore, StoreError, matches_owner, owner_filter};
use crate::{Error, Result};
use std::collections::BTreeMap;
use std::sync::{RwLock, RwLockReadGuard, RwLockWriteGuard};

/// Store backed by a sorted map behind a read/write lock.
#[derive(Debug, Default)]
pub struct MemoryStore {
    preferences: RwLock<BTreeMap<PersistedKey, Preference>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    fn read(&self) -> Result<RwLockReadGuard<'_, BTreeMap<PersistedKey, Preference>>> {
        self.preferences
            .read()
            .map_err(|_| Error::Store(StoreError::Poisoned))
    }

    fn write(&self) -> Result<RwLockWriteGuard<'_, BTreeMap<PersistedKey, Preference>>> {
        self.preferences
            .write()
            .map_err(|_| Error::Store(StoreError::Poisoned))
    }

    fn filter<F>(&self, predicate: F) -> Result<Vec<Preference>>
    where
        F: Fn(&Preference) -> bool,
    {
        Ok(self
            .read()?
            .values()
            .filter(|p| predicate(p))
            .cloned()
            .collect())
    }
}

impl PreferenceStore for MemoryStore {
    fn find_all(&self) -> Result<Vec<Preference>> {
        self.filter(|_| true)
    }

    fn find_all_by_owner_and_scope(
        &self,
        owner: Option<&str>,
        scope: Scope,
    ) -> Result<Vec<Preference>> {
        let owner = owner_filter(owner);
        self.filter(|p| p.key().scope() == scope && matches_owner(p, owner))
    }

    fn find_all_by_owner_and_scope_and_key(
        &self,
        owner: Option<&str>,
        scope: Scope,
        key: &str,
    ) -> Result<Vec<Preference>> {
        let owner = owner_filter(owner);
        self.filter(|p| p.key().scope() == scope && matches_owner(p, owner) && p.key().key() == key)
    }

    fn find_all_by_owner_and_scope_and_group(
        &self,
        owner: Option<&str>,
        scope: Scope,
        group: &str,
    ) -> Result<Vec<Preference>> {
        let owner = owner_filter(owner);
        self.filter(|p| p.key().scope() == scope && matches_owner(p, owner) && p.group == group)
    }

    fn find_by_full_key(&self, key: &PersistedKey) -> Result<Option<Preference>> {
        Ok(self.read()?.get(key).cloned())
    }

    fn find_by_type(&self, pref_type: PreferenceType) -> Result<Vec<Preference>> {
        self.filter(|p| p.pref_type == pref_type)
    }

    fn save(&self, preference: Preference) -> Result<Preference> {
        self.write()?
            .insert(preference.key().clone(), preference.clone());
        Ok(preference)
    }

    fn delete(&self, key: &PersistedKey) -> Result<()> {
        match self.write()?.remove(key) {
            Some(_) => Ok(()),
            None => Err(Error::NotFound(key.to_string())),
        }
    }

    fn location(&self) -> String {
        "memory".to_string()
    }

    fn backend_type(&self) -> &'static str {
        "memory"
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::contract;

    #[test]
    fn test_save_then_find() {
        contract::save_then_find(&MemoryStore::new());
    }

    #[test]
    fn test_save_is_upsert() {
        contract::save_is_upsert(&MemoryStore::new());
    }

    #[test]
    fn test_scoped_queries() {
        contract::scoped_queries(&MemoryStore::new());
    }

    #[test]
    fn test_delete_semantics() {
        contract::delete_semantics(&MemoryStore::new());
    }

    #[test]
    fn test_object_values_survive() {
        contract::object_values_survive(&MemoryStore::new());
    }
}
