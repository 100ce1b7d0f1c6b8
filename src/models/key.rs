//! Persisted key construction.
//!
//! A [`PersistedKey`] is the structural identity of a preference in the store:
//! the scope, the owner (module, role or user name) and the declared key text.
//! Every other component addresses preferences through it.
//!
//! The text form is `application/<key>` for application preferences and
//! `<scope>/<owner>/<key>` otherwise. Owners may not contain `/`, which keeps
//! the text form unambiguous; keys may.

use crate::models::Scope;
use crate::{Error, Result};
use serde::Serialize;
use serde::ser::{SerializeStruct, Serializer};
use std::fmt;
use std::str::FromStr;

/// Separator used in the text form of a persisted key.
pub const KEY_SEPARATOR: char = '/';

/// Structural identity of a stored preference.
///
/// Fields are private; the only way to obtain a key is [`build_key`] (or
/// parsing the text form), so a key never lacks the owner its scope requires.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct PersistedKey {
    scope: Scope,
    owner: Option<String>,
    key: String,
}

impl PersistedKey {
    /// Scope of the preference.
    pub fn scope(&self) -> Scope {
        self.scope
    }

    /// Owner name, `None` for application preferences.
    pub fn owner(&self) -> Option<&str> {
        self.owner.as_deref()
    }

    /// Declared key text.
    pub fn key(&self) -> &str {
        &self.key
    }
}

/// Build a persisted key from its identifying fields.
///
/// An empty owner string counts as absent. Fails with [`Error::InvalidKey`]
/// when `key` is empty, when a module/role/user scope lacks an owner, when an
/// application scope is given one, or when the owner contains `/`.
pub fn build_key(scope: Scope, owner: Option<&str>, key: &str) -> Result<PersistedKey> {
    if key.is_empty() {
        return Err(Error::InvalidKey("key must not be empty".to_string()));
    }

    let owner = owner.filter(|o| !o.is_empty());
    match (scope.requires_owner(), owner) {
        (true, None) => {
            return Err(Error::InvalidKey(format!(
                "{} preference '{}' requires an owner",
                scope, key
            )));
        }
        (false, Some(o)) => {
            return Err(Error::InvalidKey(format!(
                "{} preference '{}' cannot have an owner, got '{}'",
                scope, key, o
            )));
        }
        _ => {}
    }

    if let Some(o) = owner
        && o.contains(KEY_SEPARATOR)
    {
        return Err(Error::InvalidKey(format!(
            "owner must not contain '{}': {}",
            KEY_SEPARATOR, o
        )));
    }

    Ok(PersistedKey {
        scope,
        owner: owner.map(str::to_string),
        key: key.to_string(),
    })
}

impl fmt::Display for PersistedKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.owner {
            Some(owner) => write!(
                f,
                "{}{sep}{}{sep}{}",
                self.scope.as_str(),
                owner,
                self.key,
                sep = KEY_SEPARATOR
            ),
            None => write!(f, "{}{}{}", self.scope.as_str(), KEY_SEPARATOR, self.key),
        }
    }
}

impl FromStr for PersistedKey {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        let (scope_str, rest) = s.split_once(KEY_SEPARATOR).ok_or_else(|| {
            Error::InvalidKey(format!(
                "expected '<scope>/<key>' or '<scope>/<owner>/<key>', got: {}",
                s
            ))
        })?;
        let scope = Scope::parse(scope_str)
            .ok_or_else(|| Error::InvalidKey(format!("unknown scope: {}", scope_str)))?;

        if scope.requires_owner() {
            let (owner, key) = rest.split_once(KEY_SEPARATOR).ok_or_else(|| {
                Error::InvalidKey(format!("{} key must name an owner: {}", scope, s))
            })?;
            build_key(scope, Some(owner), key)
        } else {
            build_key(scope, None, rest)
        }
    }
}

impl Serialize for PersistedKey {
    fn serialize<S: Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        let mut state = serializer.serialize_struct("PersistedKey", 4)?;
        state.serialize_field("full_key", &self.to_string())?;
        state.serialize_field("scope", &self.scope)?;
        state.serialize_field("owner", &self.owner)?;
        state.serialize_field("key", &self.key)?;
        state.end()
    }
}
