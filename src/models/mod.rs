//! Data models for preferences.
//!
//! This module defines the core data structures:
//! - `Scope` - Visibility tier (application, module, role, user)
//! - `PreferenceType` - Declared value type
//! - `PreferenceDefinition` - A file-defined preference, immutable once loaded
//! - `Preference` - A stored preference with provenance
//! - `PreferenceChange` - A partial update applied through the service

pub mod key;
pub mod value;

pub use key::{PersistedKey, build_key};
pub use value::{TypedValue, coerce, format};

use crate::{Error, Result};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Group name given to preferences that do not declare one.
pub const DEFAULT_GROUP: &str = "GLOBAL";

/// Visibility tier of a preference.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum Scope {
    Application,
    Module,
    Role,
    User,
}

impl Scope {
    /// All scopes, in merge order.
    pub const ALL: [Scope; 4] = [Scope::Application, Scope::Module, Scope::Role, Scope::User];

    /// Parse from string, case-insensitive.
    pub fn parse(s: &str) -> Option<Self> {
        match s.to_lowercase().as_str() {
            "application" => Some(Scope::Application),
            "module" => Some(Scope::Module),
            "role" => Some(Scope::Role),
            "user" => Some(Scope::User),
            _ => None,
        }
    }

    /// Lowercase name, also the definition node name for this scope.
    pub fn as_str(&self) -> &'static str {
        match self {
            Scope::Application => "application",
            Scope::Module => "module",
            Scope::Role => "role",
            Scope::User => "user",
        }
    }

    /// Whether preferences of this scope must name an owner.
    pub fn requires_owner(&self) -> bool {
        !matches!(self, Scope::Application)
    }

    /// The owner rule of this scope, worded for error messages.
    pub fn owner_rule(&self) -> &'static str {
        if self.requires_owner() {
            "requires an owner"
        } else {
            "does not take an owner"
        }
    }
}

impl fmt::Display for Scope {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str().to_uppercase())
    }
}

impl std::str::FromStr for Scope {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        Scope::parse(s).ok_or_else(|| Error::InvalidKey(format!("unknown scope: {}", s)))
    }
}

/// Declared type of a preference value.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum PreferenceType {
    String,
    Int,
    Float,
    Bool,
    Object,
}

impl PreferenceType {
    /// Parse from string, case-insensitive.
    pub fn parse(s: &str) -> Option<Self> {
        match s.to_uppercase().as_str() {
            "STRING" => Some(PreferenceType::String),
            "INT" => Some(PreferenceType::Int),
            "FLOAT" => Some(PreferenceType::Float),
            "BOOL" => Some(PreferenceType::Bool),
            "OBJECT" => Some(PreferenceType::Object),
            _ => None,
        }
    }

    /// Uppercase tag as written in definition documents.
    pub fn as_str(&self) -> &'static str {
        match self {
            PreferenceType::String => "STRING",
            PreferenceType::Int => "INT",
            PreferenceType::Float => "FLOAT",
            PreferenceType::Bool => "BOOL",
            PreferenceType::Object => "OBJECT",
        }
    }

    /// Whether minimum/maximum bounds apply to this type.
    pub fn is_numeric(&self) -> bool {
        matches!(self, PreferenceType::Int | PreferenceType::Float)
    }
}

impl fmt::Display for PreferenceType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl std::str::FromStr for PreferenceType {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        PreferenceType::parse(s).ok_or_else(|| Error::TypeCoercion {
            value: s.to_string(),
            pref_type: PreferenceType::String,
            reason: "unknown preference type".to_string(),
        })
    }
}

/// A preference as declared in a definition document.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PreferenceDefinition {
    pub scope: Scope,
    /// Module, role or user name; `None` for application preferences
    #[serde(skip_serializing_if = "Option::is_none")]
    pub owner: Option<String>,
    pub key: String,
    /// Raw value text, validated against `pref_type` at merge time
    pub value: String,
    #[serde(rename = "type")]
    pub pref_type: PreferenceType,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub minimum: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub maximum: Option<f64>,
    pub group: String,
}

impl PreferenceDefinition {
    /// Persisted key this definition seeds.
    pub fn persisted_key(&self) -> Result<PersistedKey> {
        build_key(self.scope, self.owner.as_deref(), &self.key)
    }

    /// The definition's value coerced to its declared type and bounds.
    pub fn typed_value(&self) -> Result<TypedValue> {
        coerce(&self.value, self.pref_type, self.minimum, self.maximum)
    }
}

/// A preference held by the store.
///
/// The identity (`scope`, `owner`, `key`) is fixed at construction; the rest
/// may change through [`Preference::apply`].
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Preference {
    #[serde(flatten)]
    key: PersistedKey,
    pub value: TypedValue,
    #[serde(rename = "type")]
    pub pref_type: PreferenceType,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub minimum: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub maximum: Option<f64>,
    pub group: String,
    /// True when seeded from a definition document
    pub from_file: bool,
    pub last_modified: DateTime<Utc>,
}

impl Preference {
    /// Create a runtime preference holding `value`.
    pub fn new(key: PersistedKey, value: TypedValue) -> Self {
        Self {
            key,
            pref_type: value.pref_type(),
            value,
            description: None,
            minimum: None,
            maximum: None,
            group: DEFAULT_GROUP.to_string(),
            from_file: false,
            last_modified: Utc::now(),
        }
    }

    /// Seed a stored preference from a definition (`from_file = true`).
    pub fn from_definition(def: &PreferenceDefinition) -> Result<Self> {
        let key = def.persisted_key()?;
        let mut pref = Self::new(key, def.typed_value()?);
        pref.description = def.description.clone();
        pref.minimum = def.minimum;
        pref.maximum = def.maximum;
        pref.group = def.group.clone();
        pref.from_file = true;
        Ok(pref)
    }

    /// Create a runtime preference (`from_file = false`) from a change set.
    ///
    /// Type defaults to STRING and value to the empty string.
    pub fn create(key: PersistedKey, change: &PreferenceChange) -> Result<Self> {
        change.check_identity(&key)?;
        let pref_type = change.pref_type.unwrap_or(PreferenceType::String);
        check_bounds(pref_type, change.minimum, change.maximum)?;
        let raw = change.value.as_deref().unwrap_or("");
        let value = coerce(raw, pref_type, change.minimum, change.maximum)?;

        let mut pref = Self::new(key, value);
        pref.description = change.description.clone();
        pref.minimum = change.minimum;
        pref.maximum = change.maximum;
        if let Some(ref group) = change.group {
            pref.group = group.clone();
        }
        Ok(pref)
    }

    /// Identity of this preference.
    pub fn key(&self) -> &PersistedKey {
        &self.key
    }

    /// Definition that would seed this preference as it is now.
    pub fn to_definition(&self) -> PreferenceDefinition {
        PreferenceDefinition {
            scope: self.key.scope(),
            owner: self.key.owner().map(str::to_string),
            key: self.key.key().to_string(),
            value: format(&self.value),
            pref_type: self.pref_type,
            description: self.description.clone(),
            minimum: self.minimum.filter(|_| self.pref_type.is_numeric()),
            maximum: self.maximum.filter(|_| self.pref_type.is_numeric()),
            group: self.group.clone(),
        }
    }

    /// Apply a change set in place.
    ///
    /// Value, type, description, bounds and group may change; provenance
    /// and identity never do. The value is re-coerced against the resulting
    /// type and bounds, and nothing is modified when that fails.
    pub fn apply(&mut self, change: &PreferenceChange) -> Result<()> {
        change.check_identity(&self.key)?;

        let pref_type = change.pref_type.unwrap_or(self.pref_type);
        check_bounds(pref_type, change.minimum, change.maximum)?;
        // Stored bounds lapse when the type stops being numeric
        let (minimum, maximum) = if pref_type.is_numeric() {
            (change.minimum.or(self.minimum), change.maximum.or(self.maximum))
        } else {
            (None, None)
        };
        check_bounds(pref_type, minimum, maximum)?;

        let raw = match change.value {
            Some(ref v) => v.clone(),
            None => format(&self.value),
        };
        let value = coerce(&raw, pref_type, minimum, maximum)?;

        self.value = value;
        self.pref_type = pref_type;
        self.minimum = minimum;
        self.maximum = maximum;
        if let Some(ref description) = change.description {
            self.description = Some(description.clone());
        }
        if let Some(ref group) = change.group {
            self.group = group.clone();
        }
        self.last_modified = Utc::now();
        Ok(())
    }
}

fn check_bounds(
    pref_type: PreferenceType,
    minimum: Option<f64>,
    maximum: Option<f64>,
) -> Result<()> {
    if (minimum.is_some() || maximum.is_some()) && !pref_type.is_numeric() {
        return Err(Error::BoundsNotAllowed(pref_type));
    }
    if let (Some(min), Some(max)) = (minimum, maximum)
        && min > max
    {
        return Err(Error::InvalidBounds { minimum: min, maximum: max });
    }
    Ok(())
}

/// A partial preference used for creates and updates.
///
/// Identity fields are optional; when given they must match the target key.
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
pub struct PreferenceChange {
    pub scope: Option<Scope>,
    pub owner: Option<String>,
    pub key: Option<String>,
    pub value: Option<String>,
    #[serde(rename = "type")]
    pub pref_type: Option<PreferenceType>,
    pub description: Option<String>,
    pub minimum: Option<f64>,
    pub maximum: Option<f64>,
    pub group: Option<String>,
}

impl PreferenceChange {
    /// A change that only sets the value.
    pub fn value(value: impl Into<String>) -> Self {
        Self {
            value: Some(value.into()),
            ..Default::default()
        }
    }

    fn check_identity(&self, key: &PersistedKey) -> Result<()> {
        if let Some(scope) = self.scope
            && scope != key.scope()
        {
            return Err(Error::ImmutableKeyField { field: "scope" });
        }
        if let Some(ref owner) = self.owner
            && Some(owner.as_str()).filter(|o| !o.is_empty()) != key.owner()
        {
            return Err(Error::ImmutableKeyField { field: "owner" });
        }
        if let Some(ref k) = self.key
            && k != key.key()
        {
            return Err(Error::ImmutableKeyField { field: "key" });
        }
        Ok(())
    }
}
