//! Command implementations for the prefs CLI.
//!
//! Each command returns a result type implementing [`Output`], which the
//! binary prints as JSON or, with `-H`, as human-readable text.

use crate::config::ResolvedSettings;
use crate::definitions::{self, render};
use crate::merge::{MergeFailure, MergeReport};
use crate::models::{
    PersistedKey, Preference, PreferenceChange, PreferenceDefinition, PreferenceType, Scope,
};
use crate::service::PreferencesService;
use crate::{Error, Result};
use serde::Serialize;
use std::fmt::Write as _;
use std::fs;
use std::path::{Path, PathBuf};

/// Command results that can be serialized to JSON or formatted for humans.
pub trait Output {
    /// Serialize to JSON string.
    fn to_json(&self) -> String;

    /// Format for human-readable output.
    fn to_human(&self) -> String;
}

fn json<T: Serialize>(value: &T) -> String {
    serde_json::to_string(value).unwrap_or_else(|e| format!(r#"{{"error":"{}"}}"#, e))
}

// === Merge ===

/// Result of `prefs merge`.
#[derive(Serialize)]
pub struct MergeResult {
    pub source: String,
    pub inserted: Vec<String>,
    pub skipped: Vec<String>,
    pub failures: Vec<MergeFailure>,
    pub digest: String,
}

impl MergeResult {
    fn new(source: String, report: MergeReport) -> Self {
        Self {
            source,
            inserted: report.inserted.iter().map(|k| k.to_string()).collect(),
            skipped: report.skipped.iter().map(|k| k.to_string()).collect(),
            failures: report.failures,
            digest: report.digest,
        }
    }

    /// True when every definition merged.
    pub fn is_clean(&self) -> bool {
        self.failures.is_empty()
    }
}

impl Output for MergeResult {
    fn to_json(&self) -> String {
        json(self)
    }

    fn to_human(&self) -> String {
        let mut out = format!(
            "Merged {}: {} inserted, {} skipped, {} failed",
            self.source,
            self.inserted.len(),
            self.skipped.len(),
            self.failures.len()
        );
        for key in &self.inserted {
            let _ = write!(out, "\n  + {}", key);
        }
        for failure in &self.failures {
            let _ = write!(out, "\n  ! {}: {}", failure.entry, failure.reason);
        }
        out
    }
}

/// Merge the definition documents. With `wait` false, fail if a merge is
/// already running instead of queueing behind it.
pub fn merge(service: &PreferencesService, wait: bool) -> Result<MergeResult> {
    let engine = service.engine();
    let report = if wait {
        service.reload_initial_preferences()?
    } else {
        engine.try_merge()?
    };
    Ok(MergeResult::new(engine.source(), report))
}

// === Reads ===

/// A list of preferences.
#[derive(Serialize)]
pub struct PreferenceList {
    pub preferences: Vec<Preference>,
    pub count: usize,
}

impl Output for PreferenceList {
    fn to_json(&self) -> String {
        json(self)
    }

    fn to_human(&self) -> String {
        if self.preferences.is_empty() {
            return "No preferences.".to_string();
        }
        let mut out = format!("{} preference(s):", self.count);
        for pref in &self.preferences {
            let _ = write!(out, "\n  {}", summary_line(pref));
        }
        out
    }
}

fn summary_line(pref: &Preference) -> String {
    let origin = if pref.from_file { "file" } else { "runtime" };
    format!(
        "{} = {} ({}, {})",
        pref.key(),
        pref.value,
        pref.pref_type,
        origin
    )
}

/// Filters for `prefs list`.
#[derive(Debug, Clone, Default)]
pub struct ListFilter {
    pub scope: Option<Scope>,
    pub owner: Option<String>,
    pub group: Option<String>,
    pub pref_type: Option<PreferenceType>,
}

/// List preferences matching `filter`.
pub fn list(service: &PreferencesService, filter: &ListFilter) -> Result<PreferenceList> {
    let owner = filter.owner.as_deref();
    let mut preferences = match (filter.scope, filter.group.as_deref()) {
        (Some(scope), Some(group)) => service.find_by_group(owner, scope, group)?,
        (Some(scope), None) => service.find_all_for(owner, scope)?,
        (None, _) => match filter.pref_type {
            Some(pref_type) => service.find_by_type(pref_type)?,
            None => service.find_all()?,
        },
    };
    if let Some(pref_type) = filter.pref_type {
        preferences.retain(|p| p.pref_type == pref_type);
    }
    Ok(PreferenceList {
        count: preferences.len(),
        preferences,
    })
}

/// A single preference.
#[derive(Serialize)]
#[serde(transparent)]
pub struct PreferenceView {
    pub preference: Preference,
}

impl Output for PreferenceView {
    fn to_json(&self) -> String {
        json(self)
    }

    fn to_human(&self) -> String {
        let p = &self.preference;
        let mut out = format!("{}\n  value: {}\n  type: {}", p.key(), p.value, p.pref_type);
        if let Some(ref description) = p.description {
            let _ = write!(out, "\n  description: {}", description);
        }
        if let Some(min) = p.minimum {
            let _ = write!(out, "\n  minimum: {}", min);
        }
        if let Some(max) = p.maximum {
            let _ = write!(out, "\n  maximum: {}", max);
        }
        let _ = write!(
            out,
            "\n  group: {}\n  from file: {}\n  last modified: {}",
            p.group,
            p.from_file,
            p.last_modified.to_rfc3339()
        );
        out
    }
}

/// How `prefs get` addresses a preference.
#[derive(Debug, Clone)]
pub enum Lookup {
    FullKey(PersistedKey),
    Parts {
        scope: Scope,
        owner: Option<String>,
        key: String,
    },
}

/// Show one preference.
pub fn get(service: &PreferencesService, lookup: &Lookup) -> Result<PreferenceView> {
    let preference = match lookup {
        Lookup::FullKey(key) => service.find_by_full_key(key)?,
        Lookup::Parts { scope, owner, key } => service.find_by(owner.as_deref(), *scope, key)?,
    };
    Ok(PreferenceView { preference })
}

// === Writes ===

/// Create or update a preference.
pub fn set(
    service: &PreferencesService,
    key: &PersistedKey,
    change: &PreferenceChange,
) -> Result<PreferenceView> {
    let preference = service.save(key, change)?;
    Ok(PreferenceView { preference })
}

/// Create a preference that must not exist yet.
pub fn create(
    service: &PreferencesService,
    key: &PersistedKey,
    change: &PreferenceChange,
) -> Result<PreferenceView> {
    let preference = service.create(key, change)?;
    Ok(PreferenceView { preference })
}

/// Result of `prefs delete`.
#[derive(Serialize)]
pub struct Deleted {
    pub full_key: String,
    pub deleted: bool,
}

impl Output for Deleted {
    fn to_json(&self) -> String {
        json(self)
    }

    fn to_human(&self) -> String {
        format!("Deleted {}", self.full_key)
    }
}

/// Delete a preference.
pub fn delete(service: &PreferencesService, key: &PersistedKey) -> Result<Deleted> {
    service.delete(key)?;
    Ok(Deleted {
        full_key: key.to_string(),
        deleted: true,
    })
}

// === Check ===

/// Validation outcome for one document.
#[derive(Serialize)]
pub struct CheckedFile {
    pub path: PathBuf,
    pub valid: bool,
    pub definitions: usize,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

/// Result of `prefs check`.
#[derive(Serialize)]
pub struct CheckResult {
    pub valid: bool,
    pub files: Vec<CheckedFile>,
}

impl Output for CheckResult {
    fn to_json(&self) -> String {
        json(self)
    }

    fn to_human(&self) -> String {
        self.files
            .iter()
            .map(|f| match f.error {
                Some(ref e) => format!("FAIL {}: {}", f.path.display(), e),
                None => format!("ok   {} ({} definitions)", f.path.display(), f.definitions),
            })
            .collect::<Vec<_>>()
            .join("\n")
    }
}

/// Validate definition documents. Nothing is written to the store.
pub fn check(files: &[PathBuf]) -> CheckResult {
    let files: Vec<CheckedFile> = files.iter().map(|path| check_file(path)).collect();
    CheckResult {
        valid: files.iter().all(|f| f.valid),
        files,
    }
}

fn check_file(path: &Path) -> CheckedFile {
    let outcome = fs::read_to_string(path)
        .map_err(Error::from)
        .and_then(|text| definitions::load(&path.display().to_string(), &text));
    match outcome {
        Ok(defs) => CheckedFile {
            path: path.to_path_buf(),
            valid: true,
            definitions: defs.len(),
            error: None,
        },
        Err(e) => CheckedFile {
            path: path.to_path_buf(),
            valid: false,
            definitions: 0,
            error: Some(e.to_string()),
        },
    }
}

// === Export ===

/// Result of `prefs export --output`.
#[derive(Serialize)]
pub struct Exported {
    pub path: PathBuf,
    pub count: usize,
}

impl Output for Exported {
    fn to_json(&self) -> String {
        json(self)
    }

    fn to_human(&self) -> String {
        format!("Exported {} preference(s) to {}", self.count, self.path.display())
    }
}

/// Render every stored preference as a definitions document.
pub fn export(service: &PreferencesService) -> Result<String> {
    let definitions: Vec<PreferenceDefinition> = service
        .find_all()?
        .iter()
        .map(Preference::to_definition)
        .collect();
    Ok(render(&definitions))
}

/// Write the definitions document for the stored preferences to `path`.
pub fn export_to(service: &PreferencesService, path: &Path) -> Result<Exported> {
    let count = service.find_all()?.len();
    fs::write(path, export(service)?)?;
    Ok(Exported {
        path: path.to_path_buf(),
        count,
    })
}

// === Config ===

/// Result of `prefs config show`.
#[derive(Serialize)]
#[serde(transparent)]
pub struct ConfigView {
    pub settings: ResolvedSettings,
}

impl Output for ConfigView {
    fn to_json(&self) -> String {
        json(self)
    }

    fn to_human(&self) -> String {
        let s = &self.settings;
        let config = match s.config_path {
            Some(ref p) => format!("{} ({})", p.value.display(), p.source),
            None => "none".to_string(),
        };
        let definitions = if s.definitions.value.is_empty() {
            "none".to_string()
        } else {
            s.definitions
                .value
                .iter()
                .map(|p| p.display().to_string())
                .collect::<Vec<_>>()
                .join(", ")
        };
        format!(
            "config: {}\ndatabase: {} ({})\ndefinitions: {} ({})\nmerge-on-startup: {} ({})\nlog-level: {} ({})",
            config,
            s.database.value,
            s.database.source,
            definitions,
            s.definitions.source,
            s.merge_on_startup.value,
            s.merge_on_startup.source,
            s.log_level.value,
            s.log_level.source
        )
    }
}

/// Show the resolved configuration.
pub fn config_show(settings: &ResolvedSettings) -> ConfigView {
    ConfigView {
        settings: settings.clone(),
    }
}
