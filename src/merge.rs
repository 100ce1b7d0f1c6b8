//! Merge engine: seeds definition documents into the store.
//!
//! A merge pass reads every document from the configured source, walks the
//! definitions one scope category at a time and inserts each one whose
//! persisted key is absent from the store. Keys already present are left
//! alone, so live overrides always win over file values.
//!
//! Bad entries and failed writes are recorded in the [`MergeReport`] and the
//! pass carries on with the remaining definitions.
//!
//! Only one pass runs at a time. [`MergeEngine::merge`] waits for a running
//! pass to finish; [`MergeEngine::try_merge`] fails with
//! [`Error::MergeInProgress`] instead.

use crate::definitions::{DefinitionDocument, DefinitionSource, digest};
use crate::events::{EventBus, MergeSummary, PreferenceEvent, ReloadRequest};
use crate::models::{PersistedKey, Preference, PreferenceDefinition, Scope};
use crate::storage::PreferenceStore;
use crate::{Error, Result};
use chrono::Utc;
use serde::Serialize;
use std::collections::HashSet;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::mpsc::{self, Sender};
use std::sync::{Arc, Mutex, MutexGuard, TryLockError};
use std::thread::{self, JoinHandle};

/// A definition that could not be merged.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct MergeFailure {
    /// Document entry or persisted key the failure belongs to
    pub entry: String,
    pub reason: String,
}

impl MergeFailure {
    fn from_error(fallback_entry: impl Into<String>, err: Error) -> Self {
        match err {
            Error::MalformedDefinition { entry, reason } => Self { entry, reason },
            other => Self {
                entry: fallback_entry.into(),
                reason: other.to_string(),
            },
        }
    }
}

/// Result of one merge pass.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct MergeReport {
    pub inserted: Vec<PersistedKey>,
    pub skipped: Vec<PersistedKey>,
    pub failures: Vec<MergeFailure>,
    /// SHA-256 of the merged documents
    pub digest: String,
}

impl MergeReport {
    /// True when no definition failed.
    pub fn is_clean(&self) -> bool {
        self.failures.is_empty()
    }

    /// Counts-only form carried by the merge-completion event.
    pub fn summary(&self) -> MergeSummary {
        MergeSummary {
            inserted: self.inserted.len(),
            skipped: self.skipped.len(),
            failed: self.failures.len(),
            digest: self.digest.clone(),
            completed_at: Utc::now(),
        }
    }

    fn fail(&mut self, fallback_entry: impl Into<String>, err: Error) {
        let failure = MergeFailure::from_error(fallback_entry, err);
        tracing::warn!(entry = %failure.entry, reason = %failure.reason, "definition not merged");
        self.failures.push(failure);
    }
}

/// Reconciles definition documents with the store.
pub struct MergeEngine {
    source: Box<dyn DefinitionSource>,
    store: Arc<dyn PreferenceStore>,
    events: EventBus,
    pass: Mutex<()>,
    merging: AtomicBool,
}

impl MergeEngine {
    pub fn new(
        source: Box<dyn DefinitionSource>,
        store: Arc<dyn PreferenceStore>,
        events: EventBus,
    ) -> Self {
        Self {
            source,
            store,
            events,
            pass: Mutex::new(()),
            merging: AtomicBool::new(false),
        }
    }

    /// Run a merge pass, waiting for any pass already running to finish.
    pub fn merge(&self) -> Result<MergeReport> {
        // The guard protects no data, so a poisoned lock is still usable.
        let guard = self
            .pass
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner());
        self.run_pass(guard)
    }

    /// Run a merge pass, or fail with [`Error::MergeInProgress`] when one is
    /// already running.
    pub fn try_merge(&self) -> Result<MergeReport> {
        let guard = match self.pass.try_lock() {
            Ok(guard) => guard,
            Err(TryLockError::Poisoned(poisoned)) => poisoned.into_inner(),
            Err(TryLockError::WouldBlock) => return Err(Error::MergeInProgress),
        };
        self.run_pass(guard)
    }

    /// Merge again in response to a reload signal.
    pub fn reload(&self) -> Result<MergeReport> {
        tracing::info!(source = %self.source.describe(), "reload requested");
        self.merge()
    }

    /// Whether a pass is running right now.
    pub fn is_merging(&self) -> bool {
        self.merging.load(Ordering::SeqCst)
    }

    /// Description of the definition source.
    pub fn source(&self) -> String {
        self.source.describe()
    }

    fn run_pass(&self, _guard: MutexGuard<'_, ()>) -> Result<MergeReport> {
        self.merging.store(true, Ordering::SeqCst);
        let result = self.merge_documents();
        self.merging.store(false, Ordering::SeqCst);

        let report = result?;
        tracing::info!(
            inserted = report.inserted.len(),
            skipped = report.skipped.len(),
            failed = report.failures.len(),
            digest = %report.digest,
            "merge complete"
        );
        self.events.publish(PreferenceEvent::Merged {
            summary: report.summary(),
        });
        Ok(report)
    }

    fn merge_documents(&self) -> Result<MergeReport> {
        let sources = self.source.read()?;
        let mut report = MergeReport {
            digest: digest(&sources),
            ..Default::default()
        };

        let mut documents = Vec::with_capacity(sources.len());
        for source in &sources {
            match DefinitionDocument::parse(source.name.as_str(), &source.text) {
                Ok(doc) => documents.push(doc),
                Err(e) => report.fail(source.name.as_str(), e),
            }
        }

        let mut seen: HashSet<PersistedKey> = HashSet::new();
        for scope in Scope::ALL {
            for document in &documents {
                for def in document.definitions_for(scope) {
                    let def = match def {
                        Ok(def) => def,
                        Err(e) => {
                            report.fail(document.name(), e);
                            continue;
                        }
                    };
                    let key = match def.persisted_key() {
                        Ok(key) => key,
                        Err(e) => {
                            report.fail(document.name(), e);
                            continue;
                        }
                    };
                    if !seen.insert(key.clone()) {
                        report.fail(
                            document.name(),
                            Error::MalformedDefinition {
                                entry: format!("{}: {}", document.name(), key),
                                reason: "duplicate of an earlier definition".to_string(),
                            },
                        );
                        continue;
                    }
                    self.merge_one(&def, key, &mut report);
                }
            }
        }

        Ok(report)
    }

    fn merge_one(
        &self,
        def: &PreferenceDefinition,
        key: PersistedKey,
        report: &mut MergeReport,
    ) {
        match self.store.find_by_full_key(&key) {
            Ok(Some(_)) => {
                tracing::debug!(key = %key, "already stored, keeping store value");
                report.skipped.push(key);
            }
            Ok(None) => {
                match Preference::from_definition(def).and_then(|p| self.store.save(p)) {
                    Ok(saved) => {
                        tracing::debug!(key = %key, "inserted from definition");
                        self.events
                            .publish(PreferenceEvent::Created { preference: saved });
                        report.inserted.push(key);
                    }
                    Err(e) => report.fail(key.to_string(), e),
                }
            }
            Err(e) => report.fail(key.to_string(), e),
        }
    }
}

/// Sending side of the reload listener.
#[derive(Debug, Clone)]
pub struct ReloadHandle {
    tx: Sender<ReloadRequest>,
}

impl ReloadHandle {
    /// Ask for a reload. Returns false once the listener has stopped.
    pub fn request(&self) -> bool {
        self.tx.send(ReloadRequest).is_ok()
    }
}

/// Start a thread that reloads `engine` for every [`ReloadRequest`].
///
/// Requests that pile up while a pass is running are coalesced into a single
/// follow-up pass. The thread exits once every [`ReloadHandle`] is dropped.
pub fn spawn_reload_listener(engine: Arc<MergeEngine>) -> Result<(ReloadHandle, JoinHandle<()>)> {
    let (tx, rx) = mpsc::channel::<ReloadRequest>();
    let handle = thread::Builder::new()
        .name("prefs-reload".to_string())
        .spawn(move || {
            while rx.recv().is_ok() {
                let coalesced = rx.try_iter().count();
                if coalesced > 0 {
                    tracing::debug!(coalesced, "coalesced pending reload requests");
                }
                if let Err(e) = engine.reload() {
                    tracing::warn!(error = %e, "reload failed");
                }
            }
            tracing::debug!("reload listener stopped");
        })?;
    Ok((ReloadHandle { tx }, handle))
}
