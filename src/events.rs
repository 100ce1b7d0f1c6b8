//! Change notifications.
//!
//! Events are plain messages delivered over channels. Every subscriber gets
//! its own receiver; a subscriber that has gone away is dropped on the next
//! publish.

use crate::models::Preference;
use chrono::{DateTime, Utc};
use serde::Serialize;
use std::sync::mpsc::{self, Receiver, Sender};
use std::sync::{Arc, Mutex};

/// Outcome of one completed merge pass, in the form carried by events.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct MergeSummary {
    pub inserted: usize,
    pub skipped: usize,
    pub failed: usize,
    /// SHA-256 of the definition documents that were merged
    pub digest: String,
    pub completed_at: DateTime<Utc>,
}

/// Something that happened to the preference set.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "event", rename_all = "snake_case")]
pub enum PreferenceEvent {
    Created { preference: Preference },
    Updated { preference: Preference },
    Deleted { full_key: String },
    Merged { summary: MergeSummary },
}

impl PreferenceEvent {
    /// Short event name, as used in the serialized `event` tag.
    pub fn name(&self) -> &'static str {
        match self {
            PreferenceEvent::Created { .. } => "created",
            PreferenceEvent::Updated { .. } => "updated",
            PreferenceEvent::Deleted { .. } => "deleted",
            PreferenceEvent::Merged { .. } => "merged",
        }
    }
}

/// Inbound signal asking for the definitions to be merged again.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ReloadRequest;

/// Fan-out of [`PreferenceEvent`]s to any number of subscribers.
#[derive(Debug, Clone, Default)]
pub struct EventBus {
    subscribers: Arc<Mutex<Vec<Sender<PreferenceEvent>>>>,
}

impl EventBus {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a new subscriber. Events published from now on are delivered
    /// to the returned receiver.
    pub fn subscribe(&self) -> Receiver<PreferenceEvent> {
        let (tx, rx) = mpsc::channel();
        self.lock().push(tx);
        rx
    }

    /// Deliver `event` to every live subscriber.
    pub fn publish(&self, event: PreferenceEvent) {
        let mut subscribers = self.lock();
        subscribers.retain(|tx| tx.send(event.clone()).is_ok());
        tracing::trace!(event = event.name(), subscribers = subscribers.len(), "published event");
    }

    /// Number of live subscribers as of the last publish.
    pub fn subscriber_count(&self) -> usize {
        self.lock().len()
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, Vec<Sender<PreferenceEvent>>> {
        // Senders hold no invariant a panic could break.
        self.subscribers
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{PersistedKey, TypedValue};

    fn created() -> PreferenceEvent {
        let key: PersistedKey = "application/timeout".parse().unwrap();
        PreferenceEvent::Created {
            preference: Preference::new(key, TypedValue::Int(30)),
        }
    }

    #[test]
    fn test_every_subscriber_receives() {
        let bus = EventBus::new();
        let a = bus.subscribe();
        let b = bus.subscribe();

        bus.publish(created());
        assert_eq!(a.try_recv().unwrap().name(), "created");
        assert_eq!(b.try_recv().unwrap().name(), "created");
    }

    #[test]
    fn test_dropped_subscriber_is_pruned() {
        let bus = EventBus::new();
        let kept = bus.subscribe();
        drop(bus.subscribe());

        bus.publish(created());
        assert_eq!(bus.subscriber_count(), 1);
        assert!(kept.try_recv().is_ok());
    }

    #[test]
    fn test_event_serializes_with_tag() {
        let json = serde_json::to_value(PreferenceEvent::Deleted {
            full_key: "user/alice/theme".to_string(),
        })
        .unwrap();
        assert_eq!(json["event"], "deleted");
        assert_eq!(json["full_key"], "user/alice/theme");
    }
}
