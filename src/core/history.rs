//! Execution history of a process instance.
//!
//! History is append-only. Entries are ordered by the order in which
//! transitions were applied, never by their timestamps, so clock skew
//! between hosts cannot reorder a restored history.

use super::state::StatePath;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::time::Duration;

/// Record of one applied transition.
///
/// # Example
///
/// ```rust
/// use statecraft::core::{HistoryEntry, StatePath};
/// use serde_json::json;
/// use chrono::Utc;
///
/// let entry = HistoryEntry {
///     from: StatePath::parse("idle"),
///     to: StatePath::parse("checking"),
///     event: "check".to_string(),
///     timestamp: Utc::now(),
///     payload: json!({"sku": "A-1"}),
/// };
/// assert_eq!(entry.to.to_string(), "checking");
/// ```
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct HistoryEntry {
    /// Leaf path before the transition
    pub from: StatePath,
    /// Leaf path after the transition
    pub to: StatePath,
    /// Event that triggered the transition
    pub event: String,
    /// When the transition was applied
    pub timestamp: DateTime<Utc>,
    /// Payload supplied with the event
    pub payload: Value,
}

/// Ordered history of applied transitions.
///
/// `record` returns a new history with the entry appended and leaves the
/// original untouched.
///
/// # Example
///
/// ```rust
/// use statecraft::core::{HistoryEntry, ProcessHistory, StatePath};
/// use serde_json::Value;
/// use chrono::Utc;
///
/// let entry = |from: &str, to: &str, event: &str| HistoryEntry {
///     from: StatePath::parse(from),
///     to: StatePath::parse(to),
///     event: event.to_string(),
///     timestamp: Utc::now(),
///     payload: Value::Null,
/// };
///
/// let history = ProcessHistory::new()
///     .record(entry("idle", "checking", "check"))
///     .record(entry("checking", "ordering", "low"));
///
/// let path = history.get_path();
/// assert_eq!(path.len(), 3); // idle -> checking -> ordering
/// assert_eq!(path[2].to_string(), "ordering");
/// ```
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ProcessHistory {
    entries: Vec<HistoryEntry>,
}

impl ProcessHistory {
    pub fn new() -> Self {
        Self {
            entries: Vec::new(),
        }
    }

    /// Rebuild a history from entries already in application order.
    pub fn from_entries(entries: Vec<HistoryEntry>) -> Self {
        Self { entries }
    }

    /// Record an entry, returning a new history.
    pub fn record(&self, entry: HistoryEntry) -> Self {
        let mut entries = self.entries.clone();
        entries.push(entry);
        Self { entries }
    }

    /// Append in place. Used by the engine when committing a transition.
    pub(crate) fn push(&mut self, entry: HistoryEntry) {
        self.entries.push(entry);
    }

    /// Paths visited: the first entry's source, then every target in order.
    pub fn get_path(&self) -> Vec<&StatePath> {
        let mut path = Vec::new();
        if let Some(first) = self.entries.first() {
            path.push(&first.from);
        }
        for entry in &self.entries {
            path.push(&entry.to);
        }
        path
    }

    /// Time between the first and last entry.
    ///
    /// `None` when the history is empty or when clock skew puts the last
    /// timestamp before the first.
    pub fn duration(&self) -> Option<Duration> {
        let (first, last) = (self.entries.first()?, self.entries.last()?);
        last.timestamp
            .signed_duration_since(first.timestamp)
            .to_std()
            .ok()
    }

    pub fn entries(&self) -> &[HistoryEntry] {
        &self.entries
    }

    pub fn last(&self) -> Option<&HistoryEntry> {
        self.entries.last()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}
