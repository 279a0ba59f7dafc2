//! Snapshot and restore for process instances.
//!
//! A snapshot holds plain data only: the instance identity, its current
//! path, its data and its history. The state graph is not embedded; it is
//! supplied again at restore time, so definitions may evolve between
//! restarts as long as the current state path still resolves.

use crate::core::{HistoryEntry, ProcessHistory, ProcessInstance, StateGraph, StatePath};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::sync::Arc;

pub mod error;

pub use error::SnapshotError;

/// Version identifier for snapshot format
pub const SNAPSHOT_VERSION: u32 = 1;

/// Serializable state of one process instance.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Snapshot {
    /// Snapshot format version
    pub version: u32,

    /// Instance identifier
    pub id: String,

    /// Process definition the instance belongs to
    pub process_id: String,

    /// Dotted path of the current leaf state
    pub current_state: String,

    /// Process data
    pub data: Value,

    /// Applied transitions, oldest first
    pub history: Vec<HistoryEntry>,
}

/// Capture an instance as a snapshot.
pub fn serialize(instance: &ProcessInstance) -> Snapshot {
    Snapshot {
        version: SNAPSHOT_VERSION,
        id: instance.id().to_string(),
        process_id: instance.process_id().to_string(),
        current_state: instance.current_state().to_string(),
        data: instance.data().clone(),
        history: instance.history().entries().to_vec(),
    }
}

/// Restore an instance against the live graph.
///
/// The snapshot's current state must name a leaf of `graph`; history
/// entries are kept as recorded, even if they mention states that have
/// since been removed from the definition.
pub fn deserialize(
    graph: &Arc<StateGraph>,
    snapshot: Snapshot,
) -> Result<ProcessInstance, SnapshotError> {
    if snapshot.version != SNAPSHOT_VERSION {
        return Err(SnapshotError::UnsupportedVersion {
            found: snapshot.version,
            supported: SNAPSHOT_VERSION,
        });
    }
    if snapshot.process_id != graph.process_id() {
        return Err(SnapshotError::SerializationMismatch(format!(
            "snapshot belongs to process '{}', graph is '{}'",
            snapshot.process_id,
            graph.process_id()
        )));
    }

    let current = StatePath::parse(&snapshot.current_state);
    if !graph.contains(&current) {
        return Err(SnapshotError::SerializationMismatch(format!(
            "state '{}' does not exist",
            snapshot.current_state
        )));
    }
    if !graph.is_leaf(&current) {
        return Err(SnapshotError::SerializationMismatch(format!(
            "state '{}' is composite, not a leaf",
            snapshot.current_state
        )));
    }

    Ok(ProcessInstance::assemble(
        snapshot.id,
        Arc::clone(graph),
        current,
        snapshot.data,
        ProcessHistory::from_entries(snapshot.history),
    ))
}

impl Snapshot {
    pub fn to_json(&self) -> Result<String, SnapshotError> {
        serde_json::to_string(self).map_err(|e| SnapshotError::SerializationFailed(e.to_string()))
    }

    pub fn to_json_pretty(&self) -> Result<String, SnapshotError> {
        serde_json::to_string_pretty(self)
            .map_err(|e| SnapshotError::SerializationFailed(e.to_string()))
    }

    pub fn from_json(json: &str) -> Result<Self, SnapshotError> {
        serde_json::from_str(json).map_err(|e| SnapshotError::DeserializationFailed(e.to_string()))
    }

    /// Compact binary form.
    pub fn to_binary(&self) -> Result<Vec<u8>, SnapshotError> {
        let record = BinarySnapshot::try_from(self)?;
        bincode::serialize(&record).map_err(|e| SnapshotError::SerializationFailed(e.to_string()))
    }

    pub fn from_binary(bytes: &[u8]) -> Result<Self, SnapshotError> {
        let record: BinarySnapshot = bincode::deserialize(bytes)
            .map_err(|e| SnapshotError::DeserializationFailed(e.to_string()))?;
        Snapshot::try_from(record)
    }
}

// bincode is not self-describing, so arbitrary JSON values travel as JSON text.
#[derive(Serialize, Deserialize)]
struct BinarySnapshot {
    version: u32,
    id: String,
    process_id: String,
    current_state: String,
    data: String,
    history: Vec<BinaryEntry>,
}

#[derive(Serialize, Deserialize)]
struct BinaryEntry {
    from: String,
    to: String,
    event: String,
    timestamp: DateTime<Utc>,
    payload: String,
}

fn encode_value(value: &Value) -> Result<String, SnapshotError> {
    serde_json::to_string(value).map_err(|e| SnapshotError::SerializationFailed(e.to_string()))
}

fn decode_value(text: &str) -> Result<Value, SnapshotError> {
    serde_json::from_str(text).map_err(|e| SnapshotError::DeserializationFailed(e.to_string()))
}

impl TryFrom<&Snapshot> for BinarySnapshot {
    type Error = SnapshotError;

    fn try_from(snapshot: &Snapshot) -> Result<Self, Self::Error> {
        let history = snapshot
            .history
            .iter()
            .map(|entry| {
                Ok(BinaryEntry {
                    from: entry.from.to_string(),
                    to: entry.to.to_string(),
                    event: entry.event.clone(),
                    timestamp: entry.timestamp,
                    payload: encode_value(&entry.payload)?,
                })
            })
            .collect::<Result<Vec<_>, SnapshotError>>()?;

        Ok(Self {
            version: snapshot.version,
            id: snapshot.id.clone(),
            process_id: snapshot.process_id.clone(),
            current_state: snapshot.current_state.clone(),
            data: encode_value(&snapshot.data)?,
            history,
        })
    }
}

impl TryFrom<BinarySnapshot> for Snapshot {
    type Error = SnapshotError;

    fn try_from(record: BinarySnapshot) -> Result<Self, Self::Error> {
        let history = record
            .history
            .into_iter()
            .map(|entry| {
                Ok(HistoryEntry {
                    from: StatePath::from(entry.from),
                    to: StatePath::from(entry.to),
                    event: entry.event,
                    timestamp: entry.timestamp,
                    payload: decode_value(&entry.payload)?,
                })
            })
            .collect::<Result<Vec<_>, SnapshotError>>()?;

        Ok(Self {
            version: record.version,
            id: record.id,
            process_id: record.process_id,
            current_state: record.current_state,
            data: decode_value(&record.data)?,
            history,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::builder::{on, ProcessDefinition, StateDefinition};
    use serde_json::json;

    fn graph() -> Arc<StateGraph> {
        Arc::new(
            StateGraph::build(
                ProcessDefinition::new("review")
                    .state(StateDefinition::new("draft").initial())
                    .state(
                        StateDefinition::new("reviewing")
                            .state(StateDefinition::new("first_pass").initial())
                            .state(StateDefinition::new("second_pass"))
                            .transition(on("first_pass", "next", "second_pass")),
                    )
                    .state(StateDefinition::new("published").final_state())
                    .transition(on("draft", "submit", "reviewing"))
                    .transition(on("reviewing", "publish", "published")),
            )
            .unwrap(),
        )
    }

    fn instance(graph: &Arc<StateGraph>) -> ProcessInstance {
        let entry = HistoryEntry {
            from: "draft".into(),
            to: "reviewing.first_pass".into(),
            event: "submit".to_string(),
            timestamp: Utc::now(),
            payload: json!({"reviewer": "kim", "score": 0.75}),
        };
        ProcessInstance::assemble(
            "inst-1".to_string(),
            Arc::clone(graph),
            "reviewing.first_pass".into(),
            json!({"title": "Snapshots", "tags": ["a", "b"]}),
            ProcessHistory::new().record(entry),
        )
    }

    #[test]
    fn snapshot_captures_plain_fields() {
        let graph = graph();
        let snapshot = serialize(&instance(&graph));

        assert_eq!(snapshot.version, SNAPSHOT_VERSION);
        assert_eq!(snapshot.id, "inst-1");
        assert_eq!(snapshot.process_id, "review");
        assert_eq!(snapshot.current_state, "reviewing.first_pass");
        assert_eq!(snapshot.history.len(), 1);
    }

    #[test]
    fn restore_is_observably_identical() {
        let graph = graph();
        let original = instance(&graph);
        let restored = deserialize(&graph, serialize(&original)).unwrap();

        assert_eq!(restored.id(), original.id());
        assert_eq!(restored.current_state(), original.current_state());
        assert_eq!(restored.data(), original.data());
        assert_eq!(restored.history(), original.history());
        assert_eq!(serialize(&restored), serialize(&original));
    }

    #[test]
    fn json_form_round_trips() {
        let graph = graph();
        let snapshot = serialize(&instance(&graph));
        let json = snapshot.to_json().unwrap();

        assert!(json.contains("\"current_state\":\"reviewing.first_pass\""));
        assert_eq!(Snapshot::from_json(&json).unwrap(), snapshot);
    }

    #[test]
    fn binary_form_round_trips() {
        let graph = graph();
        let snapshot = serialize(&instance(&graph));
        let bytes = snapshot.to_binary().unwrap();

        assert_eq!(Snapshot::from_binary(&bytes).unwrap(), snapshot);
    }

    #[test]
    fn corrupt_binary_is_rejected() {
        let result = Snapshot::from_binary(&[0xff, 0x01]);
        assert!(matches!(result, Err(SnapshotError::DeserializationFailed(_))));
    }

    #[test]
    fn unknown_state_is_a_mismatch() {
        let graph = graph();
        let mut snapshot = serialize(&instance(&graph));
        snapshot.current_state = "reviewing.third_pass".to_string();

        let result = deserialize(&graph, snapshot);
        assert!(matches!(result, Err(SnapshotError::SerializationMismatch(_))));
    }

    #[test]
    fn composite_state_is_a_mismatch() {
        let graph = graph();
        let mut snapshot = serialize(&instance(&graph));
        snapshot.current_state = "reviewing".to_string();

        let result = deserialize(&graph, snapshot);
        assert!(matches!(result, Err(SnapshotError::SerializationMismatch(_))));
    }

    #[test]
    fn other_process_is_a_mismatch() {
        let graph = graph();
        let mut snapshot = serialize(&instance(&graph));
        snapshot.process_id = "invoice".to_string();

        let result = deserialize(&graph, snapshot);
        assert!(matches!(result, Err(SnapshotError::SerializationMismatch(_))));
    }

    #[test]
    fn future_version_is_rejected() {
        let graph = graph();
        let mut snapshot = serialize(&instance(&graph));
        snapshot.version = 2;

        let result = deserialize(&graph, snapshot);
        assert!(matches!(
            result,
            Err(SnapshotError::UnsupportedVersion {
                found: 2,
                supported: 1
            })
        ));
    }

    #[test]
    fn restored_final_state_is_completed() {
        let graph = graph();
        let mut snapshot = serialize(&instance(&graph));
        snapshot.current_state = "published".to_string();

        assert!(deserialize(&graph, snapshot).unwrap().is_completed());
    }
}
