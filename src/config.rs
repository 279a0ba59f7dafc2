//! Engine configuration.

use crate::core::merge_value;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// Key under which on-enter results are nested by default.
pub const DEFAULT_ON_ENTER_KEY: &str = "on_enter";

/// How the result of a state's on-enter task is merged into process data.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "policy", rename_all = "snake_case")]
pub enum OnEnterMerge {
    /// Store the result under `key`, keeping the rest of the data.
    Nest { key: String },
    /// Merge the result into the data with the payload merge rule.
    Merge,
    /// Replace the data with the result.
    Replace,
}

impl Default for OnEnterMerge {
    fn default() -> Self {
        OnEnterMerge::Nest {
            key: DEFAULT_ON_ENTER_KEY.to_string(),
        }
    }
}

impl OnEnterMerge {
    pub fn apply(&self, data: &mut Value, result: Value) {
        match self {
            OnEnterMerge::Nest { key } => {
                let mut nested = Map::new();
                nested.insert(key.clone(), result);
                merge_value(data, Value::Object(nested));
            }
            OnEnterMerge::Merge => merge_value(data, result),
            OnEnterMerge::Replace => *data = result,
        }
    }
}

/// Engine-wide settings.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    /// Merge policy for on-enter task results.
    pub on_enter: OnEnterMerge,

    /// Keep transition payloads in history entries. When off, entries
    /// carry `null` payloads.
    pub record_payloads: bool,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            on_enter: OnEnterMerge::default(),
            record_payloads: true,
        }
    }
}

impl EngineConfig {
    pub fn from_json(json: &str) -> Result<Self, serde_json::Error> {
        serde_json::from_str(json)
    }

    pub fn with_on_enter(mut self, policy: OnEnterMerge) -> Self {
        self.on_enter = policy;
        self
    }

    pub fn with_record_payloads(mut self, record: bool) -> Self {
        self.record_payloads = record;
        self
    }
}
