//! Declarative process definitions.
//!
//! A definition is plain data: it can be deserialized from JSON or built
//! with the fluent methods below, then turned into a validated
//! [`StateGraph`](crate::core::StateGraph).

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Top-level description of a process.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct ProcessDefinition {
    pub id: String,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,

    /// Top-level states, in declaration order.
    #[serde(default)]
    pub states: Vec<StateDefinition>,

    /// Transitions between top-level states, in declaration order.
    #[serde(default)]
    pub transitions: Vec<TransitionDefinition>,

    /// External event type -> internal trigger name, used by the event router.
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub event_mappings: BTreeMap<String, String>,
}

impl ProcessDefinition {
    pub fn new(id: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            ..Self::default()
        }
    }

    pub fn description(mut self, description: impl Into<String>) -> Self {
        self.description = Some(description.into());
        self
    }

    pub fn state(mut self, state: StateDefinition) -> Self {
        self.states.push(state);
        self
    }

    pub fn transition(mut self, transition: TransitionDefinition) -> Self {
        self.transitions.push(transition);
        self
    }

    /// Route external events of type `external` to the internal `trigger`.
    pub fn map_event(mut self, external: impl Into<String>, trigger: impl Into<String>) -> Self {
        self.event_mappings.insert(external.into(), trigger.into());
        self
    }

    pub fn from_json(json: &str) -> Result<Self, serde_json::Error> {
        serde_json::from_str(json)
    }
}

/// A state, optionally composite.
///
/// A state with nested `states` is composite; its `transitions` connect
/// those nested states. Transitions leaving the composite itself belong to
/// the enclosing level.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct StateDefinition {
    pub id: String,

    #[serde(default)]
    pub description: String,

    /// Marks the initial state of its level.
    #[serde(default)]
    pub initial: bool,

    /// Terminal state; owns no outgoing transitions.
    #[serde(default, rename = "final")]
    pub is_final: bool,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub entry_task: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub exit_task: Option<String>,

    /// Task auto-invoked on entry whose result is merged into the data.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub on_enter: Option<String>,

    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub states: Vec<StateDefinition>,

    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub transitions: Vec<TransitionDefinition>,
}

impl StateDefinition {
    pub fn new(id: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            ..Self::default()
        }
    }

    pub fn describe(mut self, description: impl Into<String>) -> Self {
        self.description = description.into();
        self
    }

    pub fn initial(mut self) -> Self {
        self.initial = true;
        self
    }

    pub fn final_state(mut self) -> Self {
        self.is_final = true;
        self
    }

    pub fn entry_task(mut self, task: impl Into<String>) -> Self {
        self.entry_task = Some(task.into());
        self
    }

    pub fn exit_task(mut self, task: impl Into<String>) -> Self {
        self.exit_task = Some(task.into());
        self
    }

    pub fn on_enter(mut self, task: impl Into<String>) -> Self {
        self.on_enter = Some(task.into());
        self
    }

    /// Add a nested state, making this state composite.
    pub fn state(mut self, state: StateDefinition) -> Self {
        self.states.push(state);
        self
    }

    /// Add a transition between nested states.
    pub fn transition(mut self, transition: TransitionDefinition) -> Self {
        self.transitions.push(transition);
        self
    }

    pub fn is_composite(&self) -> bool {
        !self.states.is_empty()
    }

    /// Every task reference bound to this state.
    pub fn tasks(&self) -> impl Iterator<Item = &str> {
        [&self.entry_task, &self.exit_task, &self.on_enter]
            .into_iter()
            .filter_map(|t| t.as_deref())
    }
}

/// A guarded, event-triggered edge between two states.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct TransitionDefinition {
    /// Source state id at the declaring level.
    pub from: String,

    /// Target path, resolved from the declaring level outward to the root.
    pub to: String,

    pub event: String,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub condition: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
}

impl TransitionDefinition {
    pub fn new(from: impl Into<String>, event: impl Into<String>, to: impl Into<String>) -> Self {
        Self {
            from: from.into(),
            to: to.into(),
            event: event.into(),
            condition: None,
            description: None,
        }
    }

    /// Guard the transition with a registered condition.
    pub fn when(mut self, condition: impl Into<String>) -> Self {
        self.condition = Some(condition.into());
        self
    }

    pub fn describe(mut self, description: impl Into<String>) -> Self {
        self.description = Some(description.into());
        self
    }
}
