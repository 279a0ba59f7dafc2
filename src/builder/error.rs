//! Build errors for process definitions.

use std::fmt;
use thiserror::Error;

/// A single structural violation found in a process definition.
///
/// `scope` names the nesting level the violation was found at: `<root>` for
/// the top-level graph, otherwise the dotted path of the composite state.
#[derive(Debug, Clone, Error, PartialEq)]
pub enum BuildError {
    #[error("Process id must not be empty")]
    EmptyProcessId,

    #[error("{scope}: no states defined")]
    NoStates { scope: String },

    #[error("{scope}: invalid state id '{id}' (ids must be non-empty and must not contain '.')")]
    InvalidStateId { scope: String, id: String },

    #[error("{scope}: duplicate state id '{id}'")]
    DuplicateState { scope: String, id: String },

    #[error("{scope}: no initial state. Mark exactly one state with .initial()")]
    MissingInitialState { scope: String },

    #[error("{scope}: multiple initial states: {}", ids.join(", "))]
    MultipleInitialStates { scope: String, ids: Vec<String> },

    #[error("{scope}: initial state '{id}' must not be final")]
    InitialStateIsFinal { scope: String, id: String },

    #[error("Final state '{state}' must not own outgoing transitions (events: {})", events.join(", "))]
    FinalStateHasTransitions { state: String, events: Vec<String> },

    #[error("Final state '{state}' must not contain nested states")]
    FinalStateIsComposite { state: String },

    #[error("State '{state}' has no nested states but declares transitions (events: {})", events.join(", "))]
    TransitionsOnSimpleState { state: String, events: Vec<String> },

    #[error("{scope}: transition on '{event}' has unknown source state '{from}'")]
    UnknownSourceState {
        scope: String,
        from: String,
        event: String,
    },

    #[error("{scope}: transition '{from}' --{event}--> '{to}' targets a state that does not exist")]
    UnknownTargetState {
        scope: String,
        from: String,
        event: String,
        to: String,
    },

    #[error("{scope}: transition from '{from}' has an empty event name")]
    EmptyEvent { scope: String, from: String },

    #[error("Event mapping '{external}' -> '{trigger}' names an event no transition handles")]
    UnknownTrigger { external: String, trigger: String },

    #[error("Transition '{from}' --{event}--> uses unregistered condition '{condition}'")]
    UnknownCondition {
        from: String,
        event: String,
        condition: String,
    },

    #[error("State '{state}' references unknown task '{task}'")]
    UnknownTask { state: String, task: String },
}

/// Every violation found while building a definition, in discovery order.
#[derive(Debug, Clone, PartialEq)]
pub struct BuildErrors(Vec<BuildError>);

impl BuildErrors {
    pub(crate) fn new(errors: Vec<BuildError>) -> Self {
        Self(errors)
    }

    pub fn errors(&self) -> &[BuildError] {
        &self.0
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn contains(&self, error: &BuildError) -> bool {
        self.0.contains(error)
    }

    pub fn into_inner(self) -> Vec<BuildError> {
        self.0
    }
}

impl fmt::Display for BuildErrors {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Process definition has {} violation(s)", self.0.len())?;
        for error in &self.0 {
            write!(f, "\n  - {error}")?;
        }
        Ok(())
    }
}

impl std::error::Error for BuildErrors {}

impl IntoIterator for BuildErrors {
    type Item = BuildError;
    type IntoIter = std::vec::IntoIter<BuildError>;

    fn into_iter(self) -> Self::IntoIter {
        self.0.into_iter()
    }
}
