//! Runtime and registration errors.

use crate::effects::TaskError;
use thiserror::Error;

/// Errors raised while starting or advancing a process instance.
///
/// Every variant leaves the instance exactly as it was before the call.
#[derive(Debug, Error)]
pub enum ProcessError {
    /// Transitions for the event exist, but every guard evaluated false.
    #[error("Condition failed for event '{event}' in state '{state}' (checked: {})", conditions.join(", "))]
    ConditionFailed {
        state: String,
        event: String,
        conditions: Vec<String>,
    },

    /// Neither the current state nor any ancestor handles the event.
    #[error("No transition for event '{event}' from state '{state}'")]
    NoMatchingTransition { state: String, event: String },

    /// An entry, exit or on-enter task failed.
    #[error("Task '{task}' failed in state '{state}': {source}")]
    TaskExecution {
        task: String,
        state: String,
        #[source]
        source: TaskError,
    },

    /// A guard references a condition nobody registered for this process.
    #[error("Condition '{name}' is not registered for process '{process}'")]
    UnknownCondition { process: String, name: String },

    /// The instance points at a path the graph does not contain.
    #[error("State path '{0}' does not resolve in the process graph")]
    InvalidPath(String),
}

/// Errors raised while filling condition or task registries.
#[derive(Debug, Clone, Error, PartialEq)]
pub enum RegistrationError {
    #[error("Condition '{name}' is already registered for process '{process}'")]
    DuplicateCondition { process: String, name: String },

    #[error("Task '{0}' is already registered")]
    DuplicateTask(String),
}
