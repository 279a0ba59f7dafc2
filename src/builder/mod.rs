//! Process definitions and graph construction.
//!
//! Definitions are authored as data (JSON or the fluent builders in this
//! module) and validated into an immutable [`StateGraph`](crate::core::StateGraph).
//! Validation never stops at the first problem: every violation is reported.

pub mod definition;
pub mod error;
mod validate;

pub use definition::{ProcessDefinition, StateDefinition, TransitionDefinition};
pub use error::{BuildError, BuildErrors};
pub use validate::build_graph;

pub(crate) use validate::{build_graph_with, definition_transitions, walk_definition};

/// Shorthand for a transition from `from` to `to` on `event`.
///
/// # Example
///
/// ```
/// use statecraft::builder::{on, ProcessDefinition, StateDefinition};
///
/// let definition = ProcessDefinition::new("light")
///     .state(StateDefinition::new("off").initial())
///     .state(StateDefinition::new("on"))
///     .transition(on("off", "toggle", "on"))
///     .transition(on("on", "toggle", "off"));
///
/// assert_eq!(definition.transitions.len(), 2);
/// ```
pub fn on(from: &str, event: &str, to: &str) -> TransitionDefinition {
    TransitionDefinition::new(from, event, to)
}

/// Shorthand for a transition guarded by a named condition.
///
/// # Example
///
/// ```
/// use statecraft::builder::guarded;
///
/// let transition = guarded("pending", "APPROVE", "approved", "within_limit");
/// assert_eq!(transition.condition.as_deref(), Some("within_limit"));
/// ```
pub fn guarded(from: &str, event: &str, to: &str, condition: &str) -> TransitionDefinition {
    TransitionDefinition::new(from, event, to).when(condition)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::StateGraph;

    #[test]
    fn shorthand_transitions_build() {
        let graph = StateGraph::build(
            ProcessDefinition::new("light")
                .state(StateDefinition::new("off").initial())
                .state(StateDefinition::new("on"))
                .transition(on("off", "toggle", "on"))
                .transition(guarded("on", "toggle", "off", "cooled_down")),
        )
        .unwrap();

        let from_on: Vec<_> = graph
            .transitions_from(&"on".into())
            .map(|t| t.condition.clone())
            .collect();
        assert_eq!(from_on, vec![Some("cooled_down".to_string())]);
    }
}
