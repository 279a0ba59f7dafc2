//! Running process instances.

use super::graph::StateGraph;
use super::history::ProcessHistory;
use super::state::StatePath;
use serde_json::Value;
use std::sync::Arc;

/// One execution of a process definition.
///
/// The current path always names a leaf of the graph. Instances are mutated
/// only by the engine; everything here is read access.
#[derive(Clone, Debug)]
pub struct ProcessInstance {
    pub(crate) id: String,
    pub(crate) current: StatePath,
    pub(crate) data: Value,
    pub(crate) history: ProcessHistory,
    pub(crate) completed: bool,
    pub(crate) graph: Arc<StateGraph>,
}

impl ProcessInstance {
    /// Assemble an instance at a known leaf. `completed` is derived from the leaf.
    pub(crate) fn assemble(
        id: String,
        graph: Arc<StateGraph>,
        current: StatePath,
        data: Value,
        history: ProcessHistory,
    ) -> Self {
        let completed = graph.state(&current).is_some_and(|state| state.is_final);
        Self {
            id,
            current,
            data,
            history,
            completed,
            graph,
        }
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn process_id(&self) -> &str {
        self.graph.process_id()
    }

    /// Full dotted path of the current leaf state.
    pub fn current_state(&self) -> &StatePath {
        &self.current
    }

    pub fn data(&self) -> &Value {
        &self.data
    }

    pub fn history(&self) -> &ProcessHistory {
        &self.history
    }

    /// True once a final state has been entered.
    pub fn is_completed(&self) -> bool {
        self.completed
    }

    pub fn graph(&self) -> &Arc<StateGraph> {
        &self.graph
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::builder::{on, ProcessDefinition, StateDefinition};
    use serde_json::json;

    #[test]
    fn completion_follows_the_leaf() {
        let graph = Arc::new(
            StateGraph::build(
                ProcessDefinition::new("ticket")
                    .state(StateDefinition::new("open").initial())
                    .state(StateDefinition::new("closed").final_state())
                    .transition(on("open", "close", "closed")),
            )
            .unwrap(),
        );

        let open = ProcessInstance::assemble(
            "i-1".to_string(),
            Arc::clone(&graph),
            "open".into(),
            json!({}),
            ProcessHistory::new(),
        );
        assert!(!open.is_completed());
        assert_eq!(open.process_id(), "ticket");

        let closed = ProcessInstance::assemble(
            "i-2".to_string(),
            graph,
            "closed".into(),
            json!({}),
            ProcessHistory::new(),
        );
        assert!(closed.is_completed());
    }
}
