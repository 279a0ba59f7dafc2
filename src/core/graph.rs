//! Immutable state graph of a process definition.
//!
//! A graph is a tree of levels. Each level holds its states in declaration
//! order, the id of its initial state, and the transitions declared between
//! its states. Composite states own a nested level.

use super::state::StatePath;
use crate::builder::{self, BuildErrors, ProcessDefinition};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashMap};

/// A validated, immutable process graph.
///
/// Built with [`StateGraph::build`], which checks the whole definition and
/// reports every violation at once.
#[derive(Clone, Debug)]
pub struct StateGraph {
    pub(crate) process_id: String,
    pub(crate) description: Option<String>,
    pub(crate) root: GraphLevel,
    pub(crate) event_mappings: BTreeMap<String, String>,
}

/// One nesting level: the root graph or the inside of a composite state.
#[derive(Clone, Debug, Default)]
pub struct GraphLevel {
    pub(crate) states: Vec<StateNode>,
    pub(crate) index: HashMap<String, usize>,
    pub(crate) initial: String,
    pub(crate) transitions: Vec<Transition>,
}

/// A state as it exists in a built graph.
#[derive(Clone, Debug)]
pub struct StateNode {
    pub id: String,
    pub description: String,
    pub entry_task: Option<String>,
    pub exit_task: Option<String>,
    pub on_enter: Option<String>,
    pub is_final: bool,
    pub(crate) children: Option<GraphLevel>,
}

/// A transition with its target resolved to an absolute path.
#[derive(Clone, Debug, PartialEq)]
pub struct Transition {
    /// Source state id at the declaring level.
    pub from: String,
    /// Target as written in the definition.
    pub to: String,
    /// Absolute path of the target state.
    pub target: StatePath,
    pub event: String,
    pub condition: Option<String>,
    pub description: Option<String>,
}

/// Flattened view of a transition for tooling.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct TransitionSummary {
    pub from: String,
    pub to: String,
    pub event: String,
}

impl StateGraph {
    /// Validate a definition and build its graph.
    pub fn build(definition: ProcessDefinition) -> Result<Self, BuildErrors> {
        builder::build_graph(definition)
    }

    pub fn process_id(&self) -> &str {
        &self.process_id
    }

    pub fn description(&self) -> Option<&str> {
        self.description.as_deref()
    }

    pub fn root(&self) -> &GraphLevel {
        &self.root
    }

    pub fn event_mappings(&self) -> &BTreeMap<String, String> {
        &self.event_mappings
    }

    /// Internal trigger for an external event type.
    pub fn trigger_for(&self, external: &str) -> Option<&str> {
        self.event_mappings.get(external).map(String::as_str)
    }

    /// The level whose states are the children of `path`.
    ///
    /// The root path yields the root level; a simple state yields `None`.
    pub fn level(&self, path: &StatePath) -> Option<&GraphLevel> {
        path.segments().iter().try_fold(&self.root, |level, segment| {
            level.state(segment).and_then(|s| s.children.as_ref())
        })
    }

    pub(crate) fn level_mut(&mut self, path: &StatePath) -> Option<&mut GraphLevel> {
        let mut level = &mut self.root;
        for segment in path.segments() {
            let idx = *level.index.get(segment)?;
            level = level.states[idx].children.as_mut()?;
        }
        Some(level)
    }

    /// The state at `path`. The root path addresses no state.
    pub fn state(&self, path: &StatePath) -> Option<&StateNode> {
        let id = path.leaf()?;
        self.level(&path.parent())?.state(id)
    }

    pub fn contains(&self, path: &StatePath) -> bool {
        self.state(path).is_some()
    }

    /// True when `path` names a state without nested states.
    pub fn is_leaf(&self, path: &StatePath) -> bool {
        self.state(path).is_some_and(|s| !s.is_composite())
    }

    /// Extend `path` through nested initial states until it reaches a leaf.
    ///
    /// Returns `None` when `path` does not name a state.
    pub fn descend_initial(&self, path: &StatePath) -> Option<StatePath> {
        let mut current = path.clone();
        let mut node = self.state(path)?;
        while let Some(children) = &node.children {
            let initial = children.initial_state()?;
            current = current.child(initial.id.clone());
            node = initial;
        }
        Some(current)
    }

    /// Fully resolved initial leaf path of the whole graph.
    pub fn initial_path(&self) -> StatePath {
        let top = StatePath::root().child(self.root.initial.clone());
        self.descend_initial(&top).unwrap_or(top)
    }

    /// Transitions declared with the state at `path` as their source, in
    /// declaration order.
    pub fn transitions_from<'g>(&'g self, path: &StatePath) -> impl Iterator<Item = &'g Transition> {
        let id = path.leaf().map(str::to_string);
        self.level(&path.parent())
            .map(|level| level.transitions.as_slice())
            .unwrap_or_default()
            .iter()
            .filter(move |t| id.as_deref() == Some(t.from.as_str()))
    }

    /// Every state path in the graph, depth first, in declaration order.
    pub fn all_states(&self) -> Vec<StatePath> {
        let mut paths = Vec::new();
        collect_states(&self.root, &StatePath::root(), &mut paths);
        paths
    }

    /// Every transition with its source and target as absolute paths.
    pub fn all_transitions(&self) -> Vec<TransitionSummary> {
        let mut summaries = Vec::new();
        collect_transitions(&self.root, &StatePath::root(), &mut summaries);
        summaries
    }

    /// Every event name some transition reacts to.
    pub fn events(&self) -> Vec<String> {
        let mut events: Vec<String> = self
            .all_transitions()
            .into_iter()
            .map(|t| t.event)
            .collect();
        events.sort();
        events.dedup();
        events
    }
}

fn collect_states(level: &GraphLevel, scope: &StatePath, out: &mut Vec<StatePath>) {
    for state in &level.states {
        let path = scope.child(state.id.clone());
        out.push(path.clone());
        if let Some(children) = &state.children {
            collect_states(children, &path, out);
        }
    }
}

fn collect_transitions(level: &GraphLevel, scope: &StatePath, out: &mut Vec<TransitionSummary>) {
    for transition in &level.transitions {
        out.push(TransitionSummary {
            from: scope.child(transition.from.clone()).to_string(),
            to: transition.target.to_string(),
            event: transition.event.clone(),
        });
    }
    for state in &level.states {
        if let Some(children) = &state.children {
            collect_transitions(children, &scope.child(state.id.clone()), out);
        }
    }
}

impl GraphLevel {
    pub fn states(&self) -> &[StateNode] {
        &self.states
    }

    pub fn state(&self, id: &str) -> Option<&StateNode> {
        self.index.get(id).map(|&idx| &self.states[idx])
    }

    pub fn initial_id(&self) -> &str {
        &self.initial
    }

    pub fn initial_state(&self) -> Option<&StateNode> {
        self.state(&self.initial)
    }

    pub fn transitions(&self) -> &[Transition] {
        &self.transitions
    }
}

impl StateNode {
    pub fn is_composite(&self) -> bool {
        self.children.is_some()
    }

    /// The nested level of a composite state.
    pub fn children(&self) -> Option<&GraphLevel> {
        self.children.as_ref()
    }
}
