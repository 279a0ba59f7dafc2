//! Transition resolution.
//!
//! Resolution is pure: it reads the graph, the current path and the guard
//! inputs and decides which transition an event triggers, if any. Nothing
//! here runs tasks or mutates an instance.

use super::condition::ConditionRegistry;
use super::graph::{StateGraph, Transition};
use super::state::StatePath;
use crate::error::ProcessError;
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Outcome of resolving an event against the current state.
#[derive(Clone, Debug, PartialEq)]
pub enum Resolution<'g> {
    /// A transition matched.
    Resolved(ResolvedTransition<'g>),

    /// Transitions for the event exist on the path, but every guard was false.
    ConditionFailed { conditions: Vec<String> },

    /// No state on the path reacts to the event.
    NoMatch,
}

/// A matched transition with the states it leaves and enters.
#[derive(Clone, Debug, PartialEq)]
pub struct ResolvedTransition<'g> {
    pub transition: &'g Transition,
    /// Path of the state that declared the transition (the leaf or an ancestor).
    pub source: StatePath,
    /// New leaf path, after descending through nested initial states.
    pub target: StatePath,
    /// States exited, innermost first.
    pub exited: Vec<StatePath>,
    /// States entered, outermost first.
    pub entered: Vec<StatePath>,
}

/// A transition reachable from the current state, for introspection.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct AvailableTransition {
    pub from: StatePath,
    pub to: StatePath,
    pub event: String,
    pub condition: Option<String>,
    pub description: Option<String>,
    /// Whether the guard currently holds (always true without a guard).
    pub enabled: bool,
}

/// The leaf state and each enclosing composite, innermost first.
fn bubble_path(current: &StatePath) -> impl Iterator<Item = StatePath> + '_ {
    (1..=current.depth()).rev().map(|depth| current.prefix(depth))
}

fn check_guard(
    graph: &StateGraph,
    transition: &Transition,
    data: &Value,
    context: &Value,
    conditions: &ConditionRegistry,
) -> Result<bool, ProcessError> {
    match &transition.condition {
        None => Ok(true),
        Some(name) => conditions.evaluate(graph.process_id(), name, data, context),
    }
}

/// Resolve `event` from the leaf at `current`.
///
/// Candidates are the leaf's transitions for the event in declaration
/// order, then its parent's, up to the top level. The first candidate
/// without a guard, or whose guard holds, wins.
pub fn resolve<'g>(
    graph: &'g StateGraph,
    current: &StatePath,
    event: &str,
    data: &Value,
    context: &Value,
    conditions: &ConditionRegistry,
) -> Result<Resolution<'g>, ProcessError> {
    if !graph.contains(current) {
        return Err(ProcessError::InvalidPath(current.to_string()));
    }

    let mut rejected: Vec<String> = Vec::new();
    for source in bubble_path(current) {
        for transition in graph.transitions_from(&source).filter(|t| t.event == event) {
            if check_guard(graph, transition, data, context, conditions)? {
                tracing::debug!(
                    process = graph.process_id(),
                    from = %current,
                    source = %source,
                    event,
                    to = %transition.target,
                    "Transition resolved"
                );
                return plan(graph, current, source, transition).map(Resolution::Resolved);
            }
            if let Some(condition) = &transition.condition {
                rejected.push(condition.clone());
            }
        }
    }

    if rejected.is_empty() {
        Ok(Resolution::NoMatch)
    } else {
        Ok(Resolution::ConditionFailed {
            conditions: rejected,
        })
    }
}

/// Work out the exit and entry sequence for a matched transition.
///
/// The states left are those below the least common ancestor of source and
/// target; a transition onto the source itself or one of its ancestors
/// leaves and re-enters that state.
fn plan<'g>(
    graph: &'g StateGraph,
    current: &StatePath,
    source: StatePath,
    transition: &'g Transition,
) -> Result<ResolvedTransition<'g>, ProcessError> {
    let target = graph
        .descend_initial(&transition.target)
        .ok_or_else(|| ProcessError::InvalidPath(transition.target.to_string()))?;

    let declared = &transition.target;
    let shared = source
        .common_prefix_len(declared)
        .min(source.depth().min(declared.depth()).saturating_sub(1));

    let exited = ((shared + 1)..=current.depth())
        .rev()
        .map(|depth| current.prefix(depth))
        .collect();
    let entered = ((shared + 1)..=target.depth())
        .map(|depth| target.prefix(depth))
        .collect();

    Ok(ResolvedTransition {
        transition,
        source,
        target,
        exited,
        entered,
    })
}

/// Every transition from the leaf and its ancestors, with guard state.
///
/// Read-only: evaluating guards never changes anything.
pub fn available_transitions(
    graph: &StateGraph,
    current: &StatePath,
    data: &Value,
    context: &Value,
    conditions: &ConditionRegistry,
) -> Result<Vec<AvailableTransition>, ProcessError> {
    if !graph.contains(current) {
        return Err(ProcessError::InvalidPath(current.to_string()));
    }

    let mut available = Vec::new();
    for source in bubble_path(current) {
        for transition in graph.transitions_from(&source) {
            available.push(AvailableTransition {
                from: source.clone(),
                to: transition.target.clone(),
                event: transition.event.clone(),
                condition: transition.condition.clone(),
                description: transition.description.clone(),
                enabled: check_guard(graph, transition, data, context, conditions)?,
            });
        }
    }
    Ok(available)
}
