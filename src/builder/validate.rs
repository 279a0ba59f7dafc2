//! Graph assembly and structural validation.
//!
//! Every rule is checked and every violation is collected with Stillwater's
//! `Validation`, so a broken definition can be fixed in one pass.

use crate::builder::definition::{ProcessDefinition, StateDefinition, TransitionDefinition};
use crate::builder::error::{BuildError, BuildErrors};
use crate::core::graph::{GraphLevel, StateGraph, StateNode, Transition};
use crate::core::state::{StatePath, PATH_SEPARATOR};
use std::collections::{BTreeMap, BTreeSet};
use stillwater::validation::Validation;
use stillwater::NonEmptyVec;

type Check = Validation<(), NonEmptyVec<BuildError>>;

/// Accumulates violations while the graph is assembled.
struct Checks(Vec<Check>);

impl Checks {
    fn new() -> Self {
        Self(vec![Validation::success(())])
    }

    fn fail(&mut self, error: BuildError) {
        self.0.push(Validation::fail(error));
    }

    fn finish(self) -> Result<(), BuildErrors> {
        match Validation::all_vec(self.0).map(|_| ()) {
            Validation::Success(_) => Ok(()),
            Validation::Failure(errors) => Err(BuildErrors::new(errors.iter().cloned().collect())),
        }
    }
}

pub(crate) fn scope_name(scope: &StatePath) -> String {
    if scope.is_root() {
        "<root>".to_string()
    } else {
        scope.to_string()
    }
}

/// Validate a definition and build its graph.
pub fn build_graph(definition: ProcessDefinition) -> Result<StateGraph, BuildErrors> {
    build_graph_with(definition, Vec::new())
}

/// Build a graph, reporting `extra` violations found by the caller together
/// with the structural ones.
pub(crate) fn build_graph_with(
    definition: ProcessDefinition,
    extra: Vec<BuildError>,
) -> Result<StateGraph, BuildErrors> {
    let mut checks = Checks::new();

    if definition.id.trim().is_empty() {
        checks.fail(BuildError::EmptyProcessId);
    }

    let root = assemble_level(
        &StatePath::root(),
        &definition.states,
        &definition.transitions,
        &mut checks,
    );

    let mut graph = StateGraph {
        process_id: definition.id,
        description: definition.description,
        root,
        event_mappings: definition.event_mappings,
    };

    resolve_targets(&mut graph, &mut checks);
    check_event_mappings(&graph, &mut checks);

    for error in extra {
        checks.fail(error);
    }

    checks.finish()?;

    warn_unreachable(&graph);
    tracing::info!(
        process = %graph.process_id,
        states = graph.all_states().len(),
        transitions = graph.all_transitions().len(),
        "Process graph built"
    );
    Ok(graph)
}

fn assemble_level(
    scope: &StatePath,
    states: &[StateDefinition],
    transitions: &[TransitionDefinition],
    checks: &mut Checks,
) -> GraphLevel {
    let scope_label = scope_name(scope);
    let mut level = GraphLevel::default();

    if states.is_empty() {
        checks.fail(BuildError::NoStates {
            scope: scope_label.clone(),
        });
    }

    for state in states {
        if state.id.is_empty() || state.id.contains(PATH_SEPARATOR) {
            checks.fail(BuildError::InvalidStateId {
                scope: scope_label.clone(),
                id: state.id.clone(),
            });
        }
        let path = scope.child(state.id.clone());
        if level.index.contains_key(&state.id) {
            checks.fail(BuildError::DuplicateState {
                scope: scope_label.clone(),
                id: state.id.clone(),
            });
            // The duplicate is dropped, but its nested level is still checked.
            if state.is_composite() {
                assemble_level(&path, &state.states, &state.transitions, checks);
            }
            continue;
        }

        if state.is_final && state.is_composite() {
            checks.fail(BuildError::FinalStateIsComposite {
                state: path.to_string(),
            });
        }
        if !state.is_composite() && !state.transitions.is_empty() {
            checks.fail(BuildError::TransitionsOnSimpleState {
                state: path.to_string(),
                events: state.transitions.iter().map(|t| t.event.clone()).collect(),
            });
        }

        let children = state
            .is_composite()
            .then(|| assemble_level(&path, &state.states, &state.transitions, checks));

        level.index.insert(state.id.clone(), level.states.len());
        level.states.push(StateNode {
            id: state.id.clone(),
            description: state.description.clone(),
            entry_task: state.entry_task.clone(),
            exit_task: state.exit_task.clone(),
            on_enter: state.on_enter.clone(),
            is_final: state.is_final,
            children,
        });
    }

    let initial_ids: Vec<String> = states
        .iter()
        .filter(|s| s.initial)
        .map(|s| s.id.clone())
        .collect();
    match initial_ids.as_slice() {
        [] if !states.is_empty() => checks.fail(BuildError::MissingInitialState {
            scope: scope_label.clone(),
        }),
        [] => {}
        [initial] => {
            if level.state(initial).is_some_and(|s| s.is_final) {
                checks.fail(BuildError::InitialStateIsFinal {
                    scope: scope_label.clone(),
                    id: initial.clone(),
                });
            }
            level.initial = initial.clone();
        }
        _ => checks.fail(BuildError::MultipleInitialStates {
            scope: scope_label.clone(),
            ids: initial_ids.clone(),
        }),
    }

    let mut final_sources: BTreeMap<String, Vec<String>> = BTreeMap::new();
    for transition in transitions {
        if transition.event.trim().is_empty() {
            checks.fail(BuildError::EmptyEvent {
                scope: scope_label.clone(),
                from: transition.from.clone(),
            });
        }
        match level.state(&transition.from) {
            None => checks.fail(BuildError::UnknownSourceState {
                scope: scope_label.clone(),
                from: transition.from.clone(),
                event: transition.event.clone(),
            }),
            Some(source) if source.is_final => final_sources
                .entry(scope.child(source.id.clone()).to_string())
                .or_default()
                .push(transition.event.clone()),
            Some(_) => {}
        }

        level.transitions.push(Transition {
            from: transition.from.clone(),
            to: transition.to.clone(),
            target: StatePath::root(),
            event: transition.event.clone(),
            condition: transition.condition.clone(),
            description: transition.description.clone(),
        });
    }

    for (state, events) in final_sources {
        checks.fail(BuildError::FinalStateHasTransitions { state, events });
    }

    level
}

/// Resolve `to` relative to the declaring level, then outward to the root.
fn resolve_target(graph: &StateGraph, scope: &StatePath, to: &str) -> Option<StatePath> {
    let relative = StatePath::parse(to);
    if relative.is_root() {
        return None;
    }
    let mut base = scope.clone();
    loop {
        let candidate = base.join(&relative);
        if graph.contains(&candidate) {
            return Some(candidate);
        }
        if base.is_root() {
            return None;
        }
        base = base.parent();
    }
}

fn resolve_targets(graph: &mut StateGraph, checks: &mut Checks) {
    let mut resolved: Vec<(StatePath, usize, StatePath)> = Vec::new();
    let mut scopes = vec![StatePath::root()];

    while let Some(scope) = scopes.pop() {
        let Some(level) = graph.level(&scope) else {
            continue;
        };
        for (idx, transition) in level.transitions.iter().enumerate() {
            match resolve_target(graph, &scope, &transition.to) {
                Some(target) => resolved.push((scope.clone(), idx, target)),
                None => checks.fail(BuildError::UnknownTargetState {
                    scope: scope_name(&scope),
                    from: transition.from.clone(),
                    event: transition.event.clone(),
                    to: transition.to.clone(),
                }),
            }
        }
        scopes.extend(
            level
                .states
                .iter()
                .filter(|s| s.is_composite())
                .map(|s| scope.child(s.id.clone())),
        );
    }

    for (scope, idx, target) in resolved {
        if let Some(level) = graph.level_mut(&scope) {
            level.transitions[idx].target = target;
        }
    }
}

fn check_event_mappings(graph: &StateGraph, checks: &mut Checks) {
    let events: BTreeSet<String> = graph.events().into_iter().collect();
    for (external, trigger) in &graph.event_mappings {
        if !events.contains(trigger) {
            checks.fail(BuildError::UnknownTrigger {
                external: external.clone(),
                trigger: trigger.clone(),
            });
        }
    }
}

/// States no sequence of events can reach from the initial path.
pub(crate) fn unreachable_states(graph: &StateGraph) -> Vec<StatePath> {
    let mut reached: BTreeSet<StatePath> = BTreeSet::new();
    let mut pending: Vec<StatePath> = Vec::new();

    let mut enter = |leaf: &StatePath, pending: &mut Vec<StatePath>| {
        for depth in 1..=leaf.depth() {
            let path = leaf.prefix(depth);
            if reached.insert(path.clone()) {
                pending.push(path);
            }
        }
    };

    enter(&graph.initial_path(), &mut pending);
    while let Some(path) = pending.pop() {
        let targets: Vec<StatePath> = graph
            .transitions_from(&path)
            .filter_map(|t| graph.descend_initial(&t.target))
            .collect();
        for target in targets {
            enter(&target, &mut pending);
        }
    }

    graph
        .all_states()
        .into_iter()
        .filter(|p| !reached.contains(p))
        .collect()
}

fn warn_unreachable(graph: &StateGraph) {
    for path in unreachable_states(graph) {
        tracing::warn!(process = %graph.process_id, state = %path, "State is unreachable");
    }
}

/// Every state of a raw definition with its absolute path, depth first.
pub(crate) fn walk_definition<'d>(
    definition: &'d ProcessDefinition,
) -> Vec<(StatePath, &'d StateDefinition)> {
    fn walk<'d>(
        scope: &StatePath,
        states: &'d [StateDefinition],
        out: &mut Vec<(StatePath, &'d StateDefinition)>,
    ) {
        for state in states {
            let path = scope.child(state.id.clone());
            out.push((path.clone(), state));
            walk(&path, &state.states, out);
        }
    }
    let mut out = Vec::new();
    walk(&StatePath::root(), &definition.states, &mut out);
    out
}

/// Every transition of a definition with the absolute path of its source.
pub(crate) fn definition_transitions(
    definition: &ProcessDefinition,
) -> Vec<(StatePath, &TransitionDefinition)> {
    let mut out: Vec<(StatePath, &TransitionDefinition)> = definition
        .transitions
        .iter()
        .map(|t| (StatePath::root().child(t.from.clone()), t))
        .collect();
    for (path, state) in walk_definition(definition) {
        out.extend(
            state
                .transitions
                .iter()
                .map(|t| (path.child(t.from.clone()), t)),
        );
    }
    out
}
