//! The process engine: starts instances and applies transitions.

use crate::builder::{
    build_graph_with, definition_transitions, walk_definition, BuildError, BuildErrors,
    ProcessDefinition,
};
use crate::config::EngineConfig;
use crate::core::{
    available_transitions, merge_value, resolve, AvailableTransition, ConditionRegistry,
    HistoryEntry, ProcessHistory, ProcessInstance, Resolution, StateGraph, StatePath,
    TransitionSummary,
};
use crate::effects::task::{TaskInput, TaskInvoker};
use crate::error::ProcessError;
use chrono::Utc;
use serde_json::Value;
use std::fmt;
use std::sync::Arc;
use stillwater::effect::Effect;
use uuid::Uuid;

/// Which hook of a state is running.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
enum Hook {
    Entry,
    Exit,
    OnEnter,
}

impl Hook {
    fn task<'g>(&self, graph: &'g StateGraph, state: &StatePath) -> Option<&'g str> {
        let node = graph.state(state)?;
        match self {
            Hook::Entry => node.entry_task.as_deref(),
            Hook::Exit => node.exit_task.as_deref(),
            Hook::OnEnter => node.on_enter.as_deref(),
        }
    }
}

/// Inputs shared by every task of one `start` or `transition` call.
struct TaskScope<'a> {
    instance_id: &'a str,
    graph: &'a StateGraph,
    event: Option<&'a str>,
    payload: &'a Value,
    context: &'a Value,
}

/// Executes process definitions.
///
/// The engine owns the condition registry and the task invoker. Both are
/// read-only once the engine exists and are shared by every instance.
/// Instances themselves are plain values held by the caller; the engine
/// never keeps them.
///
/// # Example
///
/// ```rust
/// use statecraft::builder::{on, ProcessDefinition, StateDefinition};
/// use statecraft::core::ConditionRegistry;
/// use statecraft::effects::{ProcessEngine, TaskRegistry};
/// use serde_json::json;
///
/// # tokio::runtime::Runtime::new().unwrap().block_on(async {
/// let engine: ProcessEngine<()> =
///     ProcessEngine::new(ConditionRegistry::new(), TaskRegistry::new());
///
/// let graph = engine
///     .define_process(
///         ProcessDefinition::new("door")
///             .state(StateDefinition::new("closed").initial())
///             .state(StateDefinition::new("open"))
///             .transition(on("closed", "push", "open"))
///             .transition(on("open", "pull", "closed")),
///     )
///     .unwrap();
///
/// let mut door = engine.start(&graph, json!({}), &()).await.unwrap();
/// engine.transition(&mut door, "push", json!(null), json!({}), &()).await.unwrap();
/// assert_eq!(door.current_state().to_string(), "open");
/// # });
/// ```
pub struct ProcessEngine<Env> {
    conditions: Arc<ConditionRegistry>,
    tasks: Arc<dyn TaskInvoker<Env>>,
    config: EngineConfig,
}

impl<Env> Clone for ProcessEngine<Env> {
    fn clone(&self) -> Self {
        Self {
            conditions: Arc::clone(&self.conditions),
            tasks: Arc::clone(&self.tasks),
            config: self.config.clone(),
        }
    }
}

impl<Env> fmt::Debug for ProcessEngine<Env> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ProcessEngine")
            .field("conditions", &self.conditions)
            .field("config", &self.config)
            .finish_non_exhaustive()
    }
}

impl<Env: Clone + Send + Sync + 'static> ProcessEngine<Env> {
    pub fn new(conditions: ConditionRegistry, tasks: impl TaskInvoker<Env> + 'static) -> Self {
        Self {
            conditions: Arc::new(conditions),
            tasks: Arc::new(tasks),
            config: EngineConfig::default(),
        }
    }

    pub fn with_config(mut self, config: EngineConfig) -> Self {
        self.config = config;
        self
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    pub fn conditions(&self) -> &ConditionRegistry {
        &self.conditions
    }

    /// Validate a definition into a graph.
    ///
    /// On top of the structural checks this reports guards naming
    /// unregistered conditions and hooks naming tasks the invoker lacks.
    pub fn define_process(
        &self,
        definition: ProcessDefinition,
    ) -> Result<Arc<StateGraph>, BuildErrors> {
        let mut missing = Vec::new();

        for (source, transition) in definition_transitions(&definition) {
            if let Some(condition) = &transition.condition {
                if !self.conditions.contains(&definition.id, condition) {
                    missing.push(BuildError::UnknownCondition {
                        from: source.to_string(),
                        event: transition.event.clone(),
                        condition: condition.clone(),
                    });
                }
            }
        }

        for (path, state) in walk_definition(&definition) {
            for task in state.tasks() {
                if !self.tasks.provides(task) {
                    missing.push(BuildError::UnknownTask {
                        state: path.to_string(),
                        task: task.to_string(),
                    });
                }
            }
        }

        let graph = build_graph_with(definition, missing)?;
        tracing::info!(
            process = graph.process_id(),
            states = graph.all_states().len(),
            "Process defined"
        );
        Ok(Arc::new(graph))
    }

    /// Start a new instance at the graph's initial path.
    ///
    /// Every state on the initial path is entered outermost first, running
    /// its entry task and then its on-enter task.
    #[tracing::instrument(skip_all, fields(process = %graph.process_id()))]
    pub async fn start(
        &self,
        graph: &Arc<StateGraph>,
        data: Value,
        env: &Env,
    ) -> Result<ProcessInstance, ProcessError> {
        let id = Uuid::new_v4().to_string();
        let initial = graph.initial_path();
        let entered: Vec<StatePath> = (1..=initial.depth()).map(|d| initial.prefix(d)).collect();

        let scope = TaskScope {
            instance_id: &id,
            graph,
            event: None,
            payload: &Value::Null,
            context: &Value::Null,
        };
        let mut staged = data;
        self.enter_states(&scope, &entered, &mut staged, env).await?;

        let instance = ProcessInstance::assemble(
            id,
            Arc::clone(graph),
            initial,
            staged,
            ProcessHistory::new(),
        );
        tracing::info!(
            instance = instance.id(),
            state = %instance.current_state(),
            "Process instance started"
        );
        Ok(instance)
    }

    /// Apply `event` to an instance.
    ///
    /// Resolution happens first and reads the committed data. Exit, entry
    /// and on-enter tasks then run against a staged copy; the instance is
    /// only updated once all of them succeeded, so any error leaves it
    /// untouched. Completed instances reject every event.
    #[tracing::instrument(skip_all, fields(instance = %instance.id, event = %event))]
    pub async fn transition(
        &self,
        instance: &mut ProcessInstance,
        event: &str,
        payload: Value,
        context: Value,
        env: &Env,
    ) -> Result<HistoryEntry, ProcessError> {
        let no_match = || ProcessError::NoMatchingTransition {
            state: instance.current.to_string(),
            event: event.to_string(),
        };
        if instance.completed {
            return Err(no_match());
        }

        let graph = Arc::clone(&instance.graph);
        let resolved = match resolve(
            &graph,
            &instance.current,
            event,
            &instance.data,
            &context,
            &self.conditions,
        )? {
            Resolution::Resolved(resolved) => resolved,
            Resolution::NoMatch => return Err(no_match()),
            Resolution::ConditionFailed { conditions } => {
                return Err(ProcessError::ConditionFailed {
                    state: instance.current.to_string(),
                    event: event.to_string(),
                    conditions,
                })
            }
        };

        let scope = TaskScope {
            instance_id: &instance.id,
            graph: &graph,
            event: Some(event),
            payload: &payload,
            context: &context,
        };
        let mut staged = instance.data.clone();
        for state in &resolved.exited {
            self.run_hook(&scope, Hook::Exit, state, &staged, env).await?;
        }
        merge_value(&mut staged, payload.clone());
        self.enter_states(&scope, &resolved.entered, &mut staged, env)
            .await?;

        let entry = HistoryEntry {
            from: instance.current.clone(),
            to: resolved.target.clone(),
            event: event.to_string(),
            timestamp: Utc::now(),
            payload: if self.config.record_payloads {
                payload
            } else {
                Value::Null
            },
        };

        instance.history.push(entry.clone());
        instance.current = resolved.target;
        instance.data = staged;
        instance.completed = graph
            .state(&instance.current)
            .is_some_and(|state| state.is_final);

        if instance.completed {
            tracing::info!(
                instance = %instance.id,
                state = %instance.current,
                "Process instance completed"
            );
        }
        Ok(entry)
    }

    /// Transitions reachable from the instance's current leaf, read-only.
    pub fn available_transitions(
        &self,
        instance: &ProcessInstance,
        context: &Value,
    ) -> Result<Vec<AvailableTransition>, ProcessError> {
        if instance.completed {
            return Ok(Vec::new());
        }
        available_transitions(
            &instance.graph,
            &instance.current,
            &instance.data,
            context,
            &self.conditions,
        )
    }

    async fn enter_states(
        &self,
        scope: &TaskScope<'_>,
        entered: &[StatePath],
        staged: &mut Value,
        env: &Env,
    ) -> Result<(), ProcessError> {
        for state in entered {
            self.run_hook(scope, Hook::Entry, state, staged, env).await?;
            if let Some(result) = self
                .run_hook(scope, Hook::OnEnter, state, staged, env)
                .await?
            {
                self.config.on_enter.apply(staged, result);
            }
        }
        Ok(())
    }

    /// Run one hook of `state` if it is bound. Returns the task result.
    async fn run_hook(
        &self,
        scope: &TaskScope<'_>,
        hook: Hook,
        state: &StatePath,
        data: &Value,
        env: &Env,
    ) -> Result<Option<Value>, ProcessError> {
        let Some(task) = hook.task(scope.graph, state) else {
            return Ok(None);
        };

        tracing::debug!(task, state = %state, hook = ?hook, "Invoking task");
        let input = TaskInput {
            instance_id: scope.instance_id.to_string(),
            process_id: scope.graph.process_id().to_string(),
            state: state.to_string(),
            event: scope.event.map(str::to_string),
            data: data.clone(),
            payload: scope.payload.clone(),
            context: scope.context.clone(),
        };

        self.tasks
            .invoke(task, input)
            .run(env)
            .await
            .map(Some)
            .map_err(|source| ProcessError::TaskExecution {
                task: task.to_string(),
                state: state.to_string(),
                source,
            })
    }
}

/// Every state of a graph as a dotted path, depth first.
pub fn all_states(graph: &StateGraph) -> Vec<String> {
    graph
        .all_states()
        .into_iter()
        .map(|path| path.to_string())
        .collect()
}

/// Every transition of a graph with fully expanded paths.
pub fn all_transitions(graph: &StateGraph) -> Vec<TransitionSummary> {
    graph.all_transitions()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::builder::{guarded, on, StateDefinition};
    use crate::config::OnEnterMerge;
    use crate::effects::task::{TaskError, TaskRegistry};
    use parking_lot::Mutex;
    use serde_json::json;
    use stillwater::effect::BoxedEffect;
    use stillwater::prelude::*;

    #[derive(Clone, Default)]
    struct Journal {
        calls: Arc<Mutex<Vec<String>>>,
    }

    impl Journal {
        fn calls(&self) -> Vec<String> {
            self.calls.lock().clone()
        }
    }

    fn journaling(
        name: &'static str,
    ) -> impl Fn(TaskInput) -> BoxedEffect<Value, TaskError, Journal> + Send + Sync + 'static {
        move |input: TaskInput| {
            from_fn(move |env: &Journal| {
                env.calls.lock().push(format!("{name}@{}", input.state));
                Ok(Value::Null)
            })
            .boxed()
        }
    }

    fn tasks() -> TaskRegistry<Journal> {
        let mut registry = TaskRegistry::new();
        for name in [
            "enter_idle",
            "leave_idle",
            "enter_processing",
            "leave_processing",
            "enter_validate",
            "leave_validate",
            "enter_review",
        ] {
            registry.register(name, journaling(name)).unwrap();
        }
        registry
            .register("lookup_stock", |_input: TaskInput| {
                pure(json!({"stock": 3})).boxed()
            })
            .unwrap();
        registry
            .register("explode", |_input: TaskInput| {
                fail(TaskError::Failed("printer on fire".to_string())).boxed()
            })
            .unwrap();
        registry
    }

    fn definition() -> ProcessDefinition {
        ProcessDefinition::new("order")
            .state(
                StateDefinition::new("idle")
                    .initial()
                    .entry_task("enter_idle")
                    .exit_task("leave_idle"),
            )
            .state(
                StateDefinition::new("processing")
                    .entry_task("enter_processing")
                    .exit_task("leave_processing")
                    .state(
                        StateDefinition::new("validate")
                            .initial()
                            .entry_task("enter_validate")
                            .exit_task("leave_validate")
                            .on_enter("lookup_stock"),
                    )
                    .state(StateDefinition::new("review").entry_task("enter_review"))
                    .state(StateDefinition::new("broken").entry_task("explode"))
                    .transition(guarded("validate", "checked", "review", "in_stock"))
                    .transition(on("validate", "break", "broken")),
            )
            .state(StateDefinition::new("shipped").final_state())
            .transition(on("idle", "start", "processing"))
            .transition(on("processing", "cancel", "idle"))
            .transition(on("processing", "ship", "shipped"))
    }

    fn engine() -> ProcessEngine<Journal> {
        let mut conditions = ConditionRegistry::new();
        conditions
            .register("order", "in_stock", |data, _| {
                data["on_enter"]["stock"].as_u64().is_some_and(|s| s > 0)
            })
            .unwrap();
        ProcessEngine::new(conditions, tasks())
    }

    #[tokio::test]
    async fn start_enters_initial_path() {
        let engine = engine();
        let env = Journal::default();
        let graph = engine.define_process(definition()).unwrap();

        let instance = engine.start(&graph, json!({"sku": "A-1"}), &env).await.unwrap();

        assert_eq!(instance.current_state().to_string(), "idle");
        assert_eq!(instance.data(), &json!({"sku": "A-1"}));
        assert!(instance.history().is_empty());
        assert_eq!(env.calls(), vec!["enter_idle@idle"]);
    }

    #[tokio::test]
    async fn entering_composite_runs_hooks_outermost_first() {
        let engine = engine();
        let env = Journal::default();
        let graph = engine.define_process(definition()).unwrap();
        let mut instance = engine.start(&graph, json!({}), &env).await.unwrap();

        engine
            .transition(&mut instance, "start", json!(null), json!({}), &env)
            .await
            .unwrap();

        assert_eq!(instance.current_state().to_string(), "processing.validate");
        assert_eq!(
            env.calls(),
            vec![
                "enter_idle@idle",
                "leave_idle@idle",
                "enter_processing@processing",
                "enter_validate@processing.validate",
            ]
        );
        assert_eq!(instance.data(), &json!({"on_enter": {"stock": 3}}));
    }

    #[tokio::test]
    async fn on_enter_result_feeds_guards() {
        let engine = engine();
        let env = Journal::default();
        let graph = engine.define_process(definition()).unwrap();
        let mut instance = engine.start(&graph, json!({}), &env).await.unwrap();

        engine
            .transition(&mut instance, "start", json!(null), json!({}), &env)
            .await
            .unwrap();
        engine
            .transition(&mut instance, "checked", json!({"by": "ops"}), json!({}), &env)
            .await
            .unwrap();

        assert_eq!(instance.current_state().to_string(), "processing.review");
        assert_eq!(instance.data()["by"], json!("ops"));
    }

    #[tokio::test]
    async fn bubbled_transition_exits_innermost_first() {
        let engine = engine();
        let env = Journal::default();
        let graph = engine.define_process(definition()).unwrap();
        let mut instance = engine.start(&graph, json!({}), &env).await.unwrap();
        engine
            .transition(&mut instance, "start", json!(null), json!({}), &env)
            .await
            .unwrap();

        engine
            .transition(&mut instance, "cancel", json!(null), json!({}), &env)
            .await
            .unwrap();

        let calls = env.calls();
        assert_eq!(
            &calls[calls.len() - 3..],
            &[
                "leave_validate@processing.validate",
                "leave_processing@processing",
                "enter_idle@idle",
            ]
        );
        assert_eq!(instance.current_state().to_string(), "idle");
    }

    #[tokio::test]
    async fn failed_task_leaves_instance_untouched() {
        let engine = engine();
        let env = Journal::default();
        let graph = engine.define_process(definition()).unwrap();
        let mut instance = engine.start(&graph, json!({}), &env).await.unwrap();
        engine
            .transition(&mut instance, "start", json!(null), json!({}), &env)
            .await
            .unwrap();
        let before = instance.clone();

        let result = engine
            .transition(&mut instance, "break", json!({"note": "x"}), json!({}), &env)
            .await;

        assert!(matches!(
            result,
            Err(ProcessError::TaskExecution { ref task, .. }) if task == "explode"
        ));
        assert_eq!(instance.current_state(), before.current_state());
        assert_eq!(instance.data(), before.data());
        assert_eq!(instance.history(), before.history());
    }

    #[tokio::test]
    async fn failed_exit_task_blocks_transition() {
        let engine = engine();
        let env = Journal::default();
        let graph = engine
            .define_process(
                ProcessDefinition::new("stuck")
                    .state(StateDefinition::new("idle").initial().exit_task("explode"))
                    .state(StateDefinition::new("busy").entry_task("enter_review"))
                    .transition(on("idle", "go", "busy")),
            )
            .unwrap();
        let mut instance = engine.start(&graph, json!({"n": 1}), &env).await.unwrap();

        let result = engine
            .transition(&mut instance, "go", json!({"n": 2}), json!({}), &env)
            .await;

        match result {
            Err(ProcessError::TaskExecution { task, state, .. }) => {
                assert_eq!(task, "explode");
                assert_eq!(state, "idle");
            }
            other => panic!("expected TaskExecution, got {other:?}"),
        }
        assert_eq!(instance.current_state().to_string(), "idle");
        assert_eq!(instance.data(), &json!({"n": 1}));
        assert_eq!(instance.history().len(), 0);
        assert!(env.calls().is_empty());
    }

    #[tokio::test]
    async fn completed_instance_rejects_events() {
        let engine = engine();
        let env = Journal::default();
        let graph = engine.define_process(definition()).unwrap();
        let mut instance = engine.start(&graph, json!({}), &env).await.unwrap();
        engine
            .transition(&mut instance, "start", json!(null), json!({}), &env)
            .await
            .unwrap();
        engine
            .transition(&mut instance, "ship", json!(null), json!({}), &env)
            .await
            .unwrap();
        assert!(instance.is_completed());

        let result = engine
            .transition(&mut instance, "cancel", json!(null), json!({}), &env)
            .await;
        assert!(matches!(
            result,
            Err(ProcessError::NoMatchingTransition { .. })
        ));
        assert_eq!(instance.history().len(), 2);
        assert!(engine
            .available_transitions(&instance, &json!({}))
            .unwrap()
            .is_empty());
    }

    #[tokio::test]
    async fn payload_recording_can_be_disabled() {
        let engine = engine().with_config(EngineConfig::default().with_record_payloads(false));
        let env = Journal::default();
        let graph = engine.define_process(definition()).unwrap();
        let mut instance = engine.start(&graph, json!({}), &env).await.unwrap();

        let entry = engine
            .transition(&mut instance, "start", json!({"secret": 1}), json!({}), &env)
            .await
            .unwrap();

        assert_eq!(entry.payload, Value::Null);
        assert_eq!(instance.data()["secret"], json!(1));
    }

    #[tokio::test]
    async fn replace_policy_swaps_data_for_on_enter_result() {
        let engine = engine()
            .with_config(EngineConfig::default().with_on_enter(OnEnterMerge::Replace));
        let env = Journal::default();
        let graph = engine.define_process(definition()).unwrap();
        let mut instance = engine.start(&graph, json!({"sku": "A-1"}), &env).await.unwrap();

        engine
            .transition(&mut instance, "start", json!(null), json!({}), &env)
            .await
            .unwrap();

        assert_eq!(instance.data(), &json!({"stock": 3}));
    }

    #[test]
    fn define_process_reports_missing_conditions_and_tasks() {
        let engine: ProcessEngine<Journal> =
            ProcessEngine::new(ConditionRegistry::new(), TaskRegistry::new());

        let errors = engine
            .define_process(
                ProcessDefinition::new("order")
                    .state(StateDefinition::new("idle").initial().entry_task("greet"))
                    .state(StateDefinition::new("busy"))
                    .transition(guarded("idle", "go", "busy", "ready")),
            )
            .unwrap_err();

        assert!(errors.contains(&BuildError::UnknownCondition {
            from: "idle".to_string(),
            event: "go".to_string(),
            condition: "ready".to_string(),
        }));
        assert!(errors.contains(&BuildError::UnknownTask {
            state: "idle".to_string(),
            task: "greet".to_string(),
        }));
        assert_eq!(errors.len(), 2);
    }

    #[test]
    fn introspection_lists_expanded_paths() {
        let graph = engine().define_process(definition()).unwrap();

        assert_eq!(
            all_states(&graph),
            vec![
                "idle",
                "processing",
                "processing.validate",
                "processing.review",
                "processing.broken",
                "shipped",
            ]
        );
        let transitions = all_transitions(&graph);
        assert!(transitions.contains(&TransitionSummary {
            from: "processing.validate".to_string(),
            to: "processing.review".to_string(),
            event: "checked".to_string(),
        }));
    }
}
