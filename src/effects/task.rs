//! Named task hooks and the invoker that runs them.

use serde_json::Value;
use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;
use stillwater::effect::BoxedEffect;
use stillwater::prelude::*;

use crate::error::RegistrationError;

/// Everything a task can see when it runs.
#[derive(Clone, Debug, PartialEq)]
pub struct TaskInput {
    pub instance_id: String,
    pub process_id: String,
    /// Full dotted path of the state whose hook is running.
    pub state: String,
    /// Triggering event; `None` while starting an instance.
    pub event: Option<String>,
    /// Process data as staged for this transition.
    pub data: Value,
    pub payload: Value,
    pub context: Value,
}

/// Errors raised by task hooks.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum TaskError {
    #[error("No task registered under '{0}'")]
    UnknownTask(String),

    #[error("Task failed: {0}")]
    Failed(String),
}

/// Runs named tasks as effects over an environment.
///
/// Implement this to plug in an external task runner; [`TaskRegistry`] is
/// the in-process implementation.
pub trait TaskInvoker<Env>: Send + Sync {
    fn invoke(&self, task: &str, input: TaskInput) -> BoxedEffect<Value, TaskError, Env>;

    /// Whether `task` can be invoked. Used when a definition is registered.
    fn provides(&self, _task: &str) -> bool {
        true
    }
}

/// Factory producing a fresh effect for every invocation.
pub type TaskFactory<Env> =
    Arc<dyn Fn(TaskInput) -> BoxedEffect<Value, TaskError, Env> + Send + Sync>;

/// In-process table of task factories keyed by name.
pub struct TaskRegistry<Env> {
    tasks: HashMap<String, TaskFactory<Env>>,
}

impl<Env> Default for TaskRegistry<Env> {
    fn default() -> Self {
        Self {
            tasks: HashMap::new(),
        }
    }
}

impl<Env> fmt::Debug for TaskRegistry<Env> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut names: Vec<&String> = self.tasks.keys().collect();
        names.sort();
        f.debug_struct("TaskRegistry").field("tasks", &names).finish()
    }
}

impl<Env: Clone + Send + Sync + 'static> TaskRegistry<Env> {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a task factory. Names are unique.
    pub fn register<F>(&mut self, name: &str, task: F) -> Result<(), RegistrationError>
    where
        F: Fn(TaskInput) -> BoxedEffect<Value, TaskError, Env> + Send + Sync + 'static,
    {
        if self.tasks.contains_key(name) {
            return Err(RegistrationError::DuplicateTask(name.to_string()));
        }
        self.tasks.insert(name.to_string(), Arc::new(task));
        tracing::info!(task = name, "Task registered");
        Ok(())
    }

    /// Builder-style registration for setup code.
    pub fn with_task<F>(mut self, name: &str, task: F) -> Result<Self, RegistrationError>
    where
        F: Fn(TaskInput) -> BoxedEffect<Value, TaskError, Env> + Send + Sync + 'static,
    {
        self.register(name, task)?;
        Ok(self)
    }

    pub fn contains(&self, name: &str) -> bool {
        self.tasks.contains_key(name)
    }
}

impl<Env: Clone + Send + Sync + 'static> TaskInvoker<Env> for TaskRegistry<Env> {
    fn invoke(&self, task: &str, input: TaskInput) -> BoxedEffect<Value, TaskError, Env> {
        match self.tasks.get(task) {
            Some(factory) => factory(input),
            None => fail(TaskError::UnknownTask(task.to_string())).boxed(),
        }
    }

    fn provides(&self, task: &str) -> bool {
        self.contains(task)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use stillwater::effect::Effect;

    #[derive(Clone)]
    struct Inventory {
        stock: u64,
    }

    fn input() -> TaskInput {
        TaskInput {
            instance_id: "i-1".to_string(),
            process_id: "order".to_string(),
            state: "processing.validate".to_string(),
            event: Some("start".to_string()),
            data: json!({"sku": "A-1"}),
            payload: json!(null),
            context: json!({}),
        }
    }

    #[tokio::test]
    async fn registered_task_reads_environment() {
        let mut registry = TaskRegistry::new();
        registry
            .register("lookup_stock", |input: TaskInput| {
                from_fn(move |env: &Inventory| {
                    Ok(json!({"sku": input.data["sku"].clone(), "stock": env.stock}))
                })
                .boxed()
            })
            .unwrap();

        let result = registry
            .invoke("lookup_stock", input())
            .run(&Inventory { stock: 7 })
            .await
            .unwrap();
        assert_eq!(result, json!({"sku": "A-1", "stock": 7}));
    }

    #[tokio::test]
    async fn unknown_task_fails() {
        let registry: TaskRegistry<Inventory> = TaskRegistry::new();
        let result = registry
            .invoke("missing", input())
            .run(&Inventory { stock: 0 })
            .await;
        assert_eq!(result, Err(TaskError::UnknownTask("missing".to_string())));
        assert!(!registry.provides("missing"));
    }

    #[test]
    fn duplicate_task_is_rejected() {
        let registry = TaskRegistry::<()>::new()
            .with_task("notify", |_| pure(json!(null)).boxed())
            .unwrap();
        let result = registry.with_task("notify", |_| pure(json!(null)).boxed());
        assert_eq!(
            result.err(),
            Some(RegistrationError::DuplicateTask("notify".to_string()))
        );
    }
}
