//! Named guard conditions.
//!
//! Conditions are pure boolean functions of the process data and the
//! caller-supplied context. They are registered per process definition in
//! an explicit [`ConditionRegistry`] that is handed to the engine, and are
//! read-only afterwards.

use crate::error::{ProcessError, RegistrationError};
use serde_json::Value;
use std::collections::HashMap;
use std::fmt;

/// Pure predicate gating a transition.
///
/// # Example
///
/// ```rust
/// use statecraft::core::Condition;
/// use serde_json::json;
///
/// let small_amount = Condition::new(|data, _ctx| {
///     data["amount"].as_u64().is_some_and(|amount| amount <= 1000)
/// });
///
/// assert!(small_amount.check(&json!({"amount": 200}), &json!({})));
/// assert!(!small_amount.check(&json!({"amount": 2000}), &json!({})));
/// ```
pub struct Condition {
    predicate: Box<dyn Fn(&Value, &Value) -> bool + Send + Sync>,
}

impl Condition {
    /// Create a condition from a predicate over `(data, context)`.
    ///
    /// The predicate must be deterministic and free of side effects.
    pub fn new<F>(predicate: F) -> Self
    where
        F: Fn(&Value, &Value) -> bool + Send + Sync + 'static,
    {
        Condition {
            predicate: Box::new(predicate),
        }
    }

    pub fn check(&self, data: &Value, context: &Value) -> bool {
        (self.predicate)(data, context)
    }
}

impl fmt::Debug for Condition {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("Condition(..)")
    }
}

/// Conditions keyed by process definition id, then by name.
#[derive(Debug, Default)]
pub struct ConditionRegistry {
    conditions: HashMap<String, HashMap<String, Condition>>,
}

impl ConditionRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a condition for a process.
    ///
    /// Registering the same name twice for one process is an error; use
    /// [`ConditionRegistry::register_override`] to replace deliberately.
    pub fn register<F>(
        &mut self,
        process: &str,
        name: &str,
        predicate: F,
    ) -> Result<(), RegistrationError>
    where
        F: Fn(&Value, &Value) -> bool + Send + Sync + 'static,
    {
        if self.contains(process, name) {
            return Err(RegistrationError::DuplicateCondition {
                process: process.to_string(),
                name: name.to_string(),
            });
        }
        self.insert(process, name, Condition::new(predicate));
        tracing::info!(process, condition = name, "Condition registered");
        Ok(())
    }

    /// Register a condition, replacing any existing one with the same name.
    /// Returns the replaced condition.
    pub fn register_override<F>(&mut self, process: &str, name: &str, predicate: F) -> Option<Condition>
    where
        F: Fn(&Value, &Value) -> bool + Send + Sync + 'static,
    {
        let previous = self.insert(process, name, Condition::new(predicate));
        tracing::info!(
            process,
            condition = name,
            replaced = previous.is_some(),
            "Condition registered with override"
        );
        previous
    }

    fn insert(&mut self, process: &str, name: &str, condition: Condition) -> Option<Condition> {
        self.conditions
            .entry(process.to_string())
            .or_default()
            .insert(name.to_string(), condition)
    }

    pub fn contains(&self, process: &str, name: &str) -> bool {
        self.get(process, name).is_some()
    }

    pub fn get(&self, process: &str, name: &str) -> Option<&Condition> {
        self.conditions.get(process).and_then(|c| c.get(name))
    }

    /// Names registered for a process, sorted.
    pub fn names(&self, process: &str) -> Vec<&str> {
        let mut names: Vec<&str> = self
            .conditions
            .get(process)
            .map(|c| c.keys().map(String::as_str).collect())
            .unwrap_or_default();
        names.sort_unstable();
        names
    }

    /// Evaluate a named condition. Unknown names are an error, never a pass.
    pub fn evaluate(
        &self,
        process: &str,
        name: &str,
        data: &Value,
        context: &Value,
    ) -> Result<bool, ProcessError> {
        self.get(process, name)
            .map(|condition| condition.check(data, context))
            .ok_or_else(|| ProcessError::UnknownCondition {
                process: process.to_string(),
                name: name.to_string(),
            })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn approval_registry() -> ConditionRegistry {
        let mut registry = ConditionRegistry::new();
        registry
            .register("approval", "within_limit", |data, ctx| {
                data["amount"].as_u64().is_some_and(|a| a <= 1000)
                    || ctx["user"]["role"] == "admin"
            })
            .unwrap();
        registry
    }

    #[test]
    fn condition_sees_data_and_context() {
        let registry = approval_registry();
        let data = json!({"amount": 2000});

        assert!(!registry
            .evaluate("approval", "within_limit", &data, &json!({}))
            .unwrap());
        assert!(registry
            .evaluate("approval", "within_limit", &data, &json!({"user": {"role": "admin"}}))
            .unwrap());
    }

    #[test]
    fn duplicate_registration_is_rejected() {
        let mut registry = approval_registry();
        let result = registry.register("approval", "within_limit", |_, _| true);

        assert_eq!(
            result,
            Err(RegistrationError::DuplicateCondition {
                process: "approval".to_string(),
                name: "within_limit".to_string(),
            })
        );
    }

    #[test]
    fn override_replaces_existing_condition() {
        let mut registry = approval_registry();
        let previous = registry.register_override("approval", "within_limit", |_, _| true);

        assert!(previous.is_some());
        assert!(registry
            .evaluate("approval", "within_limit", &json!({"amount": 99999}), &json!({}))
            .unwrap());
    }

    #[test]
    fn conditions_are_scoped_per_process() {
        let registry = approval_registry();

        assert!(registry.contains("approval", "within_limit"));
        assert!(!registry.contains("inventory", "within_limit"));
        assert!(registry.names("inventory").is_empty());
    }

    #[test]
    fn unknown_condition_is_an_error() {
        let registry = approval_registry();
        let result = registry.evaluate("approval", "missing", &json!({}), &json!({}));

        assert!(matches!(
            result,
            Err(ProcessError::UnknownCondition { ref name, .. }) if name == "missing"
        ));
    }

    #[test]
    fn condition_is_deterministic() {
        let condition = Condition::new(|data, _| data["ok"] == true);
        let data = json!({"ok": true});

        assert_eq!(
            condition.check(&data, &Value::Null),
            condition.check(&data, &Value::Null)
        );
    }
}
