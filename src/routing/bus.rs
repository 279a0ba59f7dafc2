//! External event bus contract and an in-memory implementation.

use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

/// Handler receiving `(payload, correlation_context)` for one event type.
pub type EventHandler = Arc<dyn Fn(Value, Value) + Send + Sync>;

/// Why an externally delivered event was not applied.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", content = "detail", rename_all = "snake_case")]
pub enum DeliveryFailureReason {
    /// The correlation context carried no usable key.
    NoCorrelationKey,
    /// No instance is registered under the key.
    UnknownInstance,
    /// The instance runs a different process than the mapping that routed the event.
    ProcessMismatch { expected: String, found: String },
    /// The engine refused the transition.
    Rejected(String),
}

impl fmt::Display for DeliveryFailureReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::NoCorrelationKey => write!(f, "no correlation key"),
            Self::UnknownInstance => write!(f, "unknown instance"),
            Self::ProcessMismatch { expected, found } => {
                write!(f, "instance runs '{found}', event routed for '{expected}'")
            }
            Self::Rejected(reason) => write!(f, "rejected: {reason}"),
        }
    }
}

/// Report sent to the bus error channel for every undelivered event.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct DeliveryFailure {
    pub event_type: String,
    pub trigger: String,
    pub correlation_key: Option<String>,
    pub reason: DeliveryFailureReason,
}

/// Subscription side of an external event bus.
pub trait EventBus: Send + Sync {
    fn subscribe(&self, event_type: &str, handler: EventHandler);

    /// Error channel for events the router could not apply.
    fn report_error(&self, failure: DeliveryFailure);
}

/// Synchronous in-process bus.
///
/// `publish` calls every handler subscribed to the event type in
/// subscription order. Reported failures are kept until taken.
#[derive(Default)]
pub struct InMemoryEventBus {
    handlers: Mutex<HashMap<String, Vec<EventHandler>>>,
    errors: Mutex<Vec<DeliveryFailure>>,
}

impl fmt::Debug for InMemoryEventBus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut event_types: Vec<String> = self.handlers.lock().keys().cloned().collect();
        event_types.sort();
        f.debug_struct("InMemoryEventBus")
            .field("event_types", &event_types)
            .field("errors", &self.errors.lock().len())
            .finish()
    }
}

impl InMemoryEventBus {
    pub fn new() -> Self {
        Self::default()
    }

    /// Deliver an event to its subscribers. Returns how many were called.
    pub fn publish(&self, event_type: &str, payload: Value, correlation: Value) -> usize {
        // Handlers run outside the lock so they may subscribe or publish.
        let handlers: Vec<EventHandler> = self
            .handlers
            .lock()
            .get(event_type)
            .cloned()
            .unwrap_or_default();

        for handler in &handlers {
            handler(payload.clone(), correlation.clone());
        }
        handlers.len()
    }

    pub fn subscriber_count(&self, event_type: &str) -> usize {
        self.handlers.lock().get(event_type).map_or(0, Vec::len)
    }

    pub fn errors(&self) -> Vec<DeliveryFailure> {
        self.errors.lock().clone()
    }

    pub fn take_errors(&self) -> Vec<DeliveryFailure> {
        std::mem::take(&mut *self.errors.lock())
    }
}

impl EventBus for InMemoryEventBus {
    fn subscribe(&self, event_type: &str, handler: EventHandler) {
        self.handlers
            .lock()
            .entry(event_type.to_string())
            .or_default()
            .push(handler);
    }

    fn report_error(&self, failure: DeliveryFailure) {
        self.errors.lock().push(failure);
    }
}
