//! Routes external events to process instances.

use super::bus::{DeliveryFailure, DeliveryFailureReason, EventBus};
use crate::core::{HistoryEntry, ProcessInstance, StateGraph};
use crate::effects::ProcessEngine;
use parking_lot::RwLock;
use serde_json::Value;
use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;
use tokio::sync::{mpsc, Mutex};

/// Context field read by the default correlator.
pub const DEFAULT_CORRELATION_FIELD: &str = "correlation_id";

/// Extracts the instance key from an event's correlation context.
pub trait Correlator: Send + Sync {
    fn correlate(&self, context: &Value) -> Option<String>;
}

impl<F> Correlator for F
where
    F: Fn(&Value) -> Option<String> + Send + Sync,
{
    fn correlate(&self, context: &Value) -> Option<String> {
        self(context)
    }
}

/// Reads a top-level string field of the correlation context.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct FieldCorrelator {
    field: String,
}

impl FieldCorrelator {
    pub fn new(field: impl Into<String>) -> Self {
        Self {
            field: field.into(),
        }
    }
}

impl Default for FieldCorrelator {
    fn default() -> Self {
        Self::new(DEFAULT_CORRELATION_FIELD)
    }
}

impl Correlator for FieldCorrelator {
    fn correlate(&self, context: &Value) -> Option<String> {
        context
            .get(&self.field)
            .and_then(Value::as_str)
            .filter(|key| !key.is_empty())
            .map(str::to_string)
    }
}

/// An external event queued for delivery.
#[derive(Clone, Debug, PartialEq)]
pub struct InboundEvent {
    pub event_type: String,
    pub process_id: String,
    pub trigger: String,
    pub payload: Value,
    pub correlation: Value,
}

/// Result of delivering one inbound event.
#[derive(Clone, Debug, PartialEq)]
pub enum DeliveryOutcome {
    Applied(HistoryEntry),
    Failed(DeliveryFailure),
}

/// Handle to a registered instance. Holding the lock is the only way to
/// transition it, so at most one transition per instance is in flight.
pub type InstanceHandle = Arc<Mutex<ProcessInstance>>;

/// Bridges an [`EventBus`] to a [`ProcessEngine`].
///
/// Bus handlers only enqueue; events are applied by [`drain`](Self::drain)
/// or [`run`](Self::run), one at a time, in arrival order. Failures are
/// never returned to the bus dispatch loop: they are logged and reported on
/// the bus error channel.
pub struct EventRouter<Env> {
    engine: ProcessEngine<Env>,
    bus: Arc<dyn EventBus>,
    correlator: Arc<dyn Correlator>,
    instances: RwLock<HashMap<String, InstanceHandle>>,
    sender: parking_lot::Mutex<Option<mpsc::UnboundedSender<InboundEvent>>>,
    mailbox: Mutex<mpsc::UnboundedReceiver<InboundEvent>>,
}

impl<Env> fmt::Debug for EventRouter<Env> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("EventRouter")
            .field("engine", &self.engine)
            .field("instances", &self.instances.read().len())
            .finish_non_exhaustive()
    }
}

impl<Env: Clone + Send + Sync + 'static> EventRouter<Env> {
    pub fn new(engine: ProcessEngine<Env>, bus: Arc<dyn EventBus>) -> Self {
        let (sender, receiver) = mpsc::unbounded_channel();
        Self {
            engine,
            bus,
            correlator: Arc::new(FieldCorrelator::default()),
            instances: RwLock::new(HashMap::new()),
            sender: parking_lot::Mutex::new(Some(sender)),
            mailbox: Mutex::new(receiver),
        }
    }

    pub fn with_correlator(mut self, correlator: impl Correlator + 'static) -> Self {
        self.correlator = Arc::new(correlator);
        self
    }

    pub fn engine(&self) -> &ProcessEngine<Env> {
        &self.engine
    }

    /// Subscribe to every external event type the graph maps.
    ///
    /// Returns the number of subscriptions made.
    pub fn attach(&self, graph: &StateGraph) -> usize {
        let Some(sender) = self.sender.lock().as_ref().map(mpsc::UnboundedSender::downgrade)
        else {
            tracing::warn!(process = graph.process_id(), "Router is shut down, not attaching");
            return 0;
        };

        for (external, trigger) in graph.event_mappings() {
            let sender = sender.clone();
            let event_type = external.clone();
            let trigger = trigger.clone();
            let process_id = graph.process_id().to_string();

            self.bus.subscribe(
                external,
                Arc::new(move |payload: Value, correlation: Value| {
                    let event = InboundEvent {
                        event_type: event_type.clone(),
                        process_id: process_id.clone(),
                        trigger: trigger.clone(),
                        payload,
                        correlation,
                    };
                    let queued = sender
                        .upgrade()
                        .is_some_and(|sender| sender.send(event).is_ok());
                    if !queued {
                        tracing::warn!(event_type = %event_type, "Router is shut down, dropping event");
                    }
                }),
            );
        }

        tracing::info!(
            process = graph.process_id(),
            subscriptions = graph.event_mappings().len(),
            "Process attached to event bus"
        );
        graph.event_mappings().len()
    }

    /// Make an instance addressable under a correlation key.
    pub fn register_instance(
        &self,
        key: impl Into<String>,
        instance: ProcessInstance,
    ) -> InstanceHandle {
        let handle = Arc::new(Mutex::new(instance));
        self.instances.write().insert(key.into(), Arc::clone(&handle));
        handle
    }

    pub fn instance(&self, key: &str) -> Option<InstanceHandle> {
        self.instances.read().get(key).cloned()
    }

    pub fn remove_instance(&self, key: &str) -> Option<InstanceHandle> {
        self.instances.write().remove(key)
    }

    /// Queue an event as if it came from the bus.
    pub fn enqueue(&self, event: InboundEvent) -> bool {
        self.sender
            .lock()
            .as_ref()
            .is_some_and(|sender| sender.send(event).is_ok())
    }

    /// Stop accepting events. `run` returns once the queue is empty.
    pub fn shutdown(&self) {
        self.sender.lock().take();
    }

    /// Apply every event queued so far. Returns how many were processed.
    pub async fn drain(&self, env: &Env) -> usize {
        let mut mailbox = self.mailbox.lock().await;
        let mut processed = 0;
        while let Ok(event) = mailbox.try_recv() {
            self.dispatch(event, env).await;
            processed += 1;
        }
        processed
    }

    /// Apply events as they arrive until the router is shut down.
    pub async fn run(&self, env: &Env) {
        let mut mailbox = self.mailbox.lock().await;
        while let Some(event) = mailbox.recv().await {
            self.dispatch(event, env).await;
        }
        tracing::info!("Event router stopped");
    }

    /// Deliver one event. Never fails; failures are reported to the bus.
    pub async fn dispatch(&self, event: InboundEvent, env: &Env) -> DeliveryOutcome {
        let Some(key) = self.correlator.correlate(&event.correlation) else {
            return self.fail(&event, None, DeliveryFailureReason::NoCorrelationKey);
        };
        let Some(handle) = self.instance(&key) else {
            return self.fail(&event, Some(key), DeliveryFailureReason::UnknownInstance);
        };

        let mut instance = handle.lock().await;
        if instance.process_id() != event.process_id {
            let reason = DeliveryFailureReason::ProcessMismatch {
                expected: event.process_id.clone(),
                found: instance.process_id().to_string(),
            };
            return self.fail(&event, Some(key), reason);
        }

        let result = self
            .engine
            .transition(
                &mut instance,
                &event.trigger,
                event.payload.clone(),
                event.correlation.clone(),
                env,
            )
            .await;

        match result {
            Ok(entry) => {
                tracing::debug!(
                    key = %key,
                    event_type = %event.event_type,
                    to = %entry.to,
                    "External event applied"
                );
                DeliveryOutcome::Applied(entry)
            }
            Err(err) => {
                let reason = DeliveryFailureReason::Rejected(err.to_string());
                self.fail(&event, Some(key), reason)
            }
        }
    }

    fn fail(
        &self,
        event: &InboundEvent,
        correlation_key: Option<String>,
        reason: DeliveryFailureReason,
    ) -> DeliveryOutcome {
        tracing::warn!(
            event_type = %event.event_type,
            trigger = %event.trigger,
            key = ?correlation_key,
            reason = %reason,
            "External event not applied"
        );
        let failure = DeliveryFailure {
            event_type: event.event_type.clone(),
            trigger: event.trigger.clone(),
            correlation_key,
            reason,
        };
        self.bus.report_error(failure.clone());
        DeliveryOutcome::Failed(failure)
    }
}
