//! Delivery of external events to running instances.
//!
//! A process definition maps external event types to its own trigger
//! names. The [`EventRouter`] subscribes those event types on an
//! [`EventBus`], finds the target instance through a [`Correlator`] and
//! applies the trigger through the engine.

mod bus;
mod router;

pub use bus::{DeliveryFailure, DeliveryFailureReason, EventBus, EventHandler, InMemoryEventBus};
pub use router::{
    Correlator, DeliveryOutcome, EventRouter, FieldCorrelator, InboundEvent, InstanceHandle,
    DEFAULT_CORRELATION_FIELD,
};
