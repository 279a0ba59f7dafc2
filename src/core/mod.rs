//! Core process model.
//!
//! Everything in this module is pure: state paths, the validated state
//! graph, guard conditions, history and transition resolution. Task
//! execution lives in [`effects`](crate::effects).

mod condition;
mod data;
pub(crate) mod graph;
mod history;
mod instance;
mod resolver;
pub(crate) mod state;

pub use condition::{Condition, ConditionRegistry};
pub use data::merge_value;
pub use graph::{GraphLevel, StateGraph, StateNode, Transition, TransitionSummary};
pub use history::{HistoryEntry, ProcessHistory};
pub use instance::ProcessInstance;
pub use resolver::{
    available_transitions, resolve, AvailableTransition, Resolution, ResolvedTransition,
};
pub use state::{StatePath, PATH_SEPARATOR};
