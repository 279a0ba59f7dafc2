//! Statecraft: a hierarchical process engine
//!
//! Statecraft follows Stillwater's "pure core, imperative shell" philosophy.
//! Graph validation, guard evaluation and transition resolution are pure
//! functions; entry, exit and on-enter tasks run as Stillwater effects and
//! their results are only committed once every task in a transition has
//! succeeded.
//!
//! # Core Concepts
//!
//! - **State Graph**: validated, immutable tree of states and transitions
//! - **Conditions**: named pure predicates over `(data, context)`
//! - **Tasks**: named effectful hooks bound to states
//! - **Instances**: one running execution with data and append-only history
//! - **Snapshots**: plain-data capture of an instance, restorable against a live graph
//!
//! # Example
//!
//! ```rust
//! use statecraft::builder::{guarded, on, ProcessDefinition, StateDefinition};
//! use statecraft::core::ConditionRegistry;
//! use statecraft::effects::{ProcessEngine, TaskRegistry};
//! use statecraft::ProcessError;
//! use serde_json::json;
//!
//! # tokio::runtime::Runtime::new().unwrap().block_on(async {
//! let mut conditions = ConditionRegistry::new();
//! conditions
//!     .register("expense", "within_limit", |data, ctx| {
//!         data["amount"].as_u64().is_some_and(|amount| amount <= 1000)
//!             || ctx["user"]["role"] == "admin"
//!     })
//!     .unwrap();
//!
//! let engine: ProcessEngine<()> = ProcessEngine::new(conditions, TaskRegistry::new());
//! let graph = engine
//!     .define_process(
//!         ProcessDefinition::new("expense")
//!             .state(StateDefinition::new("pending").initial())
//!             .state(StateDefinition::new("approved").final_state())
//!             .transition(guarded("pending", "APPROVE", "approved", "within_limit")),
//!     )
//!     .unwrap();
//!
//! let mut expense = engine.start(&graph, json!({"amount": 2000}), &()).await.unwrap();
//!
//! let denied = engine
//!     .transition(&mut expense, "APPROVE", json!(null), json!({}), &())
//!     .await;
//! assert!(matches!(denied, Err(ProcessError::ConditionFailed { .. })));
//!
//! let admin = json!({"user": {"role": "admin"}});
//! engine
//!     .transition(&mut expense, "APPROVE", json!(null), admin, &())
//!     .await
//!     .unwrap();
//! assert!(expense.is_completed());
//! # });
//! ```

pub mod builder;
pub mod checkpoint;
pub mod config;
pub mod core;
pub mod effects;
pub mod error;
pub mod routing;

// Re-export commonly used types
pub use builder::{BuildError, BuildErrors, ProcessDefinition, StateDefinition, TransitionDefinition};
pub use checkpoint::{deserialize, serialize, Snapshot, SnapshotError};
pub use config::{EngineConfig, OnEnterMerge};
pub use crate::core::{ConditionRegistry, HistoryEntry, ProcessInstance, StateGraph, StatePath};
pub use effects::{ProcessEngine, TaskError, TaskInput, TaskInvoker, TaskRegistry};
pub use error::{ProcessError, RegistrationError};
pub use routing::{EventBus, EventRouter, InMemoryEventBus};
