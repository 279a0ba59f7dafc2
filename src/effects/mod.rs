//! Effectful process execution using Stillwater 0.11.0.
//!
//! This module is the imperative shell around the pure core: it runs task
//! hooks as effects and commits their results to process instances.
//!
//! # Key Concepts
//!
//! - **Tasks**: named hooks bound to states (entry, exit, on-enter)
//! - **Task Invoker**: turns a task name and input into a `BoxedEffect`
//! - **Engine**: resolves events, runs hooks and applies transitions
//!
//! Task factories return `BoxedEffect` and are built with the free-standing
//! constructors `pure()`, `fail()` and `from_fn()`.

mod engine;
mod task;

pub use engine::{all_states, all_transitions, ProcessEngine};
pub use task::{TaskError, TaskFactory, TaskInput, TaskInvoker, TaskRegistry};
