//! Approval Workflow
//!
//! This example walks an expense report through a nested approval process.
//!
//! Key concepts:
//! - Composite states (`review` contains `manager` and `finance`)
//! - Guarded transitions evaluated against data and caller context
//! - Entry and on-enter tasks running as effects over an environment
//! - Snapshot and restore against the live process graph
//! - Routing external events to instances through an event bus
//!
//! Run with: cargo run --example approval_workflow

use serde_json::{json, Value};
use statecraft::builder::{guarded, on};
use statecraft::checkpoint::{self, Snapshot};
use statecraft::core::ConditionRegistry;
use statecraft::effects::{ProcessEngine, TaskError, TaskInput, TaskRegistry};
use statecraft::routing::{EventRouter, InMemoryEventBus};
use statecraft::{ProcessDefinition, ProcessError, StateDefinition};
use std::sync::Arc;
use stillwater::prelude::*;
use tracing::Level;

// Environment handed to every task
#[derive(Clone)]
struct Office {
    finance_limit: u64,
}

fn definition() -> ProcessDefinition {
    ProcessDefinition::new("expense")
        .description("Expense report approval")
        .state(StateDefinition::new("draft").initial())
        .state(
            StateDefinition::new("review")
                .entry_task("notify_reviewers")
                .state(
                    StateDefinition::new("manager")
                        .initial()
                        .on_enter("load_budget"),
                )
                .state(StateDefinition::new("finance"))
                .transition(guarded("manager", "APPROVE", "finance", "needs_finance"))
                .transition(on("manager", "APPROVE", "approved"))
                .transition(guarded("finance", "APPROVE", "approved", "within_budget")),
        )
        .state(StateDefinition::new("approved").final_state())
        .state(StateDefinition::new("rejected").final_state())
        .transition(on("draft", "SUBMIT", "review"))
        .transition(on("review", "REJECT", "rejected"))
        .map_event("finance.signoff", "APPROVE")
}

fn conditions() -> ConditionRegistry {
    let mut conditions = ConditionRegistry::new();
    conditions
        .register("expense", "needs_finance", |data, _| {
            data["amount"].as_u64().is_some_and(|amount| amount > 500)
        })
        .expect("fresh registry");
    conditions
        .register("expense", "within_budget", |data, ctx| {
            let amount = data["amount"].as_u64().unwrap_or(u64::MAX);
            let remaining = data["on_enter"]["remaining"].as_u64().unwrap_or(0);
            amount <= remaining || ctx["user"]["role"] == "cfo"
        })
        .expect("fresh registry");
    conditions
}

fn tasks() -> TaskRegistry<Office> {
    TaskRegistry::new()
        .with_task("notify_reviewers", |input: TaskInput| {
            println!("  [task] notifying reviewers of {}", input.instance_id);
            pure(Value::Null).boxed()
        })
        .and_then(|tasks| {
            tasks.with_task("load_budget", |input: TaskInput| {
                from_fn(move |office: &Office| {
                    let spent = input.data["department_spend"].as_u64().unwrap_or(0);
                    match office.finance_limit.checked_sub(spent) {
                        Some(remaining) => Ok(json!({"remaining": remaining})),
                        None => Err(TaskError::Failed("department is over its limit".to_string())),
                    }
                })
                .boxed()
            })
        })
        .expect("unique task names")
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt()
        .with_max_level(Level::INFO)
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .init();

    println!("=== Approval Workflow ===\n");

    let office = Office {
        finance_limit: 5_000,
    };
    let engine = ProcessEngine::new(conditions(), tasks());
    let graph = engine.define_process(definition())?;

    println!("States:");
    for state in statecraft::effects::all_states(&graph) {
        println!("  {state}");
    }

    // Step 1: submit a large report
    let data = json!({"amount": 4_200, "department_spend": 1_500});
    let mut report = engine.start(&graph, data, &office).await?;
    let note = json!({"note": "conference travel"});
    engine
        .transition(&mut report, "SUBMIT", note, json!({}), &office)
        .await?;
    println!("\nAfter SUBMIT: {}", report.current_state());

    let manager = json!({"user": {"role": "manager"}});
    engine
        .transition(&mut report, "APPROVE", Value::Null, manager, &office)
        .await?;
    println!("After manager APPROVE: {}", report.current_state());

    // Step 2: finance refuses without enough budget
    let analyst = json!({"user": {"role": "analyst"}});
    match engine
        .transition(&mut report, "APPROVE", Value::Null, analyst, &office)
        .await
    {
        Err(ProcessError::ConditionFailed { conditions, .. }) => {
            println!("Finance APPROVE blocked by {conditions:?}");
        }
        other => println!("Unexpected outcome: {other:?}"),
    }

    println!("\nAvailable from {}:", report.current_state());
    for available in engine.available_transitions(&report, &json!({}))? {
        println!(
            "  {} --{}--> {} (enabled: {})",
            available.from, available.event, available.to, available.enabled
        );
    }

    // Step 3: persist and restore
    let saved = checkpoint::serialize(&report).to_json_pretty()?;
    println!("\nSnapshot:\n{saved}");
    let restored = checkpoint::deserialize(&graph, Snapshot::from_json(&saved)?)?;

    // Step 4: the CFO signs off through the event bus
    let bus = Arc::new(InMemoryEventBus::new());
    let router = EventRouter::new(engine.clone(), bus.clone());
    router.attach(&graph);
    let handle = router.register_instance("EXP-1042", restored);

    bus.publish(
        "finance.signoff",
        Value::Null,
        json!({"correlation_id": "EXP-1042", "user": {"role": "cfo"}}),
    );
    router.drain(&office).await;

    let report = handle.lock().await;
    println!("\nFinal state: {}", report.current_state());
    println!("Completed: {}", report.is_completed());
    println!("Path:");
    for path in report.history().get_path() {
        println!("  {path}");
    }
    for failure in bus.errors() {
        println!("Delivery failure: {failure:?}");
    }

    Ok(())
}
