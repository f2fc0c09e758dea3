//! Workflow loading and execution
//!
//! The pipeline: [`loader`] parses YAML into nested [`WorkflowItem`]s,
//! [`flattener`] turns the nesting into an indexed plan with loop spans,
//! and [`engine`] drives the plan step by step, falling back to
//! [`recovery`] when the screen no longer matches expectations.
//! [`controller`] wraps a run in a background task with cooperative
//! cancellation.
//!
//! [`WorkflowItem`]: crate::domain::WorkflowItem

pub mod context;
pub mod controller;
pub mod engine;
pub mod flattener;
pub mod loader;
pub mod loop_state;
pub mod recovery;
pub mod step_executor;
pub mod transform;

pub use context::ExecutionContext;
pub use controller::{ExecutionController, RunMode};
pub use engine::{RunOutcome, WorkflowEngine};
pub use flattener::{flatten, LoopId, LoopState, PlanEntry};
pub use loader::WorkflowLoader;
pub use loop_state::LoopStateManager;
pub use recovery::{StateRecovery, MAX_RECOVERY_ATTEMPTS};
pub use step_executor::StepExecutor;
pub use transform::CoordinateTransformer;
