//! Top-level workflow execution: flatten, step, recover.

use std::sync::Arc;

use crate::backend::{ActionBackend, CaptureBackend};
use crate::domain::{StopFlag, WorkflowItem};
use crate::error::Result;
use crate::vision::TemplateMatcher;
use crate::workflow::context::ExecutionContext;
use crate::workflow::flattener::flatten;
use crate::workflow::loop_state::LoopStateManager;
use crate::workflow::recovery::{StateRecovery, MAX_RECOVERY_ATTEMPTS};
use crate::workflow::step_executor::StepExecutor;

/// How a single workflow run ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RunOutcome {
    /// Every step ran to completion.
    Completed,
    /// A stop request interrupted the run.
    Stopped,
    /// A step failed and recovery could not relocate the workflow.
    RecoveryExhausted {
        /// Plan index of the step that failed last.
        last_index: usize,
    },
}

/// Executes one workflow against a capture/action backend pair.
///
/// Each call to [`run`](Self::run) builds a fresh [`ExecutionContext`],
/// so recovery budgets and loop iteration counts never leak between runs.
pub struct WorkflowEngine {
    items: Vec<WorkflowItem>,
    capture: Arc<dyn CaptureBackend>,
    matcher: Arc<TemplateMatcher>,
    actions: Arc<dyn ActionBackend>,
    max_recovery_attempts: u32,
}

impl WorkflowEngine {
    pub fn new(
        items: Vec<WorkflowItem>,
        capture: Arc<dyn CaptureBackend>,
        matcher: Arc<TemplateMatcher>,
        actions: Arc<dyn ActionBackend>,
    ) -> Self {
        Self {
            items,
            capture,
            matcher,
            actions,
            max_recovery_attempts: MAX_RECOVERY_ATTEMPTS,
        }
    }

    pub fn with_max_recovery_attempts(mut self, max: u32) -> Self {
        self.max_recovery_attempts = max;
        self
    }

    /// Run the workflow once. `stop` can be triggered from another task
    /// to end the run cleanly at the next check point.
    pub async fn run(&self, stop: StopFlag) -> Result<RunOutcome> {
        let ctx = ExecutionContext::new(
            self.capture.clone(),
            self.matcher.clone(),
            self.actions.clone(),
            stop,
        );
        let (plan, loop_states) = flatten(&self.items);
        if plan.is_empty() {
            tracing::warn!("Workflow has no steps");
            return Ok(RunOutcome::Completed);
        }
        tracing::info!(steps = plan.len(), loops = loop_states.len(), "Starting workflow");

        let mut loops = LoopStateManager::new(loop_states);
        let executor = StepExecutor::new(&ctx);
        let recovery =
            StateRecovery::new(&ctx, &plan).with_max_attempts(self.max_recovery_attempts);

        let mut index = 0;
        while index < plan.len() {
            if ctx.is_stopped() {
                tracing::info!("Stop requested");
                return Ok(RunOutcome::Stopped);
            }
            let entry = &plan[index];
            tracing::info!(index, step = %entry.step.name, "Executing step");

            if executor.execute(&entry.step).await? {
                match loops.next_index(&ctx, index, entry.loop_id).await? {
                    Some(next) => index = next,
                    None => return Ok(RunOutcome::Stopped),
                }
                continue;
            }

            if ctx.is_stopped() {
                return Ok(RunOutcome::Stopped);
            }
            match recovery.attempt_recovery().await? {
                Some(resume) => index = resume,
                None => {
                    tracing::error!(index, step = %entry.step.name, "Workflow cannot continue");
                    return Ok(RunOutcome::RecoveryExhausted { last_index: index });
                }
            }
        }

        tracing::info!("Workflow completed");
        Ok(RunOutcome::Completed)
    }
}
