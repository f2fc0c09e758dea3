//! Self-healing: relocate the workflow when a step fails.

use crate::error::{Result, TapdanceError};
use crate::workflow::context::ExecutionContext;
use crate::workflow::flattener::PlanEntry;

pub const MAX_RECOVERY_ATTEMPTS: u32 = 5;

/// Scans the whole plan for any step whose template is currently on
/// screen and proposes resuming there.
pub struct StateRecovery<'a> {
    ctx: &'a ExecutionContext,
    plan: &'a [PlanEntry],
    max_attempts: u32,
}

impl<'a> StateRecovery<'a> {
    pub fn new(ctx: &'a ExecutionContext, plan: &'a [PlanEntry]) -> Self {
        Self {
            ctx,
            plan,
            max_attempts: MAX_RECOVERY_ATTEMPTS,
        }
    }

    pub fn with_max_attempts(mut self, max_attempts: u32) -> Self {
        self.max_attempts = max_attempts;
        self
    }

    /// Try to find the plan index to resume from.
    ///
    /// Every step's template is checked against a fresh capture using that
    /// step's own ROI and threshold. When several match, the latest plan
    /// position wins: the app is assumed to be at the furthest state we
    /// can still see. `Ok(None)` means either no template matched or the
    /// attempt budget ran out.
    pub async fn attempt_recovery(&self) -> Result<Option<usize>> {
        let attempt = self.ctx.bump_recovery_attempts();
        if attempt > self.max_attempts {
            tracing::warn!(
                attempts = attempt - 1,
                max = self.max_attempts,
                "Recovery budget exhausted"
            );
            return Ok(None);
        }
        tracing::info!(attempt, max = self.max_attempts, "Attempting state recovery");

        let mut matched = None;
        for (index, entry) in self.plan.iter().enumerate() {
            let step = &entry.step;
            let result = match self
                .ctx
                .check_template(&step.find, step.threshold, step.roi.as_ref())
                .await
            {
                Ok(result) => result,
                Err(TapdanceError::TemplateNotFound(id)) => {
                    tracing::warn!(template = %id, "Skipping step with missing template");
                    continue;
                }
                Err(e) => return Err(e),
            };
            if result.is_found() {
                tracing::debug!(
                    index,
                    step = %step.name,
                    confidence = result.confidence(),
                    "Recovery candidate"
                );
                matched = Some(index);
            }
        }

        match matched {
            Some(index) => {
                tracing::info!(index, step = %self.plan[index].step.name, "Recovered, resuming");
                Ok(Some(index))
            }
            None => {
                tracing::warn!("No known screen state found");
                Ok(None)
            }
        }
    }

    /// Like [`attempt_recovery`](Self::attempt_recovery) but a failed
    /// recovery is an error rather than a silent `None`.
    pub async fn attempt_recovery_strict(&self) -> Result<usize> {
        match self.attempt_recovery().await? {
            Some(index) => Ok(index),
            None => Err(TapdanceError::StateRecoveryExhausted {
                attempts: self.ctx.recovery_attempts(),
                max: self.max_attempts,
            }),
        }
    }
}
