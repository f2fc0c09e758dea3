//! Loop progression over a flattened plan.

use std::collections::HashMap;

use crate::domain::Iterations;
use crate::error::Result;
use crate::workflow::context::ExecutionContext;
use crate::workflow::flattener::{LoopId, LoopState};

/// Tracks per-loop iteration counts and decides where execution goes
/// after each completed step.
pub struct LoopStateManager {
    states: HashMap<LoopId, LoopState>,
}

impl LoopStateManager {
    pub fn new(states: HashMap<LoopId, LoopState>) -> Self {
        Self { states }
    }

    #[cfg(test)]
    pub fn state(&self, loop_id: LoopId) -> Option<&LoopState> {
        self.states.get(&loop_id)
    }

    /// Next plan index after finishing the step at `current`.
    ///
    /// For steps outside any loop this is simply `current + 1`. Inside a
    /// loop, the break template is checked against a fresh capture first;
    /// a confident match exits past the loop's last step. Reaching the
    /// loop's end either exits (finite count exhausted) or wraps to the
    /// start after the iteration delay. `Ok(None)` means a stop request
    /// interrupted that delay.
    pub async fn next_index(
        &mut self,
        ctx: &ExecutionContext,
        current: usize,
        loop_id: Option<LoopId>,
    ) -> Result<Option<usize>> {
        let Some(id) = loop_id else {
            return Ok(Some(current + 1));
        };
        let Some(state) = self.states.get_mut(&id) else {
            return Ok(Some(current + 1));
        };

        if let Some(template_id) = state.break_on_find.clone() {
            if Self::break_matched(ctx, &template_id, state.break_threshold).await? {
                tracing::info!(template = %template_id, "Break condition met, exiting loop");
                return Ok(Some(state.end + 1));
            }
        }

        if current < state.end {
            return Ok(Some(current + 1));
        }

        state.iteration += 1;
        if let Iterations::Finite(count) = state.iterations {
            if state.iteration >= count.get() {
                tracing::debug!(iterations = count.get(), "Loop complete");
                return Ok(Some(state.end + 1));
            }
        }
        tracing::debug!(iteration = state.iteration, "Loop wrapping to start");

        if !ctx.sleep(state.iteration_delay).await {
            return Ok(None);
        }
        // The screen may have changed during the delay.
        if let Some(template_id) = state.break_on_find.clone() {
            let state = &self.states[&id];
            if Self::break_matched(ctx, &template_id, state.break_threshold).await? {
                tracing::info!(template = %template_id, "Break condition met after delay");
                return Ok(Some(state.end + 1));
            }
        }
        Ok(Some(self.states[&id].start))
    }

    async fn break_matched(
        ctx: &ExecutionContext,
        template_id: &str,
        threshold: f64,
    ) -> Result<bool> {
        let result = ctx.check_template(template_id, threshold, None).await?;
        Ok(result.is_found())
    }
}
