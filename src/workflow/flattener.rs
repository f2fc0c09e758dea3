//! Plan flattening: nested Step/Loop trees to a linear indexed plan.
//!
//! Execution and recovery both work on flat indices; loops survive as
//! metadata spans over the flat plan. Loop identity is a small integer
//! assigned here, so plans are plain value types.

use std::collections::HashMap;
use std::time::Duration;

use crate::domain::{Iterations, Step, WorkflowItem};

/// Identifier of one loop occurrence in a flattened plan.
pub type LoopId = usize;

/// One executable entry of the flattened plan.
#[derive(Debug, Clone)]
pub struct PlanEntry {
    pub step: Step,
    /// Innermost enclosing loop, if any.
    pub loop_id: Option<LoopId>,
}

/// Runtime state of one loop: its span over the flat plan plus the
/// iteration counter, reset to zero at every flatten (once per run).
#[derive(Debug, Clone)]
pub struct LoopState {
    pub iterations: Iterations,
    pub break_on_find: Option<String>,
    pub break_threshold: f64,
    pub iteration_delay: Duration,
    /// First flat index of the loop body.
    pub start: usize,
    /// Last flat index of the loop body (inclusive).
    pub end: usize,
    /// Completed passes over the body.
    pub iteration: u32,
}

/// Flatten plan items depth-first, preserving declaration order.
///
/// Every leaf step appears exactly once; each loop's leaf steps occupy one
/// contiguous index range recorded in its [`LoopState`]. A loop whose body
/// flattens to zero leaf steps gets no state entry.
pub fn flatten(items: &[WorkflowItem]) -> (Vec<PlanEntry>, HashMap<LoopId, LoopState>) {
    let mut plan = Vec::new();
    let mut states = HashMap::new();
    let mut next_id = 0;
    flatten_into(items, None, &mut plan, &mut states, &mut next_id);
    (plan, states)
}

fn flatten_into(
    items: &[WorkflowItem],
    enclosing: Option<LoopId>,
    plan: &mut Vec<PlanEntry>,
    states: &mut HashMap<LoopId, LoopState>,
    next_id: &mut LoopId,
) {
    for item in items {
        match item {
            WorkflowItem::Step(step) => plan.push(PlanEntry {
                step: step.clone(),
                loop_id: enclosing,
            }),
            WorkflowItem::Loop(spec) => {
                let loop_id = *next_id;
                *next_id += 1;
                let start = plan.len();
                flatten_into(&spec.steps, Some(loop_id), plan, states, next_id);
                if plan.len() > start {
                    states.insert(
                        loop_id,
                        LoopState {
                            iterations: spec.iterations,
                            break_on_find: spec.break_on_find.clone(),
                            break_threshold: spec.break_threshold,
                            iteration_delay: spec.iteration_delay,
                            start,
                            end: plan.len() - 1,
                            iteration: 0,
                        },
                    );
                }
            }
        }
    }
}
