//! Workflow plan items: steps and (possibly nested) loops.

use std::num::NonZeroU32;
use std::time::Duration;

use crate::domain::Step;

pub const DEFAULT_BREAK_THRESHOLD: f64 = 0.8;
pub const DEFAULT_ITERATION_DELAY: Duration = Duration::ZERO;

/// Loop repetition count. A zero count is unrepresentable.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Iterations {
    /// Run the body a fixed number of times.
    Finite(NonZeroU32),
    /// Run until a break condition or an external stop.
    Infinite,
}

impl Iterations {
    /// Finite count; None when `count` is zero.
    pub fn finite(count: u32) -> Option<Self> {
        NonZeroU32::new(count).map(Self::Finite)
    }
}

/// A loop construct in a workflow. The body preserves declaration order and
/// may contain further loops.
#[derive(Debug, Clone, PartialEq)]
pub struct Loop {
    pub iterations: Iterations,
    pub steps: Vec<WorkflowItem>,
    /// Template that terminates the loop early when it appears on screen.
    pub break_on_find: Option<String>,
    pub break_threshold: f64,
    /// Pause between passes over the body.
    pub iteration_delay: Duration,
}

impl Loop {
    pub fn new(iterations: Iterations, steps: Vec<WorkflowItem>) -> Self {
        Self {
            iterations,
            steps,
            break_on_find: None,
            break_threshold: DEFAULT_BREAK_THRESHOLD,
            iteration_delay: DEFAULT_ITERATION_DELAY,
        }
    }

    pub fn with_break_on_find(mut self, template_id: impl Into<String>) -> Self {
        self.break_on_find = Some(template_id.into());
        self
    }

    pub fn with_break_threshold(mut self, threshold: f64) -> crate::error::Result<Self> {
        if !(0.0..=1.0).contains(&threshold) {
            return Err(crate::error::TapdanceError::InvalidConfidence(threshold));
        }
        self.break_threshold = threshold;
        Ok(self)
    }

    pub fn with_iteration_delay_secs(mut self, seconds: f64) -> crate::error::Result<Self> {
        self.iteration_delay = crate::domain::step::check_delay("iteration_delay", seconds)?;
        Ok(self)
    }

    pub fn is_infinite(&self) -> bool {
        matches!(self.iterations, Iterations::Infinite)
    }
}

/// One entry of a user-authored plan.
#[derive(Debug, Clone, PartialEq)]
pub enum WorkflowItem {
    Step(Step),
    Loop(Loop),
}
