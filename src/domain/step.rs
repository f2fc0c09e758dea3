//! Step: one find-and-act unit of a workflow.

use std::time::Duration;

use crate::domain::{Position, Region};
use crate::error::{Result, TapdanceError};

pub const DEFAULT_MATCH_THRESHOLD: f64 = 0.7;
pub const DEFAULT_END_DELAY: Duration = Duration::from_secs(1);
pub const DEFAULT_RETRY_DELAY: Duration = Duration::from_secs(1);
pub const DEFAULT_RETRIES: u32 = 10;
pub const DEFAULT_START_DELAY: Duration = Duration::ZERO;
pub const DEFAULT_VERIFY_DELAY: Duration = Duration::from_secs(1);
pub const DEFAULT_VERIFY_RETRIES: u32 = 3;
pub const DEFAULT_ACTION: &str = "click";

/// One step of a workflow: find a template on screen, act at the match.
///
/// Immutable once built; construct through [`StepBuilder`], which validates
/// thresholds and delays.
#[derive(Debug, Clone, PartialEq)]
pub struct Step {
    pub name: String,
    /// Template identifier, resolved against the matcher's template directory.
    pub find: String,
    pub action: String,
    pub threshold: f64,
    pub end_delay: Duration,
    /// Sub-rectangle of the capture to scope the match, if any.
    pub roi: Option<Region>,
    /// Fine-tuning offset applied at action dispatch, not during matching.
    pub offset: Position,
    pub retries: u32,
    pub retry_delay: Duration,
    pub start_delay: Duration,
    pub verify_state_change: bool,
    pub verify_delay: Duration,
    pub verify_retries: u32,
}

impl Step {
    pub fn builder() -> StepBuilder {
        StepBuilder::new()
    }
}

/// Fluent builder for [`Step`] with validation and the stock defaults.
#[derive(Debug, Clone)]
pub struct StepBuilder {
    name: Option<String>,
    find: Option<String>,
    action: String,
    threshold: f64,
    end_delay: Duration,
    roi: Option<Region>,
    offset: Position,
    retries: u32,
    retry_delay: Duration,
    start_delay: Duration,
    verify_state_change: bool,
    verify_delay: Duration,
    verify_retries: u32,
}

impl Default for StepBuilder {
    fn default() -> Self {
        Self {
            name: None,
            find: None,
            action: DEFAULT_ACTION.to_string(),
            threshold: DEFAULT_MATCH_THRESHOLD,
            end_delay: DEFAULT_END_DELAY,
            roi: None,
            offset: Position::default(),
            retries: DEFAULT_RETRIES,
            retry_delay: DEFAULT_RETRY_DELAY,
            start_delay: DEFAULT_START_DELAY,
            verify_state_change: false,
            verify_delay: DEFAULT_VERIFY_DELAY,
            verify_retries: DEFAULT_VERIFY_RETRIES,
        }
    }
}

pub(crate) fn check_delay(field: &str, seconds: f64) -> Result<Duration> {
    if !seconds.is_finite() || seconds < 0.0 {
        return Err(TapdanceError::InvalidStep(format!(
            "{field} must be non-negative, got {seconds}"
        )));
    }
    Ok(Duration::from_secs_f64(seconds))
}

impl StepBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn name(mut self, name: impl Into<String>) -> Self {
        self.name = Some(name.into());
        self
    }

    pub fn find(mut self, template_id: impl Into<String>) -> Self {
        self.find = Some(template_id.into());
        self
    }

    pub fn action(mut self, action: impl Into<String>) -> Self {
        self.action = action.into();
        self
    }

    pub fn threshold(mut self, threshold: f64) -> Result<Self> {
        if !(0.0..=1.0).contains(&threshold) {
            return Err(TapdanceError::InvalidStep(format!(
                "threshold must be between 0.0 and 1.0, got {threshold}"
            )));
        }
        self.threshold = threshold;
        Ok(self)
    }

    pub fn end_delay_secs(mut self, seconds: f64) -> Result<Self> {
        self.end_delay = check_delay("end_delay", seconds)?;
        Ok(self)
    }

    pub fn roi(mut self, roi: Region) -> Self {
        self.roi = Some(roi);
        self
    }

    pub fn offset(mut self, x: i32, y: i32) -> Self {
        self.offset = Position::new(x, y);
        self
    }

    pub fn retries(mut self, retries: u32) -> Self {
        self.retries = retries;
        self
    }

    pub fn retry_delay_secs(mut self, seconds: f64) -> Result<Self> {
        self.retry_delay = check_delay("retry_delay", seconds)?;
        Ok(self)
    }

    pub fn start_delay_secs(mut self, seconds: f64) -> Result<Self> {
        self.start_delay = check_delay("start_delay", seconds)?;
        Ok(self)
    }

    pub fn verify_state_change(mut self, verify: bool) -> Self {
        self.verify_state_change = verify;
        self
    }

    pub fn verify_delay_secs(mut self, seconds: f64) -> Result<Self> {
        self.verify_delay = check_delay("verify_delay", seconds)?;
        Ok(self)
    }

    pub fn verify_retries(mut self, retries: u32) -> Self {
        self.verify_retries = retries;
        self
    }

    /// Build the step. `name` and `find` are required.
    pub fn build(self) -> Result<Step> {
        let name = self
            .name
            .ok_or_else(|| TapdanceError::InvalidStep("step name is required".to_string()))?;
        let find = self.find.ok_or_else(|| {
            TapdanceError::InvalidStep(format!("step '{name}' is missing required 'find' field"))
        })?;
        Ok(Step {
            name,
            find,
            action: self.action,
            threshold: self.threshold,
            end_delay: self.end_delay,
            roi: self.roi,
            offset: self.offset,
            retries: self.retries,
            retry_delay: self.retry_delay,
            start_delay: self.start_delay,
            verify_state_change: self.verify_state_change,
            verify_delay: self.verify_delay,
            verify_retries: self.verify_retries,
        })
    }
}
