//! Shared execution state for one workflow run.

use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::Arc;
use std::time::Duration;

use crate::backend::{ActionBackend, CaptureBackend};
use crate::domain::{MatchResult, Region, Step, StopFlag};
use crate::error::Result;
use crate::vision::TemplateMatcher;
use crate::workflow::transform::CoordinateTransformer;

/// Everything a running workflow shares: backends, matcher, cancellation,
/// and the recovery-attempt counter.
///
/// Created fresh for every run and discarded at run end; capture backends
/// may hold thread-affine resources that must not cross run boundaries.
pub struct ExecutionContext {
    capture: Arc<dyn CaptureBackend>,
    matcher: Arc<TemplateMatcher>,
    actions: Arc<dyn ActionBackend>,
    stop: StopFlag,
    transformer: CoordinateTransformer,
    recovery_attempts: AtomicU32,
}

impl ExecutionContext {
    pub fn new(
        capture: Arc<dyn CaptureBackend>,
        matcher: Arc<TemplateMatcher>,
        actions: Arc<dyn ActionBackend>,
        stop: StopFlag,
    ) -> Self {
        let transformer = CoordinateTransformer::new(capture.clone());
        Self {
            capture,
            matcher,
            actions,
            stop,
            transformer,
            recovery_attempts: AtomicU32::new(0),
        }
    }

    pub fn is_stopped(&self) -> bool {
        self.stop.is_set()
    }

    /// Interruptible wait. Returns false when a stop arrived mid-sleep.
    pub async fn sleep(&self, duration: Duration) -> bool {
        self.stop.sleep(duration).await
    }

    /// Capture (scoped to `roi` when given) and match one template.
    pub async fn check_template(
        &self,
        template_id: &str,
        threshold: f64,
        roi: Option<&Region>,
    ) -> Result<MatchResult> {
        let frame = self.capture.capture(roi).await?;
        self.matcher.find(&frame, template_id, threshold)
    }

    /// One atomic find-and-act attempt for `step`.
    ///
    /// Returns false when the template is not on screen. On a hit, the
    /// match position is transformed into global coordinates (ROI first,
    /// then the backend origin), the capture target is raised best-effort,
    /// and the step's action is dispatched with its fine offset.
    pub async fn find_and_execute_step(&self, step: &Step) -> Result<bool> {
        let result = self
            .check_template(&step.find, step.threshold, step.roi.as_ref())
            .await?;
        let Some(relative) = result.position() else {
            return Ok(false);
        };

        tracing::info!(
            step = %step.name,
            position = %relative,
            confidence = result.confidence(),
            "Found target"
        );
        let global = self.transformer.to_global(relative, step.roi.as_ref());

        if let Err(e) = self.capture.ensure_active().await {
            tracing::warn!(error = %e, "Could not raise capture target");
        }

        self.actions.run(&step.action, global, step.offset).await?;
        Ok(true)
    }

    /// Confirm the step's template left the screen after its action.
    ///
    /// Retries up to `verify_retries` times spaced by `verify_delay`.
    /// Returns false when the template is still matched after every
    /// attempt, or when a stop interrupts the wait.
    pub async fn verify_template_absent(&self, step: &Step) -> Result<bool> {
        for attempt in 1..=step.verify_retries {
            if !self.sleep(step.verify_delay).await {
                return Ok(false);
            }
            if self.is_stopped() {
                return Ok(false);
            }
            let result = self
                .check_template(&step.find, step.threshold, step.roi.as_ref())
                .await?;
            if !result.is_found() {
                tracing::info!(
                    step = %step.name,
                    attempt,
                    retries = step.verify_retries,
                    "State change verified"
                );
                return Ok(true);
            }
            tracing::debug!(step = %step.name, attempt, "State unchanged, waiting");
        }
        tracing::info!(
            step = %step.name,
            retries = step.verify_retries,
            "State verification failed"
        );
        Ok(false)
    }

    pub fn recovery_attempts(&self) -> u32 {
        self.recovery_attempts.load(Ordering::SeqCst)
    }

    /// Increment and return the recovery-attempt counter.
    pub fn bump_recovery_attempts(&self) -> u32 {
        self.recovery_attempts.fetch_add(1, Ordering::SeqCst) + 1
    }
}
