//! Retry-driven execution of a single step.

use crate::domain::Step;
use crate::error::{Result, TapdanceError};
use crate::workflow::context::ExecutionContext;

/// Runs one step to completion: find the template, act on it, and
/// optionally verify that acting changed the screen.
pub struct StepExecutor<'a> {
    ctx: &'a ExecutionContext,
}

impl<'a> StepExecutor<'a> {
    pub fn new(ctx: &'a ExecutionContext) -> Self {
        Self { ctx }
    }

    /// Execute `step`, retrying up to its configured attempt count.
    ///
    /// Returns true when the step succeeded (and, if requested, its state
    /// change was verified). Returns false when every attempt missed or a
    /// stop request interrupted execution. A missing template file counts
    /// as a miss; other errors propagate.
    pub async fn execute(&self, step: &Step) -> Result<bool> {
        if !self.ctx.sleep(step.start_delay).await {
            return Ok(false);
        }

        for attempt in 1..=step.retries {
            if self.ctx.is_stopped() {
                tracing::info!(step = %step.name, "Stop requested, abandoning step");
                return Ok(false);
            }
            tracing::debug!(step = %step.name, attempt, retries = step.retries, "Attempting step");

            match self.try_once(step).await? {
                Some(done) => return Ok(done),
                None => {
                    if attempt < step.retries && !self.ctx.sleep(step.retry_delay).await {
                        return Ok(false);
                    }
                }
            }
        }

        tracing::warn!(step = %step.name, retries = step.retries, "Step failed after all retries");
        Ok(false)
    }

    /// One attempt. `Ok(None)` means the attempt failed (template not on
    /// screen, or the screen never changed after the action) and the caller
    /// should retry.
    async fn try_once(&self, step: &Step) -> Result<Option<bool>> {
        let hit = match self.ctx.find_and_execute_step(step).await {
            Ok(hit) => hit,
            Err(TapdanceError::TemplateNotFound(id)) => {
                tracing::warn!(template = %id, step = %step.name, "Template image missing");
                false
            }
            Err(e) => return Err(e),
        };
        if !hit {
            return Ok(None);
        }

        if !self.ctx.sleep(step.end_delay).await {
            return Ok(Some(false));
        }
        if step.verify_state_change && !self.ctx.verify_template_absent(step).await? {
            tracing::debug!(step = %step.name, "Screen unchanged after action");
            return Ok(None);
        }
        Ok(Some(true))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backend::mock::{as_frame, paste, pattern, FrameCapture, RecordingActions};
    use crate::domain::StopFlag;
    use crate::vision::TemplateMatcher;
    use image::RgbImage;
    use std::sync::Arc;
    use tempfile::TempDir;

    fn frame_with_target() -> RgbImage {
        let mut canvas = pattern(99, 120, 90);
        paste(&mut canvas, &pattern(7, 16, 16), 30, 20);
        as_frame(&canvas)
    }

    fn blank_frame() -> RgbImage {
        as_frame(&pattern(99, 120, 90))
    }

    fn templates() -> TempDir {
        let dir = TempDir::new().unwrap();
        as_frame(&pattern(7, 16, 16)).save(dir.path().join("target.png")).unwrap();
        dir
    }

    fn ctx(
        templates: &TempDir,
        frames: Vec<RgbImage>,
        actions: Arc<RecordingActions>,
    ) -> ExecutionContext {
        ExecutionContext::new(
            Arc::new(FrameCapture::scripted(frames)),
            Arc::new(TemplateMatcher::new(templates.path())),
            actions,
            StopFlag::new(),
        )
    }

    fn fast_step() -> Step {
        Step::builder()
            .name("tap")
            .find("target.png")
            .threshold(0.9)
            .unwrap()
            .retries(3)
            .retry_delay_secs(0.0)
            .unwrap()
            .end_delay_secs(0.0)
            .unwrap()
            .build()
            .unwrap()
    }

    #[tokio::test]
    async fn test_succeeds_first_attempt() {
        let dir = templates();
        let actions = Arc::new(RecordingActions::new());
        let ctx = ctx(&dir, vec![frame_with_target()], actions.clone());

        assert!(StepExecutor::new(&ctx).execute(&fast_step()).await.unwrap());
        assert_eq!(actions.calls().len(), 1);
    }

    #[tokio::test]
    async fn test_retries_until_template_appears() {
        let dir = templates();
        let actions = Arc::new(RecordingActions::new());
        let ctx = ctx(
            &dir,
            vec![blank_frame(), blank_frame(), frame_with_target()],
            actions.clone(),
        );

        assert!(StepExecutor::new(&ctx).execute(&fast_step()).await.unwrap());
        assert_eq!(actions.calls().len(), 1);
    }

    #[tokio::test]
    async fn test_fails_after_exhausting_retries() {
        let dir = templates();
        let actions = Arc::new(RecordingActions::new());
        let ctx = ctx(&dir, vec![blank_frame()], actions.clone());

        assert!(!StepExecutor::new(&ctx).execute(&fast_step()).await.unwrap());
        assert!(actions.calls().is_empty());
    }

    #[tokio::test]
    async fn test_missing_template_file_counts_as_miss() {
        let dir = TempDir::new().unwrap();
        let actions = Arc::new(RecordingActions::new());
        let ctx = ctx(&dir, vec![blank_frame()], actions.clone());

        let result = StepExecutor::new(&ctx).execute(&fast_step()).await;
        assert!(!result.unwrap());
    }

    #[tokio::test]
    async fn test_verify_state_change_success() {
        let dir = templates();
        let actions = Arc::new(RecordingActions::new());
        // Hit, then the verify capture no longer shows the template.
        let ctx = ctx(&dir, vec![frame_with_target(), blank_frame()], actions);

        let step = Step::builder()
            .name("tap")
            .find("target.png")
            .threshold(0.9)
            .unwrap()
            .end_delay_secs(0.0)
            .unwrap()
            .verify_state_change(true)
            .verify_delay_secs(0.0)
            .unwrap()
            .verify_retries(2)
            .build()
            .unwrap();
        assert!(StepExecutor::new(&ctx).execute(&step).await.unwrap());
    }

    #[tokio::test]
    async fn test_verify_failure_consumes_retry_attempts() {
        let dir = templates();
        let actions = Arc::new(RecordingActions::new());
        // Template never leaves the screen, so every verification fails.
        let ctx = ctx(&dir, vec![frame_with_target()], actions.clone());

        let step = Step::builder()
            .name("tap")
            .find("target.png")
            .threshold(0.9)
            .unwrap()
            .retries(3)
            .retry_delay_secs(0.0)
            .unwrap()
            .end_delay_secs(0.0)
            .unwrap()
            .verify_state_change(true)
            .verify_delay_secs(0.0)
            .unwrap()
            .verify_retries(2)
            .build()
            .unwrap();
        // Each failed verification burns one attempt and the action is
        // dispatched again, up to the retry limit.
        assert!(!StepExecutor::new(&ctx).execute(&step).await.unwrap());
        assert_eq!(actions.calls().len(), 3);
    }

    #[tokio::test]
    async fn test_stop_before_first_attempt() {
        let dir = templates();
        let stop = StopFlag::new();
        let ctx = ExecutionContext::new(
            Arc::new(FrameCapture::new(frame_with_target())),
            Arc::new(TemplateMatcher::new(dir.path())),
            Arc::new(RecordingActions::new()),
            stop.clone(),
        );
        stop.trigger();

        assert!(!StepExecutor::new(&ctx).execute(&fast_step()).await.unwrap());
    }
}
