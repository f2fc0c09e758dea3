//! Start/stop lifecycle around the engine.

use std::sync::Arc;
use std::time::Duration;

use tokio::sync::Mutex;
use tokio::task::JoinHandle;

use crate::domain::StopFlag;
use crate::workflow::engine::{RunOutcome, WorkflowEngine};

/// Pause between repeated runs in [`RunMode::Loop`].
const LOOP_PAUSE: Duration = Duration::from_secs(2);

/// Whether a workflow runs once or repeats until stopped.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RunMode {
    Once,
    Loop,
}

/// Owns the background task a workflow runs on.
///
/// One run at a time; [`start`](Self::start) while a run is active is a
/// logged no-op. [`stop`](Self::stop) requests cooperative cancellation
/// and returns immediately; [`wait`](Self::wait) joins the task.
pub struct ExecutionController {
    engine: Arc<WorkflowEngine>,
    stop: StopFlag,
    handle: Mutex<Option<JoinHandle<crate::error::Result<RunOutcome>>>>,
}

impl ExecutionController {
    pub fn new(engine: WorkflowEngine) -> Self {
        Self {
            engine: Arc::new(engine),
            stop: StopFlag::new(),
            handle: Mutex::new(None),
        }
    }

    pub async fn is_running(&self) -> bool {
        self.handle
            .lock()
            .await
            .as_ref()
            .map_or(false, |h| !h.is_finished())
    }

    /// Launch the workflow on a background task.
    pub async fn start(&self, mode: RunMode) {
        let mut handle = self.handle.lock().await;
        if handle.as_ref().map_or(false, |h| !h.is_finished()) {
            tracing::warn!("Workflow already running, ignoring start request");
            return;
        }

        self.stop.reset();
        let engine = self.engine.clone();
        let stop = self.stop.clone();
        *handle = Some(tokio::spawn(async move {
            match mode {
                RunMode::Once => engine.run(stop).await,
                RunMode::Loop => {
                    let mut outcome = RunOutcome::Completed;
                    while !stop.is_set() {
                        outcome = engine.run(stop.clone()).await?;
                        if outcome == RunOutcome::Stopped {
                            break;
                        }
                        tracing::info!(?outcome, "Run finished, pausing before next run");
                        if !stop.sleep(LOOP_PAUSE).await {
                            outcome = RunOutcome::Stopped;
                            break;
                        }
                    }
                    Ok(outcome)
                }
            }
        }));
    }

    /// Request a stop. The running task unwinds at its next check point.
    pub fn stop(&self) {
        tracing::info!("Stop requested");
        self.stop.trigger();
    }

    /// Wait for the current run to finish and return its outcome.
    /// Returns `None` when no run was started.
    pub async fn wait(&self) -> Option<crate::error::Result<RunOutcome>> {
        let handle = self.handle.lock().await.take()?;
        match handle.await {
            Ok(result) => Some(result),
            Err(e) => {
                tracing::error!(error = %e, "Workflow task panicked");
                None
            }
        }
    }
}
