//! Cooperative cancellation.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

/// Interval between stop-flag checks inside interruptible waits. Bounds the
/// worst-case stop latency regardless of the configured delay length.
pub const STOP_CHECK_INTERVAL: Duration = Duration::from_millis(100);

/// Shared, level-triggered stop flag.
///
/// Set once per run; checked at every suspension point and at the top of
/// every retry and loop iteration. In-flight capture or match calls complete
/// before the next check; there is no forced preemption.
#[derive(Debug, Clone, Default)]
pub struct StopFlag {
    inner: Arc<AtomicBool>,
}

impl StopFlag {
    pub fn new() -> Self {
        Self::default()
    }

    /// Request a stop. Idempotent.
    pub fn trigger(&self) {
        self.inner.store(true, Ordering::SeqCst);
    }

    pub fn is_set(&self) -> bool {
        self.inner.load(Ordering::SeqCst)
    }

    /// Re-arm the flag for a new run.
    pub fn reset(&self) {
        self.inner.store(false, Ordering::SeqCst);
    }

    /// Sleep for `duration`, waking every [`STOP_CHECK_INTERVAL`] to check
    /// the flag. Returns true if the sleep completed, false if interrupted.
    pub async fn sleep(&self, duration: Duration) -> bool {
        let mut remaining = duration;
        loop {
            if self.is_set() {
                return false;
            }
            if remaining.is_zero() {
                return true;
            }
            let slice = remaining.min(STOP_CHECK_INTERVAL);
            tokio::time::sleep(slice).await;
            remaining -= slice;
        }
    }
}
