//! In-memory backends and synthetic frames for tests.
//!
//! Exported (not `cfg(test)`) so integration tests can drive the whole
//! engine without a device or a display.

use std::sync::atomic::{AtomicU32, AtomicUsize, Ordering};
use std::sync::Mutex;

use async_trait::async_trait;
use image::{imageops, GrayImage, RgbImage};

use crate::backend::{ActionBackend, CaptureBackend};
use crate::domain::{Position, Region};
use crate::error::{Result, TapdanceError};

/// Deterministic pseudo-random grayscale patch. Distinct seeds produce
/// patches that do not correlate, which is what normalized
/// cross-correlation needs to tell templates apart.
pub fn pattern(seed: u64, width: u32, height: u32) -> GrayImage {
    let mut state = seed.wrapping_mul(0x9E3779B97F4A7C15).wrapping_add(1);
    GrayImage::from_fn(width, height, |_, _| {
        state = state
            .wrapping_mul(6364136223846793005)
            .wrapping_add(1442695040888963407);
        image::Luma([(state >> 33) as u8])
    })
}

/// Paste `patch` into `canvas` with its top-left at (x, y).
pub fn paste(canvas: &mut GrayImage, patch: &GrayImage, x: u32, y: u32) {
    imageops::overlay(canvas, patch, i64::from(x), i64::from(y));
}

/// Grayscale canvas rendered as the RGB frames the capture seam produces.
pub fn as_frame(canvas: &GrayImage) -> RgbImage {
    image::DynamicImage::ImageLuma8(canvas.clone()).into_rgb8()
}

/// [`CaptureBackend`] replaying a scripted frame sequence.
///
/// Each capture advances through the script; the final frame repeats once
/// the script is exhausted. ROI captures crop like a real backend.
pub struct FrameCapture {
    frames: Vec<RgbImage>,
    next: AtomicUsize,
    offset: Position,
    ensure_active_calls: AtomicU32,
    fail_ensure_active: bool,
}

impl FrameCapture {
    pub fn new(frame: RgbImage) -> Self {
        Self::scripted(vec![frame])
    }

    pub fn scripted(frames: Vec<RgbImage>) -> Self {
        assert!(!frames.is_empty(), "FrameCapture needs at least one frame");
        Self {
            frames,
            next: AtomicUsize::new(0),
            offset: Position::new(0, 0),
            ensure_active_calls: AtomicU32::new(0),
            fail_ensure_active: false,
        }
    }

    pub fn with_offset(mut self, offset: Position) -> Self {
        self.offset = offset;
        self
    }

    pub fn with_failing_ensure_active(mut self) -> Self {
        self.fail_ensure_active = true;
        self
    }

    pub fn capture_count(&self) -> usize {
        self.next.load(Ordering::SeqCst)
    }

    pub fn ensure_active_calls(&self) -> u32 {
        self.ensure_active_calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl CaptureBackend for FrameCapture {
    async fn capture(&self, roi: Option<&Region>) -> Result<RgbImage> {
        let index = self.next.fetch_add(1, Ordering::SeqCst);
        let frame = &self.frames[index.min(self.frames.len() - 1)];
        let Some(roi) = roi else {
            return Ok(frame.clone());
        };
        if roi.x() < 0
            || roi.y() < 0
            || roi.right() > frame.width() as i32
            || roi.bottom() > frame.height() as i32
        {
            return Err(TapdanceError::CaptureFailed(format!(
                "ROI {roi} outside {}x{} frame",
                frame.width(),
                frame.height()
            )));
        }
        Ok(imageops::crop_imm(frame, roi.x() as u32, roi.y() as u32, roi.width(), roi.height())
            .to_image())
    }

    fn offset(&self) -> Position {
        self.offset
    }

    async fn ensure_active(&self) -> Result<bool> {
        self.ensure_active_calls.fetch_add(1, Ordering::SeqCst);
        if self.fail_ensure_active {
            return Err(TapdanceError::CaptureFailed("window gone".to_string()));
        }
        Ok(true)
    }
}

/// [`ActionBackend`] that records every dispatch.
#[derive(Default)]
pub struct RecordingActions {
    calls: Mutex<Vec<(String, Position, Position)>>,
    allowed: Option<Vec<String>>,
}

impl RecordingActions {
    pub fn new() -> Self {
        Self::default()
    }

    /// Restrict the accepted action names; others fail with UnknownAction.
    pub fn with_allowed(names: &[&str]) -> Self {
        Self {
            calls: Mutex::new(Vec::new()),
            allowed: Some(names.iter().map(|s| s.to_string()).collect()),
        }
    }

    pub fn calls(&self) -> Vec<(String, Position, Position)> {
        self.calls.lock().unwrap().clone()
    }
}

#[async_trait]
impl ActionBackend for RecordingActions {
    async fn run(&self, action: &str, pos: Position, offset: Position) -> Result<()> {
        if let Some(allowed) = &self.allowed {
            if !allowed.iter().any(|a| a == action) {
                return Err(TapdanceError::UnknownAction(action.to_string()));
            }
        }
        self.calls
            .lock()
            .unwrap()
            .push((action.to_string(), pos, offset));
        Ok(())
    }
}
