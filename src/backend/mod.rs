//! Backend seams: screen acquisition and synthetic input.
//!
//! The execution core only ever talks to these two traits. Concrete
//! backends are selected by configuration, not runtime type inspection:
//! the ADB pair drives an Android device, [`actions::PointerActions`]
//! adapts a pointer-injection driver, and [`mock`] provides in-memory
//! implementations for tests.

pub mod actions;
pub mod adb;
pub mod mock;

use async_trait::async_trait;
use image::RgbImage;

use crate::domain::{Position, Region};
use crate::error::Result;

/// Produces frames of the controlled application.
///
/// A backend instance may hold thread-affine resources (capture sessions,
/// device handles); it is created for one run and never shared across
/// concurrent runs.
#[async_trait]
pub trait CaptureBackend: Send + Sync {
    /// Capture the full region, or just `roi` when given. Frames are
    /// 3-channel RGB with any alpha stripped.
    async fn capture(&self, roi: Option<&Region>) -> Result<RgbImage>;

    /// Origin of the captured region in the global input space: (0, 0) for
    /// full-screen and device captures, the window's screen-space top-left
    /// for window capture.
    fn offset(&self) -> Position;

    /// Bring the captured target to the foreground so input lands in it.
    /// Best-effort; callers treat failure as non-fatal.
    async fn ensure_active(&self) -> Result<bool> {
        Ok(true)
    }
}

/// Dispatches named input actions at global coordinates.
#[async_trait]
pub trait ActionBackend: Send + Sync {
    /// Run `action` at `pos` shifted by `offset`. Unregistered names fail
    /// with `UnknownAction`.
    async fn run(&self, action: &str, pos: Position, offset: Position) -> Result<()>;
}
