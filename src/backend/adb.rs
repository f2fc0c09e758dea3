//! Android device backend over ADB.
//!
//! Frames come from `adb exec-out screencap -p`; input goes through
//! `adb shell input tap|swipe`. Capture and input share the same device
//! coordinate space, so the capture offset is always (0, 0). Every ADB
//! invocation carries a bounded timeout so a wedged device fails the call
//! instead of hanging the driver task.

use std::process::Stdio;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use image::{imageops, RgbImage};
use tokio::process::Command;

use crate::backend::{ActionBackend, CaptureBackend};
use crate::domain::{Position, Region};
use crate::error::{Result, TapdanceError};

const DEFAULT_COMMAND_TIMEOUT: Duration = Duration::from_secs(10);
const LONG_PRESS_MS: u32 = 1000;
const SWIPE_MS: u32 = 300;

/// Thin client around the `adb` executable.
#[derive(Debug, Clone)]
pub struct AdbClient {
    serial: Option<String>,
    timeout: Duration,
}

impl AdbClient {
    /// `serial` pins a specific device; None lets adb pick the only one.
    pub fn new(serial: Option<String>) -> Self {
        Self {
            serial,
            timeout: DEFAULT_COMMAND_TIMEOUT,
        }
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    async fn exec(&self, args: &[&str]) -> Result<Vec<u8>> {
        let mut cmd = Command::new("adb");
        if let Some(serial) = &self.serial {
            cmd.arg("-s").arg(serial);
        }
        cmd.args(args);
        cmd.stdin(Stdio::null());
        cmd.stdout(Stdio::piped());
        cmd.stderr(Stdio::piped());

        let output = tokio::time::timeout(self.timeout, cmd.output())
            .await
            .map_err(|_| {
                TapdanceError::CaptureFailed(format!("adb {} timed out", args.join(" ")))
            })??;

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            return Err(TapdanceError::CaptureFailed(format!(
                "adb {} failed: {}",
                args.join(" "),
                stderr.trim()
            )));
        }
        Ok(output.stdout)
    }

    /// Capture the device framebuffer as RGB.
    pub async fn screencap(&self) -> Result<RgbImage> {
        let png = self.exec(&["exec-out", "screencap", "-p"]).await?;
        let img = image::load_from_memory(&png)
            .map_err(|e| TapdanceError::CaptureFailed(format!("screencap decode: {e}")))?;
        Ok(img.into_rgb8())
    }

    pub async fn tap(&self, x: i32, y: i32) -> Result<()> {
        self.exec(&["shell", "input", "tap", &x.to_string(), &y.to_string()])
            .await?;
        Ok(())
    }

    pub async fn swipe(&self, x1: i32, y1: i32, x2: i32, y2: i32, duration_ms: u32) -> Result<()> {
        self.exec(&[
            "shell",
            "input",
            "swipe",
            &x1.to_string(),
            &y1.to_string(),
            &x2.to_string(),
            &y2.to_string(),
            &duration_ms.to_string(),
        ])
        .await?;
        Ok(())
    }

    /// A swipe from a point to itself simulates a long press.
    pub async fn long_press(&self, x: i32, y: i32) -> Result<()> {
        self.swipe(x, y, x, y, LONG_PRESS_MS).await
    }
}

/// [`CaptureBackend`] over an ADB device. ROI captures grab the full frame
/// and crop, since screencap has no partial-capture mode.
pub struct AdbCapture {
    client: Arc<AdbClient>,
}

impl AdbCapture {
    pub fn new(client: Arc<AdbClient>) -> Self {
        Self { client }
    }
}

#[async_trait]
impl CaptureBackend for AdbCapture {
    async fn capture(&self, roi: Option<&Region>) -> Result<RgbImage> {
        let frame = self.client.screencap().await?;
        let Some(roi) = roi else {
            return Ok(frame);
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
        Ok(imageops::crop_imm(&frame, roi.x() as u32, roi.y() as u32, roi.width(), roi.height())
            .to_image())
    }

    fn offset(&self) -> Position {
        // Vision and input share device coordinates.
        Position::new(0, 0)
    }
}

/// [`ActionBackend`] over an ADB device.
///
/// `right_click` maps to a long press, the closest touch equivalent. For
/// `swipe`, the matched position is the start point and the step offset is
/// the swipe delta rather than a position adjustment.
pub struct AdbActions {
    client: Arc<AdbClient>,
}

impl AdbActions {
    pub fn new(client: Arc<AdbClient>) -> Self {
        Self { client }
    }
}

/// Action names the ADB backend understands.
pub const ADB_ACTIONS: [&str; 6] = [
    "click",
    "double_click",
    "move",
    "right_click",
    "long_press",
    "swipe",
];

#[async_trait]
impl ActionBackend for AdbActions {
    async fn run(&self, action: &str, pos: Position, offset: Position) -> Result<()> {
        let target = pos.offset(offset.x, offset.y);
        tracing::debug!(action, %target, "Dispatching ADB action");
        match action {
            "click" => self.client.tap(target.x, target.y).await,
            "double_click" => {
                self.client.tap(target.x, target.y).await?;
                self.client.tap(target.x, target.y).await
            }
            // Touch screens have no hover; move is a no-op kept for plan
            // compatibility with pointer backends.
            "move" => Ok(()),
            "right_click" | "long_press" => self.client.long_press(target.x, target.y).await,
            "swipe" => {
                self.client
                    .swipe(pos.x, pos.y, pos.x + offset.x, pos.y + offset.y, SWIPE_MS)
                    .await
            }
            other => Err(TapdanceError::UnknownAction(other.to_string())),
        }
        .map_err(|e| match e {
            err @ TapdanceError::UnknownAction(_) => err,
            err => TapdanceError::ActionFailed {
                action: action.to_string(),
                detail: err.to_string(),
            },
        })
    }
}
