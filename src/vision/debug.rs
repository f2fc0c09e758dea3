//! Opt-in diagnostics sink for template matching.
//!
//! When enabled, every match attempt is rendered to a PNG in the configured
//! directory: the matched bounding box, a crosshair at the center, and the
//! achieved confidence encoded in the filename. Failures to write are logged
//! and swallowed; diagnostics never affect match results.

use std::path::PathBuf;
use std::sync::atomic::{AtomicU64, Ordering};

use image::{Rgb, RgbImage};

const BOX_COLOR: Rgb<u8> = Rgb([0, 255, 0]);
const CENTER_COLOR: Rgb<u8> = Rgb([255, 0, 0]);
const CROSSHAIR_ARM: u32 = 4;

/// Writes annotated match frames to a debug directory.
#[derive(Debug)]
pub struct DebugSink {
    dir: PathBuf,
    sequence: AtomicU64,
}

impl DebugSink {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self {
            dir: dir.into(),
            sequence: AtomicU64::new(0),
        }
    }

    /// Render one match attempt. `top_left` and `size` are in frame space.
    pub fn record_match(
        &self,
        frame: &RgbImage,
        template_id: &str,
        top_left: (u32, u32),
        size: (u32, u32),
        confidence: f64,
    ) {
        let mut annotated = frame.clone();
        draw_rect_outline(&mut annotated, top_left, size, BOX_COLOR);
        let center = (top_left.0 + size.0 / 2, top_left.1 + size.1 / 2);
        draw_crosshair(&mut annotated, center, CENTER_COLOR);

        let seq = self.sequence.fetch_add(1, Ordering::SeqCst);
        let stem = template_id.replace(['/', '\\'], "_");
        let path = self.dir.join(format!("{seq:04}-{stem}-{confidence:.3}.png"));

        if let Err(e) = std::fs::create_dir_all(&self.dir) {
            tracing::warn!(error = %e, dir = %self.dir.display(), "Could not create debug directory");
            return;
        }
        if let Err(e) = annotated.save(&path) {
            tracing::warn!(error = %e, path = %path.display(), "Could not write debug frame");
        }
    }
}

fn draw_rect_outline(img: &mut RgbImage, top_left: (u32, u32), size: (u32, u32), color: Rgb<u8>) {
    let (w, h) = img.dimensions();
    if w == 0 || h == 0 || size.0 == 0 || size.1 == 0 {
        return;
    }
    let x0 = top_left.0.min(w - 1);
    let y0 = top_left.1.min(h - 1);
    let x1 = (top_left.0 + size.0 - 1).min(w - 1);
    let y1 = (top_left.1 + size.1 - 1).min(h - 1);
    for x in x0..=x1 {
        img.put_pixel(x, y0, color);
        img.put_pixel(x, y1, color);
    }
    for y in y0..=y1 {
        img.put_pixel(x0, y, color);
        img.put_pixel(x1, y, color);
    }
}

fn draw_crosshair(img: &mut RgbImage, center: (u32, u32), color: Rgb<u8>) {
    let (w, h) = img.dimensions();
    if w == 0 || h == 0 {
        return;
    }
    let (cx, cy) = (center.0.min(w - 1), center.1.min(h - 1));
    let x_lo = cx.saturating_sub(CROSSHAIR_ARM);
    let x_hi = (cx + CROSSHAIR_ARM).min(w - 1);
    let y_lo = cy.saturating_sub(CROSSHAIR_ARM);
    let y_hi = (cy + CROSSHAIR_ARM).min(h - 1);
    for x in x_lo..=x_hi {
        img.put_pixel(x, cy, color);
    }
    for y in y_lo..=y_hi {
        img.put_pixel(cx, y, color);
    }
}
