//! Multi-scale template matching.
//!
//! Both frame and template are reduced to single-channel intensity before
//! matching, which cuts compute and removes color-balance sensitivity. The
//! search runs zero-mean normalized cross-correlation at each configured
//! scale and keeps the global best; a hit below the caller's threshold is
//! reported as NotFound.

use std::path::PathBuf;

use image::imageops::{self, FilterType};
use image::{DynamicImage, GrayImage, RgbImage};

use crate::domain::{MatchResult, Position};
use crate::error::{Result, TapdanceError};
use crate::vision::DebugSink;

/// Template scale factors tried in order. UI elements rendered at a
/// different DPI or zoom than the captured asset still match at one of
/// these.
pub const DEFAULT_SCALES: [f64; 5] = [0.5, 0.75, 1.0, 1.25, 1.5];

#[derive(Debug, Clone, Copy)]
struct ScaledMatch {
    x: u32,
    y: u32,
    width: u32,
    height: u32,
    score: f64,
}

/// Finds template images inside captured frames.
pub struct TemplateMatcher {
    template_dir: PathBuf,
    scales: Vec<f64>,
    debug: Option<DebugSink>,
}

impl TemplateMatcher {
    pub fn new(template_dir: impl Into<PathBuf>) -> Self {
        Self {
            template_dir: template_dir.into(),
            scales: DEFAULT_SCALES.to_vec(),
            debug: None,
        }
    }

    /// Override the scale set. Order matters: on equal confidence the
    /// earlier scale wins.
    pub fn with_scales(mut self, scales: Vec<f64>) -> Self {
        self.scales = scales;
        self
    }

    pub fn with_debug(mut self, sink: DebugSink) -> Self {
        self.debug = Some(sink);
        self
    }

    /// Search `frame` for the template identified by `template_id`.
    ///
    /// Returns Found at the center of the best-scoring bounding box when the
    /// best confidence reaches `threshold` (boundary inclusive), NotFound
    /// otherwise. Fails with `TemplateNotFound` when the template asset is
    /// missing or cannot be decoded.
    pub fn find(&self, frame: &RgbImage, template_id: &str, threshold: f64) -> Result<MatchResult> {
        let path = self.template_dir.join(template_id);
        let template = image::open(&path)
            .map_err(|_| TapdanceError::TemplateNotFound(template_id.to_string()))?
            .into_luma8();
        let frame_gray = DynamicImage::ImageRgb8(frame.clone()).into_luma8();
        let integral = IntegralImage::new(&frame_gray);

        let mut best: Option<ScaledMatch> = None;
        for &scale in &self.scales {
            let tw = (f64::from(template.width()) * scale).round() as u32;
            let th = (f64::from(template.height()) * scale).round() as u32;
            if tw == 0 || th == 0 || tw > frame_gray.width() || th > frame_gray.height() {
                continue;
            }
            let resized = if (tw, th) == template.dimensions() {
                template.clone()
            } else {
                imageops::resize(&template, tw, th, FilterType::Triangle)
            };
            if let Some((x, y, score)) = best_correlation(&frame_gray, &integral, &resized) {
                // Strict greater-than keeps the first-seen scale on ties.
                if best.map_or(true, |b| score > b.score) {
                    best = Some(ScaledMatch {
                        x,
                        y,
                        width: tw,
                        height: th,
                        score,
                    });
                }
            }
        }

        let Some(m) = best else {
            return Ok(MatchResult::NotFound);
        };
        let confidence = m.score.clamp(0.0, 1.0);

        if let Some(sink) = &self.debug {
            sink.record_match(frame, template_id, (m.x, m.y), (m.width, m.height), confidence);
        }
        tracing::debug!(
            template = template_id,
            confidence,
            threshold,
            "Template match scored"
        );

        if confidence < threshold {
            return Ok(MatchResult::NotFound);
        }
        let center = Position::new((m.x + m.width / 2) as i32, (m.y + m.height / 2) as i32);
        MatchResult::found(center, confidence)
    }
}

/// Summed-area tables for a grayscale frame. Padded by one zero row and
/// column so window queries need no edge handling.
struct IntegralImage {
    stride: usize,
    sum: Vec<f64>,
    sum_sq: Vec<f64>,
}

impl IntegralImage {
    fn new(frame: &GrayImage) -> Self {
        let (w, h) = frame.dimensions();
        let (w, h) = (w as usize, h as usize);
        let stride = w + 1;
        let mut sum = vec![0.0; stride * (h + 1)];
        let mut sum_sq = vec![0.0; stride * (h + 1)];
        let pixels = frame.as_raw();
        for y in 0..h {
            let mut row_sum = 0.0;
            let mut row_sq = 0.0;
            for x in 0..w {
                let v = f64::from(pixels[y * w + x]);
                row_sum += v;
                row_sq += v * v;
                sum[(y + 1) * stride + x + 1] = sum[y * stride + x + 1] + row_sum;
                sum_sq[(y + 1) * stride + x + 1] = sum_sq[y * stride + x + 1] + row_sq;
            }
        }
        Self { stride, sum, sum_sq }
    }

    /// Sum and sum-of-squares of the `w`x`h` window with top-left (`x`, `y`).
    fn window(&self, x: u32, y: u32, w: u32, h: u32) -> (f64, f64) {
        let (x0, y0) = (x as usize, y as usize);
        let (x1, y1) = (x0 + w as usize, y0 + h as usize);
        let a = y0 * self.stride + x0;
        let b = y0 * self.stride + x1;
        let c = y1 * self.stride + x0;
        let d = y1 * self.stride + x1;
        (
            self.sum[d] - self.sum[b] - self.sum[c] + self.sum[a],
            self.sum_sq[d] - self.sum_sq[b] - self.sum_sq[c] + self.sum_sq[a],
        )
    }
}

/// Best zero-mean normalized cross-correlation of `template` over `frame`.
///
/// Window mean and variance come from the precomputed integral tables, so
/// only the cross term walks template pixels; flat windows are skipped
/// before that walk. Returns the top-left corner and score of the best
/// window, or None when the template does not fit the frame or is flat
/// (zero variance). Ties are resolved to the first window in scan order.
fn best_correlation(
    frame: &GrayImage,
    integral: &IntegralImage,
    template: &GrayImage,
) -> Option<(u32, u32, f64)> {
    let (fw, fh) = frame.dimensions();
    let (tw, th) = template.dimensions();
    if tw > fw || th > fh || tw == 0 || th == 0 {
        return None;
    }

    let n = f64::from(tw) * f64::from(th);
    let t_mean = template.as_raw().iter().map(|&p| f64::from(p)).sum::<f64>() / n;
    let t_dev: Vec<f64> = template
        .as_raw()
        .iter()
        .map(|&p| f64::from(p) - t_mean)
        .collect();
    let t_norm = t_dev.iter().map(|v| v * v).sum::<f64>().sqrt();
    if t_norm == 0.0 {
        return None;
    }

    let pixels = frame.as_raw();
    let fw = fw as usize;
    let mut best: Option<(u32, u32, f64)> = None;

    for y in 0..=(fh - th) {
        for x in 0..=(frame.width() - tw) {
            let (sum, sum_sq) = integral.window(x, y, tw, th);
            let window_var = sum_sq - sum * sum / n;
            if window_var <= 0.0 {
                continue;
            }
            let mut cross = 0.0;
            for ty in 0..th {
                let row = (y + ty) as usize * fw + x as usize;
                let t_row = (ty * tw) as usize;
                for tx in 0..tw as usize {
                    // sum(t_dev) is zero, so the window mean cancels out of
                    // the numerator.
                    cross += t_dev[t_row + tx] * f64::from(pixels[row + tx]);
                }
            }
            let score = cross / (t_norm * window_var.sqrt());
            if best.map_or(true, |(_, _, s)| score > s) {
                best = Some((x, y, score));
            }
        }
    }
    best
}
