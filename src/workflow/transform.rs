//! Coordinate transformation between capture spaces.

use std::sync::Arc;

use crate::backend::CaptureBackend;
use crate::domain::{Position, Region};

/// Maps match positions from capture-local space into the global input
/// space.
///
/// Two additions happen in sequence because they translate different
/// things: the ROI offset places the cropped capture back inside the
/// captured region, and the backend offset places the captured region
/// itself inside the global coordinate space the input backend uses.
pub struct CoordinateTransformer {
    capture: Arc<dyn CaptureBackend>,
}

impl CoordinateTransformer {
    pub fn new(capture: Arc<dyn CaptureBackend>) -> Self {
        Self { capture }
    }

    /// Convert a capture-local position to global input coordinates.
    pub fn to_global(&self, relative: Position, roi: Option<&Region>) -> Position {
        let mut pos = relative;
        if let Some(roi) = roi {
            pos = pos.offset(roi.x(), roi.y());
        }
        let origin = self.capture.offset();
        pos.offset(origin.x, origin.y)
    }

    /// Apply a caller-specified fine-tuning offset ("click 10px below the
    /// matched icon"). Plain vector addition, exposed for callers that
    /// compute targets outside the find-and-act path.
    pub fn apply_offset(&self, pos: Position, offset: Position) -> Position {
        pos.offset(offset.x, offset.y)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backend::mock::{as_frame, pattern, FrameCapture};

    fn transformer(offset: Position) -> CoordinateTransformer {
        let capture = FrameCapture::new(as_frame(&pattern(1, 10, 10))).with_offset(offset);
        CoordinateTransformer::new(Arc::new(capture))
    }

    #[test]
    fn test_identity_without_roi_or_offset() {
        let t = transformer(Position::new(0, 0));
        let p = Position::new(42, 17);
        assert_eq!(t.to_global(p, None), p);
    }

    #[test]
    fn test_roi_offset_added() {
        let t = transformer(Position::new(0, 0));
        let roi = Region::new(100, 50, 10, 10).unwrap();
        assert_eq!(t.to_global(Position::new(5, 5), Some(&roi)), Position::new(105, 55));
    }

    #[test]
    fn test_backend_offset_added() {
        let t = transformer(Position::new(300, 200));
        assert_eq!(t.to_global(Position::new(5, 5), None), Position::new(305, 205));
    }

    #[test]
    fn test_roi_then_backend_equals_combined() {
        let t = transformer(Position::new(300, 200));
        let roi = Region::new(100, 50, 10, 10).unwrap();
        let staged = t.to_global(Position::new(5, 5), Some(&roi));
        let combined = Position::new(5 + 100 + 300, 5 + 50 + 200);
        assert_eq!(staged, combined);
    }

    #[test]
    fn test_apply_offset() {
        let t = transformer(Position::new(0, 0));
        assert_eq!(
            t.apply_offset(Position::new(10, 10), Position::new(0, 25)),
            Position::new(10, 35)
        );
    }
}
