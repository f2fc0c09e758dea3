//! Outcome of a template search.

use crate::domain::Position;
use crate::error::{Result, TapdanceError};

/// Result of one template matching operation.
///
/// Found carries the match center and the achieved confidence; NotFound is
/// the miss case. A sum type instead of a null-object so that match handling
/// is exhaustive at compile time.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum MatchResult {
    Found { position: Position, confidence: f64 },
    NotFound,
}

impl MatchResult {
    /// Build a Found result, rejecting confidence outside [0, 1].
    pub fn found(position: Position, confidence: f64) -> Result<Self> {
        if !(0.0..=1.0).contains(&confidence) {
            return Err(TapdanceError::InvalidConfidence(confidence));
        }
        Ok(Self::Found { position, confidence })
    }

    pub fn is_found(&self) -> bool {
        matches!(self, Self::Found { .. })
    }

    pub fn position(&self) -> Option<Position> {
        match self {
            Self::Found { position, .. } => Some(*position),
            Self::NotFound => None,
        }
    }

    /// Achieved confidence; 0.0 for NotFound.
    pub fn confidence(&self) -> f64 {
        match self {
            Self::Found { confidence, .. } => *confidence,
            Self::NotFound => 0.0,
        }
    }
}
