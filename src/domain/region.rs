//! Rectangular region value type (ROI).

use serde::{Deserialize, Deserializer, Serialize};

use crate::error::{Result, TapdanceError};

/// A rectangular region of a capture space. Width and height are always
/// positive; construction enforces the invariant.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub struct Region {
    x: i32,
    y: i32,
    width: u32,
    height: u32,
}

/// Deserialization funnels through [`Region::new`] so decoded values carry
/// the same positive-dimension invariant as constructed ones.
impl<'de> Deserialize<'de> for Region {
    fn deserialize<D>(deserializer: D) -> std::result::Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        #[derive(Deserialize)]
        struct Raw {
            x: i32,
            y: i32,
            width: u32,
            height: u32,
        }
        let raw = Raw::deserialize(deserializer)?;
        Region::new(raw.x, raw.y, raw.width, raw.height).map_err(serde::de::Error::custom)
    }
}

impl Region {
    pub fn new(x: i32, y: i32, width: u32, height: u32) -> Result<Self> {
        if width == 0 || height == 0 {
            return Err(TapdanceError::InvalidRegion {
                width: i64::from(width),
                height: i64::from(height),
            });
        }
        Ok(Self { x, y, width, height })
    }

    pub fn x(&self) -> i32 {
        self.x
    }

    pub fn y(&self) -> i32 {
        self.y
    }

    pub fn width(&self) -> u32 {
        self.width
    }

    pub fn height(&self) -> u32 {
        self.height
    }

    /// Right edge x-coordinate.
    pub fn right(&self) -> i32 {
        self.x + self.width as i32
    }

    /// Bottom edge y-coordinate.
    pub fn bottom(&self) -> i32 {
        self.y + self.height as i32
    }
}

impl std::fmt::Display for Region {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}x{}+{}+{}", self.width, self.height, self.x, self.y)
    }
}
