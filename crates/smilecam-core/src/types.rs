use serde::{Deserialize, Serialize};

/// Axis-aligned bounding box in pixel coordinates of the image it was found in.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Region {
    pub x: u32,
    pub y: u32,
    pub width: u32,
    pub height: u32,
}

impl Region {
    pub fn new(x: u32, y: u32, width: u32, height: u32) -> Self {
        Self {
            x,
            y,
            width,
            height,
        }
    }

    /// Shift the region by an offset, e.g. from face-local to full-frame space.
    pub fn offset(&self, dx: u32, dy: u32) -> Self {
        Self {
            x: self.x + dx,
            y: self.y + dy,
            ..*self
        }
    }

    /// Clip the region to an image of the given size.
    pub fn clamp_to(&self, width: u32, height: u32) -> Self {
        let x = self.x.min(width);
        let y = self.y.min(height);
        Self {
            x,
            y,
            width: self.width.min(width - x),
            height: self.height.min(height - y),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.width == 0 || self.height == 0
    }
}

/// Multi-scale detection parameters.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct DetectParams {
    /// Image pyramid step between scales (> 1.0).
    pub scale_factor: f64,
    /// A candidate cluster must have more than this many members to be kept.
    pub min_neighbors: u32,
    /// Smallest window (width, height) considered.
    pub min_size: (u32, u32),
}

/// Face search over the whole grayscale frame.
pub const FACE_PARAMS: DetectParams = DetectParams {
    scale_factor: 1.1,
    min_neighbors: 5,
    min_size: (60, 60),
};

/// Smile search inside a single face crop.
pub const SMILE_PARAMS: DetectParams = DetectParams {
    scale_factor: 1.5,
    min_neighbors: 15,
    min_size: (20, 20),
};

/// A smile found inside a face. `smile` is in full-frame coordinates.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct SmileHit {
    pub face: Region,
    pub smile: Region,
}

impl SmileHit {
    /// Top-left corner of the smile as `"x,y"`.
    pub fn coordinates(&self) -> String {
        format!("{},{}", self.smile.x, self.smile.y)
    }
}
