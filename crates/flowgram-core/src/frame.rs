use ndarray::Array2;
use std::path::PathBuf;

use crate::error::{FlowError, Result};

/// Zero-based position of a decoded frame in the stream.
pub type FrameIndex = usize;

/// A single decoded grayscale frame.
/// Pixel values are f32 in [0.0, 1.0].
#[derive(Clone, Debug)]
pub struct Frame {
    /// Pixel data, row-major, shape = (height, width)
    pub data: Array2<f32>,
    /// Original bit depth before conversion (8 or 16)
    pub original_bit_depth: u8,
    pub metadata: FrameMetadata,
}

impl Frame {
    pub fn new(data: Array2<f32>, bit_depth: u8) -> Self {
        Self {
            data,
            original_bit_depth: bit_depth,
            metadata: FrameMetadata::default(),
        }
    }

    pub fn width(&self) -> usize {
        self.data.ncols()
    }

    pub fn height(&self) -> usize {
        self.data.nrows()
    }
}

#[derive(Clone, Debug, Default)]
pub struct FrameMetadata {
    pub frame_index: FrameIndex,
    pub timestamp_us: Option<u64>,
}

/// Stream properties reported by a frame source when it is opened.
#[derive(Clone, Debug)]
pub struct SourceInfo {
    pub path: PathBuf,
    pub width: u32,
    pub height: u32,
    pub frame_count: usize,
    pub duration_ms: u64,
}

impl SourceInfo {
    /// Pixel count of one frame.
    pub fn frame_area(&self) -> usize {
        self.width as usize * self.height as usize
    }
}

/// Half-open interval `[from, to)` of frame indices.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct FrameRange {
    pub from: FrameIndex,
    pub to: FrameIndex,
}

impl FrameRange {
    pub fn new(from: FrameIndex, to: FrameIndex) -> Self {
        Self { from, to }
    }

    pub fn len(&self) -> usize {
        self.to.saturating_sub(self.from)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Check that the range is non-empty and lies within `[0, total)`.
    pub fn validate(&self, total: usize) -> Result<()> {
        if self.from >= self.to || self.to > total {
            return Err(FlowError::Render {
                from: self.from,
                to: self.to,
                total,
            });
        }
        Ok(())
    }
}

/// Per-cell 2D displacement between two adjacent frames.
///
/// Both components share the grid shape `(rows, cols)`; positive `dx` points
/// right and positive `dy` points down.
#[derive(Clone, Debug)]
pub struct MotionField {
    pub dx: Array2<f32>,
    pub dy: Array2<f32>,
}

impl MotionField {
    pub fn zeros(rows: usize, cols: usize) -> Self {
        Self {
            dx: Array2::zeros((rows, cols)),
            dy: Array2::zeros((rows, cols)),
        }
    }

    pub fn from_components(dx: Array2<f32>, dy: Array2<f32>) -> Result<Self> {
        if dx.dim() != dy.dim() {
            let (h, w) = dy.dim();
            return Err(FlowError::InvalidDimensions {
                width: w as u32,
                height: h as u32,
            });
        }
        Ok(Self { dx, dy })
    }

    pub fn grid_dim(&self) -> (usize, usize) {
        self.dx.dim()
    }

    pub fn len(&self) -> usize {
        self.dx.len()
    }

    pub fn is_empty(&self) -> bool {
        self.dx.is_empty()
    }
}
