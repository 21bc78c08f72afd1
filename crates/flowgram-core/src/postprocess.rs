use ndarray::Array2;

use crate::error::{FlowError, Result};
use crate::render::normalize_min_max;

/// Transform applied to a copy of the full aggregate before it is saved.
///
/// Implementations receive an owned snapshot, so a failing or misbehaving
/// transform can never corrupt the live histogram.
pub trait PostProcessor: Send + Sync {
    fn name(&self) -> &str;

    /// Turn `(frames, pools)` counts into an 8-bit image of any shape.
    fn process(&self, counts: &Array2<u32>) -> Result<Array2<u8>>;
}

/// Clip every cell at `max_value x frame_area` and stretch the result to
/// 0..=255. Rows stay frames, columns stay pools.
#[derive(Clone, Debug)]
pub struct NormalizeProcessor {
    ceiling: f32,
}

impl NormalizeProcessor {
    pub fn new(max_value: f32, frame_area: usize) -> Self {
        Self {
            ceiling: max_value * frame_area as f32,
        }
    }
}

impl PostProcessor for NormalizeProcessor {
    fn name(&self) -> &str {
        "normalize"
    }

    fn process(&self, counts: &Array2<u32>) -> Result<Array2<u8>> {
        if counts.is_empty() {
            return Err(FlowError::PostProcess("histogram is empty".into()));
        }
        let mut data = counts.mapv(|v| (v as f32).min(self.ceiling));
        normalize_min_max(&mut data);
        Ok(data.mapv(|v| (v.clamp(0.0, 1.0) * 255.0).round() as u8))
    }
}
