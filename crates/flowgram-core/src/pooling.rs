use rayon::prelude::*;

use crate::consts::{MAGNITUDE_THRESHOLD, PARALLEL_SAMPLE_THRESHOLD};
use crate::error::Result;
use crate::frame::{FrameIndex, MotionField};
use crate::histogram::AggregateHistogram;

/// Convert a displacement to `(magnitude, angle_degrees)`.
///
/// The angle is quadrant-correct and normalized to `[0, 360)`: `(1, 0)` is 0°,
/// `(0, 1)` is 90° (downward in image coordinates).
pub fn cartesian_to_polar(x: f32, y: f32) -> (f32, f32) {
    let (x, y) = (x as f64, y as f64);
    let magnitude = x.hypot(y);
    let mut angle = y.atan2(x).to_degrees();
    if angle < 0.0 {
        angle += 360.0;
    }
    // Tiny negative angles round up to exactly 360 in f32.
    let angle = angle as f32;
    let angle = if angle >= 360.0 { 0.0 } else { angle };
    (magnitude as f32, angle)
}

/// Bucket of an angle in `[0, 360)` for `pool_count` equal-width buckets.
pub fn angle_to_bucket(angle_degrees: f32, pool_count: usize) -> usize {
    let bucket = (angle_degrees as f64 * pool_count as f64 / 360.0).floor() as usize;
    bucket.min(pool_count - 1)
}

/// Reduces a motion field to one row of angular counts.
#[derive(Clone, Debug)]
pub struct AnglePooler {
    pool_count: usize,
    threshold: f32,
}

impl AnglePooler {
    pub fn new(pool_count: usize) -> Self {
        Self::with_threshold(pool_count, MAGNITUDE_THRESHOLD)
    }

    pub fn with_threshold(pool_count: usize, threshold: f32) -> Self {
        assert!(pool_count > 0, "pool_count must be positive");
        Self {
            pool_count,
            threshold,
        }
    }

    pub fn pool_count(&self) -> usize {
        self.pool_count
    }

    /// Bucket for one sample, or `None` if it is below the magnitude threshold.
    pub fn bucket_of(&self, dx: f32, dy: f32) -> Option<usize> {
        let (magnitude, angle) = cartesian_to_polar(dx, dy);
        // NaN magnitudes fail this comparison and are dropped too.
        if !(magnitude >= self.threshold) || magnitude == 0.0 {
            return None;
        }
        Some(angle_to_bucket(angle, self.pool_count))
    }

    /// Count every above-threshold sample of `field` into its angular bucket.
    pub fn pool(&self, field: &MotionField) -> Vec<u32> {
        let dx = field.dx.as_standard_layout();
        let dy = field.dy.as_standard_layout();
        let (Some(dx), Some(dy)) = (dx.as_slice(), dy.as_slice()) else {
            return self.pool_sequential(field.dx.iter().copied().zip(field.dy.iter().copied()));
        };

        if dx.len() < PARALLEL_SAMPLE_THRESHOLD {
            return self.pool_sequential(dx.iter().copied().zip(dy.iter().copied()));
        }

        let n = self.pool_count;
        dx.par_iter()
            .zip(dy.par_iter())
            .fold(
                || vec![0u32; n],
                |mut counts, (&x, &y)| {
                    if let Some(bucket) = self.bucket_of(x, y) {
                        counts[bucket] += 1;
                    }
                    counts
                },
            )
            .reduce(
                || vec![0u32; n],
                |mut a, b| {
                    for (x, y) in a.iter_mut().zip(b) {
                        *x += y;
                    }
                    a
                },
            )
    }

    fn pool_sequential(&self, samples: impl Iterator<Item = (f32, f32)>) -> Vec<u32> {
        let mut counts = vec![0u32; self.pool_count];
        for (x, y) in samples {
            if let Some(bucket) = self.bucket_of(x, y) {
                counts[bucket] += 1;
            }
        }
        counts
    }

    /// Pool `field` and add the counts into histogram row `row`.
    pub fn pool_into(
        &self,
        field: &MotionField,
        histogram: &AggregateHistogram,
        row: FrameIndex,
    ) -> Result<()> {
        let counts = self.pool(field);
        histogram.accumulate_row(row, &counts)
    }
}
