use std::ops::Range;

use ndarray::{s, Array1, Array2, Axis};

use crate::consts::EPSILON;
use crate::error::Result;
use crate::frame::FrameRange;
use crate::histogram::AggregateHistogram;
use crate::pipeline::config::FlowConfig;

/// Turns sub-ranges of the aggregate histogram into normalized images and
/// focus-band waveforms.
///
/// Rendering only reads the histogram; all intermediate buffers are private
/// to the call, so it is safe to render while the pipeline is still writing.
#[derive(Clone, Debug)]
pub struct RangeRenderer {
    config: FlowConfig,
    frame_area: usize,
}

impl RangeRenderer {
    pub fn new(config: &FlowConfig, frame_area: usize) -> Self {
        Self {
            config: config.clone(),
            frame_area,
        }
    }

    /// Per-cell clipping ceiling, `max_value x frame_area`.
    pub fn clip_ceiling(&self) -> f32 {
        self.config.max_value * self.frame_area as f32
    }

    /// Clip, normalize and (optionally) mirror rows `[from, to)`.
    ///
    /// Returns a `(frames, width)` array with values in `[0, 1]`, where width is
    /// the pool count, or half of it when mirroring.
    pub fn prepare_frame(
        &self,
        histogram: &AggregateHistogram,
        range: FrameRange,
    ) -> Result<Array2<f32>> {
        let counts = histogram.snapshot(range)?;
        let ceiling = self.clip_ceiling();
        let mut data = counts.mapv(|v| (v as f32).min(ceiling));
        normalize_min_max(&mut data);

        if self.config.mirror_half {
            Ok(mirror_fold(&data))
        } else {
            Ok(data)
        }
    }

    /// Render rows `[from, to)` as an image with one row per pool and one
    /// column per frame, and hand `(buffer, width, height)` to `sink`.
    ///
    /// The sink is not invoked if the range is invalid.
    pub fn draw_range<R>(
        &self,
        histogram: &AggregateHistogram,
        range: FrameRange,
        sink: impl FnOnce(&[f32], usize, usize) -> R,
    ) -> Result<R> {
        let prepared = self.prepare_frame(histogram, range)?;
        let (frames, pools) = prepared.dim();
        let buffer: Vec<f32> = prepared.t().iter().copied().collect();
        Ok(sink(&buffer, frames, pools))
    }

    /// Collapse the focus band of rows `[from, to)` to one value per frame and
    /// hand the series to `sink`.
    pub fn calc_wave<R>(
        &self,
        histogram: &AggregateHistogram,
        range: FrameRange,
        sink: impl FnOnce(&[f32]) -> R,
    ) -> Result<R> {
        let prepared = self.prepare_frame(histogram, range)?;
        let wave = self.wave_from_prepared(&prepared);
        Ok(sink(wave.as_slice().unwrap_or(&[])))
    }

    fn wave_from_prepared(&self, prepared: &Array2<f32>) -> Array1<f32> {
        let band = self.focus_band(prepared.ncols());
        if band.is_empty() {
            return Array1::zeros(prepared.nrows());
        }
        prepared
            .slice(s![.., band])
            .mean_axis(Axis(1))
            .unwrap_or_else(|| Array1::zeros(prepared.nrows()))
    }

    /// Pool columns covered by `focus_point ± focus_size / 2`, clamped to
    /// `[0, width)`. Never empty for a non-empty axis.
    pub fn focus_band(&self, width: usize) -> Range<usize> {
        if width == 0 {
            return 0..0;
        }
        let half = self.config.focus_size / 2.0;
        let lo = ((self.config.focus_point - half) * width as f32).floor();
        let hi = ((self.config.focus_point + half) * width as f32).ceil();
        let lo = (lo.max(0.0) as usize).min(width - 1);
        let hi = (hi.max(0.0) as usize).clamp(lo + 1, width);
        lo..hi
    }
}

/// Stretch the whole array to `[0, 1]`. A flat array becomes all zeros.
pub fn normalize_min_max(data: &mut Array2<f32>) {
    let min = data.iter().copied().fold(f32::INFINITY, f32::min);
    let max = data.iter().copied().fold(f32::NEG_INFINITY, f32::max);
    let span = max - min;
    if !span.is_finite() || span < EPSILON {
        data.fill(0.0);
        return;
    }
    data.mapv_inplace(|v| (v - min) / span);
}

/// Fold the pool axis in half: `0.5 + left[p] - right[p]`, clamped to `[0, 1]`.
///
/// Values above 0.5 mean more motion in the first half of the circle than in
/// the opposite half.
pub fn mirror_fold(data: &Array2<f32>) -> Array2<f32> {
    let half = data.ncols() / 2;
    let left = data.slice(s![.., ..half]);
    let right = data.slice(s![.., half..half * 2]);
    let mut folded = &left - &right;
    folded.mapv_inplace(|v| (0.5 + v).clamp(0.0, 1.0));
    folded
}
