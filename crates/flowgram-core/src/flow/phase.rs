use std::sync::Arc;

use ndarray::{s, Array2, ArrayView2};
use num_complex::Complex;
use rayon::prelude::*;
use rustfft::{Fft, FftPlanner};

use crate::consts::{DEFAULT_FLOW_BLOCK_SIZE, PARALLEL_CELL_THRESHOLD};
use crate::error::{FlowError, Result};
use crate::frame::{Frame, MotionField};

use super::FlowEstimator;

/// Block-wise FFT phase correlation.
///
/// The frame is tiled into `block_size x block_size` cells; each cell yields
/// one displacement, so the motion grid is `(height / block_size,
/// width / block_size)`. Partial cells at the right and bottom edges are
/// ignored.
pub struct PhaseFlowEstimator {
    block_size: usize,
    plan: Option<BlockPlan>,
}

struct BlockPlan {
    width: usize,
    height: usize,
    grid_rows: usize,
    grid_cols: usize,
    forward: Arc<dyn Fft<f64>>,
    inverse: Arc<dyn Fft<f64>>,
    window: Array2<f64>,
}

impl PhaseFlowEstimator {
    pub fn new(block_size: usize) -> Self {
        Self {
            block_size,
            plan: None,
        }
    }

    pub fn block_size(&self) -> usize {
        self.block_size
    }

    /// Motion grid shape, available after `initialize`.
    pub fn grid_dim(&self) -> Option<(usize, usize)> {
        self.plan.as_ref().map(|p| (p.grid_rows, p.grid_cols))
    }
}

impl Default for PhaseFlowEstimator {
    fn default() -> Self {
        Self::new(DEFAULT_FLOW_BLOCK_SIZE)
    }
}

impl FlowEstimator for PhaseFlowEstimator {
    fn initialize(&mut self, width: usize, height: usize) -> Result<()> {
        let n = self.block_size;
        if n < 4 {
            return Err(FlowError::Initialization(format!(
                "flow block size {n} is too small"
            )));
        }
        if width < n || height < n {
            return Err(FlowError::Initialization(format!(
                "frame {width}x{height} is smaller than one {n}px flow block"
            )));
        }

        let mut planner = FftPlanner::new();
        self.plan = Some(BlockPlan {
            width,
            height,
            grid_rows: height / n,
            grid_cols: width / n,
            forward: planner.plan_fft_forward(n),
            inverse: planner.plan_fft_inverse(n),
            window: hann_window(n),
        });
        Ok(())
    }

    fn compute(&mut self, previous: &Frame, next: &Frame) -> Result<MotionField> {
        let plan = self
            .plan
            .as_ref()
            .ok_or_else(|| FlowError::Estimator("estimator used before initialize".into()))?;

        for frame in [previous, next] {
            if frame.width() != plan.width || frame.height() != plan.height {
                return Err(FlowError::Estimator(format!(
                    "frame {}x{} does not match initialized size {}x{}",
                    frame.width(),
                    frame.height(),
                    plan.width,
                    plan.height
                )));
            }
        }

        let n = self.block_size;
        let cells = plan.grid_rows * plan.grid_cols;
        let cell_motion = |i: usize| {
            let (r, c) = (i / plan.grid_cols * n, i % plan.grid_cols * n);
            let prev_block = previous.data.slice(s![r..r + n, c..c + n]);
            let next_block = next.data.slice(s![r..r + n, c..c + n]);
            plan.block_displacement(prev_block, next_block)
        };

        let motion: Vec<(f32, f32)> = if cells >= PARALLEL_CELL_THRESHOLD {
            (0..cells).into_par_iter().map(cell_motion).collect()
        } else {
            (0..cells).map(cell_motion).collect()
        };

        let shape = (plan.grid_rows, plan.grid_cols);
        let dx = Array2::from_shape_vec(shape, motion.iter().map(|m| m.0).collect())
            .map_err(|e| FlowError::Estimator(e.to_string()))?;
        let dy = Array2::from_shape_vec(shape, motion.iter().map(|m| m.1).collect())
            .map_err(|e| FlowError::Estimator(e.to_string()))?;
        MotionField::from_components(dx, dy)
    }

    fn name(&self) -> &str {
        "Phase correlation"
    }
}

impl BlockPlan {
    /// Translation `(dx, dy)` that moves `previous` onto `next`.
    fn block_displacement(&self, previous: ArrayView2<f32>, next: ArrayView2<f32>) -> (f32, f32) {
        let n = self.window.nrows();
        let prev_fft = self.fft2d(previous);
        let next_fft = self.fft2d(next);

        // Normalized cross-power spectrum; its inverse peaks at the shift.
        let mut spectrum = Array2::<Complex<f64>>::zeros((n, n));
        for ((out, a), b) in spectrum.iter_mut().zip(next_fft.iter()).zip(prev_fft.iter()) {
            let cross = a * b.conj();
            let mag = cross.norm();
            if mag > 1e-12 {
                *out = cross / mag;
            }
        }
        let surface = self.ifft2d(spectrum);

        let (peak_row, peak_col) = find_peak(&surface);
        let (sub_row, sub_col) = refine_peak_wrapped(&surface, peak_row, peak_col);
        let dy = wrap_signed(peak_row, n) + sub_row;
        let dx = wrap_signed(peak_col, n) + sub_col;
        (dx as f32, dy as f32)
    }

    fn fft2d(&self, block: ArrayView2<f32>) -> Array2<Complex<f64>> {
        let n = self.window.nrows();
        let mut data = Array2::from_shape_fn((n, n), |(r, c)| {
            Complex::new(block[[r, c]] as f64 * self.window[[r, c]], 0.0)
        });
        self.transform_rows_then_cols(&mut data, &self.forward);
        data
    }

    fn ifft2d(&self, mut data: Array2<Complex<f64>>) -> Array2<f64> {
        let n = self.window.nrows();
        self.transform_rows_then_cols(&mut data, &self.inverse);
        let scale = 1.0 / (n * n) as f64;
        data.mapv(|v| v.re * scale)
    }

    fn transform_rows_then_cols(&self, data: &mut Array2<Complex<f64>>, fft: &Arc<dyn Fft<f64>>) {
        let n = data.nrows();
        let mut line = vec![Complex::new(0.0, 0.0); n];
        for r in 0..n {
            for (c, v) in line.iter_mut().enumerate() {
                *v = data[[r, c]];
            }
            fft.process(&mut line);
            for (c, v) in line.iter().enumerate() {
                data[[r, c]] = *v;
            }
        }
        for c in 0..n {
            for (r, v) in line.iter_mut().enumerate() {
                *v = data[[r, c]];
            }
            fft.process(&mut line);
            for (r, v) in line.iter().enumerate() {
                data[[r, c]] = *v;
            }
        }
    }
}

fn hann_window(n: usize) -> Array2<f64> {
    let w: Vec<f64> = (0..n)
        .map(|i| 0.5 * (1.0 - (std::f64::consts::TAU * i as f64 / n as f64).cos()))
        .collect();
    Array2::from_shape_fn((n, n), |(r, c)| w[r] * w[c])
}

fn find_peak(data: &Array2<f64>) -> (usize, usize) {
    let mut best = (0, 0);
    let mut best_val = f64::NEG_INFINITY;
    for ((r, c), &v) in data.indexed_iter() {
        if v > best_val {
            best_val = v;
            best = (r, c);
        }
    }
    best
}

/// Map an FFT bin to a signed shift in `(-n/2, n/2]`.
fn wrap_signed(bin: usize, n: usize) -> f64 {
    if bin > n / 2 {
        bin as f64 - n as f64
    } else {
        bin as f64
    }
}

/// Paraboloid sub-bin refinement using cyclic neighbours, clamped to half a bin.
fn refine_peak_wrapped(surface: &Array2<f64>, row: usize, col: usize) -> (f64, f64) {
    let n = surface.nrows();
    let prev = |i: usize| (i + n - 1) % n;
    let next = |i: usize| (i + 1) % n;

    let fit = |before: f64, at: f64, after: f64| {
        let denom = before - 2.0 * at + after;
        if denom.abs() > 1e-12 {
            ((before - after) / (2.0 * denom)).clamp(-0.5, 0.5)
        } else {
            0.0
        }
    };

    let d_row = fit(
        surface[[prev(row), col]],
        surface[[row, col]],
        surface[[next(row), col]],
    );
    let d_col = fit(
        surface[[row, prev(col)]],
        surface[[row, col]],
        surface[[row, next(col)]],
    );
    (d_row, d_col)
}
