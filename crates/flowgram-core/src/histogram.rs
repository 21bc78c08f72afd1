use std::sync::atomic::{AtomicU32, Ordering};

use ndarray::Array2;

use crate::error::{FlowError, Result};
use crate::frame::{FrameIndex, FrameRange};

/// The `[frame_count x pool_count]` grid of angular motion counts.
///
/// Each row is written by exactly one consumer job, so cells are plain
/// relaxed atomics: readers may observe a mix of finished and untouched rows,
/// but never a torn cell. Rows not yet written read as zero.
pub struct AggregateHistogram {
    cells: Box<[AtomicU32]>,
    frame_count: usize,
    pool_count: usize,
}

impl AggregateHistogram {
    pub fn new(frame_count: usize, pool_count: usize) -> Self {
        let cells = (0..frame_count * pool_count)
            .map(|_| AtomicU32::new(0))
            .collect::<Vec<_>>()
            .into_boxed_slice();
        Self {
            cells,
            frame_count,
            pool_count,
        }
    }

    pub fn frame_count(&self) -> usize {
        self.frame_count
    }

    pub fn pool_count(&self) -> usize {
        self.pool_count
    }

    fn row_slice(&self, row: FrameIndex) -> Result<&[AtomicU32]> {
        if row >= self.frame_count {
            return Err(FlowError::IndexFault {
                index: row,
                total: self.frame_count,
            });
        }
        let start = row * self.pool_count;
        Ok(&self.cells[start..start + self.pool_count])
    }

    /// Add a pooled row of counts into histogram row `row`.
    pub fn accumulate_row(&self, row: FrameIndex, counts: &[u32]) -> Result<()> {
        if counts.len() != self.pool_count {
            return Err(FlowError::InvalidDimensions {
                width: counts.len() as u32,
                height: 1,
            });
        }
        for (cell, &count) in self.row_slice(row)?.iter().zip(counts) {
            if count > 0 {
                cell.fetch_add(count, Ordering::Relaxed);
            }
        }
        Ok(())
    }

    /// Panics if `row` or `pool` is out of range.
    pub fn cell(&self, row: FrameIndex, pool: usize) -> u32 {
        self.cells[row * self.pool_count + pool].load(Ordering::Relaxed)
    }

    pub fn row(&self, row: FrameIndex) -> Result<Vec<u32>> {
        Ok(self
            .row_slice(row)?
            .iter()
            .map(|c| c.load(Ordering::Relaxed))
            .collect())
    }

    /// Copy rows `[from, to)` into an owned `(rows, pools)` array.
    pub fn snapshot(&self, range: FrameRange) -> Result<Array2<u32>> {
        range.validate(self.frame_count)?;
        let start = range.from * self.pool_count;
        let end = range.to * self.pool_count;
        let values: Vec<u32> = self.cells[start..end]
            .iter()
            .map(|c| c.load(Ordering::Relaxed))
            .collect();
        Array2::from_shape_vec((range.len(), self.pool_count), values).map_err(|e| {
            FlowError::InvalidConfig(format!("histogram snapshot shape mismatch: {e}"))
        })
    }

    /// Copy of the whole histogram. An empty stream yields a `(0, pools)` array.
    pub fn to_array(&self) -> Array2<u32> {
        Array2::from_shape_fn((self.frame_count, self.pool_count), |(r, p)| self.cell(r, p))
    }

    /// Sum of all counts in one row.
    pub fn row_total(&self, row: FrameIndex) -> Result<u64> {
        Ok(self
            .row_slice(row)?
            .iter()
            .map(|c| c.load(Ordering::Relaxed) as u64)
            .sum())
    }
}

impl std::fmt::Debug for AggregateHistogram {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AggregateHistogram")
            .field("frame_count", &self.frame_count)
            .field("pool_count", &self.pool_count)
            .finish()
    }
}
