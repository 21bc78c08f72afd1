use serde::{Deserialize, Serialize};

use crate::consts::{
    DEFAULT_FOCUS_POINT, DEFAULT_FOCUS_SIZE, DEFAULT_MAX_VALUE, DEFAULT_POOL_COUNT,
    DEFAULT_SMOOTHING, PROGRESS_POLL_INTERVAL_MS, QUEUE_HIGH_WATER_MARK,
};
use crate::error::{FlowError, Result};

/// Session-wide analysis settings. Immutable once a session is created.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct FlowConfig {
    /// Angular buckets per frame.
    pub pool_count: usize,
    /// Clipping ceiling for a histogram cell, as a fraction of the frame area.
    pub max_value: f32,
    /// Fold the pool axis in half when rendering, showing left/right asymmetry.
    pub mirror_half: bool,
    /// Centre of the wave focus band, as a fraction of the pool axis.
    pub focus_point: f32,
    /// Width of the wave focus band, as a fraction of the pool axis.
    pub focus_size: f32,
    /// Reserved wave smoothing factor; carried but not applied.
    pub smoothing: f32,
}

impl Default for FlowConfig {
    fn default() -> Self {
        Self {
            pool_count: DEFAULT_POOL_COUNT,
            max_value: DEFAULT_MAX_VALUE,
            mirror_half: false,
            focus_point: DEFAULT_FOCUS_POINT,
            focus_size: DEFAULT_FOCUS_SIZE,
            smoothing: DEFAULT_SMOOTHING,
        }
    }
}

impl FlowConfig {
    pub fn validate(&self) -> Result<()> {
        if self.pool_count == 0 {
            return Err(FlowError::InvalidConfig("pool_count must be positive".into()));
        }
        if self.mirror_half && self.pool_count % 2 != 0 {
            return Err(FlowError::InvalidConfig(format!(
                "mirror_half needs an even pool_count, got {}",
                self.pool_count
            )));
        }
        if !self.max_value.is_finite() || self.max_value <= 0.0 {
            return Err(FlowError::InvalidConfig(format!(
                "max_value must be a positive fraction, got {}",
                self.max_value
            )));
        }
        for (name, value) in [("focus_point", self.focus_point), ("focus_size", self.focus_size)] {
            if !(0.0..=1.0).contains(&value) {
                return Err(FlowError::InvalidConfig(format!(
                    "{name} must lie in [0, 1], got {value}"
                )));
            }
        }
        Ok(())
    }

    /// Width of the rendered pool axis (halved when mirroring).
    pub fn rendered_width(&self) -> usize {
        if self.mirror_half {
            self.pool_count / 2
        } else {
            self.pool_count
        }
    }
}

/// Scheduling tunables for the producer/consumer pipeline.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CoordinatorOptions {
    /// Queue depth at which the producer blocks.
    pub high_water_mark: usize,
    /// Progress polling cadence of `run()`.
    pub poll_interval_ms: u64,
}

impl Default for CoordinatorOptions {
    fn default() -> Self {
        Self {
            high_water_mark: QUEUE_HIGH_WATER_MARK,
            poll_interval_ms: PROGRESS_POLL_INTERVAL_MS,
        }
    }
}
