/// Queue depth above which the producer stops decoding until the consumer
/// catches up.
pub const QUEUE_HIGH_WATER_MARK: usize = 1500;

/// How often `run()` polls the last completed frame for progress callbacks.
pub const PROGRESS_POLL_INTERVAL_MS: u64 = 100;

/// Motion samples shorter than this (in grid units) are discarded by pooling.
pub const MAGNITUDE_THRESHOLD: f32 = 0.01;

/// Minimum number of motion samples to pool with Rayon parallelism.
pub const PARALLEL_SAMPLE_THRESHOLD: usize = 16_384;

/// Minimum number of grid cells to estimate flow with Rayon parallelism.
pub const PARALLEL_CELL_THRESHOLD: usize = 64;

/// Small epsilon to avoid division by zero in floating-point comparisons.
pub const EPSILON: f32 = 1e-10;

/// Default number of angular buckets per frame (2 degrees per bucket).
pub const DEFAULT_POOL_COUNT: usize = 180;

/// Default clipping ceiling, as a fraction of the frame area.
pub const DEFAULT_MAX_VALUE: f32 = 0.02;

/// Default centre of the focus band, as a fraction of the pool axis.
pub const DEFAULT_FOCUS_POINT: f32 = 0.5;

/// Default width of the focus band, as a fraction of the pool axis.
pub const DEFAULT_FOCUS_SIZE: f32 = 0.5;

/// Default (reserved) wave smoothing factor.
pub const DEFAULT_SMOOTHING: f32 = 0.5;

/// Default edge length, in pixels, of one phase-correlation grid cell.
pub const DEFAULT_FLOW_BLOCK_SIZE: usize = 16;

/// Frames per block when streaming the histogram out in chunks.
pub const DEFAULT_BLOCK_FRAMES: usize = 400;

/// SER trailer timestamps count 100 ns ticks.
pub const SER_TICKS_PER_MS: u64 = 10_000;

/// ITU-R BT.601 luminance coefficient for the red channel.
pub const LUMINANCE_R: f32 = 0.299;

/// ITU-R BT.601 luminance coefficient for the green channel.
pub const LUMINANCE_G: f32 = 0.587;

/// ITU-R BT.601 luminance coefficient for the blue channel.
pub const LUMINANCE_B: f32 = 0.114;
