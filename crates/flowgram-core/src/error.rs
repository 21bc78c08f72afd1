use thiserror::Error;

#[derive(Error, Debug)]
pub enum FlowError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Initialization failed: {0}")]
    Initialization(String),

    #[error("Invalid SER file: {0}")]
    InvalidSer(String),

    #[error("Invalid frame dimensions: {width}x{height}")]
    InvalidDimensions { width: u32, height: u32 },

    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    #[error("Reading stalled at frame {position}: no progress over a full pass")]
    Stall { position: usize },

    #[error("Frame index {index} out of range (total: {total})")]
    IndexFault { index: usize, total: usize },

    #[error("Range {from}..{to} outside of 0..{total}")]
    Render { from: usize, to: usize, total: usize },

    #[error("Post-processing failed: {0}")]
    PostProcess(String),

    #[error("Frame source error: {0}")]
    Source(String),

    #[error("Flow estimation error: {0}")]
    Estimator(String),

    #[error("Session failed: {0}")]
    SessionFailed(String),

    #[error("Session is already running")]
    AlreadyRunning,

    #[error("Image format error: {0}")]
    Image(#[from] image::ImageError),
}

impl FlowError {
    /// Errors that leave the session in the failed state. Everything else is
    /// local to the call that produced it.
    pub fn is_fatal(&self) -> bool {
        matches!(
            self,
            Self::Stall { .. } | Self::IndexFault { .. } | Self::Source(_) | Self::Estimator(_)
        )
    }
}

pub type Result<T> = std::result::Result<T, FlowError>;
