pub mod config;
mod consumer;
mod coordinator;
mod producer;
mod progress;
mod queue;
mod types;

pub use config::{CoordinatorOptions, FlowConfig};
pub use coordinator::Coordinator;
pub use progress::ProgressTicker;
pub use types::{Job, NoOpObserver, PassOutcome, PipelineObserver, SessionStatus};
