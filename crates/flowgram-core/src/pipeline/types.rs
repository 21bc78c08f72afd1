use std::sync::Arc;

use tracing::Level;

use crate::frame::{Frame, FrameIndex};

/// One unit of consumer work: the motion between two adjacent frames.
///
/// The producer hands its references to the frames over to the job; a frame
/// is shared with the following job, which uses it as `previous`. Buffers are
/// released once the consumer has written the target row.
#[derive(Debug)]
pub struct Job {
    pub previous: Arc<Frame>,
    pub current: Arc<Frame>,
    /// Histogram row receiving this job's pooled counts (`frame_index - 1`).
    pub target_row: FrameIndex,
    pub frame_index: FrameIndex,
}

/// How a producer read pass ended.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum PassOutcome {
    /// Every frame has been read and queued.
    Complete,
    /// Stream ended with frames still unprocessed; another pass follows.
    Incomplete { first_missing: FrameIndex },
    /// A seek was requested; the pass restarts at the new target.
    Seeking { target: FrameIndex },
    /// The stream ended without a single new frame being marked.
    Stalled,
    /// The producer aborted on an error.
    Aborted,
}

impl std::fmt::Display for PassOutcome {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Complete => write!(f, "complete"),
            Self::Incomplete { first_missing } => {
                write!(f, "incomplete (frame {first_missing} missing)")
            }
            Self::Seeking { target } => write!(f, "seeking to frame {target}"),
            Self::Stalled => write!(f, "stalled"),
            Self::Aborted => write!(f, "aborted"),
        }
    }
}

/// Lifecycle state of a session.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum SessionStatus {
    Idle,
    Running,
    Completed,
    Failed,
}

impl std::fmt::Display for SessionStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Idle => write!(f, "Idle"),
            Self::Running => write!(f, "Running"),
            Self::Completed => write!(f, "Completed"),
            Self::Failed => write!(f, "Failed"),
        }
    }
}

/// Thread-safe observer of pipeline activity, injected through the session
/// options.
///
/// Implementors can use this to drive progress bars, forward log lines to a
/// host application, or collect diagnostics. All methods have default no-op
/// implementations. Callbacks arrive from the producer and consumer threads.
pub trait PipelineObserver: Send + Sync {
    /// A read pass has started at `start`.
    fn pass_started(&self, _start: FrameIndex) {}

    /// The consumer finished the job for `frame_index`.
    fn frame_completed(&self, _frame_index: FrameIndex) {}

    /// A read pass has ended.
    fn pass_finished(&self, _outcome: PassOutcome) {}

    /// A pipeline log line, mirrored from the `tracing` events.
    fn message(&self, _level: Level, _text: &str) {}
}

/// No-op observer, used when the caller does not supply one.
pub struct NoOpObserver;
impl PipelineObserver for NoOpObserver {}
