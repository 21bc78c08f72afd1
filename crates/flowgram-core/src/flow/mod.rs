pub mod phase;

pub use phase::PhaseFlowEstimator;

use crate::error::Result;
use crate::frame::{Frame, MotionField};

/// Computes the motion field between two temporally adjacent frames.
///
/// [`initialize`] is called once with the source frame size when the session
/// is created; afterwards only the consumer thread calls [`compute`].
///
/// [`initialize`]: FlowEstimator::initialize
/// [`compute`]: FlowEstimator::compute
pub trait FlowEstimator: Send {
    /// Prepare per-size state (plans, buffers, device contexts).
    fn initialize(&mut self, width: usize, height: usize) -> Result<()>;

    /// Displacement of `next` relative to `previous` on the estimator's grid.
    fn compute(&mut self, previous: &Frame, next: &Frame) -> Result<MotionField>;

    fn name(&self) -> &str;
}
