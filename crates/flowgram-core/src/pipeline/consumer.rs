use std::sync::atomic::Ordering;

use tracing::trace;

use crate::error::{FlowError, Result};
use crate::flow::FlowEstimator;
use crate::source::FrameSource;

use super::coordinator::Coordinator;

impl<S: FrameSource, E: FlowEstimator> Coordinator<S, E> {
    /// Consumer thread body: estimate and pool jobs in FIFO order until the
    /// producer has finished and the queue is drained.
    pub(super) fn consume(&self, estimator: &mut E) -> Result<()> {
        while let Some(job) = self.queue.pop() {
            let field = estimator
                .compute(&job.previous, &job.current)
                .map_err(estimator_fault)?;
            self.pooler
                .pool_into(&field, &self.histogram, job.target_row)?;

            self.last_completed.store(job.frame_index, Ordering::Release);
            self.completed_jobs.fetch_add(1, Ordering::AcqRel);
            self.observer.frame_completed(job.frame_index);
            trace!(frame = job.frame_index, row = job.target_row, "Frame pooled");
        }
        Ok(())
    }
}

/// Any estimator failure ends the run.
fn estimator_fault(err: FlowError) -> FlowError {
    if err.is_fatal() {
        err
    } else {
        FlowError::Estimator(err.to_string())
    }
}
