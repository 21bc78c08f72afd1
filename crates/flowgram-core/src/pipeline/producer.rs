use std::sync::Arc;

use tracing::{debug, Level};

use crate::error::{FlowError, Result};
use crate::flow::FlowEstimator;
use crate::frame::{Frame, FrameIndex};
use crate::source::FrameSource;

use super::coordinator::Coordinator;
use super::types::{Job, PassOutcome};

impl<S: FrameSource, E: FlowEstimator> Coordinator<S, E> {
    /// Producer thread body: read passes until every frame is processed.
    pub(super) fn produce(&self, source: &mut S) -> Result<()> {
        loop {
            if self.queue.is_closed() {
                return Ok(());
            }
            let target = self.queue.take_seek().unwrap_or(0);
            let start = self
                .processed
                .first_missing_from(target)
                .or_else(|| self.processed.first_missing_from(0));
            let Some(start) = start else {
                self.observer.pass_finished(PassOutcome::Complete);
                return Ok(());
            };

            match self.read_pass(source, start)? {
                PassOutcome::Complete | PassOutcome::Aborted => return Ok(()),
                PassOutcome::Incomplete { first_missing } => self.note(
                    Level::INFO,
                    format!("End of stream with frame {first_missing} unprocessed, restarting"),
                ),
                PassOutcome::Seeking { target } => {
                    self.note(Level::DEBUG, format!("Restarting read pass at frame {target}"))
                }
                PassOutcome::Stalled => {}
            }
        }
    }

    fn read_pass(&self, source: &mut S, start: FrameIndex) -> Result<PassOutcome> {
        let outcome = match self.read_frames(source, start) {
            Ok(outcome) => outcome,
            Err(e) => {
                self.observer.pass_finished(PassOutcome::Aborted);
                return Err(e);
            }
        };
        self.observer.pass_finished(outcome);
        if outcome == PassOutcome::Stalled {
            return Err(FlowError::Stall {
                position: self.queue.cursor(),
            });
        }
        Ok(outcome)
    }

    /// Read from the frame before `start` until end of stream, a seek request
    /// or a closed queue.
    fn read_frames(&self, source: &mut S, start: FrameIndex) -> Result<PassOutcome> {
        let total = self.frame_count();
        let resume = start.saturating_sub(1);
        let mut cursor = source.seek(resume).map_err(source_fault)?;
        if cursor != resume {
            self.note(
                Level::DEBUG,
                format!("Source resumed at frame {cursor} instead of {resume}"),
            );
        }
        self.queue.set_cursor(cursor);
        let mut newly_marked = 0usize;
        self.observer.pass_started(start);
        debug!(start, cursor, "Read pass started");

        let mut previous: Option<Arc<Frame>> = None;
        loop {
            if self.queue.is_closed() {
                return Ok(PassOutcome::Aborted);
            }
            let Some(frame) = source.next_frame().map_err(source_fault)? else {
                break;
            };
            let index = cursor;
            cursor += 1;
            self.queue.set_cursor(cursor);

            if let Some(target) = self.queue.pending_seek() {
                return Ok(PassOutcome::Seeking { target });
            }
            if index >= total {
                return Err(FlowError::IndexFault { index, total });
            }

            let frame = Arc::new(frame);
            let Some(prev) = previous.replace(Arc::clone(&frame)) else {
                // First frame of a pass only seeds `previous`.
                if index == 0 && self.processed.mark(0) {
                    newly_marked += 1;
                }
                continue;
            };
            if !self.processed.mark(index) {
                continue;
            }
            newly_marked += 1;

            let job = Job {
                previous: prev,
                current: frame,
                target_row: index - 1,
                frame_index: index,
            };
            if !self.queue.push(job) {
                return Ok(PassOutcome::Aborted);
            }
        }

        // Re-reading the seed frame moves the cursor without doing any work.
        if newly_marked == 0 {
            return Ok(PassOutcome::Stalled);
        }
        Ok(match self.processed.first_missing_from(0) {
            None => PassOutcome::Complete,
            Some(first_missing) => PassOutcome::Incomplete { first_missing },
        })
    }
}

/// Any source failure ends the run.
fn source_fault(err: FlowError) -> FlowError {
    if err.is_fatal() {
        err
    } else {
        FlowError::Source(err.to_string())
    }
}
