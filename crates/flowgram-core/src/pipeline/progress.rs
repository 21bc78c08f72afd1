use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};

use crate::frame::FrameIndex;

/// One flag per frame: has its job been queued (or, for frame 0, has it
/// been read)?
///
/// Only the producer sets flags; other threads read them for progress.
pub(crate) struct ProcessedSet {
    flags: Box<[AtomicBool]>,
    count: AtomicUsize,
}

impl ProcessedSet {
    pub fn new(len: usize) -> Self {
        Self {
            flags: (0..len).map(|_| AtomicBool::new(false)).collect(),
            count: AtomicUsize::new(0),
        }
    }

    pub fn len(&self) -> usize {
        self.flags.len()
    }

    /// Set the flag for `index`. Returns `true` if it was previously clear.
    pub fn mark(&self, index: FrameIndex) -> bool {
        let Some(flag) = self.flags.get(index) else {
            return false;
        };
        let newly = !flag.swap(true, Ordering::AcqRel);
        if newly {
            self.count.fetch_add(1, Ordering::AcqRel);
        }
        newly
    }

    pub fn contains(&self, index: FrameIndex) -> bool {
        self.flags
            .get(index)
            .is_some_and(|f| f.load(Ordering::Acquire))
    }

    pub fn count(&self) -> usize {
        self.count.load(Ordering::Acquire)
    }

    /// First clear flag at or after `from`.
    pub fn first_missing_from(&self, from: FrameIndex) -> Option<FrameIndex> {
        (from..self.len()).find(|&i| !self.contains(i))
    }
}

/// Turns the completed-frame counter into progress callbacks at fixed frame
/// boundaries.
///
/// Boundary `b` (a positive multiple of the interval) fires once the last
/// completed frame reaches it, as long as `b` is below the frame count.
/// Boundaries fire in increasing order and never twice; a jump over several
/// boundaries reports each of them. An interval of zero disables callbacks.
#[derive(Clone, Debug)]
pub struct ProgressTicker {
    interval: usize,
    frame_count: usize,
    next_boundary: FrameIndex,
}

impl ProgressTicker {
    pub fn new(interval: usize, frame_count: usize) -> Self {
        Self {
            interval,
            frame_count,
            next_boundary: interval,
        }
    }

    /// Report every boundary crossed up to `last_completed`.
    pub fn advance(&mut self, last_completed: FrameIndex, mut report: impl FnMut(FrameIndex)) {
        if self.interval == 0 {
            return;
        }
        while self.next_boundary <= last_completed && self.next_boundary < self.frame_count {
            report(self.next_boundary);
            self.next_boundary += self.interval;
        }
    }

    /// Next boundary that has not fired yet.
    pub fn next_boundary(&self) -> FrameIndex {
        self.next_boundary
    }
}
