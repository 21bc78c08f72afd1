use std::collections::VecDeque;
use std::sync::{Condvar, Mutex, MutexGuard, PoisonError};

use crate::frame::FrameIndex;

use super::types::Job;

/// Bounded FIFO between the producer and the consumer.
///
/// Every piece of shared scheduling state (the jobs, the run flags, the
/// producer's read cursor and a pending seek) lives behind one mutex. Two
/// condition variables replace polling: `job_ready` wakes the consumer,
/// `space_ready` wakes a producer blocked at the high-water mark.
pub(crate) struct JobQueue {
    state: Mutex<QueueState>,
    job_ready: Condvar,
    space_ready: Condvar,
    high_water_mark: usize,
}

#[derive(Default)]
struct QueueState {
    jobs: VecDeque<Job>,
    /// Producer still active. Once cleared the consumer drains and exits.
    running: bool,
    /// No consumer left; queued jobs are dropped and `push` refuses.
    closed: bool,
    producer_waiting: bool,
    frame_cursor: FrameIndex,
    pending_seek: Option<FrameIndex>,
}

impl JobQueue {
    pub fn new(high_water_mark: usize) -> Self {
        Self {
            state: Mutex::new(QueueState::default()),
            job_ready: Condvar::new(),
            space_ready: Condvar::new(),
            high_water_mark: high_water_mark.max(1),
        }
    }

    fn lock(&self) -> MutexGuard<'_, QueueState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Reset the run flags before the threads of a new run start.
    pub fn open(&self) {
        let mut state = self.lock();
        state.jobs.clear();
        state.running = true;
        state.closed = false;
        state.producer_waiting = false;
    }

    /// Enqueue a job, blocking while the queue is at the high-water mark.
    ///
    /// Returns `false` (dropping the job) once the consumer side is closed.
    pub fn push(&self, job: Job) -> bool {
        let mut state = self.lock();
        while state.jobs.len() >= self.high_water_mark && !state.closed {
            state.producer_waiting = true;
            state = self
                .space_ready
                .wait(state)
                .unwrap_or_else(PoisonError::into_inner);
        }
        state.producer_waiting = false;
        if state.closed {
            return false;
        }
        state.jobs.push_back(job);
        drop(state);
        self.job_ready.notify_one();
        true
    }

    /// Take the oldest job, waiting for one to arrive.
    ///
    /// Returns `None` once the producer has finished and the queue is
    /// drained, or once the queue has been closed.
    pub fn pop(&self) -> Option<Job> {
        let mut state = self.lock();
        loop {
            if state.closed {
                return None;
            }
            if let Some(job) = state.jobs.pop_front() {
                drop(state);
                self.space_ready.notify_one();
                return Some(job);
            }
            if !state.running {
                return None;
            }
            state = self
                .job_ready
                .wait(state)
                .unwrap_or_else(PoisonError::into_inner);
        }
    }

    /// Producer is done; the consumer finishes what is queued and stops.
    pub fn finish(&self) {
        self.lock().running = false;
        self.job_ready.notify_all();
    }

    /// Consumer is gone; drop queued jobs and release a blocked producer.
    pub fn close(&self) {
        let mut state = self.lock();
        state.closed = true;
        state.jobs.clear();
        drop(state);
        self.space_ready.notify_all();
        self.job_ready.notify_all();
    }

    pub fn is_closed(&self) -> bool {
        self.lock().closed
    }

    pub fn depth(&self) -> usize {
        self.lock().jobs.len()
    }

    pub fn producer_waiting(&self) -> bool {
        self.lock().producer_waiting
    }

    pub fn cursor(&self) -> FrameIndex {
        self.lock().frame_cursor
    }

    pub fn set_cursor(&self, cursor: FrameIndex) {
        self.lock().frame_cursor = cursor;
    }

    pub fn request_seek(&self, target: FrameIndex) {
        self.lock().pending_seek = Some(target);
    }

    pub fn pending_seek(&self) -> Option<FrameIndex> {
        self.lock().pending_seek
    }

    pub fn take_seek(&self) -> Option<FrameIndex> {
        self.lock().pending_seek.take()
    }
}

/// Runs a queue transition when dropped, so a thread that panics still
/// releases its peer.
pub(crate) struct QueueGuard<'a> {
    queue: &'a JobQueue,
    on_exit: fn(&JobQueue),
}

impl<'a> QueueGuard<'a> {
    pub fn new(queue: &'a JobQueue, on_exit: fn(&JobQueue)) -> Self {
        Self { queue, on_exit }
    }
}

impl Drop for QueueGuard<'_> {
    fn drop(&mut self) {
        (self.on_exit)(self.queue);
    }
}
