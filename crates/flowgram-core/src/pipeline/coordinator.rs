use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::mpsc::{self, RecvTimeoutError};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::thread;
use std::time::{Duration, Instant};

use tracing::{debug, error, info, warn, Level};

use crate::error::{FlowError, Result};
use crate::flow::FlowEstimator;
use crate::frame::FrameIndex;
use crate::histogram::AggregateHistogram;
use crate::pooling::AnglePooler;
use crate::source::FrameSource;

use super::config::{CoordinatorOptions, FlowConfig};
use super::progress::{ProcessedSet, ProgressTicker};
use super::queue::{JobQueue, QueueGuard};
use super::types::{NoOpObserver, PipelineObserver};

/// Two-thread pipeline that fills an [`AggregateHistogram`].
///
/// `run()` starts a producer thread that reads frames from the source and
/// queues one job per adjacent pair, and a consumer thread that estimates
/// motion for each job and pools it into the histogram row for the pair.
/// The calling thread stays in `run()` polling completion and firing the
/// progress callback. All accessors take `&self`, so a coordinator shared
/// between threads can be queried, or asked to seek, while it runs.
pub struct Coordinator<S, E> {
    pub(super) source: Mutex<S>,
    pub(super) estimator: Mutex<E>,
    pub(super) histogram: Arc<AggregateHistogram>,
    pub(super) processed: ProcessedSet,
    pub(super) queue: JobQueue,
    pub(super) pooler: AnglePooler,
    pub(super) last_completed: AtomicUsize,
    pub(super) completed_jobs: AtomicUsize,
    pub(super) finished: AtomicBool,
    pub(super) options: CoordinatorOptions,
    pub(super) observer: Arc<dyn PipelineObserver>,
}

impl<S: FrameSource, E: FlowEstimator> Coordinator<S, E> {
    pub fn new(source: S, estimator: E, frame_count: usize, config: &FlowConfig) -> Result<Self> {
        Self::with_options(
            source,
            estimator,
            frame_count,
            config,
            CoordinatorOptions::default(),
            Arc::new(NoOpObserver),
        )
    }

    pub fn with_options(
        source: S,
        estimator: E,
        frame_count: usize,
        config: &FlowConfig,
        options: CoordinatorOptions,
        observer: Arc<dyn PipelineObserver>,
    ) -> Result<Self> {
        config.validate()?;
        Ok(Self {
            source: Mutex::new(source),
            estimator: Mutex::new(estimator),
            histogram: Arc::new(AggregateHistogram::new(frame_count, config.pool_count)),
            processed: ProcessedSet::new(frame_count),
            queue: JobQueue::new(options.high_water_mark),
            pooler: AnglePooler::new(config.pool_count),
            last_completed: AtomicUsize::new(0),
            completed_jobs: AtomicUsize::new(0),
            finished: AtomicBool::new(false),
            options,
            observer,
        })
    }

    /// Process every frame, blocking until both worker threads have exited.
    ///
    /// `on_progress` is called on this thread with each multiple of
    /// `interval_frames` that the last completed frame reaches.
    pub fn run(&self, mut on_progress: impl FnMut(FrameIndex), interval_frames: usize) -> Result<()> {
        let frame_count = self.frame_count();
        let started = Instant::now();
        self.queue.open();
        self.finished.store(false, Ordering::Release);
        info!(
            frames = frame_count,
            pools = self.pooler.pool_count(),
            high_water_mark = self.options.high_water_mark,
            "Starting flow pipeline"
        );

        let poll = Duration::from_millis(self.options.poll_interval_ms.max(1));
        let mut ticker = ProgressTicker::new(interval_frames, frame_count);

        // Each worker holds a sender; the channel disconnects once both are gone.
        let (alive_tx, alive_rx) = mpsc::channel::<()>();

        let (produced, consumed) = thread::scope(|scope| -> Result<_> {
            let producer_alive = alive_tx.clone();
            let producer = thread::Builder::new()
                .name("flowgram-producer".into())
                .spawn_scoped(scope, move || {
                    let _alive = producer_alive;
                    let _guard = QueueGuard::new(&self.queue, JobQueue::finish);
                    let mut source = lock(&self.source);
                    self.produce(&mut *source)
                })?;

            let consumer_alive = alive_tx;
            let consumer = thread::Builder::new()
                .name("flowgram-consumer".into())
                .spawn_scoped(scope, move || {
                    let _alive = consumer_alive;
                    let _guard = QueueGuard::new(&self.queue, JobQueue::close);
                    let mut estimator = lock(&self.estimator);
                    self.consume(&mut *estimator)
                });
            let consumer = match consumer {
                Ok(handle) => handle,
                Err(e) => {
                    self.queue.close();
                    return Err(e.into());
                }
            };

            loop {
                ticker.advance(self.current_frame(), &mut on_progress);
                if let Err(RecvTimeoutError::Disconnected) = alive_rx.recv_timeout(poll) {
                    break;
                }
            }

            let produced = producer
                .join()
                .unwrap_or_else(|_| Err(FlowError::SessionFailed("producer thread panicked".into())));
            let consumed = consumer
                .join()
                .unwrap_or_else(|_| Err(FlowError::SessionFailed("consumer thread panicked".into())));
            Ok((produced, consumed))
        })?;

        let outcome = match (produced, consumed) {
            (_, Err(e)) | (Err(e), Ok(())) => Err(e),
            (Ok(()), Ok(())) => Ok(()),
        };

        match &outcome {
            Ok(()) => {
                self.finished.store(true, Ordering::Release);
                ticker.advance(self.current_frame(), &mut on_progress);
                info!(
                    frames = frame_count,
                    jobs = self.completed_count(),
                    elapsed_ms = started.elapsed().as_millis() as u64,
                    "Flow pipeline complete"
                );
            }
            Err(e) => self.note(Level::ERROR, format!("Flow pipeline failed: {e}")),
        }
        outcome
    }

    /// Ask the producer to restart its read pass at `target`.
    ///
    /// The request is picked up after the frame currently being decoded.
    /// Frames already queued are not read again.
    pub fn request_seek(&self, target: FrameIndex) {
        debug!(target, "Seek requested");
        self.queue.request_seek(target);
    }

    pub fn frame_count(&self) -> usize {
        self.processed.len()
    }

    pub fn histogram(&self) -> &Arc<AggregateHistogram> {
        &self.histogram
    }

    /// Index of the most recently completed frame (0 before any completes).
    pub fn current_frame(&self) -> FrameIndex {
        self.last_completed.load(Ordering::Acquire)
    }

    /// Index of the next frame the producer will read.
    pub fn read_cursor(&self) -> FrameIndex {
        self.queue.cursor()
    }

    pub fn queue_depth(&self) -> usize {
        self.queue.depth()
    }

    /// Whether the producer is currently blocked at the high-water mark.
    pub fn producer_waiting(&self) -> bool {
        self.queue.producer_waiting()
    }

    /// Frames marked processed so far.
    pub fn processed_count(&self) -> usize {
        self.processed.count()
    }

    pub fn is_processed(&self, index: FrameIndex) -> bool {
        self.processed.contains(index)
    }

    /// Jobs the consumer has finished.
    pub fn completed_count(&self) -> usize {
        self.completed_jobs.load(Ordering::Acquire)
    }

    /// Whether the last `run()` completed successfully.
    pub fn is_finished(&self) -> bool {
        self.finished.load(Ordering::Acquire)
    }

    /// Fraction of frames processed, in `[0, 1]`; exactly 1.0 after a
    /// successful run.
    pub fn progress(&self) -> f32 {
        if self.is_finished() {
            return 1.0;
        }
        let total = self.frame_count();
        if total == 0 {
            return 0.0;
        }
        (self.processed_count() as f32 / total as f32).clamp(0.0, 1.0)
    }

    /// Log a pipeline message and forward it to the observer.
    pub(super) fn note(&self, level: Level, text: String) {
        if level == Level::ERROR {
            error!("{text}");
        } else if level == Level::WARN {
            warn!("{text}");
        } else if level == Level::INFO {
            info!("{text}");
        } else {
            debug!("{text}");
        }
        self.observer.message(level, &text);
    }
}

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}
