use std::path::Path;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use ndarray::Array2;
use tracing::{debug, info};

use crate::error::{FlowError, Result};
use crate::flow::{FlowEstimator, PhaseFlowEstimator};
use crate::frame::{FrameIndex, FrameRange, SourceInfo};
use crate::histogram::AggregateHistogram;
use crate::io::image_io::save_image;
use crate::pipeline::{
    Coordinator, CoordinatorOptions, FlowConfig, NoOpObserver, PipelineObserver, SessionStatus,
};
use crate::postprocess::{NormalizeProcessor, PostProcessor};
use crate::render::RangeRenderer;
use crate::source::{FrameSource, SerFrameSource};

/// Tunables and collaborators that are not part of the analysis itself.
#[derive(Clone)]
pub struct SessionOptions {
    pub coordinator: CoordinatorOptions,
    pub observer: Arc<dyn PipelineObserver>,
}

impl Default for SessionOptions {
    fn default() -> Self {
        Self {
            coordinator: CoordinatorOptions::default(),
            observer: Arc::new(NoOpObserver),
        }
    }
}

impl std::fmt::Debug for SessionOptions {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SessionOptions")
            .field("coordinator", &self.coordinator)
            .finish_non_exhaustive()
    }
}

struct SessionState {
    status: SessionStatus,
    last_error: Option<String>,
}

/// One analysis of one video: owns the pipeline, the aggregate histogram and
/// the renderer over it.
///
/// All methods take `&self`. While `run()` blocks one thread, others (or the
/// progress callback) may render, copy data, poll progress or request a seek.
/// Dropping the session releases everything; the borrow checker ensures that
/// cannot happen while `run()` is still executing.
pub struct FlowSession<S = SerFrameSource, E = PhaseFlowEstimator> {
    info: SourceInfo,
    config: FlowConfig,
    renderer: RangeRenderer,
    coordinator: Coordinator<S, E>,
    state: Mutex<SessionState>,
}

impl FlowSession {
    /// Open a SER video with the built-in phase-correlation estimator.
    pub fn open(path: &Path, config: FlowConfig) -> Result<Self> {
        Self::open_with(path, config, SessionOptions::default())
    }

    pub fn open_with(path: &Path, config: FlowConfig, options: SessionOptions) -> Result<Self> {
        let source = SerFrameSource::open(path).map_err(|e| {
            FlowError::Initialization(format!("cannot open {}: {e}", path.display()))
        })?;
        Self::create(source, PhaseFlowEstimator::default(), config, options)
    }
}

impl<S: FrameSource, E: FlowEstimator> FlowSession<S, E> {
    /// Build a session from explicit collaborators.
    ///
    /// Validates the config and initializes the estimator for the source's
    /// frame size; either failing is an initialization error.
    pub fn create(source: S, mut estimator: E, config: FlowConfig, options: SessionOptions) -> Result<Self> {
        config.validate()?;
        let info = source.info().clone();
        if info.width == 0 || info.height == 0 {
            return Err(FlowError::InvalidDimensions {
                width: info.width,
                height: info.height,
            });
        }
        estimator
            .initialize(info.width as usize, info.height as usize)
            .map_err(|e| match e {
                FlowError::Initialization(_) => e,
                other => FlowError::Initialization(other.to_string()),
            })?;

        info!(
            path = %info.path.display(),
            frames = info.frame_count,
            width = info.width,
            height = info.height,
            estimator = estimator.name(),
            pools = config.pool_count,
            "Created flow session"
        );

        let renderer = RangeRenderer::new(&config, info.frame_area());
        let coordinator = Coordinator::with_options(
            source,
            estimator,
            info.frame_count,
            &config,
            options.coordinator,
            options.observer,
        )?;
        Ok(Self {
            info,
            config,
            renderer,
            coordinator,
            state: Mutex::new(SessionState {
                status: SessionStatus::Idle,
                last_error: None,
            }),
        })
    }

    fn state(&self) -> MutexGuard<'_, SessionState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Record a failed call's error; fatal errors also fail the session.
    fn record<T>(&self, result: Result<T>) -> Result<T> {
        if let Err(e) = &result {
            let mut state = self.state();
            state.last_error = Some(e.to_string());
            if e.is_fatal() {
                state.status = SessionStatus::Failed;
            }
        }
        result
    }

    /// Process the whole video, blocking until done.
    ///
    /// `callback(self, frame)` runs on this thread each time the last
    /// completed frame crosses a multiple of `interval_frames`.
    pub fn run(&self, mut callback: impl FnMut(&Self, FrameIndex), interval_frames: usize) -> Result<()> {
        {
            let mut state = self.state();
            match state.status {
                SessionStatus::Running => return Err(FlowError::AlreadyRunning),
                SessionStatus::Failed => {
                    let reason = state.last_error.clone().unwrap_or_default();
                    return Err(FlowError::SessionFailed(reason));
                }
                SessionStatus::Completed => {
                    debug!("Session already complete, nothing to run");
                    return Ok(());
                }
                SessionStatus::Idle => state.status = SessionStatus::Running,
            }
        }

        let result = self
            .coordinator
            .run(|frame| callback(self, frame), interval_frames);

        let mut state = self.state();
        match &result {
            Ok(()) => state.status = SessionStatus::Completed,
            Err(e) => {
                state.status = SessionStatus::Failed;
                state.last_error = Some(e.to_string());
            }
        }
        result
    }

    pub fn status(&self) -> SessionStatus {
        self.state().status
    }

    /// Display string of the most recent error from any session call.
    pub fn last_error(&self) -> Option<String> {
        self.state().last_error.clone()
    }

    pub fn info(&self) -> &SourceInfo {
        &self.info
    }

    pub fn config(&self) -> &FlowConfig {
        &self.config
    }

    /// Number of frames, which is also the number of histogram rows.
    pub fn length(&self) -> usize {
        self.info.frame_count
    }

    pub fn length_ms(&self) -> u64 {
        self.info.duration_ms
    }

    pub fn progress(&self) -> f32 {
        self.coordinator.progress()
    }

    pub fn current_frame(&self) -> FrameIndex {
        self.coordinator.current_frame()
    }

    pub fn read_cursor(&self) -> FrameIndex {
        self.coordinator.read_cursor()
    }

    pub fn request_seek(&self, target: FrameIndex) {
        self.coordinator.request_seek(target);
    }

    pub fn histogram(&self) -> &Arc<AggregateHistogram> {
        self.coordinator.histogram()
    }

    pub fn coordinator(&self) -> &Coordinator<S, E> {
        &self.coordinator
    }

    /// Render frames `[from, to)`: `sink(buffer, width, height)` receives one
    /// column per frame and one row per pool.
    pub fn draw_range<R>(
        &self,
        from: FrameIndex,
        to: FrameIndex,
        sink: impl FnOnce(&[f32], usize, usize) -> R,
    ) -> Result<R> {
        self.record(
            self.renderer
                .draw_range(self.histogram(), FrameRange::new(from, to), sink),
        )
    }

    /// Focus-band waveform of frames `[from, to)`, one value per frame.
    pub fn calc_wave<R>(
        &self,
        from: FrameIndex,
        to: FrameIndex,
        sink: impl FnOnce(&[f32]) -> R,
    ) -> Result<R> {
        self.record(
            self.renderer
                .calc_wave(self.histogram(), FrameRange::new(from, to), sink),
        )
    }

    /// Raw counts of rows `[from, to)`, shape `(frames, pools)`.
    pub fn get_data(&self, from: FrameIndex, to: FrameIndex) -> Result<Array2<u32>> {
        self.record(self.histogram().snapshot(FrameRange::new(from, to)))
    }

    /// Consecutive ranges of at most `block_frames` covering every frame.
    pub fn block_ranges(&self, block_frames: usize) -> Vec<FrameRange> {
        let total = self.length();
        let step = block_frames.max(1);
        (0..total)
            .step_by(step)
            .map(|from| FrameRange::new(from, (from + step).min(total)))
            .collect()
    }

    /// Save the aggregate with the default clip-and-stretch transform.
    pub fn save(&self, path: &Path) -> Result<()> {
        let processor = NormalizeProcessor::new(self.config.max_value, self.info.frame_area());
        self.save_with(path, &processor)
    }

    /// Save the aggregate after passing a copy of it through `processor`.
    pub fn save_with(&self, path: &Path, processor: &dyn PostProcessor) -> Result<()> {
        let result = self.save_processed(path, processor);
        if result.is_ok() {
            info!(path = %path.display(), processor = processor.name(), "Saved flowgram");
        }
        self.record(result)
    }

    fn save_processed(&self, path: &Path, processor: &dyn PostProcessor) -> Result<()> {
        let counts = self.histogram().to_array();
        let image = processor.process(&counts)?;
        save_image(&image, path)
    }
}
