#![allow(dead_code)]

use std::path::PathBuf;
use std::sync::mpsc;
use std::sync::{Arc, Mutex};

use ndarray::Array2;
use tracing::Level;

use flowgram_core::error::{FlowError, Result};
use flowgram_core::flow::FlowEstimator;
use flowgram_core::frame::{Frame, FrameIndex, MotionField, SourceInfo};
use flowgram_core::io::ser::SER_HEADER_SIZE;
use flowgram_core::pipeline::{PassOutcome, PipelineObserver};
use flowgram_core::source::FrameSource;

// ---------------------------------------------------------------------------
// SER fixtures
// ---------------------------------------------------------------------------

/// Build a SER file header with configurable bit depth and color mode.
///
/// `color_id`: 0=MONO, 8..=11 Bayer, 100=RGB, 101=BGR
pub fn build_ser_header_full(
    width: u32,
    height: u32,
    bit_depth: u32,
    num_frames: usize,
    color_id: i32,
) -> Vec<u8> {
    let mut buf = Vec::with_capacity(SER_HEADER_SIZE);

    // Magic (14 bytes)
    buf.extend_from_slice(b"LUCAM-RECORDER");
    // LuID (4 bytes)
    buf.extend_from_slice(&0i32.to_le_bytes());
    // ColorID (4 bytes)
    buf.extend_from_slice(&color_id.to_le_bytes());
    // LittleEndian = 0 (little-endian per Siril convention)
    buf.extend_from_slice(&0i32.to_le_bytes());
    buf.extend_from_slice(&(width as i32).to_le_bytes());
    buf.extend_from_slice(&(height as i32).to_le_bytes());
    buf.extend_from_slice(&(bit_depth as i32).to_le_bytes());
    buf.extend_from_slice(&(num_frames as i32).to_le_bytes());
    // Observer, Instrument, Telescope (3 x 40 bytes)
    buf.extend_from_slice(&[0u8; 120]);
    // DateTime, DateTimeUTC (2 x 8 bytes)
    buf.extend_from_slice(&[0u8; 16]);

    assert_eq!(buf.len(), SER_HEADER_SIZE);
    buf
}

/// Build a complete mono 8-bit SER file with the given frame data.
pub fn build_ser_with_frames(width: u32, height: u32, frames: &[Vec<u8>]) -> Vec<u8> {
    let mut buf = build_ser_header_full(width, height, 8, frames.len(), 0);
    for frame in frames {
        buf.extend_from_slice(frame);
    }
    buf
}

/// Append a timestamp trailer (100 ns ticks, one per frame).
pub fn append_timestamps(buf: &mut Vec<u8>, ticks: &[u64]) {
    for t in ticks {
        buf.extend_from_slice(&t.to_le_bytes());
    }
}

/// Write a SER buffer to a temporary file and return the temp file handle.
///
/// The file stays alive as long as the returned `NamedTempFile` is not dropped.
pub fn write_test_ser(data: &[u8]) -> tempfile::NamedTempFile {
    use std::io::Write;
    let mut f = tempfile::NamedTempFile::new().expect("create temp file");
    f.write_all(data).expect("write SER data");
    f.flush().expect("flush");
    f
}

// ---------------------------------------------------------------------------
// Synthetic images
// ---------------------------------------------------------------------------

/// Deterministic pseudo-random 8-bit noise (LCG), row-major `(height, width)`.
pub fn noise_u8(width: usize, height: usize, seed: u64) -> Array2<u8> {
    let mut state = seed.wrapping_mul(6364136223846793005).wrapping_add(1);
    Array2::from_shape_fn((height, width), |_| {
        state = state
            .wrapping_mul(6364136223846793005)
            .wrapping_add(1442695040888963407);
        (state >> 56) as u8
    })
}

/// Window `(width, height)` of `base` whose top-left corner is `(x, y)`.
pub fn crop_u8(base: &Array2<u8>, x: usize, y: usize, width: usize, height: usize) -> Array2<u8> {
    base.slice(ndarray::s![y..y + height, x..x + width]).to_owned()
}

pub fn to_frame(pixels: &Array2<u8>) -> Frame {
    Frame::new(pixels.mapv(|v| v as f32 / 255.0), 8)
}

/// A flat frame tagged with its stream index.
pub fn indexed_frame(width: usize, height: usize, index: FrameIndex) -> Frame {
    let mut frame = Frame::new(Array2::zeros((height, width)), 8);
    frame.metadata.frame_index = index;
    frame
}

pub fn test_info(width: u32, height: u32, frame_count: usize) -> SourceInfo {
    SourceInfo {
        path: PathBuf::from("memory"),
        width,
        height,
        frame_count,
        duration_ms: frame_count as u64 * 40,
    }
}

// ---------------------------------------------------------------------------
// Scripted frame sources
// ---------------------------------------------------------------------------

/// In-memory source yielding `frames` in order.
pub struct ScriptedSource {
    info: SourceInfo,
    frames: Vec<Frame>,
    cursor: usize,
    seekable: bool,
    /// End the stream early at this index, once.
    truncate_once: Option<usize>,
    fail_at: Option<usize>,
}

impl ScriptedSource {
    /// `count` flat 16x16 frames, seekable.
    pub fn new(count: usize) -> Self {
        Self::with_frames(test_info(16, 16, count), (0..count).map(|i| indexed_frame(16, 16, i)).collect())
    }

    pub fn with_frames(info: SourceInfo, frames: Vec<Frame>) -> Self {
        Self {
            info,
            frames,
            cursor: 0,
            seekable: true,
            truncate_once: None,
            fail_at: None,
        }
    }

    pub fn not_seekable(mut self) -> Self {
        self.seekable = false;
        self
    }

    pub fn truncated_once_at(mut self, index: usize) -> Self {
        self.truncate_once = Some(index);
        self
    }

    pub fn failing_at(mut self, index: usize) -> Self {
        self.fail_at = Some(index);
        self
    }

    /// Claim a different frame count than the frames actually available.
    pub fn claiming(mut self, frame_count: usize) -> Self {
        self.info.frame_count = frame_count;
        self
    }
}

impl FrameSource for ScriptedSource {
    fn info(&self) -> &SourceInfo {
        &self.info
    }

    fn next_frame(&mut self) -> Result<Option<Frame>> {
        if self.truncate_once == Some(self.cursor) {
            self.truncate_once = None;
            return Ok(None);
        }
        if self.fail_at == Some(self.cursor) {
            return Err(FlowError::Io(std::io::Error::other("scripted read failure")));
        }
        let frame = self.frames.get(self.cursor).cloned();
        if frame.is_some() {
            self.cursor += 1;
        }
        Ok(frame)
    }

    fn position(&self) -> FrameIndex {
        self.cursor
    }

    fn seek(&mut self, target: FrameIndex) -> Result<FrameIndex> {
        if self.seekable {
            self.cursor = target.min(self.frames.len());
        }
        Ok(self.cursor)
    }
}

/// Source that claims frames but never yields any.
pub struct EmptySource {
    info: SourceInfo,
}

impl EmptySource {
    pub fn new(frame_count: usize) -> Self {
        Self {
            info: test_info(16, 16, frame_count),
        }
    }
}

impl FrameSource for EmptySource {
    fn info(&self) -> &SourceInfo {
        &self.info
    }

    fn next_frame(&mut self) -> Result<Option<Frame>> {
        Ok(None)
    }

    fn position(&self) -> FrameIndex {
        0
    }
}

// ---------------------------------------------------------------------------
// Scripted flow estimators
// ---------------------------------------------------------------------------

/// Reports the same displacement in every grid cell and records the
/// `(previous, current)` frame indices of each call.
pub struct ConstantFlow {
    pub dx: f32,
    pub dy: f32,
    pub grid: (usize, usize),
    pub calls: Arc<Mutex<Vec<(FrameIndex, FrameIndex)>>>,
    /// Block until the test sends (or drops the sender) before each call.
    gate: Option<mpsc::Receiver<()>>,
    fail_on_call: Option<usize>,
}

impl ConstantFlow {
    pub fn new(dx: f32, dy: f32) -> Self {
        Self {
            dx,
            dy,
            grid: (2, 2),
            calls: Arc::new(Mutex::new(Vec::new())),
            gate: None,
            fail_on_call: None,
        }
    }

    pub fn gated(mut self) -> (Self, mpsc::Sender<()>) {
        let (tx, rx) = mpsc::channel();
        self.gate = Some(rx);
        (self, tx)
    }

    pub fn failing_on_call(mut self, call: usize) -> Self {
        self.fail_on_call = Some(call);
        self
    }

    pub fn cells(&self) -> u32 {
        (self.grid.0 * self.grid.1) as u32
    }
}

impl FlowEstimator for ConstantFlow {
    fn initialize(&mut self, _width: usize, _height: usize) -> Result<()> {
        Ok(())
    }

    fn compute(&mut self, previous: &Frame, next: &Frame) -> Result<MotionField> {
        if let Some(ref gate) = self.gate {
            // A dropped sender opens the gate for good.
            let _ = gate.recv();
        }
        let mut calls = self.calls.lock().unwrap();
        calls.push((previous.metadata.frame_index, next.metadata.frame_index));
        if self.fail_on_call == Some(calls.len()) {
            return Err(FlowError::Estimator("scripted estimator failure".into()));
        }
        let (rows, cols) = self.grid;
        MotionField::from_components(
            Array2::from_elem((rows, cols), self.dx),
            Array2::from_elem((rows, cols), self.dy),
        )
    }

    fn name(&self) -> &str {
        "constant"
    }
}

// ---------------------------------------------------------------------------
// Observer
// ---------------------------------------------------------------------------

#[derive(Default)]
pub struct RecordingObserver {
    pub passes: Mutex<Vec<FrameIndex>>,
    pub outcomes: Mutex<Vec<PassOutcome>>,
    pub completed: Mutex<Vec<FrameIndex>>,
    pub messages: Mutex<Vec<(Level, String)>>,
}

impl PipelineObserver for RecordingObserver {
    fn pass_started(&self, start: FrameIndex) {
        self.passes.lock().unwrap().push(start);
    }

    fn frame_completed(&self, frame_index: FrameIndex) {
        self.completed.lock().unwrap().push(frame_index);
    }

    fn pass_finished(&self, outcome: PassOutcome) {
        self.outcomes.lock().unwrap().push(outcome);
    }

    fn message(&self, level: Level, text: &str) {
        self.messages.lock().unwrap().push((level, text.to_string()));
    }
}
