use std::path::Path;

use tracing::debug;

use crate::error::Result;
use crate::frame::{Frame, FrameIndex, SourceInfo};
use crate::io::ser::SerReader;

/// Sequential supplier of decoded frames.
///
/// The producer thread owns the source for the whole run, so implementations
/// only need to be `Send`.
pub trait FrameSource: Send {
    /// Stream properties captured when the source was opened.
    fn info(&self) -> &SourceInfo;

    /// Decode the next frame, or `None` at end of stream.
    fn next_frame(&mut self) -> Result<Option<Frame>>;

    /// Index of the frame the next `next_frame` call will yield.
    fn position(&self) -> FrameIndex;

    /// Best-effort reposition so that the next frame is `target`.
    ///
    /// Returns the index of the frame that will actually come next, which may
    /// differ from `target` if the source cannot seek there. The default
    /// implementation refuses and stays put.
    fn seek(&mut self, _target: FrameIndex) -> Result<FrameIndex> {
        Ok(self.position())
    }
}

/// Frame source backed by a memory-mapped SER video. Seeking is exact.
pub struct SerFrameSource {
    reader: SerReader,
    info: SourceInfo,
    cursor: FrameIndex,
}

impl SerFrameSource {
    pub fn open(path: &Path) -> Result<Self> {
        let reader = SerReader::open(path)?;
        let info = reader.source_info(path);
        debug!(
            path = %path.display(),
            frames = info.frame_count,
            width = info.width,
            height = info.height,
            "Opened SER source"
        );
        Ok(Self {
            reader,
            info,
            cursor: 0,
        })
    }

    pub fn reader(&self) -> &SerReader {
        &self.reader
    }
}

impl FrameSource for SerFrameSource {
    fn info(&self) -> &SourceInfo {
        &self.info
    }

    fn next_frame(&mut self) -> Result<Option<Frame>> {
        if self.cursor >= self.reader.frame_count() {
            return Ok(None);
        }
        let frame = self.reader.read_frame(self.cursor)?;
        self.cursor += 1;
        Ok(Some(frame))
    }

    fn position(&self) -> FrameIndex {
        self.cursor
    }

    fn seek(&mut self, target: FrameIndex) -> Result<FrameIndex> {
        self.cursor = target.min(self.reader.frame_count());
        Ok(self.cursor)
    }
}
