use std::fs::File;
use std::path::{Path, PathBuf};

use byteorder::{LittleEndian, ReadBytesExt};
use memmap2::Mmap;
use ndarray::Array2;

use crate::consts::{LUMINANCE_B, LUMINANCE_G, LUMINANCE_R, SER_TICKS_PER_MS};
use crate::error::{FlowError, Result};
use crate::frame::{Frame, FrameIndex, FrameMetadata, SourceInfo};

pub const SER_HEADER_SIZE: usize = 178;
const SER_MAGIC: &[u8; 14] = b"LUCAM-RECORDER";

/// SER color ids carrying three interleaved planes per pixel.
const SER_COLOR_RGB: i32 = 100;
const SER_COLOR_BGR: i32 = 101;

/// SER file header (178 bytes).
#[derive(Clone, Debug)]
pub struct SerHeader {
    pub color_id: i32,
    pub little_endian: bool,
    pub width: u32,
    pub height: u32,
    pub pixel_depth: u32,
    pub frame_count: u32,
}

impl SerHeader {
    /// Bytes per sample (1 for 8-bit, 2 for 9-16 bit).
    pub fn bytes_per_sample(&self) -> usize {
        if self.pixel_depth <= 8 {
            1
        } else {
            2
        }
    }

    /// Planes per pixel (1 for mono/bayer, 3 for RGB/BGR).
    pub fn planes_per_pixel(&self) -> usize {
        match self.color_id {
            SER_COLOR_RGB | SER_COLOR_BGR => 3,
            _ => 1,
        }
    }

    pub fn frame_byte_size(&self) -> usize {
        self.width as usize
            * self.height as usize
            * self.bytes_per_sample()
            * self.planes_per_pixel()
    }
}

/// Memory-mapped SER video file with random frame access.
pub struct SerReader {
    mmap: Mmap,
    pub header: SerHeader,
}

impl SerReader {
    pub fn open(path: &Path) -> Result<Self> {
        let file = File::open(path)?;
        // The mapping is read-only and the file is not expected to change
        // while a session holds it.
        let mmap = unsafe { Mmap::map(&file)? };

        if mmap.len() < SER_HEADER_SIZE {
            return Err(FlowError::InvalidSer("file too small for SER header".into()));
        }
        if &mmap[0..14] != SER_MAGIC {
            return Err(FlowError::InvalidSer("missing LUCAM-RECORDER magic".into()));
        }

        let header = parse_header(&mmap[..SER_HEADER_SIZE])?;
        let expected = SER_HEADER_SIZE + header.frame_byte_size() * header.frame_count as usize;
        if mmap.len() < expected {
            return Err(FlowError::InvalidSer(format!(
                "file truncated: expected at least {expected} bytes, got {}",
                mmap.len()
            )));
        }

        Ok(Self { mmap, header })
    }

    pub fn frame_count(&self) -> usize {
        self.header.frame_count as usize
    }

    fn frame_raw(&self, index: FrameIndex) -> Result<&[u8]> {
        let total = self.frame_count();
        if index >= total {
            return Err(FlowError::IndexFault { index, total });
        }
        let size = self.header.frame_byte_size();
        let offset = SER_HEADER_SIZE + index * size;
        Ok(&self.mmap[offset..offset + size])
    }

    /// Decode one frame to grayscale f32 in [0.0, 1.0].
    pub fn read_frame(&self, index: FrameIndex) -> Result<Frame> {
        let raw = self.frame_raw(index)?;
        let h = self.header.height as usize;
        let w = self.header.width as usize;
        let data = match self.header.color_id {
            SER_COLOR_RGB => decode_luminance(raw, h, w, &self.header, [0, 1, 2]),
            SER_COLOR_BGR => decode_luminance(raw, h, w, &self.header, [2, 1, 0]),
            // Mono and raw Bayer mosaics are treated as intensity.
            _ => decode_plane(raw, h, w, &self.header),
        };

        let mut frame = Frame::new(data, self.header.bytes_per_sample() as u8 * 8);
        frame.metadata = FrameMetadata {
            frame_index: index,
            timestamp_us: self.timestamp_ticks(index).map(|t| t / 10),
        };
        Ok(frame)
    }

    /// Per-frame timestamp (100 ns ticks) from the optional trailer.
    fn timestamp_ticks(&self, index: FrameIndex) -> Option<u64> {
        let trailer = SER_HEADER_SIZE + self.header.frame_byte_size() * self.frame_count();
        let offset = trailer + index * 8;
        let bytes = self.mmap.get(offset..offset + 8)?;
        Some(u64::from_le_bytes(bytes.try_into().ok()?))
    }

    /// Span between the first and last trailer timestamps, 0 without a trailer.
    pub fn duration_ms(&self) -> u64 {
        let count = self.frame_count();
        if count < 2 {
            return 0;
        }
        match (self.timestamp_ticks(0), self.timestamp_ticks(count - 1)) {
            (Some(first), Some(last)) => last.saturating_sub(first) / SER_TICKS_PER_MS,
            _ => 0,
        }
    }

    pub fn source_info(&self, path: &Path) -> SourceInfo {
        SourceInfo {
            path: PathBuf::from(path),
            width: self.header.width,
            height: self.header.height,
            frame_count: self.frame_count(),
            duration_ms: self.duration_ms(),
        }
    }
}

fn parse_header(buf: &[u8]) -> Result<SerHeader> {
    let mut cursor = std::io::Cursor::new(&buf[14..]);

    let _lu_id = cursor.read_i32::<LittleEndian>()?;
    let color_id = cursor.read_i32::<LittleEndian>()?;
    let le_flag = cursor.read_i32::<LittleEndian>()?;
    let width = cursor.read_i32::<LittleEndian>()?;
    let height = cursor.read_i32::<LittleEndian>()?;
    let pixel_depth = cursor.read_i32::<LittleEndian>()?;
    let frame_count = cursor.read_i32::<LittleEndian>()?;

    if width <= 0 || height <= 0 {
        return Err(FlowError::InvalidDimensions {
            width: width.max(0) as u32,
            height: height.max(0) as u32,
        });
    }
    if !(1..=16).contains(&pixel_depth) {
        return Err(FlowError::InvalidSer(format!(
            "unsupported pixel depth {pixel_depth}"
        )));
    }
    if frame_count < 0 {
        return Err(FlowError::InvalidSer(format!("negative frame count {frame_count}")));
    }

    // Most capture tools write 0 for little-endian data despite the format
    // description; only an explicit 1 means big-endian.
    Ok(SerHeader {
        color_id,
        little_endian: le_flag != 1,
        width: width as u32,
        height: height as u32,
        pixel_depth: pixel_depth as u32,
        frame_count: frame_count as u32,
    })
}

fn read_sample(raw: &[u8], idx: usize, header: &SerHeader) -> f32 {
    if header.bytes_per_sample() == 1 {
        raw[idx] as f32
    } else {
        let pair = [raw[idx], raw[idx + 1]];
        if header.little_endian {
            u16::from_le_bytes(pair) as f32
        } else {
            u16::from_be_bytes(pair) as f32
        }
    }
}

fn max_sample(header: &SerHeader) -> f32 {
    ((1u32 << header.pixel_depth) - 1) as f32
}

fn decode_plane(raw: &[u8], height: usize, width: usize, header: &SerHeader) -> Array2<f32> {
    let bps = header.bytes_per_sample();
    let max_val = max_sample(header);
    Array2::from_shape_fn((height, width), |(row, col)| {
        read_sample(raw, (row * width + col) * bps, header) / max_val
    })
}

/// Decode interleaved color to BT.601 luminance. `order` maps R, G, B to
/// their plane positions within a pixel.
fn decode_luminance(
    raw: &[u8],
    height: usize,
    width: usize,
    header: &SerHeader,
    order: [usize; 3],
) -> Array2<f32> {
    let bps = header.bytes_per_sample();
    let max_val = max_sample(header);
    Array2::from_shape_fn((height, width), |(row, col)| {
        let pixel = (row * width + col) * 3 * bps;
        let r = read_sample(raw, pixel + order[0] * bps, header);
        let g = read_sample(raw, pixel + order[1] * bps, header);
        let b = read_sample(raw, pixel + order[2] * bps, header);
        (LUMINANCE_R * r + LUMINANCE_G * g + LUMINANCE_B * b) / max_val
    })
}
