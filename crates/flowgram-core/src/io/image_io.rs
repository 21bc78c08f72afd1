use std::path::Path;

use image::{GrayImage, ImageBuffer, ImageFormat, Luma};
use ndarray::Array2;

use crate::error::{FlowError, Result};

fn dims(height: usize, width: usize) -> Result<(u32, u32)> {
    match (u32::try_from(width), u32::try_from(height)) {
        (Ok(w), Ok(h)) if w > 0 && h > 0 => Ok((w, h)),
        _ => Err(FlowError::InvalidDimensions {
            width: width.min(u32::MAX as usize) as u32,
            height: height.min(u32::MAX as usize) as u32,
        }),
    }
}

/// Save an 8-bit grayscale image, one array row per image row.
pub fn save_gray(data: &Array2<u8>, path: &Path, format: ImageFormat) -> Result<()> {
    let (w, h) = dims(data.nrows(), data.ncols())?;
    let pixels: Vec<u8> = data.iter().copied().collect();
    let img = GrayImage::from_raw(w, h, pixels).ok_or(FlowError::InvalidDimensions {
        width: w,
        height: h,
    })?;
    img.save_with_format(path, format)?;
    Ok(())
}

/// Save values in `[0, 1]` as 16-bit grayscale TIFF.
pub fn save_unit_tiff16(data: &Array2<f32>, path: &Path) -> Result<()> {
    let (w, h) = dims(data.nrows(), data.ncols())?;
    let pixels: Vec<u16> = data
        .iter()
        .map(|v| (v.clamp(0.0, 1.0) * 65535.0) as u16)
        .collect();
    let img = ImageBuffer::<Luma<u16>, Vec<u16>>::from_raw(w, h, pixels).ok_or(
        FlowError::InvalidDimensions {
            width: w,
            height: h,
        },
    )?;
    img.save_with_format(path, ImageFormat::Tiff)?;
    Ok(())
}

/// Save an 8-bit image, choosing the format from the file extension
/// (PNG unless the extension says TIFF).
pub fn save_image(data: &Array2<u8>, path: &Path) -> Result<()> {
    match path.extension().and_then(|e| e.to_str()) {
        Some("tiff" | "tif") => save_gray(data, path, ImageFormat::Tiff),
        _ => save_gray(data, path, ImageFormat::Png),
    }
}

/// Load an 8-bit grayscale image back into an array.
pub fn load_gray(path: &Path) -> Result<Array2<u8>> {
    let img = image::open(path)?.to_luma8();
    let (w, h) = img.dimensions();
    Array2::from_shape_vec((h as usize, w as usize), img.into_raw())
        .map_err(|_| FlowError::InvalidDimensions { width: w, height: h })
}
