//! Still image I/O for frames: clip frames, saved source images and debug dumps.

use std::fs;
use std::path::Path;

use image::codecs::png::{CompressionType, FilterType, PngEncoder};
use image::{ColorType, ImageEncoder};

use crate::core::{CameraError, CameraResult};
use lighthouse_types::ImageFrame;

pub fn load_frame(path: &Path) -> CameraResult<ImageFrame> {
    let decoded = image::open(path).map_err(|err| CameraError::Decode {
        path: path.to_path_buf(),
        message: err.to_string(),
    })?;
    let rgba = decoded.to_rgba8();
    let (width, height) = rgba.dimensions();
    Ok(ImageFrame::from_owned(width, height, rgba.into_raw())?)
}

pub fn encode_png(frame: &ImageFrame) -> CameraResult<Vec<u8>> {
    let mut encoded = Vec::new();
    let encoder =
        PngEncoder::new_with_quality(&mut encoded, CompressionType::Best, FilterType::Adaptive);
    encoder
        .write_image(frame.data(), frame.width(), frame.height(), ColorType::Rgba8)
        .map_err(|err| CameraError::Encode {
            message: err.to_string(),
        })?;
    Ok(encoded)
}

pub fn save_png(frame: &ImageFrame, path: &Path) -> CameraResult<()> {
    let encoded = encode_png(frame)?;
    fs::write(path, encoded)?;
    Ok(())
}
