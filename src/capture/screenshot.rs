//! Diagnostic images from raw captures.

use anyhow::{anyhow, Context, Result};
use image::{ImageBuffer, Rgba, RgbaImage};
use std::path::Path;

use super::Frame;

/// Converts a B,G,R,X buffer into an opaque RGBA image.
pub fn bgrx_to_image(data: &[u8], width: u32, height: u32) -> Result<RgbaImage> {
    if data.len() < Frame::expected_len(width, height) {
        return Err(anyhow!(
            "buffer of {} bytes is too small for {}x{}",
            data.len(),
            width,
            height
        ));
    }

    // Convert BGRX to RGBA, forcing alpha since X is undefined
    let mut rgba = Vec::with_capacity(width as usize * height as usize * 4);
    for px in data.chunks_exact(4).take(width as usize * height as usize) {
        rgba.extend_from_slice(&[px[2], px[1], px[0], 255]);
    }

    ImageBuffer::<Rgba<u8>, _>::from_raw(width, height, rgba)
        .ok_or_else(|| anyhow!("failed to build {}x{} image", width, height))
}

/// Saves a raw capture buffer as PNG.
pub fn save_bgrx_png(data: &[u8], width: u32, height: u32, path: &Path) -> Result<()> {
    let img = bgrx_to_image(data, width, height)?;
    img.save(path)
        .with_context(|| format!("Failed to save image to {}", path.display()))
}

pub fn save_frame_png(frame: &Frame, path: &Path) -> Result<()> {
    save_bgrx_png(&frame.data, frame.width, frame.height, path)
}
