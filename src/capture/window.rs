//! Locating the scroll window by exact search for an anchor image.

use anyhow::{Context, Result};
use log::{info, warn};
use std::path::Path;

use super::screenshot::save_frame_png;
use super::{Frame, Rect, Screen};
use crate::automation::config::Point;
use crate::error::ExtractError;
use crate::ocr::preprocess::pack_rgb;

/// Image as packed `0x00RRGGBB` pixels, row-major.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PackedImage {
    pub width: u32,
    pub height: u32,
    pub pixels: Vec<u32>,
}

impl PackedImage {
    pub fn open(path: &Path) -> Result<Self> {
        let img = image::open(path)
            .with_context(|| format!("Failed to open {}", path.display()))?
            .to_rgba8();
        let pixels = img.pixels().map(|p| pack_rgb(p[0], p[1], p[2])).collect();
        Ok(Self {
            width: img.width(),
            height: img.height(),
            pixels,
        })
    }

    pub fn from_frame(frame: &Frame) -> Self {
        let pixels = (0..frame.height)
            .flat_map(|y| (0..frame.width).map(move |x| (x, y)))
            .map(|(x, y)| frame.pixel(x, y).unwrap_or(0))
            .collect();
        Self {
            width: frame.width,
            height: frame.height,
            pixels,
        }
    }

    fn row(&self, x: u32, y: u32, len: u32) -> &[u32] {
        let start = (y * self.width + x) as usize;
        &self.pixels[start..start + len as usize]
    }
}

/// Top-left corner of the first exact occurrence of `needle`, scanning rows
/// top to bottom.
pub fn find_exact(haystack: &PackedImage, needle: &PackedImage) -> Option<(u32, u32)> {
    if needle.width == 0
        || needle.height == 0
        || needle.width > haystack.width
        || needle.height > haystack.height
    {
        return None;
    }

    for y in 0..=haystack.height - needle.height {
        for x in 0..=haystack.width - needle.width {
            let hit = (0..needle.height)
                .all(|dy| haystack.row(x, y + dy, needle.width) == needle.row(0, dy, needle.width));
            if hit {
                return Some((x, y));
            }
        }
    }
    None
}

/// Finds the scroll window and returns its origin.
///
/// The whole screen is captured and searched for the anchor image. On a miss
/// the capture is saved to `session_dir` for inspection.
pub fn locate_window<S: Screen + ?Sized>(
    screen: &S,
    anchor_path: &Path,
    anchor_offset: Point,
    session_dir: &Path,
) -> Result<Point, ExtractError> {
    let needle = PackedImage::open(anchor_path).map_err(|e| {
        ExtractError::Locate(format!("cannot read anchor image: {:#}", e))
    })?;

    let (width, height) = screen.screen_size().map_err(ExtractError::Backend)?;
    let frame = screen
        .capture_region(Rect {
            x: 0,
            y: 0,
            width,
            height,
        })
        .map_err(|e| ExtractError::CaptureFault {
            reason: format!("full screen capture failed: {:#}", e),
            image: None,
        })?;

    let haystack = PackedImage::from_frame(&frame);
    match find_exact(&haystack, &needle) {
        Some((x, y)) => {
            let origin = Point::new(x as i32 - anchor_offset.x, y as i32 - anchor_offset.y);
            info!(
                "Anchor found at ({}, {}), window origin ({}, {})",
                x, y, origin.x, origin.y
            );
            Ok(origin)
        }
        None => {
            let saved = session_dir.join("anchor_search.png");
            let note = match save_frame_png(&frame, &saved) {
                Ok(()) => format!(", screen saved to {}", saved.display()),
                Err(e) => {
                    warn!("Could not save anchor search capture: {:#}", e);
                    String::new()
                }
            };
            Err(ExtractError::Locate(format!(
                "{} not found on a {}x{} screen{}",
                anchor_path.display(),
                width,
                height,
                note
            )))
        }
    }
}
