//! Screen capture and input injection.
//!
//! This module provides:
//! - The collaborator traits the extractor drives (`ScreenCapture`,
//!   `InputInjector`, `PointerQuery`)
//! - Platform backends (X11 on Linux, GDI on Windows)
//! - Anchor image search (`locate_window`)
//! - Diagnostic PNG output

pub mod screenshot;
pub mod window;

#[cfg(windows)]
pub mod win32;
#[cfg(target_os = "linux")]
pub mod x11;

use anyhow::Result;

use crate::ocr::preprocess::{pixel_at, BYTES_PER_PIXEL};

pub use window::locate_window;

/// Screen rectangle in absolute pixels.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Rect {
    pub x: i32,
    pub y: i32,
    pub width: u32,
    pub height: u32,
}

/// Raw capture: row-major, 4 bytes per pixel in B,G,R,X order.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Frame {
    pub width: u32,
    pub height: u32,
    pub data: Vec<u8>,
}

impl Frame {
    pub fn expected_len(width: u32, height: u32) -> usize {
        width as usize * height as usize * BYTES_PER_PIXEL
    }

    /// Packed `0x00RRGGBB` pixel, or `None` outside the frame.
    pub fn pixel(&self, x: u32, y: u32) -> Option<u32> {
        if y >= self.height {
            return None;
        }
        pixel_at(&self.data, self.width as usize, x as usize, y as usize)
    }
}

pub trait ScreenCapture {
    /// Captures `rect` synchronously.
    fn capture_region(&self, rect: Rect) -> Result<Frame>;

    fn screen_size(&self) -> Result<(u32, u32)>;
}

pub trait InputInjector {
    /// Moves the pointer to `(x, y)` and clicks the primary button.
    fn click_at(&self, x: i32, y: i32) -> Result<()>;

    fn move_to(&self, x: i32, y: i32) -> Result<()>;
}

pub trait PointerQuery {
    fn current_position(&self) -> Result<(i32, i32)>;
}

/// Everything the extractor needs from the display.
pub trait Screen: ScreenCapture + InputInjector + PointerQuery {}

impl<T: ScreenCapture + InputInjector + PointerQuery + ?Sized> Screen for T {}

/// Opens the backend for the current platform.
#[cfg(target_os = "linux")]
pub fn open_screen() -> Result<Box<dyn Screen>> {
    Ok(Box::new(x11::X11Screen::connect()?))
}

/// Opens the backend for the current platform.
#[cfg(windows)]
pub fn open_screen() -> Result<Box<dyn Screen>> {
    Ok(Box::new(win32::GdiScreen::new()))
}

#[cfg(not(any(windows, target_os = "linux")))]
pub fn open_screen() -> Result<Box<dyn Screen>> {
    anyhow::bail!("no screen backend for this platform")
}
