//! Windows backend: GDI `BitBlt` capture and `SendInput` clicks.

use anyhow::{anyhow, Result};
use std::mem::size_of;
use std::time::Duration;

use windows::Win32::Foundation::POINT;
use windows::Win32::Graphics::Gdi::{
    BitBlt, CreateCompatibleBitmap, CreateCompatibleDC, DeleteDC, DeleteObject, GetDC, GetDIBits,
    ReleaseDC, SelectObject, BITMAPINFO, BITMAPINFOHEADER, BI_RGB, DIB_RGB_COLORS, SRCCOPY,
};
use windows::Win32::UI::Input::KeyboardAndMouse::{
    SendInput, INPUT, INPUT_0, INPUT_MOUSE, MOUSEEVENTF_ABSOLUTE, MOUSEEVENTF_LEFTDOWN,
    MOUSEEVENTF_LEFTUP, MOUSEEVENTF_MOVE, MOUSEINPUT, MOUSE_EVENT_FLAGS,
};
use windows::Win32::UI::WindowsAndMessaging::{
    GetCursorPos, GetSystemMetrics, SetCursorPos, SM_CXSCREEN, SM_CYSCREEN,
};

use super::{Frame, InputInjector, PointerQuery, Rect, ScreenCapture};

#[derive(Default)]
pub struct GdiScreen;

impl GdiScreen {
    pub fn new() -> Self {
        Self
    }
}

impl ScreenCapture for GdiScreen {
    fn capture_region(&self, rect: Rect) -> Result<Frame> {
        let (width, height) = (rect.width as i32, rect.height as i32);
        let mut data = vec![0u8; Frame::expected_len(rect.width, rect.height)];

        unsafe {
            let screen_dc = GetDC(None);
            let mem_dc = CreateCompatibleDC(screen_dc);
            let bitmap = CreateCompatibleBitmap(screen_dc, width, height);
            let previous = SelectObject(mem_dc, bitmap);

            let blit = BitBlt(mem_dc, 0, 0, width, height, screen_dc, rect.x, rect.y, SRCCOPY);

            // Negative height requests a top-down DIB
            let mut info = BITMAPINFO {
                bmiHeader: BITMAPINFOHEADER {
                    biSize: size_of::<BITMAPINFOHEADER>() as u32,
                    biWidth: width,
                    biHeight: -height,
                    biPlanes: 1,
                    biBitCount: 32,
                    biCompression: BI_RGB.0,
                    ..Default::default()
                },
                ..Default::default()
            };
            let lines = GetDIBits(
                mem_dc,
                bitmap,
                0,
                height as u32,
                Some(data.as_mut_ptr().cast()),
                &mut info,
                DIB_RGB_COLORS,
            );

            SelectObject(mem_dc, previous);
            let _ = DeleteObject(bitmap);
            let _ = DeleteDC(mem_dc);
            ReleaseDC(None, screen_dc);

            blit.map_err(|e| anyhow!("BitBlt failed for {:?}: {}", rect, e))?;
            if lines != height {
                return Err(anyhow!("GetDIBits copied {} of {} lines", lines, height));
            }
        }

        Ok(Frame {
            width: rect.width,
            height: rect.height,
            data,
        })
    }

    fn screen_size(&self) -> Result<(u32, u32)> {
        let width = unsafe { GetSystemMetrics(SM_CXSCREEN) };
        let height = unsafe { GetSystemMetrics(SM_CYSCREEN) };
        if width <= 0 || height <= 0 {
            return Err(anyhow!("GetSystemMetrics returned {}x{}", width, height));
        }
        Ok((width as u32, height as u32))
    }
}

/// Sends one absolute mouse event at `(x, y)`.
fn send_mouse(x: i32, y: i32, flags: MOUSE_EVENT_FLAGS) -> Result<()> {
    let screen_width = unsafe { GetSystemMetrics(SM_CXSCREEN) };
    let screen_height = unsafe { GetSystemMetrics(SM_CYSCREEN) };
    if screen_width <= 0 || screen_height <= 0 {
        return Err(anyhow!("screen size unavailable"));
    }

    // Normalize to 0-65535 range (required by MOUSEEVENTF_ABSOLUTE)
    let norm_x = ((x as i64 * 65535) / screen_width as i64) as i32;
    let norm_y = ((y as i64 * 65535) / screen_height as i64) as i32;

    let input = INPUT {
        r#type: INPUT_MOUSE,
        Anonymous: INPUT_0 {
            mi: MOUSEINPUT {
                dx: norm_x,
                dy: norm_y,
                dwFlags: flags | MOUSEEVENTF_ABSOLUTE | MOUSEEVENTF_MOVE,
                ..Default::default()
            },
        },
    };

    let sent = unsafe { SendInput(&[input], size_of::<INPUT>() as i32) };
    if sent != 1 {
        return Err(anyhow!("SendInput rejected the mouse event"));
    }
    Ok(())
}

impl InputInjector for GdiScreen {
    fn click_at(&self, x: i32, y: i32) -> Result<()> {
        send_mouse(x, y, MOUSE_EVENT_FLAGS(0))?;
        send_mouse(x, y, MOUSEEVENTF_LEFTDOWN)?;
        std::thread::sleep(Duration::from_millis(20));
        send_mouse(x, y, MOUSEEVENTF_LEFTUP)
    }

    fn move_to(&self, x: i32, y: i32) -> Result<()> {
        unsafe { SetCursorPos(x, y)? };
        Ok(())
    }
}

impl PointerQuery for GdiScreen {
    fn current_position(&self) -> Result<(i32, i32)> {
        let mut pt = POINT::default();
        unsafe { GetCursorPos(&mut pt)? };
        Ok((pt.x, pt.y))
    }
}
