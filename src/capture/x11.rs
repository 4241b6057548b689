//! X11 backend: core `GetImage` for capture, XTEST for clicks.

use anyhow::{anyhow, Context, Result};
use x11rb::connection::Connection;
use x11rb::protocol::xproto::{
    ConnectionExt as _, ImageFormat, Window, BUTTON_PRESS_EVENT, BUTTON_RELEASE_EVENT,
};
use x11rb::protocol::xtest::ConnectionExt as _;
use x11rb::rust_connection::RustConnection;

use super::{Frame, InputInjector, PointerQuery, Rect, ScreenCapture};

const PRIMARY_BUTTON: u8 = 1;

pub struct X11Screen {
    conn: RustConnection,
    root: Window,
    width: u16,
    height: u16,
}

impl X11Screen {
    /// Connects to `$DISPLAY` and checks that XTEST is available.
    pub fn connect() -> Result<Self> {
        let (conn, screen_num) =
            x11rb::connect(None).context("Failed to connect to the X server")?;
        let screen = conn
            .setup()
            .roots
            .get(screen_num)
            .ok_or_else(|| anyhow!("X screen {} does not exist", screen_num))?;
        let (root, width, height) = (screen.root, screen.width_in_pixels, screen.height_in_pixels);

        conn.xtest_get_version(2, 2)
            .context("Failed to query XTEST")?
            .reply()
            .context("XTEST extension is not available")?;

        log::debug!("Connected to X screen {} ({}x{})", screen_num, width, height);
        Ok(Self {
            conn,
            root,
            width,
            height,
        })
    }

    /// Round trip so queued requests have been processed by the server.
    fn sync(&self) -> Result<()> {
        self.conn.get_input_focus()?.reply()?;
        Ok(())
    }

    fn button(&self, event: u8, x: i32, y: i32) -> Result<()> {
        self.conn
            .xtest_fake_input(event, PRIMARY_BUTTON, 0, self.root, x as i16, y as i16, 0)?;
        Ok(())
    }
}

impl ScreenCapture for X11Screen {
    fn capture_region(&self, rect: Rect) -> Result<Frame> {
        let reply = self
            .conn
            .get_image(
                ImageFormat::Z_PIXMAP,
                self.root,
                rect.x as i16,
                rect.y as i16,
                rect.width as u16,
                rect.height as u16,
                !0,
            )?
            .reply()
            .with_context(|| format!("GetImage failed for {:?}", rect))?;

        let expected = Frame::expected_len(rect.width, rect.height);
        if reply.data.len() != expected {
            return Err(anyhow!(
                "GetImage returned {} bytes for {:?} at depth {}, expected {}",
                reply.data.len(),
                rect,
                reply.depth,
                expected
            ));
        }

        Ok(Frame {
            width: rect.width,
            height: rect.height,
            data: reply.data,
        })
    }

    fn screen_size(&self) -> Result<(u32, u32)> {
        Ok((self.width as u32, self.height as u32))
    }
}

impl InputInjector for X11Screen {
    fn click_at(&self, x: i32, y: i32) -> Result<()> {
        self.move_to(x, y)?;
        self.button(BUTTON_PRESS_EVENT, x, y)?;
        self.button(BUTTON_RELEASE_EVENT, x, y)?;
        self.sync()
    }

    fn move_to(&self, x: i32, y: i32) -> Result<()> {
        self.conn
            .warp_pointer(x11rb::NONE, self.root, 0, 0, 0, 0, x as i16, y as i16)?;
        self.sync()
    }
}

impl PointerQuery for X11Screen {
    fn current_position(&self) -> Result<(i32, i32)> {
        let reply = self.conn.query_pointer(self.root)?.reply()?;
        Ok((reply.root_x as i32, reply.root_y as i32))
    }
}
