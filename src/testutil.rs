//! Fixtures shared by the unit tests: a synthetic font, line rendering and a
//! scripted scroll window.

use std::cell::RefCell;
use std::fs;
use std::path::Path;

use anyhow::{bail, Result};
use image::{Rgba, RgbaImage};

use crate::automation::config::{ExtractConfig, LayoutConfig, Point, TimingConfig};
use crate::automation::coords::ScrollGeometry;
use crate::capture::{Frame, InputInjector, PointerQuery, Rect, ScreenCapture};
use crate::ocr::preprocess::{pack_rgb, unpack_rgb, BYTES_PER_PIXEL};
use crate::ocr::library::GlyphTemplate;
use crate::ocr::{DecodeOptions, GlyphLibrary};

pub const BACKGROUND: u32 = 0x00FF_FFFF;
pub const GLYPH_WIDTH: usize = 4;
pub const GLYPH_ROWS: usize = 13;
pub const TOP_MARGIN: usize = 2;

const SYNTHETIC_CHARS: &str = "0123456789:|^";
const DESKTOP: u32 = 0x0040_4040;
const ANCHOR_WIDTH: u32 = 6;
const ANCHOR_HEIGHT: u32 = 4;

/// Colour of column `c`, row `r` of the synthetic glyph for `ch`. The red
/// channel carries the character so every glyph differs in every column.
pub fn glyph_pixel(ch: u8, c: usize, r: usize) -> u32 {
    pack_rgb(ch, 0x10 + (c as u8) * 0x20, 0x08 + (r as u8) * 0x10)
}

fn bgrx(packed: u32) -> [u8; 4] {
    let [r, g, b] = unpack_rgb(packed);
    [b, g, r, 0xFF]
}

pub fn synthetic_library() -> GlyphLibrary {
    let templates = SYNTHETIC_CHARS
        .bytes()
        .map(|ch| {
            let pixels = (0..GLYPH_WIDTH)
                .flat_map(|c| (0..GLYPH_ROWS).map(move |r| glyph_pixel(ch, c, r)))
                .collect();
            GlyphTemplate::new(ch, GLYPH_WIDTH, GLYPH_ROWS, pixels).unwrap()
        })
        .collect();
    GlyphLibrary::from_templates(templates, 200).unwrap()
}

pub fn test_options() -> DecodeOptions {
    DecodeOptions {
        top_margin: TOP_MARGIN,
        clip_rows: GLYPH_ROWS,
        prefix_columns: Some(4),
    }
}

/// Renders `text` onto a white line, starting `lead_in` columns in.
pub fn render_line(
    lib: &GlyphLibrary,
    text: &str,
    width: usize,
    line_height: usize,
    lead_in: usize,
) -> Vec<u8> {
    let mut pixels = bgrx(BACKGROUND).repeat(width * line_height);
    let mut x = lead_in;
    for ch in text.bytes() {
        let glyph = lib.glyph(ch).unwrap();
        for c in 0..glyph.width() {
            if x + c >= width {
                break;
            }
            for (r, packed) in glyph.column(c, glyph.height()).iter().enumerate() {
                let y = TOP_MARGIN + r;
                if y >= line_height {
                    break;
                }
                let start = (y * width + x + c) * BYTES_PER_PIXEL;
                pixels[start..start + BYTES_PER_PIXEL].copy_from_slice(&bgrx(*packed));
            }
        }
        x += glyph.width();
    }
    pixels
}

/// Renders rows top to bottom into one page buffer.
pub fn render_page(lib: &GlyphLibrary, rows: &[String], width: usize, line_height: usize) -> Vec<u8> {
    rows.iter()
        .flat_map(|row| render_line(lib, row, width, line_height, 0))
        .collect()
}

/// A valid source line, unique per `i`.
pub fn sample_row(i: usize) -> String {
    format!(
        "{:02}:{:02}:{:02}|{}|{}|{}|{}",
        (i / 3600) % 24,
        (i / 60) % 60,
        i % 60,
        1000 + i,
        i % 7,
        i % 13 + 1,
        i % 2
    )
}

/// Writes `glyphs.png` and `index.json` for `chars`, four columns each.
pub fn write_font_dir(dir: &Path, chars: &str, height: u32) {
    let width = chars.len() as u32 * GLYPH_WIDTH as u32;
    let mut img = RgbaImage::new(width, height);
    let mut index = Vec::new();

    for (i, ch) in chars.bytes().enumerate() {
        let x0 = (i * GLYPH_WIDTH) as u32;
        for c in 0..GLYPH_WIDTH {
            for r in 0..height as usize {
                let [red, green, blue] = unpack_rgb(glyph_pixel(ch, c, r));
                img.put_pixel(x0 + c as u32, r as u32, Rgba([red, green, blue, 255]));
            }
        }
        index.push(serde_json::json!({
            "Character": (ch as char).to_string(),
            "Width": GLYPH_WIDTH,
            "Height": height,
            "XOffset": x0,
            "YOffset": 0,
            "FileName": "glyphs.png",
        }));
    }

    img.save(dir.join("glyphs.png")).unwrap();
    fs::write(dir.join("index.json"), serde_json::to_string_pretty(&index).unwrap()).unwrap();
}

pub fn anchor_pixel(x: u32, y: u32) -> u32 {
    pack_rgb(200, 10 + x as u8 * 20, 10 + y as u8 * 20)
}

pub fn write_anchor_png(path: &Path) {
    let img = RgbaImage::from_fn(ANCHOR_WIDTH, ANCHOR_HEIGHT, |x, y| {
        let [r, g, b] = unpack_rgb(anchor_pixel(x, y));
        Rgba([r, g, b, 255])
    });
    img.save(path).unwrap();
}

/// Small layout used with [`FakeScrollWindow`], without any delays.
pub fn test_config() -> ExtractConfig {
    ExtractConfig {
        decode_workers: Some(2),
        anchor_offset: Point::new(150, 2),
        layout: LayoutConfig {
            select_click: Point::new(60, 5),
            line_up_button: Point::new(200, 20),
            line_down_button: Point::new(200, 300),
            page_origin: Point::new(1, 30),
            line_width: 120,
            line_height: 18,
            lines_shown: 6,
            black_probe: Point::new(100, 3),
            ..LayoutConfig::default()
        },
        timing: TimingConfig {
            initial_settle_ms: 0,
            scroll_to_top_ms: 0,
            first_page_click_ms: 0,
            restabilize_ms: 0,
            post_page_ms: 0,
            loop_delay_ms: 0,
            line_click_ms: 0,
            line_settle_ms: 0,
            line_sample_ms: 0,
            page_up_ms: 0,
        },
        ..ExtractConfig::default()
    }
}

struct FakeState {
    top: usize,
    previous_top: usize,
    /// Captures since the last downward scroll
    since_scroll: u32,
    captures: u64,
    pointer: (i32, i32),
    clicks: Vec<Point>,
    moves: Vec<Point>,
}

/// A scroll list on a 240x320 screen that reacts to clicks on its buttons.
///
/// Row 0 of `rows` is the top of the list. Page-down only scrolls when a
/// whole page of unseen rows is left below the view. Downward scrolls can be
/// made to lag: the first `stale` captures still show the old view, the next
/// `torn` ones a growing mix of old and new lines, top first unless
/// redrawn bottom up.
pub struct FakeScrollWindow {
    geometry: ScrollGeometry,
    anchor_at: Point,
    screen: (u32, u32),
    lines: Vec<Vec<u8>>,
    line_width: usize,
    line_height: usize,
    stale: u32,
    torn: u32,
    bottom_up: bool,
    page_down_step: usize,
    page_up_step: usize,
    black_lines: bool,
    leave_after_captures: Option<u64>,
    state: RefCell<FakeState>,
}

impl FakeScrollWindow {
    pub fn new(lib: &GlyphLibrary, config: &ExtractConfig, rows: Vec<String>) -> Self {
        let layout = &config.layout;
        let lines = rows
            .iter()
            .map(|row| render_line(lib, row, layout.line_width, layout.line_height, 0))
            .collect();
        let origin = Point::new(0, 0);
        Self {
            geometry: ScrollGeometry::new(origin, config),
            anchor_at: origin.offset(config.anchor_offset.x, config.anchor_offset.y),
            screen: (240, 320),
            lines,
            line_width: layout.line_width,
            line_height: layout.line_height,
            stale: 0,
            torn: 0,
            bottom_up: false,
            page_down_step: layout.lines_shown,
            page_up_step: layout.lines_shown,
            black_lines: false,
            leave_after_captures: None,
            state: RefCell::new(FakeState {
                top: 0,
                previous_top: 0,
                since_scroll: 0,
                captures: 0,
                pointer: (500, 500),
                clicks: Vec::new(),
                moves: Vec::new(),
            }),
        }
    }

    /// Places the window so its origin lands on `origin`.
    pub fn with_origin(mut self, origin: Point, config: &ExtractConfig) -> Self {
        self.geometry = ScrollGeometry::new(origin, config);
        self.anchor_at = origin.offset(config.anchor_offset.x, config.anchor_offset.y);
        self
    }

    pub fn with_stale_captures(mut self, n: u32) -> Self {
        self.stale = n;
        self
    }

    pub fn with_torn_captures(mut self, n: u32) -> Self {
        self.torn = n;
        self
    }

    /// Torn captures show the new view from the bottom line upwards.
    pub fn with_bottom_up_redraw(mut self) -> Self {
        self.bottom_up = true;
        self
    }

    pub fn with_page_up_step(mut self, n: usize) -> Self {
        self.page_up_step = n;
        self
    }

    /// Every single-line capture comes back black.
    pub fn with_black_lines(mut self) -> Self {
        self.black_lines = true;
        self
    }

    /// The pointer jumps to the left screen edge after `n` captures.
    pub fn with_pointer_leaving_after(mut self, n: u64) -> Self {
        self.leave_after_captures = Some(n);
        self
    }

    pub fn clicks(&self) -> Vec<Point> {
        self.state.borrow().clicks.clone()
    }

    pub fn moves(&self) -> Vec<Point> {
        self.state.borrow().moves.clone()
    }


    fn max_top(&self) -> usize {
        self.lines.len().saturating_sub(self.geometry.lines_shown)
    }

    /// Row shown on visible line `k` for the current capture.
    fn row_for(&self, state: &FakeState, k: usize) -> usize {
        let n = state.since_scroll;
        let top = if n < self.stale {
            state.previous_top
        } else if n < self.stale + self.torn {
            let progress = (n - self.stale + 1) as usize;
            let shown = self.geometry.lines_shown;
            let fresh = progress * shown / (self.torn as usize + 1);
            let redrawn = if self.bottom_up { k >= shown - fresh } else { k < fresh };
            if redrawn {
                state.top
            } else {
                state.previous_top
            }
        } else {
            state.top
        };
        top + k
    }

    fn pixel(&self, state: &FakeState, x: i32, y: i32) -> [u8; 4] {
        let page = self.geometry.page;
        if x >= page.x
            && y >= page.y
            && x < page.x + page.width as i32
            && y < page.y + page.height as i32
        {
            let (px, py) = ((x - page.x) as usize, (y - page.y) as usize);
            let k = py / self.line_height;
            return match self.lines.get(self.row_for(state, k)) {
                Some(line) => {
                    let start = ((py % self.line_height) * self.line_width + px) * BYTES_PER_PIXEL;
                    [line[start], line[start + 1], line[start + 2], line[start + 3]]
                }
                None => bgrx(BACKGROUND),
            };
        }

        let (ax, ay) = (x - self.anchor_at.x, y - self.anchor_at.y);
        if (0..ANCHOR_WIDTH as i32).contains(&ax) && (0..ANCHOR_HEIGHT as i32).contains(&ay) {
            return bgrx(anchor_pixel(ax as u32, ay as u32));
        }
        bgrx(DESKTOP)
    }

    fn scroll_down_to(&self, state: &mut FakeState, top: usize) {
        state.previous_top = state.top;
        state.top = top;
        state.since_scroll = 0;
    }
}

impl ScreenCapture for FakeScrollWindow {
    fn capture_region(&self, rect: Rect) -> Result<Frame> {
        let (sw, sh) = self.screen;
        if rect.x < 0
            || rect.y < 0
            || rect.x as u32 + rect.width > sw
            || rect.y as u32 + rect.height > sh
        {
            bail!("{:?} is outside the {}x{} screen", rect, sw, sh);
        }

        let mut state = self.state.borrow_mut();
        state.captures += 1;

        let data = if self.black_lines && rect.height as usize == self.line_height {
            vec![0; Frame::expected_len(rect.width, rect.height)]
        } else {
            let mut data = Vec::with_capacity(Frame::expected_len(rect.width, rect.height));
            for y in rect.y..rect.y + rect.height as i32 {
                for x in rect.x..rect.x + rect.width as i32 {
                    data.extend_from_slice(&self.pixel(&state, x, y));
                }
            }
            data
        };
        state.since_scroll = state.since_scroll.saturating_add(1);

        Ok(Frame {
            width: rect.width,
            height: rect.height,
            data,
        })
    }

    fn screen_size(&self) -> Result<(u32, u32)> {
        Ok(self.screen)
    }
}

impl InputInjector for FakeScrollWindow {
    fn click_at(&self, x: i32, y: i32) -> Result<()> {
        let at = Point::new(x, y);
        let max_top = self.max_top();
        let geo = &self.geometry;
        let mut state = self.state.borrow_mut();
        state.pointer = (x, y);
        state.clicks.push(at);

        if at == geo.page_down {
            let next = state.top + self.page_down_step;
            if next <= max_top {
                self.scroll_down_to(&mut state, next);
            }
        } else if at == geo.line_down {
            if state.top < max_top {
                let next = state.top + 1;
                self.scroll_down_to(&mut state, next);
            }
        } else if at == geo.page_up {
            state.top = state.top.saturating_sub(self.page_up_step);
        } else if at == geo.line_up {
            state.top = state.top.saturating_sub(1);
        }
        Ok(())
    }

    fn move_to(&self, x: i32, y: i32) -> Result<()> {
        let mut state = self.state.borrow_mut();
        state.pointer = (x, y);
        state.moves.push(Point::new(x, y));
        Ok(())
    }
}

impl PointerQuery for FakeScrollWindow {
    fn current_position(&self) -> Result<(i32, i32)> {
        let state = self.state.borrow();
        match self.leave_after_captures {
            Some(n) if state.captures >= n => Ok((0, state.pointer.1)),
            _ => Ok(state.pointer),
        }
    }
}
