//! Configuration types for extraction.
//!
//! Loads settings from a JSON file at startup. Provides the scroll window
//! layout, timing delays, and the retry thresholds that decide when a capture
//! has settled. All defaults are tuned values from a working deployment.

use log::{info, warn};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};

use crate::error::ExtractError;

/// Smallest page-down offset that still lands in the scroll trough.
pub const MIN_PAGE_DOWN_OFFSET: i32 = 9;

/// A point in screen pixels.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Point {
    pub x: i32,
    pub y: i32,
}

impl Point {
    pub const fn new(x: i32, y: i32) -> Self {
        Self { x, y }
    }

    pub fn offset(self, dx: i32, dy: i32) -> Self {
        Self::new(self.x + dx, self.y + dy)
    }
}

/// Scroll window layout, relative to the located window origin.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LayoutConfig {
    /// Click that focuses the list
    pub select_click: Point,
    /// Scroll-up arrow
    pub line_up_button: Point,
    /// Distance below the up arrow that hits the trough (page up)
    pub page_up_drop: i32,
    /// Scroll-down arrow
    pub line_down_button: Point,
    /// Top-left pixel of the first text line
    pub page_origin: Point,
    pub line_width: usize,
    pub line_height: usize,
    pub lines_shown: usize,
    /// Rows skipped above the glyph band of each line
    pub glyph_top_margin: usize,
    /// Rows compared per glyph column
    pub glyph_rows: usize,
    /// Pixel inside a line that is never black on a good capture
    pub black_probe: Point,
    /// Moving the pointer left of this x aborts the run (absolute)
    pub abort_guard_x: i32,
}

impl Default for LayoutConfig {
    fn default() -> Self {
        Self {
            select_click: Point::new(10, 5),
            line_up_button: Point::new(551, 85),
            page_up_drop: 40,
            line_down_button: Point::new(551, 967),
            page_origin: Point::new(1, 62),
            line_width: 532,
            line_height: 18,
            lines_shown: 50,
            glyph_top_margin: 2,
            glyph_rows: 13,
            black_probe: Point::new(100, 3),
            abort_guard_x: 50,
        }
    }
}

/// Deliberate delays, in milliseconds.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TimingConfig {
    /// Before the anchor search, so the user can let go of the mouse
    pub initial_settle_ms: u64,
    pub scroll_to_top_ms: u64,
    pub first_page_click_ms: u64,
    /// Between a changed capture and its confirmation capture
    pub restabilize_ms: u64,
    pub post_page_ms: u64,
    pub loop_delay_ms: u64,
    pub line_click_ms: u64,
    pub line_settle_ms: u64,
    pub line_sample_ms: u64,
    pub page_up_ms: u64,
}

impl Default for TimingConfig {
    fn default() -> Self {
        Self {
            initial_settle_ms: 500,
            scroll_to_top_ms: 250,
            first_page_click_ms: 100,
            restabilize_ms: 40,
            post_page_ms: 10,
            loop_delay_ms: 10,
            line_click_ms: 250,
            line_settle_ms: 500,
            line_sample_ms: 50,
            page_up_ms: 500,
        }
    }
}

/// Retry counts that decide when the display has settled.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct StabilityConfig {
    /// Unchanged page captures (exceeded) that end bulk paging
    pub bulk_settle_threshold: u32,
    /// Unchanged page captures after which each one is logged
    pub bulk_settle_log_after: u32,
    /// Unchanged page captures (exceeded) that end single-line scrolling
    pub line_settle_threshold: u32,
    /// Extra samples of the last line that must equal the first
    pub line_confirm_samples: u32,
    /// Partial updates per backoff tier
    pub backoff_tier_size: u32,
    /// Extra delay per backoff tier
    pub backoff_step_ms: u64,
    pub backoff_max_tier: u32,
}

impl Default for StabilityConfig {
    fn default() -> Self {
        Self {
            bulk_settle_threshold: 25,
            bulk_settle_log_after: 10,
            line_settle_threshold: 15,
            line_confirm_samples: 5,
            backoff_tier_size: 10,
            backoff_step_ms: 10,
            backoff_max_tier: 4,
        }
    }
}

/// Complete extraction configuration.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ExtractConfig {
    /// Log character frequencies at the end of the run
    pub gather_character_counts: bool,
    /// Compare only the first glyph columns when the font allows it
    pub prior_knowledge_speedup: bool,
    /// Pages re-sampled at the end to detect scroll drift
    pub trailing_pages: u32,
    /// Pixels above the down arrow where page-down clicks land
    pub page_down_offset: i32,
    pub font_dir: PathBuf,
    pub font_index: String,
    pub max_glyphs: usize,
    /// Image that identifies the scroll window on screen
    pub anchor_image: PathBuf,
    /// Position of the anchor image inside the window
    pub anchor_offset: Point,
    /// Decode workers, defaults to the available parallelism minus headroom
    pub decode_workers: Option<usize>,
    pub layout: LayoutConfig,
    pub timing: TimingConfig,
    pub stability: StabilityConfig,
}

impl Default for ExtractConfig {
    fn default() -> Self {
        Self {
            gather_character_counts: true,
            prior_knowledge_speedup: true,
            trailing_pages: 2,
            page_down_offset: MIN_PAGE_DOWN_OFFSET,
            font_dir: PathBuf::from("font_source_bitmaps"),
            font_index: "optimised_character_info.json".to_string(),
            max_glyphs: 200,
            anchor_image: PathBuf::from("scroll_mock.png"),
            anchor_offset: Point::new(190, 2),
            decode_workers: None,
            layout: LayoutConfig::default(),
            timing: TimingConfig::default(),
            stability: StabilityConfig::default(),
        }
    }
}

impl ExtractConfig {
    /// Clamps tunables to their safe range and rejects layouts that cannot
    /// be decoded.
    pub fn normalize(&mut self) -> Result<(), ExtractError> {
        if self.page_down_offset < MIN_PAGE_DOWN_OFFSET {
            warn!(
                "page_down_offset {} is below {}, using {}",
                self.page_down_offset, MIN_PAGE_DOWN_OFFSET, MIN_PAGE_DOWN_OFFSET
            );
            self.page_down_offset = MIN_PAGE_DOWN_OFFSET;
        }

        if self.trailing_pages == 0 {
            warn!("trailing_pages must be at least 1, using 1");
            self.trailing_pages = 1;
        }
        if self.trailing_pages == 1 {
            warn!("Only the last page is verified; a short final page-down will not be detected");
        }

        if self.decode_workers == Some(0) {
            self.decode_workers = None;
        }

        let layout = &self.layout;
        if layout.line_width == 0 || layout.line_height == 0 || layout.lines_shown == 0 {
            return Err(ExtractError::Config(
                "line_width, line_height and lines_shown must be positive".to_string(),
            ));
        }
        if layout.glyph_top_margin + layout.glyph_rows > layout.line_height {
            return Err(ExtractError::Config(format!(
                "glyph band ({} + {} rows) is taller than a line ({} rows)",
                layout.glyph_top_margin, layout.glyph_rows, layout.line_height
            )));
        }
        let probe = layout.black_probe;
        if probe.x < 0
            || probe.y < 0
            || probe.x as usize >= layout.line_width
            || probe.y as usize >= layout.line_height
        {
            return Err(ExtractError::Config(format!(
                "black_probe ({}, {}) lies outside a {}x{} line",
                probe.x, probe.y, layout.line_width, layout.line_height
            )));
        }

        Ok(())
    }
}

/// Loads configuration from `path`, or returns defaults when the file does
/// not exist.
pub fn load_config(path: &Path) -> Result<ExtractConfig, ExtractError> {
    info!("Looking for config at: {}", path.display());

    let mut config = if path.exists() {
        let contents = fs::read_to_string(path).map_err(|e| {
            ExtractError::Config(format!("failed to read {}: {}", path.display(), e))
        })?;
        let config: ExtractConfig = serde_json::from_str(&contents).map_err(|e| {
            ExtractError::Config(format!("failed to parse {}: {}", path.display(), e))
        })?;
        info!("Config loaded from {}", path.display());
        config
    } else {
        info!("{} not found. Using default config.", path.display());
        ExtractConfig::default()
    };

    config.normalize()?;
    Ok(config)
}
