//! Absolute click targets and capture regions of the located scroll window.

use crate::automation::config::{ExtractConfig, Point};
use crate::capture::Rect;

/// Screen geometry derived from the window origin and the layout config.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ScrollGeometry {
    pub origin: Point,
    /// All visible lines
    pub page: Rect,
    pub line_height: usize,
    pub lines_shown: usize,
    pub select_click: Point,
    pub line_up: Point,
    pub page_up: Point,
    pub line_down: Point,
    /// Trough just above the down arrow
    pub page_down: Point,
}

impl ScrollGeometry {
    pub fn new(origin: Point, config: &ExtractConfig) -> Self {
        let layout = &config.layout;
        let line_up = origin.offset(layout.line_up_button.x, layout.line_up_button.y);
        let line_down = origin.offset(layout.line_down_button.x, layout.line_down_button.y);
        let top_left = origin.offset(layout.page_origin.x, layout.page_origin.y);

        Self {
            origin,
            page: Rect {
                x: top_left.x,
                y: top_left.y,
                width: layout.line_width as u32,
                height: (layout.line_height * layout.lines_shown) as u32,
            },
            line_height: layout.line_height,
            lines_shown: layout.lines_shown,
            select_click: origin.offset(layout.select_click.x, layout.select_click.y),
            line_up,
            page_up: line_up.offset(0, layout.page_up_drop),
            line_down,
            page_down: line_down.offset(0, -config.page_down_offset),
        }
    }

    /// Region of visible line `line` (0 = top).
    pub fn line_rect(&self, line: usize) -> Rect {
        Rect {
            x: self.page.x,
            y: self.page.y + (line * self.line_height) as i32,
            width: self.page.width,
            height: self.line_height as u32,
        }
    }
}
