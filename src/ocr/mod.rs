pub mod engine;
pub mod extract;
pub mod library;
pub mod pipeline;
pub mod preprocess;
pub mod setup;
pub mod tally;

pub use extract::Record;
pub use library::GlyphLibrary;
pub use pipeline::{decode_page, CapturedPage, DecodeSession};
pub use setup::load_library;
pub use tally::CharTally;

use log::warn;

use crate::automation::config::LayoutConfig;
use crate::error::LineError;
use engine::{scan_line, ScanOutput};
use extract::parse_record;
use preprocess::extract_columns;

/// Result of decoding one line.
pub type LineOutcome = Result<Record, LineError>;

/// Columns compared by the prefix shortcut.
pub const PREFIX_COLUMNS: usize = 4;

/// Per-run matcher settings, derived once from config and the loaded font.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DecodeOptions {
    /// Rows skipped above the glyph band.
    pub top_margin: usize,
    /// Height of the glyph band, never more than the library height.
    pub clip_rows: usize,
    /// Leading template columns to compare, `None` for full width.
    pub prefix_columns: Option<usize>,
}

impl DecodeOptions {
    /// Builds the options, enabling the prefix shortcut only when the font
    /// has unique prefixes.
    pub fn new(layout: &LayoutConfig, library: &GlyphLibrary, prefix_shortcut: bool) -> Self {
        let clip_rows = layout.glyph_rows.min(library.height());

        let prefix_columns = if !prefix_shortcut {
            None
        } else if library.prefix_unique(PREFIX_COLUMNS, clip_rows) {
            Some(PREFIX_COLUMNS)
        } else {
            warn!(
                "Glyph prefixes of {} columns are not unique, comparing full glyph widths",
                PREFIX_COLUMNS
            );
            None
        };

        Self {
            top_margin: layout.glyph_top_margin,
            clip_rows,
            prefix_columns,
        }
    }
}

/// Decodes one line buffer into a validated record.
///
/// Pure over its inputs. The raw scan is returned alongside the outcome for
/// the frequency diagnostic.
pub fn decode_line(
    line: &[u8],
    line_width: usize,
    line_height: usize,
    library: &GlyphLibrary,
    options: &DecodeOptions,
) -> (LineOutcome, ScanOutput) {
    let line = &line[..line.len().min(line_width * line_height * preprocess::BYTES_PER_PIXEL)];
    let columns = extract_columns(line, line_width, options.top_margin, options.clip_rows);
    let scan = scan_line(&columns, library, options.prefix_columns);
    (parse_record(&scan.text), scan)
}
