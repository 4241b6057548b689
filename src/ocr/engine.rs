//! Exact bitmap matcher.
//!
//! Walks a line's column-major glyph band left to right and, at each
//! position, tries every template in library order for a pixel-exact match.

use super::library::{GlyphLibrary, GlyphTemplate};
use super::preprocess::LineColumns;

/// Glyph that is recognised but counted instead of emitted.
pub const IGNORED_GLYPH: u8 = b'^';

/// Raw output of one line scan.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ScanOutput {
    pub text: String,
    pub ignored: u32,
}

/// Scans a line for glyphs.
///
/// `prefix_columns`, when set, limits each comparison to that many leading
/// columns of the template. The match still advances by the full template
/// width. Only pass it for a library whose prefixes are unique.
///
/// When nothing matches at an offset the scan moves on by one column. This
/// lets a line that starts slightly off the glyph grid recover, but it can
/// also skip silently over a column that belonged to an unknown glyph.
pub fn scan_line(
    line: &LineColumns,
    library: &GlyphLibrary,
    prefix_columns: Option<usize>,
) -> ScanOutput {
    let mut out = ScanOutput::default();
    if line.rows == 0 {
        return out;
    }

    let mut offset = 0;
    while offset < line.columns {
        match match_at(line, offset, library, prefix_columns) {
            Some(glyph) => {
                if glyph.character() == IGNORED_GLYPH {
                    out.ignored += 1;
                } else {
                    out.text.push(glyph.character() as char);
                }
                offset += glyph.width();
            }
            None => offset += 1,
        }
    }

    out
}

/// First template, in library order, that matches at `offset`.
fn match_at<'a>(
    line: &LineColumns,
    offset: usize,
    library: &'a GlyphLibrary,
    prefix_columns: Option<usize>,
) -> Option<&'a GlyphTemplate> {
    library.glyphs().iter().find(|glyph| {
        if offset + glyph.width() > line.columns {
            return false;
        }
        let compared = prefix_columns.map_or(glyph.width(), |p| p.min(glyph.width()));
        glyph_matches(line, offset, glyph, compared)
    })
}

/// Compares `columns` columns of `glyph` against the line at `offset`.
fn glyph_matches(line: &LineColumns, offset: usize, glyph: &GlyphTemplate, columns: usize) -> bool {
    for x in 0..columns {
        if line.column(offset + x) != glyph.column(x, line.rows) {
            return false;
        }
    }
    true
}
