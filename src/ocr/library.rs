//! Glyph templates and the priority-ordered bitmap library.

use crate::error::DataError;

/// Characters in expected-frequency order. Templates are tried in this order.
pub const PRIORITY_LIST: &[u8] = b"^|01453.:28976,%+-";

/// Largest glyph width accepted from the index.
pub const MAX_GLYPH_WIDTH: usize = 30;
/// Largest glyph height accepted from the index.
pub const MAX_GLYPH_HEIGHT: usize = 40;

/// Reference bitmap for one character. Pixels are packed `0x00RRGGBB`,
/// column-major with a stride of `height`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GlyphTemplate {
    character: u8,
    width: usize,
    height: usize,
    pixels: Vec<u32>,
}

impl GlyphTemplate {
    pub fn new(
        character: u8,
        width: usize,
        height: usize,
        pixels: Vec<u32>,
    ) -> Result<Self, DataError> {
        let invalid = |reason: String| DataError::InvalidGlyph {
            character: character as char,
            reason,
        };

        if !character.is_ascii_graphic() && character != b' ' {
            return Err(invalid(format!("byte 0x{:02x} is not printable", character)));
        }
        if !(1..=MAX_GLYPH_WIDTH).contains(&width) {
            return Err(invalid(format!(
                "width {} outside 1..={}",
                width, MAX_GLYPH_WIDTH
            )));
        }
        if !(1..=MAX_GLYPH_HEIGHT).contains(&height) {
            return Err(invalid(format!(
                "height {} outside 1..={}",
                height, MAX_GLYPH_HEIGHT
            )));
        }
        if pixels.len() != width * height {
            return Err(invalid(format!(
                "{} pixels for a {}x{} glyph",
                pixels.len(),
                width,
                height
            )));
        }

        Ok(Self {
            character,
            width,
            height,
            pixels,
        })
    }

    pub fn character(&self) -> u8 {
        self.character
    }

    pub fn width(&self) -> usize {
        self.width
    }

    #[cfg(test)]
    pub fn height(&self) -> usize {
        self.height
    }

    /// Column `x`, limited to its first `rows` pixels.
    pub fn column(&self, x: usize, rows: usize) -> &[u32] {
        let start = x * self.height;
        &self.pixels[start..start + rows.min(self.height)]
    }
}

/// Validated, priority-ordered glyph set with a uniform height.
#[derive(Debug, Clone)]
pub struct GlyphLibrary {
    glyphs: Vec<GlyphTemplate>,
    height: usize,
}

impl GlyphLibrary {
    /// Builds a library from already decoded templates.
    ///
    /// Rejects an empty set, sets above `capacity`, mixed heights and
    /// duplicate characters. Characters missing from [`PRIORITY_LIST`] are
    /// placed after the listed ones in ascending byte order.
    pub fn from_templates(
        mut templates: Vec<GlyphTemplate>,
        capacity: usize,
    ) -> Result<Self, DataError> {
        let first = templates.first().ok_or(DataError::Empty)?;
        if templates.len() > capacity {
            return Err(DataError::CapacityExceeded {
                count: templates.len(),
                capacity,
            });
        }

        let height = first.height;
        for glyph in &templates {
            if glyph.height != height {
                return Err(DataError::NonUniformHeight {
                    character: glyph.character as char,
                    expected: height,
                    found: glyph.height,
                });
            }
        }

        templates.sort_by_key(|g| (priority_rank(g.character), g.character));
        if let Some(pair) = templates
            .windows(2)
            .find(|pair| pair[0].character == pair[1].character)
        {
            return Err(DataError::DuplicateCharacter(pair[0].character as char));
        }

        Ok(Self {
            glyphs: templates,
            height,
        })
    }

    /// Templates in search order.
    pub fn glyphs(&self) -> &[GlyphTemplate] {
        &self.glyphs
    }

    pub fn height(&self) -> usize {
        self.height
    }

    pub fn len(&self) -> usize {
        self.glyphs.len()
    }

    #[cfg(test)]
    pub fn glyph(&self, character: u8) -> Option<&GlyphTemplate> {
        self.glyphs.iter().find(|g| g.character == character)
    }

    /// Characters in search order.
    pub fn search_order(&self) -> String {
        self.glyphs.iter().map(|g| g.character as char).collect()
    }

    /// True when no two templates share the same leading `columns` columns
    /// (over the first `rows` rows).
    ///
    /// Comparing only that prefix during matching is sound exactly when this
    /// holds for the loaded font.
    pub fn prefix_unique(&self, columns: usize, rows: usize) -> bool {
        let prefixes: Vec<Vec<&[u32]>> = self
            .glyphs
            .iter()
            .map(|g| (0..columns.min(g.width)).map(|x| g.column(x, rows)).collect())
            .collect();

        for (i, a) in prefixes.iter().enumerate() {
            if prefixes[i + 1..].iter().any(|b| a == b) {
                return false;
            }
        }
        true
    }
}

/// Position in [`PRIORITY_LIST`], or past its end for unlisted characters.
fn priority_rank(character: u8) -> usize {
    PRIORITY_LIST
        .iter()
        .position(|&c| c == character)
        .unwrap_or(PRIORITY_LIST.len())
}
