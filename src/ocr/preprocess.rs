//! Pixel packing and column extraction.
//!
//! Captured frames arrive as 32-bit pixels in B,G,R,X byte order. Templates are
//! decoded from RGBA PNGs. Both are packed into `0x00RRGGBB` so they compare
//! with plain integer equality; the top byte of a captured pixel is ignored.

/// Bytes per captured pixel.
pub const BYTES_PER_PIXEL: usize = 4;

/// Packs an RGB triple into `0x00RRGGBB`.
pub fn pack_rgb(r: u8, g: u8, b: u8) -> u32 {
    ((r as u32) << 16) | ((g as u32) << 8) | b as u32
}

/// Packs one captured B,G,R,X pixel into `0x00RRGGBB`.
pub fn pack_bgrx(px: &[u8; 4]) -> u32 {
    u32::from_le_bytes([px[0], px[1], px[2], 0])
}

/// Splits a packed value back into `[r, g, b]`.
#[cfg(test)]
pub fn unpack_rgb(packed: u32) -> [u8; 3] {
    let [b, g, r, _] = packed.to_le_bytes();
    [r, g, b]
}

/// Reads the packed pixel at `(x, y)` of a row-major B,G,R,X buffer.
///
/// Returns `None` when the coordinate falls outside the buffer.
pub fn pixel_at(data: &[u8], width: usize, x: usize, y: usize) -> Option<u32> {
    if x >= width {
        return None;
    }
    let start = (y * width + x) * BYTES_PER_PIXEL;
    let px: &[u8; 4] = data.get(start..start + BYTES_PER_PIXEL)?.try_into().ok()?;
    Some(pack_bgrx(px))
}

/// Column-major pixel window of one text line.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LineColumns {
    pub columns: usize,
    pub rows: usize,
    pub pixels: Vec<u32>,
}

impl LineColumns {
    /// The `rows` pixels of column `x`.
    pub fn column(&self, x: usize) -> &[u32] {
        &self.pixels[x * self.rows..(x + 1) * self.rows]
    }
}

/// Extracts the glyph band of a line into a column-major array.
///
/// The band starts `top_margin` rows down and is at most `rows` tall. It is
/// shortened when the buffer holds fewer rows, and has zero rows when the
/// margin alone does not fit.
pub fn extract_columns(line: &[u8], width: usize, top_margin: usize, rows: usize) -> LineColumns {
    if width == 0 {
        return LineColumns {
            columns: 0,
            rows: 0,
            pixels: Vec::new(),
        };
    }

    let available = line.len() / (width * BYTES_PER_PIXEL);
    let rows = rows.min(available.saturating_sub(top_margin));

    let mut pixels = Vec::with_capacity(width * rows);
    for x in 0..width {
        for y in top_margin..top_margin + rows {
            let start = (y * width + x) * BYTES_PER_PIXEL;
            let px = [line[start], line[start + 1], line[start + 2], line[start + 3]];
            pixels.push(pack_bgrx(&px));
        }
    }

    LineColumns {
        columns: width,
        rows,
        pixels,
    }
}
