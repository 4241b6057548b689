//! Font library loading.
//!
//! The font extraction utility writes a JSON index describing where each
//! glyph sits inside a labelled PNG. This module reads that index, cuts the
//! glyphs out, and builds the [`GlyphLibrary`].

use std::collections::HashMap;
use std::fs;
use std::path::{Path, PathBuf};

use image::RgbaImage;
use log::{info, warn};
use serde::Deserialize;

use super::library::{GlyphLibrary, GlyphTemplate};
use super::preprocess::pack_rgb;
use crate::error::DataError;

/// File name used for glyphs that have no source image yet.
const PLACEHOLDER_FILE: &str = "?";

const MAX_X_OFFSET: u32 = 4000;
const MAX_Y_OFFSET: u32 = 3000;

/// One entry of the glyph index.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct GlyphSource {
    pub character: String,
    pub width: u32,
    pub height: u32,
    pub x_offset: u32,
    pub y_offset: u32,
    pub file_name: String,
}

/// Reads and parses the glyph index.
pub fn read_glyph_index(path: &Path) -> Result<Vec<GlyphSource>, DataError> {
    let contents = fs::read_to_string(path).map_err(|source| DataError::IndexRead {
        path: path.to_path_buf(),
        source,
    })?;
    serde_json::from_str(&contents).map_err(|source| DataError::IndexParse {
        path: path.to_path_buf(),
        source,
    })
}

/// Loads the glyph library described by `font_dir/index_file`.
///
/// Entries whose file name is `?` are skipped with a warning. Any other
/// problem aborts the load.
pub fn load_library(
    font_dir: &Path,
    index_file: &str,
    capacity: usize,
) -> Result<GlyphLibrary, DataError> {
    let index_path = font_dir.join(index_file);
    info!("Loading glyph index from {}", index_path.display());

    let sources = read_glyph_index(&index_path)?;
    let mut images: HashMap<PathBuf, RgbaImage> = HashMap::new();
    let mut templates = Vec::with_capacity(sources.len());

    for (entry, source) in sources.iter().enumerate() {
        let character = validate_source(entry, source)?;

        if source.file_name == PLACEHOLDER_FILE {
            warn!(
                "Glyph '{}' has no source image, skipping",
                character as char
            );
            continue;
        }

        let path = font_dir.join(&source.file_name);
        if !images.contains_key(&path) {
            let img = open_font_image(&path)?;
            images.insert(path.clone(), img);
        }
        let Some(img) = images.get(&path) else {
            return Err(DataError::MissingImage(path));
        };

        templates.push(cut_glyph(entry, character, source, img)?);
    }

    let library = GlyphLibrary::from_templates(templates, capacity)?;
    info!(
        "Loaded {} glyphs, height {}, search order {:?}",
        library.len(),
        library.height(),
        library.search_order()
    );
    Ok(library)
}

/// Checks the fields of one index entry. Returns the glyph character.
fn validate_source(entry: usize, source: &GlyphSource) -> Result<u8, DataError> {
    let invalid = |reason: String| DataError::InvalidEntry { entry, reason };

    let &[character] = source.character.as_bytes() else {
        return Err(invalid(format!(
            "character {:?} must be exactly one byte",
            source.character
        )));
    };
    if source.x_offset > MAX_X_OFFSET {
        return Err(invalid(format!(
            "x offset {} above {}",
            source.x_offset, MAX_X_OFFSET
        )));
    }
    if source.y_offset > MAX_Y_OFFSET {
        return Err(invalid(format!(
            "y offset {} above {}",
            source.y_offset, MAX_Y_OFFSET
        )));
    }
    if source.file_name.is_empty() {
        return Err(invalid("file name is empty".to_string()));
    }
    Ok(character)
}

fn open_font_image(path: &Path) -> Result<RgbaImage, DataError> {
    if !path.exists() {
        return Err(DataError::MissingImage(path.to_path_buf()));
    }
    let img = image::open(path).map_err(|source| DataError::ImageDecode {
        path: path.to_path_buf(),
        source,
    })?;
    Ok(img.to_rgba8())
}

/// Copies one glyph out of its source image, column-major.
fn cut_glyph(
    entry: usize,
    character: u8,
    source: &GlyphSource,
    img: &RgbaImage,
) -> Result<GlyphTemplate, DataError> {
    let right = source.x_offset as u64 + source.width as u64;
    let bottom = source.y_offset as u64 + source.height as u64;
    if right > img.width() as u64 || bottom > img.height() as u64 {
        return Err(DataError::InvalidEntry {
            entry,
            reason: format!(
                "glyph rectangle {}x{} at ({}, {}) exceeds {}x{} image {}",
                source.width,
                source.height,
                source.x_offset,
                source.y_offset,
                img.width(),
                img.height(),
                source.file_name
            ),
        });
    }

    let mut pixels = Vec::with_capacity((source.width * source.height) as usize);
    for x in source.x_offset..source.x_offset + source.width {
        for y in source.y_offset..source.y_offset + source.height {
            let p = img.get_pixel(x, y);
            pixels.push(pack_rgb(p[0], p[1], p[2]));
        }
    }

    GlyphTemplate::new(
        character,
        source.width as usize,
        source.height as usize,
        pixels,
    )
}
