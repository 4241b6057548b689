//! Error taxonomy for the extraction run.
//!
//! Every fatal class maps to its own process exit code so a wrapper script
//! can tell which stage failed without parsing the log.

use std::fmt;
use std::path::PathBuf;

use thiserror::Error;

/// Malformed or missing font templates. Fatal at startup.
#[derive(Debug, Error)]
pub enum DataError {
    #[error("failed to read glyph index {path}: {source}")]
    IndexRead {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("failed to parse glyph index {path}: {source}")]
    IndexParse {
        path: PathBuf,
        source: serde_json::Error,
    },

    #[error("glyph entry {entry}: {reason}")]
    InvalidEntry { entry: usize, reason: String },

    #[error("glyph '{character}': {reason}")]
    InvalidGlyph { character: char, reason: String },

    #[error("font image not found: {0}")]
    MissingImage(PathBuf),

    #[error("failed to decode font image {path}: {source}")]
    ImageDecode {
        path: PathBuf,
        source: image::ImageError,
    },

    #[error("glyph '{character}' is {found} rows high, library height is {expected}")]
    NonUniformHeight {
        character: char,
        expected: usize,
        found: usize,
    },

    #[error("glyph '{0}' is defined more than once")]
    DuplicateCharacter(char),

    #[error("library holds {count} glyphs, capacity is {capacity}")]
    CapacityExceeded { count: usize, capacity: usize },

    #[error("glyph library is empty")]
    Empty,
}

/// Structural validation failure of one decoded line.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum DecodeErrorKind {
    BlankLine,
    FourDividersOnly,
    WrongFieldCount(usize),
    TimeFormat,
}

impl fmt::Display for DecodeErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DecodeErrorKind::BlankLine => write!(f, "blank line"),
            DecodeErrorKind::FourDividersOnly => {
                write!(f, "only the four dividers were found (check the line pixel offsets)")
            }
            DecodeErrorKind::WrongFieldCount(n) => write!(f, "expected 5 fields, found {}", n),
            DecodeErrorKind::TimeFormat => write!(f, "time field is not HH:MM:SS"),
        }
    }
}

/// A line that failed validation, with the raw text that was recognised.
#[derive(Clone, Debug, PartialEq, Eq, Error)]
#[error("{kind} (text: {text:?})")]
pub struct LineError {
    pub kind: DecodeErrorKind,
    pub text: String,
}

/// Fatal outcome of an extraction run.
#[derive(Debug, Error)]
pub enum ExtractError {
    #[error("invalid configuration: {0}")]
    Config(String),

    #[error(transparent)]
    Data(#[from] DataError),

    #[error("could not locate the scroll window: {0}")]
    Locate(String),

    #[error("capture fault: {reason}{}", saved_suffix(.image))]
    CaptureFault {
        reason: String,
        image: Option<PathBuf>,
    },

    #[error("screen backend failure: {0:#}")]
    Backend(anyhow::Error),

    #[error("decode error on page {page}, line {line}: {error}{}", saved_suffix(.image))]
    Decode {
        page: u32,
        line: usize,
        error: LineError,
        image: Option<PathBuf>,
    },

    #[error(
        "trailing line {line} does not match: sampled {sampled:?}, accumulated {accumulated:?}; \
         the page-down click is probably too far up, increase page_down_offset"
    )]
    Drift {
        line: usize,
        sampled: String,
        accumulated: String,
    },

    #[error("aborted by user")]
    Aborted,

    #[error("failed to write output: {0:#}")]
    Output(anyhow::Error),
}

fn saved_suffix(image: &Option<PathBuf>) -> String {
    match image {
        Some(path) => format!(" (image saved to {})", path.display()),
        None => String::new(),
    }
}

impl ExtractError {
    /// Process exit code for this failure class.
    pub fn exit_code(&self) -> u8 {
        match self {
            ExtractError::Config(_) => 2,
            ExtractError::Data(_) => 3,
            ExtractError::Locate(_) => 4,
            ExtractError::CaptureFault { .. } | ExtractError::Backend(_) => 5,
            ExtractError::Decode { .. } => 6,
            ExtractError::Drift { .. } => 7,
            ExtractError::Aborted => 8,
            ExtractError::Output(_) => 9,
        }
    }
}
