//! Comparison of an extracted record file with the reference data it was
//! generated from.
//!
//! Lines are compared in order after trimming trailing whitespace, so CRLF and
//! LF files compare equal. A differing line within the common length is
//! reported before any length mismatch.

use anyhow::{Context, Result};
use std::fmt;
use std::fs::File;
use std::io::{BufRead, BufReader};
use std::path::Path;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CompareOutcome {
    Match {
        lines: usize,
    },
    /// First differing line, 1-based
    Differs {
        line: usize,
        expected: String,
        found: String,
    },
    LengthMismatch {
        expected: usize,
        found: usize,
    },
}

impl CompareOutcome {
    /// Process exit code for this outcome.
    pub fn exit_code(&self) -> u8 {
        match self {
            CompareOutcome::Match { .. } => 0,
            CompareOutcome::Differs { .. } => 1,
            CompareOutcome::LengthMismatch { .. } => 2,
        }
    }
}

impl fmt::Display for CompareOutcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CompareOutcome::Match { lines } => {
                write!(f, "extracted text matches the reference ({} lines)", lines)
            }
            CompareOutcome::Differs {
                line,
                expected,
                found,
            } => write!(
                f,
                "extracted text differs from the reference at line {}: expected {:?}, found {:?}",
                line, expected, found
            ),
            CompareOutcome::LengthMismatch { expected, found } => {
                let relation = if found > expected { "longer" } else { "shorter" };
                write!(
                    f,
                    "extracted text is {} than the reference ({} lines, expected {})",
                    relation, found, expected
                )
            }
        }
    }
}

fn read_lines(path: &Path) -> Result<Vec<String>> {
    let file = File::open(path).with_context(|| format!("Failed to open {}", path.display()))?;
    BufReader::new(file)
        .lines()
        .map(|line| {
            line.map(|l| l.trim_end().to_string())
                .with_context(|| format!("Failed to read {}", path.display()))
        })
        .collect()
}

/// Compares `extracted` against `reference`.
///
/// Errors only when either file cannot be read.
pub fn compare_files(reference: &Path, extracted: &Path) -> Result<CompareOutcome> {
    let expected = read_lines(reference)?;
    let found = read_lines(extracted)?;

    let mismatch = expected
        .iter()
        .zip(found.iter())
        .enumerate()
        .find(|(_, (e, f))| e != f);
    if let Some((i, (e, f))) = mismatch {
        return Ok(CompareOutcome::Differs {
            line: i + 1,
            expected: e.clone(),
            found: f.clone(),
        });
    }

    if expected.len() != found.len() {
        return Ok(CompareOutcome::LengthMismatch {
            expected: expected.len(),
            found: found.len(),
        });
    }
    Ok(CompareOutcome::Match {
        lines: expected.len(),
    })
}
