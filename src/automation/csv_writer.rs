//! Writers for the extracted records.
//!
//! Each record becomes one `time,index,location,sensor,value` line with no
//! header, matching what the reference checker reads.

use anyhow::{Context, Result};
use std::fs::File;
use std::io::{BufWriter, Write};
use std::path::Path;

use crate::ocr::Record;

/// Chronological output file name.
pub const EXTRACTED_FILE: &str = "extracted_text.csv";
/// Trailing sample file name.
pub const TRAILING_FILE: &str = "last_lines.csv";

/// Writes `records` to `path`, replacing any previous file. Returns the
/// number of lines written.
pub fn write_records<'a, I>(path: &Path, records: I) -> Result<usize>
where
    I: IntoIterator<Item = &'a Record>,
{
    let file = File::create(path)
        .with_context(|| format!("Failed to create {}", path.display()))?;
    let mut out = BufWriter::new(file);

    let mut count = 0;
    for record in records {
        writeln!(out, "{}", record).context("Failed to write record")?;
        count += 1;
    }

    out.flush()
        .with_context(|| format!("Failed to flush {}", path.display()))?;
    Ok(count)
}
