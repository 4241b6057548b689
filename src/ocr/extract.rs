//! Record validation for recognised line text.

use std::fmt;

use crate::error::{DecodeErrorKind, LineError};

/// Field separator glyph on screen.
pub const SEPARATOR: char = '|';
/// Field delimiter in the output files.
pub const OUTPUT_DELIMITER: char = ',';
/// Number of fields per record.
pub const FIELD_COUNT: usize = 5;

/// Text produced when only the separators were recognised.
const DIVIDERS_ONLY: &str = "||||";

/// One decoded row: time, index, location, sensor, value.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Record {
    fields: [String; FIELD_COUNT],
}

#[cfg(test)]
impl Record {
    pub fn time(&self) -> &str {
        &self.fields[0]
    }

    pub fn index(&self) -> &str {
        &self.fields[1]
    }

    pub fn location(&self) -> &str {
        &self.fields[2]
    }

    pub fn sensor(&self) -> &str {
        &self.fields[3]
    }

    pub fn value(&self) -> &str {
        &self.fields[4]
    }
}

impl fmt::Display for Record {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (i, field) in self.fields.iter().enumerate() {
            if i > 0 {
                write!(f, "{}", OUTPUT_DELIMITER)?;
            }
            write!(f, "{}", field)?;
        }
        Ok(())
    }
}

/// Validates recognised text and splits it into a [`Record`].
///
/// Checks run in a fixed order and stop at the first failure: blank text,
/// separators only, field count, then the colons of the time field.
pub fn parse_record(text: &str) -> Result<Record, LineError> {
    let fail = |kind| {
        Err(LineError {
            kind,
            text: text.to_string(),
        })
    };

    if text.is_empty() {
        return fail(DecodeErrorKind::BlankLine);
    }
    if text == DIVIDERS_ONLY {
        return fail(DecodeErrorKind::FourDividersOnly);
    }

    let parts: Vec<&str> = text.split(SEPARATOR).collect();
    let Ok(fields) = <[&str; FIELD_COUNT]>::try_from(parts.as_slice()) else {
        return fail(DecodeErrorKind::WrongFieldCount(parts.len()));
    };

    let time = fields[0].as_bytes();
    if time.get(2) != Some(&b':') || time.get(5) != Some(&b':') {
        return fail(DecodeErrorKind::TimeFormat);
    }

    Ok(Record {
        fields: fields.map(str::to_string),
    })
}
