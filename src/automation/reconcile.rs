//! Accumulation of decoded lines and the trailing drift check.
//!
//! Lines arrive newest-first, the way the scroll window shows them. Output is
//! the reverse. The trailing pages, sampled bottom-up after scrolling ends,
//! must equal the start of that chronological output line for line.

use crate::error::{ExtractError, LineError};
use crate::ocr::{DecodeSession, Record};

/// A page that could not be accepted.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LineFailure {
    pub line_index: usize,
    pub error: LineError,
}

#[derive(Debug, Default)]
pub struct OutputReconciler {
    captured: Vec<Record>,
    trailing: Option<Vec<Record>>,
}

impl OutputReconciler {
    /// Appends every line of a session, or nothing if any line failed.
    pub fn accept_session(&mut self, session: &DecodeSession) -> Result<usize, LineFailure> {
        if let Some((line_index, error)) = session.first_error() {
            return Err(LineFailure {
                line_index,
                error: error.clone(),
            });
        }

        let before = self.captured.len();
        self.captured.extend(
            session
                .results()
                .iter()
                .filter_map(|r| r.outcome.as_ref().ok().cloned()),
        );
        Ok(self.captured.len() - before)
    }

    pub fn accept_line(&mut self, record: Record) {
        self.captured.push(record);
    }

    pub fn len(&self) -> usize {
        self.captured.len()
    }

    /// Lines in capture order.
    #[cfg(test)]
    pub fn captured(&self) -> &[Record] {
        &self.captured
    }

    /// Lines oldest first.
    pub fn chronological(&self) -> impl Iterator<Item = &Record> {
        self.captured.iter().rev()
    }

    pub fn set_trailing(&mut self, sampled: Vec<Record>) {
        self.trailing = Some(sampled);
    }

    /// Trailing lines in sampling order, once sampled.
    pub fn trailing(&self) -> Option<&[Record]> {
        self.trailing.as_deref()
    }

    /// Compares the trailing sample with the chronological output.
    ///
    /// Returns the number of lines checked. The first mismatch, or a sample
    /// longer than the output, is a drift error.
    pub fn verify_trailing(&self) -> Result<usize, ExtractError> {
        let Some(sampled) = self.trailing.as_deref() else {
            return Ok(0);
        };

        let mut accumulated = self.chronological();
        for (i, expected) in sampled.iter().enumerate() {
            match accumulated.next() {
                Some(found) if found == expected => {}
                other => {
                    return Err(ExtractError::Drift {
                        line: i + 1,
                        sampled: expected.to_string(),
                        accumulated: other.map_or_else(|| "<missing>".to_string(), |r| r.to_string()),
                    });
                }
            }
        }
        Ok(sampled.len())
    }
}
