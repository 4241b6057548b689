//! Bounded-concurrency page decoding.
//!
//! One task per line, at most `limit` running at a time, results collected
//! by line index. A session is only returned once every task has reported.

use std::sync::mpsc;
use std::sync::{Condvar, Mutex};
use std::thread;

use super::library::GlyphLibrary;
use super::tally::CharTally;
use super::{decode_line, DecodeOptions, LineOutcome};
use crate::error::LineError;

/// Worker count that leaves headroom for the capture thread.
pub fn default_concurrency() -> usize {
    let n = thread::available_parallelism().map_or(1, |n| n.get());
    if n >= 8 {
        n - 2
    } else if n >= 4 {
        n - 1
    } else {
        n
    }
}

/// One settled viewport. Lines are `line_height` rows of `width` B,G,R,X
/// pixels, stacked top to bottom.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CapturedPage {
    pixels: Vec<u8>,
    width: usize,
    line_height: usize,
    line_count: usize,
}

impl CapturedPage {
    /// Wraps a capture buffer. Returns `None` when the buffer is too small for
    /// the requested geometry.
    pub fn new(pixels: Vec<u8>, width: usize, line_height: usize, line_count: usize) -> Option<Self> {
        if pixels.len() < width * line_height * line_count * 4 {
            return None;
        }
        Some(Self {
            pixels,
            width,
            line_height,
            line_count,
        })
    }

    pub fn width(&self) -> usize {
        self.width
    }

    pub fn line_height(&self) -> usize {
        self.line_height
    }

    pub fn line_count(&self) -> usize {
        self.line_count
    }

    pub fn into_pixels(self) -> Vec<u8> {
        self.pixels
    }

    /// Raw bytes of line `index`.
    pub fn line(&self, index: usize) -> &[u8] {
        let stride = self.width * self.line_height * 4;
        &self.pixels[index * stride..(index + 1) * stride]
    }
}

/// Outcome for one line of a page.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LineResult {
    pub line_index: usize,
    pub outcome: LineOutcome,
}

/// Every line of one page, ordered by line index.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DecodeSession {
    results: Vec<LineResult>,
}

impl DecodeSession {
    pub fn results(&self) -> &[LineResult] {
        &self.results
    }

    #[cfg(test)]
    pub fn len(&self) -> usize {
        self.results.len()
    }

    /// First failing line, by index.
    pub fn first_error(&self) -> Option<(usize, &LineError)> {
        self.results
            .iter()
            .find_map(|r| r.outcome.as_ref().err().map(|e| (r.line_index, e)))
    }
}

/// Counting gate that admits at most `permits` holders at once.
pub struct AdmissionGate {
    available: Mutex<usize>,
    released: Condvar,
}

/// Held while a task runs. Dropping it readmits one waiter.
pub struct Permit<'a> {
    gate: &'a AdmissionGate,
}

impl AdmissionGate {
    pub fn new(permits: usize) -> Self {
        Self {
            available: Mutex::new(permits.max(1)),
            released: Condvar::new(),
        }
    }

    /// Blocks until a permit is free.
    pub fn acquire(&self) -> Permit<'_> {
        let mut available = self.available.lock().unwrap_or_else(|e| e.into_inner());
        while *available == 0 {
            available = self
                .released
                .wait(available)
                .unwrap_or_else(|e| e.into_inner());
        }
        *available -= 1;
        Permit { gate: self }
    }
}

impl Drop for Permit<'_> {
    fn drop(&mut self) {
        let mut available = self.gate.available.lock().unwrap_or_else(|e| e.into_inner());
        *available += 1;
        self.gate.released.notify_one();
    }
}

/// Decodes every line of `page` with the glyph matcher.
///
/// When `tally` is given, each successfully scanned line long enough to count
/// is merged into it under its lock.
pub fn decode_page(
    page: &CapturedPage,
    library: &GlyphLibrary,
    options: &DecodeOptions,
    limit: usize,
    tally: Option<&Mutex<CharTally>>,
) -> DecodeSession {
    decode_page_with(page, limit, |_, line| {
        let (outcome, scan) = decode_line(line, page.width(), page.line_height(), library, options);
        if let Some(tally) = tally {
            let mut local = CharTally::default();
            if local.record_line(&scan.text, scan.ignored) {
                let mut shared = tally.lock().unwrap_or_else(|e| e.into_inner());
                shared.merge(&local);
            }
        }
        outcome
    })
}

/// Runs `decode` once per line, at most `limit` at a time.
///
/// A failing line does not stop its siblings. Blocks until all lines have
/// reported.
pub fn decode_page_with<F>(page: &CapturedPage, limit: usize, decode: F) -> DecodeSession
where
    F: Fn(usize, &[u8]) -> LineOutcome + Sync,
{
    let gate = AdmissionGate::new(limit);
    let (tx, rx) = mpsc::channel();
    let decode = &decode;

    thread::scope(|scope| {
        for index in 0..page.line_count() {
            let permit = gate.acquire();
            let tx = tx.clone();
            let line = page.line(index);
            scope.spawn(move || {
                let outcome = decode(index, line);
                drop(permit);
                // The receiver outlives the scope
                let _ = tx.send(LineResult {
                    line_index: index,
                    outcome,
                });
            });
        }
    });
    drop(tx);

    let mut results: Vec<LineResult> = rx.into_iter().collect();
    results.sort_by_key(|r| r.line_index);
    debug_assert_eq!(results.len(), page.line_count());

    DecodeSession { results }
}
