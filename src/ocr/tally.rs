//! Character frequency diagnostic.
//!
//! Counts how often each glyph is recognised so the priority list can be
//! checked against real data.

use super::engine::IGNORED_GLYPH;

/// Lines this short are not counted (blank or partial lines).
pub const MIN_COUNTED_LEN: usize = 16;

#[derive(Debug, Clone)]
pub struct CharTally {
    counts: [u64; 256],
}

impl Default for CharTally {
    fn default() -> Self {
        Self { counts: [0; 256] }
    }
}

impl CharTally {
    /// Adds one line's characters. Returns false when the line was too short
    /// to count.
    pub fn record_line(&mut self, text: &str, ignored: u32) -> bool {
        if text.len() < MIN_COUNTED_LEN {
            return false;
        }
        for b in text.bytes() {
            self.counts[b as usize] += 1;
        }
        self.counts[IGNORED_GLYPH as usize] += ignored as u64;
        true
    }

    pub fn merge(&mut self, other: &CharTally) {
        for (mine, theirs) in self.counts.iter_mut().zip(other.counts.iter()) {
            *mine += theirs;
        }
    }

    #[cfg(test)]
    pub fn count(&self, character: u8) -> u64 {
        self.counts[character as usize]
    }

    /// Non-zero counts, most frequent first. Ties keep byte order.
    pub fn ranked(&self) -> Vec<(char, u64)> {
        let mut ranked: Vec<(char, u64)> = self
            .counts
            .iter()
            .enumerate()
            .filter(|(_, n)| **n > 0)
            .map(|(b, n)| (b as u8 as char, *n))
            .collect();
        ranked.sort_by(|a, b| b.1.cmp(&a.1));
        ranked
    }

    /// Characters in the order the counts suggest they should be searched.
    pub fn suggested_priority(&self) -> String {
        self.ranked().into_iter().map(|(c, _)| c).collect()
    }
}
