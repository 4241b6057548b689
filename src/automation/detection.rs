//! Settle detection helpers for the capture loops.
//!
//! The display gives no signal when it has finished redrawing, so stability
//! is inferred from repeated samples. All waiting is bounded by counts.

use crate::automation::config::{Point, StabilityConfig};
use crate::capture::Frame;

/// Extra delay after a completed page, chosen by how many partial redraws
/// have been seen.
///
/// Every `backoff_tier_size` partials above zero add one tier of
/// `backoff_step_ms`, capped at `backoff_max_tier`. From the second tier on,
/// each completed page also forgives one partial, so the delay decays once
/// redraws become clean again.
pub fn backoff_delay(partials: &mut u32, config: &StabilityConfig) -> u64 {
    if *partials == 0 || config.backoff_tier_size == 0 {
        return 0;
    }

    let tier = ((*partials - 1) / config.backoff_tier_size).min(config.backoff_max_tier);
    if tier >= 2 {
        *partials -= 1;
    }
    tier as u64 * config.backoff_step_ms
}

/// Takes `samples` further captures and reports whether all of them equal
/// `baseline`.
///
/// Every sample is taken even after a mismatch, so the time spent does not
/// depend on the outcome.
pub fn confirm_stable<E, F>(baseline: &[u8], samples: u32, mut next: F) -> Result<bool, E>
where
    F: FnMut() -> Result<Vec<u8>, E>,
{
    let mut identical = true;
    for _ in 0..samples {
        if next()? != baseline {
            identical = false;
        }
    }
    Ok(identical)
}

/// True when the probe pixel of a line capture is pure black.
pub fn probe_is_black(frame: &Frame, probe: Point) -> bool {
    if probe.x < 0 || probe.y < 0 {
        return false;
    }
    frame
        .pixel(probe.x as u32, probe.y as u32)
        .is_some_and(|p| p & 0x00FF_FFFF == 0)
}
