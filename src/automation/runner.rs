//! Extraction runner - main entry point for one extraction run.
//!
//! Locates the scroll window, drives the state machine to completion, and
//! writes the output files. The pointer is put back where it started however
//! the run ends.

use log::{error, info, warn};
use std::path::{Path, PathBuf};
use std::thread;
use std::time::Duration;

use crate::automation::config::{ExtractConfig, Point};
use crate::automation::coords::ScrollGeometry;
use crate::automation::csv_writer::{write_records, EXTRACTED_FILE, TRAILING_FILE};
use crate::automation::state::{CancelToken, ExtractionContext, ExtractionState, ExtractionStats};
use crate::capture::{locate_window, Screen};
use crate::error::ExtractError;
use crate::ocr::library::PRIORITY_LIST;
use crate::ocr::{CharTally, GlyphLibrary};

/// Summary of a completed run.
#[derive(Debug)]
pub struct ExtractionReport {
    pub lines: usize,
    pub verified: usize,
    pub extracted_path: PathBuf,
    pub trailing_path: PathBuf,
    pub stats: ExtractionStats,
}

/// Runs one extraction against `screen`.
///
/// Output files go to `session_dir`. They are written whenever the trailing
/// sample was taken, so a drift can still be inspected.
pub fn run_extraction<S: Screen + ?Sized>(
    screen: &S,
    config: &ExtractConfig,
    library: &GlyphLibrary,
    session_dir: &Path,
    cancel: CancelToken,
) -> Result<ExtractionReport, ExtractError> {
    let home = screen.current_position().map_err(ExtractError::Backend)?;

    let result = extract_from_window(screen, config, library, session_dir, cancel);

    if let Err(e) = screen.move_to(home.0, home.1) {
        warn!("Could not restore the pointer to ({}, {}): {:#}", home.0, home.1, e);
    }
    result
}

fn extract_from_window<S: Screen + ?Sized>(
    screen: &S,
    config: &ExtractConfig,
    library: &GlyphLibrary,
    session_dir: &Path,
    cancel: CancelToken,
) -> Result<ExtractionReport, ExtractError> {
    let settle = config.timing.initial_settle_ms;
    if settle > 0 {
        info!("Waiting {}ms before looking for the scroll window", settle);
        thread::sleep(Duration::from_millis(settle));
    }

    let origin = locate_window(screen, &config.anchor_image, config.anchor_offset, session_dir)?;
    let geometry = ScrollGeometry::new(origin, config);
    check_guard(&geometry, config.layout.abort_guard_x);

    let mut ctx = ExtractionContext::new(screen, config, library, geometry, cancel, session_dir);

    // Run state machine until complete
    let outcome = loop {
        match ctx.step() {
            Ok(true) => {}
            Ok(false) => break Ok(()),
            Err(e) => break Err(e),
        }
    };

    if let Some(tally) = ctx.take_tally() {
        log_tally(&tally);
    }

    let extracted_path = session_dir.join(EXTRACTED_FILE);
    let trailing_path = session_dir.join(TRAILING_FILE);
    if let Some(trailing) = ctx.reconciler.trailing() {
        write_records(&trailing_path, trailing).map_err(ExtractError::Output)?;
        let lines = write_records(&extracted_path, ctx.reconciler.chronological())
            .map_err(ExtractError::Output)?;
        info!("Wrote {} lines to {}", lines, extracted_path.display());
    }

    match outcome {
        Err(e) => {
            error!("Extraction stopped in state {}: {}", ctx.state, e);
            info!("{}", ctx.stats);
            Err(e)
        }
        Ok(()) if ctx.state == ExtractionState::Aborted => {
            warn!("Extraction aborted after {} lines", ctx.reconciler.len());
            info!("{}", ctx.stats);
            Err(ExtractError::Aborted)
        }
        Ok(()) => {
            info!("Extraction complete: {}", ctx.stats);
            Ok(ExtractionReport {
                lines: ctx.reconciler.len(),
                verified: ctx.reconciler.trailing().map_or(0, |t| t.len()),
                extracted_path,
                trailing_path,
                stats: ctx.stats,
            })
        }
    }
}

/// Warns when a click target would itself trip the pointer guard.
fn check_guard(geometry: &ScrollGeometry, guard_x: i32) {
    let targets: [(&str, Point); 5] = [
        ("select", geometry.select_click),
        ("line up", geometry.line_up),
        ("page up", geometry.page_up),
        ("line down", geometry.line_down),
        ("page down", geometry.page_down),
    ];
    for (name, at) in targets {
        if at.x < guard_x {
            warn!(
                "The {} click at x={} is left of the abort guard at x={}",
                name, at.x, guard_x
            );
        }
    }
}

fn log_tally(tally: &CharTally) {
    let ranked = tally.ranked();
    if ranked.is_empty() {
        return;
    }

    info!("Character counts:");
    for (ch, count) in &ranked {
        info!("  {:?}: {}", ch, count);
    }

    let suggested = tally.suggested_priority();
    let current: String = PRIORITY_LIST
        .iter()
        .map(|&b| b as char)
        .filter(|c| suggested.contains(*c))
        .collect();
    if suggested == current {
        info!("Priority list matches the observed frequencies");
    } else {
        info!(
            "Observed frequencies suggest priority {:?} (current {:?})",
            suggested, current
        );
    }
}
