//! Capture stability state machine.
//!
//! The machine sequences through: Init → BulkPaging → SingleLineScroll →
//! TrailingVerification → Done. Each step first checks the cancellation
//! token and the pointer guard, and moves to Aborted when either is set.

use log::{debug, info, warn};
use std::fmt;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};

use crate::automation::config::{ExtractConfig, Point};
use crate::automation::coords::ScrollGeometry;
use crate::automation::detection::{backoff_delay, confirm_stable, probe_is_black};
use crate::automation::reconcile::OutputReconciler;
use crate::capture::screenshot::save_bgrx_png;
use crate::capture::{Frame, Rect, Screen};
use crate::error::{ExtractError, LineError};
use crate::ocr::pipeline::default_concurrency;
use crate::ocr::{
    decode_line, decode_page, CapturedPage, CharTally, DecodeOptions, GlyphLibrary, Record,
};

/// Cooperative cancellation flag shared with the Ctrl-C handler.
#[derive(Clone, Debug, Default)]
pub struct CancelToken(Arc<AtomicBool>);

impl CancelToken {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cancel(&self) {
        self.0.store(true, Ordering::SeqCst);
    }

    pub fn is_cancelled(&self) -> bool {
        self.0.load(Ordering::SeqCst)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExtractionState {
    /// Focus the list, scroll to the top, read the first page
    Init,
    /// Page down until the view stops changing
    BulkPaging,
    /// Scroll the remainder one line at a time
    SingleLineScroll,
    /// Re-read the last pages and compare with the output
    TrailingVerification,
    Done,
    Aborted,
}

impl fmt::Display for ExtractionState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ExtractionState::Init => write!(f, "Init"),
            ExtractionState::BulkPaging => write!(f, "Bulk paging"),
            ExtractionState::SingleLineScroll => write!(f, "Single-line scroll"),
            ExtractionState::TrailingVerification => write!(f, "Trailing verification"),
            ExtractionState::Done => write!(f, "Done"),
            ExtractionState::Aborted => write!(f, "Aborted"),
        }
    }
}

/// Counters reported at phase changes and at the end of a run.
#[derive(Debug, Clone)]
pub struct ExtractionStats {
    pub pages: u32,
    pub single_lines: u32,
    pub captures: u64,
    pub partial_updates: u64,
    /// Time spent in deliberate delays
    pub delay_ms: u64,
    pub started: Instant,
}

impl Default for ExtractionStats {
    fn default() -> Self {
        Self {
            pages: 0,
            single_lines: 0,
            captures: 0,
            partial_updates: 0,
            delay_ms: 0,
            started: Instant::now(),
        }
    }
}

impl fmt::Display for ExtractionStats {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} pages, {} single lines, {} captures, {} partial updates, {:.1}s delays in {:.1}s",
            self.pages,
            self.single_lines,
            self.captures,
            self.partial_updates,
            self.delay_ms as f64 / 1000.0,
            self.started.elapsed().as_secs_f64()
        )
    }
}

/// Extraction context holding state, collaborators and counters.
pub struct ExtractionContext<'a, S: Screen + ?Sized> {
    pub state: ExtractionState,
    screen: &'a S,
    config: &'a ExtractConfig,
    library: &'a GlyphLibrary,
    geometry: ScrollGeometry,
    options: DecodeOptions,
    workers: usize,
    cancel: CancelToken,
    session_dir: PathBuf,
    tally: Option<Mutex<CharTally>>,
    pub reconciler: OutputReconciler,
    /// Last page accepted as settled
    reference: Vec<u8>,
    same_count: u32,
    partial_count: u32,
    pub stats: ExtractionStats,
}

impl<'a, S: Screen + ?Sized> ExtractionContext<'a, S> {
    pub fn new(
        screen: &'a S,
        config: &'a ExtractConfig,
        library: &'a GlyphLibrary,
        geometry: ScrollGeometry,
        cancel: CancelToken,
        session_dir: &Path,
    ) -> Self {
        let options = DecodeOptions::new(&config.layout, library, config.prior_knowledge_speedup);
        let workers = config.decode_workers.unwrap_or_else(default_concurrency).max(1);
        debug!("Decoding with {} workers, options {:?}", workers, options);

        Self {
            state: ExtractionState::Init,
            screen,
            config,
            library,
            geometry,
            options,
            workers,
            cancel,
            session_dir: session_dir.to_path_buf(),
            tally: config
                .gather_character_counts
                .then(|| Mutex::new(CharTally::default())),
            reconciler: OutputReconciler::default(),
            reference: Vec::new(),
            same_count: 0,
            partial_count: 0,
            stats: ExtractionStats::default(),
        }
    }

    /// Advances the state machine by one step.
    ///
    /// Returns `Ok(true)` while there is more to do, `Ok(false)` once Done or
    /// Aborted. Errors are fatal for the run.
    pub fn step(&mut self) -> Result<bool, ExtractError> {
        if matches!(self.state, ExtractionState::Done | ExtractionState::Aborted) {
            return Ok(false);
        }

        // Check for abort before each step
        if self.abort_requested()? {
            info!("Abort requested during {}, stopping", self.state);
            self.state = ExtractionState::Aborted;
            return Ok(false);
        }

        match self.state {
            ExtractionState::Init => {
                self.prime()?;
                self.state = ExtractionState::BulkPaging;
                Ok(true)
            }
            ExtractionState::BulkPaging => {
                self.bulk_iteration()?;
                Ok(true)
            }
            ExtractionState::SingleLineScroll => {
                self.single_line_iteration()?;
                Ok(true)
            }
            ExtractionState::TrailingVerification => {
                self.verify_trailing()?;
                self.state = ExtractionState::Done;
                Ok(false)
            }
            ExtractionState::Done | ExtractionState::Aborted => Ok(false),
        }
    }

    /// Takes the frequency tally, if it was being gathered.
    pub fn take_tally(&mut self) -> Option<CharTally> {
        self.tally
            .take()
            .map(|t| t.into_inner().unwrap_or_else(|e| e.into_inner()))
    }

    fn abort_requested(&self) -> Result<bool, ExtractError> {
        if self.cancel.is_cancelled() {
            return Ok(true);
        }
        let (x, _) = self
            .screen
            .current_position()
            .map_err(ExtractError::Backend)?;
        Ok(x < self.config.layout.abort_guard_x)
    }

    /// Focuses the list, makes sure it is at the top, and decodes page one.
    fn prime(&mut self) -> Result<(), ExtractError> {
        info!("Selecting the list and scrolling to the top");
        self.click(self.geometry.select_click)?;
        self.click(self.geometry.line_up)?;
        self.pause(self.config.timing.scroll_to_top_ms);

        let page = self.capture_page()?;
        self.accept_page(page)?;

        info!("First page read, paging down");
        self.click(self.geometry.page_down)?;
        self.pause(self.config.timing.first_page_click_ms);
        Ok(())
    }

    /// One bulk paging sample.
    fn bulk_iteration(&mut self) -> Result<(), ExtractError> {
        let config = self.config;
        let (stability, timing) = (&config.stability, &config.timing);

        let current = self.capture_page()?;
        if current == self.reference {
            self.same_count += 1;
            if self.same_count > stability.bulk_settle_log_after {
                debug!("Page unchanged for {} samples", self.same_count);
            }
            if self.same_count > stability.bulk_settle_threshold {
                info!("Bulk paging finished: {}", self.stats);
                self.same_count = 0;
                self.state = ExtractionState::SingleLineScroll;
                return Ok(());
            }
        } else {
            self.pause(timing.restabilize_ms);
            let confirm = self.capture_page()?;
            if confirm == current {
                self.accept_page(current)?;
                self.same_count = 0;
                self.click(self.geometry.page_down)?;
                self.pause(timing.post_page_ms);
                let extra = backoff_delay(&mut self.partial_count, stability);
                self.pause(extra);
            } else {
                self.partial_count += 1;
                self.stats.partial_updates += 1;
                debug!(
                    "Partial redraw caught ({} pending, {} total)",
                    self.partial_count, self.stats.partial_updates
                );
            }
        }

        self.pause(timing.loop_delay_ms);
        Ok(())
    }

    /// One single-line scroll attempt.
    ///
    /// Once the last line is confirmed the page is captured again and kept as
    /// the reference, since the capture that noticed the scroll may have been
    /// taken mid-redraw.
    fn single_line_iteration(&mut self) -> Result<(), ExtractError> {
        let config = self.config;
        let (stability, timing) = (&config.stability, &config.timing);
        let target = self.geometry.line_down;

        // Only click again once the previous click has produced a line
        if self.same_count == 0 {
            self.click(target)?;
        } else {
            self.screen
                .move_to(target.x, target.y)
                .map_err(ExtractError::Backend)?;
        }
        self.pause(timing.line_click_ms);

        let current = self.capture_page()?;
        if current == self.reference {
            if self.same_count > stability.line_settle_threshold {
                info!("Single-line scrolling finished: {}", self.stats);
                self.same_count = 0;
                self.state = ExtractionState::TrailingVerification;
                return Ok(());
            }
            self.same_count += 1;
            return Ok(());
        }

        self.pause(timing.line_settle_ms);
        let rect = self.geometry.line_rect(self.geometry.lines_shown - 1);
        let first = self.capture(rect)?;
        let sample_ms = timing.line_sample_ms;
        let stable = confirm_stable(&first.data, stability.line_confirm_samples, || {
            self.pause(sample_ms);
            self.capture(rect).map(|f| f.data)
        })?;

        if !stable {
            self.same_count += 1;
            debug!("Last line still changing ({} unchanged samples)", self.same_count);
            return Ok(());
        }

        self.same_count = 0;
        self.reference = self.capture_page()?;
        self.stats.single_lines += 1;
        let grab = self.stats.pages + self.stats.single_lines;

        if probe_is_black(&first, self.config.layout.black_probe) {
            let image = self.save_diagnostic(&format!("capture_fault_{:05}.png", grab), &first);
            return Err(ExtractError::CaptureFault {
                reason: format!(
                    "line capture {} is black at ({}, {})",
                    grab, self.config.layout.black_probe.x, self.config.layout.black_probe.y
                ),
                image,
            });
        }

        let line = self.geometry.lines_shown - 1;
        let record = self
            .decode_single(&first)
            .map_err(|error| self.decode_error(grab, line, error, &first))?;
        debug!("Line {} read: {}", grab, record);
        self.reconciler.accept_line(record);
        Ok(())
    }

    /// Re-reads the last pages bottom-up and checks them against the output.
    ///
    /// Trailing pages are numbered on from the pages read while paging, so a
    /// decode error names a page no bulk page shares.
    fn verify_trailing(&mut self) -> Result<(), ExtractError> {
        let pages = self.config.trailing_pages.max(1);
        let lines_shown = self.geometry.lines_shown;
        let first_page = self.stats.pages + 1;
        info!("Re-reading the last {} page(s) for verification", pages);

        let mut sampled = Vec::with_capacity(pages as usize * lines_shown);
        for page in 0..pages {
            for line in (0..lines_shown).rev() {
                let frame = self.capture(self.geometry.line_rect(line))?;
                let record = self
                    .decode_single(&frame)
                    .map_err(|error| self.decode_error(first_page + page, line, error, &frame))?;
                sampled.push(record);
            }
            if page + 1 < pages {
                self.click(self.geometry.page_up)?;
                self.pause(self.config.timing.page_up_ms);
            }
        }

        self.reconciler.set_trailing(sampled);
        let checked = self.reconciler.verify_trailing()?;
        info!("All {} trailing lines match the extracted output", checked);
        Ok(())
    }

    /// Decodes a full page and appends it, or fails with the first bad line.
    fn accept_page(&mut self, pixels: Vec<u8>) -> Result<(), ExtractError> {
        let layout = &self.config.layout;
        let page = CapturedPage::new(pixels, layout.line_width, layout.line_height, layout.lines_shown)
            .ok_or_else(|| ExtractError::CaptureFault {
                reason: "page capture is smaller than the configured layout".to_string(),
                image: None,
            })?;
        self.stats.pages += 1;

        let session = decode_page(
            &page,
            self.library,
            &self.options,
            self.workers,
            self.tally.as_ref(),
        );

        if let Err(failure) = self.reconciler.accept_session(&session) {
            let line = Frame {
                width: page.width() as u32,
                height: page.line_height() as u32,
                data: page.line(failure.line_index).to_vec(),
            };
            return Err(self.decode_error(self.stats.pages, failure.line_index, failure.error, &line));
        }

        debug!(
            "Page {} accepted, {} lines so far",
            self.stats.pages,
            self.reconciler.len()
        );
        self.reference = page.into_pixels();
        Ok(())
    }

    fn decode_single(&self, frame: &Frame) -> Result<Record, LineError> {
        let layout = &self.config.layout;
        let (outcome, scan) = decode_line(
            &frame.data,
            layout.line_width,
            layout.line_height,
            self.library,
            &self.options,
        );
        if let Some(tally) = &self.tally {
            let mut tally = tally.lock().unwrap_or_else(|e| e.into_inner());
            tally.record_line(&scan.text, scan.ignored);
        }
        outcome
    }

    fn decode_error(&self, page: u32, line: usize, error: LineError, frame: &Frame) -> ExtractError {
        let image = self.save_diagnostic(&format!("decode_error_{:05}_{:02}.png", page, line), frame);
        ExtractError::Decode {
            page,
            line,
            error,
            image,
        }
    }

    fn save_diagnostic(&self, name: &str, frame: &Frame) -> Option<PathBuf> {
        let path = self.session_dir.join(name);
        match save_bgrx_png(&frame.data, frame.width, frame.height, &path) {
            Ok(()) => Some(path),
            Err(e) => {
                warn!("Could not save diagnostic image: {:#}", e);
                None
            }
        }
    }

    fn capture(&mut self, rect: Rect) -> Result<Frame, ExtractError> {
        self.stats.captures += 1;
        let frame = self
            .screen
            .capture_region(rect)
            .map_err(|e| ExtractError::CaptureFault {
                reason: format!("{:#}", e),
                image: None,
            })?;
        if frame.data.len() != Frame::expected_len(rect.width, rect.height) {
            return Err(ExtractError::CaptureFault {
                reason: format!(
                    "capture of {:?} returned {} bytes",
                    rect,
                    frame.data.len()
                ),
                image: None,
            });
        }
        Ok(frame)
    }

    fn capture_page(&mut self) -> Result<Vec<u8>, ExtractError> {
        Ok(self.capture(self.geometry.page)?.data)
    }

    fn click(&self, at: Point) -> Result<(), ExtractError> {
        self.screen
            .click_at(at.x, at.y)
            .map_err(ExtractError::Backend)
    }

    fn pause(&mut self, ms: u64) {
        if ms > 0 {
            std::thread::sleep(Duration::from_millis(ms));
            self.stats.delay_ms += ms;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testutil::{sample_row, synthetic_library, test_config, FakeScrollWindow};
    use tempfile::tempdir;

    fn rows(n: usize) -> Vec<String> {
        (0..n).map(sample_row).collect()
    }

    fn geometry(config: &ExtractConfig) -> ScrollGeometry {
        ScrollGeometry::new(Point::new(0, 0), config)
    }

    fn run_to_end<S: Screen + ?Sized>(ctx: &mut ExtractionContext<'_, S>) -> Result<(), ExtractError> {
        for _ in 0..10_000 {
            if !ctx.step()? {
                return Ok(());
            }
        }
        panic!("state machine did not finish");
    }

    fn chronological(ctx: &ExtractionContext<'_, FakeScrollWindow>) -> Vec<String> {
        ctx.reconciler.chronological().map(|r| r.to_string()).collect()
    }

    fn expected_chronological(rows: &[String]) -> Vec<String> {
        rows.iter()
            .rev()
            .map(|r| crate::ocr::extract::parse_record(r).unwrap().to_string())
            .collect()
    }

    #[test]
    fn test_state_display() {
        assert_eq!(format!("{}", ExtractionState::Init), "Init");
        assert_eq!(format!("{}", ExtractionState::BulkPaging), "Bulk paging");
        assert_eq!(format!("{}", ExtractionState::Aborted), "Aborted");
    }

    #[test]
    fn test_bulk_paging_needs_full_settle_threshold() {
        let dir = tempdir().unwrap();
        let config = test_config();
        let lib = synthetic_library();
        // Fits on one page, so every sample after the first page is identical
        let screen = FakeScrollWindow::new(&lib, &config, rows(6));
        let mut ctx =
            ExtractionContext::new(&screen, &config, &lib, geometry(&config), CancelToken::new(), dir.path());

        assert!(ctx.step().unwrap());
        assert_eq!(ctx.state, ExtractionState::BulkPaging);

        let threshold = config.stability.bulk_settle_threshold;
        for _ in 0..threshold {
            assert!(ctx.step().unwrap());
            assert_eq!(ctx.state, ExtractionState::BulkPaging);
        }
        assert!(ctx.step().unwrap());
        assert_eq!(ctx.state, ExtractionState::SingleLineScroll);
        assert_eq!(ctx.stats.pages, 1);
    }

    #[test]
    fn test_single_line_scroll_needs_full_settle_threshold() {
        let dir = tempdir().unwrap();
        let config = test_config();
        let lib = synthetic_library();
        let screen = FakeScrollWindow::new(&lib, &config, rows(6));
        let mut ctx =
            ExtractionContext::new(&screen, &config, &lib, geometry(&config), CancelToken::new(), dir.path());

        while ctx.state != ExtractionState::SingleLineScroll {
            assert!(ctx.step().unwrap());
        }

        // Nothing below the view, so every sample matches the reference
        let threshold = config.stability.line_settle_threshold;
        for _ in 0..=threshold {
            assert!(ctx.step().unwrap());
            assert_eq!(ctx.state, ExtractionState::SingleLineScroll);
        }
        assert!(ctx.step().unwrap());
        assert_eq!(ctx.state, ExtractionState::TrailingVerification);
        assert_eq!(ctx.stats.single_lines, 0);
    }

    #[test]
    fn test_torn_capture_is_not_kept_as_line_reference() {
        let dir = tempdir().unwrap();
        let config = test_config();
        let lib = synthetic_library();
        let data = rows(20);
        // The bottom lines settle first, so the last line is stable while
        // the page above it is still redrawing
        let screen = FakeScrollWindow::new(&lib, &config, data.clone())
            .with_torn_captures(2)
            .with_bottom_up_redraw();
        let mut ctx =
            ExtractionContext::new(&screen, &config, &lib, geometry(&config), CancelToken::new(), dir.path());

        run_to_end(&mut ctx).unwrap();

        assert_eq!(ctx.state, ExtractionState::Done);
        assert_eq!(chronological(&ctx), expected_chronological(&data));
        assert_eq!(ctx.stats.single_lines, 2);
    }

    #[test]
    fn test_full_run_extracts_every_line_once() {
        let dir = tempdir().unwrap();
        let config = test_config();
        let lib = synthetic_library();
        let data = rows(20);
        let screen = FakeScrollWindow::new(&lib, &config, data.clone());
        let mut ctx =
            ExtractionContext::new(&screen, &config, &lib, geometry(&config), CancelToken::new(), dir.path());

        run_to_end(&mut ctx).unwrap();

        assert_eq!(ctx.state, ExtractionState::Done);
        assert_eq!(chronological(&ctx), expected_chronological(&data));
        assert_eq!(ctx.reconciler.trailing().unwrap().len(), 12);
        assert_eq!(ctx.stats.pages, 3);
        assert_eq!(ctx.stats.single_lines, 2);
    }

    #[test]
    fn test_redraw_delays_are_ridden_out() {
        let dir = tempdir().unwrap();
        let config = test_config();
        let lib = synthetic_library();
        let data = rows(23);
        let screen = FakeScrollWindow::new(&lib, &config, data.clone())
            .with_stale_captures(2)
            .with_torn_captures(2);
        let mut ctx =
            ExtractionContext::new(&screen, &config, &lib, geometry(&config), CancelToken::new(), dir.path());

        run_to_end(&mut ctx).unwrap();

        assert_eq!(ctx.state, ExtractionState::Done);
        assert_eq!(chronological(&ctx), expected_chronological(&data));
        assert!(ctx.stats.partial_updates > 0);
    }

    #[test]
    fn test_page_up_drift_is_detected() {
        let dir = tempdir().unwrap();
        let config = test_config();
        let lib = synthetic_library();
        let screen = FakeScrollWindow::new(&lib, &config, rows(20)).with_page_up_step(5);
        let mut ctx =
            ExtractionContext::new(&screen, &config, &lib, geometry(&config), CancelToken::new(), dir.path());

        match run_to_end(&mut ctx) {
            Err(ExtractError::Drift { line, .. }) => assert_eq!(line, 7),
            other => panic!("expected drift, got {:?}", other),
        }
        assert_eq!(ctx.state, ExtractionState::TrailingVerification);
    }

    #[test]
    fn test_single_trailing_page_of_three_lines() {
        let dir = tempdir().unwrap();
        let mut config = test_config();
        config.layout.lines_shown = 3;
        config.trailing_pages = 1;
        let lib = synthetic_library();
        let data = rows(8);
        let screen = FakeScrollWindow::new(&lib, &config, data.clone());
        let mut ctx =
            ExtractionContext::new(&screen, &config, &lib, geometry(&config), CancelToken::new(), dir.path());

        run_to_end(&mut ctx).unwrap();

        let trailing: Vec<String> = ctx
            .reconciler
            .trailing()
            .unwrap()
            .iter()
            .map(|r| r.to_string())
            .collect();
        assert_eq!(trailing, expected_chronological(&data)[..3].to_vec());
    }

    #[test]
    fn test_black_line_is_capture_fault() {
        let dir = tempdir().unwrap();
        let config = test_config();
        let lib = synthetic_library();
        let screen = FakeScrollWindow::new(&lib, &config, rows(8)).with_black_lines();
        let mut ctx =
            ExtractionContext::new(&screen, &config, &lib, geometry(&config), CancelToken::new(), dir.path());

        match run_to_end(&mut ctx) {
            Err(ExtractError::CaptureFault { image, .. }) => {
                assert!(image.unwrap().exists());
            }
            other => panic!("expected capture fault, got {:?}", other),
        }
    }

    #[test]
    fn test_bad_line_stops_run_with_context() {
        let dir = tempdir().unwrap();
        let config = test_config();
        let lib = synthetic_library();
        let mut data = rows(20);
        data[9] = "12:00:00|1|2|3".to_string();
        let screen = FakeScrollWindow::new(&lib, &config, data);
        let mut ctx =
            ExtractionContext::new(&screen, &config, &lib, geometry(&config), CancelToken::new(), dir.path());

        match run_to_end(&mut ctx) {
            Err(ExtractError::Decode {
                page, line, error, image,
            }) => {
                assert_eq!(page, 2);
                assert_eq!(line, 3);
                assert_eq!(error.kind, crate::error::DecodeErrorKind::WrongFieldCount(4));
                assert!(image.unwrap().exists());
            }
            other => panic!("expected decode error, got {:?}", other),
        }
    }

    #[test]
    fn test_trailing_decode_error_numbers_page_after_bulk_pages() {
        let dir = tempdir().unwrap();
        let config = test_config();
        let lib = synthetic_library();
        // One page, no single lines, so only trailing line captures go black
        let screen = FakeScrollWindow::new(&lib, &config, rows(6)).with_black_lines();
        let mut ctx =
            ExtractionContext::new(&screen, &config, &lib, geometry(&config), CancelToken::new(), dir.path());

        match run_to_end(&mut ctx) {
            Err(ExtractError::Decode { page, line, image, .. }) => {
                assert_eq!(page, 2);
                assert_eq!(line, 5);
                assert_eq!(image, Some(dir.path().join("decode_error_00002_05.png")));
            }
            other => panic!("expected decode error, got {:?}", other),
        }
        assert_eq!(ctx.stats.pages, 1);
        assert_eq!(ctx.state, ExtractionState::TrailingVerification);
    }

    #[test]
    fn test_cancel_token_aborts() {
        let dir = tempdir().unwrap();
        let config = test_config();
        let lib = synthetic_library();
        let screen = FakeScrollWindow::new(&lib, &config, rows(20));
        let cancel = CancelToken::new();
        let mut ctx =
            ExtractionContext::new(&screen, &config, &lib, geometry(&config), cancel.clone(), dir.path());

        assert!(ctx.step().unwrap());
        cancel.cancel();
        assert!(!ctx.step().unwrap());
        assert_eq!(ctx.state, ExtractionState::Aborted);
        assert!(!ctx.step().unwrap());
    }

    #[test]
    fn test_pointer_guard_aborts() {
        let dir = tempdir().unwrap();
        let config = test_config();
        let lib = synthetic_library();
        let screen = FakeScrollWindow::new(&lib, &config, rows(20)).with_pointer_leaving_after(4);
        let mut ctx =
            ExtractionContext::new(&screen, &config, &lib, geometry(&config), CancelToken::new(), dir.path());

        run_to_end(&mut ctx).unwrap();
        assert_eq!(ctx.state, ExtractionState::Aborted);
        assert!(ctx.reconciler.trailing().is_none());
    }

    #[test]
    fn test_tally_is_gathered() {
        let dir = tempdir().unwrap();
        let config = test_config();
        let lib = synthetic_library();
        let screen = FakeScrollWindow::new(&lib, &config, rows(20));
        let mut ctx =
            ExtractionContext::new(&screen, &config, &lib, geometry(&config), CancelToken::new(), dir.path());

        run_to_end(&mut ctx).unwrap();

        let tally = ctx.take_tally().unwrap();
        // 20 extracted lines plus 12 trailing lines, four separators each
        assert_eq!(tally.count(b'|'), 4 * 32);
    }
}
