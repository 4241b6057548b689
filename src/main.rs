//! scrollgrab
//!
//! Reads every line out of a scrolling text list on screen by capturing it
//! page by page, matching each glyph against a bitmap font, and writing the
//! records to CSV in chronological order.

mod analysis;
mod automation;
mod capture;
mod error;
mod logging;
mod ocr;
mod paths;

#[cfg(test)]
mod testutil;

use clap::{Parser, Subcommand};
use log::{error, info};
use std::path::{Path, PathBuf};
use std::process::ExitCode;

use crate::automation::{load_config, run_extraction, CancelToken};
use crate::error::ExtractError;

/// Extracts the contents of a scroll window by screen capture.
#[derive(Parser, Debug)]
#[command(name = "scrollgrab", version)]
#[command(about = "Extract every line of an on-screen scroll list to CSV")]
struct Cli {
    #[command(subcommand)]
    command: Option<Command>,

    /// Configuration file
    #[arg(short, long, default_value = paths::DEFAULT_CONFIG_FILE, global = true)]
    config: PathBuf,

    /// Directory that receives one session folder per run
    #[arg(short, long, default_value = paths::DEFAULT_OUTPUT_DIR, global = true)]
    output_dir: PathBuf,

    /// Log debug detail
    #[arg(short, long, global = true)]
    verbose: bool,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Run an extraction (the default)
    Extract,
    /// Compare an extracted file with the reference data
    Compare {
        #[arg(short, long)]
        reference: PathBuf,
        #[arg(short, long)]
        extracted: PathBuf,
    },
}

/// Exit code when a compared file cannot be read.
const COMPARE_UNREADABLE: u8 = 3;

fn main() -> ExitCode {
    let cli = Cli::parse();

    // Set up panic hook to log panics
    std::panic::set_hook(Box::new(|panic_info| {
        let msg = if let Some(s) = panic_info.payload().downcast_ref::<&str>() {
            s.to_string()
        } else if let Some(s) = panic_info.payload().downcast_ref::<String>() {
            s.clone()
        } else {
            "Unknown panic".to_string()
        };
        let location = panic_info
            .location()
            .map(|loc| format!(" at {}:{}:{}", loc.file(), loc.line(), loc.column()))
            .unwrap_or_default();
        error!("[PANIC]{} {}", location, msg);
        eprintln!("[PANIC]{} {}", location, msg);
    }));

    match cli.command {
        Some(Command::Compare {
            reference,
            extracted,
        }) => run_compare(cli.verbose, &reference, &extracted),
        Some(Command::Extract) | None => run_extract(&cli.config, &cli.output_dir, cli.verbose),
    }
}

fn run_compare(verbose: bool, reference: &Path, extracted: &Path) -> ExitCode {
    if let Err(e) = logging::init(verbose, None) {
        eprintln!("{:#}", e);
    }
    info!("Reference file: {}", reference.display());
    info!("Extracted file: {}", extracted.display());

    match analysis::compare_files(reference, extracted) {
        Ok(outcome) => {
            info!("{}", outcome);
            ExitCode::from(outcome.exit_code())
        }
        Err(e) => {
            error!("{:#}", e);
            ExitCode::from(COMPARE_UNREADABLE)
        }
    }
}

fn run_extract(config_path: &Path, output_dir: &Path, verbose: bool) -> ExitCode {
    let session_dir = match paths::create_session_dir(output_dir) {
        Ok(dir) => dir,
        Err(e) => {
            eprintln!("{:#}", e);
            return ExitCode::from(ExtractError::Output(e).exit_code());
        }
    };
    if let Err(e) = logging::init(verbose, Some(&session_dir)) {
        eprintln!("{:#}", e);
    }
    info!("Session folder: {}", session_dir.display());

    match extract(config_path, &session_dir) {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            error!("{}", e);
            ExitCode::from(e.exit_code())
        }
    }
}

fn extract(config_path: &Path, session_dir: &Path) -> Result<(), ExtractError> {
    let config = load_config(config_path)?;
    let library = ocr::load_library(&config.font_dir, &config.font_index, config.max_glyphs)?;

    let cancel = CancelToken::new();
    let handler_token = cancel.clone();
    ctrlc::set_handler(move || handler_token.cancel())
        .map_err(|e| ExtractError::Backend(anyhow::anyhow!("cannot install Ctrl-C handler: {}", e)))?;

    let screen = capture::open_screen().map_err(ExtractError::Backend)?;
    info!(
        "Starting extraction (Ctrl-C or move the pointer left of x={} to abort)",
        config.layout.abort_guard_x
    );

    let report = run_extraction(screen.as_ref(), &config, &library, session_dir, cancel)?;
    info!(
        "{} lines extracted to {}, last {} verified (see {})",
        report.lines,
        report.extracted_path.display(),
        report.verified,
        report.trailing_path.display()
    );
    info!("{} pages read in {:.1}s", report.stats.pages, report.stats.started.elapsed().as_secs_f64());
    Ok(())
}
