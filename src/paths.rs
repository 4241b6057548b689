use anyhow::{Context, Result};
use chrono::{DateTime, Local};
use std::path::{Path, PathBuf};

/// Default root for session directories.
pub const DEFAULT_OUTPUT_DIR: &str = "output";

/// Default configuration file.
pub const DEFAULT_CONFIG_FILE: &str = "configuration/config.json";

/// Session directory name for a run started at `started`: `YYYYMMDD_HHMMSS`.
pub fn session_dir_name(started: &DateTime<Local>) -> String {
    started.format("%Y%m%d_%H%M%S").to_string()
}

/// Creates `<output_root>/YYYYMMDD_HHMMSS/` for a run starting now.
pub fn create_session_dir(output_root: &Path) -> Result<PathBuf> {
    let session_dir = output_root.join(session_dir_name(&Local::now()));
    std::fs::create_dir_all(&session_dir)
        .with_context(|| format!("Failed to create session directory {}", session_dir.display()))?;
    Ok(session_dir)
}
