//! Log output: timestamped lines on stderr, mirrored into the session log.

use anyhow::{Context, Result};
use chrono::Local;
use env_logger::{Builder, Env, Target};
use log::Level;
use std::fs::{File, OpenOptions};
use std::io::{self, Write};
use std::path::Path;

/// Session log file name.
pub const SESSION_LOG: &str = "session.log";

/// Writes every line to stderr and, when open, to the session log.
struct TeeWriter {
    file: Option<File>,
}

impl Write for TeeWriter {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        io::stderr().write_all(buf)?;
        if let Some(file) = &mut self.file {
            // A failing log file must not stop the run
            let _ = file.write_all(buf);
        }
        Ok(buf.len())
    }

    fn flush(&mut self) -> io::Result<()> {
        io::stderr().flush()?;
        if let Some(file) = &mut self.file {
            let _ = file.flush();
        }
        Ok(())
    }
}

fn open_session_log(path: &Path) -> Result<File> {
    OpenOptions::new()
        .create(true)
        .append(true)
        .open(path)
        .with_context(|| format!("Failed to open log file {}", path.display()))
}

/// Installs the global logger.
///
/// `RUST_LOG` takes precedence over the default level (`info`, or `debug`
/// with `verbose`).
pub fn init(verbose: bool, session_dir: Option<&Path>) -> Result<()> {
    let default_level = if verbose { "debug" } else { "info" };
    let file = session_dir
        .map(|dir| open_session_log(&dir.join(SESSION_LOG)))
        .transpose()?;

    Builder::from_env(Env::default().default_filter_or(default_level))
        .format(|buf, record| {
            let stamp = Local::now().format("%H:%M:%S%.3f");
            match record.level() {
                Level::Error | Level::Warn => {
                    writeln!(buf, "[{}] {}: {}", stamp, record.level(), record.args())
                }
                _ => writeln!(buf, "[{}] {}", stamp, record.args()),
            }
        })
        .target(Target::Pipe(Box::new(TeeWriter { file })))
        .try_init()
        .context("Logger already initialised")
}
