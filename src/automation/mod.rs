//! Extraction automation.
//!
//! This module provides:
//! - Configuration loading and window-relative geometry
//! - Settle detection for the capture loops
//! - The capture stability state machine and its runner
//! - Reconciliation of decoded lines and CSV output

pub mod config;
pub mod coords;
pub mod csv_writer;
pub mod detection;
pub mod reconcile;
pub mod runner;
pub mod state;

pub use config::load_config;
pub use runner::run_extraction;
pub use state::CancelToken;
