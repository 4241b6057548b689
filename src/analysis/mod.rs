//! Offline checks of extracted output.
//!
//! This module provides:
//! - Line-by-line comparison of an extracted file with reference data

pub mod compare;

pub use compare::compare_files;
