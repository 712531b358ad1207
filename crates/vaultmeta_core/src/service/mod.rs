//! Filesystem-facing use-case services.
//!
//! # Responsibility
//! - Drive the pure `model` functions over notes on disk.
//! - Own per-file error isolation and progress logging.

pub mod publish_service;
pub mod stamp_service;

use std::path::Path;

/// Extension of notes handled by every service, matched case-insensitively.
pub const NOTE_EXTENSION: &str = "md";

/// Returns whether `path` carries the note extension.
pub fn has_note_extension(path: &Path) -> bool {
    path.extension()
        .and_then(|ext| ext.to_str())
        .is_some_and(|ext| ext.eq_ignore_ascii_case(NOTE_EXTENSION))
}
