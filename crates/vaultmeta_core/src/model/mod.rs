//! Text-level note model.
//!
//! # Responsibility
//! - Detect and edit the leading frontmatter block of markdown notes.
//! - Stamp the body date header used by the vault watcher.
//!
//! # Invariants
//! - Functions here are pure: no filesystem access, no clock reads.

pub mod date_header;
pub mod frontmatter;
