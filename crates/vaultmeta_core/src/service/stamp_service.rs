//! Publish-flag and date-header stamping for single notes.
//!
//! # Responsibility
//! - Rewrite the frontmatter of one note as a YAML mapping with
//!   `publish: true`.
//! - Refresh or prepend the body date header using an injected clock.
//!
//! # Invariants
//! - Existing frontmatter keys keep their order; `publish` is set in place
//!   or appended last.
//! - Non-note paths and vanished files are ignored, never errors.

use crate::model::date_header::stamp_date_header;
use crate::model::frontmatter::{find_block, FRONTMATTER_MARKER};
use crate::service::has_note_extension;
use chrono::{Local, NaiveDateTime};
use log::{debug, info};
use serde_yaml::{Mapping, Value};
use std::error::Error;
use std::fmt::{Display, Formatter};
use std::path::{Path, PathBuf};

/// Frontmatter key forced to `true` by the stamper.
pub const PUBLISH_KEY: &str = "publish";

/// Source of the current local time.
pub trait Clock {
    /// Returns the current wall-clock time without timezone.
    fn now(&self) -> NaiveDateTime;
}

/// Clock backed by the system local time.
#[derive(Debug, Clone, Copy, Default)]
pub struct LocalClock;

impl Clock for LocalClock {
    fn now(&self) -> NaiveDateTime {
        Local::now().naive_local()
    }
}

/// Clock that always returns the same instant.
#[derive(Debug, Clone, Copy)]
pub struct FixedClock(pub NaiveDateTime);

impl Clock for FixedClock {
    fn now(&self) -> NaiveDateTime {
        self.0
    }
}

/// Stamping failure for one note.
#[derive(Debug)]
pub enum StampError {
    /// Reading or writing the note failed.
    Io {
        path: PathBuf,
        source: std::io::Error,
    },
    /// Frontmatter is not valid YAML.
    InvalidYaml(serde_yaml::Error),
    /// Frontmatter parsed to something other than a mapping.
    NotMapping(&'static str),
}

impl Display for StampError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Io { path, source } => write!(f, "{}: {source}", path.display()),
            Self::InvalidYaml(err) => write!(f, "invalid frontmatter yaml: {err}"),
            Self::NotMapping(kind) => {
                write!(f, "frontmatter must be a mapping, found {kind}")
            }
        }
    }
}

impl Error for StampError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            Self::Io { source, .. } => Some(source),
            Self::InvalidYaml(err) => Some(err),
            Self::NotMapping(_) => None,
        }
    }
}

impl From<serde_yaml::Error> for StampError {
    fn from(value: serde_yaml::Error) -> Self {
        Self::InvalidYaml(value)
    }
}

/// What happened to one path handed to the stamper.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StampOutcome {
    /// The note was rewritten.
    Stamped,
    /// The path is not an existing note file.
    Ignored,
}

/// Stamps notes on disk with `publish: true` and a fresh date header.
pub struct StampService<C: Clock> {
    clock: C,
}

impl<C: Clock> StampService<C> {
    /// Creates a stamper reading time from `clock`.
    pub fn new(clock: C) -> Self {
        Self { clock }
    }

    /// Stamps the note at `path` in place.
    ///
    /// # Errors
    /// - Returns [`StampError::Io`] when the note cannot be read or written.
    /// - Returns a YAML error when the existing frontmatter cannot be parsed
    ///   as a mapping; the file is left untouched.
    pub fn stamp_file(&self, path: &Path) -> Result<StampOutcome, StampError> {
        if !path.is_file() || !has_note_extension(path) {
            debug!(
                "event=note_stamp module=stamp status=skip reason=not_a_note path={}",
                path.display()
            );
            return Ok(StampOutcome::Ignored);
        }

        info!(
            "event=note_stamp module=stamp status=start path={}",
            path.display()
        );
        let text = std::fs::read_to_string(path).map_err(|source| StampError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        let stamped = stamp_note_text(&text, self.clock.now())?;
        std::fs::write(path, stamped).map_err(|source| StampError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        info!(
            "event=note_stamp module=stamp status=ok path={}",
            path.display()
        );
        Ok(StampOutcome::Stamped)
    }
}

/// Returns `text` with `publish: true` in a re-serialized frontmatter mapping
/// and the body date header set to `now`.
pub fn stamp_note_text(text: &str, now: NaiveDateTime) -> Result<String, StampError> {
    let (mut mapping, body) = match find_block(text) {
        Some(span) => (parse_mapping(span.content(text))?, span.body(text)),
        None => (Mapping::new(), text),
    };
    mapping.insert(Value::String(PUBLISH_KEY.to_string()), Value::Bool(true));
    let yaml = serde_yaml::to_string(&mapping)?;
    let body = stamp_date_header(body, now);
    Ok(format!(
        "{FRONTMATTER_MARKER}\n{yaml}{FRONTMATTER_MARKER}\n{body}"
    ))
}

fn parse_mapping(content: &str) -> Result<Mapping, StampError> {
    if content.trim().is_empty() {
        return Ok(Mapping::new());
    }
    match serde_yaml::from_str::<Value>(content)? {
        Value::Mapping(mapping) => Ok(mapping),
        Value::Null => Ok(Mapping::new()),
        Value::Bool(_) => Err(StampError::NotMapping("a boolean")),
        Value::Number(_) => Err(StampError::NotMapping("a number")),
        Value::String(_) => Err(StampError::NotMapping("a string")),
        Value::Sequence(_) => Err(StampError::NotMapping("a sequence")),
        Value::Tagged(_) => Err(StampError::NotMapping("a tagged value")),
    }
}

#[cfg(test)]
mod tests {
    use super::{stamp_note_text, StampError};
    use chrono::{NaiveDate, NaiveDateTime};

    fn now() -> NaiveDateTime {
        NaiveDate::from_ymd_opt(2025, 6, 1)
            .and_then(|date| date.and_hms_opt(14, 7, 0))
            .expect("valid test timestamp")
    }

    #[test]
    fn note_without_frontmatter_gets_block_and_header() {
        let stamped = stamp_note_text("idea body\n", now()).unwrap();
        assert_eq!(
            stamped,
            "---\npublish: true\n---\n#2025-06-01 14:07\n\nidea body\n"
        );
    }

    #[test]
    fn existing_keys_keep_order_and_publish_is_forced() {
        let text = "---\ntitle: Idea\npublish: false\nsource: web\n---\n#2024-01-01 10:00\nbody\n";
        let stamped = stamp_note_text(text, now()).unwrap();
        assert_eq!(
            stamped,
            "---\ntitle: Idea\npublish: true\nsource: web\n---\n#2025-06-01 14:07\nbody\n"
        );
    }

    #[test]
    fn publish_is_appended_after_existing_keys() {
        let stamped = stamp_note_text("---\ntitle: Idea\n---\nbody", now()).unwrap();
        assert!(stamped.starts_with("---\ntitle: Idea\npublish: true\n---\n"));
    }

    #[test]
    fn empty_block_is_treated_as_empty_mapping() {
        let stamped = stamp_note_text("---\n---\n\nbody", now()).unwrap();
        assert_eq!(stamped, "---\npublish: true\n---\n#2025-06-01 14:07\n\nbody");
    }

    #[test]
    fn scalar_frontmatter_is_rejected() {
        let err = stamp_note_text("---\njust text\n---\nbody", now())
            .expect_err("scalar frontmatter must fail");
        assert!(matches!(err, StampError::NotMapping("a string")));
    }

    #[test]
    fn broken_yaml_is_rejected() {
        let err = stamp_note_text("---\ntitle: [unclosed\n---\nbody", now())
            .expect_err("broken yaml must fail");
        assert!(matches!(err, StampError::InvalidYaml(_)));
    }
}
