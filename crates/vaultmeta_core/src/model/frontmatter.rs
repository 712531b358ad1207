//! Frontmatter block detection and single-key metadata updates.
//!
//! # Responsibility
//! - Locate the leading `---` delimited block of a markdown note.
//! - Guarantee one `key: value` entry inside that block with minimal edits.
//!
//! # Invariants
//! - Text outside the block is never modified.
//! - Only the first block line matching the key is considered.
//! - The key is never searched for outside the block.
//! - A document without a well-formed block gets a fresh block in front of
//!   the untouched original text.

use regex::Regex;
use std::error::Error;
use std::fmt::{Display, Formatter};

/// Marker line that opens and closes a frontmatter block.
pub const FRONTMATTER_MARKER: &str = "---";

/// Byte offsets of a detected leading block inside its document.
///
/// All offsets index the original text and always fall on line boundaries.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BlockSpan {
    /// First byte after the opening marker line.
    pub content_start: usize,
    /// First byte of the closing marker line.
    pub content_end: usize,
    /// First byte after the closing marker line.
    pub body_start: usize,
}

impl BlockSpan {
    /// Returns the raw block content between the markers.
    pub fn content<'a>(&self, text: &'a str) -> &'a str {
        &text[self.content_start..self.content_end]
    }

    /// Returns the body that follows the closing marker.
    pub fn body<'a>(&self, text: &'a str) -> &'a str {
        &text[self.body_start..]
    }
}

/// Result kind of one metadata update.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MetadataOutcome {
    /// No block existed; a new one holding only the entry was prepended.
    Created,
    /// The key existed with another value and its line was rewritten.
    Updated,
    /// The block existed without the key; the entry was appended.
    Appended,
    /// The key already held the target value; text is unchanged.
    Skipped,
}

impl MetadataOutcome {
    /// Stable lowercase name used in logs and CLI output.
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Created => "created",
            Self::Updated => "updated",
            Self::Appended => "appended",
            Self::Skipped => "skipped",
        }
    }

    /// Returns whether the document text changed.
    pub fn is_write(self) -> bool {
        !matches!(self, Self::Skipped)
    }
}

impl Display for MetadataOutcome {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Updated document text plus what happened to it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MetadataUpdate {
    pub text: String,
    pub outcome: MetadataOutcome,
}

/// Rejected metadata entry.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MetadataError {
    /// Key is empty after trimming.
    EmptyKey,
    /// Key contains `:` or a line break.
    InvalidKey(String),
    /// Value contains a line break.
    InvalidValue(String),
}

impl Display for MetadataError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::EmptyKey => write!(f, "metadata key cannot be empty"),
            Self::InvalidKey(key) => {
                write!(f, "metadata key `{key}` must not contain `:` or line breaks")
            }
            Self::InvalidValue(value) => {
                write!(f, "metadata value `{value}` must not contain line breaks")
            }
        }
    }
}

impl Error for MetadataError {}

/// Checks that `key: value` can be written as a single frontmatter line.
pub fn validate_entry(key: &str, value: &str) -> Result<(), MetadataError> {
    let key = key.trim();
    if key.is_empty() {
        return Err(MetadataError::EmptyKey);
    }
    if key.contains([':', '\n', '\r']) {
        return Err(MetadataError::InvalidKey(key.to_string()));
    }
    if value.contains(['\n', '\r']) {
        return Err(MetadataError::InvalidValue(value.to_string()));
    }
    Ok(())
}

/// Finds the leading frontmatter block of `text`.
///
/// The opening marker must be the very first line. The closing marker is the
/// next line equal to `---`; it may end the file without a trailing newline.
/// Returns `None` for documents without an opening marker or whose opening
/// marker is never closed.
pub fn find_block(text: &str) -> Option<BlockSpan> {
    let opening_end = text.find('\n')?;
    if strip_cr(&text[..opening_end]) != FRONTMATTER_MARKER {
        return None;
    }

    let content_start = opening_end + 1;
    let mut cursor = content_start;
    loop {
        let line_end = text[cursor..].find('\n').map(|idx| cursor + idx);
        let line = &text[cursor..line_end.unwrap_or(text.len())];
        if strip_cr(line) == FRONTMATTER_MARKER {
            return Some(BlockSpan {
                content_start,
                content_end: cursor,
                body_start: line_end.map_or(text.len(), |end| end + 1),
            });
        }
        cursor = line_end? + 1;
    }
}

/// Validated `key: value` entry with its key-line pattern compiled once.
///
/// Build one per run and apply it to every document; [`update_metadata`] is
/// the one-shot form.
#[derive(Debug, Clone)]
pub struct MetadataEntry {
    key: String,
    value: String,
    key_line: Regex,
}

impl MetadataEntry {
    /// Validates `key`/`value` and compiles the key-line pattern.
    ///
    /// # Errors
    /// - Returns [`MetadataError`] when the entry cannot be written as one line.
    pub fn new(key: &str, value: &str) -> Result<Self, MetadataError> {
        validate_entry(key, value)?;
        let key = key.trim();
        let key_line = Regex::new(&format!(r"^\s*{}\s*:\s*(.*)$", regex::escape(key)))
            .map_err(|_| MetadataError::InvalidKey(key.to_string()))?;
        Ok(Self {
            key: key.to_string(),
            value: value.trim().to_string(),
            key_line,
        })
    }

    pub fn key(&self) -> &str {
        &self.key
    }

    pub fn value(&self) -> &str {
        &self.value
    }

    /// Ensures this entry is present in the leading block of `text`.
    ///
    /// The existing value is compared trimmed and case-insensitively, so
    /// `publish: TRUE` already satisfies `publish`/`true`. Applying an entry
    /// to its own output always yields [`MetadataOutcome::Skipped`].
    pub fn apply(&self, text: &str) -> MetadataUpdate {
        let entry = format!("{}: {}", self.key, self.value);

        let Some(span) = find_block(text) else {
            return MetadataUpdate {
                text: format!("{FRONTMATTER_MARKER}\n{entry}\n{FRONTMATTER_MARKER}\n{text}"),
                outcome: MetadataOutcome::Created,
            };
        };

        let target = self.value.to_lowercase();
        let mut offset = span.content_start;
        for line in span.content(text).split_inclusive('\n') {
            let (line_body, ending) = split_line_ending(line);
            if let Some(captures) = self.key_line.captures(line_body) {
                let current = captures.get(1).map_or("", |found| found.as_str());
                if current.trim().to_lowercase() == target {
                    return MetadataUpdate {
                        text: text.to_string(),
                        outcome: MetadataOutcome::Skipped,
                    };
                }
                return MetadataUpdate {
                    text: splice(text, offset, offset + line.len(), &format!("{entry}{ending}")),
                    outcome: MetadataOutcome::Updated,
                };
            }
            offset += line.len();
        }

        let ending = block_line_ending(text);
        MetadataUpdate {
            text: splice(
                text,
                span.content_end,
                span.content_end,
                &format!("{entry}{ending}"),
            ),
            outcome: MetadataOutcome::Appended,
        }
    }
}

/// Ensures `key: value` is present in the leading block of `text`.
///
/// # Errors
/// - Returns [`MetadataError`] when the entry cannot be written as one line.
pub fn update_metadata(
    text: &str,
    key: &str,
    value: &str,
) -> Result<MetadataUpdate, MetadataError> {
    Ok(MetadataEntry::new(key, value)?.apply(text))
}

fn splice(text: &str, start: usize, end: usize, replacement: &str) -> String {
    let mut out = String::with_capacity(text.len() - (end - start) + replacement.len());
    out.push_str(&text[..start]);
    out.push_str(replacement);
    out.push_str(&text[end..]);
    out
}

fn strip_cr(line: &str) -> &str {
    line.strip_suffix('\r').unwrap_or(line)
}

fn split_line_ending(line: &str) -> (&str, &str) {
    if let Some(stripped) = line.strip_suffix("\r\n") {
        (stripped, "\r\n")
    } else if let Some(stripped) = line.strip_suffix('\n') {
        (stripped, "\n")
    } else {
        (line, "")
    }
}

/// Line ending used by the opening marker, reused for inserted lines.
fn block_line_ending(text: &str) -> &'static str {
    if text.starts_with("---\r\n") {
        "\r\n"
    } else {
        "\n"
    }
}
