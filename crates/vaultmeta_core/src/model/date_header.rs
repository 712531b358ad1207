//! Leading `#YYYY-MM-DD HH:MM` date header of a note body.
//!
//! # Invariants
//! - At most one line is rewritten, and only the first line of the
//!   left-trimmed body.
//! - The header has no space between `#` and the date.

use chrono::NaiveDateTime;
use once_cell::sync::Lazy;
use regex::Regex;

/// `strftime` layout of the generated header, minute precision.
pub const DATE_HEADER_FORMAT: &str = "%Y-%m-%d %H:%M";

static DATE_HEADER_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^#[0-9]{4}-[0-9]{2}-[0-9]{2}").expect("valid date header regex"));

/// Renders the header line for `now`, e.g. `#2024-01-01 10:00`.
pub fn format_date_header(now: NaiveDateTime) -> String {
    format!("#{}", now.format(DATE_HEADER_FORMAT))
}

/// Returns whether `line` is an existing date header.
pub fn is_date_header(line: &str) -> bool {
    DATE_HEADER_RE.is_match(line)
}

/// Replaces or prepends the date header of `body`.
///
/// Leading whitespace of `body` is dropped. When the first remaining line is
/// a date header it is replaced by the header for `now`; otherwise the new
/// header and one blank line are put in front.
pub fn stamp_date_header(body: &str, now: NaiveDateTime) -> String {
    let header = format_date_header(now);
    let trimmed = body.trim_start();
    let first_line_end = trimmed.find('\n').unwrap_or(trimmed.len());
    let first_line = trimmed[..first_line_end]
        .strip_suffix('\r')
        .unwrap_or(&trimmed[..first_line_end]);

    if is_date_header(first_line) {
        let rest = &trimmed[first_line.len()..];
        format!("{header}{rest}")
    } else {
        format!("{header}\n\n{trimmed}")
    }
}
