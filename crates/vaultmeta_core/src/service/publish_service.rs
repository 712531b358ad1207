//! Folder-wide metadata publishing.
//!
//! # Responsibility
//! - Discover every note under a target folder and apply one metadata entry.
//! - Take an optional mirrored backup before the first write.
//! - Isolate per-file failures and aggregate a run report.
//!
//! # Invariants
//! - A missing target folder aborts the run before any file is touched.
//! - A failed backup aborts the run before any note is written.
//! - Skipped notes are never rewritten.
//! - One failing note never stops the remaining notes.

use crate::config::PublishConfig;
use crate::model::frontmatter::{MetadataEntry, MetadataError, MetadataOutcome};
use crate::service::has_note_extension;
use chrono::{Local, NaiveDateTime};
use log::{error, info, warn};
use std::error::Error;
use std::fmt::{Display, Formatter};
use std::path::{Path, PathBuf};
use std::time::Instant;
use walkdir::WalkDir;

const BACKUP_DIR_PREFIX: &str = "backup_";
const BACKUP_TIMESTAMP_FORMAT: &str = "%Y%m%d_%H%M%S";

/// Run-level publish failure.
#[derive(Debug)]
pub enum PublishError {
    /// Target folder does not exist.
    TargetMissing(PathBuf),
    /// Target path exists but is not a directory.
    TargetNotDirectory(PathBuf),
    /// Backup could not be taken; no note was written.
    Backup {
        path: PathBuf,
        source: std::io::Error,
    },
    /// Metadata entry is invalid.
    Metadata(MetadataError),
}

impl Display for PublishError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::TargetMissing(path) => {
                write!(f, "target folder not found: `{}`", path.display())
            }
            Self::TargetNotDirectory(path) => {
                write!(f, "target is not a folder: `{}`", path.display())
            }
            Self::Backup { path, source } => {
                write!(f, "backup failed at `{}`: {source}", path.display())
            }
            Self::Metadata(err) => write!(f, "{err}"),
        }
    }
}

impl Error for PublishError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            Self::Backup { source, .. } => Some(source),
            Self::Metadata(err) => Some(err),
            _ => None,
        }
    }
}

impl From<MetadataError> for PublishError {
    fn from(value: MetadataError) -> Self {
        Self::Metadata(value)
    }
}

/// Failure while handling one note.
#[derive(Debug)]
pub enum FileError {
    /// Note could not be read (missing, permission, or not UTF-8).
    Read(std::io::Error),
    /// Updated note could not be written back.
    Write(std::io::Error),
}

impl Display for FileError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Read(err) => write!(f, "read failed: {err}"),
            Self::Write(err) => write!(f, "write failed: {err}"),
        }
    }
}

impl Error for FileError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            Self::Read(err) | Self::Write(err) => Some(err),
        }
    }
}

/// Result for one discovered note.
#[derive(Debug)]
pub struct FileReport {
    pub path: PathBuf,
    pub result: Result<MetadataOutcome, FileError>,
}

/// Aggregate result of one publish run.
#[derive(Debug, Default)]
pub struct PublishReport {
    /// Per-note results in processing order.
    pub files: Vec<FileReport>,
    /// Backup folder, when backups were enabled and notes existed.
    pub backup_dir: Option<PathBuf>,
}

impl PublishReport {
    /// Notes rewritten (created, updated or appended).
    pub fn processed(&self) -> usize {
        self.count(|result| matches!(result, Ok(outcome) if outcome.is_write()))
    }

    /// Notes that already held the target value.
    pub fn skipped(&self) -> usize {
        self.count(|result| matches!(result, Ok(MetadataOutcome::Skipped)))
    }

    /// Notes that failed.
    pub fn failed(&self) -> usize {
        self.count(Result::is_err)
    }

    /// Number of outcomes equal to `outcome`.
    pub fn count_outcome(&self, outcome: MetadataOutcome) -> usize {
        self.count(|result| matches!(result, Ok(found) if *found == outcome))
    }

    fn count(&self, predicate: impl Fn(&Result<MetadataOutcome, FileError>) -> bool) -> usize {
        self.files
            .iter()
            .filter(|report| predicate(&report.result))
            .count()
    }
}

/// Applies one metadata entry to every note under a folder.
pub struct PublishService {
    config: PublishConfig,
    entry: MetadataEntry,
}

impl PublishService {
    /// Creates a service after validating `config`.
    pub fn new(config: PublishConfig) -> Result<Self, PublishError> {
        let entry = MetadataEntry::new(&config.key, &config.value)?;
        Ok(Self { config, entry })
    }

    /// Returns the active configuration.
    pub fn config(&self) -> &PublishConfig {
        &self.config
    }

    /// Runs the publish pass without progress callbacks.
    pub fn run(&self) -> Result<PublishReport, PublishError> {
        self.run_with_progress(|_| {})
    }

    /// Runs the publish pass, calling `on_file` after each note.
    ///
    /// # Errors
    /// - Returns [`PublishError::TargetMissing`] or
    ///   [`PublishError::TargetNotDirectory`] before touching anything.
    /// - Returns [`PublishError::Backup`] when backups are enabled and a copy
    ///   fails; no note is written in that case.
    ///
    /// Per-note failures are reported in [`PublishReport::files`].
    pub fn run_with_progress(
        &self,
        mut on_file: impl FnMut(&FileReport),
    ) -> Result<PublishReport, PublishError> {
        let started_at = Instant::now();
        let target = self.config.target_dir.as_path();
        info!(
            "event=publish_run module=publish status=start target={} key={} value={} backup={}",
            target.display(),
            self.config.key,
            self.config.value,
            self.config.backup
        );
        ensure_target_dir(target)?;

        let notes = discover_notes(target);
        if notes.is_empty() {
            info!(
                "event=publish_run module=publish status=ok target={} files=0",
                target.display()
            );
            return Ok(PublishReport::default());
        }

        let mut report = PublishReport::default();
        if self.config.backup {
            let backup_dir = backup_dir_for(target, Local::now().naive_local());
            backup_notes(target, &notes, &backup_dir)?;
            report.backup_dir = Some(backup_dir);
        }

        for path in notes {
            let result = self.publish_file(&path);
            let file_report = FileReport { path, result };
            on_file(&file_report);
            report.files.push(file_report);
        }

        info!(
            "event=publish_run module=publish status=ok target={} files={} processed={} skipped={} failed={} duration_ms={}",
            target.display(),
            report.files.len(),
            report.processed(),
            report.skipped(),
            report.failed(),
            started_at.elapsed().as_millis()
        );
        Ok(report)
    }

    fn publish_file(&self, path: &Path) -> Result<MetadataOutcome, FileError> {
        let result = std::fs::read_to_string(path)
            .map_err(FileError::Read)
            .map(|text| self.entry.apply(&text))
            .and_then(|update| {
                if update.outcome.is_write() {
                    std::fs::write(path, &update.text).map_err(FileError::Write)?;
                }
                Ok(update.outcome)
            });

        match &result {
            Ok(outcome) => info!(
                "event=publish_file module=publish status=ok outcome={} path={}",
                outcome,
                path.display()
            ),
            Err(err) => error!(
                "event=publish_file module=publish status=error path={} error={}",
                path.display(),
                err
            ),
        }
        result
    }
}

/// Returns the backup folder used for a run started at `started_at`.
///
/// The folder is a sibling of `target`, named `backup_YYYYmmdd_HHMMSS`.
pub fn backup_dir_for(target: &Path, started_at: NaiveDateTime) -> PathBuf {
    let name = format!(
        "{BACKUP_DIR_PREFIX}{}",
        started_at.format(BACKUP_TIMESTAMP_FORMAT)
    );
    match target.parent() {
        Some(parent) => parent.join(name),
        None => target.join(name),
    }
}

/// Lists notes under `root` recursively, sorted by file name per directory.
///
/// Unreadable directory entries are logged and skipped.
pub fn discover_notes(root: &Path) -> Vec<PathBuf> {
    WalkDir::new(root)
        .sort_by_file_name()
        .into_iter()
        .filter_map(|entry| match entry {
            Ok(entry) => Some(entry),
            Err(err) => {
                warn!(
                    "event=publish_discover module=publish status=error error={}",
                    err
                );
                None
            }
        })
        .filter(|entry| entry.file_type().is_file() && has_note_extension(entry.path()))
        .map(|entry| entry.into_path())
        .collect()
}

fn ensure_target_dir(target: &Path) -> Result<(), PublishError> {
    if !target.exists() {
        error!(
            "event=publish_run module=publish status=error error_code=target_missing target={}",
            target.display()
        );
        return Err(PublishError::TargetMissing(target.to_path_buf()));
    }
    if !target.is_dir() {
        error!(
            "event=publish_run module=publish status=error error_code=target_not_dir target={}",
            target.display()
        );
        return Err(PublishError::TargetNotDirectory(target.to_path_buf()));
    }
    Ok(())
}

fn backup_notes(root: &Path, notes: &[PathBuf], backup_dir: &Path) -> Result<(), PublishError> {
    let backup_error = |path: &Path| {
        let path = path.to_path_buf();
        move |source: std::io::Error| PublishError::Backup { path, source }
    };

    std::fs::create_dir_all(backup_dir).map_err(backup_error(backup_dir))?;
    for note in notes {
        let relative = note.strip_prefix(root).unwrap_or(note.as_path());
        let destination = backup_dir.join(relative);
        if let Some(parent) = destination.parent() {
            std::fs::create_dir_all(parent).map_err(backup_error(parent))?;
        }
        std::fs::copy(note, &destination).map_err(backup_error(destination.as_path()))?;
    }

    info!(
        "event=publish_backup module=publish status=ok files={} backup_dir={}",
        notes.len(),
        backup_dir.display()
    );
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::backup_dir_for;
    use chrono::NaiveDate;
    use std::path::{Path, PathBuf};

    #[test]
    fn backup_dir_is_timestamped_sibling() {
        let started_at = NaiveDate::from_ymd_opt(2025, 1, 2)
            .and_then(|date| date.and_hms_opt(3, 4, 5))
            .expect("valid test timestamp");
        assert_eq!(
            backup_dir_for(Path::new("/vault/tags"), started_at),
            PathBuf::from("/vault/backup_20250102_030405")
        );
    }
}
