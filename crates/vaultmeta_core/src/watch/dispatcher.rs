//! Handler seam between filesystem events and note stamping.

use crate::config::WatchConfig;
use crate::service::has_note_extension;
use crate::service::stamp_service::{Clock, StampOutcome, StampService};
use log::{debug, error, info};
use std::ffi::OsStr;
use std::path::Path;
use std::time::Duration;

/// Result of handling one appeared path.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DispatchOutcome {
    /// Path is outside the watched folder or not a note.
    Ignored,
    /// Note was stamped.
    Stamped,
    /// Handling failed; the error was logged.
    Failed,
}

/// Counters over every dispatched path.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct DispatchStats {
    pub ignored: usize,
    pub stamped: usize,
    pub failed: usize,
}

impl DispatchStats {
    /// Adds one outcome.
    pub fn record(&mut self, outcome: DispatchOutcome) {
        match outcome {
            DispatchOutcome::Ignored => self.ignored += 1,
            DispatchOutcome::Stamped => self.stamped += 1,
            DispatchOutcome::Failed => self.failed += 1,
        }
    }
}

/// Receives files that appeared in the vault (created or moved in).
///
/// Invoked from a single dispatch thread, one path at a time.
pub trait FileAppearedHandler: Send + 'static {
    fn on_file_appeared(&mut self, path: &Path) -> DispatchOutcome;
}

/// Stamps notes whose immediate parent folder has the configured name.
pub struct NoteDispatcher<C: Clock> {
    folder_name: String,
    debounce: Duration,
    stamper: StampService<C>,
}

impl<C: Clock> NoteDispatcher<C> {
    /// Creates a dispatcher for `config` using `stamper` for writes.
    pub fn new(config: &WatchConfig, stamper: StampService<C>) -> Self {
        Self {
            folder_name: config.folder_name.clone(),
            debounce: config.debounce,
            stamper,
        }
    }

    /// Returns whether `path` sits directly inside the watched folder.
    pub fn is_watched(&self, path: &Path) -> bool {
        path.parent()
            .and_then(Path::file_name)
            .is_some_and(|name| name == OsStr::new(&self.folder_name))
    }
}

impl<C: Clock + Send + 'static> FileAppearedHandler for NoteDispatcher<C> {
    fn on_file_appeared(&mut self, path: &Path) -> DispatchOutcome {
        if !self.is_watched(path) || !has_note_extension(path) {
            debug!(
                "event=watch_dispatch module=watch status=skip path={}",
                path.display()
            );
            return DispatchOutcome::Ignored;
        }

        info!(
            "event=watch_dispatch module=watch status=start folder={} path={}",
            self.folder_name,
            path.display()
        );
        // Give the editor time to finish writing the new file.
        if !self.debounce.is_zero() {
            std::thread::sleep(self.debounce);
        }

        match self.stamper.stamp_file(path) {
            Ok(StampOutcome::Stamped) => DispatchOutcome::Stamped,
            Ok(StampOutcome::Ignored) => DispatchOutcome::Ignored,
            Err(err) => {
                error!(
                    "event=watch_dispatch module=watch status=error path={} error={}",
                    path.display(),
                    err
                );
                DispatchOutcome::Failed
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::{DispatchOutcome, DispatchStats, NoteDispatcher};
    use crate::config::WatchConfig;
    use crate::service::stamp_service::{LocalClock, StampService};
    use std::path::Path;

    #[test]
    fn only_immediate_parent_name_counts() {
        let dispatcher = NoteDispatcher::new(
            &WatchConfig::new("/vault", "permanent"),
            StampService::new(LocalClock),
        );
        assert!(dispatcher.is_watched(Path::new("/vault/permanent/note.md")));
        assert!(!dispatcher.is_watched(Path::new("/vault/permanent/sub/note.md")));
        assert!(!dispatcher.is_watched(Path::new("/vault/inbox/note.md")));
        assert!(!dispatcher.is_watched(Path::new("note.md")));
    }

    #[test]
    fn stats_record_each_outcome() {
        let mut stats = DispatchStats::default();
        stats.record(DispatchOutcome::Stamped);
        stats.record(DispatchOutcome::Ignored);
        stats.record(DispatchOutcome::Ignored);
        stats.record(DispatchOutcome::Failed);
        assert_eq!(
            stats,
            DispatchStats {
                ignored: 2,
                stamped: 1,
                failed: 1
            }
        );
    }
}
