//! `notify`-backed vault watcher with a single dispatch thread.
//!
//! # Responsibility
//! - Subscribe to recursive filesystem events under the vault root.
//! - Forward created and moved-in files to a [`FileAppearedHandler`].
//!
//! # Invariants
//! - At most one dispatch thread exists per watcher.
//! - `stop` unsubscribes first, then joins the dispatch thread.
//! - Events already queued when `stop` is called are dropped; only the event
//!   being handled at that moment finishes.
//! - A rename is forwarded once, from its `To` side.

use super::dispatcher::{DispatchStats, FileAppearedHandler};
use log::{error, info, warn};
use notify::event::{CreateKind, ModifyKind, RenameMode};
use notify::{Config, Event, EventKind, RecommendedWatcher, RecursiveMode, Watcher};
use std::error::Error;
use std::fmt::{Display, Formatter};
use std::path::PathBuf;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::mpsc::{self, Receiver, Sender};
use std::sync::Arc;
use std::thread::JoinHandle;

const DISPATCH_THREAD_NAME: &str = "vaultmeta-watch";

/// Watcher lifecycle state.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WatcherState {
    Running,
    Stopped,
}

/// Watcher start failure.
#[derive(Debug)]
pub enum WatchError {
    /// `start` was called while already running.
    AlreadyRunning,
    /// Vault root is missing or not a directory.
    RootMissing(PathBuf),
    /// Filesystem notification backend failed.
    Backend(notify::Error),
    /// Dispatch thread could not be spawned.
    Spawn(std::io::Error),
}

impl Display for WatchError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::AlreadyRunning => write!(f, "watcher is already running"),
            Self::RootMissing(path) => {
                write!(f, "vault root is not a folder: `{}`", path.display())
            }
            Self::Backend(err) => write!(f, "filesystem watcher failed: {err}"),
            Self::Spawn(err) => write!(f, "failed to spawn dispatch thread: {err}"),
        }
    }
}

impl Error for WatchError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            Self::Backend(err) => Some(err),
            Self::Spawn(err) => Some(err),
            _ => None,
        }
    }
}

impl From<notify::Error> for WatchError {
    fn from(value: notify::Error) -> Self {
        Self::Backend(value)
    }
}

enum WatchMessage {
    Appeared(PathBuf),
    Stop,
}

/// Watches a vault root and hands appeared files to a handler.
pub struct VaultWatcher {
    root: PathBuf,
    backend: Option<RecommendedWatcher>,
    control: Option<Sender<WatchMessage>>,
    stopping: Arc<AtomicBool>,
    worker: Option<JoinHandle<DispatchStats>>,
}

impl VaultWatcher {
    /// Creates a stopped watcher for `root`.
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self {
            root: root.into(),
            backend: None,
            control: None,
            stopping: Arc::new(AtomicBool::new(false)),
            worker: None,
        }
    }

    /// Returns [`WatcherState::Running`] between a successful `start` and `stop`.
    pub fn state(&self) -> WatcherState {
        if self.worker.is_some() {
            WatcherState::Running
        } else {
            WatcherState::Stopped
        }
    }

    /// Subscribes to the vault root and starts dispatching to `handler`.
    ///
    /// # Errors
    /// - [`WatchError::AlreadyRunning`] when called twice without `stop`.
    /// - [`WatchError::RootMissing`] when the root is not a directory.
    /// - [`WatchError::Backend`] / [`WatchError::Spawn`] on setup failures;
    ///   the watcher stays stopped.
    pub fn start<H: FileAppearedHandler>(&mut self, handler: H) -> Result<(), WatchError> {
        if self.state() == WatcherState::Running {
            return Err(WatchError::AlreadyRunning);
        }
        if !self.root.is_dir() {
            error!(
                "event=watch_start module=watch status=error error_code=root_missing root={}",
                self.root.display()
            );
            return Err(WatchError::RootMissing(self.root.clone()));
        }

        let stopping = Arc::new(AtomicBool::new(false));
        let (tx, rx) = mpsc::channel::<WatchMessage>();
        let event_tx = tx.clone();
        let mut backend = RecommendedWatcher::new(
            move |res: notify::Result<Event>| match res {
                Ok(event) => {
                    for path in appeared_paths(&event) {
                        let _ = event_tx.send(WatchMessage::Appeared(path));
                    }
                }
                Err(err) => {
                    warn!("event=watch_event module=watch status=error error={}", err);
                }
            },
            Config::default(),
        )?;
        backend.watch(&self.root, RecursiveMode::Recursive)?;

        let worker_stopping = Arc::clone(&stopping);
        let worker = std::thread::Builder::new()
            .name(DISPATCH_THREAD_NAME.to_string())
            .spawn(move || dispatch_loop(rx, handler, &worker_stopping))
            .map_err(WatchError::Spawn)?;

        self.backend = Some(backend);
        self.control = Some(tx);
        self.stopping = stopping;
        self.worker = Some(worker);
        info!(
            "event=watch_start module=watch status=ok root={}",
            self.root.display()
        );
        Ok(())
    }

    /// Unsubscribes, stops the dispatch thread and returns its counters.
    ///
    /// Returns `None` when the watcher was not running.
    pub fn stop(&mut self) -> Option<DispatchStats> {
        let worker = self.worker.take()?;
        // Dropping the backend unsubscribes and releases its channel sender.
        self.backend = None;
        self.stopping.store(true, Ordering::SeqCst);
        // Wakes the dispatch thread when the queue is empty.
        if let Some(control) = self.control.take() {
            let _ = control.send(WatchMessage::Stop);
        }

        match worker.join() {
            Ok(stats) => {
                info!(
                    "event=watch_stop module=watch status=ok stamped={} ignored={} failed={}",
                    stats.stamped, stats.ignored, stats.failed
                );
                Some(stats)
            }
            Err(_) => {
                error!("event=watch_stop module=watch status=error error_code=dispatch_panicked");
                None
            }
        }
    }
}

impl Drop for VaultWatcher {
    fn drop(&mut self) {
        let _ = self.stop();
    }
}

/// Extracts the paths that newly appeared from one filesystem event.
///
/// Created files and rename destinations count; directories, removals and
/// content modifications do not. Backends that pair renames report the
/// destination as `To` and again as `Both`; only `To` is forwarded.
pub fn appeared_paths(event: &Event) -> Vec<PathBuf> {
    let candidates: Vec<&PathBuf> = match event.kind {
        EventKind::Create(CreateKind::Folder) => Vec::new(),
        EventKind::Create(_) => event.paths.iter().collect(),
        EventKind::Modify(ModifyKind::Name(RenameMode::To)) => event.paths.iter().collect(),
        // Backends that cannot pair renames report each side; keep the one
        // that exists now.
        EventKind::Modify(ModifyKind::Name(RenameMode::Any)) => {
            event.paths.iter().filter(|path| path.is_file()).collect()
        }
        _ => Vec::new(),
    };

    candidates
        .into_iter()
        .filter(|path| !path.is_dir())
        .cloned()
        .collect()
}

fn dispatch_loop<H: FileAppearedHandler>(
    rx: Receiver<WatchMessage>,
    mut handler: H,
    stopping: &AtomicBool,
) -> DispatchStats {
    let mut stats = DispatchStats::default();
    for message in rx {
        if stopping.load(Ordering::SeqCst) {
            break;
        }
        match message {
            WatchMessage::Appeared(path) => stats.record(handler.on_file_appeared(&path)),
            WatchMessage::Stop => break,
        }
    }
    stats
}

#[cfg(test)]
mod tests {
    use super::{appeared_paths, dispatch_loop, WatchMessage};
    use crate::watch::dispatcher::{DispatchOutcome, FileAppearedHandler};
    use notify::event::{CreateKind, ModifyKind, RemoveKind, RenameMode};
    use notify::{Event, EventKind};
    use std::path::{Path, PathBuf};
    use std::sync::atomic::AtomicBool;
    use std::sync::mpsc;
    use std::sync::{Arc, Mutex};

    struct Recorder(Arc<Mutex<Vec<PathBuf>>>);

    impl FileAppearedHandler for Recorder {
        fn on_file_appeared(&mut self, path: &Path) -> DispatchOutcome {
            self.0.lock().expect("recorder lock").push(path.to_path_buf());
            DispatchOutcome::Stamped
        }
    }

    fn event(kind: EventKind, paths: &[&str]) -> Event {
        paths
            .iter()
            .fold(Event::new(kind), |event, path| event.add_path(PathBuf::from(path)))
    }

    #[test]
    fn created_files_appear() {
        let paths = appeared_paths(&event(
            EventKind::Create(CreateKind::File),
            &["/nowhere/permanent/note.md"],
        ));
        assert_eq!(paths, vec![PathBuf::from("/nowhere/permanent/note.md")]);
    }

    #[test]
    fn rename_destination_appears_once() {
        // inotify reports one rename as `To` followed by `Both`.
        let events = [
            event(
                EventKind::Modify(ModifyKind::Name(RenameMode::From)),
                &["/nowhere/inbox/a.md"],
            ),
            event(
                EventKind::Modify(ModifyKind::Name(RenameMode::To)),
                &["/nowhere/permanent/a.md"],
            ),
            event(
                EventKind::Modify(ModifyKind::Name(RenameMode::Both)),
                &["/nowhere/inbox/a.md", "/nowhere/permanent/a.md"],
            ),
        ];
        let paths: Vec<PathBuf> = events.iter().flat_map(appeared_paths).collect();
        assert_eq!(paths, vec![PathBuf::from("/nowhere/permanent/a.md")]);
    }

    #[test]
    fn unpaired_rename_keeps_the_side_that_exists() {
        let dir = tempfile::tempdir().unwrap();
        let gone = dir.path().join("inbox.md");
        let present = dir.path().join("permanent.md");
        std::fs::write(&present, "body").unwrap();

        let mut unpaired = Event::new(EventKind::Modify(ModifyKind::Name(RenameMode::Any)));
        unpaired = unpaired.add_path(gone).add_path(present.clone());
        assert_eq!(appeared_paths(&unpaired), vec![present]);

        let folder = Event::new(EventKind::Modify(ModifyKind::Name(RenameMode::Any)))
            .add_path(dir.path().to_path_buf());
        assert!(appeared_paths(&folder).is_empty());
    }

    #[test]
    fn other_events_are_ignored() {
        for kind in [
            EventKind::Create(CreateKind::Folder),
            EventKind::Remove(RemoveKind::File),
            EventKind::Modify(ModifyKind::Name(RenameMode::From)),
            EventKind::Modify(ModifyKind::Name(RenameMode::Both)),
            EventKind::Modify(ModifyKind::Any),
        ] {
            assert!(appeared_paths(&event(kind, &["/nowhere/permanent/a.md"])).is_empty());
        }
    }

    #[test]
    fn dispatch_loop_handles_in_order_until_stop() {
        let seen = Arc::new(Mutex::new(Vec::new()));
        let (tx, rx) = mpsc::channel();
        tx.send(WatchMessage::Appeared(PathBuf::from("a.md"))).unwrap();
        tx.send(WatchMessage::Appeared(PathBuf::from("b.md"))).unwrap();
        tx.send(WatchMessage::Stop).unwrap();
        tx.send(WatchMessage::Appeared(PathBuf::from("late.md"))).unwrap();

        let stats = dispatch_loop(rx, Recorder(Arc::clone(&seen)), &AtomicBool::new(false));
        assert_eq!(stats.stamped, 2);
        assert_eq!(
            *seen.lock().unwrap(),
            vec![PathBuf::from("a.md"), PathBuf::from("b.md")]
        );
    }

    #[test]
    fn dispatch_loop_drops_events_queued_before_stop() {
        let seen = Arc::new(Mutex::new(Vec::new()));
        let (tx, rx) = mpsc::channel();
        tx.send(WatchMessage::Appeared(PathBuf::from("a.md"))).unwrap();
        tx.send(WatchMessage::Appeared(PathBuf::from("b.md"))).unwrap();
        tx.send(WatchMessage::Stop).unwrap();

        let stats = dispatch_loop(rx, Recorder(Arc::clone(&seen)), &AtomicBool::new(true));
        assert_eq!(stats.stamped, 0);
        assert!(seen.lock().unwrap().is_empty());
    }
}
