//! Vault watching: filesystem events to note stamping.
//!
//! # Responsibility
//! - Translate create/move events into "file appeared" calls.
//! - Dispatch appeared files one at a time to a handler.
//!
//! # Invariants
//! - Handlers never run concurrently with each other.
//! - A failing event never stops the watcher.

pub mod dispatcher;
pub mod vault_watcher;

pub use dispatcher::{DispatchOutcome, DispatchStats, FileAppearedHandler, NoteDispatcher};
pub use vault_watcher::{appeared_paths, VaultWatcher, WatchError, WatcherState};
