//! Core logic for vaultmeta: frontmatter publishing and note stamping.
//! This crate is the single source of truth for note metadata invariants.

pub mod config;
pub mod logging;
pub mod model;
pub mod service;
pub mod watch;

pub use config::{
    ConfigError, ConfigFile, LoggingSection, PublishConfig, PublishSection, WatchConfig,
    WatchSection,
};
pub use logging::{default_log_level, init_logging, logging_status};
pub use model::date_header::{format_date_header, stamp_date_header};
pub use model::frontmatter::{
    find_block, update_metadata, BlockSpan, MetadataEntry, MetadataError, MetadataOutcome,
    MetadataUpdate,
};
pub use service::publish_service::{
    FileError, FileReport, PublishError, PublishReport, PublishService,
};
pub use service::stamp_service::{
    stamp_note_text, Clock, FixedClock, LocalClock, StampError, StampOutcome, StampService,
};
pub use watch::{
    DispatchOutcome, DispatchStats, FileAppearedHandler, NoteDispatcher, VaultWatcher,
    WatchError, WatcherState,
};

/// Returns the core crate version.
pub fn core_version() -> &'static str {
    env!("CARGO_PKG_VERSION")
}
