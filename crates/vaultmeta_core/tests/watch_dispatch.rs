use chrono::{NaiveDate, NaiveDateTime};
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;
use vaultmeta_core::{
    DispatchOutcome, FileAppearedHandler, FixedClock, NoteDispatcher, StampService, VaultWatcher,
    WatchConfig, WatchError, WatcherState,
};

const FOLDER: &str = "5-permanent";

fn stamped_at() -> NaiveDateTime {
    NaiveDate::from_ymd_opt(2025, 2, 3)
        .and_then(|date| date.and_hms_opt(8, 9, 59))
        .unwrap()
}

fn setup() -> (tempfile::TempDir, NoteDispatcher<FixedClock>) {
    let vault = tempfile::tempdir().unwrap();
    fs::create_dir_all(vault.path().join(FOLDER)).unwrap();
    fs::create_dir_all(vault.path().join("inbox")).unwrap();
    let mut config = WatchConfig::new(vault.path(), FOLDER);
    config.debounce = Duration::ZERO;
    let dispatcher = NoteDispatcher::new(&config, StampService::new(FixedClock(stamped_at())));
    (vault, dispatcher)
}

fn create(path: &Path, content: &str) -> PathBuf {
    fs::write(path, content).unwrap();
    path.to_path_buf()
}

#[test]
fn note_in_watched_folder_is_stamped_once() {
    let (vault, mut dispatcher) = setup();
    let note = create(&vault.path().join(FOLDER).join("note.md"), "an idea\n");

    assert_eq!(dispatcher.on_file_appeared(&note), DispatchOutcome::Stamped);
    assert_eq!(
        fs::read_to_string(&note).unwrap(),
        "---\npublish: true\n---\n#2025-02-03 08:09\n\nan idea\n"
    );
}

#[test]
fn restamping_refreshes_header_without_duplicating_it() {
    let (vault, mut dispatcher) = setup();
    let note = create(
        &vault.path().join(FOLDER).join("moved.md"),
        "---\ntitle: Moved\npublish: false\n---\n\n#2024-01-01 10:00\nkeep me\n",
    );

    assert_eq!(dispatcher.on_file_appeared(&note), DispatchOutcome::Stamped);
    assert_eq!(dispatcher.on_file_appeared(&note), DispatchOutcome::Stamped);
    assert_eq!(
        fs::read_to_string(&note).unwrap(),
        "---\ntitle: Moved\npublish: true\n---\n#2025-02-03 08:09\nkeep me\n"
    );
}

#[test]
fn note_in_other_folder_is_untouched() {
    let (vault, mut dispatcher) = setup();
    let inbox_note = create(&vault.path().join("inbox").join("note.md"), "inbox\n");
    let nested_dir = vault.path().join(FOLDER).join("sub");
    fs::create_dir_all(&nested_dir).unwrap();
    let nested_note = create(&nested_dir.join("note.md"), "nested\n");

    assert_eq!(dispatcher.on_file_appeared(&inbox_note), DispatchOutcome::Ignored);
    assert_eq!(dispatcher.on_file_appeared(&nested_note), DispatchOutcome::Ignored);
    assert_eq!(fs::read_to_string(&inbox_note).unwrap(), "inbox\n");
    assert_eq!(fs::read_to_string(&nested_note).unwrap(), "nested\n");
}

#[test]
fn non_notes_and_vanished_files_are_ignored() {
    let (vault, mut dispatcher) = setup();
    let image = create(&vault.path().join(FOLDER).join("cover.png"), "png");
    let vanished = vault.path().join(FOLDER).join("gone.md");

    assert_eq!(dispatcher.on_file_appeared(&image), DispatchOutcome::Ignored);
    assert_eq!(dispatcher.on_file_appeared(&vanished), DispatchOutcome::Ignored);
    assert_eq!(fs::read_to_string(&image).unwrap(), "png");
}

#[test]
fn invalid_frontmatter_fails_without_writing_and_dispatcher_keeps_working() {
    let (vault, mut dispatcher) = setup();
    let broken = create(
        &vault.path().join(FOLDER).join("broken.md"),
        "---\ntitle: [oops\n---\nbody\n",
    );
    let fine = create(&vault.path().join(FOLDER).join("fine.md"), "body\n");

    assert_eq!(dispatcher.on_file_appeared(&broken), DispatchOutcome::Failed);
    assert_eq!(
        fs::read_to_string(&broken).unwrap(),
        "---\ntitle: [oops\n---\nbody\n"
    );
    assert_eq!(dispatcher.on_file_appeared(&fine), DispatchOutcome::Stamped);
}

#[test]
fn watcher_lifecycle_start_and_stop() {
    let (vault, dispatcher) = setup();
    let mut watcher = VaultWatcher::new(vault.path());
    assert_eq!(watcher.state(), WatcherState::Stopped);
    assert!(watcher.stop().is_none());

    watcher.start(dispatcher).unwrap();
    assert_eq!(watcher.state(), WatcherState::Running);

    let (_, second) = setup();
    assert!(matches!(
        watcher.start(second),
        Err(WatchError::AlreadyRunning)
    ));

    let stats = watcher.stop().unwrap();
    assert_eq!(stats.failed, 0);
    assert_eq!(watcher.state(), WatcherState::Stopped);
}

#[test]
fn watcher_rejects_missing_root() {
    let (vault, dispatcher) = setup();
    let mut watcher = VaultWatcher::new(vault.path().join("missing"));
    assert!(matches!(
        watcher.start(dispatcher),
        Err(WatchError::RootMissing(_))
    ));
    assert_eq!(watcher.state(), WatcherState::Stopped);
}
