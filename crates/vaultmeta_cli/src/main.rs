//! `vaultmeta` command-line entry point.
//!
//! # Responsibility
//! - Resolve settings from flags, an optional YAML config file and defaults.
//! - Print human-readable progress and summaries for publish runs.
//! - Run the vault watcher until Ctrl-C.

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use std::path::PathBuf;
use vaultmeta_core::{
    default_log_level, init_logging, ConfigFile, FileReport, LocalClock, NoteDispatcher,
    PublishConfig, PublishReport, PublishSection, PublishService, StampService, VaultWatcher,
    WatchConfig, WatchSection,
};

const RULE_WIDTH: usize = 60;

#[derive(Parser)]
#[command(name = "vaultmeta", version = vaultmeta_core::core_version())]
#[command(about = "Publish flags and date headers for markdown note vaults")]
struct Cli {
    /// YAML config file with `publish`, `watch` and `logging` sections
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// Log level: trace|debug|info|warn|error
    #[arg(long, global = true)]
    log_level: Option<String>,

    /// Absolute directory for rolling log files
    #[arg(long, global = true)]
    log_dir: Option<String>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Ensure a frontmatter entry in every note under a folder
    Publish {
        /// Folder whose notes are updated recursively
        target: Option<PathBuf>,

        /// Frontmatter key (default: publish)
        #[arg(long)]
        key: Option<String>,

        /// Frontmatter value (default: true)
        #[arg(long)]
        value: Option<String>,

        /// Copy notes to a timestamped sibling folder before writing
        #[arg(long)]
        backup: bool,
    },

    /// Stamp notes created or moved into a folder of the vault
    Watch {
        /// Vault root observed recursively
        vault: Option<PathBuf>,

        /// Name of the folder whose new notes are stamped
        #[arg(long)]
        folder: Option<String>,

        /// Delay before touching a new note, in milliseconds
        #[arg(long)]
        debounce_ms: Option<u64>,
    },
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    let file = match &cli.config {
        Some(path) => ConfigFile::load(path)?,
        None => ConfigFile::default(),
    };

    let level = cli
        .log_level
        .or(file.logging.level.clone())
        .unwrap_or_else(|| default_log_level().to_string());
    let log_dir = cli.log_dir.or(file.logging.dir.clone());
    init_logging(&level, log_dir.as_deref()).map_err(anyhow::Error::msg)?;

    match cli.command {
        Commands::Publish {
            target,
            key,
            value,
            backup,
        } => {
            let overrides = PublishSection {
                target_dir: target,
                key,
                value,
                backup: backup.then_some(true),
            };
            run_publish(PublishConfig::try_from(file.publish.merge(overrides))?)
        }
        Commands::Watch {
            vault,
            folder,
            debounce_ms,
        } => {
            let overrides = WatchSection {
                vault_root: vault,
                folder_name: folder,
                debounce_ms,
            };
            run_watch(WatchConfig::try_from(file.watch.merge(overrides))?)
        }
    }
}

fn run_publish(config: PublishConfig) -> Result<()> {
    println!("target folder: {}", config.target_dir.display());
    println!("metadata:      {}: {}", config.key, config.value);
    println!("backup:        {}", if config.backup { "yes" } else { "no" });
    println!("{}", "-".repeat(RULE_WIDTH));

    let service = PublishService::new(config)?;
    let report = service.run_with_progress(print_file_report)?;
    if report.files.is_empty() {
        println!(
            "no .md files found in {}",
            service.config().target_dir.display()
        );
        return Ok(());
    }
    print_summary(&report);
    Ok(())
}

fn print_file_report(file: &FileReport) {
    let name = file
        .path
        .file_name()
        .map(|name| name.to_string_lossy().into_owned())
        .unwrap_or_else(|| file.path.display().to_string());
    match &file.result {
        Ok(outcome) => println!("  {:<9} {name}", outcome.as_str()),
        Err(err) => println!("  {:<9} {name}: {err}", "error"),
    }
}

fn print_summary(report: &PublishReport) {
    println!("{}", "=".repeat(RULE_WIDTH));
    println!("processed: {}", report.processed());
    println!("skipped:   {}", report.skipped());
    println!("failed:    {}", report.failed());
    if let Some(backup_dir) = &report.backup_dir {
        println!("backup:    {}", backup_dir.display());
    }
}

fn run_watch(config: WatchConfig) -> Result<()> {
    let dispatcher = NoteDispatcher::new(&config, StampService::new(LocalClock));
    let mut watcher = VaultWatcher::new(config.vault_root.clone());
    watcher.start(dispatcher)?;
    println!(
        "watching {} for notes in `{}` (Ctrl-C to stop)",
        config.vault_root.display(),
        config.folder_name
    );

    let runtime = tokio::runtime::Builder::new_current_thread()
        .enable_all()
        .build()
        .context("failed to build signal runtime")?;
    runtime
        .block_on(tokio::signal::ctrl_c())
        .context("failed to listen for Ctrl-C")?;

    if let Some(stats) = watcher.stop() {
        println!(
            "stopped: {} stamped, {} ignored, {} failed",
            stats.stamped, stats.ignored, stats.failed
        );
    }
    Ok(())
}
