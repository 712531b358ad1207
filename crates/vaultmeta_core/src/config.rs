//! Run configuration for the publisher and the vault watcher.
//!
//! # Responsibility
//! - Define explicit configuration structures passed into services.
//! - Load optional YAML config files and merge them with caller overrides.
//!
//! # Invariants
//! - A validated `PublishConfig` always holds a writable one-line entry.
//! - A validated `WatchConfig` always names a single directory component.
//! - Override values win over file values, which win over defaults.

use crate::model::frontmatter::{validate_entry, MetadataError};
use serde::Deserialize;
use std::error::Error;
use std::fmt::{Display, Formatter};
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Default frontmatter key written by the publisher.
pub const DEFAULT_METADATA_KEY: &str = "publish";
/// Default frontmatter value written by the publisher.
pub const DEFAULT_METADATA_VALUE: &str = "true";
/// Default wait before a freshly appeared note is touched.
pub const DEFAULT_DEBOUNCE_MS: u64 = 500;

/// Configuration error raised before any note is touched.
#[derive(Debug)]
pub enum ConfigError {
    /// Config file could not be read.
    Read {
        path: PathBuf,
        source: std::io::Error,
    },
    /// Config file is not valid YAML for the expected shape.
    Parse(serde_yaml::Error),
    /// A required setting was provided neither on the command line nor in a file.
    MissingField(&'static str),
    /// Metadata key/value cannot be written as one frontmatter line.
    Metadata(MetadataError),
    /// Watched folder name is empty.
    EmptyFolderName,
    /// Watched folder name is not a single path component.
    InvalidFolderName(String),
}

impl Display for ConfigError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Read { path, source } => {
                write!(f, "failed to read config `{}`: {source}", path.display())
            }
            Self::Parse(err) => write!(f, "invalid config file: {err}"),
            Self::MissingField(field) => write!(f, "missing required setting `{field}`"),
            Self::Metadata(err) => write!(f, "{err}"),
            Self::EmptyFolderName => write!(f, "watched folder name cannot be empty"),
            Self::InvalidFolderName(name) => write!(
                f,
                "watched folder name `{name}` must be a single directory name"
            ),
        }
    }
}

impl Error for ConfigError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            Self::Read { source, .. } => Some(source),
            Self::Parse(err) => Some(err),
            Self::Metadata(err) => Some(err),
            _ => None,
        }
    }
}

impl From<MetadataError> for ConfigError {
    fn from(value: MetadataError) -> Self {
        Self::Metadata(value)
    }
}

impl From<serde_yaml::Error> for ConfigError {
    fn from(value: serde_yaml::Error) -> Self {
        Self::Parse(value)
    }
}

/// Settings for one batch publish run over a folder.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PublishConfig {
    /// Folder whose `.md` files are updated recursively.
    pub target_dir: PathBuf,
    /// Frontmatter key to guarantee.
    pub key: String,
    /// Value the key must hold.
    pub value: String,
    /// Copy every note to a timestamped sibling folder before writing.
    pub backup: bool,
}

impl PublishConfig {
    /// Creates a config for `target_dir` with `publish: true` and no backup.
    pub fn new(target_dir: impl Into<PathBuf>) -> Self {
        Self {
            target_dir: target_dir.into(),
            key: DEFAULT_METADATA_KEY.to_string(),
            value: DEFAULT_METADATA_VALUE.to_string(),
            backup: false,
        }
    }

    /// Validates the metadata entry.
    ///
    /// Target folder existence is checked when a run starts, not here.
    pub fn validate(&self) -> Result<(), ConfigError> {
        validate_entry(&self.key, &self.value)?;
        Ok(())
    }
}

/// Settings for the vault watcher.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WatchConfig {
    /// Vault root observed recursively.
    pub vault_root: PathBuf,
    /// Name of the immediate parent folder whose new notes are stamped.
    pub folder_name: String,
    /// Wait between an event and touching the file.
    pub debounce: Duration,
}

impl WatchConfig {
    /// Creates a config with the default debounce delay.
    pub fn new(vault_root: impl Into<PathBuf>, folder_name: impl Into<String>) -> Self {
        Self {
            vault_root: vault_root.into(),
            folder_name: folder_name.into(),
            debounce: Duration::from_millis(DEFAULT_DEBOUNCE_MS),
        }
    }

    /// Validates the watched folder name.
    pub fn validate(&self) -> Result<(), ConfigError> {
        let name = self.folder_name.as_str();
        if name.trim().is_empty() {
            return Err(ConfigError::EmptyFolderName);
        }
        if name.contains(['/', '\\']) || name == "." || name == ".." {
            return Err(ConfigError::InvalidFolderName(name.to_string()));
        }
        Ok(())
    }
}

/// Optional YAML config file.
///
/// ```yaml
/// publish:
///   target_dir: /vault/3-tags
///   backup: true
/// watch:
///   vault_root: /vault
///   folder_name: 5-permanent
/// logging:
///   level: info
/// ```
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct ConfigFile {
    pub publish: PublishSection,
    pub watch: WatchSection,
    pub logging: LoggingSection,
}

impl ConfigFile {
    /// Reads and parses a YAML config file.
    pub fn load(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let raw = std::fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_yaml_str(&raw)
    }

    /// Parses a YAML config document. An empty document yields defaults.
    pub fn from_yaml_str(raw: &str) -> Result<Self, ConfigError> {
        if raw.trim().is_empty() {
            return Ok(Self::default());
        }
        Ok(serde_yaml::from_str(raw)?)
    }
}

/// `publish:` section; every field optional.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct PublishSection {
    pub target_dir: Option<PathBuf>,
    pub key: Option<String>,
    pub value: Option<String>,
    pub backup: Option<bool>,
}

impl PublishSection {
    /// Layers `overrides` on top of `self`.
    pub fn merge(self, overrides: PublishSection) -> PublishSection {
        PublishSection {
            target_dir: overrides.target_dir.or(self.target_dir),
            key: overrides.key.or(self.key),
            value: overrides.value.or(self.value),
            backup: overrides.backup.or(self.backup),
        }
    }
}

impl TryFrom<PublishSection> for PublishConfig {
    type Error = ConfigError;

    fn try_from(section: PublishSection) -> Result<Self, Self::Error> {
        let target_dir = section
            .target_dir
            .ok_or(ConfigError::MissingField("publish.target_dir"))?;
        let mut config = PublishConfig::new(target_dir);
        if let Some(key) = section.key {
            config.key = key;
        }
        if let Some(value) = section.value {
            config.value = value;
        }
        config.backup = section.backup.unwrap_or(false);
        config.validate()?;
        Ok(config)
    }
}

/// `watch:` section; every field optional.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct WatchSection {
    pub vault_root: Option<PathBuf>,
    pub folder_name: Option<String>,
    pub debounce_ms: Option<u64>,
}

impl WatchSection {
    /// Layers `overrides` on top of `self`.
    pub fn merge(self, overrides: WatchSection) -> WatchSection {
        WatchSection {
            vault_root: overrides.vault_root.or(self.vault_root),
            folder_name: overrides.folder_name.or(self.folder_name),
            debounce_ms: overrides.debounce_ms.or(self.debounce_ms),
        }
    }
}

impl TryFrom<WatchSection> for WatchConfig {
    type Error = ConfigError;

    fn try_from(section: WatchSection) -> Result<Self, Self::Error> {
        let vault_root = section
            .vault_root
            .ok_or(ConfigError::MissingField("watch.vault_root"))?;
        let folder_name = section
            .folder_name
            .ok_or(ConfigError::MissingField("watch.folder_name"))?;
        let mut config = WatchConfig::new(vault_root, folder_name);
        if let Some(debounce_ms) = section.debounce_ms {
            config.debounce = Duration::from_millis(debounce_ms);
        }
        config.validate()?;
        Ok(config)
    }
}

/// `logging:` section.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct LoggingSection {
    /// `trace|debug|info|warn|error`.
    pub level: Option<String>,
    /// Absolute directory for rolling log files.
    pub dir: Option<String>,
}
