//! Config store with content-hash based hot reload.

use std::path::{Path, PathBuf};
use std::sync::{Arc, RwLock};

use super::{ConfigError, DeployerConfig, parser};

#[derive(Debug)]
struct Snapshot {
    hash: Option<blake3::Hash>,
    config: Arc<DeployerConfig>,
    /// Content hash of the last file version that failed to load
    rejected: Option<blake3::Hash>,
}

/// Result of checking the file for changes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Reload {
    Unchanged,
    Reloaded,
    Rejected,
}

/// Holds the active configuration snapshot.
///
/// Requests call [`ConfigStore::current`], which re-hashes the file and
/// swaps in a freshly parsed config when the content changed. A reload that
/// fails to parse or validate keeps the previous snapshot.
#[derive(Debug)]
pub struct ConfigStore {
    config_path: Option<PathBuf>,
    snapshot: RwLock<Snapshot>,
}

impl ConfigStore {
    /// Load and validate the file. Errors here are fatal for the server.
    pub fn load(config_path: impl Into<PathBuf>) -> Result<Self, ConfigError> {
        let config_path = config_path.into();
        let content = read_config(&config_path)?;
        let config = parser::parse_config_str(&content)?;

        Ok(Self {
            snapshot: RwLock::new(Snapshot {
                hash: Some(blake3::hash(content.as_bytes())),
                config: Arc::new(config),
                rejected: None,
            }),
            config_path: Some(config_path),
        })
    }

    /// Fixed in-memory configuration without a backing file (for testing).
    pub fn from_config(config: DeployerConfig) -> Self {
        Self {
            config_path: None,
            snapshot: RwLock::new(Snapshot {
                hash: None,
                config: Arc::new(config),
                rejected: None,
            }),
        }
    }

    pub fn config_path(&self) -> Option<&Path> {
        self.config_path.as_deref()
    }

    /// Current configuration, reloaded first if the file content changed.
    pub fn current(&self) -> Arc<DeployerConfig> {
        if let Some(path) = &self.config_path {
            self.reload_if_changed(path);
        }
        self.snapshot
            .read()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .config
            .clone()
    }

    fn reload_if_changed(&self, path: &Path) -> Reload {
        let content = match read_config(path) {
            Ok(content) => content,
            Err(e) => {
                tracing::error!("Keeping previous configuration: {}", e);
                return Reload::Rejected;
            }
        };
        let hash = blake3::hash(content.as_bytes());

        {
            let snapshot = self
                .snapshot
                .read()
                .unwrap_or_else(|poisoned| poisoned.into_inner());
            // A rejected version is reported once, not on every request
            if snapshot.hash == Some(hash) || snapshot.rejected == Some(hash) {
                return Reload::Unchanged;
            }
        }

        let parsed = parser::parse_config_str(&content);
        let mut snapshot = self
            .snapshot
            .write()
            .unwrap_or_else(|poisoned| poisoned.into_inner());
        match parsed {
            Ok(config) => {
                snapshot.hash = Some(hash);
                snapshot.config = Arc::new(config);
                snapshot.rejected = None;
                tracing::info!("Reloaded configuration from {}", path.display());
                Reload::Reloaded
            }
            Err(e) => {
                snapshot.rejected = Some(hash);
                tracing::error!(
                    "Invalid configuration in {}, keeping previous one: {}",
                    path.display(),
                    e
                );
                Reload::Rejected
            }
        }
    }
}

fn read_config(path: &Path) -> Result<String, ConfigError> {
    std::fs::read_to_string(path).map_err(|source| ConfigError::Read {
        path: path.to_path_buf(),
        source,
    })
}
