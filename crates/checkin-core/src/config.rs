//! checkin.toml configuration parser.

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CheckinConfig {
    pub storage: StorageConfig,
    pub limits: LimitsConfig,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct StorageConfig {
    /// Root directory holding `users.json` and `events/`.
    pub data_dir: PathBuf,
    /// Upper bound on waiting for a collection write lock.
    pub lock_timeout_ms: u64,
    /// Pretty-print collection files.
    pub pretty: bool,
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            data_dir: PathBuf::from("./data"),
            lock_timeout_ms: 10_000,
            pretty: true,
        }
    }
}

impl StorageConfig {
    pub fn lock_timeout(&self) -> Duration {
        Duration::from_millis(self.lock_timeout_ms)
    }
}

/// Per-event capacity limits.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LimitsConfig {
    pub max_tables_per_event: usize,
    pub max_seats_per_event: usize,
    pub max_guests_per_event: usize,
}

impl Default for LimitsConfig {
    fn default() -> Self {
        Self {
            max_tables_per_event: 500,
            max_seats_per_event: 5000,
            max_guests_per_event: 10_000,
        }
    }
}

impl CheckinConfig {
    pub fn from_file(path: &Path) -> anyhow::Result<Self> {
        let content = std::fs::read_to_string(path)?;
        let config: CheckinConfig = toml::from_str(&content)?;
        config.validate()?;
        Ok(config)
    }

    /// Load `path` if it exists, otherwise fall back to defaults.
    pub fn load_or_default(path: &Path) -> anyhow::Result<Self> {
        if path.exists() {
            Self::from_file(path)
        } else {
            Ok(Self::default())
        }
    }

    pub fn to_toml_string(&self) -> anyhow::Result<String> {
        Ok(toml::to_string_pretty(self)?)
    }

    /// A zero lock timeout would turn every contended write into an error.
    pub fn validate(&self) -> anyhow::Result<()> {
        if self.storage.lock_timeout_ms == 0 {
            anyhow::bail!("storage.lock_timeout_ms must be greater than zero");
        }
        Ok(())
    }
}
