use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;
use url::Url;

use crate::error::HfmError;
use crate::layout::StorageLayout;

/// Top-level configuration, stored at `~/.hfm/config.toml`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HfmConfig {
    /// Root of the `archives/` and `extracted/` trees.
    #[serde(default = "default_storage_dir")]
    pub storage_dir: PathBuf,

    /// Organization mirrored when no owner is given on the command line.
    #[serde(default = "default_owner")]
    pub default_owner: String,

    /// Hub base URL, used for both the REST API and git remotes.
    #[serde(default = "default_endpoint")]
    pub endpoint: Url,

    /// Username placed in credential-embedded clone URLs.
    #[serde(default = "default_git_user")]
    pub git_user: String,

    /// Maximum concurrent downloads.
    #[serde(default = "default_workers")]
    pub download_workers: usize,

    /// Retry policy for clone, bundle and delete operations.
    #[serde(default)]
    pub retry: RetryConfig,

    /// Pause between successive repository deletions, in milliseconds.
    #[serde(default = "default_delete_pause_ms")]
    pub delete_pause_ms: u64,
}

/// How the delay between retry attempts grows.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Backoff {
    Fixed,
    Exponential,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RetryConfig {
    #[serde(default = "default_max_attempts")]
    pub max_attempts: u32,
    #[serde(default = "default_delay_ms")]
    pub delay_ms: u64,
    #[serde(default = "default_backoff")]
    pub backoff: Backoff,
}

impl RetryConfig {
    pub fn delay(&self) -> Duration {
        Duration::from_millis(self.delay_ms)
    }
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_attempts: default_max_attempts(),
            delay_ms: default_delay_ms(),
            backoff: default_backoff(),
        }
    }
}

fn default_storage_dir() -> PathBuf {
    PathBuf::from("storage")
}

fn default_owner() -> String {
    "deepseek-ai".to_string()
}

fn default_endpoint() -> Url {
    Url::parse("https://huggingface.co").expect("static URL is valid")
}

fn default_git_user() -> String {
    "USER".to_string()
}

fn default_workers() -> usize {
    4
}

fn default_max_attempts() -> u32 {
    3
}

fn default_delay_ms() -> u64 {
    2000
}

fn default_backoff() -> Backoff {
    Backoff::Fixed
}

fn default_delete_pause_ms() -> u64 {
    500
}

impl Default for HfmConfig {
    fn default() -> Self {
        Self {
            storage_dir: default_storage_dir(),
            default_owner: default_owner(),
            endpoint: default_endpoint(),
            git_user: default_git_user(),
            download_workers: default_workers(),
            retry: RetryConfig::default(),
            delete_pause_ms: default_delete_pause_ms(),
        }
    }
}

impl HfmConfig {
    /// Returns the hfm home directory (`~/.hfm/`).
    pub fn home_dir() -> Result<PathBuf, HfmError> {
        let base = dirs::home_dir().ok_or_else(|| HfmError::Config {
            message: "could not determine home directory".into(),
        })?;
        Ok(base.join(".hfm"))
    }

    /// Returns the path to the config file.
    pub fn config_path() -> Result<PathBuf, HfmError> {
        Ok(Self::home_dir()?.join("config.toml"))
    }

    /// Load config from the default location, or return defaults if not found.
    pub fn load() -> Result<Self, HfmError> {
        let path = Self::config_path()?;
        if path.exists() {
            Self::load_from(&path)
        } else {
            tracing::debug!("no config at {}, using defaults", path.display());
            Ok(Self::default())
        }
    }

    /// Load config from a specific path.
    pub fn load_from(path: &Path) -> Result<Self, HfmError> {
        let content = std::fs::read_to_string(path)?;
        let config: Self =
            toml::from_str(&content).map_err(|e| HfmError::Serialization(e.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    /// Save config to a specific path.
    pub fn save_to(&self, path: &Path) -> Result<(), HfmError> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let content =
            toml::to_string_pretty(self).map_err(|e| HfmError::Serialization(e.to_string()))?;
        std::fs::write(path, content)?;
        Ok(())
    }

    /// Initialize the hfm home directory with default config.
    pub fn init() -> Result<PathBuf, HfmError> {
        let home = Self::home_dir()?;
        std::fs::create_dir_all(&home)?;

        let config_path = Self::config_path()?;
        if !config_path.exists() {
            Self::default().save_to(&config_path)?;
        }

        Ok(home)
    }

    pub fn layout(&self) -> StorageLayout {
        StorageLayout::new(&self.storage_dir)
    }

    fn validate(&self) -> Result<(), HfmError> {
        if self.download_workers == 0 {
            return Err(HfmError::Config {
                message: "download_workers must be at least 1".into(),
            });
        }
        if self.retry.max_attempts == 0 {
            return Err(HfmError::Config {
                message: "retry.max_attempts must be at least 1".into(),
            });
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config_roundtrip() {
        let config = HfmConfig::default();
        let serialized = toml::to_string_pretty(&config).unwrap();
        let deserialized: HfmConfig = toml::from_str(&serialized).unwrap();
        assert_eq!(config.download_workers, deserialized.download_workers);
        assert_eq!(config.endpoint, deserialized.endpoint);
        assert_eq!(deserialized.retry.backoff, Backoff::Fixed);
    }

    #[test]
    fn test_partial_file_fills_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.toml");
        std::fs::write(
            &path,
            "storage_dir = \"/srv/mirror\"\n[retry]\nbackoff = \"exponential\"\n",
        )
        .unwrap();

        let config = HfmConfig::load_from(&path).unwrap();
        assert_eq!(config.storage_dir, PathBuf::from("/srv/mirror"));
        assert_eq!(config.retry.max_attempts, 3);
        assert_eq!(config.retry.backoff, Backoff::Exponential);
        assert_eq!(config.default_owner, "deepseek-ai");
    }

    #[test]
    fn test_zero_workers_rejected() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.toml");
        std::fs::write(&path, "download_workers = 0\n").unwrap();
        assert!(matches!(
            HfmConfig::load_from(&path),
            Err(HfmError::Config { .. })
        ));
    }
}
