use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::path::Path;

use super::repo::RepoId;
use crate::error::HfmError;

pub const BUNDLE_FORMAT: &str = "git-bundle-v2";

/// Git LFS usage recorded for an archive.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct LfsInfo {
    pub has_lfs: bool,
    #[serde(default)]
    pub lfs_patterns: Vec<String>,
    /// File name of the companion LFS bundle, when one was written.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub lfs_bundle: Option<String>,
}

/// Metadata written next to every archive as `<archive>.meta.json`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ArchiveMetadata {
    pub repo_id: RepoId,
    pub size: u64,
    pub size_mb: f64,
    pub download_date: DateTime<Utc>,
    #[serde(default = "default_true")]
    pub git_archive: bool,
    pub lfs_info: LfsInfo,
    #[serde(default)]
    pub bundle_checksum: Option<String>,
    #[serde(default)]
    pub git_version: Option<String>,
    #[serde(default = "default_bundle_format")]
    pub bundle_format: String,
    /// Repository size reported by the Hub API, in bytes.
    #[serde(default)]
    pub estimated_size: Option<u64>,
    #[serde(default)]
    pub default_branch: Option<String>,
}

fn default_true() -> bool {
    true
}

fn default_bundle_format() -> String {
    BUNDLE_FORMAT.to_string()
}

impl ArchiveMetadata {
    /// Fields a metadata file must carry to count as complete.
    pub const REQUIRED_FIELDS: &'static [&'static str] =
        &["repo_id", "size", "download_date", "lfs_info"];

    pub fn new(repo_id: RepoId, size: u64, lfs_info: LfsInfo) -> Self {
        Self {
            repo_id,
            size,
            size_mb: size_mb(size),
            download_date: Utc::now(),
            git_archive: true,
            lfs_info,
            bundle_checksum: None,
            git_version: None,
            bundle_format: default_bundle_format(),
            estimated_size: None,
            default_branch: None,
        }
    }

    /// Names of required fields absent from a raw metadata document.
    pub fn missing_fields(value: &serde_json::Value) -> Vec<&'static str> {
        Self::REQUIRED_FIELDS
            .iter()
            .copied()
            .filter(|field| value.get(field).is_none())
            .collect()
    }

    pub fn load(path: &Path) -> Result<Self, HfmError> {
        let content = std::fs::read_to_string(path)?;
        serde_json::from_str(&content).map_err(|e| HfmError::InvalidMetadata {
            path: path.to_path_buf(),
            message: e.to_string(),
        })
    }

    pub fn save(&self, path: &Path) -> Result<(), HfmError> {
        let content = serde_json::to_string_pretty(self)?;
        std::fs::write(path, content)?;
        Ok(())
    }
}

fn size_mb(size: u64) -> f64 {
    (size as f64 / (1024.0 * 1024.0) * 100.0).round() / 100.0
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_size_mb_rounds_to_two_places() {
        let meta = ArchiveMetadata::new("org/a".parse().unwrap(), 1_572_864, LfsInfo::default());
        assert_eq!(meta.size_mb, 1.5);
        assert_eq!(size_mb(1_000_000), 0.95);
    }

    #[test]
    fn test_save_and_load() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("org_a.bundle.meta.json");

        let mut meta = ArchiveMetadata::new(
            "org/a".parse().unwrap(),
            2048,
            LfsInfo {
                has_lfs: true,
                lfs_patterns: vec!["*.safetensors".into()],
                lfs_bundle: Some("org_a.bundle.lfs".into()),
            },
        );
        meta.bundle_checksum = Some("ab".repeat(32));
        meta.save(&path).unwrap();

        let loaded = ArchiveMetadata::load(&path).unwrap();
        assert_eq!(loaded.repo_id.as_str(), "org/a");
        assert!(loaded.lfs_info.has_lfs);
        assert_eq!(loaded.bundle_format, BUNDLE_FORMAT);

        let raw: serde_json::Value =
            serde_json::from_str(&std::fs::read_to_string(&path).unwrap()).unwrap();
        assert!(ArchiveMetadata::missing_fields(&raw).is_empty());
    }

    #[test]
    fn test_missing_fields_reported() {
        let raw = serde_json::json!({ "repo_id": "org/a", "size": 1 });
        assert_eq!(
            ArchiveMetadata::missing_fields(&raw),
            vec!["download_date", "lfs_info"]
        );
    }

    #[test]
    fn test_load_accepts_older_records() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("meta.json");
        std::fs::write(
            &path,
            r#"{
  "repo_id": "org/old",
  "size": 10,
  "size_mb": 0.0,
  "download_date": "2025-01-28T10:00:00Z",
  "lfs_info": { "has_lfs": false, "lfs_patterns": [] }
}"#,
        )
        .unwrap();
        let meta = ArchiveMetadata::load(&path).unwrap();
        assert!(meta.git_archive);
        assert!(meta.bundle_checksum.is_none());
    }
}
