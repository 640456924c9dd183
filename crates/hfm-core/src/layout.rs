use std::path::{Path, PathBuf};

use crate::error::HfmError;
use crate::models::repo::RepoId;

/// Deterministic on-disk layout for archives, metadata and extracted trees.
///
/// ```text
/// <base>/archives/<slug>.bundle
/// <base>/archives/<slug>.bundle.lfs
/// <base>/archives/<slug>.bundle.meta.json
/// <base>/extracted/<slug>/
/// ```
#[derive(Debug, Clone)]
pub struct StorageLayout {
    base_dir: PathBuf,
}

impl StorageLayout {
    pub fn new(base_dir: impl Into<PathBuf>) -> Self {
        Self {
            base_dir: base_dir.into(),
        }
    }

    pub fn base_dir(&self) -> &Path {
        &self.base_dir
    }

    pub fn archives_dir(&self) -> PathBuf {
        self.base_dir.join("archives")
    }

    pub fn extracted_dir(&self) -> PathBuf {
        self.base_dir.join("extracted")
    }

    pub fn archive_path(&self, id: &RepoId) -> PathBuf {
        self.archives_dir().join(format!("{}.bundle", id.slug()))
    }

    pub fn lfs_bundle_path(&self, id: &RepoId) -> PathBuf {
        lfs_bundle_for(&self.archive_path(id))
    }

    pub fn metadata_path(&self, id: &RepoId) -> PathBuf {
        metadata_for(&self.archive_path(id))
    }

    pub fn extraction_path(&self, id: &RepoId) -> PathBuf {
        self.extracted_dir().join(id.slug())
    }

    /// Create the archive and extraction directories.
    pub fn ensure_dirs(&self) -> Result<(), HfmError> {
        std::fs::create_dir_all(self.archives_dir())?;
        std::fs::create_dir_all(self.extracted_dir())?;
        Ok(())
    }
}

/// `<archive>.meta.json`
pub fn metadata_for(archive: &Path) -> PathBuf {
    append_suffix(archive, ".meta.json")
}

/// `<archive>.lfs`
pub fn lfs_bundle_for(archive: &Path) -> PathBuf {
    append_suffix(archive, ".lfs")
}

fn append_suffix(path: &Path, suffix: &str) -> PathBuf {
    let mut s = path.as_os_str().to_os_string();
    s.push(suffix);
    PathBuf::from(s)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_paths_share_base_name() {
        let layout = StorageLayout::new("storage");
        let id: RepoId = "org/repo-one".parse().unwrap();

        assert_eq!(
            layout.archive_path(&id),
            PathBuf::from("storage/archives/org_repo-one.bundle")
        );
        assert_eq!(
            layout.metadata_path(&id),
            PathBuf::from("storage/archives/org_repo-one.bundle.meta.json")
        );
        assert_eq!(
            layout.lfs_bundle_path(&id),
            PathBuf::from("storage/archives/org_repo-one.bundle.lfs")
        );
        assert_eq!(
            layout.extraction_path(&id),
            PathBuf::from("storage/extracted/org_repo-one")
        );
    }

    #[test]
    fn test_resolution_is_stable() {
        let layout = StorageLayout::new("/data/mirror");
        let id: RepoId = "deepseek-ai/DeepSeek-R1".parse().unwrap();
        assert_eq!(layout.archive_path(&id), layout.archive_path(&id.clone()));
        assert_eq!(metadata_for(&layout.archive_path(&id)), layout.metadata_path(&id));
    }

    #[test]
    fn test_ensure_dirs() {
        let dir = tempfile::tempdir().unwrap();
        let layout = StorageLayout::new(dir.path().join("storage"));
        layout.ensure_dirs().unwrap();
        assert!(layout.archives_dir().is_dir());
        assert!(layout.extracted_dir().is_dir());
    }
}
