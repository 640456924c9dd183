use std::fs::File;
use std::path::Path;

use walkdir::WalkDir;

use hfm_core::error::HfmError;
use hfm_core::layout::{lfs_bundle_for, metadata_for, StorageLayout};
use hfm_core::models::archive::ArchiveMetadata;
use hfm_core::models::repo::RepoId;

use crate::bundle::LFS_OBJECTS_DIR;
use crate::catalog::{self, CatalogEntry};
use crate::git_ops;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ExtractOutcome {
    Extracted { lfs_objects: usize },
    /// The target directory already existed and was left untouched.
    Skipped,
}

/// Counts from a batch extraction.
#[derive(Debug, Default)]
pub struct ExtractSummary {
    pub extracted: usize,
    pub failed: usize,
    pub skipped: usize,
    pub not_found: usize,
    /// `(repo, reason)` for every failure.
    pub failures: Vec<(String, String)>,
}

/// Whether the archive's metadata declares LFS content.
fn archive_uses_lfs(archive: &Path) -> bool {
    let meta_path = metadata_for(archive);
    if !meta_path.exists() {
        tracing::warn!("no metadata for {}, assuming no LFS content", archive.display());
        return false;
    }
    match ArchiveMetadata::load(&meta_path) {
        Ok(meta) => meta.lfs_info.has_lfs,
        Err(e) => {
            tracing::warn!("{e}; assuming no LFS content");
            false
        }
    }
}

/// Materialise a working tree from `archive` at `target`.
///
/// A pre-existing target is skipped. When the metadata declares LFS content
/// the companion `.lfs` file must be present; it is checked before anything
/// is written. On failure the partially created target is removed.
pub fn extract_one(archive: &Path, target: &Path) -> Result<ExtractOutcome, HfmError> {
    if !archive.is_file() {
        return Err(HfmError::MissingArchive {
            path: archive.to_path_buf(),
        });
    }
    if target.exists() {
        tracing::info!("skipping {}, already extracted", target.display());
        return Ok(ExtractOutcome::Skipped);
    }

    let lfs_bundle = lfs_bundle_for(archive);
    let has_lfs = archive_uses_lfs(archive);
    if has_lfs && !lfs_bundle.is_file() {
        return Err(HfmError::MissingLfsBundle { path: lfs_bundle });
    }

    if let Some(parent) = target.parent() {
        std::fs::create_dir_all(parent)?;
    }

    match materialise(archive, target, has_lfs.then_some(lfs_bundle.as_path())) {
        Ok(lfs_objects) => Ok(ExtractOutcome::Extracted { lfs_objects }),
        Err(e) => {
            if target.exists() {
                if let Err(rm) = std::fs::remove_dir_all(target) {
                    tracing::warn!("could not remove partial {}: {rm}", target.display());
                }
            }
            Err(e)
        }
    }
}

fn materialise(archive: &Path, target: &Path, lfs_bundle: Option<&Path>) -> Result<usize, HfmError> {
    git_ops::clone_from_bundle(archive, target)?;

    let Some(lfs_bundle) = lfs_bundle else {
        return Ok(0);
    };

    let git_dir = target.join(".git");
    tar::Archive::new(File::open(lfs_bundle)?).unpack(&git_dir)?;
    let objects = WalkDir::new(git_dir.join(LFS_OBJECTS_DIR))
        .into_iter()
        .filter_map(|e| e.ok())
        .filter(|e| e.file_type().is_file())
        .count();

    if git_ops::lfs_available() {
        git_ops::lfs_install_local(target)?;
        git_ops::lfs_checkout(target)?;
    } else {
        tracing::warn!(
            "git-lfs not installed; {} keeps LFS pointer files",
            target.display()
        );
    }
    Ok(objects)
}

fn extract_entry(layout: &StorageLayout, entry: &CatalogEntry, summary: &mut ExtractSummary) {
    let name = entry.display_name();
    match extract_one(&entry.archive_path, &entry.extraction_path(layout)) {
        Ok(ExtractOutcome::Extracted { lfs_objects }) => {
            tracing::info!("extracted {name} ({lfs_objects} LFS objects)");
            summary.extracted += 1;
        }
        Ok(ExtractOutcome::Skipped) => summary.skipped += 1,
        Err(e) => {
            tracing::error!("failed to extract {name}: {e}");
            summary.failed += 1;
            summary.failures.push((name, e.to_string()));
        }
    }
}

/// Extract the named repositories. Ids without an archive count as not found.
pub fn extract_selected(layout: &StorageLayout, ids: &[RepoId]) -> ExtractSummary {
    let mut summary = ExtractSummary::default();
    for id in ids {
        match catalog::find(layout, id) {
            Some(entry) => extract_entry(layout, &entry, &mut summary),
            None => {
                tracing::warn!("no archive for {id}");
                summary.not_found += 1;
            }
        }
    }
    summary
}

/// Extract every archive in the storage directory.
pub fn extract_all(layout: &StorageLayout) -> ExtractSummary {
    let mut summary = ExtractSummary::default();
    for entry in catalog::downloaded_repos(layout) {
        extract_entry(layout, &entry, &mut summary);
    }
    summary
}

#[cfg(test)]
mod tests {
    use super::*;
    use hfm_core::models::archive::LfsInfo;

    #[test]
    fn test_missing_archive() {
        let dir = tempfile::tempdir().unwrap();
        let err = extract_one(&dir.path().join("none.bundle"), &dir.path().join("out")).unwrap_err();
        assert!(matches!(err, HfmError::MissingArchive { .. }));
    }

    #[test]
    fn test_missing_lfs_bundle_leaves_no_target() {
        let dir = tempfile::tempdir().unwrap();
        let layout = StorageLayout::new(dir.path());
        layout.ensure_dirs().unwrap();
        let id: RepoId = "org/big".parse().unwrap();
        std::fs::write(layout.archive_path(&id), b"bundle").unwrap();
        ArchiveMetadata::new(
            id.clone(),
            6,
            LfsInfo {
                has_lfs: true,
                lfs_patterns: vec!["*.bin".into()],
                lfs_bundle: Some("org_big.bundle.lfs".into()),
            },
        )
        .save(&layout.metadata_path(&id))
        .unwrap();

        let target = layout.extraction_path(&id);
        let err = extract_one(&layout.archive_path(&id), &target).unwrap_err();
        assert!(matches!(err, HfmError::MissingLfsBundle { .. }));
        assert!(!target.exists());
    }

    #[test]
    fn test_existing_target_is_skipped() {
        let dir = tempfile::tempdir().unwrap();
        let archive = dir.path().join("org_a.bundle");
        std::fs::write(&archive, b"not a bundle").unwrap();
        let target = dir.path().join("org_a");
        std::fs::create_dir(&target).unwrap();
        assert_eq!(extract_one(&archive, &target).unwrap(), ExtractOutcome::Skipped);
    }

    #[test]
    fn test_corrupt_bundle_cleans_target() {
        if git_ops::version().is_err() {
            return;
        }
        let dir = tempfile::tempdir().unwrap();
        let archive = dir.path().join("org_a.bundle");
        std::fs::write(&archive, b"garbage").unwrap();
        let target = dir.path().join("extracted/org_a");
        assert!(extract_one(&archive, &target).is_err());
        assert!(!target.exists());
    }

    #[test]
    fn test_extract_selected_counts_not_found() {
        let dir = tempfile::tempdir().unwrap();
        let layout = StorageLayout::new(dir.path());
        layout.ensure_dirs().unwrap();
        let summary = extract_selected(&layout, &["org/none".parse().unwrap()]);
        assert_eq!(summary.not_found, 1);
        assert_eq!(summary.extracted + summary.failed + summary.skipped, 0);
    }
}
