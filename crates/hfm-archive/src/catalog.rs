use std::path::{Path, PathBuf};

use walkdir::WalkDir;

use hfm_core::error::HfmError;
use hfm_core::layout::{lfs_bundle_for, metadata_for, StorageLayout};
use hfm_core::models::archive::ArchiveMetadata;
use hfm_core::models::repo::RepoId;

const BUNDLE_EXT: &str = ".bundle";
const META_EXT: &str = ".bundle.meta.json";
const LFS_EXT: &str = ".bundle.lfs";

/// An archive found under the storage directory.
#[derive(Debug, Clone)]
pub struct CatalogEntry {
    pub archive_path: PathBuf,
    /// File name without the `.bundle` extension.
    pub label: String,
    /// Repository id recovered from the metadata file, if readable.
    pub repo_id: Option<RepoId>,
}

impl CatalogEntry {
    pub fn metadata_path(&self) -> PathBuf {
        metadata_for(&self.archive_path)
    }

    pub fn lfs_bundle_path(&self) -> PathBuf {
        lfs_bundle_for(&self.archive_path)
    }

    /// Repository id if known, otherwise the file label.
    pub fn display_name(&self) -> String {
        match &self.repo_id {
            Some(id) => id.to_string(),
            None => self.label.clone(),
        }
    }

    pub fn extraction_path(&self, layout: &StorageLayout) -> PathBuf {
        match &self.repo_id {
            Some(id) => layout.extraction_path(id),
            None => layout.extracted_dir().join(&self.label),
        }
    }
}

/// A file in `archives/` that is missing its partner.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Orphan {
    /// Archive with no metadata record, usually an interrupted download.
    ArchiveWithoutMetadata(PathBuf),
    /// Metadata (or LFS companion) left behind after its archive was removed.
    SidecarWithoutArchive(PathBuf),
}

impl Orphan {
    pub fn path(&self) -> &Path {
        match self {
            Orphan::ArchiveWithoutMetadata(p) | Orphan::SidecarWithoutArchive(p) => p,
        }
    }
}

/// Regular files directly inside `dir`, sorted by name.
fn files_in(dir: &Path) -> Vec<PathBuf> {
    if !dir.is_dir() {
        return Vec::new();
    }
    let mut files: Vec<PathBuf> = WalkDir::new(dir)
        .min_depth(1)
        .max_depth(1)
        .follow_links(false)
        .into_iter()
        .filter_map(|e| e.ok())
        .filter(|e| e.file_type().is_file())
        .map(|e| e.into_path())
        .collect();
    files.sort();
    files
}

fn file_name(path: &Path) -> String {
    path.file_name()
        .map(|n| n.to_string_lossy().to_string())
        .unwrap_or_default()
}

/// Every `*.bundle` archive in the storage directory.
pub fn downloaded_repos(layout: &StorageLayout) -> Vec<CatalogEntry> {
    files_in(&layout.archives_dir())
        .into_iter()
        .filter_map(|path| {
            let name = file_name(&path);
            let label = name.strip_suffix(BUNDLE_EXT)?.to_string();
            let repo_id = ArchiveMetadata::load(&metadata_for(&path))
                .ok()
                .map(|m| m.repo_id);
            Some(CatalogEntry {
                archive_path: path,
                label,
                repo_id,
            })
        })
        .collect()
}

/// Look up the archive of one repository.
pub fn find(layout: &StorageLayout, id: &RepoId) -> Option<CatalogEntry> {
    let archive_path = layout.archive_path(id);
    if !archive_path.is_file() {
        return None;
    }
    Some(CatalogEntry {
        label: id.slug(),
        repo_id: Some(id.clone()),
        archive_path,
    })
}

/// Names of directories under `extracted/` that hold a git checkout.
pub fn extracted_repos(layout: &StorageLayout) -> Vec<String> {
    let dir = layout.extracted_dir();
    if !dir.is_dir() {
        return Vec::new();
    }
    let mut names: Vec<String> = WalkDir::new(&dir)
        .min_depth(1)
        .max_depth(1)
        .into_iter()
        .filter_map(|e| e.ok())
        .filter(|e| e.file_type().is_dir() && e.path().join(".git").exists())
        .map(|e| e.file_name().to_string_lossy().to_string())
        .collect();
    names.sort();
    names
}

/// Archives without metadata and sidecars without archives.
pub fn orphans(layout: &StorageLayout) -> Vec<Orphan> {
    let mut found = Vec::new();
    for path in files_in(&layout.archives_dir()) {
        let name = file_name(&path);
        let base = if let Some(stem) = name.strip_suffix(META_EXT) {
            stem
        } else if let Some(stem) = name.strip_suffix(LFS_EXT) {
            stem
        } else if name.ends_with(BUNDLE_EXT) {
            if !metadata_for(&path).exists() {
                found.push(Orphan::ArchiveWithoutMetadata(path));
            }
            continue;
        } else {
            continue;
        };
        let archive = path.with_file_name(format!("{base}{BUNDLE_EXT}"));
        if !archive.exists() {
            found.push(Orphan::SidecarWithoutArchive(path));
        }
    }
    found
}

/// Delete every orphan, returning what was removed.
pub fn remove_orphans(layout: &StorageLayout) -> Result<Vec<Orphan>, HfmError> {
    let found = orphans(layout);
    for orphan in &found {
        tracing::info!("removing orphan {}", orphan.path().display());
        std::fs::remove_file(orphan.path())?;
        if let Orphan::ArchiveWithoutMetadata(archive) = orphan {
            let lfs = lfs_bundle_for(archive);
            if lfs.exists() {
                std::fs::remove_file(lfs)?;
            }
        }
    }
    Ok(found)
}
