use std::path::{Path, PathBuf};

use hfm_archive::retry::RetryPolicy;
use hfm_archive::{bundle, git_ops};
use hfm_core::error::HfmError;
use hfm_core::layout::StorageLayout;
use hfm_core::models::archive::{ArchiveMetadata, LfsInfo};
use hfm_core::models::repo::{RemoteRepo, RepoId};
use hfm_hub::HubProvider;

/// Shared settings for every download in a batch.
#[derive(Debug, Clone)]
pub struct DownloadContext {
    pub layout: StorageLayout,
    pub policy: RetryPolicy,
    /// `git --version`, recorded in each metadata file.
    pub git_version: Option<String>,
}

impl DownloadContext {
    pub fn new(layout: StorageLayout, policy: RetryPolicy) -> Self {
        Self {
            layout,
            policy,
            git_version: git_ops::version().ok(),
        }
    }
}

/// One repository to archive.
#[derive(Debug, Clone)]
pub struct DownloadRequest {
    pub id: RepoId,
    pub clone_url: String,
    /// Size reported by the hub, copied into the metadata.
    pub estimated_size: Option<u64>,
}

impl DownloadRequest {
    pub fn for_repo(hub: &dyn HubProvider, repo: &RemoteRepo) -> Self {
        Self {
            id: repo.id.clone(),
            clone_url: hub.clone_url(&repo.id, repo.kind),
            estimated_size: repo.size,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DownloadOutcome {
    Downloaded { has_lfs: bool },
    /// A complete archive with readable metadata already existed.
    Skipped,
    Failed { error: String },
}

/// Fill in `size` for repos the listing left without one.
pub async fn resolve_sizes(hub: &dyn HubProvider, repos: &mut [RemoteRepo]) {
    for repo in repos.iter_mut().filter(|r| r.size.is_none()) {
        match hub.repo_size(&repo.id, repo.kind).await {
            Ok(size) => repo.size = size,
            Err(e) => tracing::warn!("could not get size of {}: {e}", repo.id),
        }
    }
}

/// Archive one repository into the storage directory.
///
/// Never panics and never leaves a partial archive behind. Everything is
/// written into a private staging directory and only renamed into place once
/// the bundle and its metadata are complete, so a failed attempt removes
/// nothing but its own files.
pub fn download_one(ctx: &DownloadContext, req: &DownloadRequest) -> DownloadOutcome {
    let layout = &ctx.layout;
    let archive = layout.archive_path(&req.id);
    let metadata = layout.metadata_path(&req.id);
    if archive.is_file() && ArchiveMetadata::load(&metadata).is_ok() {
        tracing::info!("skipping {}, already downloaded", req.id);
        return DownloadOutcome::Skipped;
    }
    if archive.exists() || metadata.exists() || layout.lfs_bundle_path(&req.id).exists() {
        tracing::warn!("{}: discarding incomplete archive from an earlier run", req.id);
        remove_artifacts(layout, &req.id);
    }

    tracing::info!("downloading {}", req.id);
    match archive_repository(ctx, req) {
        Ok(has_lfs) => DownloadOutcome::Downloaded { has_lfs },
        Err(e) => {
            tracing::error!("error downloading {}: {e}", req.id);
            DownloadOutcome::Failed {
                error: e.to_string(),
            }
        }
    }
}

fn remove_artifacts(layout: &StorageLayout, id: &RepoId) {
    for path in [
        layout.archive_path(id),
        layout.lfs_bundle_path(id),
        layout.metadata_path(id),
    ] {
        if path.exists() {
            if let Err(e) = std::fs::remove_file(&path) {
                tracing::warn!("could not remove {}: {e}", path.display());
            }
        }
    }
}

fn fresh_clone(url: &str, dest: &Path) -> Result<(), HfmError> {
    if dest.exists() {
        std::fs::remove_dir_all(dest)?;
    }
    git_ops::clone_bare(url, dest)
}

/// Path under `staging` with the same file name as `target`.
fn staged(staging: &Path, target: &Path) -> Result<PathBuf, HfmError> {
    target
        .file_name()
        .map(|name| staging.join(name))
        .ok_or_else(|| HfmError::Other(format!("no file name in {}", target.display())))
}

/// Rename staged files into place in order. If one rename fails the files
/// already moved by this call are taken back out.
fn publish(moves: &[(PathBuf, PathBuf)]) -> Result<(), HfmError> {
    for (done, (from, to)) in moves.iter().enumerate() {
        if let Err(e) = std::fs::rename(from, to) {
            for (_, placed) in &moves[..done] {
                if let Err(rm) = std::fs::remove_file(placed) {
                    tracing::warn!("could not remove {}: {rm}", placed.display());
                }
            }
            return Err(e.into());
        }
    }
    Ok(())
}

fn archive_repository(ctx: &DownloadContext, req: &DownloadRequest) -> Result<bool, HfmError> {
    let layout = &ctx.layout;
    std::fs::create_dir_all(layout.archives_dir())?;

    // same filesystem as the final files so publishing is a plain rename
    let staging = tempfile::Builder::new()
        .prefix(".hfm-staging-")
        .tempdir_in(layout.archives_dir())?;
    let archive = layout.archive_path(&req.id);
    let metadata = layout.metadata_path(&req.id);
    let staged_archive = staged(staging.path(), &archive)?;
    let staged_metadata = staged(staging.path(), &metadata)?;

    let bare = staging.path().join("repo.git");
    let label = format!("clone {}", req.id);
    ctx.policy.run(&label, || fresh_clone(&req.clone_url, &bare))?;

    let default_branch = git_ops::default_branch(&bare)?;
    let lfs_patterns = bundle::detect_lfs_patterns(&bare)?;
    let has_lfs = !lfs_patterns.is_empty();

    let mut moves = Vec::new();
    let mut lfs_bundle = None;
    if has_lfs {
        if !git_ops::lfs_available() {
            return Err(HfmError::Other(format!(
                "{} uses Git LFS but git-lfs is not installed",
                req.id
            )));
        }
        let label = format!("lfs fetch {}", req.id);
        ctx.policy
            .run(&label, || git_ops::lfs_fetch_all(&bare, "origin"))?;
        let lfs_path = layout.lfs_bundle_path(&req.id);
        let staged_lfs = staged(staging.path(), &lfs_path)?;
        let objects = bundle::build_lfs_bundle(&bare, &staged_lfs)?;
        tracing::info!("{}: {objects} LFS objects", req.id);
        lfs_bundle = lfs_path
            .file_name()
            .map(|n| n.to_string_lossy().to_string());
        moves.push((staged_lfs, lfs_path));
    }

    let label = format!("bundle {}", req.id);
    let size = ctx
        .policy
        .run(&label, || bundle::build_bundle(&bare, &staged_archive))?;

    let mut meta = ArchiveMetadata::new(
        req.id.clone(),
        size,
        LfsInfo {
            has_lfs,
            lfs_patterns,
            lfs_bundle,
        },
    );
    meta.bundle_checksum = Some(bundle::sha256_file(&staged_archive)?);
    meta.git_version = ctx.git_version.clone();
    meta.estimated_size = req.estimated_size;
    meta.default_branch = default_branch;
    meta.save(&staged_metadata)?;

    // the bundle goes last: an archive on disk always has its metadata
    moves.push((staged_metadata, metadata));
    moves.push((staged_archive, archive));
    publish(&moves)?;

    Ok(has_lfs)
}

#[cfg(test)]
mod tests {
    use super::*;
    use hfm_core::models::repo::RepoKind;
    use hfm_hub::memory::MemoryHub;

    fn context(dir: &Path) -> DownloadContext {
        DownloadContext::new(StorageLayout::new(dir.join("storage")), RetryPolicy::none())
    }

    fn unreachable_request(id: &RepoId) -> DownloadRequest {
        DownloadRequest {
            id: id.clone(),
            clone_url: "file:///does/not/exist/hfm".into(),
            estimated_size: None,
        }
    }

    #[test]
    fn test_existing_archive_is_skipped() {
        let dir = tempfile::tempdir().unwrap();
        let ctx = context(dir.path());
        ctx.layout.ensure_dirs().unwrap();
        let id: RepoId = "org/a".parse().unwrap();
        std::fs::write(ctx.layout.archive_path(&id), b"existing").unwrap();
        ArchiveMetadata::new(id.clone(), 8, LfsInfo::default())
            .save(&ctx.layout.metadata_path(&id))
            .unwrap();

        assert_eq!(download_one(&ctx, &unreachable_request(&id)), DownloadOutcome::Skipped);
        assert_eq!(std::fs::read(ctx.layout.archive_path(&id)).unwrap(), b"existing");
    }

    #[test]
    fn test_archive_without_metadata_is_not_skipped() {
        let dir = tempfile::tempdir().unwrap();
        let ctx = context(dir.path());
        ctx.layout.ensure_dirs().unwrap();
        let id: RepoId = "org/partial".parse().unwrap();
        std::fs::write(ctx.layout.archive_path(&id), b"truncated").unwrap();

        let outcome = download_one(&ctx, &unreachable_request(&id));
        assert!(matches!(outcome, DownloadOutcome::Failed { .. }), "{outcome:?}");
        assert!(!ctx.layout.archive_path(&id).exists());
    }

    #[test]
    fn test_unreadable_metadata_is_not_skipped() {
        let dir = tempfile::tempdir().unwrap();
        let ctx = context(dir.path());
        ctx.layout.ensure_dirs().unwrap();
        let id: RepoId = "org/half".parse().unwrap();
        std::fs::write(ctx.layout.archive_path(&id), b"bundle").unwrap();
        std::fs::write(ctx.layout.metadata_path(&id), b"{\"repo_id\": ").unwrap();

        assert_ne!(download_one(&ctx, &unreachable_request(&id)), DownloadOutcome::Skipped);
        assert!(!ctx.layout.archive_path(&id).exists());
        assert!(!ctx.layout.metadata_path(&id).exists());
    }

    #[test]
    fn test_failed_clone_leaves_nothing() {
        if git_ops::version().is_err() {
            return;
        }
        let dir = tempfile::tempdir().unwrap();
        let ctx = context(dir.path());
        let id: RepoId = "org/missing".parse().unwrap();
        let req = DownloadRequest {
            id: id.clone(),
            clone_url: format!("file://{}/nowhere/org/missing", dir.path().display()),
            estimated_size: None,
        };

        assert!(matches!(download_one(&ctx, &req), DownloadOutcome::Failed { .. }));
        assert!(!ctx.layout.archive_path(&id).exists());
        assert!(!ctx.layout.metadata_path(&id).exists());
        let leftovers: Vec<_> = std::fs::read_dir(ctx.layout.archives_dir())
            .unwrap()
            .map(|e| e.unwrap().file_name())
            .collect();
        assert!(leftovers.is_empty(), "{leftovers:?}");
    }

    #[tokio::test]
    async fn test_resolve_sizes_fills_gaps() {
        let hub = MemoryHub::new(url::Url::parse("file:///hub").unwrap());
        let mut a = RemoteRepo::new("org/a".parse().unwrap(), RepoKind::Model);
        a.size = Some(10);
        hub.add_repo(a);
        hub.add_repo(RemoteRepo::new("org/b".parse().unwrap(), RepoKind::Model));

        let mut repos = hfm_hub::list_kinds(&hub, "org", &[RepoKind::Model]).await;
        repos[0].size = None;
        resolve_sizes(&hub, &mut repos).await;
        assert_eq!(repos[0].size, Some(10));
        assert_eq!(repos[1].size, None);
        assert!(hfm_hub::list_kinds(&hub, "nobody", &[RepoKind::Space]).await.is_empty());
    }
}
