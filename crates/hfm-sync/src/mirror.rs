use std::path::Path;

use hfm_archive::retry::RetryPolicy;
use hfm_archive::{bundle, git_ops};
use hfm_core::error::HfmError;
use hfm_core::models::repo::{RemoteRepo, RepoId, RepoKind};
use hfm_hub::{list_kinds, HubProvider};

use crate::clean::{delete_all, DeleteOptions, DeleteReport, DeleteStats, CONFIRMATION_PHRASE};

const TARGET_REMOTE: &str = "target";

#[derive(Debug, Clone)]
pub struct MirrorOptions {
    /// Delete a pre-existing target repository before mirroring into it.
    pub replace: bool,
    /// Delete every target repository of the mirrored kinds first.
    pub clean_target: bool,
    pub kinds: Vec<RepoKind>,
    pub policy: RetryPolicy,
    pub delete: DeleteOptions,
}

impl Default for MirrorOptions {
    fn default() -> Self {
        Self {
            replace: false,
            clean_target: false,
            kinds: vec![RepoKind::Model],
            policy: RetryPolicy::default(),
            delete: DeleteOptions::default(),
        }
    }
}

#[derive(Debug, Default)]
pub struct MirrorReport {
    pub total: usize,
    pub mirrored: Vec<RepoId>,
    pub failed: Vec<(RepoId, String)>,
    /// Outcome of the target clean-up, when requested.
    pub cleaned: Option<DeleteStats>,
}

/// Hub account names compare case-insensitively.
fn same_account(a: &str, b: &str) -> bool {
    a.eq_ignore_ascii_case(b)
}

/// Mirror every source repository of the selected kinds to `target_owner`.
/// Failures are logged per repository and the loop continues.
///
/// Refuses to run when both owners are the same account, since replacing or
/// cleaning the target would then delete the source.
pub async fn mirror_all(
    hub: &dyn HubProvider,
    source_owner: &str,
    target_owner: &str,
    opts: &MirrorOptions,
) -> Result<MirrorReport, HfmError> {
    if same_account(source_owner, target_owner) {
        return Err(HfmError::SameAccount {
            owner: target_owner.to_string(),
        });
    }
    let mut report = MirrorReport::default();

    if opts.clean_target {
        tracing::info!("cleaning target account {target_owner}");
        let delete = DeleteOptions {
            kinds: opts.kinds.clone(),
            ..opts.delete.clone()
        };
        if let DeleteReport::Completed(stats) =
            delete_all(hub, target_owner, CONFIRMATION_PHRASE, &delete).await
        {
            report.cleaned = Some(stats);
        }
    }

    let sources = list_kinds(hub, source_owner, &opts.kinds).await;
    report.total = sources.len();

    for repo in &sources {
        let target = match repo.id.with_owner(target_owner) {
            Ok(t) => t,
            Err(e) => {
                report.failed.push((repo.id.clone(), e.to_string()));
                continue;
            }
        };
        match mirror_one(hub, repo, &target, opts).await {
            Ok(()) => {
                tracing::info!("mirrored {} -> {target}", repo.id);
                report.mirrored.push(repo.id.clone());
            }
            Err(e) => {
                tracing::error!("failed to mirror {}: {e}", repo.id);
                report.failed.push((repo.id.clone(), e.to_string()));
            }
        }
    }
    Ok(report)
}

/// Mirror one repository, creating the target when it does not exist.
pub async fn mirror_one(
    hub: &dyn HubProvider,
    source: &RemoteRepo,
    target: &RepoId,
    opts: &MirrorOptions,
) -> Result<(), HfmError> {
    if same_account(source.id.owner(), target.owner()) {
        return Err(HfmError::SameAccount {
            owner: target.owner().to_string(),
        });
    }
    let kind = source.kind;
    let mut exists = hub.repo_exists(target, kind).await?;
    if exists && opts.replace {
        tracing::info!("deleting existing {target}");
        hub.delete_repo(target, kind).await?;
        exists = false;
    }
    if !exists {
        hub.create_repo(target, kind, source.private).await?;
    }

    let source_url = hub.clone_url(&source.id, kind);
    let target_url = hub.clone_url(target, kind);
    let policy = opts.policy.clone();
    let label = source.id.to_string();

    tokio::task::spawn_blocking(move || transfer_repository(&label, &source_url, &target_url, &policy))
        .await
        .map_err(|e| HfmError::Other(format!("mirror task failed: {e}")))?
}

/// Clone `source_url` bare and push all of it, LFS objects first, to `target_url`.
fn transfer_repository(
    label: &str,
    source_url: &str,
    target_url: &str,
    policy: &RetryPolicy,
) -> Result<(), HfmError> {
    let scratch = tempfile::Builder::new().prefix("hfm-mirror-").tempdir()?;
    let bare = scratch.path().join("repo.git");

    policy.run(&format!("clone {label}"), || {
        if bare.exists() {
            std::fs::remove_dir_all(&bare)?;
        }
        git_ops::clone_bare(source_url, &bare)
    })?;

    let has_lfs = !bundle::detect_lfs_patterns(&bare)?.is_empty();
    if has_lfs {
        if !git_ops::lfs_available() {
            return Err(HfmError::Other(format!(
                "{label} uses Git LFS but git-lfs is not installed"
            )));
        }
        git_ops::lfs_install_local(&bare)?;
        policy.run(&format!("lfs fetch {label}"), || {
            git_ops::lfs_fetch_all(&bare, "origin")
        })?;
    }

    git_ops::remote_add(&bare, TARGET_REMOTE, target_url)?;
    if has_lfs {
        policy.run(&format!("lfs push {label}"), || {
            git_ops::lfs_push_all(&bare, TARGET_REMOTE)
        })?;
    }
    policy.run(&format!("push {label}"), || {
        git_ops::push_mirror(&bare, TARGET_REMOTE)
    })?;
    Ok(())
}

/// Branch refs of a local repository, for comparing source and target.
pub fn branch_refs(dir: &Path) -> Result<Vec<(String, String)>, HfmError> {
    git_ops::list_refs(dir, "refs/heads/")
}

#[cfg(test)]
mod tests {
    use super::*;
    use hfm_hub::memory::MemoryHub;

    #[tokio::test]
    async fn test_failures_do_not_stop_the_batch() {
        if git_ops::version().is_err() {
            return;
        }
        let dir = tempfile::tempdir().unwrap();
        let endpoint = url::Url::from_directory_path(dir.path()).unwrap();
        let hub = MemoryHub::with_repos(
            endpoint,
            vec![
                RemoteRepo::new("src/a".parse().unwrap(), RepoKind::Model),
                RemoteRepo::new("src/b".parse().unwrap(), RepoKind::Model),
            ],
        );
        let opts = MirrorOptions {
            policy: RetryPolicy::none(),
            ..Default::default()
        };

        // no git repositories exist on disk, so every clone fails
        let report = mirror_all(&hub, "src", "dst", &opts).await.unwrap();
        assert_eq!(report.total, 2);
        assert_eq!(report.failed.len(), 2);
        assert!(report.mirrored.is_empty());
        assert_eq!(hub.created().len(), 2);
    }

    #[tokio::test]
    async fn test_replace_deletes_existing_target() {
        let hub = MemoryHub::with_repos(
            url::Url::parse("file:///nonexistent-hub/").unwrap(),
            vec![
                RemoteRepo::new("src/a".parse().unwrap(), RepoKind::Model),
                RemoteRepo::new("dst/a".parse().unwrap(), RepoKind::Model),
            ],
        );
        let opts = MirrorOptions {
            replace: true,
            policy: RetryPolicy::none(),
            ..Default::default()
        };
        let source = RemoteRepo::new("src/a".parse().unwrap(), RepoKind::Model);
        let target: RepoId = "dst/a".parse().unwrap();
        // the push fails (no such source on disk) but the replace already happened
        let _ = mirror_one(&hub, &source, &target, &opts).await;
        assert_eq!(hub.deleted(), vec![(target.clone(), RepoKind::Model)]);
        assert_eq!(hub.created(), vec![(target, RepoKind::Model)]);
    }

    #[tokio::test]
    async fn test_same_account_is_refused_before_any_change() {
        let hub = MemoryHub::with_repos(
            url::Url::parse("file:///nonexistent-hub/").unwrap(),
            vec![RemoteRepo::new("org/a".parse().unwrap(), RepoKind::Model)],
        );
        let opts = MirrorOptions {
            replace: true,
            clean_target: true,
            policy: RetryPolicy::none(),
            ..Default::default()
        };

        let err = mirror_all(&hub, "org", "ORG", &opts).await.unwrap_err();
        assert!(matches!(err, HfmError::SameAccount { .. }));

        let source = RemoteRepo::new("org/a".parse().unwrap(), RepoKind::Model);
        let err = mirror_one(&hub, &source, &source.id, &opts).await.unwrap_err();
        assert!(matches!(err, HfmError::SameAccount { .. }));

        assert!(hub.deleted().is_empty());
        assert!(hub.created().is_empty());
        assert_eq!(hub.delete_calls(), 0);
    }
}
