use std::time::Duration;

use hfm_archive::retry::RetryPolicy;
use hfm_core::config::HfmConfig;
use hfm_core::error::HfmError;
use hfm_core::models::repo::{RemoteRepo, RepoId, RepoKind};
use hfm_hub::{list_kinds, HubProvider};

/// Phrase that must be typed exactly to allow a bulk delete.
pub const CONFIRMATION_PHRASE: &str = "YES_DELETE_ALL";

#[derive(Debug, Clone)]
pub struct DeleteOptions {
    pub policy: RetryPolicy,
    /// Wait after each deletion attempt.
    pub pause: Duration,
    pub kinds: Vec<RepoKind>,
}

impl DeleteOptions {
    /// Settings from config: its attempt count with a one second delay.
    pub fn from_config(config: &HfmConfig) -> Self {
        Self {
            policy: RetryPolicy::new(
                config.retry.max_attempts,
                Duration::from_secs(1),
                config.retry.backoff,
            ),
            pause: Duration::from_millis(config.delete_pause_ms),
            kinds: RepoKind::ALL.to_vec(),
        }
    }
}

impl Default for DeleteOptions {
    fn default() -> Self {
        Self::from_config(&HfmConfig::default())
    }
}

#[derive(Debug, Default)]
pub struct DeleteStats {
    pub found: usize,
    pub deleted: Vec<(RepoId, RepoKind)>,
    pub failed: Vec<(RepoId, RepoKind, String)>,
    /// Repositories still listed after the deletion pass.
    pub remaining: Vec<RemoteRepo>,
}

impl DeleteStats {
    pub fn is_clean(&self) -> bool {
        self.remaining.is_empty()
    }
}

#[derive(Debug)]
pub enum DeleteReport {
    /// Confirmation phrase did not match; nothing was touched.
    Aborted,
    Completed(DeleteStats),
}

/// Delete every repository of the configured kinds under `owner`.
///
/// Does nothing at all, not even listing, unless `confirmation` is exactly
/// [`CONFIRMATION_PHRASE`].
pub async fn delete_all(
    hub: &dyn HubProvider,
    owner: &str,
    confirmation: &str,
    opts: &DeleteOptions,
) -> DeleteReport {
    if confirmation != CONFIRMATION_PHRASE {
        tracing::warn!("aborted: confirmation phrase not matched");
        return DeleteReport::Aborted;
    }

    let repos = list_kinds(hub, owner, &opts.kinds).await;
    let mut stats = DeleteStats {
        found: repos.len(),
        ..Default::default()
    };
    if repos.is_empty() {
        tracing::info!("no repositories found under {owner}");
        return DeleteReport::Completed(stats);
    }
    tracing::info!("found {} repositories to delete under {owner}", repos.len());

    for repo in &repos {
        let label = format!("delete {} ({})", repo.id, repo.kind);
        let result = opts
            .policy
            .run_async(&label, || hub.delete_repo(&repo.id, repo.kind))
            .await;
        match result {
            Ok(()) => stats.deleted.push((repo.id.clone(), repo.kind)),
            Err(HfmError::RepoNotFound { .. }) => {
                tracing::info!("{} already gone", repo.id);
                stats.deleted.push((repo.id.clone(), repo.kind));
            }
            Err(e) => {
                tracing::error!("failed to delete {} ({}): {e}", repo.id, repo.kind);
                stats.failed.push((repo.id.clone(), repo.kind, e.to_string()));
            }
        }
        if !opts.pause.is_zero() {
            tokio::time::sleep(opts.pause).await;
        }
    }

    stats.remaining = list_kinds(hub, owner, &opts.kinds).await;
    if stats.is_clean() {
        tracing::info!("account {owner} fully cleaned");
    } else {
        tracing::warn!(
            "{} repositories under {owner} could not be deleted",
            stats.remaining.len()
        );
    }
    DeleteReport::Completed(stats)
}

#[cfg(test)]
mod tests {
    use super::*;
    use hfm_core::config::Backoff;
    use hfm_hub::memory::MemoryHub;

    fn hub() -> MemoryHub {
        MemoryHub::with_repos(
            url::Url::parse("file:///hub").unwrap(),
            vec![
                RemoteRepo::new("me/model".parse().unwrap(), RepoKind::Model),
                RemoteRepo::new("me/data".parse().unwrap(), RepoKind::Dataset),
                RemoteRepo::new("me/app".parse().unwrap(), RepoKind::Space),
                RemoteRepo::new("other/keep".parse().unwrap(), RepoKind::Model),
            ],
        )
    }

    fn quick() -> DeleteOptions {
        DeleteOptions {
            policy: RetryPolicy::new(3, Duration::ZERO, Backoff::Fixed),
            pause: Duration::ZERO,
            kinds: RepoKind::ALL.to_vec(),
        }
    }

    #[tokio::test]
    async fn test_wrong_phrase_makes_no_calls() {
        let hub = hub();
        for phrase in ["", "yes_delete_all", "YES_DELETE_ALL ", "YES"] {
            let report = delete_all(&hub, "me", phrase, &quick()).await;
            assert!(matches!(report, DeleteReport::Aborted));
        }
        assert_eq!(hub.delete_calls(), 0);
    }

    #[tokio::test]
    async fn test_deletes_every_kind() {
        let hub = hub();
        let DeleteReport::Completed(stats) = delete_all(&hub, "me", CONFIRMATION_PHRASE, &quick()).await
        else {
            panic!("expected completion");
        };
        assert_eq!(stats.found, 3);
        assert_eq!(stats.deleted.len(), 3);
        assert!(stats.is_clean());
        assert_eq!(hub.list_repos("other", RepoKind::Model).await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_stragglers_are_reported() {
        let hub = hub();
        hub.refuse_delete("me/data".parse().unwrap());
        let DeleteReport::Completed(stats) = delete_all(&hub, "me", CONFIRMATION_PHRASE, &quick()).await
        else {
            panic!("expected completion");
        };
        assert_eq!(stats.failed.len(), 1);
        assert_eq!(stats.remaining.len(), 1);
        assert_eq!(stats.remaining[0].id.as_str(), "me/data");
        // 2 successful deletes plus 3 attempts on the refused one
        assert_eq!(hub.delete_calls(), 5);
    }
}
