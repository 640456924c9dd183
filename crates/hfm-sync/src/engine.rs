use std::collections::HashSet;
use std::sync::Arc;

use chrono::{DateTime, Utc};
use indicatif::{MultiProgress, ProgressBar, ProgressDrawTarget, ProgressStyle};
use tokio::sync::Semaphore;
use tokio::task::JoinHandle;

use hfm_core::models::repo::RepoId;

use crate::download::{download_one, DownloadContext, DownloadOutcome, DownloadRequest};

/// Totals for one download batch.
#[derive(Debug)]
pub struct DownloadSummary {
    pub total: usize,
    pub downloaded: usize,
    pub skipped: usize,
    pub failed: usize,
    /// Downloaded repositories that carry LFS content.
    pub lfs_repos: usize,
    pub failures: Vec<(RepoId, String)>,
    pub started_at: DateTime<Utc>,
    pub finished_at: DateTime<Utc>,
}

impl DownloadSummary {
    fn new(total: usize) -> Self {
        let now = Utc::now();
        Self {
            total,
            downloaded: 0,
            skipped: 0,
            failed: 0,
            lfs_repos: 0,
            failures: Vec::new(),
            started_at: now,
            finished_at: now,
        }
    }

    fn record(&mut self, id: RepoId, outcome: DownloadOutcome) {
        match outcome {
            DownloadOutcome::Downloaded { has_lfs } => {
                self.downloaded += 1;
                if has_lfs {
                    self.lfs_repos += 1;
                }
            }
            DownloadOutcome::Skipped => self.skipped += 1,
            DownloadOutcome::Failed { error } => {
                self.failed += 1;
                self.failures.push((id, error));
            }
        }
    }

    /// Successful downloads plus archives that were already present.
    pub fn successful(&self) -> usize {
        self.downloaded + self.skipped
    }
}

/// Drop repeated ids, keeping the first request for each. Two workers must
/// never write the same archive.
fn unique_requests(requests: Vec<DownloadRequest>) -> Vec<DownloadRequest> {
    let mut seen = HashSet::new();
    requests
        .into_iter()
        .filter(|req| {
            let first = seen.insert(req.id.clone());
            if !first {
                tracing::warn!("ignoring duplicate request for {}", req.id);
            }
            first
        })
        .collect()
}

/// Await every job. A task that died without reporting counts as failed.
async fn collect_outcomes(
    summary: &mut DownloadSummary,
    handles: Vec<(RepoId, JoinHandle<(RepoId, DownloadOutcome)>)>,
) {
    for (id, handle) in handles {
        match handle.await {
            Ok((id, outcome)) => summary.record(id, outcome),
            Err(e) => {
                tracing::error!("download task for {id} failed: {e}");
                let error = format!("download task failed: {e}");
                summary.record(id, DownloadOutcome::Failed { error });
            }
        }
    }
}

/// Download engine that archives repositories in parallel with a concurrency limit.
pub struct DownloadEngine {
    workers: usize,
    show_progress: bool,
}

impl DownloadEngine {
    pub fn new(workers: usize) -> Self {
        Self {
            workers: workers.max(1),
            show_progress: true,
        }
    }

    pub fn with_progress(mut self, show: bool) -> Self {
        self.show_progress = show;
        self
    }

    /// Archive every requested repository. At most `workers` downloads run at
    /// once; each runs on the blocking pool since it drives git subprocesses.
    /// A repository requested more than once is downloaded once.
    pub async fn download_all(
        &self,
        ctx: Arc<DownloadContext>,
        requests: Vec<DownloadRequest>,
    ) -> DownloadSummary {
        let requests = unique_requests(requests);
        let mut summary = DownloadSummary::new(requests.len());
        let semaphore = Arc::new(Semaphore::new(self.workers));
        let multi = if self.show_progress {
            MultiProgress::new()
        } else {
            MultiProgress::with_draw_target(ProgressDrawTarget::hidden())
        };
        let overall = multi.add(ProgressBar::new(requests.len() as u64));
        overall.set_style(
            ProgressStyle::with_template("{bar:40.cyan/blue} {pos}/{len} {msg}")
                .unwrap_or_else(|_| ProgressStyle::default_bar()),
        );
        overall.set_message("repositories");
        let spinner = ProgressStyle::with_template("{spinner:.green} {msg}")
            .unwrap_or_else(|_| ProgressStyle::default_spinner())
            .tick_chars("⠋⠙⠹⠸⠼⠴⠦⠧⠇⠏");

        let handles: Vec<_> = requests
            .into_iter()
            .map(|req| {
                let sem = semaphore.clone();
                let ctx = ctx.clone();
                let multi = multi.clone();
                let style = spinner.clone();
                let overall = overall.clone();
                let job = req.id.clone();

                let handle = tokio::spawn(async move {
                    let id = req.id.clone();
                    let Ok(_permit) = sem.acquire_owned().await else {
                        let error = "download queue closed".to_string();
                        return (id, DownloadOutcome::Failed { error });
                    };

                    let pb = multi.insert_before(&overall, ProgressBar::new_spinner());
                    pb.set_style(style);
                    pb.set_message(format!("downloading {id}"));
                    pb.enable_steady_tick(std::time::Duration::from_millis(120));

                    let outcome = tokio::task::spawn_blocking(move || download_one(&ctx, &req))
                        .await
                        .unwrap_or_else(|e| DownloadOutcome::Failed {
                            error: format!("download task failed: {e}"),
                        });

                    let status = match &outcome {
                        DownloadOutcome::Downloaded { .. } => "done",
                        DownloadOutcome::Skipped => "skipped",
                        DownloadOutcome::Failed { .. } => "failed",
                    };
                    pb.finish_with_message(format!("{id}: {status}"));
                    overall.inc(1);
                    (id, outcome)
                });
                (job, handle)
            })
            .collect();

        collect_outcomes(&mut summary, handles).await;
        overall.finish_and_clear();

        summary.finished_at = Utc::now();
        summary
    }
}
