use std::sync::Arc;

use clap::Args;
use hfm_archive::retry::RetryPolicy;
use hfm_core::models::repo::{RemoteRepo, RepoKind, SortOrder};
use hfm_sync::download::{resolve_sizes, DownloadContext, DownloadRequest};
use hfm_sync::engine::DownloadEngine;

use super::list::{print_sizes, sized_listing};
use super::{parse_ids, require_git, GlobalArgs};

#[derive(Args)]
pub struct DownloadArgs {
    /// Owner whose repositories are downloaded (defaults to the configured owner)
    #[arg(long)]
    owner: Option<String>,
    /// Download only these repositories (owner/name, comma separated)
    #[arg(long, value_delimiter = ',')]
    repos: Vec<String>,
    /// Repository kind to download
    #[arg(long, default_value = "model")]
    kind: RepoKind,
    /// Process repositories by size: asc, desc or none
    #[arg(long, default_value = "none")]
    sort: SortOrder,
    /// Print the selection with sizes instead of downloading
    #[arg(long)]
    list: bool,
    /// Take only the first N repositories after sorting (0 for all)
    #[arg(long, default_value_t = 0)]
    top: usize,
    /// Number of parallel downloads
    #[arg(long)]
    workers: Option<usize>,
}

pub async fn run(global: &GlobalArgs, args: DownloadArgs) -> anyhow::Result<()> {
    let git_version = require_git()?;
    let config = global.load_config()?;
    let hub = global.hub(&config)?;
    let owner = args
        .owner
        .clone()
        .unwrap_or_else(|| config.default_owner.clone());

    let repos: Vec<RemoteRepo> = if args.repos.is_empty() {
        println!("Fetching repository list for {owner}...");
        let kinds = [args.kind];
        sized_listing(&hub, &owner, &kinds, args.sort, args.top).await
    } else {
        let mut repos: Vec<RemoteRepo> = parse_ids(&args.repos)?
            .into_iter()
            .map(|id| RemoteRepo::new(id, args.kind))
            .collect();
        if args.list || args.sort != SortOrder::None {
            resolve_sizes(&hub, &mut repos).await;
        }
        args.sort.sort_by_size(&mut repos);
        if args.top > 0 {
            repos.truncate(args.top);
        }
        repos
    };

    if repos.is_empty() {
        println!("No repositories found or error fetching repository list.");
        return Ok(());
    }
    if args.list {
        print_sizes(&repos);
        return Ok(());
    }

    let layout = config.layout();
    layout.ensure_dirs()?;
    let mut ctx = DownloadContext::new(layout.clone(), RetryPolicy::from_config(&config.retry));
    ctx.git_version = Some(git_version);

    let requests: Vec<DownloadRequest> = repos
        .iter()
        .map(|r| DownloadRequest::for_repo(&hub, r))
        .collect();
    let workers = args.workers.unwrap_or(config.download_workers);
    println!(
        "Downloading {} repositories with {workers} parallel workers...",
        requests.len()
    );

    let summary = DownloadEngine::new(workers)
        .download_all(Arc::new(ctx), requests)
        .await;

    println!("\nDownload Summary:");
    println!("----------------");
    println!("Total repositories:        {}", summary.total);
    println!("Successfully downloaded:   {}", summary.downloaded);
    println!("Already present (skipped): {}", summary.skipped);
    println!("Failed downloads:          {}", summary.failed);
    println!("Repositories using Git LFS: {}", summary.lfs_repos);
    println!(
        "Elapsed: {}s",
        (summary.finished_at - summary.started_at).num_seconds()
    );
    println!("\nArchives are saved in: {}", layout.archives_dir().display());

    if summary.failed > 0 {
        println!("\nFailed:");
        for (id, error) in &summary.failures {
            println!("  {id}: {error}");
        }
        println!("\nRun the command again to retry failed downloads, or pass --repos to pick specific ones.");
    }
    Ok(())
}
