use clap::Args;
use comfy_table::{Cell, CellAlignment, Table};
use hfm_core::models::repo::{human_size, RemoteRepo, RepoKind, SortOrder};
use hfm_hub::{list_kinds, HubProvider};
use hfm_sync::download::resolve_sizes;

use super::GlobalArgs;

#[derive(Args)]
pub struct ListArgs {
    /// Owner to list (defaults to the configured owner)
    owner: Option<String>,
    /// Repository kinds to include
    #[arg(long = "kind", default_value = "model")]
    kinds: Vec<RepoKind>,
    /// Sort by size: asc, desc or none
    #[arg(long, default_value = "asc")]
    sort: SortOrder,
    /// Show only the first N repositories (0 for all)
    #[arg(long, default_value_t = 0)]
    top: usize,
}

/// List, size, sort and truncate an owner's repositories.
pub async fn sized_listing(
    hub: &dyn HubProvider,
    owner: &str,
    kinds: &[RepoKind],
    sort: SortOrder,
    top: usize,
) -> Vec<RemoteRepo> {
    let mut repos = list_kinds(hub, owner, kinds).await;
    resolve_sizes(hub, &mut repos).await;
    sort.sort_by_size(&mut repos);
    if top > 0 {
        repos.truncate(top);
    }
    repos
}

/// Print repositories with sizes and a combined total.
pub fn print_sizes(repos: &[RemoteRepo]) {
    let mut table = Table::new();
    table.set_header(vec!["REPOSITORY", "KIND", "SIZE"]);
    for repo in repos {
        let size = repo.size.map(human_size).unwrap_or_else(|| "-".to_string());
        table.add_row(vec![
            Cell::new(&repo.id),
            Cell::new(repo.kind),
            Cell::new(size).set_alignment(CellAlignment::Right),
        ]);
    }
    println!("{table}");

    let total: u64 = repos.iter().filter_map(|r| r.size).sum();
    println!("\nTotal repositories: {}", repos.len());
    println!("Combined size: {}", human_size(total));
}

pub async fn run(global: &GlobalArgs, args: ListArgs) -> anyhow::Result<()> {
    let config = global.load_config()?;
    let hub = global.hub(&config)?;
    let owner = args.owner.unwrap_or_else(|| config.default_owner.clone());

    let repos = sized_listing(&hub, &owner, &args.kinds, args.sort, args.top).await;
    if repos.is_empty() {
        println!("No repositories found for {owner}.");
        return Ok(());
    }
    print_sizes(&repos);
    Ok(())
}
