use clap::Args;
use hfm_archive::catalog;
use hfm_archive::extract::{extract_all, extract_selected, ExtractSummary};

use super::{parse_ids, require_git, GlobalArgs};

#[derive(Args)]
pub struct ExtractArgs {
    /// Repositories to extract (owner/name); all archives when omitted
    repos: Vec<String>,
    /// List downloaded archives and whether they are extracted
    #[arg(long)]
    list: bool,
}

pub fn run(global: &GlobalArgs, args: ExtractArgs) -> anyhow::Result<()> {
    let config = global.load_config()?;
    let layout = config.layout();

    if args.list {
        let entries = catalog::downloaded_repos(&layout);
        if entries.is_empty() {
            println!("No downloaded repositories found.");
            return Ok(());
        }
        println!("Available repositories:");
        for entry in &entries {
            let marker = if entry.extraction_path(&layout).exists() {
                " (extracted)"
            } else {
                ""
            };
            println!("- {}{marker}", entry.display_name());
        }
        return Ok(());
    }

    require_git()?;
    let summary = if args.repos.is_empty() {
        let count = catalog::downloaded_repos(&layout).len();
        if count == 0 {
            println!("No downloaded repositories found.");
            return Ok(());
        }
        println!("Found {count} repositories to extract");
        extract_all(&layout)
    } else {
        extract_selected(&layout, &parse_ids(&args.repos)?)
    };

    print_summary(&summary);
    println!(
        "Extracted repositories are in: {}",
        layout.extracted_dir().display()
    );
    Ok(())
}

fn print_summary(summary: &ExtractSummary) {
    println!("\nExtraction complete!");
    println!("Successfully extracted:      {}", summary.extracted);
    println!("Failed extractions:          {}", summary.failed);
    println!("Skipped (already extracted): {}", summary.skipped);
    println!("Not found:                   {}", summary.not_found);
    for (name, reason) in &summary.failures {
        println!("  {name}: {reason}");
    }
}
