use clap::Args;
use comfy_table::{Cell, Color, Table};
use console::style;
use hfm_archive::verify::{verify_all, verify_repository, VerificationReport};
use hfm_core::models::verification::VerificationStatus;

use super::{parse_ids, require_git, GlobalArgs};

#[derive(Args)]
pub struct VerifyArgs {
    /// Repositories to verify (owner/name); every archive when omitted
    repos: Vec<String>,
    /// Also recompute the bundle checksum and every LFS object hash
    #[arg(long)]
    deep: bool,
}

fn status_cell(status: VerificationStatus) -> Cell {
    let color = match status {
        VerificationStatus::Valid => Color::Green,
        VerificationStatus::Invalid => Color::Red,
        VerificationStatus::Missing => Color::DarkGrey,
        VerificationStatus::IncompleteLfs => Color::Yellow,
    };
    Cell::new(status).fg(color)
}

pub fn run(global: &GlobalArgs, args: VerifyArgs) -> anyhow::Result<()> {
    require_git()?;
    let config = global.load_config()?;
    let layout = config.layout();

    let report = if args.repos.is_empty() {
        verify_all(&layout, args.deep)
    } else {
        let results = parse_ids(&args.repos)?
            .iter()
            .map(|id| verify_repository(&layout, id, args.deep))
            .collect();
        VerificationReport { results }
    };

    if report.total() == 0 {
        println!("No downloaded repositories found.");
        return Ok(());
    }
    println!("Verifying {} repositories...", report.total());

    let mut table = Table::new();
    table.set_header(vec!["REPOSITORY", "STATUS", "LFS OBJECTS", "WARNINGS"]);
    for r in &report.results {
        table.add_row(vec![
            Cell::new(&r.label),
            status_cell(r.status),
            Cell::new(r.lfs_objects),
            Cell::new(r.warnings.len()),
        ]);
    }
    println!("{table}");

    println!("\nVerification Results:");
    println!("---------------------");
    println!("Total repositories: {}", report.total());
    println!(
        "{} {}",
        style("Valid bundles:").green(),
        report.count(VerificationStatus::Valid)
    );
    println!(
        "{} {}",
        style("Invalid bundles:").red(),
        report.count(VerificationStatus::Invalid)
    );
    println!("Missing bundles: {}", report.count(VerificationStatus::Missing));
    println!(
        "{} {}",
        style("Incomplete LFS:").yellow(),
        report.count(VerificationStatus::IncompleteLfs)
    );
    println!("Repositories with warnings: {}", report.warning_count());
    println!("LFS-enabled repositories: {}", report.lfs_repos());

    let problems: Vec<_> = report
        .results
        .iter()
        .filter(|r| !r.is_valid() || !r.warnings.is_empty())
        .collect();
    if !problems.is_empty() {
        println!("\nDetailed issue report:");
        for r in problems {
            println!("\n- {} ({})", r.label, r.status);
            for err in &r.errors {
                println!("  error: {err}");
            }
            for warning in &r.warnings {
                println!("  warning: {warning}");
            }
        }
    }

    let top = report.top_lfs_patterns(5);
    if !top.is_empty() {
        println!("\nCommon LFS patterns:");
        for (pattern, count) in top {
            println!("  {pattern}: {count} repos");
        }
    }
    Ok(())
}
