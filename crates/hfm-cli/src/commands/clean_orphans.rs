use clap::Args;
use hfm_archive::catalog::{orphans, remove_orphans, Orphan};

use super::GlobalArgs;

#[derive(Args)]
pub struct CleanOrphansArgs {
    /// Only report what would be removed
    #[arg(long)]
    dry_run: bool,
}

pub fn run(global: &GlobalArgs, args: CleanOrphansArgs) -> anyhow::Result<()> {
    let config = global.load_config()?;
    let layout = config.layout();

    let found = if args.dry_run {
        orphans(&layout)
    } else {
        remove_orphans(&layout)?
    };

    if found.is_empty() {
        println!("No orphaned files in {}", layout.archives_dir().display());
        return Ok(());
    }

    let verb = if args.dry_run { "Would remove" } else { "Removed" };
    for orphan in &found {
        let why = match orphan {
            Orphan::ArchiveWithoutMetadata(_) => "archive without metadata",
            Orphan::SidecarWithoutArchive(_) => "no matching archive",
        };
        println!("{verb} {} ({why})", orphan.path().display());
    }
    println!("\n{} orphaned files", found.len());
    Ok(())
}
