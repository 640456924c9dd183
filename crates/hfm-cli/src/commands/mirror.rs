use clap::Args;
use hfm_archive::retry::RetryPolicy;
use hfm_core::models::repo::RepoKind;
use hfm_sync::clean::DeleteOptions;
use hfm_sync::mirror::{mirror_all, MirrorOptions};

use super::{require_git, GlobalArgs};

#[derive(Args)]
pub struct MirrorArgs {
    /// Account that receives the copies
    #[arg(long)]
    target_user: String,
    /// Account to copy from (defaults to the configured owner)
    #[arg(long)]
    source_user: Option<String>,
    /// Repository kinds to mirror
    #[arg(long = "kind", default_value = "model")]
    kinds: Vec<RepoKind>,
    /// Delete an existing target repository before pushing into it
    #[arg(long)]
    replace: bool,
    /// Delete every target repository of the mirrored kinds first
    #[arg(long)]
    clean_target: bool,
}

pub async fn run(global: &GlobalArgs, args: MirrorArgs) -> anyhow::Result<()> {
    require_git()?;
    let config = global.load_config()?;
    if global.resolve_token()?.is_none() {
        anyhow::bail!("mirroring needs a token (--token, HF_TOKEN or `hfm auth login`)");
    }
    let hub = global.hub(&config)?;
    let source = args
        .source_user
        .unwrap_or_else(|| config.default_owner.clone());

    let opts = MirrorOptions {
        replace: args.replace,
        clean_target: args.clean_target,
        kinds: args.kinds,
        policy: RetryPolicy::from_config(&config.retry),
        delete: DeleteOptions::from_config(&config),
    };

    println!("Mirroring {source} -> {}...", args.target_user);
    let report = mirror_all(&hub, &source, &args.target_user, &opts).await?;

    if let Some(cleaned) = &report.cleaned {
        println!(
            "Cleaned target: {} deleted, {} remaining",
            cleaned.deleted.len(),
            cleaned.remaining.len()
        );
    }
    println!(
        "\nMirror complete: {} mirrored | {} failed | {} total",
        report.mirrored.len(),
        report.failed.len(),
        report.total
    );
    for (id, error) in &report.failed {
        println!("  {id}: {error}");
    }
    Ok(())
}
