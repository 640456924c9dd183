use clap::Args;
use console::style;
use hfm_sync::clean::{delete_all, DeleteOptions, DeleteReport, CONFIRMATION_PHRASE};

use super::GlobalArgs;

#[derive(Args)]
pub struct DeleteAllArgs {
    /// Account whose repositories are deleted
    #[arg(long)]
    target_user: String,
    /// Confirmation phrase; prompted for when omitted
    #[arg(long)]
    confirm: Option<String>,
}

pub async fn run(global: &GlobalArgs, args: DeleteAllArgs) -> anyhow::Result<()> {
    let config = global.load_config()?;
    if global.resolve_token()?.is_none() {
        anyhow::bail!("deleting repositories needs a token (--token, HF_TOKEN or `hfm auth login`)");
    }
    let hub = global.hub(&config)?;

    println!(
        "{}",
        style(format!(
            "WARNING: This will PERMANENTLY DELETE ALL CONTENT under {}",
            args.target_user
        ))
        .red()
        .bold()
    );
    println!("This includes all models, datasets and spaces.\n");

    let confirmation = match args.confirm {
        Some(c) => c,
        None => {
            eprint!("Type '{CONFIRMATION_PHRASE}' to confirm: ");
            let mut input = String::new();
            std::io::stdin().read_line(&mut input)?;
            input.trim_end_matches(['\r', '\n']).to_string()
        }
    };

    let opts = DeleteOptions::from_config(&config);
    match delete_all(&hub, &args.target_user, &confirmation, &opts).await {
        DeleteReport::Aborted => println!("Aborted: confirmation phrase not matched"),
        DeleteReport::Completed(stats) => {
            println!(
                "Deleted {}/{} repositories ({} failed)",
                stats.deleted.len(),
                stats.found,
                stats.failed.len()
            );
            for (id, kind, error) in &stats.failed {
                println!("  {id} ({kind}): {error}");
            }
            if stats.is_clean() {
                println!("{}", style("Account fully cleaned").green());
            } else {
                println!(
                    "{}",
                    style(format!(
                        "Warning: {} repositories could not be deleted",
                        stats.remaining.len()
                    ))
                    .yellow()
                );
                for repo in &stats.remaining {
                    println!("  {} ({})", repo.id, repo.kind);
                }
            }
        }
    }
    Ok(())
}
