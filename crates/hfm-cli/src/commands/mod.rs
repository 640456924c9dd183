pub mod auth;
pub mod clean_orphans;
pub mod config;
pub mod delete_all;
pub mod download;
pub mod extract;
pub mod list;
pub mod mirror;
pub mod verify;

use std::collections::HashSet;
use std::path::PathBuf;

use clap::{Args, Subcommand};
use hfm_auth::{KeyringStore, ResolvedToken, TokenResolver};
use hfm_core::config::HfmConfig;
use hfm_core::models::repo::RepoId;
use hfm_hub::huggingface::HuggingFaceProvider;

/// Flags accepted by every subcommand.
#[derive(Args, Debug, Clone)]
pub struct GlobalArgs {
    /// Config file to use instead of ~/.hfm/config.toml
    #[arg(long, global = true)]
    pub config: Option<PathBuf>,
    /// Storage directory, overriding the configured one
    #[arg(long, global = true)]
    pub storage: Option<PathBuf>,
    /// Hugging Face access token (defaults to HF_TOKEN, keychain, token file)
    #[arg(long, global = true)]
    pub token: Option<String>,
    /// Debug logging
    #[arg(short, long, global = true)]
    pub verbose: bool,
}

impl GlobalArgs {
    pub fn load_config(&self) -> anyhow::Result<HfmConfig> {
        let mut config = match &self.config {
            Some(path) => HfmConfig::load_from(path)?,
            None => HfmConfig::load()?,
        };
        if let Some(storage) = &self.storage {
            config.storage_dir = storage.clone();
        }
        Ok(config)
    }

    pub fn resolve_token(&self) -> anyhow::Result<Option<ResolvedToken>> {
        let store = KeyringStore::new();
        let token = TokenResolver::from_env(&store).resolve(self.token.as_deref())?;
        match &token {
            Some(t) => tracing::debug!("using token from {}", t.source),
            None => tracing::debug!("no token found, using anonymous access"),
        }
        Ok(token)
    }

    pub fn hub(&self, config: &HfmConfig) -> anyhow::Result<HuggingFaceProvider> {
        let token = self.resolve_token()?.map(|t| t.value);
        Ok(HuggingFaceProvider::new(
            config.endpoint.clone(),
            token,
            config.git_user.clone(),
        )?)
    }
}

#[derive(Subcommand)]
pub enum Command {
    /// Initialize and show hfm configuration
    Config {
        #[command(subcommand)]
        action: config::ConfigAction,
    },
    /// Manage the stored Hugging Face token
    Auth {
        #[command(subcommand)]
        action: auth::AuthAction,
    },
    /// List an owner's repositories with their sizes
    List(list::ListArgs),
    /// Archive repositories as git bundles
    Download(download::DownloadArgs),
    /// Check out working trees from archived bundles
    Extract(extract::ExtractArgs),
    /// Check archives, metadata and LFS companions
    Verify(verify::VerifyArgs),
    /// Delete every repository under an account
    DeleteAll(delete_all::DeleteAllArgs),
    /// Copy every repository of one owner to another
    Mirror(mirror::MirrorArgs),
    /// Remove archives without metadata and metadata without archives
    CleanOrphans(clean_orphans::CleanOrphansArgs),
}

pub async fn run(global: GlobalArgs, cmd: Command) -> anyhow::Result<()> {
    match cmd {
        Command::Config { action } => config::run(&global, action),
        Command::Auth { action } => auth::run(&global, action).await,
        Command::List(args) => list::run(&global, args).await,
        Command::Download(args) => download::run(&global, args).await,
        Command::Extract(args) => extract::run(&global, args),
        Command::Verify(args) => verify::run(&global, args),
        Command::DeleteAll(args) => delete_all::run(&global, args).await,
        Command::Mirror(args) => mirror::run(&global, args).await,
        Command::CleanOrphans(args) => clean_orphans::run(&global, args),
    }
}

/// Fail early when git is not installed.
pub fn require_git() -> anyhow::Result<String> {
    hfm_archive::git_ops::version()
        .map_err(|e| anyhow::anyhow!("git is required but could not be run: {e}"))
}

/// Parse `owner/name` arguments, dropping repeats.
pub fn parse_ids(raw: &[String]) -> anyhow::Result<Vec<RepoId>> {
    let mut seen = HashSet::new();
    let mut ids = Vec::new();
    for s in raw {
        let id: RepoId = s.parse()?;
        if seen.insert(id.clone()) {
            ids.push(id);
        }
    }
    Ok(ids)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_ids_drops_repeats() {
        let raw: Vec<String> = ["org/a", "org/b", "org/a"].iter().map(|s| s.to_string()).collect();
        let ids = parse_ids(&raw).unwrap();
        let names: Vec<&str> = ids.iter().map(|id| id.as_str()).collect();
        assert_eq!(names, vec!["org/a", "org/b"]);
        assert!(parse_ids(&["no-slash".to_string()]).is_err());
    }
}
