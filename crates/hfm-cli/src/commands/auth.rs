use clap::Subcommand;
use hfm_auth::{CredentialStore, KeyringStore, TOKEN_KEY};
use hfm_hub::huggingface::HuggingFaceProvider;
use hfm_hub::HubProvider;

use super::GlobalArgs;

#[derive(Subcommand)]
pub enum AuthAction {
    /// Store a Hugging Face token in the OS keychain
    Login {
        /// Access token (will prompt if not provided)
        #[arg(long)]
        hf_token: Option<String>,
        /// Store the token without checking it against the hub
        #[arg(long)]
        no_verify: bool,
    },
    /// Remove the stored token
    Logout,
    /// Show which token is in use and the account it belongs to
    Status,
}

pub async fn run(global: &GlobalArgs, action: AuthAction) -> anyhow::Result<()> {
    match action {
        AuthAction::Login {
            hf_token,
            no_verify,
        } => {
            let token = match hf_token {
                Some(t) => t,
                None => {
                    eprint!("Enter Hugging Face token: ");
                    let mut input = String::new();
                    std::io::stdin().read_line(&mut input)?;
                    input.trim().to_string()
                }
            };
            if token.is_empty() {
                anyhow::bail!("Token cannot be empty");
            }

            if !no_verify {
                let config = global.load_config()?;
                let hub = HuggingFaceProvider::new(
                    config.endpoint.clone(),
                    Some(token.clone()),
                    config.git_user.clone(),
                )?;
                match hub.whoami().await? {
                    Some(name) => println!("Token belongs to '{name}'"),
                    None => anyhow::bail!("The hub did not accept this token"),
                }
            }

            KeyringStore::new().store(TOKEN_KEY, &token)?;
            println!("Token stored in OS keychain as '{TOKEN_KEY}'");
            Ok(())
        }
        AuthAction::Logout => {
            KeyringStore::new().delete(TOKEN_KEY)?;
            println!("Token removed from OS keychain");
            Ok(())
        }
        AuthAction::Status => {
            let Some(token) = global.resolve_token()? else {
                println!("No token configured; requests are anonymous");
                return Ok(());
            };
            println!("Token source: {}", token.source);

            let config = global.load_config()?;
            let hub = global.hub(&config)?;
            match hub.whoami().await {
                Ok(Some(name)) => println!("Logged in as '{name}'"),
                Ok(None) => println!("Token was not accepted"),
                Err(e) => println!("Token check failed: {e}"),
            }
            Ok(())
        }
    }
}
