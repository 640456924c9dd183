use clap::Subcommand;
use hfm_core::config::HfmConfig;

use super::GlobalArgs;

#[derive(Subcommand)]
pub enum ConfigAction {
    /// Initialize ~/.hfm/ with a default config and the storage directories
    Init,
    /// Show the effective configuration
    Show,
}

pub fn run(global: &GlobalArgs, action: ConfigAction) -> anyhow::Result<()> {
    match action {
        ConfigAction::Init => {
            let home = HfmConfig::init()?;
            let config = global.load_config()?;
            let layout = config.layout();
            layout.ensure_dirs()?;

            println!("Initialized hfm at {}", home.display());
            println!("  config:    {}", HfmConfig::config_path()?.display());
            println!("  archives:  {}", layout.archives_dir().display());
            println!("  extracted: {}", layout.extracted_dir().display());
            Ok(())
        }
        ConfigAction::Show => {
            let config = global.load_config()?;
            let toml_str = toml::to_string_pretty(&config)?;
            println!("{toml_str}");
            Ok(())
        }
    }
}
