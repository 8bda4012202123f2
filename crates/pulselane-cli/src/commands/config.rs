use std::error::Error;

use clap::Subcommand;
use pulselane_core::EngineConfig;

use crate::common;

#[derive(Subcommand)]
pub enum ConfigAction {
    /// Print the active configuration as TOML
    Show,
    /// Print the configuration file path
    Path,
    /// Write the default configuration file if none exists
    Init,
}

pub fn run(action: ConfigAction) -> Result<(), Box<dyn Error>> {
    match action {
        ConfigAction::Show => {
            let config = common::load_engine_config()?;
            print!("{}", config.to_toml()?);
            Ok(())
        }
        ConfigAction::Path => {
            println!("{}", common::config_path()?.display());
            Ok(())
        }
        ConfigAction::Init => {
            let path = common::config_path()?;
            if path.exists() {
                println!("configuration already exists at {}", path.display());
                return Ok(());
            }
            std::fs::write(&path, EngineConfig::default().to_toml()?)?;
            println!("default configuration written to {}", path.display());
            Ok(())
        }
    }
}
