//! Init command implementation

use anyhow::{Result, bail};
use std::path::PathBuf;

use ojs_metrics::config::Config;

/// Write the commented default config to `config_path` (or the global path)
pub async fn init_command(config_path: Option<PathBuf>, force: bool) -> Result<()> {
    let config_path = config_path.unwrap_or_else(Config::global_config_path);

    if config_path.exists() && !force {
        bail!(
            "Configuration already exists: {}\nUse --force to overwrite.",
            config_path.display()
        );
    }

    Config::write_default(&config_path)?;
    println!("Created: {}", config_path.display());
    println!("Set [auth] api_key (or OJS_API_KEY) before fetching statistics.");

    Ok(())
}
