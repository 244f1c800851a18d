// Configuration loader
// Loads settings from ~/.jobworker/config.toml, falling back to defaults

use anyhow::{bail, Context, Result};
use std::fs;
use std::path::Path;

use super::settings::Config;

/// Load configuration from the user config file, or defaults if absent
pub fn load_config() -> Result<Config> {
    let Some(home) = dirs::home_dir() else {
        return Ok(Config::default());
    };

    let config_path = home.join(".jobworker").join("config.toml");
    if !config_path.exists() {
        return Ok(Config::default());
    }

    load_config_from(&config_path)
}

/// Load configuration from an explicit TOML file
pub fn load_config_from(path: &Path) -> Result<Config> {
    let contents = fs::read_to_string(path)
        .with_context(|| format!("Failed to read {}", path.display()))?;

    let config: Config = toml::from_str(&contents)
        .with_context(|| format!("Failed to parse {}", path.display()))?;

    if config.client.timeout_seconds == 0 {
        bail!(
            "Invalid {}: client.timeout_seconds must be greater than 0",
            path.display()
        );
    }

    Ok(config)
}
