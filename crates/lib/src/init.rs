//! Initialize the configuration directory: create ~/.bugline and a default config file.

use anyhow::{Context, Result};
use std::path::{Path, PathBuf};

/// Create the config directory and a default `config.json` if they do not exist.
/// Returns the config directory path.
pub fn init_config_dir(config_path: &Path) -> Result<PathBuf> {
    let config_dir = config_path
        .parent()
        .filter(|p| !p.as_os_str().is_empty())
        .unwrap_or_else(|| Path::new("."));
    std::fs::create_dir_all(config_dir)
        .with_context(|| format!("creating config directory {}", config_dir.display()))?;

    if !config_path.exists() {
        std::fs::write(config_path, b"{}")
            .with_context(|| format!("writing default config to {}", config_path.display()))?;
        log::info!("created default config at {}", config_path.display());
    }
    Ok(config_dir.to_path_buf())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn init_creates_dir_and_default_config_and_is_idempotent() {
        let dir = std::env::temp_dir().join(format!("bugline-init-test-{}", uuid::Uuid::new_v4()));
        let config_path = dir.join("config.json");

        init_config_dir(&config_path).expect("first init");
        assert_eq!(std::fs::read_to_string(&config_path).unwrap(), "{}");

        // Existing config must not be overwritten.
        std::fs::write(&config_path, "{\"gateway\":{}}").unwrap();
        init_config_dir(&config_path).expect("second init");
        assert_eq!(
            std::fs::read_to_string(&config_path).unwrap(),
            "{\"gateway\":{}}"
        );

        let _ = std::fs::remove_dir_all(&dir);
    }
}
