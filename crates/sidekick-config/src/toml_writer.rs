//! Write SidekickConfig to TOML on disk.
//!
//! Supports atomic writes (write to `.tmp`, then rename) to prevent
//! corruption if the process crashes mid-write.

use std::path::Path;

use sidekick_common::ConfigError;

use crate::schema::SidekickConfig;
use crate::toml_loader::{default_config_path, load_from_path};

/// Write config to the platform default path.
pub fn save_config(config: &SidekickConfig) -> Result<(), ConfigError> {
    let path = default_config_path()?;
    save_config_to_path(config, &path)
}

/// Write config to a specific path.
///
/// Creates parent directories if they don't exist. Uses atomic write
/// (write to `.tmp` file, then rename) to prevent partial writes.
pub fn save_config_to_path(config: &SidekickConfig, path: &Path) -> Result<(), ConfigError> {
    let toml_str = toml::to_string_pretty(config)
        .map_err(|e| ConfigError::WriteError(format!("failed to serialize config to TOML: {e}")))?;

    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent).map_err(|e| {
            ConfigError::WriteError(format!(
                "failed to create config directory {}: {e}",
                parent.display()
            ))
        })?;
    }

    let tmp_path = path.with_extension("toml.tmp");
    std::fs::write(&tmp_path, &toml_str).map_err(|e| {
        ConfigError::WriteError(format!(
            "failed to write config to {}: {e}",
            tmp_path.display()
        ))
    })?;

    if let Err(e) = std::fs::rename(&tmp_path, path) {
        // Rename failed -- try direct write as fallback (Windows compat)
        tracing::warn!("atomic rename failed ({e}), falling back to direct write");
        std::fs::write(path, &toml_str).map_err(|e2| {
            ConfigError::WriteError(format!("failed to write config to {}: {e2}", path.display()))
        })?;
    }

    tracing::debug!(path = %path.display(), "config saved to disk");
    Ok(())
}

/// Store an interactively entered API key in the config file at `path`,
/// preserving everything else already configured there.
pub fn persist_api_key(path: &Path, key: &str) -> Result<(), ConfigError> {
    let mut config = match load_from_path(path) {
        Ok(config) => config,
        Err(ConfigError::FileNotFound(_)) => SidekickConfig::default(),
        Err(e) => return Err(e),
    };
    config.api.key = Some(key.to_string());
    save_config_to_path(&config, path)
}
