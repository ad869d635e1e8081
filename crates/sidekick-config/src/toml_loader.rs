//! TOML config file loading and creation.

use crate::schema::SidekickConfig;
use crate::validation;
use sidekick_common::ConfigError;
use std::path::Path;
use tracing::{info, warn};

/// Load config from a specific TOML file path.
///
/// Deserializes the file using serde defaults for any missing fields.
/// After loading, the config is validated; if validation fails, a warning
/// is logged and the default config is returned.
pub fn load_from_path(path: &Path) -> Result<SidekickConfig, ConfigError> {
    if !path.exists() {
        return Err(ConfigError::FileNotFound(path.to_path_buf()));
    }

    let content = std::fs::read_to_string(path)
        .map_err(|e| ConfigError::ParseError(format!("failed to read {}: {e}", path.display())))?;

    let config: SidekickConfig = toml::from_str(&content)
        .map_err(|e| ConfigError::ParseError(format!("failed to parse TOML: {e}")))?;

    // Validate and warn on errors, but still return a usable config
    if let Err(e) = validation::validate(&config) {
        warn!("config validation warning: {e}");
        warn!("falling back to default config");
        return Ok(SidekickConfig::default());
    }

    info!("loaded config from {}", path.display());
    Ok(config)
}

/// Load config from the platform-specific default path.
///
/// On macOS: `~/Library/Application Support/sidekick/config.toml`
/// On Linux: `~/.config/sidekick/config.toml`
///
/// If the file does not exist, creates a default config file and returns defaults.
pub fn load_default() -> Result<SidekickConfig, ConfigError> {
    let path = default_config_path()?;

    if !path.exists() {
        info!("no config found at {}, creating default", path.display());
        create_default_config(&path)?;
        return Ok(SidekickConfig::default());
    }

    load_from_path(&path)
}

/// Get the platform-specific default config file path.
pub fn default_config_path() -> Result<std::path::PathBuf, ConfigError> {
    let config_dir = dirs::config_dir()
        .ok_or_else(|| ConfigError::ParseError("could not determine config directory".into()))?;
    Ok(config_dir.join("sidekick").join("config.toml"))
}

/// Create a default TOML config file with documentation comments.
pub fn create_default_config(path: &Path) -> Result<(), ConfigError> {
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent).map_err(|e| {
            ConfigError::ParseError(format!(
                "failed to create config directory {}: {e}",
                parent.display()
            ))
        })?;
    }

    let content = default_config_toml();

    std::fs::write(path, content).map_err(|e| {
        ConfigError::ParseError(format!(
            "failed to write default config to {}: {e}",
            path.display()
        ))
    })?;

    info!("created default config at {}", path.display());
    Ok(())
}

/// Generate the default TOML config content with comments.
fn default_config_toml() -> String {
    r##"# Sidekick Configuration
# Schema version 1
# Only override what you want to change -- missing fields use defaults.

[api]
# key = "sk-..."              # or set OPENAI_API_KEY
# organization = "org-..."
# base_url = "https://api.openai.com/v1"
# proxy = "http://127.0.0.1:8080"

[model]
# name = "gpt-3.5-turbo"      # "code-*" models use the completions endpoint
# max_tokens = 1024
# temperature = 1.0           # 0.0-2.0
# top_p = 1.0                 # 0.0-1.0
"##
    .to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn missing_file_is_an_error() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nope.toml");
        let err = load_from_path(&path).unwrap_err();
        assert!(matches!(err, ConfigError::FileNotFound(_)));
    }

    #[test]
    fn loads_partial_config() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.toml");
        std::fs::write(&path, "[model]\nname = \"gpt-4\"\n").unwrap();

        let config = load_from_path(&path).unwrap();
        assert_eq!(config.model.name, "gpt-4");
        assert_eq!(config.model.max_tokens, 1024);
    }

    #[test]
    fn invalid_values_fall_back_to_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.toml");
        std::fs::write(&path, "[model]\ntemperature = 9.0\n").unwrap();

        let config = load_from_path(&path).unwrap();
        assert_eq!(config, SidekickConfig::default());
    }

    #[test]
    fn malformed_toml_is_a_parse_error() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.toml");
        std::fs::write(&path, "[model\nname=").unwrap();

        let err = load_from_path(&path).unwrap_err();
        assert!(matches!(err, ConfigError::ParseError(_)));
    }

    #[test]
    fn create_default_writes_parseable_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested").join("config.toml");
        create_default_config(&path).unwrap();

        let config = load_from_path(&path).unwrap();
        assert_eq!(config, SidekickConfig::default());
    }
}
