//! Sidekick configuration system.
//!
//! TOML-based configuration with sensible defaults and full validation.
//! All sections use `serde(default)` so partial configs work out of the
//! box.

pub mod schema;
pub mod toml_loader;
pub mod toml_writer;
pub mod validation;

pub use schema::{ApiConfig, ModelConfig, SidekickConfig, CONFIG_SCHEMA_VERSION};
pub use toml_loader::{default_config_path, load_from_path};
pub use toml_writer::{persist_api_key, save_config, save_config_to_path};

use sidekick_common::ConfigError;

/// Convenience function to load config from the platform default path.
///
/// Loads `config.toml` from the OS config directory, creating a commented
/// default file if none exists, and validates the result.
pub fn load_config() -> Result<SidekickConfig, ConfigError> {
    let config = toml_loader::load_default()?;
    validation::validate(&config)?;
    Ok(config)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn config_schema_version_is_1() {
        assert_eq!(CONFIG_SCHEMA_VERSION, 1);
    }

    #[test]
    fn default_config_validates() {
        let config = SidekickConfig::default();
        assert!(validation::validate(&config).is_ok());
    }
}
