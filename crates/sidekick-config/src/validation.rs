//! Configuration validation.
//!
//! Checks sampling parameter ranges and endpoint shape.

use crate::schema::SidekickConfig;
use sidekick_common::ConfigError;

/// Run all validations on a config, collecting all errors.
pub fn validate(config: &SidekickConfig) -> Result<(), ConfigError> {
    let mut errors: Vec<String> = Vec::new();

    if config.model.name.trim().is_empty() {
        errors.push("model.name must not be empty".into());
    }

    if config.model.max_tokens == 0 {
        errors.push("model.max_tokens must be at least 1".into());
    }

    validate_range_f64(
        &mut errors,
        "model.temperature",
        config.model.temperature,
        0.0,
        2.0,
    );
    validate_range_f64(&mut errors, "model.top_p", config.model.top_p, 0.0, 1.0);

    if !config.api.base_url.starts_with("http://") && !config.api.base_url.starts_with("https://") {
        errors.push(format!(
            "api.base_url must be an http(s) URL, got '{}'",
            config.api.base_url
        ));
    }
    if config.api.base_url.ends_with('/') {
        errors.push("api.base_url must not end with a trailing slash".into());
    }

    if let Some(proxy) = &config.api.proxy {
        if !proxy.contains("://") {
            errors.push(format!("api.proxy must be a full URL, got '{proxy}'"));
        }
    }

    if errors.is_empty() {
        Ok(())
    } else {
        Err(ConfigError::ValidationError(errors.join("; ")))
    }
}

fn validate_range_f64(errors: &mut Vec<String>, field: &str, value: f64, min: f64, max: f64) {
    if !(min..=max).contains(&value) {
        errors.push(format!("{field} must be between {min} and {max}, got {value}"));
    }
}
