//! Configuration schema types for Sidekick.
//!
//! All structs use `serde(default)` so partial configs work correctly.
//! Missing fields are filled with defaults matching the hosted-API
//! documentation values.

use serde::{Deserialize, Serialize};

/// Current config schema version.
pub const CONFIG_SCHEMA_VERSION: u32 = 1;

/// Default chat completion endpoint base.
pub const DEFAULT_BASE_URL: &str = "https://api.openai.com/v1";

/// Default model when none is configured.
pub const DEFAULT_MODEL: &str = "gpt-3.5-turbo";

// =============================================================================
// API Config
// =============================================================================

/// Credentials and endpoint configuration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ApiConfig {
    /// API key. May also come from `OPENAI_API_KEY` or be entered
    /// interactively at first use.
    pub key: Option<String>,
    /// Organization id sent as the `OpenAI-Organization` header.
    pub organization: Option<String>,
    /// Endpoint base URL (no trailing slash).
    pub base_url: String,
    /// Optional HTTP(S) proxy URL.
    pub proxy: Option<String>,
}

impl Default for ApiConfig {
    fn default() -> Self {
        Self {
            key: None,
            organization: None,
            base_url: DEFAULT_BASE_URL.into(),
            proxy: None,
        }
    }
}

// =============================================================================
// Model Config
// =============================================================================

/// Model selection and sampling parameters.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ModelConfig {
    /// Model name. Names starting with `code-` use the legacy
    /// completions endpoint and plain-text rendering.
    pub name: String,
    pub max_tokens: u32,
    pub temperature: f64,
    pub top_p: f64,
}

impl Default for ModelConfig {
    fn default() -> Self {
        Self {
            name: DEFAULT_MODEL.into(),
            max_tokens: 1024,
            temperature: 1.0,
            top_p: 1.0,
        }
    }
}

// =============================================================================
// Root Config
// =============================================================================

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SidekickConfig {
    pub api: ApiConfig,
    pub model: ModelConfig,
}
