//! Chat relay engine for Sidekick.
//!
//! Provides the OpenAI chat and legacy completions clients with:
//! - Streaming (SSE) support
//! - Opaque continuation identifiers for multi-turn dialogue
//! - Model-class routing between the two endpoint generations
//! - HTTP status to user-facing error mapping

pub mod chat_api;
pub mod completions_api;
pub mod conversation;
pub mod streaming;

use std::sync::Arc;

use async_trait::async_trait;
use tokio::sync::mpsc;

pub use chat_api::ChatApiClient;
pub use completions_api::CompletionsApiClient;
pub use conversation::{ConversationStore, Role, StoredMessage};

/// Marker prefix for code-completion-style models. These route to the
/// legacy completions endpoint and render as plain text in the UI.
pub const CODE_MODEL_PREFIX: &str = "code-";

/// How many user/assistant turns a stored conversation keeps.
pub const MAX_CONVERSATION_TURNS: usize = 20;

#[async_trait]
pub trait ChatClient: Send + Sync {
    /// Stream one completion. Partial text is delivered through `chunks`
    /// as it arrives; the returned [`Completion`] carries the full text
    /// and the continuation tokens for the next turn. Dropping the future
    /// abandons the request.
    async fn send_streaming(
        &self,
        request: ChatRequest,
        chunks: mpsc::UnboundedSender<String>,
    ) -> Result<Completion, ChatError>;
}

/// One streaming request against a [`ChatClient`].
#[derive(Debug, Clone)]
pub struct ChatRequest {
    pub prompt: String,
    /// Continuation tokens from a previous turn, if resuming a dialogue.
    pub continuation: Option<Continuation>,
}

/// Opaque tokens identifying the dialogue and the parent message to
/// resume from. Callers thread these into the next request unchanged.
#[derive(Debug, Clone, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub struct Continuation {
    pub conversation_id: String,
    pub message_id: String,
}

/// Final result of a streaming completion.
#[derive(Debug, Clone)]
pub struct Completion {
    pub text: String,
    pub continuation: Continuation,
}

/// Which endpoint generation a model belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ModelClass {
    /// Chat completion models (`/chat/completions`).
    Chat,
    /// Code-completion models on the legacy `/completions` endpoint.
    Completions,
}

impl ModelClass {
    pub fn for_model(name: &str) -> Self {
        if name.starts_with(CODE_MODEL_PREFIX) {
            Self::Completions
        } else {
            Self::Chat
        }
    }

    /// Chat model output is markdown; code-model output is plain text.
    pub fn renders_markdown(self) -> bool {
        matches!(self, Self::Chat)
    }
}

/// Client configuration, baked into the client at construction time.
#[derive(Debug, Clone, PartialEq)]
pub struct ClientConfig {
    pub api_key: String,
    pub organization: Option<String>,
    pub base_url: String,
    pub model: String,
    pub max_tokens: u32,
    pub temperature: f64,
    pub top_p: f64,
    pub proxy: Option<String>,
}

impl ClientConfig {
    pub fn new(api_key: impl Into<String>) -> Self {
        Self {
            api_key: api_key.into(),
            organization: None,
            base_url: "https://api.openai.com/v1".to_string(),
            model: "gpt-3.5-turbo".to_string(),
            max_tokens: 1024,
            temperature: 1.0,
            top_p: 1.0,
            proxy: None,
        }
    }

    pub fn with_model(mut self, model: impl Into<String>) -> Self {
        self.model = model.into();
        self
    }

    pub fn with_organization(mut self, organization: impl Into<String>) -> Self {
        self.organization = Some(organization.into());
        self
    }

    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into();
        self
    }

    pub fn with_max_tokens(mut self, max_tokens: u32) -> Self {
        self.max_tokens = max_tokens;
        self
    }

    pub fn with_temperature(mut self, temperature: f64) -> Self {
        self.temperature = temperature;
        self
    }

    pub fn with_top_p(mut self, top_p: f64) -> Self {
        self.top_p = top_p;
        self
    }

    pub fn with_proxy(mut self, proxy: impl Into<String>) -> Self {
        self.proxy = Some(proxy.into());
        self
    }

    /// Build the HTTP client, applying the configured proxy.
    pub(crate) fn build_http(&self) -> Result<reqwest::Client, ChatError> {
        let mut builder = reqwest::Client::builder();
        if let Some(proxy) = &self.proxy {
            let proxy = reqwest::Proxy::all(proxy)
                .map_err(|e| ChatError::Unknown(format!("invalid proxy '{proxy}': {e}")))?;
            builder = builder.proxy(proxy);
        }
        builder
            .build()
            .map_err(|e| ChatError::Unknown(e.to_string()))
    }
}

/// Construct the client matching the configured model's class. The choice
/// is made once here; callers hold the result behind `Arc<dyn ChatClient>`.
pub fn build_client(config: ClientConfig) -> Result<Arc<dyn ChatClient>, ChatError> {
    match ModelClass::for_model(&config.model) {
        ModelClass::Chat => Ok(Arc::new(ChatApiClient::new(config)?)),
        ModelClass::Completions => Ok(Arc::new(CompletionsApiClient::new(config)?)),
    }
}

#[derive(Debug, thiserror::Error)]
pub enum ChatError {
    #[error("no API key configured")]
    MissingApiKey,
    #[error("incompatible request (HTTP {status}): {detail}")]
    Incompatible { status: u16, detail: String },
    #[error("unauthorized")]
    Unauthorized,
    #[error("forbidden")]
    Forbidden,
    #[error("rate limited")]
    RateLimited,
    #[error("server error: {0}")]
    Server(String),
    #[error("HTTP {status} {status_text}")]
    Transport { status: u16, status_text: String },
    #[error("network error: {0}")]
    Network(String),
    #[error("parse error: {0}")]
    Parse(String),
    #[error("{0}")]
    Unknown(String),
}

impl ChatError {
    /// Map a non-success HTTP response to the error taxonomy.
    pub fn from_status(status: reqwest::StatusCode, body: &str) -> Self {
        let detail = extract_api_error(body);
        match status.as_u16() {
            400 => Self::Incompatible { status: 400, detail },
            401 => Self::Unauthorized,
            403 => Self::Forbidden,
            404 => Self::Incompatible { status: 404, detail },
            429 => Self::RateLimited,
            500 => Self::Server(detail),
            code => Self::Transport {
                status: code,
                status_text: status
                    .canonical_reason()
                    .unwrap_or("unknown status")
                    .to_string(),
            },
        }
    }

    /// The fixed human-readable message shown in the panel for this error.
    pub fn user_message(&self, model: &str) -> String {
        match self {
            Self::MissingApiKey => {
                "No API key is configured. Add one in the settings or sign in.".into()
            }
            Self::Incompatible { status: 400, detail } => format!(
                "Your model `{model}` rejected the request ({detail}). The conversation may \
                 have grown past the model's context window; clearing it and retrying \
                 usually helps."
            ),
            Self::Incompatible { status, detail } => format!(
                "The endpoint or model `{model}` was not found (HTTP {status}: {detail}). \
                 Check the base URL and model name in the settings."
            ),
            Self::Unauthorized => {
                "You are not signed in or the API key is invalid. Update the key and try again."
                    .into()
            }
            Self::Forbidden => {
                "Access denied. The API key may have expired or been revoked.".into()
            }
            Self::RateLimited => {
                "Too many requests. Wait a moment and try again, or check the plan and \
                 billing details."
                    .into()
            }
            Self::Server(detail) => {
                format!("The server had an error while processing the request: {detail}. Try again shortly.")
            }
            Self::Transport {
                status,
                status_text,
            } => format!("The request failed with HTTP {status} {status_text}."),
            Self::Network(msg) | Self::Parse(msg) | Self::Unknown(msg) => msg.clone(),
        }
    }

    /// True for the 400 class, where clearing the conversation (shrinking
    /// the replayed context) and retrying is a sensible recovery.
    pub fn invites_conversation_reset(&self) -> bool {
        matches!(self, Self::Incompatible { status: 400, .. })
    }
}

/// Pull the human-readable message out of an API error body, falling back
/// to a truncated copy of the raw body.
fn extract_api_error(body: &str) -> String {
    if let Ok(value) = serde_json::from_str::<serde_json::Value>(body) {
        if let Some(message) = value["error"]["message"].as_str() {
            return message.to_string();
        }
    }
    truncate(body.trim(), 300)
}

fn truncate(s: &str, max: usize) -> String {
    if s.len() <= max {
        return s.to_string();
    }
    let mut end = max;
    while !s.is_char_boundary(end) {
        end -= 1;
    }
    format!("{}...", &s[..end])
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn code_models_route_to_completions() {
        assert_eq!(
            ModelClass::for_model("code-davinci-002"),
            ModelClass::Completions
        );
        assert_eq!(
            ModelClass::for_model("code-cushman-001"),
            ModelClass::Completions
        );
    }

    #[test]
    fn chat_models_route_to_chat() {
        assert_eq!(ModelClass::for_model("gpt-4"), ModelClass::Chat);
        assert_eq!(ModelClass::for_model("gpt-3.5-turbo"), ModelClass::Chat);
    }

    #[test]
    fn only_chat_models_render_markdown() {
        assert!(ModelClass::for_model("gpt-4").renders_markdown());
        assert!(!ModelClass::for_model("code-davinci-002").renders_markdown());
    }

    #[test]
    fn build_client_accepts_both_classes() {
        assert!(build_client(ClientConfig::new("sk-test").with_model("gpt-4")).is_ok());
        assert!(build_client(ClientConfig::new("sk-test").with_model("code-davinci-002")).is_ok());
    }

    #[test]
    fn status_mapping_matches_taxonomy() {
        use reqwest::StatusCode;

        assert!(matches!(
            ChatError::from_status(StatusCode::BAD_REQUEST, ""),
            ChatError::Incompatible { status: 400, .. }
        ));
        assert!(matches!(
            ChatError::from_status(StatusCode::UNAUTHORIZED, ""),
            ChatError::Unauthorized
        ));
        assert!(matches!(
            ChatError::from_status(StatusCode::FORBIDDEN, ""),
            ChatError::Forbidden
        ));
        assert!(matches!(
            ChatError::from_status(StatusCode::NOT_FOUND, ""),
            ChatError::Incompatible { status: 404, .. }
        ));
        assert!(matches!(
            ChatError::from_status(StatusCode::TOO_MANY_REQUESTS, ""),
            ChatError::RateLimited
        ));
        assert!(matches!(
            ChatError::from_status(StatusCode::INTERNAL_SERVER_ERROR, ""),
            ChatError::Server(_)
        ));
        assert!(matches!(
            ChatError::from_status(StatusCode::BAD_GATEWAY, ""),
            ChatError::Transport { status: 502, .. }
        ));
    }

    #[test]
    fn api_error_body_message_is_extracted() {
        let body = r#"{"error": {"message": "maximum context length exceeded"}}"#;
        let err = ChatError::from_status(reqwest::StatusCode::BAD_REQUEST, body);
        match err {
            ChatError::Incompatible { detail, .. } => {
                assert_eq!(detail, "maximum context length exceeded");
            }
            other => panic!("unexpected error: {other:?}"),
        }
    }

    #[test]
    fn raw_body_fallback_is_truncated() {
        let body = "x".repeat(1000);
        let err = ChatError::from_status(reqwest::StatusCode::BAD_REQUEST, &body);
        match err {
            ChatError::Incompatible { detail, .. } => {
                assert!(detail.len() < 320);
                assert!(detail.ends_with("..."));
            }
            other => panic!("unexpected error: {other:?}"),
        }
    }

    #[test]
    fn user_message_names_the_model_for_400() {
        let err = ChatError::Incompatible {
            status: 400,
            detail: "too long".into(),
        };
        assert!(err.user_message("gpt-4").contains("gpt-4"));
    }

    #[test]
    fn only_400_invites_conversation_reset() {
        let reset = ChatError::Incompatible {
            status: 400,
            detail: String::new(),
        };
        let not_found = ChatError::Incompatible {
            status: 404,
            detail: String::new(),
        };
        assert!(reset.invites_conversation_reset());
        assert!(!not_found.invites_conversation_reset());
        assert!(!ChatError::RateLimited.invites_conversation_reset());
        assert!(!ChatError::Unauthorized.invites_conversation_reset());
    }

    #[test]
    fn truncate_respects_char_boundaries() {
        let s = "héllo wörld".repeat(50);
        let out = truncate(&s, 300);
        assert!(out.ends_with("..."));
        assert!(out.len() <= 303);
    }
}
