//! Legacy OpenAI Completions API client.
//!
//! Implements the `ChatClient` trait for code-completion-style models
//! via the `/completions` endpoint. The transcript is rendered into a
//! `User:`/`Assistant:` prompt because the legacy endpoint has no
//! structured message format.

use async_trait::async_trait;
use tokio::sync::mpsc;
use tracing::debug;

use crate::conversation::{ConversationStore, Role, StoredMessage};
use crate::streaming::parse_sse_stream;
use crate::{
    ChatClient, ChatError, ChatRequest, ClientConfig, Completion, Continuation,
    MAX_CONVERSATION_TURNS,
};

/// Stop sequence so the model does not speak the user's next turn.
const PROMPT_STOP: &str = "\nUser:";

/// Legacy completions client for code-class models.
pub struct CompletionsApiClient {
    config: ClientConfig,
    http: reqwest::Client,
    store: ConversationStore,
}

impl CompletionsApiClient {
    pub fn new(config: ClientConfig) -> Result<Self, ChatError> {
        let http = config.build_http()?;
        Ok(Self {
            config,
            http,
            store: ConversationStore::new(MAX_CONVERSATION_TURNS),
        })
    }

    /// Render the transcript into a plain-text prompt ending with an
    /// open `Assistant:` turn for the model to complete.
    fn render_prompt(transcript: &[StoredMessage]) -> String {
        let mut prompt = String::new();
        for message in transcript {
            match message.role {
                Role::User => {
                    prompt.push_str("User: ");
                    prompt.push_str(&message.text);
                    prompt.push('\n');
                }
                Role::Assistant => {
                    prompt.push_str("Assistant: ");
                    prompt.push_str(&message.text);
                    prompt.push('\n');
                }
            }
        }
        prompt.push_str("Assistant:");
        prompt
    }

    fn build_request_body(&self, transcript: &[StoredMessage]) -> serde_json::Value {
        serde_json::json!({
            "model": self.config.model,
            "prompt": Self::render_prompt(transcript),
            "max_tokens": self.config.max_tokens,
            "temperature": self.config.temperature,
            "top_p": self.config.top_p,
            "stream": true,
            "stop": [PROMPT_STOP],
        })
    }
}

#[async_trait]
impl ChatClient for CompletionsApiClient {
    async fn send_streaming(
        &self,
        request: ChatRequest,
        chunks: mpsc::UnboundedSender<String>,
    ) -> Result<Completion, ChatError> {
        let (conversation_id, mut transcript) = self.store.resume(request.continuation.as_ref());
        transcript.push(StoredMessage::user(&request.prompt));

        let body = self.build_request_body(&transcript);
        let url = format!("{}/completions", self.config.base_url);

        debug!(model = %self.config.model, conversation = %conversation_id, "completions request");

        let mut http_request = self
            .http
            .post(&url)
            .header("Authorization", format!("Bearer {}", self.config.api_key))
            .header("content-type", "application/json");
        if let Some(organization) = &self.config.organization {
            http_request = http_request.header("OpenAI-Organization", organization);
        }

        let response = http_request
            .json(&body)
            .send()
            .await
            .map_err(|e| ChatError::Network(e.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            let text = response.text().await.unwrap_or_default();
            return Err(ChatError::from_status(status, &text));
        }

        let mut full_text = String::new();

        parse_sse_stream(response, |data| {
            if data.trim() == "[DONE]" {
                return false;
            }
            if let Ok(event) = serde_json::from_str::<serde_json::Value>(data) {
                if let Some(text) = event["choices"][0]["text"].as_str() {
                    if !text.is_empty() {
                        full_text.push_str(text);
                        let _ = chunks.send(text.to_string());
                    }
                }
            }
            true
        })
        .await?;

        // The open "Assistant:" turn tends to come back with a leading space.
        let trimmed = full_text.trim_start().to_string();

        let assistant = StoredMessage::assistant(&trimmed);
        let message_id = assistant.id.clone();
        transcript.push(assistant);
        self.store.commit(&conversation_id, transcript);

        Ok(Completion {
            text: trimmed,
            continuation: Continuation {
                conversation_id,
                message_id,
            },
        })
    }
}
