//! OpenAI Chat Completion API client.
//!
//! Implements the `ChatClient` trait for chat models via the
//! `/chat/completions` endpoint, replaying the stored transcript for
//! multi-turn continuity.

use async_trait::async_trait;
use tokio::sync::mpsc;
use tracing::debug;

use crate::conversation::{ConversationStore, Role, StoredMessage};
use crate::streaming::parse_sse_stream;
use crate::{
    ChatClient, ChatError, ChatRequest, ClientConfig, Completion, Continuation,
    MAX_CONVERSATION_TURNS,
};

/// Chat completions client.
pub struct ChatApiClient {
    config: ClientConfig,
    http: reqwest::Client,
    store: ConversationStore,
}

impl ChatApiClient {
    pub fn new(config: ClientConfig) -> Result<Self, ChatError> {
        let http = config.build_http()?;
        Ok(Self {
            config,
            http,
            store: ConversationStore::new(MAX_CONVERSATION_TURNS),
        })
    }

    /// Build the JSON request body for the chat completions endpoint.
    fn build_request_body(&self, transcript: &[StoredMessage]) -> serde_json::Value {
        let messages: Vec<serde_json::Value> = transcript
            .iter()
            .map(|m| {
                let role = match m.role {
                    Role::User => "user",
                    Role::Assistant => "assistant",
                };
                serde_json::json!({
                    "role": role,
                    "content": m.text,
                })
            })
            .collect();

        serde_json::json!({
            "model": self.config.model,
            "messages": messages,
            "max_tokens": self.config.max_tokens,
            "temperature": self.config.temperature,
            "top_p": self.config.top_p,
            "stream": true,
        })
    }
}

#[async_trait]
impl ChatClient for ChatApiClient {
    async fn send_streaming(
        &self,
        request: ChatRequest,
        chunks: mpsc::UnboundedSender<String>,
    ) -> Result<Completion, ChatError> {
        let (conversation_id, mut transcript) = self.store.resume(request.continuation.as_ref());
        transcript.push(StoredMessage::user(&request.prompt));

        let body = self.build_request_body(&transcript);
        let url = format!("{}/chat/completions", self.config.base_url);

        debug!(model = %self.config.model, conversation = %conversation_id, "chat completion request");

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
                if let Some(text) = event["choices"][0]["delta"]["content"].as_str() {
                    if !text.is_empty() {
                        full_text.push_str(text);
                        let _ = chunks.send(text.to_string());
                    }
                }
            }
            true
        })
        .await?;

        let assistant = StoredMessage::assistant(&full_text);
        let message_id = assistant.id.clone();
        transcript.push(assistant);
        self.store.commit(&conversation_id, transcript);

        Ok(Completion {
            text: full_text,
            continuation: Continuation {
                conversation_id,
                message_id,
            },
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn client() -> ChatApiClient {
        ChatApiClient::new(
            ClientConfig::new("sk-test")
                .with_model("gpt-4")
                .with_max_tokens(512)
                .with_temperature(0.5),
        )
        .unwrap()
    }

    #[test]
    fn request_body_shape() {
        let client = client();
        let transcript = vec![
            StoredMessage::user("hello"),
            StoredMessage::assistant("hi"),
            StoredMessage::user("how are you?"),
        ];
        let body = client.build_request_body(&transcript);

        assert_eq!(body["model"], "gpt-4");
        assert_eq!(body["max_tokens"], 512);
        assert_eq!(body["temperature"], 0.5);
        assert_eq!(body["stream"], true);

        let messages = body["messages"].as_array().unwrap();
        assert_eq!(messages.len(), 3);
        assert_eq!(messages[0]["role"], "user");
        assert_eq!(messages[0]["content"], "hello");
        assert_eq!(messages[1]["role"], "assistant");
        assert_eq!(messages[2]["content"], "how are you?");
    }

    #[test]
    fn invalid_proxy_fails_construction() {
        let config = ClientConfig::new("sk-test").with_proxy("not a url");
        assert!(ChatApiClient::new(config).is_err());
    }
}
