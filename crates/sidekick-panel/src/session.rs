//! The conversation session, one per UI surface.
//!
//! Coordinates configuration, lazy client construction, continuation
//! state, the single in-flight request with cooperative cancellation,
//! and publication of panel events. Per request the session moves
//! `Idle -> InFlight -> {Completed | Cancelled | Failed} -> Idle`; a
//! second request while one is in flight is dropped, not queued.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};

use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

use sidekick_ai::{
    build_client, ChatClient, ChatError, ChatRequest, ClientConfig, Continuation, ModelClass,
};
use sidekick_common::new_id;
use sidekick_config::SidekickConfig;

use crate::bridge::PanelBridge;
use crate::host::{ApiKeyDecision, PanelHost};
use crate::protocol::PanelEvent;

/// The full configuration bundle for one session. Replaced wholesale on
/// settings change.
#[derive(Debug, Clone, PartialEq)]
pub struct SessionConfig {
    pub api_key: Option<String>,
    pub organization: Option<String>,
    pub base_url: String,
    pub model: String,
    pub max_tokens: u32,
    pub temperature: f64,
    pub top_p: f64,
    pub proxy: Option<String>,
}

impl SessionConfig {
    fn client_config(&self, api_key: String) -> ClientConfig {
        let mut config = ClientConfig::new(api_key)
            .with_model(self.model.clone())
            .with_base_url(self.base_url.clone())
            .with_max_tokens(self.max_tokens)
            .with_temperature(self.temperature)
            .with_top_p(self.top_p);
        if let Some(organization) = &self.organization {
            config = config.with_organization(organization.clone());
        }
        if let Some(proxy) = &self.proxy {
            config = config.with_proxy(proxy.clone());
        }
        config
    }
}

impl From<&SidekickConfig> for SessionConfig {
    fn from(config: &SidekickConfig) -> Self {
        Self {
            api_key: config.api.key.clone(),
            organization: config.api.organization.clone(),
            base_url: config.api.base_url.clone(),
            model: config.model.name.clone(),
            max_tokens: config.model.max_tokens,
            temperature: config.model.temperature,
            top_p: config.model.top_p,
            proxy: config.api.proxy.clone(),
        }
    }
}

impl Default for SessionConfig {
    fn default() -> Self {
        (&SidekickConfig::default()).into()
    }
}

/// A question posed through the panel.
#[derive(Debug, Clone, Default)]
pub struct Question {
    pub prompt: String,
    /// Optional code snippet appended to the prompt as a fenced block.
    pub code: Option<String>,
    pub language: Option<String>,
    /// Text a follow-up request joins onto (continuation replay).
    pub previous_answer: Option<String>,
}

impl Question {
    pub fn text(prompt: impl Into<String>) -> Self {
        Self {
            prompt: prompt.into(),
            ..Default::default()
        }
    }

    pub fn with_code(mut self, code: impl Into<String>, language: impl Into<String>) -> Self {
        self.code = Some(code.into());
        self.language = Some(language.into());
        self
    }
}

/// Continuation identifiers for the live dialogue. Cleared on
/// clear-conversation and on session reset.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SessionState {
    pub conversation_id: Option<String>,
    pub message_id: Option<String>,
}

impl SessionState {
    fn to_continuation(&self) -> Option<Continuation> {
        match (&self.conversation_id, &self.message_id) {
            (Some(conversation_id), Some(message_id)) => Some(Continuation {
                conversation_id: conversation_id.clone(),
                message_id: message_id.clone(),
            }),
            _ => None,
        }
    }

    fn store(&mut self, continuation: &Continuation) {
        self.conversation_id = Some(continuation.conversation_id.clone());
        self.message_id = Some(continuation.message_id.clone());
    }

    fn clear(&mut self) {
        self.conversation_id = None;
        self.message_id = None;
    }
}

/// Guard that clears the in-flight flag on drop, so the session returns
/// to idle even when the request future is dropped mid-poll.
struct InFlightGuard<'a> {
    flag: &'a AtomicBool,
}

impl<'a> InFlightGuard<'a> {
    fn acquire(flag: &'a AtomicBool) -> Option<Self> {
        flag.compare_exchange(false, true, Ordering::Acquire, Ordering::Relaxed)
            .ok()
            .map(|_| Self { flag })
    }
}

impl Drop for InFlightGuard<'_> {
    fn drop(&mut self) {
        self.flag.store(false, Ordering::Release);
    }
}

/// Most recent terminal response, republished by an idle `stop()`.
#[derive(Debug, Clone, Default)]
struct LatestResponse {
    id: String,
    text: String,
    markdown: bool,
}

/// What a finished request asks the outer send loop to do next.
enum Outcome {
    Done,
    /// Response ended mid code block; offer an automatic "Continue".
    OfferContinue { answer: String },
    /// 400-class failure; offer clearing the conversation and retrying.
    OfferRetry,
}

pub struct ConversationSession {
    config: Mutex<SessionConfig>,
    client: Mutex<Option<Arc<dyn ChatClient>>>,
    state: Mutex<SessionState>,
    in_flight: AtomicBool,
    cancel: Mutex<Option<CancellationToken>>,
    latest: Mutex<LatestResponse>,
    /// Interactively entered key scoped to this session.
    session_key: Mutex<Option<String>>,
    bridge: Arc<PanelBridge>,
    host: Arc<dyn PanelHost>,
}

impl ConversationSession {
    pub fn new(config: SessionConfig, bridge: Arc<PanelBridge>, host: Arc<dyn PanelHost>) -> Self {
        Self {
            config: Mutex::new(config),
            client: Mutex::new(None),
            state: Mutex::new(SessionState::default()),
            in_flight: AtomicBool::new(false),
            cancel: Mutex::new(None),
            latest: Mutex::new(LatestResponse::default()),
            session_key: Mutex::new(None),
            bridge,
            host,
        }
    }

    pub fn host(&self) -> &Arc<dyn PanelHost> {
        &self.host
    }

    pub fn state(&self) -> SessionState {
        self.state.lock().unwrap().clone()
    }

    pub fn is_in_flight(&self) -> bool {
        self.in_flight.load(Ordering::Acquire)
    }

    /// Whether a client instance currently exists.
    pub fn is_configured(&self) -> bool {
        self.client.lock().unwrap().is_some()
    }

    /// Use this client instead of lazily building one from config.
    pub fn install_client(&self, client: Arc<dyn ChatClient>) {
        *self.client.lock().unwrap() = Some(client);
    }

    /// Replace the configuration wholesale. Conversation state is always
    /// reset; the client (and any in-flight request, and the
    /// session-scoped key) go with it when the config actually changed,
    /// since clients bake the whole bundle in at construction.
    pub fn reconfigure(&self, config: SessionConfig) {
        let changed = *self.config.lock().unwrap() != config;
        if changed {
            self.clear_session();
            *self.session_key.lock().unwrap() = None;
        }
        self.state.lock().unwrap().clear();
        *self.config.lock().unwrap() = config;
    }

    /// Reset continuation identifiers; the next request starts a fresh
    /// dialogue.
    pub fn clear_conversation(&self) {
        self.state.lock().unwrap().clear();
    }

    /// Cancel any in-flight request, discard the client instance and the
    /// continuation identifiers.
    pub fn clear_session(&self) {
        if let Some(token) = self.cancel.lock().unwrap().take() {
            token.cancel();
        }
        *self.client.lock().unwrap() = None;
        self.state.lock().unwrap().clear();
    }

    /// Cancel the in-flight request if any; the request loop then
    /// publishes the accumulated text as the terminal response. When
    /// idle, republishes the latest response. Idempotent, never an error.
    pub fn stop(&self) {
        let token = self.cancel.lock().unwrap().take();
        match token {
            Some(token) => token.cancel(),
            None => {
                let latest = self.latest.lock().unwrap().clone();
                self.bridge.publish(PanelEvent::ShowInProgress {
                    in_progress: false,
                    show_stop_button: false,
                });
                self.bridge.publish(PanelEvent::AddResponse {
                    value: latest.text,
                    done: true,
                    id: latest.id,
                    response_in_markdown: latest.markdown,
                });
            }
        }
    }

    /// Ensure-client handshake for the surface's login button.
    pub async fn login(&self) {
        match self.ensure_client().await {
            Ok(_) => self.bridge.publish(PanelEvent::LoginSuccessful {
                show_conversations: false,
            }),
            Err(error) => {
                let model = self.config.lock().unwrap().model.clone();
                self.bridge.publish(PanelEvent::AddError {
                    value: error.user_message(&model),
                });
            }
        }
    }

    /// Relay one question. A no-op if a request is already in flight.
    /// Accepted auto-continue and retry offers loop back here with the
    /// in-flight guard released in between.
    pub async fn send(&self, question: Question) {
        let mut next = Some(question);
        while let Some(current) = next.take() {
            let Some(guard) = InFlightGuard::acquire(&self.in_flight) else {
                debug!("request dropped: another request is in flight");
                return;
            };

            let outcome = self.run_request(&current).await;

            self.cancel.lock().unwrap().take();
            drop(guard);

            next = match outcome {
                Outcome::Done => None,
                Outcome::OfferContinue { answer } => {
                    if self.host.confirm_auto_continue().await {
                        Some(Question {
                            prompt: "Continue".into(),
                            previous_answer: Some(answer),
                            ..Default::default()
                        })
                    } else {
                        None
                    }
                }
                Outcome::OfferRetry => {
                    if self.host.confirm_retry_after_reset().await {
                        self.clear_conversation();
                        Some(current)
                    } else {
                        None
                    }
                }
            };
        }
    }

    async fn run_request(&self, question: &Question) -> Outcome {
        let (model, markdown) = {
            let config = self.config.lock().unwrap();
            let markdown = ModelClass::for_model(&config.model).renders_markdown();
            (config.model.clone(), markdown)
        };

        let client = match self.ensure_client().await {
            Ok(client) => client,
            Err(error) => {
                self.bridge.publish(PanelEvent::AddError {
                    value: error.user_message(&model),
                });
                self.bridge.publish(PanelEvent::ShowInProgress {
                    in_progress: false,
                    show_stop_button: false,
                });
                return Outcome::Done;
            }
        };

        let request_id = new_id();
        let token = CancellationToken::new();
        *self.cancel.lock().unwrap() = Some(token.clone());

        self.bridge.publish(PanelEvent::ShowInProgress {
            in_progress: true,
            show_stop_button: true,
        });
        self.bridge.publish(PanelEvent::AddQuestion {
            value: question.prompt.clone(),
            code: question.code.clone(),
        });

        let request = ChatRequest {
            prompt: compose_prompt(question),
            continuation: self.state.lock().unwrap().to_continuation(),
        };
        let previous = question.previous_answer.clone().unwrap_or_default();

        let (chunk_tx, mut chunk_rx) = mpsc::unbounded_channel();
        let task = tokio::spawn({
            let client = client.clone();
            async move { client.send_streaming(request, chunk_tx).await }
        });

        let mut accumulated = String::new();
        let mut cancelled = false;
        loop {
            tokio::select! {
                chunk = chunk_rx.recv() => match chunk {
                    Some(text) => {
                        accumulated.push_str(&text);
                        // Chunks race the cancel signal; never publish after it fires.
                        if token.is_cancelled() {
                            continue;
                        }
                        self.bridge.publish(PanelEvent::AddResponse {
                            value: format!("{previous}{accumulated}"),
                            done: false,
                            id: request_id.clone(),
                            response_in_markdown: markdown,
                        });
                    }
                    None => break,
                },
                _ = token.cancelled() => {
                    // Cooperative: abandon the network task rather than
                    // wait for its teardown.
                    task.abort();
                    cancelled = true;
                    break;
                }
            }
        }

        let outcome = if cancelled {
            debug!(request = %request_id, "request cancelled, publishing partial text");
            self.finish_response(&request_id, format!("{previous}{accumulated}"), markdown);
            Outcome::Done
        } else {
            match task.await {
                Ok(Ok(completion)) => {
                    self.state.lock().unwrap().store(&completion.continuation);
                    let mut text = format!("{previous}{}", completion.text);
                    let unclosed = has_unclosed_fence(&text);
                    if unclosed {
                        text.push_str("```\n");
                    }
                    self.finish_response(&request_id, text.clone(), markdown);
                    if unclosed {
                        Outcome::OfferContinue { answer: text }
                    } else {
                        Outcome::Done
                    }
                }
                Ok(Err(error)) => {
                    warn!(request = %request_id, error = %error, "chat request failed");
                    self.bridge.publish(PanelEvent::AddError {
                        value: error.user_message(&model),
                    });
                    if error.invites_conversation_reset() {
                        Outcome::OfferRetry
                    } else {
                        Outcome::Done
                    }
                }
                Err(join_error) => {
                    warn!(request = %request_id, "chat task failed: {join_error}");
                    self.bridge.publish(PanelEvent::AddError {
                        value: format!("The request failed unexpectedly: {join_error}"),
                    });
                    Outcome::Done
                }
            }
        };

        self.bridge.publish(PanelEvent::ShowInProgress {
            in_progress: false,
            show_stop_button: false,
        });

        outcome
    }

    /// Publish the terminal response and remember it for idle `stop()`.
    fn finish_response(&self, request_id: &str, text: String, markdown: bool) {
        *self.latest.lock().unwrap() = LatestResponse {
            id: request_id.to_string(),
            text: text.clone(),
            markdown,
        };
        self.bridge.publish(PanelEvent::AddResponse {
            value: text,
            done: true,
            id: request_id.to_string(),
            response_in_markdown: markdown,
        });
    }

    async fn ensure_client(&self) -> Result<Arc<dyn ChatClient>, ChatError> {
        if let Some(client) = self.client.lock().unwrap().clone() {
            return Ok(client);
        }

        let api_key = match self.resolve_api_key().await {
            Some(key) => key,
            None => return Err(ChatError::MissingApiKey),
        };

        let config = self.config.lock().unwrap().clone();
        let client = build_client(config.client_config(api_key))?;
        *self.client.lock().unwrap() = Some(client.clone());
        Ok(client)
    }

    /// Key resolution order: config, environment, session-scoped
    /// override, then the host's interactive recovery.
    async fn resolve_api_key(&self) -> Option<String> {
        if let Some(key) = self.config.lock().unwrap().api_key.clone() {
            if !key.is_empty() {
                return Some(key);
            }
        }
        if let Ok(key) = std::env::var("OPENAI_API_KEY") {
            if !key.is_empty() {
                return Some(key);
            }
        }
        if let Some(key) = self.session_key.lock().unwrap().clone() {
            return Some(key);
        }

        match self.host.request_api_key().await? {
            ApiKeyDecision::Persist(key) => {
                self.config.lock().unwrap().api_key = Some(key.clone());
                match sidekick_config::default_config_path() {
                    Ok(path) => {
                        if let Err(error) = sidekick_config::persist_api_key(&path, &key) {
                            warn!("failed to persist API key: {error}");
                        }
                    }
                    Err(error) => warn!("no config path to persist API key: {error}"),
                }
                Some(key)
            }
            ApiKeyDecision::SessionOnly(key) => {
                *self.session_key.lock().unwrap() = Some(key.clone());
                Some(key)
            }
        }
    }
}

/// Join an optional code snippet onto the question as a fenced block.
fn compose_prompt(question: &Question) -> String {
    match &question.code {
        None => question.prompt.clone(),
        Some(code) => {
            let language = question.language.as_deref().unwrap_or("");
            format!("{}\n```{language}\n{code}\n```", question.prompt)
        }
    }
}

/// Count of triple-backtick markers; an odd count means the text ends
/// inside a code block. Literal backtick runs inside strings can fool
/// this in both directions; the approximation is kept as-is.
fn has_unclosed_fence(text: &str) -> bool {
    text.matches("```").count() % 2 == 1
}
