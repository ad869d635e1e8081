//! Message-passing protocol between the panel core and the UI surface.
//!
//! Messages flow in both directions:
//! - **Surface -> core**: a [`PanelCommand`], fire-and-forget.
//! - **Core -> surface**: a [`PanelEvent`], published through the bridge.
//!
//! Payloads are camelCase-tagged JSON so a webview can consume them
//! without translation. There is no request/response correlation beyond
//! the request id echoed on `addResponse`.

use serde::{Deserialize, Serialize};

/// A command received from the UI surface.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "camelCase")]
pub enum PanelCommand {
    AddFreeTextQuestion { value: String },
    ClearConversation,
    StopGenerating,
    Login,
    OpenSettings,
    OpenSettingsPrompt,
    /// Anything this build does not understand; logged and ignored.
    #[serde(other)]
    Unknown,
}

impl PanelCommand {
    /// Parse a command from a raw JSON string (from the surface).
    pub fn from_json(raw: &str) -> Option<Self> {
        serde_json::from_str(raw).ok()
    }
}

/// An event published to the UI surface.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "camelCase")]
pub enum PanelEvent {
    #[serde(rename_all = "camelCase")]
    ShowInProgress {
        in_progress: bool,
        show_stop_button: bool,
    },
    AddQuestion {
        value: String,
        code: Option<String>,
    },
    /// `done: false` carries the growing partial text; exactly one
    /// `done: true` (or one `addError`) terminates a request.
    #[serde(rename_all = "camelCase")]
    AddResponse {
        value: String,
        done: bool,
        id: String,
        /// False only for code-class models, telling the surface to
        /// render plain text instead of parsed markdown.
        response_in_markdown: bool,
    },
    AddError {
        value: String,
    },
    #[serde(rename_all = "camelCase")]
    LoginSuccessful {
        show_conversations: bool,
    },
}
