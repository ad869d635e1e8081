//! Interactive decisions that belong to the UI host.
//!
//! The session never blocks on UI itself; the few places where the
//! original flow asks the user something go through this seam so the
//! core stays testable without a live surface.

use async_trait::async_trait;

/// What to do with an interactively entered API key.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ApiKeyDecision {
    /// Store the key in the config file for future sessions.
    Persist(String),
    /// Keep the key for this session only.
    SessionOnly(String),
}

/// Where a settings-navigation command should land.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SettingsTarget {
    General,
    Prompts,
}

#[async_trait]
pub trait PanelHost: Send + Sync {
    /// No API key could be resolved; ask the user for one.
    async fn request_api_key(&self) -> Option<ApiKeyDecision> {
        None
    }

    /// The response appears to end mid code block. Issue an automatic
    /// follow-up request to continue it?
    async fn confirm_auto_continue(&self) -> bool {
        false
    }

    /// A 400-class failure. Clear the conversation and retry the same
    /// question with a smaller replayed context?
    async fn confirm_retry_after_reset(&self) -> bool {
        false
    }

    /// Settings-navigation pass-through; no core logic attached.
    fn open_settings(&self, _target: SettingsTarget) {}
}

/// Host that declines every interactive choice.
pub struct NoopHost;

#[async_trait]
impl PanelHost for NoopHost {}
