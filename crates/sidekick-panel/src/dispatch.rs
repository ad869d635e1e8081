//! Inbound command dispatch.
//!
//! Commands are fire-and-forget. Question and login commands are spawned
//! so a `stopGenerating` arriving next can interleave with the in-flight
//! request; the control commands run inline.

use std::sync::Arc;

use tracing::{debug, warn};

use crate::host::SettingsTarget;
use crate::protocol::PanelCommand;
use crate::session::{ConversationSession, Question};

pub struct PanelDispatcher {
    session: Arc<ConversationSession>,
}

impl PanelDispatcher {
    pub fn new(session: Arc<ConversationSession>) -> Self {
        Self { session }
    }

    pub fn session(&self) -> &Arc<ConversationSession> {
        &self.session
    }

    /// Parse and dispatch a raw JSON command from the surface.
    pub fn handle_raw(&self, raw: &str) {
        match PanelCommand::from_json(raw) {
            Some(command) => self.handle(command),
            None => warn!("unparseable panel command: {raw}"),
        }
    }

    pub fn handle(&self, command: PanelCommand) {
        match command {
            PanelCommand::AddFreeTextQuestion { value } => {
                let session = self.session.clone();
                tokio::spawn(async move {
                    session.send(Question::text(value)).await;
                });
            }
            PanelCommand::ClearConversation => self.session.clear_conversation(),
            PanelCommand::StopGenerating => self.session.stop(),
            PanelCommand::Login => {
                let session = self.session.clone();
                tokio::spawn(async move {
                    session.login().await;
                });
            }
            PanelCommand::OpenSettings => {
                self.session.host().open_settings(SettingsTarget::General)
            }
            PanelCommand::OpenSettingsPrompt => {
                self.session.host().open_settings(SettingsTarget::Prompts)
            }
            PanelCommand::Unknown => debug!("ignoring unknown panel command"),
        }
    }
}
