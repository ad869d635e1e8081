//! The panel boundary for Sidekick.
//!
//! One [`ConversationSession`] serves one UI surface across a
//! message-passing boundary: [`PanelCommand`]s flow in, [`PanelEvent`]s
//! flow out through a [`PanelBridge`] that tolerates the surface
//! detaching. Interactive choices go through the [`PanelHost`] seam.

pub mod bridge;
pub mod dispatch;
pub mod host;
pub mod protocol;
pub mod session;

pub use bridge::PanelBridge;
pub use dispatch::PanelDispatcher;
pub use host::{ApiKeyDecision, NoopHost, PanelHost, SettingsTarget};
pub use protocol::{PanelCommand, PanelEvent};
pub use session::{ConversationSession, Question, SessionConfig, SessionState};
