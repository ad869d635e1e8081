//! Transcript storage backing the continuation identifiers.
//!
//! The hosted APIs are stateless; multi-turn continuity comes from
//! replaying the transcript. A `Continuation` handed back to the caller
//! is a `(conversation_id, message_id)` pair into this store: resuming
//! replays the conversation up to and including the parent message, so a
//! continuation taken mid-dialogue discards the turns after it.

use std::collections::HashMap;
use std::sync::Mutex;

use sidekick_common::new_id;

use crate::Continuation;

#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    User,
    Assistant,
}

/// A single stored message, addressable by id for continuation lookups.
#[derive(Debug, Clone, serde::Serialize, serde::Deserialize)]
pub struct StoredMessage {
    pub id: String,
    pub role: Role,
    pub text: String,
}

impl StoredMessage {
    pub fn user(text: impl Into<String>) -> Self {
        Self {
            id: new_id(),
            role: Role::User,
            text: text.into(),
        }
    }

    pub fn assistant(text: impl Into<String>) -> Self {
        Self {
            id: new_id(),
            role: Role::Assistant,
            text: text.into(),
        }
    }
}

/// Conversation transcripts keyed by conversation id.
///
/// Transcripts are trimmed from the front to a bounded number of turns so
/// a long-lived dialogue cannot grow the replayed context without limit.
pub struct ConversationStore {
    conversations: Mutex<HashMap<String, Vec<StoredMessage>>>,
    max_turns: usize,
}

impl ConversationStore {
    pub fn new(max_turns: usize) -> Self {
        Self {
            conversations: Mutex::new(HashMap::new()),
            max_turns,
        }
    }

    /// Resolve a continuation into `(conversation_id, transcript)`.
    ///
    /// `None`, or an unknown conversation id, starts a fresh conversation.
    /// A known conversation replays up to and including the parent
    /// message; an unknown parent id replays the whole transcript.
    pub fn resume(&self, continuation: Option<&Continuation>) -> (String, Vec<StoredMessage>) {
        let Some(continuation) = continuation else {
            return (new_id(), Vec::new());
        };

        let conversations = self.conversations.lock().unwrap();
        match conversations.get(&continuation.conversation_id) {
            None => (new_id(), Vec::new()),
            Some(messages) => {
                let cut = messages
                    .iter()
                    .position(|m| m.id == continuation.message_id)
                    .map(|i| i + 1)
                    .unwrap_or(messages.len());
                (
                    continuation.conversation_id.clone(),
                    messages[..cut].to_vec(),
                )
            }
        }
    }

    /// Store the full transcript of a conversation after a completed
    /// exchange, replacing whatever was there (resume may have truncated).
    pub fn commit(&self, conversation_id: &str, mut transcript: Vec<StoredMessage>) {
        let max_messages = self.max_turns * 2;
        if transcript.len() > max_messages {
            let excess = transcript.len() - max_messages;
            transcript.drain(..excess);
        }
        self.conversations
            .lock()
            .unwrap()
            .insert(conversation_id.to_string(), transcript);
    }

    pub fn len(&self) -> usize {
        self.conversations.lock().unwrap().len()
    }

    pub fn is_empty(&self) -> bool {
        self.conversations.lock().unwrap().is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn store_with_turns(turns: &[(&str, &str)]) -> (ConversationStore, String, Vec<String>) {
        let store = ConversationStore::new(20);
        let conversation_id = new_id();
        let mut transcript = Vec::new();
        let mut assistant_ids = Vec::new();
        for (question, answer) in turns {
            transcript.push(StoredMessage::user(*question));
            let assistant = StoredMessage::assistant(*answer);
            assistant_ids.push(assistant.id.clone());
            transcript.push(assistant);
        }
        store.commit(&conversation_id, transcript);
        (store, conversation_id, assistant_ids)
    }

    #[test]
    fn no_continuation_starts_fresh() {
        let store = ConversationStore::new(20);
        let (id, transcript) = store.resume(None);
        assert!(!id.is_empty());
        assert!(transcript.is_empty());
    }

    #[test]
    fn unknown_conversation_starts_fresh() {
        let store = ConversationStore::new(20);
        let continuation = Continuation {
            conversation_id: "missing".into(),
            message_id: "missing".into(),
        };
        let (id, transcript) = store.resume(Some(&continuation));
        assert_ne!(id, "missing");
        assert!(transcript.is_empty());
    }

    #[test]
    fn resume_replays_up_to_parent_message() {
        let (store, conversation_id, assistant_ids) =
            store_with_turns(&[("q1", "a1"), ("q2", "a2"), ("q3", "a3")]);

        let continuation = Continuation {
            conversation_id: conversation_id.clone(),
            message_id: assistant_ids[1].clone(),
        };
        let (id, transcript) = store.resume(Some(&continuation));
        assert_eq!(id, conversation_id);
        assert_eq!(transcript.len(), 4);
        assert_eq!(transcript[3].text, "a2");
    }

    #[test]
    fn unknown_parent_replays_whole_transcript() {
        let (store, conversation_id, _) = store_with_turns(&[("q1", "a1"), ("q2", "a2")]);

        let continuation = Continuation {
            conversation_id: conversation_id.clone(),
            message_id: "not-a-message".into(),
        };
        let (_, transcript) = store.resume(Some(&continuation));
        assert_eq!(transcript.len(), 4);
    }

    #[test]
    fn commit_replaces_discarded_branch() {
        let (store, conversation_id, assistant_ids) =
            store_with_turns(&[("q1", "a1"), ("q2", "a2")]);

        // Resume from the first answer, then commit a different second turn.
        let continuation = Continuation {
            conversation_id: conversation_id.clone(),
            message_id: assistant_ids[0].clone(),
        };
        let (_, mut transcript) = store.resume(Some(&continuation));
        transcript.push(StoredMessage::user("q2-alt"));
        transcript.push(StoredMessage::assistant("a2-alt"));
        store.commit(&conversation_id, transcript);

        let all = Continuation {
            conversation_id: conversation_id.clone(),
            message_id: "not-a-message".into(),
        };
        let (_, replayed) = store.resume(Some(&all));
        assert_eq!(replayed.len(), 4);
        assert_eq!(replayed[3].text, "a2-alt");
    }

    #[test]
    fn commit_trims_old_turns() {
        let store = ConversationStore::new(2);
        let conversation_id = new_id();
        let mut transcript = Vec::new();
        for i in 0..5 {
            transcript.push(StoredMessage::user(format!("q{i}")));
            transcript.push(StoredMessage::assistant(format!("a{i}")));
        }
        store.commit(&conversation_id, transcript);

        let all = Continuation {
            conversation_id,
            message_id: "not-a-message".into(),
        };
        let (_, replayed) = store.resume(Some(&all));
        assert_eq!(replayed.len(), 4);
        assert_eq!(replayed[0].text, "q3");
        assert_eq!(replayed[3].text, "a4");
    }
}
