//! Conversation transcript
//!
//! This module provides the `ConversationLog` abstraction that holds the
//! ordered, append-only record of the session:
//! - Append a new message (assistant turn opened, vision description)
//! - Extend the text of the open assistant message with streamed deltas
//! - Snapshot access and a broadcast subscription for transcript renderers
//!
//! Messages are owned exclusively by the log; loop components never hold a
//! message directly. At most one assistant message (the most recently
//! appended one) is open for extension at a time.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tokio::sync::{broadcast, Mutex};

/// Who produced a message.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    User,
    Assistant,
    System,
}

/// One turn of the conversation.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ConversationMessage {
    pub role: Role,

    /// Message text; assistant messages grow as deltas arrive.
    pub text: String,

    /// When the message was first appended.
    pub created_at: DateTime<Utc>,
}

/// Ordered transcript change, as seen by an observer.
#[derive(Debug, Clone)]
pub enum ConversationUpdate {
    /// A new message was appended at `index`.
    Appended {
        index: usize,
        role: Role,
        text: String,
    },
    /// The message at `index` grew by `delta`.
    Extended { index: usize, delta: String },
    /// The session owning this log has ended; no further updates follow.
    SessionEnded,
}

/// Append-only conversation record with observer support.
///
/// Writers are the inbound event dispatcher and the vision loop; both go
/// through the two mutation methods here, which serialize access behind a
/// single lock and publish every change in order.
pub struct ConversationLog {
    messages: Mutex<Vec<ConversationMessage>>,
    updates: broadcast::Sender<ConversationUpdate>,
}

const UPDATE_CHANNEL_CAPACITY: usize = 256;

impl ConversationLog {
    pub fn new() -> Self {
        let (updates, _) = broadcast::channel(UPDATE_CHANNEL_CAPACITY);
        Self {
            messages: Mutex::new(Vec::new()),
            updates,
        }
    }

    /// Append a new message and return its index.
    pub async fn append(&self, role: Role, text: impl Into<String>) -> usize {
        let text = text.into();
        let mut messages = self.messages.lock().await;
        let index = messages.len();
        messages.push(ConversationMessage {
            role,
            text: text.clone(),
            created_at: Utc::now(),
        });

        // Lagging or absent observers are not an error.
        let _ = self.updates.send(ConversationUpdate::Appended { index, role, text });

        index
    }

    /// Extend the most recent message with `delta`, if it is an assistant
    /// message. Returns false (and mutates nothing) otherwise.
    pub async fn extend_last_assistant(&self, delta: &str) -> bool {
        let mut messages = self.messages.lock().await;
        let Some(last) = messages.last_mut() else {
            return false;
        };
        if last.role != Role::Assistant {
            return false;
        }
        last.text.push_str(delta);
        let index = messages.len() - 1;

        let _ = self.updates.send(ConversationUpdate::Extended {
            index,
            delta: delta.to_string(),
        });

        true
    }

    /// Copy of the transcript in chronological order.
    pub async fn snapshot(&self) -> Vec<ConversationMessage> {
        self.messages.lock().await.clone()
    }

    pub async fn len(&self) -> usize {
        self.messages.lock().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.messages.lock().await.is_empty()
    }

    /// Subscribe to transcript changes from this point on.
    pub fn subscribe(&self) -> broadcast::Receiver<ConversationUpdate> {
        self.updates.subscribe()
    }

    /// Tell observers the session has ended.
    pub fn notify_session_ended(&self) {
        let _ = self.updates.send(ConversationUpdate::SessionEnded);
    }
}

impl Default for ConversationLog {
    fn default() -> Self {
        Self::new()
    }
}
