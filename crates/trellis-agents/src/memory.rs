use std::collections::VecDeque;

use chrono::{DateTime, Utc};
use dashmap::DashMap;
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::providers::ChatMessage;

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum MessageRole {
    User,
    Assistant,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StoredMessage {
    pub role: MessageRole,
    pub content: String,
    pub timestamp: DateTime<Utc>,
}

/// Summary of one conversation, returned by list operations.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ConversationMeta {
    pub conversation_id: String,
    pub created_at: DateTime<Utc>,
    pub last_activity: DateTime<Utc>,
    pub message_count: usize,
}

struct Conversation {
    messages: VecDeque<StoredMessage>,
    created_at: DateTime<Utc>,
    last_activity: DateTime<Utc>,
}

/// In-process conversation history, bounded per conversation. When a
/// conversation exceeds `max_messages`, the oldest messages are dropped
/// first.
pub struct ConversationMemory {
    conversations: DashMap<String, Conversation>,
    max_messages: usize,
}

impl ConversationMemory {
    pub fn new(max_messages: usize) -> Self {
        Self {
            conversations: DashMap::new(),
            max_messages: max_messages.max(1),
        }
    }

    pub fn add_user_message(&self, conversation_id: &str, content: impl Into<String>) {
        self.push(conversation_id, MessageRole::User, content.into());
    }

    pub fn add_assistant_message(&self, conversation_id: &str, content: impl Into<String>) {
        self.push(conversation_id, MessageRole::Assistant, content.into());
    }

    fn push(&self, conversation_id: &str, role: MessageRole, content: String) {
        let now = Utc::now();
        let mut entry = self
            .conversations
            .entry(conversation_id.to_string())
            .or_insert_with(|| Conversation {
                messages: VecDeque::new(),
                created_at: now,
                last_activity: now,
            });

        entry.messages.push_back(StoredMessage {
            role,
            content,
            timestamp: now,
        });
        entry.last_activity = now;

        while entry.messages.len() > self.max_messages {
            entry.messages.pop_front();
            debug!(conversation_id, "trimmed oldest message from history");
        }
    }

    /// Full retained history, oldest first.
    pub fn history(&self, conversation_id: &str) -> Vec<StoredMessage> {
        self.conversations
            .get(conversation_id)
            .map(|c| c.messages.iter().cloned().collect())
            .unwrap_or_default()
    }

    /// The most recent `n` messages, oldest first.
    pub fn recent(&self, conversation_id: &str, n: usize) -> Vec<StoredMessage> {
        self.conversations
            .get(conversation_id)
            .map(|c| {
                let skip = c.messages.len().saturating_sub(n);
                c.messages.iter().skip(skip).cloned().collect()
            })
            .unwrap_or_default()
    }

    /// History converted into provider chat messages.
    pub fn chat_history(&self, conversation_id: &str) -> Vec<ChatMessage> {
        self.history(conversation_id)
            .into_iter()
            .map(|m| match m.role {
                MessageRole::User => ChatMessage::user(m.content),
                MessageRole::Assistant => ChatMessage::assistant(m.content),
            })
            .collect()
    }

    pub fn meta(&self, conversation_id: &str) -> Option<ConversationMeta> {
        self.conversations.get(conversation_id).map(|c| ConversationMeta {
            conversation_id: conversation_id.to_string(),
            created_at: c.created_at,
            last_activity: c.last_activity,
            message_count: c.messages.len(),
        })
    }

    pub fn list(&self) -> Vec<ConversationMeta> {
        let mut out: Vec<ConversationMeta> = self
            .conversations
            .iter()
            .map(|entry| ConversationMeta {
                conversation_id: entry.key().clone(),
                created_at: entry.created_at,
                last_activity: entry.last_activity,
                message_count: entry.messages.len(),
            })
            .collect();
        out.sort_by(|a, b| b.last_activity.cmp(&a.last_activity));
        out
    }

    /// Empty the history but keep the conversation registered.
    pub fn clear(&self, conversation_id: &str) -> bool {
        match self.conversations.get_mut(conversation_id) {
            Some(mut c) => {
                c.messages.clear();
                c.last_activity = Utc::now();
                true
            }
            None => false,
        }
    }

    pub fn delete(&self, conversation_id: &str) -> bool {
        self.conversations.remove(conversation_id).is_some()
    }

    pub fn len(&self) -> usize {
        self.conversations.len()
    }

    pub fn is_empty(&self) -> bool {
        self.conversations.is_empty()
    }
}
