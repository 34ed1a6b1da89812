use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Preview of the most recent message, denormalized onto the conversation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LastMessage {
    pub content: String,
    pub timestamp: DateTime<Utc>,
    pub read: bool,
}

/// A two-party conversation. The document id is the sorted participant pair,
/// so a pair shares exactly one conversation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Conversation {
    pub id: String,
    /// Sorted participant pair.
    pub participants: [String; 2],
    #[serde(skip_serializing_if = "Option::is_none")]
    pub last_message: Option<LastMessage>,
    /// Per-participant unread counters. Kept in step with the message
    /// collection by committing both in one plan.
    #[serde(default)]
    pub unread_count: BTreeMap<String, u64>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    #[serde(default)]
    pub version: u64,
}

impl Conversation {
    pub fn pair_id(a: &str, b: &str) -> String {
        super::sorted_pair_id(a, b)
    }

    pub fn between(a: &str, b: &str) -> Self {
        let now = Utc::now();
        let mut participants = [a.to_string(), b.to_string()];
        participants.sort();
        Self {
            id: Self::pair_id(a, b),
            participants,
            last_message: None,
            unread_count: BTreeMap::new(),
            created_at: now,
            updated_at: now,
            version: 0,
        }
    }

    pub fn involves(&self, user_id: &str) -> bool {
        self.participants.iter().any(|p| p == user_id)
    }

    pub fn unread_for(&self, user_id: &str) -> u64 {
        self.unread_count.get(user_id).copied().unwrap_or(0)
    }
}

super::impl_document!(Conversation, "conversations");

/// A message within exactly one conversation. Immutable once sent except for
/// the `read` flag flip.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Message {
    pub id: String,
    pub conversation_id: String,
    pub sender_id: String,
    pub content: String,
    pub sent_at: DateTime<Utc>,
    #[serde(default)]
    pub read: bool,
    pub participants: [String; 2],
    #[serde(default)]
    pub version: u64,
}

impl Message {
    pub fn new(
        id: impl Into<String>,
        conversation: &Conversation,
        sender_id: impl Into<String>,
        content: impl Into<String>,
    ) -> Self {
        Self {
            id: id.into(),
            conversation_id: conversation.id.clone(),
            sender_id: sender_id.into(),
            content: content.into(),
            sent_at: Utc::now(),
            read: false,
            participants: conversation.participants.clone(),
            version: 0,
        }
    }

    /// The participant the message is addressed to.
    pub fn recipient_id(&self) -> &str {
        self.participants
            .iter()
            .map(String::as_str)
            .find(|p| *p != self.sender_id)
            .unwrap_or(self.sender_id.as_str())
    }
}

super::impl_document!(Message, "messages");
