//! Support chat domain types.

use chrono::{DateTime, Utc};
use serde::Serialize;

use emporium_core::{ChatMessageId, ChatSender, ConversationId, ConversationStatus, UserId};

/// A support conversation opened by a customer.
#[derive(Debug, Clone, Serialize)]
pub struct Conversation {
    pub id: ConversationId,
    /// Set when the customer was logged in.
    pub user_id: Option<UserId>,
    pub customer_name: String,
    pub customer_email: String,
    pub status: ConversationStatus,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    pub closed_at: Option<DateTime<Utc>>,
}

impl Conversation {
    /// Private realtime channel carrying this conversation's events.
    #[must_use]
    pub fn channel(&self) -> String {
        channel_for(self.id)
    }

    #[must_use]
    pub fn is_open(&self) -> bool {
        self.status == ConversationStatus::Open
    }
}

/// Private realtime channel for a conversation.
#[must_use]
pub fn channel_for(id: ConversationId) -> String {
    format!("private-chat-{id}")
}

/// A message within a conversation.
#[derive(Debug, Clone, Serialize)]
pub struct ChatMessage {
    pub id: ChatMessageId,
    pub conversation_id: ConversationId,
    pub sender: ChatSender,
    pub body: String,
    pub created_at: DateTime<Utc>,
}
