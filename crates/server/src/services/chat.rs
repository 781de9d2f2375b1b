//! Support chat between customers and store staff.
//!
//! Messages are stored first and then published to Pusher: every customer
//! message goes to the admin channel and to the conversation's own channel,
//! agent replies and closures only to the conversation's channel.

use serde::Serialize;
use sqlx::PgPool;
use thiserror::Error;
use tracing::{info, instrument};

use emporium_core::{ChatSender, ConversationId, Email, UserId};

use crate::db::{ChatRepository, RepositoryError};
use crate::models::{ChatMessage, Conversation};
use crate::services::realtime::{ADMIN_CHANNEL, PusherClient, events};

/// Longest accepted chat message, in characters.
pub const MAX_MESSAGE_LENGTH: usize = 2000;

const MAX_NAME_LENGTH: usize = 100;

/// Errors that can occur in the chat service.
#[derive(Debug, Error)]
pub enum ChatError {
    #[error("database error: {0}")]
    Repository(#[from] RepositoryError),

    #[error("conversation not found")]
    ConversationNotFound,

    #[error("conversation is closed")]
    ConversationClosed,

    #[error("{0}")]
    InvalidMessage(String),
}

/// Payload of `conversation.created`.
#[derive(Debug, Serialize)]
struct ConversationCreated<'a> {
    conversation: &'a Conversation,
    message: &'a ChatMessage,
}

/// Chat service.
pub struct ChatService<'a> {
    pool: &'a PgPool,
    pusher: Option<&'a PusherClient>,
}

impl<'a> ChatService<'a> {
    /// Create a new chat service. Without Pusher, events are skipped.
    #[must_use]
    pub const fn new(pool: &'a PgPool, pusher: Option<&'a PusherClient>) -> Self {
        Self { pool, pusher }
    }

    fn repo(&self) -> ChatRepository<'a> {
        ChatRepository::new(self.pool)
    }

    /// Open a conversation with the customer's first message.
    ///
    /// # Errors
    ///
    /// Returns `ChatError::InvalidMessage` for a blank name, malformed email
    /// or bad message body.
    #[instrument(skip(self, name, email, body))]
    pub async fn start(
        &self,
        user_id: Option<UserId>,
        name: &str,
        email: &str,
        body: &str,
    ) -> Result<(Conversation, ChatMessage), ChatError> {
        let name = name.trim();
        if name.is_empty() || name.chars().count() > MAX_NAME_LENGTH {
            return Err(ChatError::InvalidMessage(format!(
                "name must be between 1 and {MAX_NAME_LENGTH} characters"
            )));
        }
        let email = Email::parse(email)
            .map_err(|_| ChatError::InvalidMessage("invalid email address".to_string()))?;
        let body = validate_body(body)?;

        let (conversation, message) = self
            .repo()
            .start_conversation(user_id, name, email.as_str(), body)
            .await?;

        info!(conversation_id = %conversation.id, "Chat conversation started");

        if let Some(pusher) = self.pusher {
            pusher
                .publish(
                    &[ADMIN_CHANNEL.to_string()],
                    events::CONVERSATION_CREATED,
                    &ConversationCreated {
                        conversation: &conversation,
                        message: &message,
                    },
                )
                .await;
        }

        Ok((conversation, message))
    }

    /// # Errors
    ///
    /// Returns `ChatError::ConversationNotFound` if it doesn't exist.
    pub async fn conversation(&self, id: ConversationId) -> Result<Conversation, ChatError> {
        self.repo()
            .get_conversation(id)
            .await?
            .ok_or(ChatError::ConversationNotFound)
    }

    /// Messages of a conversation, oldest first.
    ///
    /// # Errors
    ///
    /// Returns `ChatError::Repository` if the query fails.
    pub async fn messages(&self, id: ConversationId) -> Result<Vec<ChatMessage>, ChatError> {
        Ok(self.repo().list_messages(id).await?)
    }

    /// Append a message to an open conversation and publish it.
    ///
    /// # Errors
    ///
    /// Returns `ChatError::ConversationClosed` for a closed conversation and
    /// `ChatError::InvalidMessage` for a bad body.
    #[instrument(skip(self, body))]
    pub async fn post(
        &self,
        id: ConversationId,
        sender: ChatSender,
        body: &str,
    ) -> Result<ChatMessage, ChatError> {
        let body = validate_body(body)?;
        let conversation = self.conversation(id).await?;
        if !conversation.is_open() {
            return Err(ChatError::ConversationClosed);
        }

        let message = self.repo().add_message(id, sender, body).await?;

        if let Some(pusher) = self.pusher {
            let mut channels = vec![conversation.channel()];
            if sender == ChatSender::Customer {
                channels.push(ADMIN_CHANNEL.to_string());
            }
            pusher
                .publish(&channels, events::MESSAGE_CREATED, &message)
                .await;
        }

        Ok(message)
    }

    /// Close a conversation. Closing twice is a no-op.
    ///
    /// # Errors
    ///
    /// Returns `ChatError::ConversationNotFound` if it doesn't exist.
    #[instrument(skip(self))]
    pub async fn close(&self, id: ConversationId) -> Result<Conversation, ChatError> {
        let closed = match self.repo().close_conversation(id).await {
            Ok(closed) => closed,
            Err(RepositoryError::NotFound) => return Err(ChatError::ConversationNotFound),
            Err(e) => return Err(e.into()),
        };

        let Some(conversation) = closed else {
            return self.conversation(id).await;
        };

        info!(conversation_id = %id, "Chat conversation closed");
        if let Some(pusher) = self.pusher {
            pusher
                .publish(
                    &[conversation.channel()],
                    events::CONVERSATION_CLOSED,
                    &conversation,
                )
                .await;
        }

        Ok(conversation)
    }
}

/// Trim a message body and check its length.
fn validate_body(body: &str) -> Result<&str, ChatError> {
    let body = body.trim();
    if body.is_empty() {
        return Err(ChatError::InvalidMessage("message is empty".to_string()));
    }
    if body.chars().count() > MAX_MESSAGE_LENGTH {
        return Err(ChatError::InvalidMessage(format!(
            "message must be at most {MAX_MESSAGE_LENGTH} characters"
        )));
    }
    Ok(body)
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn test_validate_body_trims() {
        assert_eq!(validate_body("  hello \n").unwrap(), "hello");
    }

    #[test]
    fn test_validate_body_rejects_blank() {
        assert!(matches!(
            validate_body("   "),
            Err(ChatError::InvalidMessage(_))
        ));
    }

    #[test]
    fn test_validate_body_length_in_chars() {
        let at_limit = "é".repeat(MAX_MESSAGE_LENGTH);
        assert!(validate_body(&at_limit).is_ok());
        let over = "a".repeat(MAX_MESSAGE_LENGTH + 1);
        assert!(validate_body(&over).is_err());
    }
}
