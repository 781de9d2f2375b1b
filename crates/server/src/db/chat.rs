//! Database operations for support chat conversations and messages.

use chrono::{DateTime, Utc};
use sqlx::{PgConnection, PgPool};

use emporium_core::{ChatMessageId, ChatSender, ConversationId, ConversationStatus, UserId};

use super::RepositoryError;
use crate::models::{ChatMessage, Conversation};

const CONVERSATION_COLUMNS: &str =
    "id, user_id, customer_name, customer_email, status, created_at, updated_at, closed_at";

// =============================================================================
// Internal Row Types
// =============================================================================

#[derive(Debug, sqlx::FromRow)]
struct ConversationRow {
    id: ConversationId,
    user_id: Option<UserId>,
    customer_name: String,
    customer_email: String,
    status: ConversationStatus,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
    closed_at: Option<DateTime<Utc>>,
}

impl From<ConversationRow> for Conversation {
    fn from(row: ConversationRow) -> Self {
        Self {
            id: row.id,
            user_id: row.user_id,
            customer_name: row.customer_name,
            customer_email: row.customer_email,
            status: row.status,
            created_at: row.created_at,
            updated_at: row.updated_at,
            closed_at: row.closed_at,
        }
    }
}

#[derive(Debug, sqlx::FromRow)]
struct ChatMessageRow {
    id: ChatMessageId,
    conversation_id: ConversationId,
    sender: ChatSender,
    body: String,
    created_at: DateTime<Utc>,
}

impl From<ChatMessageRow> for ChatMessage {
    fn from(row: ChatMessageRow) -> Self {
        Self {
            id: row.id,
            conversation_id: row.conversation_id,
            sender: row.sender,
            body: row.body,
            created_at: row.created_at,
        }
    }
}

// =============================================================================
// Repository
// =============================================================================

/// Repository for chat database operations.
pub struct ChatRepository<'a> {
    pool: &'a PgPool,
}

impl<'a> ChatRepository<'a> {
    /// Create a new chat repository.
    #[must_use]
    pub const fn new(pool: &'a PgPool) -> Self {
        Self { pool }
    }

    /// Open a conversation together with its first customer message.
    ///
    /// Both rows are written in one transaction.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if either insert fails.
    pub async fn start_conversation(
        &self,
        user_id: Option<UserId>,
        customer_name: &str,
        customer_email: &str,
        body: &str,
    ) -> Result<(Conversation, ChatMessage), RepositoryError> {
        let mut tx = self.pool.begin().await?;

        let row = sqlx::query_as::<_, ConversationRow>(&format!(
            "INSERT INTO chat_conversations (user_id, customer_name, customer_email)
             VALUES ($1, $2, $3)
             RETURNING {CONVERSATION_COLUMNS}"
        ))
        .bind(user_id)
        .bind(customer_name)
        .bind(customer_email)
        .fetch_one(&mut *tx)
        .await?;
        let conversation = Conversation::from(row);

        let message =
            Self::insert_message(&mut tx, conversation.id, ChatSender::Customer, body).await?;

        tx.commit().await?;

        Ok((conversation, message))
    }

    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    pub async fn get_conversation(
        &self,
        id: ConversationId,
    ) -> Result<Option<Conversation>, RepositoryError> {
        let row = sqlx::query_as::<_, ConversationRow>(&format!(
            "SELECT {CONVERSATION_COLUMNS} FROM chat_conversations WHERE id = $1"
        ))
        .bind(id)
        .fetch_optional(self.pool)
        .await?;

        Ok(row.map(Conversation::from))
    }

    /// List conversations, most recently active first.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    pub async fn list_conversations(
        &self,
        status: Option<ConversationStatus>,
    ) -> Result<Vec<Conversation>, RepositoryError> {
        let rows = sqlx::query_as::<_, ConversationRow>(&format!(
            "SELECT {CONVERSATION_COLUMNS} FROM chat_conversations
             WHERE ($1::conversation_status IS NULL OR status = $1)
             ORDER BY updated_at DESC, id DESC
             LIMIT 200"
        ))
        .bind(status)
        .fetch_all(self.pool)
        .await?;

        Ok(rows.into_iter().map(Conversation::from).collect())
    }

    /// Append a message and bump the conversation's activity time.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the insert fails.
    pub async fn add_message(
        &self,
        conversation_id: ConversationId,
        sender: ChatSender,
        body: &str,
    ) -> Result<ChatMessage, RepositoryError> {
        let mut tx = self.pool.begin().await?;

        let message = Self::insert_message(&mut tx, conversation_id, sender, body).await?;

        sqlx::query("UPDATE chat_conversations SET updated_at = NOW() WHERE id = $1")
            .bind(conversation_id)
            .execute(&mut *tx)
            .await?;

        tx.commit().await?;

        Ok(message)
    }

    async fn insert_message(
        conn: &mut PgConnection,
        conversation_id: ConversationId,
        sender: ChatSender,
        body: &str,
    ) -> Result<ChatMessage, RepositoryError> {
        let row = sqlx::query_as::<_, ChatMessageRow>(
            "INSERT INTO chat_messages (conversation_id, sender, body)
             VALUES ($1, $2, $3)
             RETURNING id, conversation_id, sender, body, created_at",
        )
        .bind(conversation_id)
        .bind(sender)
        .bind(body)
        .fetch_one(conn)
        .await?;

        Ok(row.into())
    }

    /// Messages of a conversation, oldest first.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    pub async fn list_messages(
        &self,
        conversation_id: ConversationId,
    ) -> Result<Vec<ChatMessage>, RepositoryError> {
        let rows = sqlx::query_as::<_, ChatMessageRow>(
            "SELECT id, conversation_id, sender, body, created_at
             FROM chat_messages
             WHERE conversation_id = $1
             ORDER BY created_at ASC, id ASC",
        )
        .bind(conversation_id)
        .fetch_all(self.pool)
        .await?;

        Ok(rows.into_iter().map(ChatMessage::from).collect())
    }

    /// Close a conversation.
    ///
    /// Returns `None` if it was already closed.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::NotFound` if the conversation doesn't exist.
    pub async fn close_conversation(
        &self,
        id: ConversationId,
    ) -> Result<Option<Conversation>, RepositoryError> {
        let row = sqlx::query_as::<_, ConversationRow>(&format!(
            "UPDATE chat_conversations SET status = 'closed', closed_at = NOW()
             WHERE id = $1 AND status = 'open'
             RETURNING {CONVERSATION_COLUMNS}"
        ))
        .bind(id)
        .fetch_optional(self.pool)
        .await?;

        if let Some(row) = row {
            return Ok(Some(row.into()));
        }

        match self.get_conversation(id).await? {
            Some(_) => Ok(None),
            None => Err(RepositoryError::NotFound),
        }
    }
}
