// ABOUTME: Database operations for chat conversations and messages
// ABOUTME: Handles CRUD, per-conversation sequence assignment, and token accumulation
//
// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 Quill Labs

use crate::errors::{AppError, AppResult};
use crate::llm::MessageRole;
use crate::models::ConversationMode;
use serde::{Deserialize, Serialize};
use sqlx::{Row, SqlitePool};
use uuid::Uuid;

// ============================================================================
// Database Record Types
// ============================================================================

/// Database representation of a conversation
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ConversationRecord {
    /// Unique conversation ID
    pub id: String,
    /// User ID who owns the conversation
    pub user_id: String,
    /// Conversation title (optional, user-defined)
    pub title: Option<String>,
    /// Conversation mode ("open_chat" or "rag")
    pub mode: String,
    /// Running total of tokens accumulated across completed turns
    pub total_tokens: i64,
    /// Whether the conversation is active
    pub is_active: bool,
    /// When the conversation was created (ISO 8601)
    pub created_at: String,
    /// When the conversation was last updated (ISO 8601)
    pub updated_at: String,
}

impl ConversationRecord {
    /// Typed view of the stored mode; unknown values degrade to open chat
    #[must_use]
    pub fn mode(&self) -> ConversationMode {
        ConversationMode::parse(&self.mode).unwrap_or_default()
    }
}

/// Database representation of a chat message
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MessageRecord {
    /// Unique message ID
    pub id: String,
    /// Conversation ID this message belongs to
    pub conversation_id: String,
    /// Role of the message sender (system, user, assistant)
    pub role: String,
    /// Message content
    pub content: String,
    /// Per-conversation sequence number defining canonical order
    pub sequence_number: i64,
    /// Token count of the content, computed at insertion
    pub token_count: i64,
    /// Reserved flag for future history compaction
    pub is_summary: bool,
    /// When the message was created (ISO 8601)
    pub created_at: String,
    /// When the message was last updated (ISO 8601)
    pub updated_at: String,
}

/// Summary of a conversation for listing
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ConversationSummary {
    /// Conversation ID
    pub id: String,
    /// Conversation title
    pub title: Option<String>,
    /// Conversation mode
    pub mode: String,
    /// Number of messages in the conversation
    pub message_count: i64,
    /// Total tokens used
    pub total_tokens: i64,
    /// When the conversation was created
    pub created_at: String,
    /// When the conversation was last updated
    pub updated_at: String,
}

// ============================================================================
// Conversation Store
// ============================================================================

/// Conversation and message persistence operations
///
/// All operations are plain data access with no business logic. Sequence
/// numbers are assigned inside the insert transaction so concurrent appends
/// to the same conversation cannot observe the same `MAX(sequence_number)`.
pub struct ConversationStore {
    pool: SqlitePool,
}

impl ConversationStore {
    /// Create a new conversation store
    #[must_use]
    pub const fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    // ========================================================================
    // Conversation Operations
    // ========================================================================

    /// Create a new conversation
    ///
    /// # Errors
    ///
    /// Returns an error if the database operation fails
    pub async fn create_conversation(
        &self,
        user_id: &str,
        title: Option<&str>,
        mode: ConversationMode,
    ) -> AppResult<ConversationRecord> {
        let id = Uuid::new_v4().to_string();
        let now = chrono::Utc::now().to_rfc3339();

        sqlx::query(
            r"
            INSERT INTO conversations (id, user_id, title, mode, total_tokens, is_active, created_at, updated_at)
            VALUES ($1, $2, $3, $4, 0, true, $5, $5)
            ",
        )
        .bind(&id)
        .bind(user_id)
        .bind(title)
        .bind(mode.as_str())
        .bind(&now)
        .execute(&self.pool)
        .await
        .map_err(|e| AppError::database(format!("Failed to create conversation: {e}")))?;

        Ok(ConversationRecord {
            id,
            user_id: user_id.to_owned(),
            title: title.map(ToOwned::to_owned),
            mode: mode.as_str().to_owned(),
            total_tokens: 0,
            is_active: true,
            created_at: now.clone(),
            updated_at: now,
        })
    }

    /// Get a conversation by ID
    ///
    /// # Errors
    ///
    /// Returns an error if the database operation fails
    pub async fn get_conversation(
        &self,
        conversation_id: &str,
    ) -> AppResult<Option<ConversationRecord>> {
        let row = sqlx::query(
            r"
            SELECT id, user_id, title, mode, total_tokens, is_active, created_at, updated_at
            FROM conversations
            WHERE id = $1
            ",
        )
        .bind(conversation_id)
        .fetch_optional(&self.pool)
        .await
        .map_err(|e| AppError::database(format!("Failed to get conversation: {e}")))?;

        Ok(row.map(|r| ConversationRecord {
            id: r.get("id"),
            user_id: r.get("user_id"),
            title: r.get("title"),
            mode: r.get("mode"),
            total_tokens: r.get("total_tokens"),
            is_active: r.get("is_active"),
            created_at: r.get("created_at"),
            updated_at: r.get("updated_at"),
        }))
    }

    /// List conversations for a user with pagination, most recently updated first
    ///
    /// # Errors
    ///
    /// Returns an error if the database operation fails
    pub async fn list_conversations(
        &self,
        user_id: &str,
        limit: i64,
        offset: i64,
    ) -> AppResult<Vec<ConversationSummary>> {
        let rows = sqlx::query(
            r"
            SELECT c.id, c.title, c.mode, c.total_tokens, c.created_at, c.updated_at,
                   COUNT(m.id) as message_count
            FROM conversations c
            LEFT JOIN messages m ON m.conversation_id = c.id
            WHERE c.user_id = $1
            GROUP BY c.id
            ORDER BY c.updated_at DESC
            LIMIT $2 OFFSET $3
            ",
        )
        .bind(user_id)
        .bind(limit)
        .bind(offset)
        .fetch_all(&self.pool)
        .await
        .map_err(|e| AppError::database(format!("Failed to list conversations: {e}")))?;

        let summaries = rows
            .into_iter()
            .map(|r| ConversationSummary {
                id: r.get("id"),
                title: r.get("title"),
                mode: r.get("mode"),
                message_count: r.get("message_count"),
                total_tokens: r.get("total_tokens"),
                created_at: r.get("created_at"),
                updated_at: r.get("updated_at"),
            })
            .collect();

        Ok(summaries)
    }

    /// Count conversations for a user
    ///
    /// # Errors
    ///
    /// Returns an error if the database operation fails
    pub async fn count_conversations(&self, user_id: &str) -> AppResult<i64> {
        let row = sqlx::query(
            r"
            SELECT COUNT(*) as count
            FROM conversations
            WHERE user_id = $1
            ",
        )
        .bind(user_id)
        .fetch_one(&self.pool)
        .await
        .map_err(|e| AppError::database(format!("Failed to count conversations: {e}")))?;

        Ok(row.get("count"))
    }

    /// Delete a conversation and all its messages (cascade)
    ///
    /// # Errors
    ///
    /// Returns an error if the database operation fails
    pub async fn delete_conversation(&self, conversation_id: &str) -> AppResult<bool> {
        let result = sqlx::query(
            r"
            DELETE FROM conversations
            WHERE id = $1
            ",
        )
        .bind(conversation_id)
        .execute(&self.pool)
        .await
        .map_err(|e| AppError::database(format!("Failed to delete conversation: {e}")))?;

        Ok(result.rows_affected() > 0)
    }

    /// Increment a conversation's running token total
    ///
    /// The increment is a single atomic UPDATE; the total is never recomputed
    /// from the message rows.
    ///
    /// # Errors
    ///
    /// Returns an error if the database operation fails
    pub async fn add_tokens(&self, conversation_id: &str, tokens: u32) -> AppResult<()> {
        let now = chrono::Utc::now().to_rfc3339();

        sqlx::query(
            r"
            UPDATE conversations
            SET total_tokens = total_tokens + $1, updated_at = $2
            WHERE id = $3
            ",
        )
        .bind(i64::from(tokens))
        .bind(&now)
        .bind(conversation_id)
        .execute(&self.pool)
        .await
        .map_err(|e| AppError::database(format!("Failed to update conversation tokens: {e}")))?;

        Ok(())
    }

    // ========================================================================
    // Message Operations
    // ========================================================================

    /// Append a message to a conversation with the next sequence number
    ///
    /// The `MAX(sequence_number) + 1` read and the insert run inside one
    /// transaction, so sequence numbers stay contiguous under concurrent
    /// appends. The conversation's `updated_at` is refreshed in the same
    /// transaction.
    ///
    /// # Errors
    ///
    /// Returns an error if the database operation fails
    pub async fn add_message(
        &self,
        conversation_id: &str,
        role: MessageRole,
        content: &str,
        token_count: u32,
    ) -> AppResult<MessageRecord> {
        let id = Uuid::new_v4().to_string();
        let now = chrono::Utc::now().to_rfc3339();
        let role_str = role.as_str();

        let mut tx = self
            .pool
            .begin()
            .await
            .map_err(|e| AppError::database(format!("Failed to begin transaction: {e}")))?;

        let row = sqlx::query(
            r"
            SELECT COALESCE(MAX(sequence_number), 0) + 1 as next_sequence
            FROM messages
            WHERE conversation_id = $1
            ",
        )
        .bind(conversation_id)
        .fetch_one(&mut *tx)
        .await
        .map_err(|e| AppError::database(format!("Failed to compute sequence number: {e}")))?;

        let sequence_number: i64 = row.get("next_sequence");

        sqlx::query(
            r"
            INSERT INTO messages (id, conversation_id, role, content, sequence_number, token_count, is_summary, created_at, updated_at)
            VALUES ($1, $2, $3, $4, $5, $6, false, $7, $7)
            ",
        )
        .bind(&id)
        .bind(conversation_id)
        .bind(role_str)
        .bind(content)
        .bind(sequence_number)
        .bind(i64::from(token_count))
        .bind(&now)
        .execute(&mut *tx)
        .await
        .map_err(|e| AppError::database(format!("Failed to add message: {e}")))?;

        sqlx::query(
            r"
            UPDATE conversations
            SET updated_at = $1
            WHERE id = $2
            ",
        )
        .bind(&now)
        .bind(conversation_id)
        .execute(&mut *tx)
        .await
        .map_err(|e| AppError::database(format!("Failed to update conversation timestamp: {e}")))?;

        tx.commit()
            .await
            .map_err(|e| AppError::database(format!("Failed to commit message insert: {e}")))?;

        Ok(MessageRecord {
            id,
            conversation_id: conversation_id.to_owned(),
            role: role_str.to_owned(),
            content: content.to_owned(),
            sequence_number,
            token_count: i64::from(token_count),
            is_summary: false,
            created_at: now.clone(),
            updated_at: now,
        })
    }

    /// Get a single message by ID
    ///
    /// # Errors
    ///
    /// Returns an error if the database operation fails
    pub async fn get_message(&self, message_id: &str) -> AppResult<Option<MessageRecord>> {
        let row = sqlx::query(
            r"
            SELECT id, conversation_id, role, content, sequence_number, token_count, is_summary, created_at, updated_at
            FROM messages
            WHERE id = $1
            ",
        )
        .bind(message_id)
        .fetch_optional(&self.pool)
        .await
        .map_err(|e| AppError::database(format!("Failed to get message: {e}")))?;

        Ok(row.map(Self::row_to_message))
    }

    /// Get all messages for a conversation in sequence order
    ///
    /// # Errors
    ///
    /// Returns an error if the database operation fails
    pub async fn get_messages(&self, conversation_id: &str) -> AppResult<Vec<MessageRecord>> {
        let rows = sqlx::query(
            r"
            SELECT id, conversation_id, role, content, sequence_number, token_count, is_summary, created_at, updated_at
            FROM messages
            WHERE conversation_id = $1
            ORDER BY sequence_number ASC
            ",
        )
        .bind(conversation_id)
        .fetch_all(&self.pool)
        .await
        .map_err(|e| AppError::database(format!("Failed to get messages: {e}")))?;

        Ok(rows.into_iter().map(Self::row_to_message).collect())
    }

    /// Get a page of messages for a conversation in sequence order
    ///
    /// # Errors
    ///
    /// Returns an error if the database operation fails
    pub async fn get_messages_page(
        &self,
        conversation_id: &str,
        limit: i64,
        offset: i64,
    ) -> AppResult<Vec<MessageRecord>> {
        let rows = sqlx::query(
            r"
            SELECT id, conversation_id, role, content, sequence_number, token_count, is_summary, created_at, updated_at
            FROM messages
            WHERE conversation_id = $1
            ORDER BY sequence_number ASC
            LIMIT $2 OFFSET $3
            ",
        )
        .bind(conversation_id)
        .bind(limit)
        .bind(offset)
        .fetch_all(&self.pool)
        .await
        .map_err(|e| AppError::database(format!("Failed to get messages: {e}")))?;

        Ok(rows.into_iter().map(Self::row_to_message).collect())
    }

    /// Get the last N messages for a conversation, returned in sequence order
    ///
    /// # Errors
    ///
    /// Returns an error if the database operation fails
    pub async fn get_recent_messages(
        &self,
        conversation_id: &str,
        limit: i64,
    ) -> AppResult<Vec<MessageRecord>> {
        let rows = sqlx::query(
            r"
            SELECT id, conversation_id, role, content, sequence_number, token_count, is_summary, created_at, updated_at
            FROM messages
            WHERE conversation_id = $1
            ORDER BY sequence_number DESC
            LIMIT $2
            ",
        )
        .bind(conversation_id)
        .bind(limit)
        .fetch_all(&self.pool)
        .await
        .map_err(|e| AppError::database(format!("Failed to get recent messages: {e}")))?;

        // Reverse to get chronological order
        let mut messages: Vec<MessageRecord> =
            rows.into_iter().map(Self::row_to_message).collect();
        messages.reverse();

        Ok(messages)
    }

    /// Compute the next sequence number for a conversation
    ///
    /// Returns 1 for a conversation with no messages. This read-only variant
    /// exists for diagnostics; [`Self::add_message`] performs its own
    /// transactional read so callers never assign sequence numbers manually.
    ///
    /// # Errors
    ///
    /// Returns an error if the database operation fails
    pub async fn next_sequence_number(&self, conversation_id: &str) -> AppResult<i64> {
        let row = sqlx::query(
            r"
            SELECT COALESCE(MAX(sequence_number), 0) + 1 as next_sequence
            FROM messages
            WHERE conversation_id = $1
            ",
        )
        .bind(conversation_id)
        .fetch_one(&self.pool)
        .await
        .map_err(|e| AppError::database(format!("Failed to compute sequence number: {e}")))?;

        Ok(row.get("next_sequence"))
    }

    /// Get message count for a conversation
    ///
    /// # Errors
    ///
    /// Returns an error if the database operation fails
    pub async fn message_count(&self, conversation_id: &str) -> AppResult<i64> {
        let row = sqlx::query(
            r"
            SELECT COUNT(*) as count
            FROM messages
            WHERE conversation_id = $1
            ",
        )
        .bind(conversation_id)
        .fetch_one(&self.pool)
        .await
        .map_err(|e| AppError::database(format!("Failed to count messages: {e}")))?;

        Ok(row.get("count"))
    }

    /// Get the most recent message for a conversation
    ///
    /// # Errors
    ///
    /// Returns an error if the database operation fails
    pub async fn last_message(&self, conversation_id: &str) -> AppResult<Option<MessageRecord>> {
        let row = sqlx::query(
            r"
            SELECT id, conversation_id, role, content, sequence_number, token_count, is_summary, created_at, updated_at
            FROM messages
            WHERE conversation_id = $1
            ORDER BY sequence_number DESC
            LIMIT 1
            ",
        )
        .bind(conversation_id)
        .fetch_optional(&self.pool)
        .await
        .map_err(|e| AppError::database(format!("Failed to get last message: {e}")))?;

        Ok(row.map(Self::row_to_message))
    }

    fn row_to_message(r: sqlx::sqlite::SqliteRow) -> MessageRecord {
        MessageRecord {
            id: r.get("id"),
            conversation_id: r.get("conversation_id"),
            role: r.get("role"),
            content: r.get("content"),
            sequence_number: r.get("sequence_number"),
            token_count: r.get("token_count"),
            is_summary: r.get("is_summary"),
            created_at: r.get("created_at"),
            updated_at: r.get("updated_at"),
        }
    }
}
