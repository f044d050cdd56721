// ABOUTME: Chat route handlers for conversation management
// ABOUTME: REST endpoints for creating, listing, messaging in, and deleting conversations
//
// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 Quill Labs

//! Chat routes for conversations
//!
//! This module handles conversation management: creating conversations with
//! their first message, continuing them, reading history, and deletion.
//! Handlers are thin wrappers over [`crate::services::chat::ChatService`];
//! all turn logic and error translation lives there.

use crate::{
    database::{ConversationSummary, MessageRecord},
    errors::AppError,
    models::ConversationMode,
    resources::ServerResources,
    services::context_window::ContextStats,
};
use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::{delete, get, post},
    Json, Router,
};
use serde::{Deserialize, Serialize};
use std::sync::Arc;

// ============================================================================
// Request/Response Types
// ============================================================================

/// Request to create a new conversation with its first message
#[derive(Debug, Deserialize)]
pub struct CreateConversationRequest {
    /// User identifier owning the conversation
    pub user_id: String,
    /// The first message content
    pub message: String,
    /// Optional conversation title
    #[serde(default)]
    pub title: Option<String>,
    /// Conversation mode ("open_chat" or "rag"); defaults to open chat
    #[serde(default)]
    pub mode: Option<String>,
}

/// Request to add a message to an existing conversation
#[derive(Debug, Deserialize)]
pub struct AddMessageRequest {
    /// The message content to send
    pub message: String,
}

/// A message in API responses
#[derive(Debug, Serialize, Deserialize)]
pub struct MessageResponse {
    /// Message ID
    pub id: String,
    /// Role (user/assistant/system)
    pub role: String,
    /// Message content
    pub content: String,
    /// Per-conversation sequence number
    pub sequence_number: i64,
    /// Token count computed at insertion
    pub token_count: i64,
    /// Reserved compaction flag
    pub is_summary: bool,
    /// Creation timestamp
    pub created_at: String,
}

impl From<MessageRecord> for MessageResponse {
    fn from(record: MessageRecord) -> Self {
        Self {
            id: record.id,
            role: record.role,
            content: record.content,
            sequence_number: record.sequence_number,
            token_count: record.token_count,
            is_summary: record.is_summary,
            created_at: record.created_at,
        }
    }
}

/// Response for conversation creation
#[derive(Debug, Serialize, Deserialize)]
pub struct CreateConversationResponse {
    /// Conversation ID
    pub conversation_id: String,
    /// Conversation title
    pub title: Option<String>,
    /// Conversation mode
    pub mode: String,
    /// The persisted user message
    pub user_message: MessageResponse,
    /// The persisted assistant reply
    pub assistant_message: MessageResponse,
}

/// Response for adding a message
#[derive(Debug, Serialize, Deserialize)]
pub struct AddMessageResponse {
    /// The persisted user message
    pub user_message: MessageResponse,
    /// The persisted assistant reply
    pub assistant_message: MessageResponse,
    /// Conversation update timestamp after the turn
    pub conversation_updated_at: String,
}

/// Summary of a conversation for listing
#[derive(Debug, Serialize, Deserialize)]
pub struct ConversationSummaryResponse {
    /// Conversation ID
    pub id: String,
    /// Conversation title
    pub title: Option<String>,
    /// Conversation mode
    pub mode: String,
    /// Message count
    pub message_count: i64,
    /// Total tokens used
    pub total_tokens: i64,
    /// Creation timestamp
    pub created_at: String,
    /// Last update timestamp
    pub updated_at: String,
}

impl From<ConversationSummary> for ConversationSummaryResponse {
    fn from(summary: ConversationSummary) -> Self {
        Self {
            id: summary.id,
            title: summary.title,
            mode: summary.mode,
            message_count: summary.message_count,
            total_tokens: summary.total_tokens,
            created_at: summary.created_at,
            updated_at: summary.updated_at,
        }
    }
}

/// Paginated list of conversations
#[derive(Debug, Serialize, Deserialize)]
pub struct PaginatedConversationsResponse {
    /// Summaries for this page
    pub conversations: Vec<ConversationSummaryResponse>,
    /// Total conversations for the user
    pub total: i64,
    /// Records skipped
    pub skip: i64,
    /// Page size limit
    pub limit: i64,
}

/// Full conversation detail with ordered messages
#[derive(Debug, Serialize, Deserialize)]
pub struct ConversationDetailResponse {
    /// Conversation ID
    pub id: String,
    /// Owning user
    pub user_id: String,
    /// Conversation title
    pub title: Option<String>,
    /// Conversation mode
    pub mode: String,
    /// Running token total
    pub total_tokens: i64,
    /// Whether the conversation is active
    pub is_active: bool,
    /// Creation timestamp
    pub created_at: String,
    /// Last update timestamp
    pub updated_at: String,
    /// Messages in sequence order
    pub messages: Vec<MessageResponse>,
}

/// Query parameters for listing conversations
#[derive(Debug, Deserialize)]
pub struct ListConversationsQuery {
    /// User identifier to list conversations for
    pub user_id: String,
    /// Number of records to skip
    #[serde(default)]
    pub skip: i64,
    /// Maximum number of records to return
    #[serde(default = "default_limit")]
    pub limit: i64,
}

/// Query parameters for listing messages
#[derive(Debug, Deserialize)]
pub struct ListMessagesQuery {
    /// Number of messages to skip
    #[serde(default)]
    pub skip: i64,
    /// Maximum number of messages to return
    #[serde(default = "default_message_limit")]
    pub limit: i64,
}

const fn default_limit() -> i64 {
    20
}

const fn default_message_limit() -> i64 {
    100
}

// ============================================================================
// Chat Routes
// ============================================================================

/// Chat routes handler
pub struct ChatRoutes;

impl ChatRoutes {
    /// Create all chat routes
    #[must_use]
    pub fn routes(resources: Arc<ServerResources>) -> Router {
        Router::new()
            .route("/api/conversations", post(Self::create_conversation))
            .route("/api/conversations", get(Self::list_conversations))
            .route(
                "/api/conversations/:conversation_id",
                get(Self::get_conversation),
            )
            .route(
                "/api/conversations/:conversation_id",
                delete(Self::delete_conversation),
            )
            .route(
                "/api/conversations/:conversation_id/messages",
                get(Self::get_messages),
            )
            .route(
                "/api/conversations/:conversation_id/messages",
                post(Self::add_message),
            )
            .route(
                "/api/conversations/:conversation_id/context/stats",
                get(Self::context_stats),
            )
            .with_state(resources)
    }

    /// Parse the requested conversation mode, rejecting unknown values
    /// before anything is persisted
    fn parse_mode(mode: Option<&str>) -> Result<ConversationMode, AppError> {
        match mode {
            None => Ok(ConversationMode::OpenChat),
            Some(value) => ConversationMode::parse(value)
                .ok_or_else(|| AppError::invalid_input(format!("Unknown conversation mode: {value}"))),
        }
    }

    // ========================================================================
    // Handlers
    // ========================================================================

    /// Create a new conversation with its first message
    async fn create_conversation(
        State(resources): State<Arc<ServerResources>>,
        Json(request): Json<CreateConversationRequest>,
    ) -> Result<Response, AppError> {
        let mode = Self::parse_mode(request.mode.as_deref())?;

        let turn = resources
            .chat_service
            .create_conversation(
                &request.user_id,
                &request.message,
                mode,
                request.title.as_deref(),
            )
            .await?;

        let response = CreateConversationResponse {
            conversation_id: turn.conversation.id,
            title: turn.conversation.title,
            mode: turn.conversation.mode,
            user_message: turn.user_message.into(),
            assistant_message: turn.assistant_message.into(),
        };

        Ok((StatusCode::CREATED, Json(response)).into_response())
    }

    /// List a user's conversations with pagination
    async fn list_conversations(
        State(resources): State<Arc<ServerResources>>,
        Query(query): Query<ListConversationsQuery>,
    ) -> Result<Response, AppError> {
        let skip = query.skip.max(0);
        let limit = query.limit.clamp(1, 100);

        let page = resources
            .chat_service
            .list_conversations(&query.user_id, skip, limit)
            .await?;

        let response = PaginatedConversationsResponse {
            conversations: page
                .conversations
                .into_iter()
                .map(ConversationSummaryResponse::from)
                .collect(),
            total: page.total,
            skip,
            limit,
        };

        Ok(Json(response).into_response())
    }

    /// Get full conversation detail with ordered messages
    async fn get_conversation(
        State(resources): State<Arc<ServerResources>>,
        Path(conversation_id): Path<String>,
    ) -> Result<Response, AppError> {
        let detail = resources.chat_service.get_conversation(&conversation_id).await?;

        let response = ConversationDetailResponse {
            id: detail.conversation.id,
            user_id: detail.conversation.user_id,
            title: detail.conversation.title,
            mode: detail.conversation.mode,
            total_tokens: detail.conversation.total_tokens,
            is_active: detail.conversation.is_active,
            created_at: detail.conversation.created_at,
            updated_at: detail.conversation.updated_at,
            messages: detail.messages.into_iter().map(MessageResponse::from).collect(),
        };

        Ok(Json(response).into_response())
    }

    /// Get a page of messages for a conversation in sequence order
    async fn get_messages(
        State(resources): State<Arc<ServerResources>>,
        Path(conversation_id): Path<String>,
        Query(query): Query<ListMessagesQuery>,
    ) -> Result<Response, AppError> {
        let store = resources.database.conversations();

        store
            .get_conversation(&conversation_id)
            .await?
            .ok_or_else(|| AppError::not_found("Conversation"))?;

        let skip = query.skip.max(0);
        let limit = query.limit.clamp(1, 500);

        let messages = store
            .get_messages_page(&conversation_id, limit, skip)
            .await?;

        let response: Vec<MessageResponse> =
            messages.into_iter().map(MessageResponse::from).collect();

        Ok(Json(response).into_response())
    }

    /// Add a message to an existing conversation and return both turn messages
    async fn add_message(
        State(resources): State<Arc<ServerResources>>,
        Path(conversation_id): Path<String>,
        Json(request): Json<AddMessageRequest>,
    ) -> Result<Response, AppError> {
        let turn = resources
            .chat_service
            .add_message(&conversation_id, &request.message)
            .await?;

        let response = AddMessageResponse {
            user_message: turn.user_message.into(),
            assistant_message: turn.assistant_message.into(),
            conversation_updated_at: turn.conversation.updated_at,
        };

        Ok((StatusCode::CREATED, Json(response)).into_response())
    }

    /// Delete a conversation and all its messages
    async fn delete_conversation(
        State(resources): State<Arc<ServerResources>>,
        Path(conversation_id): Path<String>,
    ) -> Result<Response, AppError> {
        resources
            .chat_service
            .delete_conversation(&conversation_id)
            .await?;

        Ok(StatusCode::NO_CONTENT.into_response())
    }

    /// Context-budget diagnostics for a conversation
    async fn context_stats(
        State(resources): State<Arc<ServerResources>>,
        Path(conversation_id): Path<String>,
    ) -> Result<Response, AppError> {
        let stats: ContextStats = resources
            .chat_service
            .context_stats(&conversation_id)
            .await?;

        Ok(Json(stats).into_response())
    }
}
