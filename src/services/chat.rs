// ABOUTME: Chat turn orchestration - persistence, context building, model dispatch
// ABOUTME: The only layer translating internal failures into caller-visible error kinds
//
// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 Quill Labs

//! # Conversation Orchestrator
//!
//! Coordinates one conversation turn end to end: validate input, persist the
//! user message with its sequence number and token count, resolve the
//! system prompt for the conversation's mode, build the bounded context
//! window, dispatch to the language-model backend, persist the assistant
//! reply, and accumulate the conversation's running token total.
//!
//! ## Failure semantics
//!
//! - Conversation lookup failure persists nothing.
//! - Validation failures are rejected before any persistence.
//! - A backend failure after the user message persists does NOT roll the
//!   user message back: the user's turn is durable, and the caller may retry
//!   by resubmitting only the continuation.
//!
//! ## Serialization
//!
//! Sequence assignment and token accumulation for one conversation must not
//! interleave. Each conversation gets an in-process turn lock held for the
//! whole persist-dispatch-persist-accumulate span; the store's insert
//! transaction additionally protects sequence assignment against other
//! processes sharing the database file. Turns on different conversations
//! proceed in parallel.

use std::sync::Arc;

use dashmap::DashMap;
use tokio::sync::Mutex;
use tracing::{debug, info, warn};

use crate::database::{ConversationRecord, ConversationStore, ConversationSummary, Database, MessageRecord};
use crate::errors::{AppError, AppResult};
use crate::llm::{ChatMessage, ChatRequest, LlmProvider, MessageRole};
use crate::models::ConversationMode;
use crate::retrieval::DocumentRetriever;
use crate::services::context_window::{ContextStats, ContextWindow, WindowStrategy};
use crate::services::prompts::{PromptParams, PromptRegistry};
use crate::services::token_counter::TokenCounter;

/// Result of a completed conversation turn
#[derive(Debug, Clone)]
pub struct ChatTurn {
    /// The conversation after the turn completed (fresh totals/timestamps)
    pub conversation: ConversationRecord,
    /// The persisted user message
    pub user_message: MessageRecord,
    /// The persisted assistant message
    pub assistant_message: MessageRecord,
}

/// Conversation detail with its full ordered history
#[derive(Debug, Clone)]
pub struct ConversationDetail {
    /// The conversation record
    pub conversation: ConversationRecord,
    /// All messages in sequence order
    pub messages: Vec<MessageRecord>,
}

/// A page of conversation summaries
#[derive(Debug, Clone)]
pub struct ConversationPage {
    /// Summaries for this page, most recently updated first
    pub conversations: Vec<ConversationSummary>,
    /// Total conversations for the user
    pub total: i64,
}

/// Orchestrates conversation turns across persistence, prompt selection,
/// context building, and the language-model backend
pub struct ChatService {
    database: Database,
    provider: Arc<dyn LlmProvider>,
    prompts: Arc<PromptRegistry>,
    window: Arc<ContextWindow>,
    counter: Arc<dyn TokenCounter>,
    retriever: Arc<dyn DocumentRetriever>,
    turn_locks: DashMap<String, Arc<Mutex<()>>>,
}

impl ChatService {
    /// Create a new chat service from its collaborators
    #[must_use]
    pub fn new(
        database: Database,
        provider: Arc<dyn LlmProvider>,
        prompts: Arc<PromptRegistry>,
        window: Arc<ContextWindow>,
        counter: Arc<dyn TokenCounter>,
        retriever: Arc<dyn DocumentRetriever>,
    ) -> Self {
        Self {
            database,
            provider,
            prompts,
            window,
            counter,
            retriever,
            turn_locks: DashMap::new(),
        }
    }

    /// Start a new conversation with its first user message.
    ///
    /// The conversation record and both turn messages are created in one
    /// logical operation; the user message gets sequence number 1 and the
    /// assistant reply sequence number 2.
    ///
    /// # Errors
    ///
    /// Returns a validation error for empty message content (before any
    /// persistence), a language-model error if the backend fails (the
    /// conversation and user message remain persisted), or a database error.
    pub async fn create_conversation(
        &self,
        user_id: &str,
        message: &str,
        mode: ConversationMode,
        title: Option<&str>,
    ) -> AppResult<ChatTurn> {
        Self::validate_user_id(user_id)?;
        Self::validate_content(message)?;

        let store = self.database.conversations();
        let conversation = store.create_conversation(user_id, title, mode).await?;

        info!(
            conversation_id = %conversation.id,
            mode = %mode,
            "Created conversation"
        );

        let lock = self.turn_lock(&conversation.id);
        let _guard = lock.lock().await;

        self.run_turn(&store, &conversation, Vec::new(), message)
            .await
    }

    /// Continue an existing conversation with a new user message.
    ///
    /// # Errors
    ///
    /// Returns `NotFound` if the conversation does not exist (nothing is
    /// persisted), a validation error for empty content, a language-model
    /// error if the backend fails (the user message remains persisted), or a
    /// database error.
    pub async fn add_message(&self, conversation_id: &str, message: &str) -> AppResult<ChatTurn> {
        Self::validate_content(message)?;

        let store = self.database.conversations();
        let conversation = store
            .get_conversation(conversation_id)
            .await?
            .ok_or_else(|| AppError::not_found("Conversation"))?;

        let lock = self.turn_lock(conversation_id);
        let _guard = lock.lock().await;

        // History loads under the lock so a concurrent turn's messages are
        // either fully visible or not yet started.
        let history = store.get_messages(conversation_id).await?;

        self.run_turn(&store, &conversation, history, message).await
    }

    /// Get a conversation with its full ordered message history.
    ///
    /// # Errors
    ///
    /// Returns `NotFound` if the conversation does not exist.
    pub async fn get_conversation(&self, conversation_id: &str) -> AppResult<ConversationDetail> {
        let store = self.database.conversations();
        let conversation = store
            .get_conversation(conversation_id)
            .await?
            .ok_or_else(|| AppError::not_found("Conversation"))?;

        let messages = store.get_messages(conversation_id).await?;

        Ok(ConversationDetail {
            conversation,
            messages,
        })
    }

    /// List a user's conversations with pagination.
    ///
    /// # Errors
    ///
    /// Returns a database error if the query fails.
    pub async fn list_conversations(
        &self,
        user_id: &str,
        skip: i64,
        limit: i64,
    ) -> AppResult<ConversationPage> {
        let store = self.database.conversations();
        let conversations = store.list_conversations(user_id, limit, skip).await?;
        let total = store.count_conversations(user_id).await?;

        Ok(ConversationPage {
            conversations,
            total,
        })
    }

    /// Delete a conversation and all its messages.
    ///
    /// # Errors
    ///
    /// Returns `NotFound` if the conversation does not exist.
    pub async fn delete_conversation(&self, conversation_id: &str) -> AppResult<()> {
        let store = self.database.conversations();
        let deleted = store.delete_conversation(conversation_id).await?;

        if !deleted {
            return Err(AppError::not_found("Conversation"));
        }

        self.turn_locks.remove(conversation_id);
        info!(conversation_id = %conversation_id, "Deleted conversation");
        Ok(())
    }

    /// Context-budget diagnostics for a conversation's current history.
    ///
    /// # Errors
    ///
    /// Returns `NotFound` if the conversation does not exist.
    pub async fn context_stats(&self, conversation_id: &str) -> AppResult<ContextStats> {
        let detail = self.get_conversation(conversation_id).await?;
        let history = Self::to_chat_messages(&detail.messages);
        Ok(self.window.stats(&history))
    }

    // ========================================================================
    // Turn internals
    // ========================================================================

    /// Run one turn: persist user message, build context, dispatch, persist
    /// assistant reply, accumulate totals.
    async fn run_turn(
        &self,
        store: &ConversationStore,
        conversation: &ConversationRecord,
        history: Vec<MessageRecord>,
        content: &str,
    ) -> AppResult<ChatTurn> {
        let user_tokens = self.counter.count_tokens(content);
        let user_message = store
            .add_message(&conversation.id, MessageRole::User, content, user_tokens)
            .await?;

        let system_prompt = self
            .resolve_system_prompt(conversation.mode(), content)
            .await;

        let mut chat_history = Self::to_chat_messages(&history);
        chat_history.push(ChatMessage::user(content));

        let context = self.window.build(
            &chat_history,
            Some(&system_prompt),
            WindowStrategy::SlidingWindow,
        );

        debug!(
            conversation_id = %conversation.id,
            context_messages = context.len(),
            "Dispatching turn to {}",
            self.provider.name()
        );

        let request = ChatRequest::new(context)
            .with_max_tokens(self.window.config().max_response_tokens);

        // The user message above is deliberately not rolled back on failure:
        // the caller retries by resubmitting only the continuation.
        let response = self
            .provider
            .complete(&request)
            .await
            .map_err(Self::to_llm_unavailable)?;

        let assistant_tokens = self.counter.count_tokens(&response.content);
        let assistant_message = store
            .add_message(
                &conversation.id,
                MessageRole::Assistant,
                &response.content,
                assistant_tokens,
            )
            .await?;

        store
            .add_tokens(&conversation.id, user_tokens + assistant_tokens)
            .await?;

        let conversation = store
            .get_conversation(&conversation.id)
            .await?
            .ok_or_else(|| AppError::internal("Conversation disappeared mid-turn"))?;

        Ok(ChatTurn {
            conversation,
            user_message,
            assistant_message,
        })
    }

    /// Resolve the system prompt for a mode, consulting the document
    /// retriever for retrieval-grounded conversations.
    ///
    /// Retrieval failures degrade to an ungrounded prompt rather than
    /// failing the turn.
    async fn resolve_system_prompt(&self, mode: ConversationMode, query: &str) -> String {
        let params = if mode.uses_retrieval() {
            match self.retriever.retrieve(query).await {
                Ok(Some(context)) => PromptParams::with_document_context(context),
                Ok(None) => PromptParams::empty(),
                Err(e) => {
                    warn!("Document retrieval failed, continuing without context: {e}");
                    PromptParams::empty()
                }
            }
        } else {
            PromptParams::empty()
        };

        self.prompts.get_system_prompt(mode, &params)
    }

    /// Convert persisted records into model messages, skipping rows whose
    /// role is unknown rather than failing the turn
    fn to_chat_messages(records: &[MessageRecord]) -> Vec<ChatMessage> {
        records
            .iter()
            .filter_map(|record| {
                MessageRole::parse(&record.role)
                    .map(|role| ChatMessage::new(role, record.content.clone()))
            })
            .collect()
    }

    /// Normalize any backend failure into the language-model-unavailable
    /// kind without leaking transport detail beyond a descriptive message
    fn to_llm_unavailable(error: AppError) -> AppError {
        if error.is_llm_failure() {
            error
        } else {
            AppError::llm_unavailable(error.message)
        }
    }

    fn validate_content(content: &str) -> AppResult<()> {
        if content.trim().is_empty() {
            return Err(AppError::invalid_input("Message content cannot be empty"));
        }
        Ok(())
    }

    fn validate_user_id(user_id: &str) -> AppResult<()> {
        if user_id.trim().is_empty() {
            return Err(AppError::invalid_input("user_id cannot be empty"));
        }
        Ok(())
    }

    /// Get or create the turn lock for a conversation
    fn turn_lock(&self, conversation_id: &str) -> Arc<Mutex<()>> {
        self.turn_locks
            .entry(conversation_id.to_owned())
            .or_insert_with(|| Arc::new(Mutex::new(())))
            .clone()
    }
}
