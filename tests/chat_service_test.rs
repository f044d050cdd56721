// ABOUTME: Integration tests for the chat turn orchestrator
// ABOUTME: Covers turn persistence, totals, failure durability, and validation
//
// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 Quill Labs

#![allow(clippy::unwrap_used, clippy::expect_used, clippy::panic)]
#![allow(missing_docs)]

mod common;

use std::sync::Arc;

use common::{create_test_resources, create_test_resources_with, MockLlmProvider};
use quill_chat_server::errors::ErrorCode;
use quill_chat_server::llm::MessageRole;
use quill_chat_server::models::ConversationMode;
use quill_chat_server::retrieval::StaticRetriever;

// ============================================================================
// Turn Orchestration
// ============================================================================

#[tokio::test]
async fn test_create_conversation_persists_both_turn_messages() {
    let provider = Arc::new(MockLlmProvider::with_responses(&["Hello! How can I help?"]));
    let resources = create_test_resources(provider).await;

    let turn = resources
        .chat_service
        .create_conversation("u1", "hello", ConversationMode::OpenChat, Some("Greeting"))
        .await
        .unwrap();

    assert_eq!(turn.user_message.sequence_number, 1);
    assert_eq!(turn.user_message.role, "user");
    assert_eq!(turn.user_message.content, "hello");
    assert_eq!(turn.assistant_message.sequence_number, 2);
    assert_eq!(turn.assistant_message.role, "assistant");
    assert_eq!(turn.assistant_message.content, "Hello! How can I help?");

    // The stored total equals the sum of the two messages' token counts
    let expected_total = turn.user_message.token_count + turn.assistant_message.token_count;
    assert_eq!(turn.conversation.total_tokens, expected_total);

    let detail = resources
        .chat_service
        .get_conversation(&turn.conversation.id)
        .await
        .unwrap();
    assert_eq!(detail.messages.len(), 2);
    assert_eq!(detail.conversation.total_tokens, expected_total);
}

#[tokio::test]
async fn test_add_message_continues_sequence_and_totals() {
    let provider = Arc::new(MockLlmProvider::new());
    let resources = create_test_resources(provider).await;

    let first = resources
        .chat_service
        .create_conversation("u1", "hello", ConversationMode::OpenChat, None)
        .await
        .unwrap();

    let second = resources
        .chat_service
        .add_message(&first.conversation.id, "tell me more")
        .await
        .unwrap();

    assert_eq!(second.user_message.sequence_number, 3);
    assert_eq!(second.assistant_message.sequence_number, 4);

    let turn_tokens = second.user_message.token_count + second.assistant_message.token_count;
    assert_eq!(
        second.conversation.total_tokens,
        first.conversation.total_tokens + turn_tokens
    );
}

#[tokio::test]
async fn test_turn_sends_system_prompt_first() {
    let provider = Arc::new(MockLlmProvider::new());
    let resources = create_test_resources(provider.clone()).await;

    resources
        .chat_service
        .create_conversation("u1", "hello", ConversationMode::OpenChat, None)
        .await
        .unwrap();

    let request = provider.last_request().unwrap();
    assert_eq!(request.messages[0].role, MessageRole::System);
    assert_eq!(
        request.messages.last().map(|m| m.content.as_str()),
        Some("hello")
    );
}

#[tokio::test]
async fn test_retrieval_mode_injects_document_context() {
    let provider = Arc::new(MockLlmProvider::new());
    let retriever = Arc::new(StaticRetriever::new("Warranty lasts 24 months."));
    let resources =
        create_test_resources_with(provider.clone(), retriever).await;

    resources
        .chat_service
        .create_conversation("u1", "how long is the warranty?", ConversationMode::RetrievalGrounded, None)
        .await
        .unwrap();

    let request = provider.last_request().unwrap();
    assert_eq!(request.messages[0].role, MessageRole::System);
    assert!(request.messages[0].content.contains("Warranty lasts 24 months."));
}

#[tokio::test]
async fn test_open_chat_mode_skips_retrieval_context() {
    let provider = Arc::new(MockLlmProvider::new());
    let retriever = Arc::new(StaticRetriever::new("should not appear"));
    let resources =
        create_test_resources_with(provider.clone(), retriever).await;

    resources
        .chat_service
        .create_conversation("u1", "hello", ConversationMode::OpenChat, None)
        .await
        .unwrap();

    let request = provider.last_request().unwrap();
    assert!(!request.messages[0].content.contains("should not appear"));
}

// ============================================================================
// Failure Semantics
// ============================================================================

#[tokio::test]
async fn test_backend_failure_preserves_user_message() {
    let provider = Arc::new(MockLlmProvider::new());
    let resources = create_test_resources(provider.clone()).await;

    let first = resources
        .chat_service
        .create_conversation("u1", "hello", ConversationMode::OpenChat, None)
        .await
        .unwrap();

    provider.set_failing(true);

    let error = resources
        .chat_service
        .add_message(&first.conversation.id, "this turn fails")
        .await
        .unwrap_err();

    assert!(error.is_llm_failure());
    assert_eq!(error.code, ErrorCode::ExternalServiceUnavailable);

    // The user's message is durable even though the assistant reply failed
    let detail = resources
        .chat_service
        .get_conversation(&first.conversation.id)
        .await
        .unwrap();
    assert_eq!(detail.messages.len(), 3);
    let last = detail.messages.last().unwrap();
    assert_eq!(last.role, "user");
    assert_eq!(last.content, "this turn fails");
    assert_eq!(last.sequence_number, 3);

    // Retrying the continuation succeeds and picks up the next sequence
    provider.set_failing(false);
    let retry = resources
        .chat_service
        .add_message(&first.conversation.id, "this turn fails")
        .await
        .unwrap();
    assert_eq!(retry.user_message.sequence_number, 4);
    assert_eq!(retry.assistant_message.sequence_number, 5);
}

#[tokio::test]
async fn test_missing_conversation_persists_nothing() {
    let provider = Arc::new(MockLlmProvider::new());
    let resources = create_test_resources(provider.clone()).await;

    let error = resources
        .chat_service
        .add_message("no-such-conversation", "hello")
        .await
        .unwrap_err();

    assert_eq!(error.code, ErrorCode::ResourceNotFound);
    // The backend was never consulted
    assert!(provider.requests().is_empty());
}

#[tokio::test]
async fn test_empty_message_is_rejected_before_persistence() {
    let provider = Arc::new(MockLlmProvider::new());
    let resources = create_test_resources(provider).await;

    let error = resources
        .chat_service
        .create_conversation("u1", "   ", ConversationMode::OpenChat, None)
        .await
        .unwrap_err();

    assert_eq!(error.code, ErrorCode::InvalidInput);

    let page = resources
        .chat_service
        .list_conversations("u1", 0, 10)
        .await
        .unwrap();
    assert_eq!(page.total, 0);
}

// ============================================================================
// Reads and Deletes
// ============================================================================

#[tokio::test]
async fn test_list_conversations_pagination() {
    let provider = Arc::new(MockLlmProvider::new());
    let resources = create_test_resources(provider).await;

    for i in 0..3 {
        resources
            .chat_service
            .create_conversation("u1", &format!("message {i}"), ConversationMode::OpenChat, None)
            .await
            .unwrap();
    }

    let page = resources
        .chat_service
        .list_conversations("u1", 0, 2)
        .await
        .unwrap();
    assert_eq!(page.conversations.len(), 2);
    assert_eq!(page.total, 3);
    assert!(page.conversations.iter().all(|c| c.message_count == 2));
}

#[tokio::test]
async fn test_delete_conversation_cascades() {
    let provider = Arc::new(MockLlmProvider::new());
    let resources = create_test_resources(provider).await;

    let turn = resources
        .chat_service
        .create_conversation("u1", "hello", ConversationMode::OpenChat, None)
        .await
        .unwrap();

    resources
        .chat_service
        .delete_conversation(&turn.conversation.id)
        .await
        .unwrap();

    let error = resources
        .chat_service
        .get_conversation(&turn.conversation.id)
        .await
        .unwrap_err();
    assert_eq!(error.code, ErrorCode::ResourceNotFound);

    // Message rows went with the conversation
    let store = resources.database.conversations();
    assert!(store
        .get_message(&turn.user_message.id)
        .await
        .unwrap()
        .is_none());
    assert!(store
        .get_message(&turn.assistant_message.id)
        .await
        .unwrap()
        .is_none());
}

#[tokio::test]
async fn test_delete_missing_conversation_is_not_found() {
    let provider = Arc::new(MockLlmProvider::new());
    let resources = create_test_resources(provider).await;

    let error = resources
        .chat_service
        .delete_conversation("no-such-id")
        .await
        .unwrap_err();
    assert_eq!(error.code, ErrorCode::ResourceNotFound);
}

#[tokio::test]
async fn test_context_stats_reflect_history() {
    let provider = Arc::new(MockLlmProvider::new());
    let resources = create_test_resources(provider).await;

    let turn = resources
        .chat_service
        .create_conversation("u1", "hello", ConversationMode::OpenChat, None)
        .await
        .unwrap();

    let stats = resources
        .chat_service
        .context_stats(&turn.conversation.id)
        .await
        .unwrap();

    assert_eq!(stats.message_count, 2);
    assert!(stats.total_tokens > 0);
    assert!(stats.can_add_more);
}
