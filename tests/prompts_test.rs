// ABOUTME: Unit tests for the prompt registry and mode templates
// ABOUTME: Covers per-mode templates, document context injection, and fallback
//
// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 Quill Labs

#![allow(clippy::unwrap_used, clippy::expect_used, clippy::panic)]
#![allow(missing_docs)]

use quill_chat_server::models::ConversationMode;
use quill_chat_server::services::prompts::{
    OpenChatPrompt, PromptParams, PromptRegistry, PromptTemplate,
};

#[test]
fn test_open_chat_prompt_ignores_params() {
    let registry = PromptRegistry::with_defaults();

    let bare = registry.get_system_prompt(ConversationMode::OpenChat, &PromptParams::empty());
    let with_context = registry.get_system_prompt(
        ConversationMode::OpenChat,
        &PromptParams::with_document_context("ignored"),
    );

    assert!(!bare.is_empty());
    assert_eq!(bare, with_context);
    assert!(!bare.contains("ignored"));
}

#[test]
fn test_retrieval_prompt_without_context_is_base_template() {
    let registry = PromptRegistry::with_defaults();

    let prompt =
        registry.get_system_prompt(ConversationMode::RetrievalGrounded, &PromptParams::empty());

    assert!(prompt.contains("document-grounded"));
    assert!(!prompt.contains("Document Context:"));
}

#[test]
fn test_retrieval_prompt_appends_context_verbatim() {
    let registry = PromptRegistry::with_defaults();
    let context = "The warranty period is 24 months from date of purchase.";

    let prompt = registry.get_system_prompt(
        ConversationMode::RetrievalGrounded,
        &PromptParams::with_document_context(context),
    );

    assert!(prompt.contains("Document Context:"));
    assert!(prompt.contains(context));
    // The context sits inside a delimited block after the base template
    let base =
        registry.get_system_prompt(ConversationMode::RetrievalGrounded, &PromptParams::empty());
    assert!(prompt.starts_with(&base));
    assert!(prompt.contains("---"));
}

#[test]
fn test_empty_document_context_is_treated_as_absent() {
    let registry = PromptRegistry::with_defaults();

    let prompt = registry.get_system_prompt(
        ConversationMode::RetrievalGrounded,
        &PromptParams::with_document_context(""),
    );

    assert!(!prompt.contains("Document Context:"));
}

#[test]
fn test_unregistered_mode_falls_back_to_open_chat() {
    let mut registry = PromptRegistry::new();
    registry.register(Box::new(OpenChatPrompt));

    let open = registry.get_system_prompt(ConversationMode::OpenChat, &PromptParams::empty());
    let fallback =
        registry.get_system_prompt(ConversationMode::RetrievalGrounded, &PromptParams::empty());

    assert_eq!(open, fallback);
}

#[test]
fn test_empty_registry_returns_empty_prompt() {
    let registry = PromptRegistry::new();
    let prompt = registry.get_system_prompt(ConversationMode::OpenChat, &PromptParams::empty());
    assert!(prompt.is_empty());
}

#[test]
fn test_default_registry_covers_both_modes() {
    let registry = PromptRegistry::with_defaults();
    let mut modes = registry.available_modes();
    modes.sort_by_key(quill_chat_server::models::ConversationMode::as_str);

    assert_eq!(
        modes,
        vec![
            ConversationMode::OpenChat,
            ConversationMode::RetrievalGrounded
        ]
    );
}
