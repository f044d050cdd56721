// ABOUTME: Unit tests for the LLM provider abstraction layer
// ABOUTME: Tests capabilities, message handling, provider registry, and config presets
//
// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 Quill Labs

#![allow(clippy::unwrap_used, clippy::expect_used, clippy::panic)]
#![allow(missing_docs)]

mod common;

use std::sync::Arc;

use common::MockLlmProvider;
use quill_chat_server::llm::{
    ChatMessage, ChatRequest, LlmCapabilities, LlmProvider, LlmProviderRegistry, MessageRole,
    OpenAiCompatibleConfig, OpenAiCompatibleProvider,
};

// ============================================================================
// LlmCapabilities Tests
// ============================================================================

#[test]
fn test_capabilities_text_only() {
    let caps = LlmCapabilities::text_only();
    assert!(caps.supports_system_messages());
    assert!(!caps.supports_streaming());
    assert!(!caps.supports_json_mode());
}

// ============================================================================
// MessageRole Tests
// ============================================================================

#[test]
fn test_message_role_round_trip() {
    for role in [MessageRole::System, MessageRole::User, MessageRole::Assistant] {
        assert_eq!(MessageRole::parse(role.as_str()), Some(role));
    }
    assert_eq!(MessageRole::parse("tool"), None);
}

// ============================================================================
// ChatMessage Tests
// ============================================================================

#[test]
fn test_chat_message_constructors() {
    let system = ChatMessage::system("You are helpful");
    assert_eq!(system.role, MessageRole::System);
    assert_eq!(system.content, "You are helpful");

    let user = ChatMessage::user("Hello");
    assert_eq!(user.role, MessageRole::User);

    let assistant = ChatMessage::assistant("Hi there!");
    assert_eq!(assistant.role, MessageRole::Assistant);
}

// ============================================================================
// ChatRequest Tests
// ============================================================================

#[test]
fn test_chat_request_builder() {
    let request = ChatRequest::new(vec![ChatMessage::user("Hello")])
        .with_model("llama-3.3-70b-versatile")
        .with_temperature(0.7)
        .with_max_tokens(1000);

    assert_eq!(request.model.as_deref(), Some("llama-3.3-70b-versatile"));
    assert_eq!(request.temperature, Some(0.7));
    assert_eq!(request.max_tokens, Some(1000));
}

// ============================================================================
// Config Preset Tests
// ============================================================================

#[test]
fn test_openai_compatible_presets() {
    let openai = OpenAiCompatibleConfig::openai("gpt-4o-mini", Some("sk-test".to_owned()));
    assert_eq!(openai.base_url, "https://api.openai.com/v1");
    assert_eq!(openai.provider_name, "openai");

    let groq = OpenAiCompatibleConfig::groq("llama-3.3-70b-versatile", None);
    assert_eq!(groq.base_url, "https://api.groq.com/openai/v1");

    let ollama = OpenAiCompatibleConfig::ollama("qwen2.5:14b-instruct");
    assert!(ollama.base_url.contains("11434"));
    assert!(ollama.api_key.is_none());
}

#[test]
fn test_provider_exposes_preset_identity() {
    let provider =
        OpenAiCompatibleProvider::new(OpenAiCompatibleConfig::groq("test-model", None)).unwrap();

    assert_eq!(provider.name(), "groq");
    assert_eq!(provider.display_name(), "Groq");
    assert_eq!(provider.default_model(), "test-model");
    assert!(provider.capabilities().supports_system_messages());
}

// ============================================================================
// LlmProviderRegistry Tests
// ============================================================================

#[test]
fn test_registry_operations() {
    let registry = LlmProviderRegistry::new();
    assert!(registry.list().is_empty());
    assert!(registry.default_provider().is_none());
}

#[tokio::test]
async fn test_registry_lookup_by_name() {
    let mut registry = LlmProviderRegistry::new();
    registry.register(Box::new(MockLlmProvider::new()));

    let provider = registry.get("mock").unwrap();
    assert_eq!(provider.display_name(), "Mock LLM");
    assert!(registry.get("missing").is_none());

    let response = provider
        .complete(&ChatRequest::new(vec![ChatMessage::user("ping")]))
        .await
        .unwrap();
    assert_eq!(response.content, "Mock assistant reply");

    let default = registry.default_provider().unwrap();
    assert_eq!(default.name(), "mock");

    let health = Arc::new(MockLlmProvider::failing());
    assert!(!health.health_check().await.unwrap());
}
