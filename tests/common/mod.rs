// ABOUTME: Shared fixtures for integration tests
// ABOUTME: Mock LLM provider and in-memory server resource construction
//
// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 Quill Labs

#![allow(clippy::unwrap_used, clippy::expect_used, clippy::panic)]
#![allow(dead_code)]

use std::collections::VecDeque;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};

use async_trait::async_trait;

use quill_chat_server::config::environment::{
    DatabaseConfig, DatabaseUrl, Environment, LlmConfig, LogLevel, ServerConfig, TokenCounterKind,
};
use quill_chat_server::database::Database;
use quill_chat_server::errors::AppError;
use quill_chat_server::llm::{
    ChatRequest, ChatResponse, LlmCapabilities, LlmProvider,
};
use quill_chat_server::resources::ServerResources;
use quill_chat_server::retrieval::{DocumentRetriever, NullRetriever};
use quill_chat_server::services::context_window::ContextConfig;
use quill_chat_server::services::token_counter::{HeuristicTokenCounter, TokenCounter};

/// Mock language-model backend with scripted responses and failure toggling
pub struct MockLlmProvider {
    responses: Mutex<VecDeque<String>>,
    failing: AtomicBool,
    requests: Mutex<Vec<ChatRequest>>,
}

impl MockLlmProvider {
    /// Provider that always answers with a fixed default reply
    pub fn new() -> Self {
        Self {
            responses: Mutex::new(VecDeque::new()),
            failing: AtomicBool::new(false),
            requests: Mutex::new(Vec::new()),
        }
    }

    /// Provider that answers with the given replies in order, then the default
    pub fn with_responses(responses: &[&str]) -> Self {
        let provider = Self::new();
        {
            let mut queue = provider.responses.lock().unwrap();
            for response in responses {
                queue.push_back((*response).to_owned());
            }
        }
        provider
    }

    /// Provider whose every completion fails
    pub fn failing() -> Self {
        let provider = Self::new();
        provider.set_failing(true);
        provider
    }

    /// Toggle failure mode
    pub fn set_failing(&self, failing: bool) {
        self.failing.store(failing, Ordering::SeqCst);
    }

    /// Requests captured so far, in call order
    pub fn requests(&self) -> Vec<ChatRequest> {
        self.requests.lock().unwrap().clone()
    }

    /// The most recent captured request, if any
    pub fn last_request(&self) -> Option<ChatRequest> {
        self.requests.lock().unwrap().last().cloned()
    }
}

impl Default for MockLlmProvider {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl LlmProvider for MockLlmProvider {
    fn name(&self) -> &'static str {
        "mock"
    }

    fn display_name(&self) -> &'static str {
        "Mock LLM"
    }

    fn capabilities(&self) -> LlmCapabilities {
        LlmCapabilities::text_only()
    }

    fn default_model(&self) -> &str {
        "mock-model"
    }

    async fn complete(&self, request: &ChatRequest) -> Result<ChatResponse, AppError> {
        self.requests.lock().unwrap().push(request.clone());

        if self.failing.load(Ordering::SeqCst) {
            return Err(AppError::llm_unavailable("mock provider failure"));
        }

        let content = self
            .responses
            .lock()
            .unwrap()
            .pop_front()
            .unwrap_or_else(|| "Mock assistant reply".to_owned());

        Ok(ChatResponse {
            content,
            model: "mock-model".to_owned(),
            usage: None,
            finish_reason: Some("stop".to_owned()),
        })
    }

    async fn health_check(&self) -> Result<bool, AppError> {
        Ok(!self.failing.load(Ordering::SeqCst))
    }
}

/// Server configuration suitable for in-memory test runs
pub fn test_config() -> ServerConfig {
    ServerConfig {
        http_port: 0,
        log_level: LogLevel::Info,
        environment: Environment::Testing,
        database: DatabaseConfig {
            url: DatabaseUrl::Memory,
        },
        llm: LlmConfig::default(),
        token_counter: TokenCounterKind::Approximate,
        context: ContextConfig::default(),
    }
}

/// Create an in-memory test database with migrated schema
pub async fn create_test_database() -> Database {
    Database::new("sqlite::memory:")
        .await
        .expect("Failed to create test database")
}

/// Assemble server resources around the given provider, with an in-memory
/// database, heuristic token counting, and no document retrieval
pub async fn create_test_resources(provider: Arc<dyn LlmProvider>) -> Arc<ServerResources> {
    create_test_resources_with(provider, Arc::new(NullRetriever)).await
}

/// Assemble server resources with an explicit retriever
pub async fn create_test_resources_with(
    provider: Arc<dyn LlmProvider>,
    retriever: Arc<dyn DocumentRetriever>,
) -> Arc<ServerResources> {
    let config = Arc::new(test_config());
    let database = create_test_database().await;
    let counter: Arc<dyn TokenCounter> = Arc::new(HeuristicTokenCounter);

    Arc::new(ServerResources::new(
        config, database, provider, counter, retriever,
    ))
}
