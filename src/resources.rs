// ABOUTME: Shared server resources constructed once at startup
// ABOUTME: Explicit dependency bundle passed to routes instead of global singletons
//
// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 Quill Labs

//! # Server Resources
//!
//! All long-lived collaborators (database pool, language-model provider,
//! prompt registry, context window, chat service) are constructed once here
//! and shared via `Arc`. Nothing in the server is lazily initialized global
//! state: tests build their own resources with injected fakes, and teardown
//! is dropping the struct.

use std::sync::Arc;

use crate::config::environment::ServerConfig;
use crate::database::Database;
use crate::llm::LlmProvider;
use crate::retrieval::DocumentRetriever;
use crate::services::chat::ChatService;
use crate::services::context_window::ContextWindow;
use crate::services::prompts::PromptRegistry;
use crate::services::token_counter::TokenCounter;

/// Shared resources for route handlers
pub struct ServerResources {
    /// Server configuration
    pub config: Arc<ServerConfig>,
    /// Database with migrated schema
    pub database: Database,
    /// Language-model backend
    pub provider: Arc<dyn LlmProvider>,
    /// Chat turn orchestrator
    pub chat_service: Arc<ChatService>,
}

impl ServerResources {
    /// Assemble server resources from constructed collaborators.
    ///
    /// The token counter and retriever are taken as trait objects so tests
    /// and alternative deployments can inject their own implementations.
    #[must_use]
    pub fn new(
        config: Arc<ServerConfig>,
        database: Database,
        provider: Arc<dyn LlmProvider>,
        counter: Arc<dyn TokenCounter>,
        retriever: Arc<dyn DocumentRetriever>,
    ) -> Self {
        let prompts = Arc::new(PromptRegistry::with_defaults());
        let window = Arc::new(ContextWindow::new(
            config.context.clone(),
            Arc::clone(&counter),
        ));

        let chat_service = Arc::new(ChatService::new(
            database.clone(),
            Arc::clone(&provider),
            prompts,
            window,
            counter,
            retriever,
        ));

        Self {
            config,
            database,
            provider,
            chat_service,
        }
    }
}
