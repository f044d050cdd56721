// ABOUTME: System prompt templates per conversation mode, loaded at compile time
// ABOUTME: Registry maps modes to templates with an open-chat fallback
//
// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 Quill Labs

//! # System Prompts
//!
//! One template per conversation mode, loaded at compile time from markdown
//! files for easy maintenance. Templates are pure: static text plus optional
//! interpolation of retrieved document context, no persistence, no side
//! effects.
//!
//! The registry shape keeps templates swappable: deployments can register a
//! replacement template for a mode without touching the orchestrator.

use std::collections::HashMap;

use crate::models::ConversationMode;

/// Base system prompt for open chat mode
const OPEN_CHAT_PROMPT: &str = include_str!("open_chat.md");

/// Base system prompt for retrieval-grounded mode
const RETRIEVAL_GROUNDED_PROMPT: &str = include_str!("retrieval_grounded.md");

/// Mode-specific parameters available to templates
#[derive(Debug, Clone, Default)]
pub struct PromptParams {
    /// Retrieved document context for retrieval-grounded conversations
    pub document_context: Option<String>,
}

impl PromptParams {
    /// Params with no document context
    #[must_use]
    pub const fn empty() -> Self {
        Self {
            document_context: None,
        }
    }

    /// Params carrying retrieved document context
    #[must_use]
    pub fn with_document_context(context: impl Into<String>) -> Self {
        Self {
            document_context: Some(context.into()),
        }
    }
}

/// A system prompt template for one conversation mode
pub trait PromptTemplate: Send + Sync {
    /// The mode this template serves
    fn mode(&self) -> ConversationMode;

    /// Render the system prompt for the given parameters
    fn system_prompt(&self, params: &PromptParams) -> String;
}

/// Open chat template: static text, parameters ignored
pub struct OpenChatPrompt;

impl PromptTemplate for OpenChatPrompt {
    fn mode(&self) -> ConversationMode {
        ConversationMode::OpenChat
    }

    fn system_prompt(&self, _params: &PromptParams) -> String {
        OPEN_CHAT_PROMPT.to_owned()
    }
}

/// Retrieval-grounded template: appends document context verbatim inside a
/// delimited block when present, otherwise returns the base text unchanged
pub struct RetrievalGroundedPrompt;

impl PromptTemplate for RetrievalGroundedPrompt {
    fn mode(&self) -> ConversationMode {
        ConversationMode::RetrievalGrounded
    }

    fn system_prompt(&self, params: &PromptParams) -> String {
        match params.document_context.as_deref() {
            Some(context) if !context.is_empty() => format!(
                "{RETRIEVAL_GROUNDED_PROMPT}\n\
                 Document Context:\n\
                 ---\n\
                 {context}\n\
                 ---\n\n\
                 Use the above context to answer user questions accurately."
            ),
            _ => RETRIEVAL_GROUNDED_PROMPT.to_owned(),
        }
    }
}

/// Registry of prompt templates keyed by conversation mode
///
/// Unknown or unregistered modes fall back to the open-chat template.
pub struct PromptRegistry {
    templates: HashMap<ConversationMode, Box<dyn PromptTemplate>>,
}

impl PromptRegistry {
    /// Create an empty registry
    #[must_use]
    pub fn new() -> Self {
        Self {
            templates: HashMap::new(),
        }
    }

    /// Create a registry with the built-in templates registered
    #[must_use]
    pub fn with_defaults() -> Self {
        let mut registry = Self::new();
        registry.register(Box::new(OpenChatPrompt));
        registry.register(Box::new(RetrievalGroundedPrompt));
        registry
    }

    /// Register a template, replacing any existing one for its mode
    pub fn register(&mut self, template: Box<dyn PromptTemplate>) {
        self.templates.insert(template.mode(), template);
    }

    /// Resolve the system prompt for a mode.
    ///
    /// Falls back to the open-chat template when the mode has no registered
    /// template; returns an empty string only if the registry is empty.
    #[must_use]
    pub fn get_system_prompt(&self, mode: ConversationMode, params: &PromptParams) -> String {
        self.templates
            .get(&mode)
            .or_else(|| self.templates.get(&ConversationMode::OpenChat))
            .map(|t| t.system_prompt(params))
            .unwrap_or_default()
    }

    /// List the modes with registered templates
    #[must_use]
    pub fn available_modes(&self) -> Vec<ConversationMode> {
        self.templates.keys().copied().collect()
    }
}

impl Default for PromptRegistry {
    fn default() -> Self {
        Self::with_defaults()
    }
}
