// ABOUTME: Token-budgeted selection of conversation history for model calls
// ABOUTME: Sliding-window and truncate-oldest strategies plus context diagnostics
//
// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 Quill Labs

//! # Context Window Builder
//!
//! Given the full persisted history of a conversation, a resolved system
//! prompt, and a token budget, this module selects the ordered subset of
//! messages actually sent to the language model.
//!
//! Selection rules, in order:
//! 1. The budget is the model context size minus the tokens reserved for the
//!    response.
//! 2. A system prompt is prepended only if its whole-batch cost fits the
//!    dedicated system-prompt budget; an oversized prompt is omitted, never
//!    truncated.
//! 3. The sliding-window strategy caps history to the most recent N messages
//!    and then walks newest to oldest, including each message atomically
//!    while the cumulative cost stays within budget.
//! 4. The newest message is never dropped: if it alone exceeds the budget it
//!    is still included, and the over-budget request is the provider's
//!    problem to reject.
//!
//! The builder never errors: malformed or empty inputs degrade to smaller
//! (possibly empty) context, not turn failures.

use std::sync::Arc;

use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use super::token_counter::TokenCounter;
use crate::llm::ChatMessage;

/// Tunables for context selection
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ContextConfig {
    /// Total model context capacity in tokens
    pub max_context_tokens: u32,
    /// Tokens reserved for the model's response
    pub max_response_tokens: u32,
    /// Hard cap on how many recent messages the sliding window considers
    pub sliding_window_messages: usize,
    /// Separate budget for the system prompt
    pub system_prompt_token_budget: u32,
}

impl Default for ContextConfig {
    fn default() -> Self {
        Self {
            max_context_tokens: 4096,
            max_response_tokens: 1024,
            sliding_window_messages: 20,
            system_prompt_token_budget: 500,
        }
    }
}

/// Strategy for fitting history into the token budget
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum WindowStrategy {
    /// Keep the most recent N messages, capped further by the token budget
    #[default]
    SlidingWindow,
    /// Drop oldest messages until the whole remaining history fits; no
    /// message-count cap
    TruncateOldest,
}

/// Read-only diagnostics for a message set against the configured budget
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ContextStats {
    /// Batch cost of the messages as they would be sent
    pub total_tokens: u32,
    /// Total model context capacity
    pub max_tokens: u32,
    /// Capacity remaining after the response reservation
    pub available_tokens: u32,
    /// Percentage of the available budget in use
    pub used_percentage: f64,
    /// Number of messages measured
    pub message_count: usize,
    /// Whether further messages still fit the budget
    pub can_add_more: bool,
}

/// Builds bounded message lists for language-model calls
pub struct ContextWindow {
    config: ContextConfig,
    counter: Arc<dyn TokenCounter>,
}

impl ContextWindow {
    /// Create a builder with the given configuration and token counter
    #[must_use]
    pub fn new(config: ContextConfig, counter: Arc<dyn TokenCounter>) -> Self {
        Self { config, counter }
    }

    /// Access the active configuration
    #[must_use]
    pub const fn config(&self) -> &ContextConfig {
        &self.config
    }

    /// Tokens available for conversation context after the response reservation
    #[must_use]
    pub const fn available_context_tokens(&self) -> u32 {
        self.config
            .max_context_tokens
            .saturating_sub(self.config.max_response_tokens)
    }

    /// Select the ordered messages to send for this turn.
    ///
    /// `messages` must be in ascending sequence order (oldest first); the
    /// result preserves that order, with the system prompt (if budgeted)
    /// always first.
    #[must_use]
    pub fn build(
        &self,
        messages: &[ChatMessage],
        system_prompt: Option<&str>,
        strategy: WindowStrategy,
    ) -> Vec<ChatMessage> {
        let mut context = Vec::new();
        let mut available = self.available_context_tokens();

        if let Some(prompt) = system_prompt.filter(|p| !p.is_empty()) {
            let system_message = ChatMessage::system(prompt);
            let system_tokens = self
                .counter
                .count_messages_tokens(std::slice::from_ref(&system_message));

            if system_tokens <= self.config.system_prompt_token_budget {
                available = available.saturating_sub(system_tokens);
                context.push(system_message);
            } else {
                // Oversized prompts are omitted, never truncated
                warn!(
                    "System prompt ({} tokens) exceeds its budget ({}), omitting",
                    system_tokens, self.config.system_prompt_token_budget
                );
            }
        }

        let selected = match strategy {
            WindowStrategy::SlidingWindow => self.apply_sliding_window(messages, available),
            WindowStrategy::TruncateOldest => self.truncate_oldest(messages, available),
        };

        debug!(
            "Built context: {} of {} history messages selected ({:?})",
            selected.len(),
            messages.len(),
            strategy
        );

        context.extend(selected);
        context
    }

    /// Keep the most recent messages that fit the remaining budget.
    ///
    /// Walks the window newest to oldest; a message is included only if it
    /// fits in full. The walk stops at the first message that would exceed
    /// the budget, so an older cheap message can never leapfrog a newer
    /// expensive one.
    fn apply_sliding_window(&self, messages: &[ChatMessage], budget: u32) -> Vec<ChatMessage> {
        if messages.is_empty() {
            return Vec::new();
        }

        let start = messages
            .len()
            .saturating_sub(self.config.sliding_window_messages);
        let recent = &messages[start..];

        let mut selected: Vec<ChatMessage> = Vec::new();
        let mut current_tokens = 0_u32;

        for message in recent.iter().rev() {
            let message_tokens = self.counter.count_message_tokens(message);

            if current_tokens.saturating_add(message_tokens) <= budget {
                selected.push(message.clone());
                current_tokens += message_tokens;
            } else {
                if selected.is_empty() {
                    // The newest message alone exceeds the budget. Sending an
                    // over-budget request beats silently dropping the user's
                    // turn.
                    warn!(
                        "Newest message ({message_tokens} tokens) exceeds remaining budget \
                         ({budget}), including it anyway"
                    );
                    if let Some(newest) = messages.last() {
                        selected.push(newest.clone());
                    }
                }
                break;
            }
        }

        selected.reverse();
        selected
    }

    /// Drop oldest messages until the whole remaining set fits the budget.
    ///
    /// Unlike the sliding window there is no message-count cap; callers that
    /// want unbounded lookback pay repeated whole-batch measurement instead.
    fn truncate_oldest(&self, messages: &[ChatMessage], budget: u32) -> Vec<ChatMessage> {
        let mut result: Vec<ChatMessage> = messages.to_vec();

        while !result.is_empty() && self.counter.count_messages_tokens(&result) > budget {
            result.remove(0);
        }

        result
    }

    /// Read-only diagnostics for a message set
    #[must_use]
    pub fn stats(&self, messages: &[ChatMessage]) -> ContextStats {
        let total_tokens = self.counter.count_messages_tokens(messages);
        let available_tokens = self.available_context_tokens();

        let used_percentage = if available_tokens > 0 {
            f64::from(total_tokens) / f64::from(available_tokens) * 100.0
        } else {
            0.0
        };

        ContextStats {
            total_tokens,
            max_tokens: self.config.max_context_tokens,
            available_tokens,
            used_percentage,
            message_count: messages.len(),
            can_add_more: total_tokens < available_tokens,
        }
    }
}
