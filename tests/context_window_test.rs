// ABOUTME: Unit tests for the context window builder
// ABOUTME: Covers system prompt budgeting, sliding window, truncate-oldest, and stats
//
// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 Quill Labs

#![allow(clippy::unwrap_used, clippy::expect_used, clippy::panic)]
#![allow(missing_docs)]

use std::sync::Arc;

use quill_chat_server::llm::{ChatMessage, MessageRole};
use quill_chat_server::services::context_window::{
    ContextConfig, ContextWindow, WindowStrategy,
};
use quill_chat_server::services::token_counter::HeuristicTokenCounter;

fn window(config: ContextConfig) -> ContextWindow {
    ContextWindow::new(config, Arc::new(HeuristicTokenCounter))
}

/// A user message whose overhead-inclusive cost is exactly 14 tokens under
/// the heuristic counter: 4 overhead + 2 for the role + 8 for 28 chars
fn message_costing_14(fill: char) -> ChatMessage {
    ChatMessage::user(fill.to_string().repeat(28))
}

// ============================================================================
// System Prompt Budgeting
// ============================================================================

#[test]
fn test_system_prompt_within_budget_is_first() {
    let window = window(ContextConfig::default());
    let messages = vec![ChatMessage::user("hello")];

    let context = window.build(&messages, Some("Be helpful."), WindowStrategy::SlidingWindow);

    assert_eq!(context[0].role, MessageRole::System);
    assert_eq!(context[0].content, "Be helpful.");
    assert_eq!(context.len(), 2);
}

#[test]
fn test_oversized_system_prompt_is_omitted() {
    let config = ContextConfig {
        system_prompt_token_budget: 5,
        ..ContextConfig::default()
    };
    let window = window(config);
    let messages = vec![ChatMessage::user("hello")];

    let context = window.build(&messages, Some("Be helpful."), WindowStrategy::SlidingWindow);

    // Never truncated, only dropped entirely
    assert!(context.iter().all(|m| m.role != MessageRole::System));
    assert_eq!(context.len(), 1);
}

#[test]
fn test_empty_history_and_no_system_prompt_is_empty() {
    let window = window(ContextConfig::default());
    let context = window.build(&[], None, WindowStrategy::SlidingWindow);
    assert!(context.is_empty());
}

// ============================================================================
// Sliding Window
// ============================================================================

#[test]
fn test_sliding_window_worked_example() {
    // Three messages with overhead-inclusive costs [14, 14, 14] against an
    // available budget of 30: two fit (28), three do not (42), so exactly
    // the two most recent survive.
    let config = ContextConfig {
        max_context_tokens: 30,
        max_response_tokens: 0,
        sliding_window_messages: 20,
        system_prompt_token_budget: 500,
    };
    let window = window(config);

    let messages = vec![
        message_costing_14('a'),
        message_costing_14('b'),
        message_costing_14('c'),
    ];

    let context = window.build(&messages, None, WindowStrategy::SlidingWindow);

    assert_eq!(context.len(), 2);
    assert_eq!(context[0].content, messages[1].content);
    assert_eq!(context[1].content, messages[2].content);
}

#[test]
fn test_newest_message_is_never_dropped() {
    let config = ContextConfig {
        max_context_tokens: 10,
        max_response_tokens: 0,
        sliding_window_messages: 20,
        system_prompt_token_budget: 500,
    };
    let window = window(config);

    let messages = vec![message_costing_14('a'), message_costing_14('b')];
    let context = window.build(&messages, None, WindowStrategy::SlidingWindow);

    // The newest message alone exceeds the budget but is included anyway
    assert_eq!(context.len(), 1);
    assert_eq!(context[0].content, messages[1].content);
}

#[test]
fn test_sliding_window_caps_message_count() {
    let config = ContextConfig {
        max_context_tokens: 100_000,
        max_response_tokens: 0,
        sliding_window_messages: 20,
        system_prompt_token_budget: 500,
    };
    let window = window(config);

    let messages: Vec<ChatMessage> = (0..25)
        .map(|i| ChatMessage::user(format!("message number {i}")))
        .collect();

    let context = window.build(&messages, None, WindowStrategy::SlidingWindow);

    // Older-than-window messages are discarded outright despite the budget
    assert_eq!(context.len(), 20);
    assert_eq!(context[0].content, messages[5].content);
    assert_eq!(context[19].content, messages[24].content);
}

#[test]
fn test_chronological_order_is_preserved() {
    let window = window(ContextConfig::default());

    let messages = vec![
        ChatMessage::user("first question"),
        ChatMessage::assistant("first answer, somewhat longer than the question"),
        ChatMessage::user("second question"),
        ChatMessage::assistant("second answer"),
    ];

    let context = window.build(&messages, Some("Be helpful."), WindowStrategy::SlidingWindow);

    assert_eq!(context[0].role, MessageRole::System);
    let history: Vec<&str> = context[1..].iter().map(|m| m.content.as_str()).collect();
    let expected: Vec<&str> = messages.iter().map(|m| m.content.as_str()).collect();
    assert_eq!(history, expected);
}

// ============================================================================
// Truncate Oldest
// ============================================================================

#[test]
fn test_truncate_oldest_pops_from_front() {
    // Whole-batch cost of three messages is 3 * 14 + 3 = 45; after dropping
    // the oldest it is 31, which fits a 31-token budget exactly.
    let config = ContextConfig {
        max_context_tokens: 31,
        max_response_tokens: 0,
        sliding_window_messages: 20,
        system_prompt_token_budget: 500,
    };
    let window = window(config);

    let messages = vec![
        message_costing_14('a'),
        message_costing_14('b'),
        message_costing_14('c'),
    ];

    let context = window.build(&messages, None, WindowStrategy::TruncateOldest);

    assert_eq!(context.len(), 2);
    assert_eq!(context[0].content, messages[1].content);
    assert_eq!(context[1].content, messages[2].content);
}

#[test]
fn test_truncate_oldest_has_no_window_cap() {
    let config = ContextConfig {
        max_context_tokens: 100_000,
        max_response_tokens: 0,
        sliding_window_messages: 20,
        system_prompt_token_budget: 500,
    };
    let window = window(config);

    let messages: Vec<ChatMessage> = (0..25)
        .map(|i| ChatMessage::user(format!("message number {i}")))
        .collect();

    let context = window.build(&messages, None, WindowStrategy::TruncateOldest);

    // Unbounded lookback: everything that fits stays
    assert_eq!(context.len(), 25);
}

// ============================================================================
// Stats
// ============================================================================

#[test]
fn test_context_stats() {
    let config = ContextConfig {
        max_context_tokens: 30,
        max_response_tokens: 0,
        sliding_window_messages: 20,
        system_prompt_token_budget: 500,
    };
    let window = window(config);

    let messages = vec![
        message_costing_14('a'),
        message_costing_14('b'),
        message_costing_14('c'),
    ];

    let stats = window.stats(&messages);

    assert_eq!(stats.total_tokens, 45);
    assert_eq!(stats.max_tokens, 30);
    assert_eq!(stats.available_tokens, 30);
    assert_eq!(stats.message_count, 3);
    assert!(!stats.can_add_more);
    assert!((stats.used_percentage - 150.0).abs() < f64::EPSILON);
}

#[test]
fn test_context_stats_with_headroom() {
    let window = window(ContextConfig::default());
    let stats = window.stats(&[ChatMessage::user("hello")]);

    assert_eq!(stats.message_count, 1);
    assert!(stats.can_add_more);
    assert!(stats.used_percentage < 1.0);
}
