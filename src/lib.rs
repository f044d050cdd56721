// ABOUTME: Main library entry point for the Quill chat server
// ABOUTME: Conversational AI backend with budgeted context windows and persisted history
//
// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 Quill Labs

#![deny(unsafe_code)]

//! # Quill Chat Server
//!
//! A conversational AI backend. Conversations and their messages persist in
//! `SQLite` with strictly increasing per-conversation sequence numbers; each
//! turn selects the history subset that fits a token budget and dispatches
//! it to a pluggable `OpenAI`-compatible language-model backend.
//!
//! ## Features
//!
//! - **Persisted conversations**: append-only message log with canonical
//!   sequence ordering and running token totals
//! - **Budgeted context windows**: sliding-window selection under a token
//!   budget, with a truncate-oldest alternative
//! - **Two conversation modes**: open chat, and retrieval-grounded chat with
//!   document context injected into the system prompt
//! - **Pluggable token counting**: subword tokenizer or heuristic strategy
//! - **Provider-agnostic LLM seam**: `OpenAI`, Groq, or local servers
//!
//! ## Architecture
//!
//! - **Services**: token counting, prompt selection, context windowing, and
//!   the turn orchestrator
//! - **Database**: `SQLite` persistence for conversations and messages
//! - **LLM**: provider trait and `OpenAI`-compatible client
//! - **Routes**: thin axum handlers over the service layer
//!
//! ## Example Usage
//!
//! ```rust,no_run
//! use quill_chat_server::config::environment::ServerConfig;
//!
//! fn main() -> anyhow::Result<()> {
//!     let config = ServerConfig::from_env()?;
//!     println!("Quill chat server configured for port {}", config.http_port);
//!     Ok(())
//! }
//! ```

// ── Public API ──────────────────────────────────────────────────────────
// These modules are used by the server binary and integration tests.

/// Configuration management
pub mod config;

/// Conversation and message persistence
pub mod database;

/// Unified error handling system with standard error codes and HTTP responses
pub mod errors;

/// LLM provider abstraction for chat integration
pub mod llm;

/// Production logging and structured output
pub mod logging;

/// Common data models
pub mod models;

/// Shared server resources for dependency injection
pub mod resources;

/// Document retrieval boundary for retrieval-grounded conversations
pub mod retrieval;

/// `HTTP` routes
pub mod routes;

/// Domain service layer: token counting, prompts, windowing, orchestration
pub mod services;
