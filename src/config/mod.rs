// ABOUTME: Configuration management module for centralized server settings
// ABOUTME: Handles environment-driven configuration and typed runtime options
//
// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 Quill Labs

//! Configuration module for the Quill chat server
//!
//! All configuration is environment-driven: there are no config files.
//! [`environment::ServerConfig::from_env`] assembles the typed configuration
//! used by the binary and by [`crate::resources::ServerResources`].

/// Environment and server configuration
pub mod environment;

// Re-export main configuration types
pub use environment::{
    DatabaseConfig, DatabaseUrl, Environment, LlmConfig, LlmProviderType, LogLevel, ServerConfig,
    TokenCounterKind,
};
