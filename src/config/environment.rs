// ABOUTME: Environment configuration management for deployment-specific settings
// ABOUTME: Handles environment variables, typed sub-configs, and runtime parsing
//
// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 Quill Labs

//! Environment-based configuration management for production deployment

use crate::services::context_window::ContextConfig;
use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::env;
use std::path::PathBuf;
use tracing::info;

/// Strongly typed log level configuration
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(rename_all = "lowercase")]
pub enum LogLevel {
    /// Errors only
    Error,
    /// Errors and warnings
    Warn,
    /// Standard operational logging
    #[default]
    Info,
    /// Verbose diagnostics
    Debug,
    /// Everything, including per-message traces
    Trace,
}

impl LogLevel {
    /// Parse from string with fallback
    #[must_use]
    pub fn from_str_or_default(s: &str) -> Self {
        match s.to_lowercase().as_str() {
            "error" => Self::Error,
            "warn" => Self::Warn,
            "debug" => Self::Debug,
            "trace" => Self::Trace,
            _ => Self::Info,
        }
    }
}

impl std::fmt::Display for LogLevel {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Error => write!(f, "error"),
            Self::Warn => write!(f, "warn"),
            Self::Info => write!(f, "info"),
            Self::Debug => write!(f, "debug"),
            Self::Trace => write!(f, "trace"),
        }
    }
}

/// Environment type for deployment-specific behavior
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(rename_all = "lowercase")]
pub enum Environment {
    /// Local development
    #[default]
    Development,
    /// Production deployment
    Production,
    /// Automated test runs
    Testing,
}

impl Environment {
    /// Parse from string with fallback
    #[must_use]
    pub fn from_str_or_default(s: &str) -> Self {
        match s.to_lowercase().as_str() {
            "production" | "prod" => Self::Production,
            "testing" | "test" => Self::Testing,
            _ => Self::Development,
        }
    }

    /// Check if this is a production environment
    #[must_use]
    pub const fn is_production(&self) -> bool {
        matches!(self, Self::Production)
    }
}

/// Type-safe database configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum DatabaseUrl {
    /// `SQLite` database with file path
    SQLite {
        /// Path to the database file
        path: PathBuf,
    },
    /// In-memory `SQLite` (for testing)
    Memory,
}

impl DatabaseUrl {
    /// Parse from string
    #[must_use]
    pub fn parse_url(s: &str) -> Self {
        let path_str = s.strip_prefix("sqlite:").unwrap_or(s);
        if path_str == ":memory:" {
            Self::Memory
        } else {
            Self::SQLite {
                path: PathBuf::from(path_str),
            }
        }
    }

    /// Convert to connection string
    #[must_use]
    pub fn to_connection_string(&self) -> String {
        match self {
            Self::SQLite { path } => format!("sqlite:{}", path.display()),
            Self::Memory => "sqlite::memory:".to_owned(),
        }
    }

    /// Check if this is an in-memory database
    #[must_use]
    pub const fn is_memory(&self) -> bool {
        matches!(self, Self::Memory)
    }
}

impl Default for DatabaseUrl {
    fn default() -> Self {
        Self::SQLite {
            path: PathBuf::from("./data/quill.db"),
        }
    }
}

impl std::fmt::Display for DatabaseUrl {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.to_connection_string())
    }
}

/// Language-model provider selection
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(rename_all = "lowercase")]
pub enum LlmProviderType {
    /// `OpenAI` cloud endpoint
    OpenAi,
    /// Groq - LPU-accelerated inference for open-source models (default)
    #[default]
    Groq,
    /// Local `OpenAI`-compatible endpoint (Ollama, vLLM, `LocalAI`)
    Local,
}

impl LlmProviderType {
    /// Environment variable name for provider selection
    pub const ENV_VAR: &'static str = "QUILL_LLM_PROVIDER";

    /// Environment variable for model selection
    pub const MODEL_ENV_VAR: &'static str = "QUILL_LLM_MODEL";

    /// Parse from string with fallback to default
    #[must_use]
    pub fn from_str_or_default(s: &str) -> Self {
        match s.to_lowercase().as_str() {
            "openai" => Self::OpenAi,
            "local" | "ollama" | "vllm" | "localai" => Self::Local,
            _ => Self::Groq,
        }
    }

    /// Load from environment variable
    #[must_use]
    pub fn from_env() -> Self {
        env::var(Self::ENV_VAR)
            .map(|s| Self::from_str_or_default(&s))
            .unwrap_or_default()
    }

    /// Model override from environment, if set
    #[must_use]
    pub fn model_from_env() -> Option<String> {
        env::var(Self::MODEL_ENV_VAR).ok().filter(|m| !m.is_empty())
    }
}

impl std::fmt::Display for LlmProviderType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::OpenAi => write!(f, "openai"),
            Self::Groq => write!(f, "groq"),
            Self::Local => write!(f, "local"),
        }
    }
}

/// Language-model configuration
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct LlmConfig {
    /// Which provider preset to use
    pub provider: LlmProviderType,
    /// Model override (provider default used when absent)
    pub model: Option<String>,
}

/// Token counting strategy selection
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(rename_all = "lowercase")]
pub enum TokenCounterKind {
    /// Model-specific subword tokenizer, degrading to the heuristic counter
    /// when no tokenizer can be acquired
    #[default]
    Precise,
    /// Character-length heuristic, no tokenizer required
    Approximate,
}

impl TokenCounterKind {
    /// Environment variable name for counter selection
    pub const ENV_VAR: &'static str = "QUILL_TOKEN_COUNTER";

    /// Parse from string with fallback to default
    #[must_use]
    pub fn from_str_or_default(s: &str) -> Self {
        match s.to_lowercase().as_str() {
            "approximate" | "heuristic" => Self::Approximate,
            _ => Self::Precise,
        }
    }

    /// Load from environment variable
    #[must_use]
    pub fn from_env() -> Self {
        env::var(Self::ENV_VAR)
            .map(|s| Self::from_str_or_default(&s))
            .unwrap_or_default()
    }
}

/// Database configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DatabaseConfig {
    /// Database URL (`SQLite` path or `:memory:`)
    pub url: DatabaseUrl,
}

/// Top-level server configuration loaded from the environment
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerConfig {
    /// HTTP API port
    pub http_port: u16,
    /// Log level
    pub log_level: LogLevel,
    /// Deployment environment
    pub environment: Environment,
    /// Database configuration
    pub database: DatabaseConfig,
    /// Language-model configuration
    pub llm: LlmConfig,
    /// Token counting strategy
    pub token_counter: TokenCounterKind,
    /// Context window tunables
    pub context: ContextConfig,
}

impl ServerConfig {
    /// Load configuration from environment variables
    ///
    /// # Errors
    ///
    /// Returns an error if a numeric environment variable fails to parse.
    pub fn from_env() -> Result<Self> {
        info!("Loading configuration from environment variables");

        let config = Self {
            http_port: env_var_or("QUILL_HTTP_PORT", "8081")?
                .parse()
                .context("Invalid QUILL_HTTP_PORT value")?,
            log_level: LogLevel::from_str_or_default(&env_var_or("RUST_LOG", "info")?),
            environment: Environment::from_str_or_default(&env_var_or(
                "ENVIRONMENT",
                "development",
            )?),
            database: DatabaseConfig {
                url: DatabaseUrl::parse_url(&env_var_or("DATABASE_URL", "sqlite:./data/quill.db")?),
            },
            llm: LlmConfig {
                provider: LlmProviderType::from_env(),
                model: LlmProviderType::model_from_env(),
            },
            token_counter: TokenCounterKind::from_env(),
            context: ContextConfig {
                max_context_tokens: env_var_or("QUILL_MAX_CONTEXT_TOKENS", "4096")?
                    .parse()
                    .context("Invalid QUILL_MAX_CONTEXT_TOKENS value")?,
                max_response_tokens: env_var_or("QUILL_MAX_RESPONSE_TOKENS", "1024")?
                    .parse()
                    .context("Invalid QUILL_MAX_RESPONSE_TOKENS value")?,
                sliding_window_messages: env_var_or("QUILL_SLIDING_WINDOW_MESSAGES", "20")?
                    .parse()
                    .context("Invalid QUILL_SLIDING_WINDOW_MESSAGES value")?,
                system_prompt_token_budget: env_var_or("QUILL_SYSTEM_PROMPT_TOKEN_BUDGET", "500")?
                    .parse()
                    .context("Invalid QUILL_SYSTEM_PROMPT_TOKEN_BUDGET value")?,
            },
        };

        Ok(config)
    }

    /// Human-readable configuration summary for startup logs
    #[must_use]
    pub fn summary(&self) -> String {
        format!(
            "Quill Chat Server Configuration:\n\
             - HTTP Port: {}\n\
             - Log Level: {}\n\
             - Environment: {}\n\
             - Database: {}\n\
             - LLM Provider: {}\n\
             - Token Counter: {:?}\n\
             - Context Window: {} tokens ({} reserved for response, {} message cap)",
            self.http_port,
            self.log_level,
            if self.environment.is_production() {
                "production"
            } else {
                "development"
            },
            self.database.url,
            self.llm.provider,
            self.token_counter,
            self.context.max_context_tokens,
            self.context.max_response_tokens,
            self.context.sliding_window_messages,
        )
    }
}

fn env_var_or(key: &str, default: &str) -> Result<String> {
    Ok(env::var(key).unwrap_or_else(|_| default.to_owned()))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_database_url_parsing() {
        assert!(DatabaseUrl::parse_url("sqlite::memory:").is_memory());
        let url = DatabaseUrl::parse_url("sqlite:./data/quill.db");
        assert_eq!(url.to_connection_string(), "sqlite:./data/quill.db");
    }

    #[test]
    fn test_llm_provider_type_parsing() {
        assert_eq!(
            LlmProviderType::from_str_or_default("openai"),
            LlmProviderType::OpenAi
        );
        assert_eq!(
            LlmProviderType::from_str_or_default("ollama"),
            LlmProviderType::Local
        );
        // Unknown values fall back to the default provider
        assert_eq!(
            LlmProviderType::from_str_or_default("something-else"),
            LlmProviderType::Groq
        );
    }

    #[test]
    fn test_token_counter_kind_parsing() {
        assert_eq!(
            TokenCounterKind::from_str_or_default("approximate"),
            TokenCounterKind::Approximate
        );
        assert_eq!(
            TokenCounterKind::from_str_or_default("precise"),
            TokenCounterKind::Precise
        );
    }
}
