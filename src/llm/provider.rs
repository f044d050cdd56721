// ABOUTME: Unified LLM provider factory for runtime provider switching
// ABOUTME: Maps typed configuration onto OpenAI-compatible endpoint presets
//
// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 Quill Labs

//! # LLM Provider Factory
//!
//! Builds the configured language-model backend from typed configuration.
//! All supported providers (`OpenAI`, Groq, local) speak the `OpenAI`
//! chat-completions wire format, so the factory selects a preset of
//! [`OpenAiCompatibleConfig`] rather than a distinct client per backend.
//!
//! The provider is constructed once at startup and passed through
//! [`crate::resources::ServerResources`]; there is no lazily initialized
//! global state, which keeps tests free to inject their own
//! [`LlmProvider`](super::LlmProvider) implementations.

use std::env;

use tracing::info;

use super::{OpenAiCompatibleConfig, OpenAiCompatibleProvider};
use crate::config::{LlmConfig, LlmProviderType};
use crate::errors::AppError;

/// Environment variable holding the `OpenAI` API key
const OPENAI_API_KEY_ENV: &str = "OPENAI_API_KEY";

/// Environment variable holding the Groq API key
const GROQ_API_KEY_ENV: &str = "GROQ_API_KEY";

/// Default model for the `OpenAI` preset
const DEFAULT_OPENAI_MODEL: &str = "gpt-4o-mini";

/// Default model for the Groq preset
const DEFAULT_GROQ_MODEL: &str = "llama-3.3-70b-versatile";

/// Default model for the local preset
const DEFAULT_LOCAL_MODEL: &str = "qwen2.5:14b-instruct";

/// Build the language-model provider described by `config`.
///
/// Cloud presets require their API key environment variable; the local preset
/// accepts an optional key. Environment overrides for base URL and model are
/// applied last so deployments can point any preset at a compatible proxy.
///
/// # Errors
///
/// Returns a configuration error if a required API key is missing or the
/// HTTP client cannot be constructed.
pub fn build_provider(config: &LlmConfig) -> Result<OpenAiCompatibleProvider, AppError> {
    info!(
        "Initializing LLM provider: {} (set {} to change)",
        config.provider,
        LlmProviderType::ENV_VAR
    );

    let model = config.model.as_deref();

    let preset = match config.provider {
        LlmProviderType::OpenAi => {
            let api_key = require_api_key(OPENAI_API_KEY_ENV, "OpenAI")?;
            OpenAiCompatibleConfig::openai(model.unwrap_or(DEFAULT_OPENAI_MODEL), Some(api_key))
        }
        LlmProviderType::Groq => {
            let api_key = require_api_key(GROQ_API_KEY_ENV, "Groq")?;
            OpenAiCompatibleConfig::groq(model.unwrap_or(DEFAULT_GROQ_MODEL), Some(api_key))
        }
        LlmProviderType::Local => {
            OpenAiCompatibleConfig::ollama(model.unwrap_or(DEFAULT_LOCAL_MODEL))
        }
    };

    let provider = OpenAiCompatibleProvider::new(preset.with_env_overrides())?;

    info!(
        "Provider {} initialized with model: {}",
        provider.config().display_name,
        provider.config().default_model
    );

    Ok(provider)
}

fn require_api_key(env_var: &str, display_name: &str) -> Result<String, AppError> {
    env::var(env_var)
        .ok()
        .filter(|k| !k.is_empty())
        .ok_or_else(|| {
            AppError::config(format!(
                "{display_name} provider selected but {env_var} is not set"
            ))
        })
}
