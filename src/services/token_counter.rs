// ABOUTME: Pluggable token counting strategies for context budget accounting
// ABOUTME: Subword tokenizer-backed precise counting with a heuristic fallback
//
// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 Quill Labs

//! # Token Counting
//!
//! Token costs drive every context-budget decision, so the two strategies
//! here share fixed framing-overhead constants: whichever strategy is active,
//! budget comparisons stay internally consistent. Callers receive an
//! `Arc<dyn TokenCounter>` and must not assume which strategy is behind it.
//!
//! - [`SubwordTokenCounter`]: model-specific subword tokenizer, resolved via
//!   the Hugging Face hub and cached locally. Unrecognized models use a
//!   generic fixed tokenizer.
//! - [`HeuristicTokenCounter`]: character-length approximation, used when no
//!   tokenizer can be acquired (offline hosts, tests).
//!
//! Counts are approximate by contract - consistency matters, provider parity
//! does not.

use std::sync::Arc;

use hf_hub::api::sync::Api;
use tokenizers::Tokenizer;
use tracing::{debug, warn};

use crate::config::TokenCounterKind;
use crate::errors::{AppError, AppResult};
use crate::llm::ChatMessage;

/// Fixed framing cost added to every message (role/content separators)
pub const MESSAGE_OVERHEAD_TOKENS: u32 = 4;

/// Fixed cost added once per batch for the assistant reply priming
pub const REPLY_PRIMING_TOKENS: u32 = 3;

/// Hub repository providing the generic fixed tokenizer for unrecognized models
const FALLBACK_TOKENIZER_REPO: &str = "openai-community/gpt2";

/// Contract for converting text and messages into token counts.
///
/// Both provided methods derive from [`count_tokens`](Self::count_tokens),
/// so the overhead constants apply identically to every strategy.
pub trait TokenCounter: Send + Sync {
    /// Count tokens in a text string
    fn count_tokens(&self, text: &str) -> u32;

    /// Cost of a single message including its framing overhead.
    ///
    /// This is the unit the window builder budgets with when walking
    /// history; it excludes the per-batch reply priming cost.
    fn count_message_tokens(&self, message: &ChatMessage) -> u32 {
        MESSAGE_OVERHEAD_TOKENS
            + self.count_tokens(message.role.as_str())
            + self.count_tokens(&message.content)
    }

    /// Total cost of a message batch as sent to the model, including the
    /// per-batch reply priming overhead.
    fn count_messages_tokens(&self, messages: &[ChatMessage]) -> u32 {
        messages
            .iter()
            .map(|m| self.count_message_tokens(m))
            .sum::<u32>()
            + REPLY_PRIMING_TOKENS
    }
}

// ============================================================================
// Heuristic Strategy
// ============================================================================

/// Character-length token approximation: `ceil(len / 4) + 1`.
///
/// Monotonic in input length and cheap enough to run on every turn. Used
/// whenever a subword tokenizer is unavailable.
#[derive(Debug, Clone, Copy, Default)]
pub struct HeuristicTokenCounter;

impl TokenCounter for HeuristicTokenCounter {
    fn count_tokens(&self, text: &str) -> u32 {
        #[allow(clippy::cast_possible_truncation)]
        let count = (text.len().div_ceil(4) + 1) as u32;
        count
    }
}

// ============================================================================
// Subword Strategy
// ============================================================================

/// Token counter backed by a subword tokenizer.
///
/// Construction downloads the tokenizer definition from the Hugging Face hub
/// (cached on disk after the first fetch); counting itself is offline. If an
/// individual encode fails the counter degrades to the heuristic formula for
/// that input rather than failing the turn.
pub struct SubwordTokenCounter {
    tokenizer: Tokenizer,
}

impl SubwordTokenCounter {
    /// Wrap an already-loaded tokenizer
    #[must_use]
    pub const fn from_tokenizer(tokenizer: Tokenizer) -> Self {
        Self { tokenizer }
    }

    /// Resolve and load the tokenizer for a model name.
    ///
    /// Known model families map to their published tokenizer repositories;
    /// anything else uses the generic fixed tokenizer.
    ///
    /// # Errors
    ///
    /// Returns an error if the hub is unreachable and the tokenizer is not
    /// already cached, or if the downloaded definition fails to load.
    pub fn from_model(model: &str) -> AppResult<Self> {
        let repo = Self::tokenizer_repo(model);
        debug!("Loading tokenizer for model '{model}' from '{repo}'");

        let api = Api::new()
            .map_err(|e| AppError::internal(format!("Hugging Face hub API error: {e}")))?;

        let tokenizer_path = api.model(repo.to_owned()).get("tokenizer.json").map_err(|e| {
            AppError::internal(format!("Failed to fetch tokenizer from '{repo}': {e}"))
        })?;

        let tokenizer = Tokenizer::from_file(&tokenizer_path)
            .map_err(|e| AppError::internal(format!("Failed to load tokenizer: {e}")))?;

        Ok(Self { tokenizer })
    }

    /// Map a model name onto a tokenizer repository
    fn tokenizer_repo(model: &str) -> &'static str {
        let model = model.to_lowercase();
        if model.contains("gpt-4o") {
            "Xenova/gpt-4o"
        } else if model.contains("gpt-4") || model.contains("gpt-3.5") {
            "Xenova/gpt-4"
        } else if model.contains("qwen") {
            "Qwen/Qwen2.5-14B-Instruct"
        } else if model.contains("llama") {
            "TinyLlama/TinyLlama-1.1B-Chat-v1.0"
        } else {
            FALLBACK_TOKENIZER_REPO
        }
    }
}

impl TokenCounter for SubwordTokenCounter {
    fn count_tokens(&self, text: &str) -> u32 {
        match self.tokenizer.encode(text, false) {
            #[allow(clippy::cast_possible_truncation)]
            Ok(encoding) => encoding.get_ids().len() as u32,
            Err(e) => {
                warn!("Tokenizer encode failed, using heuristic count: {e}");
                HeuristicTokenCounter.count_tokens(text)
            }
        }
    }
}

// ============================================================================
// Factory
// ============================================================================

/// Build the configured token counter.
///
/// Requesting the precise strategy degrades to the heuristic counter when no
/// tokenizer can be acquired; the degradation is logged, never surfaced as a
/// turn failure.
#[must_use]
pub fn build_token_counter(kind: TokenCounterKind, model: Option<&str>) -> Arc<dyn TokenCounter> {
    match kind {
        TokenCounterKind::Approximate => Arc::new(HeuristicTokenCounter),
        TokenCounterKind::Precise => {
            match SubwordTokenCounter::from_model(model.unwrap_or_default()) {
                Ok(counter) => Arc::new(counter),
                Err(e) => {
                    warn!("Subword tokenizer unavailable, using heuristic counting: {e}");
                    Arc::new(HeuristicTokenCounter)
                }
            }
        }
    }
}
