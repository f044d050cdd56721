// ABOUTME: Document retrieval boundary feeding the retrieval-grounded prompt
// ABOUTME: Capability trait with null and fixed-text implementations
//
// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 Quill Labs

//! # Document Retrieval Boundary
//!
//! Retrieval-grounded conversations inject retrieved document context into
//! the system prompt. The chat core only needs the final context string, so
//! the whole retrieval pipeline (embedding, vector search, ranking) sits
//! behind this one-method trait. A deployment wires in its own
//! implementation; the built-ins cover "no retrieval configured" and tests.

use async_trait::async_trait;

use crate::errors::AppResult;

/// Produces optional document context for a user query
#[async_trait]
pub trait DocumentRetriever: Send + Sync {
    /// Retrieve document context relevant to `query`.
    ///
    /// `Ok(None)` means no relevant context; the retrieval-grounded template
    /// then renders without a document block. Errors are degraded to no
    /// context by the orchestrator rather than failing the turn.
    async fn retrieve(&self, query: &str) -> AppResult<Option<String>>;
}

/// Retriever for deployments without a document pipeline: always no context
#[derive(Debug, Clone, Copy, Default)]
pub struct NullRetriever;

#[async_trait]
impl DocumentRetriever for NullRetriever {
    async fn retrieve(&self, _query: &str) -> AppResult<Option<String>> {
        Ok(None)
    }
}

/// Retriever returning a fixed context string, for tests and demos
#[derive(Debug, Clone, Default)]
pub struct StaticRetriever {
    context: Option<String>,
}

impl StaticRetriever {
    /// Create a retriever that always returns the given context
    #[must_use]
    pub fn new(context: impl Into<String>) -> Self {
        Self {
            context: Some(context.into()),
        }
    }
}

#[async_trait]
impl DocumentRetriever for StaticRetriever {
    async fn retrieve(&self, _query: &str) -> AppResult<Option<String>> {
        Ok(self.context.clone())
    }
}
