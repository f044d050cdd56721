// ABOUTME: Common domain types shared across the chat core
// ABOUTME: Defines conversation modes and their wire-format names
//
// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 Quill Labs

//! Common data models for the chat core

use serde::{Deserialize, Serialize};
use std::fmt::{Display, Formatter, Result as FmtResult};

/// Conversation mode selecting which system prompt template and retrieval
/// behavior apply to a conversation.
///
/// Stored on the conversation record at creation time and immutable after.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash, Default)]
#[serde(rename_all = "snake_case")]
pub enum ConversationMode {
    /// Free-form assistant chat with no document grounding
    #[default]
    OpenChat,
    /// Answers grounded in retrieved document context
    #[serde(rename = "rag")]
    RetrievalGrounded,
}

impl ConversationMode {
    /// Wire/storage representation of the mode
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::OpenChat => "open_chat",
            Self::RetrievalGrounded => "rag",
        }
    }

    /// Parse a mode from its wire/storage representation.
    ///
    /// Returns `None` for unknown mode strings; callers at the API boundary
    /// reject those as validation failures, while internal readers fall back
    /// to [`Self::OpenChat`].
    #[must_use]
    pub fn parse(value: &str) -> Option<Self> {
        match value {
            "open_chat" => Some(Self::OpenChat),
            "rag" | "retrieval_grounded" => Some(Self::RetrievalGrounded),
            _ => None,
        }
    }

    /// Whether turns in this mode consult the document retriever
    #[must_use]
    pub const fn uses_retrieval(&self) -> bool {
        matches!(self, Self::RetrievalGrounded)
    }
}

impl Display for ConversationMode {
    fn fmt(&self, f: &mut Formatter<'_>) -> FmtResult {
        write!(f, "{}", self.as_str())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_mode_round_trip() {
        assert_eq!(
            ConversationMode::parse("open_chat"),
            Some(ConversationMode::OpenChat)
        );
        assert_eq!(
            ConversationMode::parse("rag"),
            Some(ConversationMode::RetrievalGrounded)
        );
        assert_eq!(ConversationMode::parse("coding_assistant"), None);
        assert_eq!(ConversationMode::OpenChat.as_str(), "open_chat");
        assert_eq!(ConversationMode::RetrievalGrounded.as_str(), "rag");
    }

    #[test]
    fn test_mode_serde_names() {
        let json = serde_json::to_string(&ConversationMode::RetrievalGrounded).unwrap();
        assert_eq!(json, "\"rag\"");
        let parsed: ConversationMode = serde_json::from_str("\"open_chat\"").unwrap();
        assert_eq!(parsed, ConversationMode::OpenChat);
    }
}
