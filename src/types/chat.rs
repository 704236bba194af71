//! Chat types.

use serde::{Deserialize, Serialize};

use super::common::Source;
use crate::errors::AnythingLlmError;

/// How the workspace answers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ChatMode {
    /// Answer from the LLM, enriched with retrieved documents.
    #[default]
    Chat,
    /// Answer only from retrieved documents.
    Query,
}

/// Body of `stream-chat` and `chat` requests.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct ChatRequest {
    /// Message including the composed system prompt.
    pub message: String,

    /// Chat mode.
    pub mode: ChatMode,

    /// Optional session identifier to group a conversation.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub session_id: Option<String>,
}

impl ChatRequest {
    /// Creates a chat-mode request.
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
            mode: ChatMode::Chat,
            session_id: None,
        }
    }

    /// Sets the session identifier.
    pub fn with_session(mut self, session_id: impl Into<String>) -> Self {
        self.session_id = Some(session_id.into());
        self
    }

    /// Sets the chat mode.
    pub fn with_mode(mut self, mode: ChatMode) -> Self {
        self.mode = mode;
        self
    }

    /// Validates the request.
    pub fn validate(&self) -> Result<(), AnythingLlmError> {
        if self.message.trim().is_empty() {
            return Err(AnythingLlmError::validation_param(
                "Message cannot be empty",
                "message",
            ));
        }
        Ok(())
    }
}

/// Response of the non-streaming `chat` endpoint.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ChatResponse {
    /// Response identifier.
    #[serde(default)]
    pub id: Option<String>,

    /// Response type (`textResponse`, `abort`).
    #[serde(default, rename = "type")]
    pub response_type: Option<String>,

    /// The answer text.
    #[serde(default)]
    pub text_response: Option<String>,

    /// Sources the answer was grounded on.
    #[serde(default)]
    pub sources: Vec<Source>,

    /// Whether the exchange is closed.
    #[serde(default)]
    pub close: bool,

    /// Backend error, `null`/`false` when none.
    #[serde(default)]
    pub error: Option<serde_json::Value>,
}

impl ChatResponse {
    /// Returns the answer text, or an empty string.
    pub fn text(&self) -> &str {
        self.text_response.as_deref().unwrap_or_default()
    }

    /// Returns the backend error message, if any.
    pub fn error_message(&self) -> Option<&str> {
        self.error.as_ref().and_then(|e| e.as_str()).filter(|s| !s.is_empty())
    }
}
