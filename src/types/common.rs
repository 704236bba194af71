//! Common types shared across the AnythingLLM API.

use serde::{Deserialize, Serialize};

/// Response of `GET /api/v1/auth`.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct AuthResponse {
    /// Whether the supplied key is valid.
    #[serde(default)]
    pub authenticated: bool,
}

/// A retrieved source document attached to an answer.
#[derive(Debug, Clone, Deserialize, Serialize, PartialEq)]
pub struct Source {
    /// Document title.
    #[serde(default)]
    pub title: Option<String>,

    /// Excerpt the answer was grounded on.
    #[serde(default)]
    pub text: Option<String>,

    /// Similarity score, when the backend reports one.
    #[serde(default, rename = "score", skip_serializing_if = "Option::is_none")]
    pub score: Option<f64>,
}
