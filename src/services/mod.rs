//! Service implementations for the AnythingLLM developer API.
//!
//! Provides streaming and non-streaming chat, the connection prober,
//! workspace management and document upload.

mod chat;
mod documents;
mod probe;
mod workspaces;

pub use chat::{ChatService, StreamCallbacks, StreamHandler, StreamOutcome};
pub use documents::DocumentsService;
pub use probe::{ConnectionProber, ConnectionState, ConnectionStatus};
pub use workspaces::WorkspacesService;

use crate::errors::{AnythingLlmError, AnythingLlmResult, ApiErrorResponse};
use crate::transport::HttpResponse;

/// Builds `api/v1/workspace/{slug}/{action}` with the slug percent-encoded.
pub(crate) fn workspace_path(slug: &str, action: Option<&str>) -> String {
    // Form encoding writes a space as `+` and a literal `+` as `%2B`.
    let slug = url::form_urlencoded::byte_serialize(slug.trim().as_bytes())
        .collect::<String>()
        .replace('+', "%20");
    match action {
        Some(action) => format!("api/v1/workspace/{}/{}", slug, action),
        None => format!("api/v1/workspace/{}", slug),
    }
}

/// Maps a non-2xx response to an error, using the backend's message when present.
pub(crate) fn error_from_response(response: &HttpResponse) -> AnythingLlmError {
    let message = serde_json::from_slice::<ApiErrorResponse>(&response.body)
        .ok()
        .and_then(|body| body.text().map(str::to_string))
        .unwrap_or_else(|| {
            let text = String::from_utf8_lossy(&response.body);
            let text = text.trim();
            if text.is_empty() {
                format!("HTTP {}", response.status)
            } else {
                text.chars().take(200).collect()
            }
        });

    AnythingLlmError::from_status(response.status, message)
}

/// Parses a 2xx response body, or maps the error status.
pub(crate) fn parse_json<T: serde::de::DeserializeOwned>(
    response: &HttpResponse,
) -> AnythingLlmResult<T> {
    if !response.is_success() {
        return Err(error_from_response(response));
    }
    response.json().map_err(|e| AnythingLlmError::Serialization {
        message: format!("Failed to parse response: {}", e),
    })
}
