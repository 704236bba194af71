//! HTTP transport layer for the AnythingLLM client.
//!
//! Provides the HTTP transport abstraction, the reqwest implementation,
//! and incremental parsing of the stream-chat frame format.

mod http;
mod streaming;

pub use self::http::{HttpMethod, HttpRequest, HttpResponse, HttpTransport, HttpTransportImpl};
pub use streaming::{
    DeltaStream, FrameParser, StreamEvent, StreamFrame, StreamingResponse, DATA_PREFIX,
    DONE_SENTINEL,
};

use std::collections::HashMap;
use std::time::Duration;

use crate::errors::AnythingLlmError;

/// Multipart request for document uploads.
#[derive(Debug, Clone)]
pub struct MultipartRequest {
    /// Request path.
    pub path: String,
    /// Request headers.
    pub headers: HashMap<String, String>,
    /// Multipart form parts.
    pub parts: Vec<MultipartPart>,
    /// Request timeout.
    pub timeout: Option<Duration>,
}

/// A part of a multipart form.
#[derive(Debug, Clone)]
pub enum MultipartPart {
    /// Text field.
    Text {
        /// Field name.
        name: String,
        /// Field value.
        value: String,
    },
    /// File field.
    File {
        /// Field name.
        name: String,
        /// File name.
        filename: String,
        /// Content type.
        content_type: String,
        /// File data.
        data: Vec<u8>,
    },
}

/// Transport error types.
#[derive(Debug, thiserror::Error)]
pub enum TransportError {
    /// The backend could not be reached.
    #[error("Connection error: {message}")]
    Connection {
        /// Error message.
        message: String,
    },

    /// Timeout error.
    #[error("Timeout after {timeout:?}")]
    Timeout {
        /// Timeout duration.
        timeout: Duration,
    },

    /// Invalid response or broken body.
    #[error("Invalid response: {message}")]
    InvalidResponse {
        /// Error message.
        message: String,
    },
}

impl From<TransportError> for AnythingLlmError {
    fn from(err: TransportError) -> Self {
        match err {
            TransportError::Connection { message } => AnythingLlmError::Network {
                message,
                cause: None,
            },
            TransportError::Timeout { timeout } => AnythingLlmError::Timeout { timeout },
            TransportError::InvalidResponse { message } => AnythingLlmError::Stream {
                message,
                partial_content: None,
            },
        }
    }
}
