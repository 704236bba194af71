//! Mock implementations for testing.
//!
//! [`MockTransport`] records every request and replays queued responses.
//! Streaming responses are replayed as caller-chosen chunks so tests can
//! split frames at arbitrary byte offsets.

use async_trait::async_trait;
use bytes::Bytes;
use futures::stream::{self, BoxStream, StreamExt};
use std::collections::{HashMap, VecDeque};
use std::sync::{Mutex, MutexGuard};

use crate::auth::AuthProvider;
use crate::errors::AnythingLlmError;
use crate::transport::{
    HttpMethod, HttpRequest, HttpResponse, HttpTransport, MultipartPart, MultipartRequest,
    StreamingResponse, TransportError,
};

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(std::sync::PoisonError::into_inner)
}

/// What a streaming body does after its chunks are exhausted.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StreamTail {
    /// The body ends.
    End,
    /// The body never ends (the read stays pending).
    Pending,
    /// The body read fails.
    Error(String),
}

/// A mock response.
#[derive(Debug, Clone)]
pub struct MockResponse {
    /// HTTP status code.
    pub status: u16,
    /// Response headers.
    pub headers: HashMap<String, String>,
    /// Body chunks, delivered one per read.
    pub chunks: Vec<Vec<u8>>,
    /// Behaviour after the last chunk.
    pub tail: StreamTail,
    /// Fail before any response arrives.
    pub failure: Option<MockFailure>,
}

/// A transport-level failure to simulate.
#[derive(Debug, Clone)]
pub enum MockFailure {
    /// The backend could not be reached.
    Connection(String),
    /// The request timed out.
    Timeout(std::time::Duration),
}

impl MockResponse {
    fn new(status: u16, chunks: Vec<Vec<u8>>) -> Self {
        Self {
            status,
            headers: HashMap::new(),
            chunks,
            tail: StreamTail::End,
            failure: None,
        }
    }

    /// Creates a successful JSON response.
    pub fn json<T: serde::Serialize>(value: &T) -> Self {
        let body = serde_json::to_vec(value).unwrap_or_default();
        Self::new(200, vec![body]).with_header("content-type", "application/json")
    }

    /// Creates an error response in AnythingLLM's error shape.
    pub fn error(status: u16, message: &str) -> Self {
        let body = serde_json::to_vec(&serde_json::json!({ "error": message })).unwrap_or_default();
        Self::new(status, vec![body]).with_header("content-type", "application/json")
    }

    /// Creates a response with an empty body.
    pub fn empty(status: u16) -> Self {
        Self::new(status, Vec::new())
    }

    /// Creates a streaming response delivered in the given chunks.
    pub fn stream<I, C>(chunks: I) -> Self
    where
        I: IntoIterator<Item = C>,
        C: AsRef<[u8]>,
    {
        let chunks = chunks.into_iter().map(|c| c.as_ref().to_vec()).collect();
        Self::new(200, chunks).with_header("content-type", "text/event-stream")
    }

    /// Creates a streaming response whose body is split every `size` bytes.
    pub fn stream_split(body: &str, size: usize) -> Self {
        Self::stream(body.as_bytes().chunks(size.max(1)))
    }

    /// Creates a connection failure.
    pub fn connection_error(message: &str) -> Self {
        Self {
            failure: Some(MockFailure::Connection(message.to_string())),
            ..Self::empty(0)
        }
    }

    /// Creates a timeout failure.
    pub fn timeout(after: std::time::Duration) -> Self {
        Self {
            failure: Some(MockFailure::Timeout(after)),
            ..Self::empty(0)
        }
    }

    /// Keeps the body open after the last chunk.
    pub fn then_pending(mut self) -> Self {
        self.tail = StreamTail::Pending;
        self
    }

    /// Fails the body read after the last chunk.
    pub fn then_error(mut self, message: &str) -> Self {
        self.tail = StreamTail::Error(message.to_string());
        self
    }

    /// Sets the status code.
    pub fn with_status(mut self, status: u16) -> Self {
        self.status = status;
        self
    }

    /// Adds a header.
    pub fn with_header(mut self, name: &str, value: &str) -> Self {
        self.headers.insert(name.to_string(), value.to_string());
        self
    }

    fn body(&self) -> Vec<u8> {
        self.chunks.concat()
    }

    fn into_byte_stream(self) -> BoxStream<'static, Result<Bytes, TransportError>> {
        let chunks = stream::iter(self.chunks.into_iter().map(|c| Ok(Bytes::from(c))));
        match self.tail {
            StreamTail::End => chunks.boxed(),
            StreamTail::Pending => chunks.chain(stream::pending()).boxed(),
            StreamTail::Error(message) => chunks
                .chain(stream::once(async move {
                    Err(TransportError::InvalidResponse { message })
                }))
                .boxed(),
        }
    }

    fn check_failure(&self) -> Result<(), TransportError> {
        match &self.failure {
            Some(MockFailure::Connection(message)) => Err(TransportError::Connection {
                message: message.clone(),
            }),
            Some(MockFailure::Timeout(timeout)) => Err(TransportError::Timeout { timeout: *timeout }),
            None => Ok(()),
        }
    }
}

/// A recorded request.
#[derive(Debug, Clone)]
pub struct RecordedRequest {
    /// HTTP method.
    pub method: HttpMethod,
    /// Request path.
    pub path: String,
    /// Request body (text fields only for multipart requests).
    pub body: Option<Vec<u8>>,
    /// Request headers.
    pub headers: HashMap<String, String>,
    /// File names of multipart file parts.
    pub files: Vec<String>,
    /// Whether the request was sent as a stream.
    pub streaming: bool,
}

impl RecordedRequest {
    /// Parses the body as JSON.
    pub fn json(&self) -> Option<serde_json::Value> {
        self.body
            .as_deref()
            .and_then(|body| serde_json::from_slice(body).ok())
    }

    /// Returns a header value.
    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers
            .iter()
            .find(|(k, _)| k.eq_ignore_ascii_case(name))
            .map(|(_, v)| v.as_str())
    }
}

/// Mock HTTP transport for testing.
#[derive(Default)]
pub struct MockTransport {
    responses: Mutex<VecDeque<MockResponse>>,
    requests: Mutex<Vec<RecordedRequest>>,
    default_response: Mutex<Option<MockResponse>>,
}

impl MockTransport {
    /// Creates a new mock transport.
    pub fn new() -> Self {
        Self::default()
    }

    /// Queues a response.
    pub fn queue(&self, response: MockResponse) {
        lock(&self.responses).push_back(response);
    }

    /// Queues a JSON response.
    pub fn queue_json<T: serde::Serialize>(&self, value: &T) {
        self.queue(MockResponse::json(value));
    }

    /// Queues an error response.
    pub fn queue_error(&self, status: u16, message: &str) {
        self.queue(MockResponse::error(status, message));
    }

    /// Sets the response used when the queue is empty.
    pub fn set_default(&self, response: MockResponse) {
        *lock(&self.default_response) = Some(response);
    }

    /// Gets all recorded requests.
    pub fn requests(&self) -> Vec<RecordedRequest> {
        lock(&self.requests).clone()
    }

    /// Gets the last recorded request.
    pub fn last_request(&self) -> Option<RecordedRequest> {
        lock(&self.requests).last().cloned()
    }

    /// Returns the number of requests made.
    pub fn request_count(&self) -> usize {
        lock(&self.requests).len()
    }

    fn next_response(&self) -> MockResponse {
        lock(&self.responses).pop_front().unwrap_or_else(|| {
            lock(&self.default_response)
                .clone()
                .unwrap_or_else(|| MockResponse::error(500, "No mock response configured"))
        })
    }

    fn record(&self, request: RecordedRequest) {
        lock(&self.requests).push(request);
    }
}

#[async_trait]
impl HttpTransport for MockTransport {
    async fn send(&self, request: HttpRequest) -> Result<HttpResponse, TransportError> {
        self.record(RecordedRequest {
            method: request.method,
            path: request.path,
            body: request.body,
            headers: request.headers,
            files: Vec::new(),
            streaming: false,
        });

        let response = self.next_response();
        response.check_failure()?;
        Ok(HttpResponse {
            status: response.status,
            body: response.body(),
            headers: response.headers,
        })
    }

    async fn send_streaming(
        &self,
        request: HttpRequest,
    ) -> Result<StreamingResponse, TransportError> {
        self.record(RecordedRequest {
            method: request.method,
            path: request.path,
            body: request.body,
            headers: request.headers,
            files: Vec::new(),
            streaming: true,
        });

        let response = self.next_response();
        response.check_failure()?;
        Ok(StreamingResponse {
            status: response.status,
            headers: response.headers.clone(),
            stream: response.into_byte_stream(),
        })
    }

    async fn send_multipart(
        &self,
        request: MultipartRequest,
    ) -> Result<HttpResponse, TransportError> {
        let mut fields = serde_json::Map::new();
        let mut files = Vec::new();
        for part in request.parts {
            match part {
                MultipartPart::Text { name, value } => {
                    fields.insert(name, serde_json::Value::String(value));
                }
                MultipartPart::File { filename, .. } => files.push(filename),
            }
        }

        self.record(RecordedRequest {
            method: HttpMethod::Post,
            path: request.path,
            body: serde_json::to_vec(&fields).ok(),
            headers: request.headers,
            files,
            streaming: false,
        });

        let response = self.next_response();
        response.check_failure()?;
        Ok(HttpResponse {
            status: response.status,
            body: response.body(),
            headers: response.headers,
        })
    }
}

impl std::fmt::Debug for MockTransport {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MockTransport")
            .field("request_count", &self.request_count())
            .finish()
    }
}

/// Mock auth provider for testing.
#[derive(Debug)]
pub struct MockAuth {
    api_key: String,
}

impl MockAuth {
    /// Creates a new mock auth provider.
    pub fn new(api_key: impl Into<String>) -> Self {
        Self {
            api_key: api_key.into(),
        }
    }
}

impl Default for MockAuth {
    fn default() -> Self {
        Self::new("MOCKKEY-0000000-0000000-0000000")
    }
}

impl AuthProvider for MockAuth {
    fn apply_auth(&self, headers: &mut HashMap<String, String>) {
        headers.insert(
            "Authorization".to_string(),
            format!("Bearer {}", self.api_key),
        );
    }

    fn scheme(&self) -> &str {
        "Bearer"
    }

    fn validate(&self) -> Result<(), AnythingLlmError> {
        Ok(())
    }
}

/// Test fixtures for common response shapes.
pub mod fixtures {
    use crate::transport::{DATA_PREFIX, DONE_SENTINEL};
    use crate::types::chat::ChatResponse;
    use crate::types::common::Source;
    use crate::types::workspace::{Workspace, WorkspaceList};

    /// Builds one `data:`-prefixed frame carrying `text`.
    pub fn frame(text: &str, close: bool) -> String {
        format!(
            "{} {}\n",
            DATA_PREFIX,
            serde_json::json!({
                "uuid": "00000000-0000-7000-8000-000000000000",
                "type": "textResponseChunk",
                "textResponse": text,
                "close": close,
                "error": false,
            })
        )
    }

    /// Builds a complete stream body: one frame per delta, then the end sentinel.
    pub fn stream_body(deltas: &[&str]) -> String {
        let mut body: String = deltas.iter().map(|d| frame(d, false)).collect();
        body.push_str(&format!("{} {}\n", DATA_PREFIX, DONE_SENTINEL));
        body
    }

    /// Creates a non-streaming chat response.
    pub fn chat_response(text: &str) -> ChatResponse {
        ChatResponse {
            id: Some("00000000-0000-7000-8000-000000000001".to_string()),
            response_type: Some("textResponse".to_string()),
            text_response: Some(text.to_string()),
            sources: vec![Source {
                title: Some("Tarifuebersicht.pdf".to_string()),
                text: Some("Haftpflicht Basis".to_string()),
                score: None,
            }],
            close: true,
            error: None,
        }
    }

    /// Creates a workspace.
    pub fn workspace(id: u64, slug: &str) -> Workspace {
        Workspace {
            id,
            name: slug.to_uppercase(),
            slug: slug.to_string(),
            prompt: None,
            documents: Vec::new(),
        }
    }

    /// Creates a workspace list response body.
    pub fn workspace_list() -> serde_json::Value {
        let list = WorkspaceList {
            workspaces: vec![workspace(1, "finbox"), workspace(2, "claims")],
        };
        serde_json::json!({ "workspaces": list.workspaces })
    }
}
