//! Chat service.
//!
//! [`ChatService::stream_chat`] is the callback surface used by the chat
//! panel: it reports every text delta in order and then exactly one of
//! `on_done` or `on_error`. [`ChatService::create_stream`] exposes the same
//! deltas as a `futures::Stream` for callers that prefer to pull.

use futures::StreamExt;
use std::sync::Arc;
use tokio_util::sync::CancellationToken;
use tracing::instrument;

use super::{parse_json, workspace_path};
use crate::auth::AuthProvider;
use crate::config::ChatConfig;
use crate::errors::AnythingLlmResult;
use crate::observability::{Observability, RequestTimer};
use crate::prompt;
use crate::transport::{DeltaStream, HttpRequest, HttpTransport};
use crate::types::chat::{ChatRequest, ChatResponse};

/// Receives the events of one streamed chat.
pub trait StreamHandler: Send {
    /// A text delta, in byte-stream order.
    fn on_delta(&mut self, text: &str);

    /// The stream finished normally or was cancelled.
    fn on_done(&mut self);

    /// The stream failed; `message` is ready to show to the user.
    fn on_error(&mut self, message: &str);
}

/// [`StreamHandler`] built from three closures.
pub struct StreamCallbacks<D, F, E> {
    on_delta: D,
    on_done: F,
    on_error: E,
}

impl<D, F, E> StreamCallbacks<D, F, E>
where
    D: FnMut(&str) + Send,
    F: FnMut() + Send,
    E: FnMut(&str) + Send,
{
    /// Creates a handler from delta, done and error callbacks.
    pub fn new(on_delta: D, on_done: F, on_error: E) -> Self {
        Self {
            on_delta,
            on_done,
            on_error,
        }
    }
}

impl<D, F, E> StreamHandler for StreamCallbacks<D, F, E>
where
    D: FnMut(&str) + Send,
    F: FnMut() + Send,
    E: FnMut(&str) + Send,
{
    fn on_delta(&mut self, text: &str) {
        (self.on_delta)(text);
    }

    fn on_done(&mut self) {
        (self.on_done)();
    }

    fn on_error(&mut self, message: &str) {
        (self.on_error)(message);
    }
}

/// How a streamed chat ended.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StreamOutcome {
    /// The backend closed the stream; `on_done` was called.
    Completed {
        /// Deltas delivered.
        deltas: usize,
    },
    /// The caller cancelled; `on_done` was called.
    Cancelled {
        /// Deltas delivered before cancellation.
        deltas: usize,
    },
    /// The chat failed; `on_error` was called with `message`.
    Failed {
        /// User-facing error message.
        message: String,
    },
}

impl StreamOutcome {
    /// Returns true if `on_error` was called.
    pub fn is_failed(&self) -> bool {
        matches!(self, StreamOutcome::Failed { .. })
    }
}

enum StreamEnd {
    Completed,
    Cancelled,
}

/// Chat service for one workspace.
#[derive(Clone)]
pub struct ChatService {
    transport: Arc<dyn HttpTransport>,
    auth: Arc<dyn AuthProvider>,
    config: Arc<ChatConfig>,
    observability: Observability,
    session_id: Option<String>,
}

impl ChatService {
    /// Creates a new chat service.
    pub fn new(
        transport: Arc<dyn HttpTransport>,
        auth: Arc<dyn AuthProvider>,
        config: Arc<ChatConfig>,
        observability: Observability,
    ) -> Self {
        Self {
            transport,
            auth,
            config,
            observability,
            session_id: None,
        }
    }

    /// Returns a copy of this service that tags requests with `session_id`,
    /// so the backend keeps one conversation history per session.
    pub fn with_session(&self, session_id: impl Into<String>) -> Self {
        Self {
            session_id: Some(session_id.into()),
            ..self.clone()
        }
    }

    /// Returns the effective configuration.
    pub fn config(&self) -> &ChatConfig {
        &self.config
    }

    /// Streams an answer to `message`, asked from the screen at `path`.
    ///
    /// Deltas go to `handler.on_delta` in order. Afterwards exactly one of
    /// `on_done` (completion or cancellation) or `on_error` is called. A
    /// missing API key fails before any network call. Triggering `cancel`
    /// stops the read loop at the next suspension point.
    #[instrument(
        skip(self, message, cancel, handler),
        fields(workspace = %self.config.workspace, context = prompt::context_label(path))
    )]
    pub async fn stream_chat<H>(
        &self,
        message: &str,
        path: &str,
        cancel: &CancellationToken,
        handler: &mut H,
    ) -> StreamOutcome
    where
        H: StreamHandler + ?Sized,
    {
        let timer = RequestTimer::start("stream_chat");
        let mut delivered = 0;

        let result = self
            .drive(message, path, cancel, handler, &mut delivered)
            .await;
        self.observability.record_deltas(delivered as u64);

        match result {
            Ok(StreamEnd::Completed) => {
                tracing::debug!(deltas = delivered, "Stream completed");
                self.observability.record_success(&timer);
                handler.on_done();
                StreamOutcome::Completed { deltas: delivered }
            }
            Ok(StreamEnd::Cancelled) => {
                tracing::debug!(deltas = delivered, "Stream cancelled");
                self.observability.record_cancellation(&timer);
                handler.on_done();
                StreamOutcome::Cancelled { deltas: delivered }
            }
            Err(err) => {
                tracing::warn!(error = %err, deltas = delivered, "Stream failed");
                self.observability.record_failure(&timer, &err);
                let message = err.user_message(&self.config.base_url);
                handler.on_error(&message);
                StreamOutcome::Failed { message }
            }
        }
    }

    async fn drive<H>(
        &self,
        message: &str,
        path: &str,
        cancel: &CancellationToken,
        handler: &mut H,
        delivered: &mut usize,
    ) -> AnythingLlmResult<StreamEnd>
    where
        H: StreamHandler + ?Sized,
    {
        self.config.ensure_configured()?;
        if cancel.is_cancelled() {
            return Ok(StreamEnd::Cancelled);
        }

        let mut stream = tokio::select! {
            biased;
            _ = cancel.cancelled() => return Ok(StreamEnd::Cancelled),
            stream = self.create_stream(message, path) => stream?,
        };

        let end = loop {
            let next = tokio::select! {
                biased;
                _ = cancel.cancelled() => break StreamEnd::Cancelled,
                next = stream.next() => next,
            };

            match next {
                Some(Ok(delta)) => {
                    *delivered += 1;
                    handler.on_delta(&delta);
                }
                Some(Err(err)) => {
                    self.observability
                        .record_skipped_frames(stream.skipped_frames() as u64);
                    return Err(err);
                }
                None => break StreamEnd::Completed,
            }
        };

        self.observability
            .record_skipped_frames(stream.skipped_frames() as u64);
        Ok(end)
    }

    /// Opens a stream-chat request and returns its deltas as a stream.
    ///
    /// Non-2xx statuses fail here; the body is only read as the stream is
    /// polled. Dropping the stream releases the connection.
    #[instrument(skip(self, message), fields(workspace = %self.config.workspace))]
    pub async fn create_stream(&self, message: &str, path: &str) -> AnythingLlmResult<DeltaStream> {
        self.config.ensure_configured()?;
        self.auth.validate()?;

        let request = self
            .build_request("stream-chat", message, path)?
            .with_header("Accept", "text/event-stream");

        let response = self.transport.send_streaming(request).await?;
        tracing::debug!(status = response.status, "Stream opened");

        DeltaStream::new(response)
    }

    /// Sends `message` and waits for the complete answer.
    #[instrument(skip(self, message), fields(workspace = %self.config.workspace))]
    pub async fn chat(&self, message: &str, path: &str) -> AnythingLlmResult<ChatResponse> {
        let timer = RequestTimer::start("chat");

        let result = self.send_chat(message, path).await;
        match &result {
            Ok(_) => self.observability.record_success(&timer),
            Err(err) => self.observability.record_failure(&timer, err),
        }
        result
    }

    async fn send_chat(&self, message: &str, path: &str) -> AnythingLlmResult<ChatResponse> {
        self.config.ensure_configured()?;
        self.auth.validate()?;

        let request = self
            .build_request("chat", message, path)?
            .with_timeout(self.config.timeout);
        let response = self.transport.send(request).await?;
        let chat: ChatResponse = parse_json(&response)?;

        if let Some(error) = chat.error_message() {
            tracing::warn!(error, "Backend reported an error in the chat response");
        }
        Ok(chat)
    }

    fn build_request(&self, action: &str, message: &str, path: &str) -> AnythingLlmResult<HttpRequest> {
        ChatRequest::new(message).validate()?;

        let mut body = ChatRequest::new(prompt::compose_message(&self.config, path, message));
        if let Some(session_id) = &self.session_id {
            body = body.with_session(session_id.clone());
        }

        let mut request =
            HttpRequest::post(workspace_path(&self.config.workspace, Some(action))).with_json(&body)?;
        self.auth.apply_auth(&mut request.headers);
        Ok(request)
    }
}

impl std::fmt::Debug for ChatService {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ChatService")
            .field("workspace", &self.config.workspace)
            .field("session_id", &self.session_id)
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::auth::ApiKeyAuth;
    use crate::mocks::{fixtures, MockResponse, MockTransport};
    use pretty_assertions::assert_eq;
    use std::time::Duration;

    const BASE_URL: &str = "http://localhost:3001";

    #[derive(Default)]
    struct Recorder {
        deltas: Vec<String>,
        done: usize,
        errors: Vec<String>,
        cancel_after: Option<(usize, CancellationToken)>,
    }

    impl StreamHandler for Recorder {
        fn on_delta(&mut self, text: &str) {
            self.deltas.push(text.to_string());
            if let Some((after, token)) = &self.cancel_after {
                if self.deltas.len() == *after {
                    token.cancel();
                }
            }
        }

        fn on_done(&mut self) {
            self.done += 1;
        }

        fn on_error(&mut self, message: &str) {
            self.errors.push(message.to_string());
        }
    }

    fn config(api_key: &str) -> ChatConfig {
        ChatConfig::builder()
            .api_key(api_key)
            .workspace("finbox")
            .base_url(BASE_URL)
            .build()
            .unwrap()
    }

    fn service_with(transport: &Arc<MockTransport>, api_key: &str) -> ChatService {
        let config = config(api_key);
        ChatService::new(
            Arc::clone(transport) as Arc<dyn HttpTransport>,
            Arc::new(ApiKeyAuth::from_string(api_key)),
            Arc::new(config),
            Observability::silent(),
        )
    }

    async fn run(service: &ChatService, recorder: &mut Recorder, cancel: &CancellationToken) -> StreamOutcome {
        service.stream_chat("hello", "/dashboard", cancel, recorder).await
    }

    #[tokio::test]
    async fn test_scenario_two_frames_then_done() {
        let transport = Arc::new(MockTransport::new());
        transport.queue(MockResponse::stream([
            "data: {\"textResponse\":\"Hi\"}\n",
            "data: {\"textResponse\":\" there\",\"close\":false}\n",
            "data: [DONE]\n",
        ]));
        let service = service_with(&transport, "k");
        let mut recorder = Recorder::default();

        let outcome = run(&service, &mut recorder, &CancellationToken::new()).await;

        assert_eq!(recorder.deltas, vec!["Hi", " there"]);
        assert_eq!(recorder.done, 1);
        assert!(recorder.errors.is_empty());
        assert_eq!(outcome, StreamOutcome::Completed { deltas: 2 });
    }

    #[tokio::test]
    async fn test_request_shape() {
        let transport = Arc::new(MockTransport::new());
        transport.queue(MockResponse::stream([fixtures::stream_body(&["ok"])]));
        let service = service_with(&transport, "ABCDEFG-1234567").with_session("s-42");

        run(&service, &mut Recorder::default(), &CancellationToken::new()).await;

        let request = transport.last_request().unwrap();
        assert_eq!(request.path, "api/v1/workspace/finbox/stream-chat");
        assert!(request.streaming);
        assert_eq!(request.header("authorization"), Some("Bearer ABCDEFG-1234567"));

        let body = request.json().unwrap();
        assert_eq!(body["mode"], "chat");
        assert_eq!(body["sessionId"], "s-42");
        let message = body["message"].as_str().unwrap();
        assert!(message.contains("Dashboard"));
        assert!(message.ends_with("Question: hello"));
    }

    #[tokio::test]
    async fn test_missing_key_fails_without_network() {
        let transport = Arc::new(MockTransport::new());
        let service = service_with(&transport, "");
        let mut recorder = Recorder::default();

        let outcome = run(&service, &mut recorder, &CancellationToken::new()).await;

        assert_eq!(transport.request_count(), 0);
        assert_eq!(recorder.errors.len(), 1);
        assert!(recorder.errors[0].contains("not configured"));
        assert_eq!(recorder.done, 0);
        assert!(outcome.is_failed());
    }

    #[tokio::test]
    async fn test_blank_message_is_rejected() {
        let transport = Arc::new(MockTransport::new());
        let service = service_with(&transport, "k");
        let mut recorder = Recorder::default();

        service
            .stream_chat("   ", "/", &CancellationToken::new(), &mut recorder)
            .await;

        assert_eq!(transport.request_count(), 0);
        assert_eq!(recorder.errors, vec!["Message cannot be empty"]);
    }

    #[tokio::test]
    async fn test_deltas_survive_any_chunking() {
        let deltas = ["Gr", "üß", "e aus ", "Köln", "!"];
        let body = fixtures::stream_body(&deltas);

        for size in [1, 2, 3, 7, 16, body.len()] {
            let transport = Arc::new(MockTransport::new());
            transport.queue(MockResponse::stream_split(&body, size));
            let service = service_with(&transport, "k");
            let mut recorder = Recorder::default();

            run(&service, &mut recorder, &CancellationToken::new()).await;

            assert_eq!(recorder.deltas.concat(), deltas.concat(), "chunk size {size}");
            assert_eq!(recorder.done, 1);
        }
    }

    #[tokio::test]
    async fn test_close_frame_stops_delivery() {
        let body = format!(
            "{}{}{}",
            fixtures::frame("one", false),
            fixtures::frame("two", true),
            fixtures::frame("three", false)
        );
        let transport = Arc::new(MockTransport::new());
        transport.queue(MockResponse::stream([body]));
        let service = service_with(&transport, "k");
        let mut recorder = Recorder::default();

        run(&service, &mut recorder, &CancellationToken::new()).await;

        assert_eq!(recorder.deltas, vec!["one", "two"]);
        assert_eq!(recorder.done, 1);
    }

    #[tokio::test]
    async fn test_cancel_after_n_deltas() {
        let transport = Arc::new(MockTransport::new());
        transport.queue(MockResponse::stream([fixtures::stream_body(&["a", "b", "c", "d"])]));
        let service = service_with(&transport, "k");
        let cancel = CancellationToken::new();
        let mut recorder = Recorder {
            cancel_after: Some((2, cancel.clone())),
            ..Recorder::default()
        };

        let outcome = run(&service, &mut recorder, &cancel).await;

        assert_eq!(recorder.deltas, vec!["a", "b"]);
        assert_eq!(recorder.done, 1);
        assert!(recorder.errors.is_empty());
        assert_eq!(outcome, StreamOutcome::Cancelled { deltas: 2 });
    }

    #[tokio::test]
    async fn test_cancel_while_waiting_for_body() {
        let transport = Arc::new(MockTransport::new());
        transport.queue(MockResponse::stream([fixtures::frame("first", false)]).then_pending());
        let service = service_with(&transport, "k");
        let cancel = CancellationToken::new();

        let trigger = cancel.clone();
        tokio::spawn(async move {
            tokio::time::sleep(Duration::from_millis(20)).await;
            trigger.cancel();
        });

        let mut recorder = Recorder::default();
        let outcome = tokio::time::timeout(Duration::from_secs(5), run(&service, &mut recorder, &cancel))
            .await
            .unwrap();

        assert_eq!(recorder.deltas, vec!["first"]);
        assert_eq!(recorder.done, 1);
        assert_eq!(outcome, StreamOutcome::Cancelled { deltas: 1 });
    }

    #[tokio::test]
    async fn test_cancelled_before_start_sends_nothing() {
        let transport = Arc::new(MockTransport::new());
        let service = service_with(&transport, "k");
        let cancel = CancellationToken::new();
        cancel.cancel();
        let mut recorder = Recorder::default();

        let outcome = run(&service, &mut recorder, &cancel).await;

        assert_eq!(transport.request_count(), 0);
        assert_eq!(recorder.done, 1);
        assert_eq!(outcome, StreamOutcome::Cancelled { deltas: 0 });
    }

    #[tokio::test]
    async fn test_status_errors() {
        let transport = Arc::new(MockTransport::new());
        transport.queue_error(401, "No valid api key found.");
        transport.queue_error(500, "boom");
        let service = service_with(&transport, "k");

        let mut unauthorized = Recorder::default();
        run(&service, &mut unauthorized, &CancellationToken::new()).await;
        assert!(unauthorized.errors[0].contains("Invalid API key"));

        let mut server = Recorder::default();
        run(&service, &mut server, &CancellationToken::new()).await;
        assert!(server.errors[0].contains("500"));
        assert_eq!(server.done, 0);
    }

    #[tokio::test]
    async fn test_unknown_workspace_reports_status() {
        let transport = Arc::new(MockTransport::new());
        transport.queue_error(404, "Not Found");
        let service = service_with(&transport, "k");
        let mut recorder = Recorder::default();

        let outcome = run(&service, &mut recorder, &CancellationToken::new()).await;

        assert!(outcome.is_failed());
        assert_eq!(recorder.errors.len(), 1);
        assert!(recorder.errors[0].contains("HTTP 404"), "{}", recorder.errors[0]);
        assert_eq!(recorder.done, 0);
    }

    #[tokio::test]
    async fn test_unreachable_names_base_url() {
        let transport = Arc::new(MockTransport::new());
        transport.queue(MockResponse::connection_error("connection refused"));
        let service = service_with(&transport, "k");
        let mut recorder = Recorder::default();

        run(&service, &mut recorder, &CancellationToken::new()).await;

        assert_eq!(recorder.errors.len(), 1);
        assert!(recorder.errors[0].contains(BASE_URL));
    }

    #[tokio::test]
    async fn test_empty_body_reports_no_stream() {
        let transport = Arc::new(MockTransport::new());
        transport.queue(MockResponse::empty(200));
        let service = service_with(&transport, "k");
        let mut recorder = Recorder::default();

        run(&service, &mut recorder, &CancellationToken::new()).await;

        assert_eq!(recorder.errors, vec!["AnythingLLM returned no response stream."]);
        assert_eq!(recorder.done, 0);
    }

    #[tokio::test]
    async fn test_broken_body_after_deltas() {
        let transport = Arc::new(MockTransport::new());
        transport.queue(MockResponse::stream([fixtures::frame("partial", false)]).then_error("reset by peer"));
        let service = service_with(&transport, "k");
        let mut recorder = Recorder::default();

        run(&service, &mut recorder, &CancellationToken::new()).await;

        assert_eq!(recorder.deltas, vec!["partial"]);
        assert_eq!(recorder.errors.len(), 1);
        assert_eq!(recorder.done, 0);
    }

    #[tokio::test]
    async fn test_closure_callbacks() {
        let transport = Arc::new(MockTransport::new());
        transport.queue(MockResponse::stream([fixtures::stream_body(&["x", "y"])]));
        let service = service_with(&transport, "k");

        let mut text = String::new();
        let mut finished = false;
        let mut handler = StreamCallbacks::new(
            |delta: &str| text.push_str(delta),
            || finished = true,
            |_: &str| {},
        );
        service
            .stream_chat("hi", "/", &CancellationToken::new(), &mut handler)
            .await;
        drop(handler);

        assert_eq!(text, "xy");
        assert!(finished);
    }

    #[tokio::test]
    async fn test_metrics_follow_outcomes() {
        let transport = Arc::new(MockTransport::new());
        transport.queue(MockResponse::stream([fixtures::stream_body(&["a", "b"])]));
        transport.queue_error(503, "busy");
        let service = service_with(&transport, "k");

        run(&service, &mut Recorder::default(), &CancellationToken::new()).await;
        run(&service, &mut Recorder::default(), &CancellationToken::new()).await;

        let metrics = service.observability.metrics().snapshot();
        assert_eq!(metrics.total_requests, 2);
        assert_eq!(metrics.deltas, 2);
        assert_eq!(metrics.errors.get("server"), Some(&1));
    }

    #[tokio::test]
    async fn test_create_stream_yields_deltas() {
        let transport = Arc::new(MockTransport::new());
        transport.queue(MockResponse::stream_split(&fixtures::stream_body(&["foo", "bar"]), 5));
        let service = service_with(&transport, "k");

        let stream = service.create_stream("hello", "/claims").await.unwrap();
        assert_eq!(stream.collect_text().await.unwrap(), "foobar");
    }

    #[tokio::test]
    async fn test_non_streaming_chat() {
        let transport = Arc::new(MockTransport::new());
        transport.queue_json(&fixtures::chat_response("Full answer"));
        let service = service_with(&transport, "k");

        let response = service.chat("hello", "/contracts").await.unwrap();

        assert_eq!(response.text(), "Full answer");
        assert_eq!(response.sources.len(), 1);
        let request = transport.last_request().unwrap();
        assert_eq!(request.path, "api/v1/workspace/finbox/chat");
        assert!(!request.streaming);
    }
}
