//! Integration tests using WireMock
//!
//! These tests drive the client through the real reqwest transport against
//! a mock AnythingLLM server: request shape, authentication, streaming and
//! error classification.

mod chat;
mod probe;
mod workspaces;

use anythingllm_client::{AnythingLlmClient, StreamHandler};
use std::time::Duration;
use wiremock::matchers::{header, method, path};
use wiremock::{Mock, MockBuilder, MockServer, ResponseTemplate};

/// API key used by all mocks.
pub const TEST_KEY: &str = "TESTKEY-1234567-ABCDEFG-HIJKLMN";

/// Starts an empty mock server.
pub async fn setup_mock_server() -> MockServer {
    MockServer::start().await
}

/// Builds a client for the `finbox` workspace pointed at `base_url`.
pub fn client_for(base_url: &str, api_key: &str) -> AnythingLlmClient {
    AnythingLlmClient::builder()
        .api_key(api_key)
        .base_url(base_url)
        .workspace("finbox")
        .timeout(Duration::from_secs(5))
        .probe_timeout(Duration::from_secs(2))
        .build()
        .expect("client should build")
}

/// Matches an authenticated request.
pub fn mock_with_auth(path_matcher: &str, method_matcher: &str) -> MockBuilder {
    Mock::given(method(method_matcher))
        .and(path(path_matcher))
        .and(header("Authorization", format!("Bearer {}", TEST_KEY).as_str()))
}

/// A `text/event-stream` response carrying `body` verbatim.
pub fn stream_response(body: &str) -> ResponseTemplate {
    ResponseTemplate::new(200)
        .insert_header("content-type", "text/event-stream")
        .set_body_string(body)
}

/// One recorded handler event.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Event {
    Delta(String),
    Done,
    Error(String),
}

/// Handler that records every callback in order.
#[derive(Debug, Default)]
pub struct Recorder {
    pub events: Vec<Event>,
}

impl Recorder {
    pub fn deltas(&self) -> Vec<&str> {
        self.events
            .iter()
            .filter_map(|e| match e {
                Event::Delta(text) => Some(text.as_str()),
                _ => None,
            })
            .collect()
    }

    pub fn errors(&self) -> Vec<&str> {
        self.events
            .iter()
            .filter_map(|e| match e {
                Event::Error(message) => Some(message.as_str()),
                _ => None,
            })
            .collect()
    }

    pub fn terminal_count(&self) -> usize {
        self.events
            .iter()
            .filter(|e| !matches!(e, Event::Delta(_)))
            .count()
    }
}

impl StreamHandler for Recorder {
    fn on_delta(&mut self, text: &str) {
        self.events.push(Event::Delta(text.to_string()));
    }

    fn on_done(&mut self) {
        self.events.push(Event::Done);
    }

    fn on_error(&mut self, message: &str) {
        self.events.push(Event::Error(message.to_string()));
    }
}
