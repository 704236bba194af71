//! Integration tests for streamed chat

use super::*;
use anythingllm_client::{MessageStatus, SendOutcome, StreamOutcome};
use pretty_assertions::assert_eq;
use serde_json::Value;
use tokio_util::sync::CancellationToken;
use wiremock::matchers::{method, path};

const STREAM_PATH: &str = "/api/v1/workspace/finbox/stream-chat";

#[tokio::test]
async fn test_stream_chat_delivers_deltas_then_done() {
    let mock_server = setup_mock_server().await;

    mock_with_auth(STREAM_PATH, "POST")
        .respond_with(stream_response(
            "data: {\"textResponse\":\"Hi\"}\n\
             data: {\"textResponse\":\" there\",\"close\":false}\n\
             data: [DONE]\n",
        ))
        .expect(1)
        .mount(&mock_server)
        .await;

    let client = client_for(&mock_server.uri(), TEST_KEY);
    let mut recorder = Recorder::default();

    let outcome = client
        .chat()
        .stream_chat("hello", "/dashboard", &CancellationToken::new(), &mut recorder)
        .await;

    assert_eq!(outcome, StreamOutcome::Completed { deltas: 2 });
    assert_eq!(
        recorder.events,
        vec![
            Event::Delta("Hi".to_string()),
            Event::Delta(" there".to_string()),
            Event::Done,
        ]
    );
}

#[tokio::test]
async fn test_request_body_carries_question_and_mode() {
    let mock_server = setup_mock_server().await;

    mock_with_auth(STREAM_PATH, "POST")
        .respond_with(stream_response("data: [DONE]\n"))
        .mount(&mock_server)
        .await;

    let client = client_for(&mock_server.uri(), TEST_KEY);
    let mut recorder = Recorder::default();
    client
        .chat()
        .stream_chat("What is a deductible?", "/claims", &CancellationToken::new(), &mut recorder)
        .await;

    let requests = mock_server.received_requests().await.expect("recording enabled");
    assert_eq!(requests.len(), 1);
    let body: Value = serde_json::from_slice(&requests[0].body).expect("json body");
    assert_eq!(body["mode"], "chat");
    let message = body["message"].as_str().expect("message string");
    assert!(message.ends_with("Question: What is a deductible?"));
    assert!(message.contains("Claims handling"));
}

#[tokio::test]
async fn test_close_flag_ends_stream_early() {
    let mock_server = setup_mock_server().await;

    mock_with_auth(STREAM_PATH, "POST")
        .respond_with(stream_response(
            "data: {\"textResponse\":\"Done.\",\"close\":true}\n\
             data: {\"textResponse\":\"ignored\"}\n",
        ))
        .mount(&mock_server)
        .await;

    let client = client_for(&mock_server.uri(), TEST_KEY);
    let mut recorder = Recorder::default();
    client
        .chat()
        .stream_chat("hello", "/", &CancellationToken::new(), &mut recorder)
        .await;

    assert_eq!(recorder.deltas(), vec!["Done."]);
    assert_eq!(recorder.events.last(), Some(&Event::Done));
}

#[tokio::test]
async fn test_malformed_frames_are_skipped() {
    let mock_server = setup_mock_server().await;

    mock_with_auth(STREAM_PATH, "POST")
        .respond_with(stream_response(
            "\n\
             data: {\"textResponse\":\"A\"}\n\
             data: {not json\n\
             data: {\"textResponse\":\"B\"}",
        ))
        .mount(&mock_server)
        .await;

    let client = client_for(&mock_server.uri(), TEST_KEY);
    let mut recorder = Recorder::default();
    client
        .chat()
        .stream_chat("hello", "/", &CancellationToken::new(), &mut recorder)
        .await;

    assert_eq!(recorder.deltas(), vec!["A", "B"]);
    assert_eq!(recorder.terminal_count(), 1);
    assert!(recorder.errors().is_empty());
}

#[tokio::test]
async fn test_unauthorized_reports_single_error() {
    let mock_server = setup_mock_server().await;

    Mock::given(method("POST"))
        .and(path(STREAM_PATH))
        .respond_with(ResponseTemplate::new(401).set_body_json(serde_json::json!({
            "error": "No valid api key found."
        })))
        .mount(&mock_server)
        .await;

    let client = client_for(&mock_server.uri(), "WRONGKEY-0000000");
    let mut recorder = Recorder::default();
    let outcome = client
        .chat()
        .stream_chat("hello", "/", &CancellationToken::new(), &mut recorder)
        .await;

    assert!(outcome.is_failed());
    assert_eq!(recorder.terminal_count(), 1);
    assert!(recorder.errors()[0].contains("Invalid API key"));
}

#[tokio::test]
async fn test_server_error_reports_status() {
    let mock_server = setup_mock_server().await;

    mock_with_auth(STREAM_PATH, "POST")
        .respond_with(ResponseTemplate::new(500).set_body_string("boom"))
        .mount(&mock_server)
        .await;

    let client = client_for(&mock_server.uri(), TEST_KEY);
    let mut recorder = Recorder::default();
    client
        .chat()
        .stream_chat("hello", "/", &CancellationToken::new(), &mut recorder)
        .await;

    assert_eq!(recorder.events.len(), 1);
    assert!(recorder.errors()[0].contains("HTTP 500"));
}

#[tokio::test]
async fn test_unreachable_backend_names_base_url() {
    let client = client_for("http://127.0.0.1:9", TEST_KEY);
    let mut recorder = Recorder::default();

    client
        .chat()
        .stream_chat("hello", "/", &CancellationToken::new(), &mut recorder)
        .await;

    assert_eq!(recorder.events.len(), 1);
    assert!(recorder.errors()[0].contains("http://127.0.0.1:9"));
}

#[tokio::test]
async fn test_missing_key_sends_nothing() {
    let mock_server = setup_mock_server().await;
    let client = client_for(&mock_server.uri(), "");
    let mut recorder = Recorder::default();

    client
        .chat()
        .stream_chat("hello", "/", &CancellationToken::new(), &mut recorder)
        .await;

    assert_eq!(recorder.terminal_count(), 1);
    assert!(recorder.errors()[0].contains("not configured"));
    let requests = mock_server.received_requests().await.expect("recording enabled");
    assert!(requests.is_empty());
}

#[tokio::test]
async fn test_panel_round_trip() {
    let mock_server = setup_mock_server().await;

    mock_with_auth(STREAM_PATH, "POST")
        .respond_with(stream_response(
            "data: {\"textResponse\":\"Policy \"}\ndata: {\"textResponse\":\"renewed.\"}\ndata: [DONE]\n",
        ))
        .mount(&mock_server)
        .await;

    let client = client_for(&mock_server.uri(), TEST_KEY);
    let panel = client.panel();

    let outcome = panel.send("Status of policy 17?", "/contracts/17").await;

    assert_eq!(outcome, SendOutcome::Completed);
    let messages = panel.messages();
    assert_eq!(messages.len(), 2);
    assert_eq!(messages[1].content, "Policy renewed.");
    assert_eq!(messages[1].status, MessageStatus::Complete);
    assert!(!panel.is_streaming());

    let requests = mock_server.received_requests().await.expect("recording enabled");
    let body: Value = serde_json::from_slice(&requests[0].body).expect("json body");
    assert!(body["sessionId"].as_str().is_some_and(|id| !id.is_empty()));
}
