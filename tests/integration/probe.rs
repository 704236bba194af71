//! Integration tests for connection probing

use super::*;
use anythingllm_client::ConnectionState;
use test_case::test_case;
use wiremock::matchers::{method, path};

#[tokio::test]
async fn test_probe_online() {
    let mock_server = setup_mock_server().await;

    mock_with_auth("/api/v1/auth", "GET")
        .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
            "authenticated": true
        })))
        .expect(1)
        .mount(&mock_server)
        .await;

    let status = client_for(&mock_server.uri(), TEST_KEY).prober().probe().await;

    assert!(status.ok);
    assert_eq!(status.state, ConnectionState::Online);
}

#[test_case(401, ConnectionState::Unconfigured ; "rejected key")]
#[test_case(403, ConnectionState::Unconfigured ; "forbidden")]
#[test_case(500, ConnectionState::Offline ; "server failure")]
#[tokio::test]
async fn test_probe_classifies_status(status: u16, expected: ConnectionState) {
    let mock_server = setup_mock_server().await;

    Mock::given(method("GET"))
        .and(path("/api/v1/auth"))
        .respond_with(ResponseTemplate::new(status))
        .mount(&mock_server)
        .await;

    let result = client_for(&mock_server.uri(), TEST_KEY).prober().probe().await;

    assert!(!result.ok);
    assert_eq!(result.state, expected);
}

#[tokio::test]
async fn test_probe_without_key_makes_no_request() {
    let mock_server = setup_mock_server().await;

    let status = client_for(&mock_server.uri(), "").prober().probe().await;

    assert_eq!(status.state, ConnectionState::Unconfigured);
    assert_eq!(status.message, "no key");
    let requests = mock_server.received_requests().await.expect("recording enabled");
    assert!(requests.is_empty());
}

#[tokio::test]
async fn test_probe_times_out_as_offline() {
    let mock_server = setup_mock_server().await;

    Mock::given(method("GET"))
        .and(path("/api/v1/auth"))
        .respond_with(ResponseTemplate::new(200).set_delay(Duration::from_secs(10)))
        .mount(&mock_server)
        .await;

    let client = AnythingLlmClient::builder()
        .api_key(TEST_KEY)
        .base_url(mock_server.uri())
        .probe_timeout(Duration::from_millis(200))
        .build()
        .expect("client should build");

    let status = client.prober().probe().await;

    assert_eq!(status.state, ConnectionState::Offline);
}

#[tokio::test]
async fn test_probe_unreachable_is_offline() {
    let status = client_for("http://127.0.0.1:9", TEST_KEY).prober().probe().await;

    assert_eq!(status.state, ConnectionState::Offline);
    assert!(status.message.contains("http://127.0.0.1:9"));
}

#[tokio::test]
async fn test_availability_accepts_any_status() {
    let mock_server = setup_mock_server().await;

    Mock::given(method("GET"))
        .and(path("/api/v1/auth"))
        .respond_with(ResponseTemplate::new(403))
        .mount(&mock_server)
        .await;

    let status = client_for(&mock_server.uri(), "").prober().check_availability().await;

    assert!(status.ok);
    assert_eq!(status.state, ConnectionState::Online);
}
