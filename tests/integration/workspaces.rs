//! Integration tests for workspace management

use super::*;
use anythingllm_client::AnythingLlmError;
use serde_json::json;

#[tokio::test]
async fn test_list_workspaces() {
    let mock_server = setup_mock_server().await;

    mock_with_auth("/api/v1/workspaces", "GET")
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "workspaces": [
                { "id": 1, "name": "FinBox", "slug": "finbox", "openAiPrompt": null, "documents": [] },
                { "id": 2, "name": "Claims", "slug": "claims" }
            ]
        })))
        .mount(&mock_server)
        .await;

    let list = client_for(&mock_server.uri(), TEST_KEY)
        .workspaces()
        .list()
        .await
        .expect("list should succeed");

    assert_eq!(list.len(), 2);
    assert_eq!(list.get("claims").map(|w| w.id), Some(2));
}

#[tokio::test]
async fn test_unknown_workspace_is_not_found() {
    let mock_server = setup_mock_server().await;

    mock_with_auth("/api/v1/workspace/missing", "GET")
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({ "workspace": [] })))
        .mount(&mock_server)
        .await;

    let result = client_for(&mock_server.uri(), TEST_KEY)
        .workspaces()
        .get("missing")
        .await;

    assert!(matches!(result, Err(AnythingLlmError::NotFound { .. })));
}
