//! Workspace management service.

use std::sync::Arc;
use tracing::instrument;

use super::{parse_json, workspace_path};
use crate::auth::AuthProvider;
use crate::errors::{AnythingLlmError, AnythingLlmResult};
use crate::resilience::RetryPolicy;
use crate::transport::{HttpRequest, HttpTransport};
use crate::types::workspace::{
    UpdateEmbeddingsRequest, UpdateEmbeddingsResponse, Workspace, WorkspaceDetail, WorkspaceList,
};

/// Lists workspaces and manages their embedded documents.
pub struct WorkspacesService {
    transport: Arc<dyn HttpTransport>,
    auth: Arc<dyn AuthProvider>,
    retry: RetryPolicy,
}

impl WorkspacesService {
    /// Creates a new workspaces service.
    pub fn new(
        transport: Arc<dyn HttpTransport>,
        auth: Arc<dyn AuthProvider>,
        retry: RetryPolicy,
    ) -> Self {
        Self {
            transport,
            auth,
            retry,
        }
    }

    /// Lists all workspaces.
    #[instrument(skip(self))]
    pub async fn list(&self) -> AnythingLlmResult<WorkspaceList> {
        self.auth.validate()?;
        let list: WorkspaceList = self.get_json("api/v1/workspaces").await?;
        tracing::debug!(count = list.len(), "Listed workspaces");
        Ok(list)
    }

    /// Gets a workspace by slug.
    #[instrument(skip(self))]
    pub async fn get(&self, slug: &str) -> AnythingLlmResult<Workspace> {
        validate_slug(slug)?;
        self.auth.validate()?;

        let detail: WorkspaceDetail = self.get_json(&workspace_path(slug, None)).await?;
        detail.into_workspace().ok_or_else(|| AnythingLlmError::NotFound {
            message: format!("workspace '{}'", slug),
            status_code: None,
        })
    }

    /// Adds and removes documents from a workspace's embeddings.
    #[instrument(skip(self, request), fields(adds = request.adds.len(), deletes = request.deletes.len()))]
    pub async fn update_embeddings(
        &self,
        slug: &str,
        request: &UpdateEmbeddingsRequest,
    ) -> AnythingLlmResult<Workspace> {
        validate_slug(slug)?;
        if request.is_empty() {
            return Err(AnythingLlmError::validation_param(
                "Nothing to add or delete",
                "adds",
            ));
        }
        self.auth.validate()?;

        let mut http_request =
            HttpRequest::post(workspace_path(slug, Some("update-embeddings"))).with_json(request)?;
        self.auth.apply_auth(&mut http_request.headers);

        // Not retried: embedding the same document twice duplicates vectors.
        let response = self.transport.send(http_request).await?;
        let updated: UpdateEmbeddingsResponse = parse_json(&response)?;
        Ok(updated.workspace)
    }

    async fn get_json<T: serde::de::DeserializeOwned>(&self, path: &str) -> AnythingLlmResult<T> {
        let mut request = HttpRequest::get(path);
        self.auth.apply_auth(&mut request.headers);

        self.retry
            .execute(|| {
                let transport = Arc::clone(&self.transport);
                let request = request.clone();
                async move {
                    let response = transport.send(request).await?;
                    parse_json(&response)
                }
            })
            .await
    }
}

fn validate_slug(slug: &str) -> AnythingLlmResult<()> {
    if slug.trim().is_empty() {
        return Err(AnythingLlmError::validation_param(
            "Workspace slug cannot be empty",
            "slug",
        ));
    }
    Ok(())
}

impl std::fmt::Debug for WorkspacesService {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("WorkspacesService")
            .field("retry", &self.retry)
            .finish_non_exhaustive()
    }
}
