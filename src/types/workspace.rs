//! Workspace types.

use serde::{Deserialize, Serialize};

/// A workspace: a named document collection on the backend.
#[derive(Debug, Clone, Deserialize, Serialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct Workspace {
    /// Numeric identifier.
    pub id: u64,

    /// Display name.
    pub name: String,

    /// URL slug used in API paths.
    pub slug: String,

    /// Workspace-level system prompt, if set.
    #[serde(default, rename = "openAiPrompt")]
    pub prompt: Option<String>,

    /// Documents embedded in the workspace (detail endpoint only).
    #[serde(default)]
    pub documents: Vec<WorkspaceDocument>,
}

/// A document embedded in a workspace.
#[derive(Debug, Clone, Deserialize, Serialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct WorkspaceDocument {
    /// File name.
    #[serde(default)]
    pub filename: String,

    /// Storage path used for embedding updates.
    #[serde(default)]
    pub docpath: String,
}

/// Response of `GET /api/v1/workspaces`.
#[derive(Debug, Clone, Deserialize)]
pub struct WorkspaceList {
    /// All workspaces.
    #[serde(default)]
    pub workspaces: Vec<Workspace>,
}

impl WorkspaceList {
    /// Returns the number of workspaces.
    pub fn len(&self) -> usize {
        self.workspaces.len()
    }

    /// Returns true if empty.
    pub fn is_empty(&self) -> bool {
        self.workspaces.is_empty()
    }

    /// Gets a workspace by slug.
    pub fn get(&self, slug: &str) -> Option<&Workspace> {
        self.workspaces.iter().find(|w| w.slug == slug)
    }
}

/// Response of `GET /api/v1/workspace/{slug}`.
///
/// The backend returns the workspace wrapped in a one-element array.
#[derive(Debug, Clone, Deserialize)]
pub struct WorkspaceDetail {
    /// Matching workspaces (zero or one).
    #[serde(default)]
    pub workspace: Vec<Workspace>,
}

impl WorkspaceDetail {
    /// Returns the workspace, if the slug matched.
    pub fn into_workspace(self) -> Option<Workspace> {
        self.workspace.into_iter().next()
    }
}

/// Body of `POST /api/v1/workspace/{slug}/update-embeddings`.
#[derive(Debug, Clone, Default, Serialize, PartialEq)]
pub struct UpdateEmbeddingsRequest {
    /// Document locations to embed.
    pub adds: Vec<String>,
    /// Document locations to remove.
    pub deletes: Vec<String>,
}

impl UpdateEmbeddingsRequest {
    /// Adds a document location.
    pub fn add(mut self, location: impl Into<String>) -> Self {
        self.adds.push(location.into());
        self
    }

    /// Removes a document location.
    pub fn delete(mut self, location: impl Into<String>) -> Self {
        self.deletes.push(location.into());
        self
    }

    /// Returns true if nothing would change.
    pub fn is_empty(&self) -> bool {
        self.adds.is_empty() && self.deletes.is_empty()
    }
}

/// Response of the update-embeddings endpoint.
#[derive(Debug, Clone, Deserialize)]
pub struct UpdateEmbeddingsResponse {
    /// The updated workspace.
    pub workspace: Workspace,
}
