//! Document upload service.

use std::sync::Arc;
use tracing::instrument;

use super::parse_json;
use crate::auth::AuthProvider;
use crate::config::ChatConfig;
use crate::errors::AnythingLlmResult;
use crate::transport::{HttpTransport, MultipartPart, MultipartRequest};
use crate::types::document::{DocumentUpload, DocumentUploadResponse};

const UPLOAD_PATH: &str = "api/v1/document/upload";

/// Uploads files into the backend's document store.
pub struct DocumentsService {
    transport: Arc<dyn HttpTransport>,
    auth: Arc<dyn AuthProvider>,
    config: Arc<ChatConfig>,
}

impl DocumentsService {
    /// Creates a new documents service.
    pub fn new(
        transport: Arc<dyn HttpTransport>,
        auth: Arc<dyn AuthProvider>,
        config: Arc<ChatConfig>,
    ) -> Self {
        Self {
            transport,
            auth,
            config,
        }
    }

    /// Uploads a document.
    ///
    /// The document is stored but not embedded; pass the returned
    /// locations to `WorkspacesService::update_embeddings`.
    #[instrument(skip(self, upload), fields(filename = %upload.filename, size = upload.data.len()))]
    pub async fn upload(&self, upload: DocumentUpload) -> AnythingLlmResult<DocumentUploadResponse> {
        upload.validate()?;
        self.auth.validate()?;

        let content_type = upload.content_type().to_string();
        let mut request = MultipartRequest {
            path: UPLOAD_PATH.to_string(),
            headers: Default::default(),
            parts: vec![MultipartPart::File {
                name: "file".to_string(),
                filename: upload.filename,
                content_type,
                data: upload.data,
            }],
            timeout: Some(self.config.timeout),
        };
        self.auth.apply_auth(&mut request.headers);

        let response = self.transport.send_multipart(request).await?;
        let uploaded: DocumentUploadResponse = parse_json(&response)?;

        if !uploaded.success {
            tracing::warn!(error = ?uploaded.error, "Backend did not process the document");
        }
        Ok(uploaded)
    }
}

impl std::fmt::Debug for DocumentsService {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DocumentsService").finish_non_exhaustive()
    }
}
