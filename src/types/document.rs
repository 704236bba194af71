//! Document upload types.

use serde::Deserialize;

use crate::errors::AnythingLlmError;

/// A file to upload into the backend's document store.
#[derive(Debug, Clone)]
pub struct DocumentUpload {
    /// File name, including extension.
    pub filename: String,
    /// Raw file contents.
    pub data: Vec<u8>,
}

impl DocumentUpload {
    /// Creates an upload from a file name and its bytes.
    pub fn new(filename: impl Into<String>, data: Vec<u8>) -> Self {
        Self {
            filename: filename.into(),
            data,
        }
    }

    /// Returns a MIME type based on the file extension.
    pub fn content_type(&self) -> mime::Mime {
        let extension = self
            .filename
            .rsplit_once('.')
            .map(|(_, ext)| ext.to_ascii_lowercase())
            .unwrap_or_default();

        match extension.as_str() {
            "pdf" => mime::APPLICATION_PDF,
            "txt" => mime::TEXT_PLAIN,
            "md" => "text/markdown".parse().unwrap_or(mime::TEXT_PLAIN),
            "csv" => mime::TEXT_CSV,
            "html" | "htm" => mime::TEXT_HTML,
            "json" => mime::APPLICATION_JSON,
            "docx" => "application/vnd.openxmlformats-officedocument.wordprocessingml.document"
                .parse()
                .unwrap_or(mime::APPLICATION_OCTET_STREAM),
            _ => mime::APPLICATION_OCTET_STREAM,
        }
    }

    /// Validates the upload.
    pub fn validate(&self) -> Result<(), AnythingLlmError> {
        if self.filename.trim().is_empty() {
            return Err(AnythingLlmError::validation_param(
                "File name is required",
                "filename",
            ));
        }
        if self.data.is_empty() {
            return Err(AnythingLlmError::validation_param(
                "File is empty",
                "data",
            ));
        }
        Ok(())
    }
}

/// A document stored by the backend after upload.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StoredDocument {
    /// Storage location, used when updating embeddings.
    pub location: String,

    /// Stored file name.
    #[serde(default)]
    pub name: Option<String>,

    /// Document title.
    #[serde(default)]
    pub title: Option<String>,

    /// Word count reported by the backend.
    #[serde(default)]
    pub word_count: Option<u64>,
}

/// Response of `POST /api/v1/document/upload`.
#[derive(Debug, Clone, Deserialize)]
pub struct DocumentUploadResponse {
    /// Whether the upload was processed.
    pub success: bool,

    /// Error message on failure.
    #[serde(default)]
    pub error: Option<String>,

    /// Stored documents.
    #[serde(default)]
    pub documents: Vec<StoredDocument>,
}

impl DocumentUploadResponse {
    /// Returns the storage locations of all stored documents.
    pub fn locations(&self) -> Vec<&str> {
        self.documents.iter().map(|d| d.location.as_str()).collect()
    }
}
