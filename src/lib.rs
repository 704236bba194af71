//! AnythingLLM Client Library
//!
//! Streaming chat client for the FinBox advisor assistant, backed by a
//! locally hosted AnythingLLM retrieval-augmented generation backend.
//!
//! # Features
//!
//! - **Streaming Chat**: Incremental deltas over `data:`-framed streams with
//!   cancellation and exactly one terminal callback per request
//! - **Connection Probing**: Classifies the backend as online, offline or
//!   unconfigured without side effects
//! - **Layered Configuration**: Environment defaults with persisted user
//!   overrides
//! - **Chat Panel**: Message history and streaming state for one
//!   conversation
//! - **Workspaces and Documents**: Listing, upload and embedding updates
//! - **Observability**: Tracing, metrics and redacted structured logging
//!
//! # Quick Start
//!
//! ```rust,no_run
//! use anythingllm_client::{AnythingLlmClient, StreamCallbacks};
//! use tokio_util::sync::CancellationToken;
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let client = AnythingLlmClient::from_env()?;
//!
//!     let status = client.prober().probe().await;
//!     println!("backend is {}", status.state);
//!
//!     let mut handler = StreamCallbacks::new(
//!         |delta: &str| print!("{delta}"),
//!         || println!(),
//!         |message: &str| eprintln!("{message}"),
//!     );
//!     client
//!         .chat()
//!         .stream_chat("What does the PMT column mean?", "/loans", &CancellationToken::new(), &mut handler)
//!         .await;
//!     Ok(())
//! }
//! ```
//!
//! # Chat Panel Example
//!
//! ```rust,no_run
//! use anythingllm_client::AnythingLlmClient;
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let client = AnythingLlmClient::builder()
//!         .api_key("ABC1234-DEF5678-GHI9012-JKL3456")
//!         .build()?;
//!
//!     let panel = client.panel();
//!     panel.send("Summarise this client's policies", "/clients/42").await;
//!
//!     for message in panel.messages() {
//!         println!("{:?}: {}", message.role, message.content);
//!     }
//!     Ok(())
//! }
//! ```

#![warn(missing_docs)]
#![forbid(unsafe_code)]

pub mod auth;
pub mod client;
pub mod config;
pub mod errors;
pub mod observability;
pub mod panel;
pub mod prompt;
pub mod resilience;
pub mod services;
pub mod transport;
pub mod types;

// Re-exports for convenience
pub use client::{AnythingLlmClient, AnythingLlmClientBuilder};
pub use config::{
    ChatConfig, ChatConfigBuilder, ConfigField, ConfigResolver, ConfigSource, JsonFileStore,
    MemoryStore, OverrideStore, ResponseStyle,
};
pub use errors::{AnythingLlmError, AnythingLlmResult};
pub use panel::{ChatMessage, ChatPanel, MessageStatus, Role, SendOutcome};
pub use services::{
    ChatService, ConnectionProber, ConnectionState, ConnectionStatus, StreamCallbacks,
    StreamHandler, StreamOutcome,
};

// Type re-exports
pub use types::chat::{ChatMode, ChatRequest, ChatResponse};
pub use types::common::Source;
pub use types::document::{DocumentUpload, DocumentUploadResponse, StoredDocument};
pub use types::workspace::{UpdateEmbeddingsRequest, Workspace, WorkspaceList};

/// Mock implementations for testing.
#[cfg(any(test, feature = "mocks"))]
pub mod mocks;
