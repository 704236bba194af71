//! Type definitions for the AnythingLLM developer API.
//!
//! Covers chat requests and responses, workspaces, document uploads and
//! the auth check.

pub mod chat;
pub mod common;
pub mod document;
pub mod workspace;
