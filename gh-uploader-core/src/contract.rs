#![allow(unused)]

//! # contract: data model and remote interface for uploads
//!
//! This module defines the plain data that flows through an upload run and the
//! single trait ([`RemoteRepository`]) the pipeline uses to talk to the hosted
//! repository.
//!
//! ## Interface & Extensibility
//! - Implement [`RemoteRepository`] to point the pipeline at a new backend
//!   (the GitHub contents API client lives in the `gh-uploader` crate).
//! - All methods are async and return [`UploadError`] on failure.
//! - A missing remote path is *not* an error: [`RemoteRepository::lookup`]
//!   returns `Ok(None)`.
//!
//! ## Mocking & Testing
//! - The trait is annotated for `mockall`, exported under the
//!   `test-export-mocks` feature so downstream crates can drive the pipeline
//!   against a `MockRemoteRepository`.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use mockall::{automock, predicate::*};

use crate::config::UploadTarget;

/// A single thing to upload: a whole selected file or one generated chunk.
///
/// Read-only once created.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LocalFileUnit {
    name: String,
    content: Vec<u8>,
    size: u64,
}

impl LocalFileUnit {
    pub fn new(name: impl Into<String>, content: Vec<u8>) -> Self {
        let size = content.len() as u64;
        Self {
            name: name.into(),
            content,
            size,
        }
    }

    /// Remote path segment this unit is written to.
    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn content(&self) -> &[u8] {
        &self.content
    }

    pub fn size(&self) -> u64 {
        self.size
    }
}

/// What the remote knows about an existing path.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RemoteFileRef {
    pub path: String,
    /// Opaque version token; must accompany an overwrite.
    pub sha: String,
    /// Decoded file content, present only once it has been fetched.
    pub decoded_content: Option<Vec<u8>>,
}

/// Body of a create-or-overwrite write.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct WriteRequest {
    /// Travels in the URL, not the body.
    #[serde(skip)]
    pub path: String,
    pub message: String,
    /// Base64 of the raw bytes.
    pub content: String,
    pub branch: String,
    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub sha: Option<String>,
}

/// Successful write acknowledgement.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WriteReceipt {
    /// HTTP status of the write (200 overwrite, 201 create).
    pub status: u16,
    /// Content reference of the newly written version, when the remote returns one.
    pub sha: Option<String>,
}

/// Error taxonomy for the upload pipeline.
///
/// A remote "not found" is not represented here; lookups return `Ok(None)`.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum UploadError {
    /// Non-success response (other than not-found) or a connection failure.
    /// Recoverable at unit granularity.
    #[error("{status_text}")]
    Transport {
        status: Option<u16>,
        status_text: String,
    },

    /// The remote refused a write and said why.
    #[error("{message}")]
    Rejected { status: u16, message: String },

    #[error("could not decode remote content for {path}: {reason}")]
    Decode { path: String, reason: String },

    /// The file selection could not produce its next file. Aborts the run.
    #[error("file selection failed: {0}")]
    Selection(String),

    #[error("invalid upload options: {0}")]
    InvalidOptions(String),
}

/// Trait for reading and writing files in a hosted repository.
///
/// Implemented by the HTTP client in the CLI crate and by test mocks.
#[cfg_attr(any(test, feature = "test-export-mocks"), automock)]
#[async_trait]
pub trait RemoteRepository: Send + Sync {
    /// Fetch metadata for `path` on the target branch. `Ok(None)` when absent.
    async fn lookup(
        &self,
        target: &UploadTarget,
        path: &str,
    ) -> Result<Option<RemoteFileRef>, UploadError>;

    /// Fetch and decode the current content of `path`.
    ///
    /// Only meaningful for a path that [`lookup`](Self::lookup) reported as present.
    async fn fetch_content(&self, target: &UploadTarget, path: &str)
        -> Result<Vec<u8>, UploadError>;

    /// Create or overwrite `request.path`.
    async fn put_contents(
        &self,
        target: &UploadTarget,
        request: &WriteRequest,
    ) -> Result<WriteReceipt, UploadError>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn write_request_omits_sha_and_path_for_new_files() {
        let req = WriteRequest {
            path: "notes.txt".into(),
            message: "Upload/Overwrite notes.txt".into(),
            content: "aGVsbG8=".into(),
            branch: "main".into(),
            sha: None,
        };
        let json = serde_json::to_value(&req).unwrap();
        assert!(json.get("sha").is_none());
        assert!(json.get("path").is_none());
        assert_eq!(json["branch"], "main");
    }

    #[test]
    fn rejected_error_displays_remote_message() {
        let err = UploadError::Rejected {
            status: 409,
            message: "Conflict".into(),
        };
        assert_eq!(err.to_string(), "Conflict");
    }
}
