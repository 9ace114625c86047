use serde::{Deserialize, Serialize};
use std::fmt;
use tracing::{debug, info};

use crate::contract::UploadError;

/// Default split threshold: 99 MiB, just under the contents API payload limit.
pub const DEFAULT_SPLIT_THRESHOLD: u64 = 99 * 1024 * 1024;

/// Default chunk size for split files: 24 MiB.
pub const DEFAULT_CHUNK_SIZE: usize = 24 * 1024 * 1024;

/// Where an upload run writes to. Immutable for the duration of a run.
#[derive(Clone, PartialEq, Eq)]
pub struct UploadTarget {
    pub owner: String,
    pub repo: String,
    /// Branch, tag or other ref the files are committed to.
    pub branch: String,
    /// Bearer token for the hosted API.
    pub credential: String,
}

impl UploadTarget {
    pub fn new(
        owner: impl Into<String>,
        repo: impl Into<String>,
        branch: impl Into<String>,
        credential: impl Into<String>,
    ) -> Self {
        Self {
            owner: owner.into(),
            repo: repo.into(),
            branch: branch.into(),
            credential: credential.into(),
        }
    }

    /// `owner/repo@branch`, for log lines.
    pub fn display_name(&self) -> String {
        format!("{}/{}@{}", self.owner, self.repo, self.branch)
    }

    pub fn trace_loaded(&self) {
        info!(
            owner = %self.owner,
            repo = %self.repo,
            branch = %self.branch,
            credential_set = !self.credential.is_empty(),
            "Loaded UploadTarget"
        );
    }
}

// Hand-written so the credential never reaches a log line.
impl fmt::Debug for UploadTarget {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("UploadTarget")
            .field("owner", &self.owner)
            .field("repo", &self.repo)
            .field("branch", &self.branch)
            .field("credential", &"<redacted>")
            .finish()
    }
}

/// Tunables for a single upload run.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct UploadOptions {
    /// Files strictly larger than this many bytes are split into chunks.
    pub split_threshold: u64,
    /// Upper bound in bytes for a single chunk of a split file.
    pub chunk_size: usize,
    /// Compare chunk content against the remote before uploading it.
    /// Off by default: chunks are always written.
    pub compare_chunks: bool,
}

impl Default for UploadOptions {
    fn default() -> Self {
        Self {
            split_threshold: DEFAULT_SPLIT_THRESHOLD,
            chunk_size: DEFAULT_CHUNK_SIZE,
            compare_chunks: false,
        }
    }
}

impl UploadOptions {
    pub fn validate(&self) -> Result<(), UploadError> {
        if self.chunk_size == 0 {
            return Err(UploadError::InvalidOptions(
                "chunk_size must be greater than zero".into(),
            ));
        }
        Ok(())
    }

    pub fn trace_loaded(&self) {
        info!(
            split_threshold = self.split_threshold,
            chunk_size = self.chunk_size,
            compare_chunks = self.compare_chunks,
            "Loaded UploadOptions"
        );
        debug!(?self, "UploadOptions loaded (full debug)");
    }
}
