#![doc = "gh-uploader-core: upload pipeline for pushing local files into a hosted repository."]

//! This crate holds the decision logic of gh-uploader: change detection,
//! newline-aligned chunk splitting, the single-file write and the sequential
//! orchestration that ties them together.
//! The HTTP client for the GitHub contents API lives in the `gh-uploader` crate;
//! here the remote is only seen through [`contract::RemoteRepository`].
//!
//! # Usage
//! Build an [`upload::UploadRun`] (or call [`upload::upload_files`]) with a
//! target, options, a remote and a file selection, then consume its events.

pub mod change;
pub mod config;
pub mod contract;
pub mod executor;
pub mod lookup;
pub mod progress;
pub mod split;
pub mod upload;

pub use config::{UploadOptions, UploadTarget};
pub use contract::{LocalFileUnit, RemoteFileRef, RemoteRepository, UploadError};
pub use progress::{ProgressState, RunReport, RunState, StatusEvent, UnitOutcome, UploadEvent};
pub use upload::{upload_files, UploadRun};
