//! Issue tracker abstraction: create issues and attach files.
//!
//! The pipeline talks to the tracker only through the [`Tracker`] trait so it
//! can be exercised with fakes; [`JiraClient`] is the production implementation.

mod jira;

pub use jira::JiraClient;

use async_trait::async_trait;
use serde::Deserialize;
use std::path::Path;

/// Request to create one tracked issue. Invariant: `title` is the prefix of
/// `description` up to the first line break (or equals it).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IssueRequest {
    pub project_key: String,
    pub title: String,
    pub description: String,
}

/// Tracker-assigned identity of a created issue.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct IssueHandle {
    pub key: String,
    pub id: String,
}

/// Tracker call failure. API errors carry the HTTP status and response body
/// so callers can diagnose without reproducing the run.
#[derive(Debug, thiserror::Error)]
pub enum TrackerError {
    #[error("tracker request failed: {0}")]
    Request(#[from] reqwest::Error),
    #[error("tracker api error: {status} {body}")]
    Api { status: u16, body: String },
    #[error("reading attachment {path}: {source}")]
    ReadFile {
        path: String,
        source: std::io::Error,
    },
}

/// Issue-tracker collaborator contract.
#[async_trait]
pub trait Tracker: Send + Sync {
    /// Create one issue. Exactly one call per qualifying pipeline run.
    async fn create_issue(&self, request: &IssueRequest) -> Result<IssueHandle, TrackerError>;

    /// Upload one local file as an attachment of `issue`. Outcomes are
    /// independent per file; a failure must not affect sibling uploads.
    async fn attach_file(
        &self,
        issue: &IssueHandle,
        path: &Path,
        file_name: &str,
    ) -> Result<(), TrackerError>;
}
