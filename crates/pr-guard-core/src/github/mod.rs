mod rest;
mod settings;

use anyhow::Result;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::review::RepoRef;

pub use rest::RestGitHubClient;
pub use settings::GitHubSettings;

/// One changed file of a pull request, as returned by the GitHub files
/// listing. `patch` is absent for binary files and very large diffs.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChangedFile {
    pub filename: String,
    pub status: String,
    #[serde(default)]
    pub patch: Option<String>,
    #[serde(default)]
    pub additions: u64,
    #[serde(default)]
    pub deletions: u64,
}

/// Minimal pull request metadata needed to stamp and report a scan.
#[derive(Debug, Clone, Deserialize)]
pub struct PullRequestInfo {
    pub head_sha: String,
    pub title: String,
}

/// Commit status outcome posted after a scan.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CommitState {
    Success,
    Failure,
}

impl CommitState {
    pub fn as_str(&self) -> &'static str {
        match self {
            CommitState::Success => "success",
            CommitState::Failure => "failure",
        }
    }
}

/// Abstraction over the GitHub REST API so scans can be driven against a
/// stub in tests.
#[async_trait]
pub trait GitHubClient: Send + Sync {
    async fn get_pull_request(&self, repo: &RepoRef, number: u64) -> Result<PullRequestInfo>;

    async fn list_pull_request_files(
        &self,
        repo: &RepoRef,
        number: u64,
    ) -> Result<Vec<ChangedFile>>;

    /// Post the scan summary as a pull request comment.
    async fn post_review_comment(&self, repo: &RepoRef, number: u64, body: &str) -> Result<()>;

    /// Post a commit status for the scanned head sha.
    async fn post_commit_status(
        &self,
        repo: &RepoRef,
        sha: &str,
        state: CommitState,
        description: &str,
    ) -> Result<()>;
}
