use std::time::Duration;

use anyhow::{bail, Context, Result};
use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};

use super::{ChangedFile, CommitState, GitHubClient, GitHubSettings, PullRequestInfo};
use crate::review::RepoRef;

const STATUS_CONTEXT: &str = "pr-guard/security";

/// GitHub REST API client backed by reqwest.
#[derive(Debug, Clone)]
pub struct RestGitHubClient {
    http: Client,
    base: String,
    token: String,
}

impl RestGitHubClient {
    pub fn new(settings: &GitHubSettings) -> Result<Self> {
        if settings.token.trim().is_empty() {
            bail!("GitHub token must be provided via PR_GUARD_GITHUB_TOKEN");
        }
        let base = settings
            .endpoint
            .clone()
            .unwrap_or_else(|| "https://api.github.com".to_string())
            .trim_end_matches('/')
            .to_string();
        let http = Client::builder()
            .user_agent("pr-guard/0.1")
            .timeout(Duration::from_secs(settings.timeout_secs.unwrap_or(30)))
            .build()
            .context("failed to build GitHub HTTP client")?;
        Ok(Self {
            http,
            base,
            token: settings.token.clone(),
        })
    }

    async fn get_json<T: serde::de::DeserializeOwned>(&self, url: &str) -> Result<T> {
        let response = self
            .http
            .get(url)
            .bearer_auth(&self.token)
            .header("accept", "application/vnd.github+json")
            .send()
            .await
            .with_context(|| format!("failed to call GitHub API at {url}"))?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            bail!("GitHub API error ({status}): {body}");
        }
        response
            .json()
            .await
            .with_context(|| format!("failed to parse GitHub response from {url}"))
    }

    async fn post_json<B: Serialize>(&self, url: &str, body: &B) -> Result<()> {
        let response = self
            .http
            .post(url)
            .bearer_auth(&self.token)
            .header("accept", "application/vnd.github+json")
            .json(body)
            .send()
            .await
            .with_context(|| format!("failed to call GitHub API at {url}"))?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            bail!("GitHub API error ({status}): {body}");
        }
        Ok(())
    }
}

#[async_trait]
impl GitHubClient for RestGitHubClient {
    async fn get_pull_request(&self, repo: &RepoRef, number: u64) -> Result<PullRequestInfo> {
        let url = format!(
            "{}/repos/{}/{}/pulls/{}",
            self.base, repo.owner, repo.name, number
        );
        let pull: PullResponse = self.get_json(&url).await?;
        Ok(PullRequestInfo {
            head_sha: pull.head.sha,
            title: pull.title,
        })
    }

    async fn list_pull_request_files(
        &self,
        repo: &RepoRef,
        number: u64,
    ) -> Result<Vec<ChangedFile>> {
        let url = format!(
            "{}/repos/{}/{}/pulls/{}/files?per_page=100",
            self.base, repo.owner, repo.name, number
        );
        self.get_json(&url).await
    }

    async fn post_review_comment(&self, repo: &RepoRef, number: u64, body: &str) -> Result<()> {
        let url = format!(
            "{}/repos/{}/{}/issues/{}/comments",
            self.base, repo.owner, repo.name, number
        );
        self.post_json(&url, &CommentRequest { body }).await
    }

    async fn post_commit_status(
        &self,
        repo: &RepoRef,
        sha: &str,
        state: CommitState,
        description: &str,
    ) -> Result<()> {
        let url = format!(
            "{}/repos/{}/{}/statuses/{}",
            self.base, repo.owner, repo.name, sha
        );
        self.post_json(
            &url,
            &StatusRequest {
                state: state.as_str(),
                description,
                context: STATUS_CONTEXT,
            },
        )
        .await
    }
}

#[derive(Deserialize)]
struct PullResponse {
    title: String,
    head: HeadRef,
}

#[derive(Deserialize)]
struct HeadRef {
    sha: String,
}

#[derive(Serialize)]
struct CommentRequest<'a> {
    body: &'a str,
}

#[derive(Serialize)]
struct StatusRequest<'a> {
    state: &'a str,
    description: &'a str,
    context: &'a str,
}
