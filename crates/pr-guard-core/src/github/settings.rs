use std::collections::HashMap;

use anyhow::{Context, Result};

/// Environment-driven configuration for the GitHub REST client.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GitHubSettings {
    pub token: String,
    pub endpoint: Option<String>,
    pub timeout_secs: Option<u64>,
}

impl GitHubSettings {
    const TOKEN_ENV: &'static str = "PR_GUARD_GITHUB_TOKEN";
    const ENDPOINT_ENV: &'static str = "PR_GUARD_GITHUB_ENDPOINT";
    const TIMEOUT_ENV: &'static str = "PR_GUARD_GITHUB_TIMEOUT_SECS";

    /// Load settings from environment variables.
    ///
    /// * `PR_GUARD_GITHUB_TOKEN`        — API token (required).
    /// * `PR_GUARD_GITHUB_ENDPOINT`     — Optional base URL override.
    /// * `PR_GUARD_GITHUB_TIMEOUT_SECS` — Optional request timeout.
    pub fn from_env() -> Result<Self> {
        Self::from_map(std::env::vars().collect())
    }

    fn from_map(vars: HashMap<String, String>) -> Result<Self> {
        let token = vars
            .get(Self::TOKEN_ENV)
            .cloned()
            .filter(|value| !value.trim().is_empty())
            .with_context(|| {
                format!(
                    "environment variable {} must be set to scan pull requests",
                    Self::TOKEN_ENV
                )
            })?;
        let endpoint = vars
            .get(Self::ENDPOINT_ENV)
            .cloned()
            .filter(|value| !value.trim().is_empty());
        let timeout_secs = vars
            .get(Self::TIMEOUT_ENV)
            .and_then(|value| value.trim().parse::<u64>().ok());

        Ok(Self {
            token,
            endpoint,
            timeout_secs,
        })
    }
}
