use anyhow::{Context, Result};
use std::collections::HashMap;

/// Environment-driven configuration for LLM adapters.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LlmSettings {
    pub provider: String,
    pub api_key: String,
    pub endpoint: Option<String>,
    pub model: Option<String>,
    pub timeout_secs: Option<u64>,
    pub max_retries: u32,
}

impl LlmSettings {
    const PROVIDER_ENV: &'static str = "PR_GUARD_PROVIDER";
    const API_KEY_ENV: &'static str = "PR_GUARD_API_KEY";
    const ENDPOINT_ENV: &'static str = "PR_GUARD_ENDPOINT";
    const MODEL_ENV: &'static str = "PR_GUARD_MODEL";
    const TIMEOUT_ENV: &'static str = "PR_GUARD_TIMEOUT_SECS";
    const RETRIES_ENV: &'static str = "PR_GUARD_MAX_RETRIES";

    /// Load settings from environment variables.
    ///
    /// * `PR_GUARD_PROVIDER` — Provider identifier (default: `openai`).
    /// * `PR_GUARD_API_KEY`  — API key/token (required except for `noop`).
    /// * `PR_GUARD_ENDPOINT` — Optional custom endpoint/base URL.
    pub fn from_env() -> Result<Self> {
        Self::from_map(std::env::vars().collect())
    }

    fn from_map(vars: HashMap<String, String>) -> Result<Self> {
        let provider = vars
            .get(Self::PROVIDER_ENV)
            .cloned()
            .filter(|value| !value.trim().is_empty())
            .unwrap_or_else(|| "openai".to_string())
            .trim()
            .to_string();
        let api_key = match provider.to_lowercase().as_str() {
            "noop" => vars.get(Self::API_KEY_ENV).cloned().unwrap_or_default(),
            _ => vars
                .get(Self::API_KEY_ENV)
                .cloned()
                .filter(|value| !value.trim().is_empty())
                .with_context(|| {
                    format!(
                        "environment variable {} must be set for provider `{provider}`",
                        Self::API_KEY_ENV
                    )
                })?,
        };
        let endpoint = vars
            .get(Self::ENDPOINT_ENV)
            .cloned()
            .filter(|value| !value.trim().is_empty());
        let model = vars
            .get(Self::MODEL_ENV)
            .cloned()
            .filter(|value| !value.trim().is_empty());
        let timeout_secs = vars
            .get(Self::TIMEOUT_ENV)
            .and_then(|value| value.trim().parse::<u64>().ok());
        let max_retries = vars
            .get(Self::RETRIES_ENV)
            .and_then(|value| value.trim().parse::<u32>().ok())
            .unwrap_or(2);

        Ok(Self {
            provider,
            api_key,
            endpoint,
            model,
            timeout_secs,
            max_retries,
        })
    }
}
