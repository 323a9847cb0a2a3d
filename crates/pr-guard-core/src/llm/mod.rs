mod anthropic;
mod openai;
mod settings;

use anyhow::{bail, Result};
use async_trait::async_trait;

pub use anthropic::AnthropicClient;
pub use openai::OpenAiClient;
pub use settings::LlmSettings;

/// Client abstraction over a completion endpoint.
///
/// The analysis prompt and response handling live with the callers; adapters
/// only move text. Retry policy, if any, is the adapter's own.
#[async_trait]
pub trait LlmClient: Send + Sync {
    /// Run one completion and return the raw response text.
    async fn complete(&self, system_prompt: &str, user_prompt: &str) -> Result<String>;
}

#[async_trait]
impl<T: LlmClient + ?Sized> LlmClient for Box<T> {
    async fn complete(&self, system_prompt: &str, user_prompt: &str) -> Result<String> {
        (**self).complete(system_prompt, user_prompt).await
    }
}

/// Offline stand-in reporting a clean result for every file.
#[derive(Debug, Default, Clone)]
pub struct NoopLlmClient;

#[async_trait]
impl LlmClient for NoopLlmClient {
    async fn complete(&self, _system_prompt: &str, _user_prompt: &str) -> Result<String> {
        Ok("[]".to_string())
    }
}

/// Build the client named by `settings.provider`.
pub fn client_for_provider(settings: &LlmSettings) -> Result<Box<dyn LlmClient>> {
    match settings.provider.to_lowercase().as_str() {
        "openai" => Ok(Box::new(OpenAiClient::new(settings)?)),
        "anthropic" => Ok(Box::new(AnthropicClient::new(settings)?)),
        "noop" => Ok(Box::new(NoopLlmClient)),
        other => bail!("unsupported LLM provider `{other}` (expected openai, anthropic, or noop)"),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn settings(provider: &str) -> LlmSettings {
        LlmSettings {
            provider: provider.into(),
            api_key: "test-key".into(),
            endpoint: None,
            model: None,
            timeout_secs: None,
            max_retries: 0,
        }
    }

    #[tokio::test]
    async fn noop_client_reports_clean() {
        let client = NoopLlmClient;
        let response = client.complete("system", "user").await.unwrap();
        assert_eq!(response, "[]");
    }

    #[test]
    fn dispatches_known_providers() {
        assert!(client_for_provider(&settings("openai")).is_ok());
        assert!(client_for_provider(&settings("Anthropic")).is_ok());
        assert!(client_for_provider(&settings("noop")).is_ok());
    }

    #[test]
    fn rejects_unknown_provider() {
        let err = client_for_provider(&settings("bard")).expect_err("unknown provider");
        assert!(err.to_string().contains("unsupported LLM provider"));
    }
}
