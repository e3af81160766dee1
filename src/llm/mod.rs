//! Hosted language models
//!
//! Every provider takes one fully built prompt and returns the model's text.
//! [`from_config`] picks the provider named in `[llm]`.

mod anthropic;
mod bedrock;
mod openai;
pub mod prompt;

pub use anthropic::AnthropicProvider;
pub use bedrock::BedrockProvider;
pub use openai::OpenAiProvider;
pub use prompt::build_prompt;

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;

use crate::config::{LlmConfig, ProviderKind};
use crate::{Error, Result};

/// Trait implemented by concrete LLM providers.
#[async_trait]
pub trait LlmProvider: Send + Sync {
    /// Short provider name for logs
    fn name(&self) -> &str;

    async fn complete(&self, request: &CompletionRequest) -> Result<String>;
}

/// Request envelope shared by the various providers.
#[derive(Debug, Clone, PartialEq)]
pub struct CompletionRequest {
    pub prompt: String,
    pub max_tokens: usize,
    pub temperature: f32,
    pub top_p: f32,
}

impl CompletionRequest {
    pub fn new(prompt: impl Into<String>, config: &LlmConfig) -> Self {
        Self {
            prompt: prompt.into(),
            max_tokens: config.max_tokens,
            temperature: config.temperature,
            top_p: config.top_p,
        }
    }
}

/// Build the provider selected by configuration
pub async fn from_config(config: &LlmConfig) -> Result<Arc<dyn LlmProvider>> {
    let timeout = Duration::from_secs(config.timeout_secs.max(1));
    let model = config.model_name().to_string();

    let provider: Arc<dyn LlmProvider> = match config.provider {
        ProviderKind::Anthropic => {
            let key = api_key(config, |var| std::env::var(var).ok())?;
            let mut provider = AnthropicProvider::new(key, model, timeout)?;
            if let Some(url) = &config.base_url {
                provider = provider.with_base_url(url.clone());
            }
            Arc::new(provider)
        }
        ProviderKind::OpenAi => {
            let key = api_key(config, |var| std::env::var(var).ok())?;
            let mut provider = OpenAiProvider::new(key, model, timeout)?;
            if let Some(url) = &config.base_url {
                provider = provider.with_base_url(url.clone());
            }
            Arc::new(provider)
        }
        ProviderKind::Bedrock => {
            Arc::new(
                BedrockProvider::connect(
                    model,
                    config.region.as_deref(),
                    config.base_url.as_deref(),
                )
                .await,
            )
        }
    };

    tracing::info!("Using {} model {}", provider.name(), config.model_name());
    Ok(provider)
}

/// Read the provider's API key from the variable named in config
fn api_key(config: &LlmConfig, lookup: impl Fn(&str) -> Option<String>) -> Result<String> {
    let var = config.key_env().ok_or_else(|| {
        Error::Config(format!("llm.api_key_env is required for {:?}", config.provider))
    })?;
    match lookup(var) {
        Some(key) if !key.trim().is_empty() => Ok(key),
        _ => Err(Error::Config(format!(
            "Environment variable {} must hold the LLM API key",
            var
        ))),
    }
}

/// Canned provider for tests: records prompts and returns a fixed answer.
#[cfg(test)]
pub(crate) struct FakeLlm {
    pub answer: String,
    pub prompts: std::sync::Mutex<Vec<String>>,
}

#[cfg(test)]
impl FakeLlm {
    pub fn new(answer: &str) -> Self {
        Self { answer: answer.to_string(), prompts: std::sync::Mutex::new(Vec::new()) }
    }

    pub fn calls(&self) -> usize {
        self.prompts.lock().unwrap().len()
    }
}

#[cfg(test)]
#[async_trait]
impl LlmProvider for FakeLlm {
    fn name(&self) -> &str {
        "fake"
    }

    async fn complete(&self, request: &CompletionRequest) -> Result<String> {
        self.prompts.lock().unwrap().push(request.prompt.clone());
        Ok(self.answer.clone())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_request_takes_sampling_settings_from_config() {
        let config = LlmConfig::default();
        let request = CompletionRequest::new("hi", &config);
        assert_eq!(request.max_tokens, 500);
        assert_eq!(request.temperature, 0.1);
        assert_eq!(request.top_p, 0.9);
    }

    #[test]
    fn test_missing_api_key_is_config_error() {
        let err = api_key(&LlmConfig::default(), |_| None).unwrap_err();
        assert!(matches!(err, Error::Config(_)));
        assert_eq!(
            err.to_string(),
            "Configuration error: Environment variable ANTHROPIC_API_KEY must hold the LLM API key"
        );
    }

    #[test]
    fn test_openai_reads_its_own_key() {
        let config = LlmConfig { provider: ProviderKind::OpenAi, ..LlmConfig::default() };
        let lookup = |var: &str| (var == "OPENAI_API_KEY").then(|| "sk-test".to_string());

        assert_eq!(api_key(&config, lookup).unwrap(), "sk-test");
        assert!(api_key(&LlmConfig::default(), lookup).is_err());
    }
}
