use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use thiserror::Error;

use crate::config::ConfigError;

/// Output cap applied to every analysis request, whichever provider serves it.
pub const MAX_OUTPUT_TOKENS: usize = 1024;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ProviderKind {
    Anthropic,
    OpenAI,
}

impl ProviderKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            ProviderKind::Anthropic => "anthropic",
            ProviderKind::OpenAI => "openai",
        }
    }

    /// Environment variable consulted when no explicit credential is given.
    pub fn api_key_env(&self) -> &'static str {
        match self {
            ProviderKind::Anthropic => "ANTHROPIC_API_KEY",
            ProviderKind::OpenAI => "OPENAI_API_KEY",
        }
    }

    pub fn default_model(&self) -> &'static str {
        match self {
            ProviderKind::Anthropic => "claude-3-5-sonnet-20240620",
            ProviderKind::OpenAI => "gpt-4-turbo",
        }
    }

    pub fn default_base_url(&self) -> &'static str {
        match self {
            ProviderKind::Anthropic => "https://api.anthropic.com/v1",
            ProviderKind::OpenAI => "https://api.openai.com/v1",
        }
    }
}

impl fmt::Display for ProviderKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ProviderKind {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "anthropic" => Ok(ProviderKind::Anthropic),
            "openai" => Ok(ProviderKind::OpenAI),
            other => Err(ConfigError::UnknownProvider(other.to_string())),
        }
    }
}

#[derive(Debug, Clone)]
pub struct ModelConfig {
    pub provider: ProviderKind,
    pub model_name: String,
    pub api_key: String,
    pub base_url: Option<String>,
    pub timeout_secs: Option<u64>,
    pub max_tokens: usize,
}

impl ModelConfig {
    pub fn new(provider: ProviderKind, model_name: impl Into<String>, api_key: impl Into<String>) -> Self {
        Self {
            provider,
            model_name: model_name.into(),
            api_key: api_key.into(),
            base_url: None,
            timeout_secs: None,
            max_tokens: MAX_OUTPUT_TOKENS,
        }
    }

    pub(crate) fn endpoint_root(&self) -> String {
        self.base_url
            .as_deref()
            .unwrap_or_else(|| self.provider.default_base_url())
            .trim_end_matches('/')
            .to_string()
    }

    pub(crate) fn http_client(&self) -> Result<reqwest::Client, AnalysisError> {
        let mut builder = reqwest::Client::builder();
        if let Some(secs) = self.timeout_secs {
            builder = builder.timeout(std::time::Duration::from_secs(secs));
        }
        builder.build().map_err(|source| AnalysisError::Transport {
            provider: self.provider,
            source,
        })
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LLMRequest {
    pub system_prompt: String,
    pub user_prompt: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LLMResponse {
    pub content: String,
    pub model: String,
    pub usage: Option<Usage>,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct Usage {
    pub prompt_tokens: usize,
    pub completion_tokens: usize,
    pub total_tokens: usize,
}

/// Failures of the single analysis call. All of them end the run.
#[derive(Debug, Error)]
pub enum AnalysisError {
    #[error("{provider} API key is required")]
    MissingCredential { provider: ProviderKind },

    #[error("{provider} API request failed with status {status}: {body}")]
    RemoteRejected {
        provider: ProviderKind,
        status: u16,
        body: String,
    },

    #[error("empty response from {provider}")]
    EmptyResponse { provider: ProviderKind },

    #[error("failed to send request to {provider}: {source}")]
    Transport {
        provider: ProviderKind,
        #[source]
        source: reqwest::Error,
    },

    #[error("failed to decode {provider} response: {source} - response body: {body}")]
    Decode {
        provider: ProviderKind,
        body: String,
        #[source]
        source: serde_json::Error,
    },
}

#[async_trait]
pub trait LLMAdapter: Send + Sync {
    async fn complete(&self, request: LLMRequest) -> Result<LLMResponse, AnalysisError>;
    fn model_name(&self) -> &str;
}

pub fn create_adapter(config: &ModelConfig) -> Result<Box<dyn LLMAdapter>, AnalysisError> {
    match config.provider {
        ProviderKind::Anthropic => Ok(Box::new(crate::adapters::AnthropicAdapter::new(
            config.clone(),
        )?)),
        ProviderKind::OpenAI => Ok(Box::new(crate::adapters::OpenAIAdapter::new(
            config.clone(),
        )?)),
    }
}

/// Posts `body` as JSON and hands back the raw response text, mapping
/// non-success statuses to `RemoteRejected`.
pub(crate) async fn post_json<T: Serialize + ?Sized>(
    provider: ProviderKind,
    request: reqwest::RequestBuilder,
    body: &T,
) -> Result<String, AnalysisError> {
    let response = request
        .header("Content-Type", "application/json")
        .json(body)
        .send()
        .await
        .map_err(|source| AnalysisError::Transport { provider, source })?;

    let status = response.status();
    let text = response
        .text()
        .await
        .map_err(|source| AnalysisError::Transport { provider, source })?;
    tracing::debug!("{} response ({}): {}", provider, status, text);

    if !status.is_success() {
        return Err(AnalysisError::RemoteRejected {
            provider,
            status: status.as_u16(),
            body: text,
        });
    }

    Ok(text)
}

pub(crate) fn decode<T: serde::de::DeserializeOwned>(
    provider: ProviderKind,
    body: String,
) -> Result<T, AnalysisError> {
    serde_json::from_str(&body).map_err(|source| AnalysisError::Decode {
        provider,
        body,
        source,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn provider_names_parse_case_insensitively() {
        assert_eq!("anthropic".parse::<ProviderKind>().unwrap(), ProviderKind::Anthropic);
        assert_eq!("OpenAI".parse::<ProviderKind>().unwrap(), ProviderKind::OpenAI);
    }

    #[test]
    fn unknown_provider_is_a_config_error() {
        let err = "ollama".parse::<ProviderKind>().unwrap_err();
        assert!(matches!(err, ConfigError::UnknownProvider(ref name) if name == "ollama"));
    }

    #[test]
    fn endpoint_root_prefers_override_and_trims_slash() {
        let mut config = ModelConfig::new(ProviderKind::OpenAI, "gpt-4-turbo", "key");
        assert_eq!(config.endpoint_root(), "https://api.openai.com/v1");
        config.base_url = Some("http://localhost:1234/".to_string());
        assert_eq!(config.endpoint_root(), "http://localhost:1234");
    }

    #[test]
    fn model_config_uses_fixed_output_cap() {
        let config = ModelConfig::new(ProviderKind::Anthropic, "claude", "key");
        assert_eq!(config.max_tokens, 1024);
    }
}
