use crate::adapters::llm::{
    decode, post_json, AnalysisError, LLMAdapter, LLMRequest, LLMResponse, ModelConfig,
    ProviderKind, Usage,
};
use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};

const ANTHROPIC_VERSION: &str = "2023-06-01";

pub struct AnthropicAdapter {
    client: Client,
    config: ModelConfig,
    base_url: String,
}

#[derive(Serialize)]
struct AnthropicRequest<'a> {
    model: &'a str,
    max_tokens: usize,
    system: &'a str,
    messages: Vec<Message<'a>>,
}

#[derive(Serialize)]
struct Message<'a> {
    role: &'static str,
    content: &'a str,
}

#[derive(Deserialize)]
struct AnthropicResponse {
    #[serde(default)]
    content: Vec<Content>,
    #[serde(default)]
    model: String,
    usage: Option<AnthropicUsage>,
}

#[derive(Deserialize)]
struct Content {
    #[serde(default)]
    text: String,
}

#[derive(Deserialize)]
struct AnthropicUsage {
    input_tokens: usize,
    output_tokens: usize,
}

impl AnthropicAdapter {
    pub fn new(config: ModelConfig) -> Result<Self, AnalysisError> {
        let base_url = config.endpoint_root();
        let client = config.http_client()?;

        Ok(Self {
            client,
            config,
            base_url,
        })
    }
}

#[async_trait]
impl LLMAdapter for AnthropicAdapter {
    async fn complete(&self, request: LLMRequest) -> Result<LLMResponse, AnalysisError> {
        if self.config.api_key.is_empty() {
            return Err(AnalysisError::MissingCredential {
                provider: ProviderKind::Anthropic,
            });
        }

        let anthropic_request = AnthropicRequest {
            model: &self.config.model_name,
            max_tokens: self.config.max_tokens,
            system: &request.system_prompt,
            messages: vec![Message {
                role: "user",
                content: &request.user_prompt,
            }],
        };

        let url = format!("{}/messages", self.base_url);
        let body = post_json(
            ProviderKind::Anthropic,
            self.client
                .post(&url)
                .header("x-api-key", &self.config.api_key)
                .header("anthropic-version", ANTHROPIC_VERSION),
            &anthropic_request,
        )
        .await?;

        let anthropic_response: AnthropicResponse = decode(ProviderKind::Anthropic, body)?;

        let content = anthropic_response
            .content
            .into_iter()
            .next()
            .map(|c| c.text)
            .ok_or(AnalysisError::EmptyResponse {
                provider: ProviderKind::Anthropic,
            })?;

        Ok(LLMResponse {
            content,
            model: anthropic_response.model,
            usage: anthropic_response.usage.map(|usage| Usage {
                prompt_tokens: usage.input_tokens,
                completion_tokens: usage.output_tokens,
                total_tokens: usage.input_tokens + usage.output_tokens,
            }),
        })
    }

    fn model_name(&self) -> &str {
        &self.config.model_name
    }
}
