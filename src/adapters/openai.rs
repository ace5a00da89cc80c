use crate::adapters::llm::{
    decode, post_json, AnalysisError, LLMAdapter, LLMRequest, LLMResponse, ModelConfig,
    ProviderKind, Usage,
};
use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};

pub struct OpenAIAdapter {
    client: Client,
    config: ModelConfig,
    base_url: String,
}

#[derive(Serialize)]
struct OpenAIRequest<'a> {
    model: &'a str,
    messages: Vec<Message>,
    max_tokens: usize,
}

#[derive(Serialize, Deserialize)]
struct Message {
    role: String,
    #[serde(default)]
    content: Option<String>,
}

#[derive(Deserialize)]
struct OpenAIResponse {
    #[serde(default)]
    choices: Vec<Choice>,
    #[serde(default)]
    model: String,
    usage: Option<OpenAIUsage>,
}

#[derive(Deserialize)]
struct Choice {
    message: Message,
}

#[derive(Deserialize)]
struct OpenAIUsage {
    prompt_tokens: usize,
    completion_tokens: usize,
    total_tokens: usize,
}

impl OpenAIAdapter {
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
impl LLMAdapter for OpenAIAdapter {
    async fn complete(&self, request: LLMRequest) -> Result<LLMResponse, AnalysisError> {
        if self.config.api_key.is_empty() {
            return Err(AnalysisError::MissingCredential {
                provider: ProviderKind::OpenAI,
            });
        }

        let messages = vec![
            Message {
                role: "system".to_string(),
                content: Some(request.system_prompt),
            },
            Message {
                role: "user".to_string(),
                content: Some(request.user_prompt),
            },
        ];

        let openai_request = OpenAIRequest {
            model: &self.config.model_name,
            messages,
            max_tokens: self.config.max_tokens,
        };

        let body = post_json(
            ProviderKind::OpenAI,
            self.client
                .post(format!("{}/chat/completions", self.base_url))
                .bearer_auth(&self.config.api_key),
            &openai_request,
        )
        .await?;

        let openai_response: OpenAIResponse = decode(ProviderKind::OpenAI, body)?;

        let content = openai_response
            .choices
            .into_iter()
            .next()
            .map(|c| c.message.content.unwrap_or_default())
            .ok_or(AnalysisError::EmptyResponse {
                provider: ProviderKind::OpenAI,
            })?;

        Ok(LLMResponse {
            content,
            model: openai_response.model,
            usage: openai_response.usage.map(|usage| Usage {
                prompt_tokens: usage.prompt_tokens,
                completion_tokens: usage.completion_tokens,
                total_tokens: usage.total_tokens,
            }),
        })
    }

    fn model_name(&self) -> &str {
        &self.config.model_name
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use mockito::{Matcher, Server};
    use serde_json::json;

    fn adapter_for(server: &Server, api_key: &str) -> OpenAIAdapter {
        let mut config = ModelConfig::new(ProviderKind::OpenAI, "gpt-test", api_key);
        config.base_url = Some(server.url());
        OpenAIAdapter::new(config).unwrap()
    }

    fn request() -> LLMRequest {
        LLMRequest {
            system_prompt: "system text".to_string(),
            user_prompt: "user text".to_string(),
        }
    }

    #[tokio::test]
    async fn sends_system_and_user_messages() {
        let mut server = Server::new_async().await;
        let mock = server
            .mock("POST", "/chat/completions")
            .match_header("authorization", "Bearer secret")
            .match_body(Matcher::Json(json!({
                "model": "gpt-test",
                "messages": [
                    {"role": "system", "content": "system text"},
                    {"role": "user", "content": "user text"}
                ],
                "max_tokens": 1024
            })))
            .with_status(200)
            .with_body(
                r#"{"choices":[{"message":{"role":"assistant","content":"looks risky"}}],"model":"gpt-test","usage":{"prompt_tokens":7,"completion_tokens":2,"total_tokens":9}}"#,
            )
            .expect(1)
            .create_async()
            .await;

        let response = adapter_for(&server, "secret").complete(request()).await.unwrap();
        mock.assert_async().await;
        assert_eq!(response.content, "looks risky");
        assert_eq!(response.model, "gpt-test");
    }

    #[tokio::test]
    async fn empty_choice_list_is_empty_response() {
        let mut server = Server::new_async().await;
        server
            .mock("POST", "/chat/completions")
            .with_status(200)
            .with_body(r#"{"choices":[],"model":"gpt-test"}"#)
            .create_async()
            .await;

        let err = adapter_for(&server, "secret").complete(request()).await.unwrap_err();
        assert!(matches!(err, AnalysisError::EmptyResponse { provider: ProviderKind::OpenAI }));
    }

    #[tokio::test]
    async fn rejected_request_carries_status() {
        let mut server = Server::new_async().await;
        server
            .mock("POST", "/chat/completions")
            .with_status(401)
            .with_body(r#"{"error":{"message":"bad key"}}"#)
            .create_async()
            .await;

        let err = adapter_for(&server, "secret").complete(request()).await.unwrap_err();
        assert!(matches!(err, AnalysisError::RemoteRejected { status: 401, .. }));
        assert!(err.to_string().contains("bad key"));
    }

    #[tokio::test]
    async fn empty_credential_never_reaches_the_network() {
        let mut server = Server::new_async().await;
        let mock = server
            .mock("POST", Matcher::Any)
            .expect(0)
            .create_async()
            .await;

        let err = adapter_for(&server, "").complete(request()).await.unwrap_err();
        assert!(matches!(err, AnalysisError::MissingCredential { provider: ProviderKind::OpenAI }));
        mock.assert_async().await;
    }
}
