use std::time::Duration;

use async_trait::async_trait;
use reqwest::Client;
use reqwest::header::{HeaderMap, HeaderValue, CONTENT_TYPE};
use serde::{Deserialize, Serialize};

use super::{CompletionRequest, LlmProvider};
use crate::{Error, Result};

const DEFAULT_BASE_URL: &str = "https://api.anthropic.com";

pub struct AnthropicProvider {
    api_key: String,
    model: String,
    base_url: String,
    client: Client,
}

impl AnthropicProvider {
    pub fn new(api_key: String, model: String, timeout: Duration) -> Result<Self> {
        let client = Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| Error::Llm(format!("failed to build Anthropic HTTP client: {}", e)))?;
        Ok(Self {
            api_key,
            model,
            base_url: DEFAULT_BASE_URL.to_string(),
            client,
        })
    }

    /// Point at a different API host (proxies, tests)
    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into().trim_end_matches('/').to_string();
        self
    }
}

#[async_trait]
impl LlmProvider for AnthropicProvider {
    fn name(&self) -> &str {
        "anthropic"
    }

    async fn complete(&self, request: &CompletionRequest) -> Result<String> {
        let mut headers = HeaderMap::new();
        headers.insert(
            "x-api-key",
            HeaderValue::from_str(self.api_key.trim())
                .map_err(|_| Error::Llm("invalid Anthropic API key".to_string()))?,
        );
        headers.insert("anthropic-version", HeaderValue::from_static("2023-06-01"));
        headers.insert(CONTENT_TYPE, HeaderValue::from_static("application/json"));

        let body = MessagesRequest {
            anthropic_version: None,
            model: Some(&self.model),
            max_tokens: request.max_tokens,
            temperature: request.temperature,
            top_p: request.top_p,
            messages: vec![UserMessage::text(&request.prompt)],
        };

        let resp = self
            .client
            .post(format!("{}/v1/messages", self.base_url))
            .headers(headers)
            .json(&body)
            .send()
            .await?;
        if !resp.status().is_success() {
            let status = resp.status();
            let text = resp
                .text()
                .await
                .unwrap_or_else(|_| "<body unavailable>".to_string());
            return Err(Error::Llm(format!("Anthropic returned {}: {}", status, text)));
        }

        let parsed: MessagesResponse = resp.json().await?;
        parsed.into_text("Anthropic")
    }
}

/// Messages API request body. Bedrock takes the same shape with
/// `anthropic_version` in the body and the model in the URL.
#[derive(Serialize)]
pub(super) struct MessagesRequest<'a> {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub anthropic_version: Option<&'a str>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub model: Option<&'a str>,
    pub max_tokens: usize,
    pub temperature: f32,
    pub top_p: f32,
    pub messages: Vec<UserMessage<'a>>,
}

#[derive(Serialize)]
pub(super) struct UserMessage<'a> {
    role: &'a str,
    content: Vec<ContentBlock<'a>>,
}

impl<'a> UserMessage<'a> {
    pub fn text(text: &'a str) -> Self {
        Self {
            role: "user",
            content: vec![ContentBlock { kind: "text", text }],
        }
    }
}

#[derive(Serialize)]
struct ContentBlock<'a> {
    #[serde(rename = "type")]
    kind: &'a str,
    text: &'a str,
}

#[derive(Debug, Deserialize)]
pub(super) struct MessagesResponse {
    content: Vec<ResponseBlock>,
}

impl MessagesResponse {
    /// Join the text blocks; an answer without text is an error
    pub fn into_text(self, provider: &str) -> Result<String> {
        let answer = self
            .content
            .into_iter()
            .filter_map(|block| match block {
                ResponseBlock::Text { text } => Some(text),
                ResponseBlock::Other => None,
            })
            .collect::<Vec<_>>()
            .join("\n");
        if answer.trim().is_empty() {
            return Err(Error::Llm(format!("{} response missing text content", provider)));
        }
        Ok(answer)
    }
}

#[derive(Debug, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
enum ResponseBlock {
    Text {
        text: String,
    },
    #[serde(other)]
    Other,
}

#[cfg(test)]
mod tests {
    use super::*;
    use httpmock::prelude::*;
    use serde_json::json;

    fn request() -> CompletionRequest {
        CompletionRequest {
            prompt: "What is S3?".to_string(),
            max_tokens: 500,
            temperature: 0.1,
            top_p: 0.9,
        }
    }

    fn provider(server: &MockServer) -> AnthropicProvider {
        AnthropicProvider::new("test-key".to_string(), "claude-test".to_string(), Duration::from_secs(5))
            .unwrap()
            .with_base_url(server.base_url())
    }

    #[tokio::test]
    async fn test_complete_returns_text_blocks() {
        let server = MockServer::start_async().await;
        let mock = server
            .mock_async(|when, then| {
                when.method(POST)
                    .path("/v1/messages")
                    .header("x-api-key", "test-key")
                    .header("anthropic-version", "2023-06-01")
                    .json_body(json!({
                        "model": "claude-test",
                        "max_tokens": 500,
                        "temperature": 0.1,
                        "top_p": 0.9,
                        "messages": [{
                            "role": "user",
                            "content": [{"type": "text", "text": "What is S3?"}]
                        }]
                    }));
                then.status(200).json_body(json!({
                    "id": "msg_1",
                    "content": [
                        {"type": "text", "text": "S3 is object storage."},
                        {"type": "tool_use", "id": "t", "name": "x", "input": {}}
                    ]
                }));
            })
            .await;

        let answer = provider(&server).complete(&request()).await.unwrap();
        mock.assert_async().await;
        assert_eq!(answer, "S3 is object storage.");
    }

    #[tokio::test]
    async fn test_http_error_is_surfaced() {
        let server = MockServer::start_async().await;
        server
            .mock_async(|when, then| {
                when.method(POST).path("/v1/messages");
                then.status(529).body("overloaded");
            })
            .await;

        let err = provider(&server).complete(&request()).await.unwrap_err();
        let message = err.to_string();
        assert!(message.contains("529"), "{}", message);
        assert!(message.contains("overloaded"), "{}", message);
    }

    #[tokio::test]
    async fn test_empty_content_is_error() {
        let server = MockServer::start_async().await;
        server
            .mock_async(|when, then| {
                when.method(POST).path("/v1/messages");
                then.status(200).json_body(json!({"content": []}));
            })
            .await;

        assert!(provider(&server).complete(&request()).await.is_err());
    }
}
