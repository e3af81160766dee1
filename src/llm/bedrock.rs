use async_trait::async_trait;
use aws_config::BehaviorVersion;
use aws_sdk_bedrockruntime::Client as BedrockClient;
use aws_sdk_bedrockruntime::config::Region;
use aws_sdk_bedrockruntime::error::DisplayErrorContext;
use aws_sdk_bedrockruntime::primitives::Blob;

use super::anthropic::{MessagesRequest, MessagesResponse, UserMessage};
use super::{CompletionRequest, LlmProvider};
use crate::{Error, Result};

const BEDROCK_ANTHROPIC_VERSION: &str = "bedrock-2023-05-31";

/// Claude models hosted on AWS Bedrock
pub struct BedrockProvider {
    client: BedrockClient,
    model_id: String,
}

impl BedrockProvider {
    pub fn new(client: BedrockClient, model_id: impl Into<String>) -> Self {
        Self { client, model_id: model_id.into() }
    }

    /// Build a client from the default AWS credential chain
    pub async fn connect(model_id: String, region: Option<&str>, endpoint_url: Option<&str>) -> Self {
        let mut loader = aws_config::defaults(BehaviorVersion::latest());
        if let Some(region) = region {
            loader = loader.region(Region::new(region.to_string()));
        }
        let sdk_config = loader.load().await;

        let mut builder = aws_sdk_bedrockruntime::config::Builder::from(&sdk_config);
        if let Some(endpoint) = endpoint_url {
            builder = builder.endpoint_url(endpoint);
        }

        Self::new(BedrockClient::from_conf(builder.build()), model_id)
    }
}

fn request_body(request: &CompletionRequest) -> Result<Vec<u8>> {
    let body = MessagesRequest {
        anthropic_version: Some(BEDROCK_ANTHROPIC_VERSION),
        model: None,
        max_tokens: request.max_tokens,
        temperature: request.temperature,
        top_p: request.top_p,
        messages: vec![UserMessage::text(&request.prompt)],
    };
    Ok(serde_json::to_vec(&body)?)
}

fn parse_response(bytes: &[u8]) -> Result<String> {
    let parsed: MessagesResponse = serde_json::from_slice(bytes)?;
    parsed.into_text("Bedrock")
}

#[async_trait]
impl LlmProvider for BedrockProvider {
    fn name(&self) -> &str {
        "bedrock"
    }

    async fn complete(&self, request: &CompletionRequest) -> Result<String> {
        let resp = self
            .client
            .invoke_model()
            .model_id(&self.model_id)
            .content_type("application/json")
            .accept("application/json")
            .body(Blob::new(request_body(request)?))
            .send()
            .await
            .map_err(|e| Error::Llm(format!(
                "Bedrock invoke_model failed for {}: {}",
                self.model_id,
                DisplayErrorContext(&e)
            )))?;

        parse_response(resp.body().as_ref())
    }
}
