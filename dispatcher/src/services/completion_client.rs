//! HTTP completion client for OpenAI-compatible chat endpoints

use async_trait::async_trait;
use serde::Serialize;

use shared::{Credential, EndpointConfig};
use crate::error::TransportError;
use crate::traits::CompletionClient;
use crate::types::RequestOptions;

/// Real completion client backed by a shared reqwest connection pool
#[derive(Clone, Default)]
pub struct RealCompletionClient {
    client: reqwest::Client,
}

#[derive(Serialize)]
struct ChatMessage<'a> {
    role: &'a str,
    content: &'a str,
}

#[derive(Serialize)]
struct ChatRequest<'a> {
    model: &'a str,
    messages: [ChatMessage<'a>; 2],
    max_tokens: u32,
    n: u32,
    stop: Option<&'a str>,
    temperature: f32,
}

impl RealCompletionClient {
    /// Create new completion client
    pub fn new() -> Self {
        Self {
            client: reqwest::Client::new(),
        }
    }

    /// Use a preconfigured reqwest client (proxies, TLS settings)
    pub fn with_client(client: reqwest::Client) -> Self {
        Self { client }
    }

    /// Pull `choices[0].message.content` out of a response body
    fn extract_content(body: &serde_json::Value) -> Result<&str, TransportError> {
        body.get("choices")
            .and_then(|choices| choices.get(0))
            .and_then(|choice| choice.get("message"))
            .and_then(|message| message.get("content"))
            .and_then(|content| content.as_str())
            .ok_or_else(|| TransportError::MalformedBody("No content in response".to_string()))
    }
}

#[async_trait]
impl CompletionClient for RealCompletionClient {
    async fn complete(
        &self,
        credential: &Credential,
        endpoint: &EndpointConfig,
        prompt: &str,
        options: &RequestOptions,
    ) -> Result<String, TransportError> {
        let prompt = options.render_prompt(prompt);

        let request_body = ChatRequest {
            model: endpoint.model(),
            messages: [
                ChatMessage {
                    role: "system",
                    content: &options.system_prompt,
                },
                ChatMessage {
                    role: "user",
                    content: &prompt,
                },
            ],
            max_tokens: options.max_tokens,
            n: options.samples,
            stop: None,
            temperature: options.temperature,
        };

        let response = self
            .client
            .post(endpoint.api_url())
            .header("Authorization", format!("Bearer {}", credential.expose()))
            .header("Content-Type", "application/json")
            .json(&request_body)
            .send()
            .await
            .map_err(|e| TransportError::Network(e.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(TransportError::Status {
                status: status.as_u16(),
                body,
            });
        }

        let response_json: serde_json::Value = response
            .json()
            .await
            .map_err(|e| TransportError::MalformedBody(format!("Failed to parse response: {}", e)))?;

        let content = Self::extract_content(&response_json)?.trim().to_string();

        // Keep each worker under the per-credential rate the endpoint tolerates
        if !options.min_interval.is_zero() {
            tokio::time::sleep(options.min_interval).await;
        }

        Ok(content)
    }
}
