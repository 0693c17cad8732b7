//! Anthropic messages API adapter
//!
//! Sends the key in the `x-api-key` header. The
//! `anthropic-dangerous-direct-browser-access` header mirrors the
//! browser-originated deployments this layer also serves; the key is
//! exposed to whatever environment holds the config.

use super::stream::spawn_reader;
use super::{
    provider_error, ApiError, CompletionRequest, ProviderConfig, ProviderKind, SseFormat,
    StreamChunk, StreamingProvider,
};
use async_trait::async_trait;
use reqwest::Client;
use serde_json::{json, Value};
use tokio::sync::mpsc;
use tokio::time::timeout;
use tracing::debug;

const DEFAULT_BASE_URL: &str = "https://api.anthropic.com";
const API_VERSION: &str = "2023-06-01";

pub struct AnthropicClient {
    config: ProviderConfig,
    client: Client,
}

impl AnthropicClient {
    pub fn new(config: ProviderConfig) -> Self {
        Self {
            config,
            client: Client::new(),
        }
    }

    fn url(&self) -> String {
        let base = self.config.base_url.as_deref().unwrap_or(DEFAULT_BASE_URL);
        format!("{base}/v1/messages")
    }

    fn build_body(&self, request: &CompletionRequest) -> Value {
        let mut body = json!({
            "model": self.config.model,
            "max_tokens": request.max_tokens,
            "stream": true,
            "messages": [{
                "role": "user",
                "content": request.prompt,
            }],
        });

        if let Some(system) = &request.system {
            body["system"] = json!(system);
        }

        body
    }
}

#[async_trait]
impl StreamingProvider for AnthropicClient {
    async fn send_streaming(
        &self,
        request: CompletionRequest,
    ) -> Result<mpsc::Receiver<StreamChunk>, ApiError> {
        let body = self.build_body(&request);
        debug!(model = %self.config.model, max_tokens = request.max_tokens, "anthropic request");

        let response = timeout(
            self.config.stall_timeout,
            self.client
                .post(self.url())
                .header("x-api-key", &self.config.api_key)
                .header("anthropic-version", API_VERSION)
                .header("content-type", "application/json")
                .header("anthropic-dangerous-direct-browser-access", "true")
                .json(&body)
                .send(),
        )
        .await
        .map_err(|_| ApiError::Stalled(self.config.stall_timeout))??;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(provider_error(ProviderKind::Anthropic, status.as_u16(), &body));
        }

        Ok(spawn_reader(
            response,
            SseFormat::Anthropic,
            self.config.stall_timeout,
        ))
    }

    fn kind(&self) -> ProviderKind {
        ProviderKind::Anthropic
    }
}
