//! Google Gemini streamGenerateContent adapter
//!
//! The key travels as a query parameter rather than a header, so it is
//! visible to anything that logs request URLs. Gemini has no distinct
//! system role in this integration; the system prompt is concatenated
//! ahead of the user prompt with a blank-line separator.

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

const DEFAULT_BASE_URL: &str = "https://generativelanguage.googleapis.com";

pub struct GeminiClient {
    config: ProviderConfig,
    client: Client,
}

impl GeminiClient {
    pub fn new(config: ProviderConfig) -> Self {
        Self {
            config,
            client: Client::new(),
        }
    }

    fn url(&self) -> String {
        let base = self.config.base_url.as_deref().unwrap_or(DEFAULT_BASE_URL);
        format!(
            "{base}/v1beta/models/{model}:streamGenerateContent?alt=sse&key={key}",
            model = self.config.model,
            key = self.config.api_key,
        )
    }

    fn build_body(&self, request: &CompletionRequest) -> Value {
        let combined = match &request.system {
            Some(system) => format!("{system}\n\n{}", request.prompt),
            None => request.prompt.clone(),
        };

        json!({
            "contents": [{
                "parts": [{ "text": combined }],
            }],
            "generationConfig": {
                "temperature": 0.7,
                "maxOutputTokens": request.max_tokens,
            },
        })
    }
}

#[async_trait]
impl StreamingProvider for GeminiClient {
    async fn send_streaming(
        &self,
        request: CompletionRequest,
    ) -> Result<mpsc::Receiver<StreamChunk>, ApiError> {
        let body = self.build_body(&request);
        debug!(model = %self.config.model, max_tokens = request.max_tokens, "gemini request");

        let response = timeout(
            self.config.stall_timeout,
            self.client.post(self.url()).json(&body).send(),
        )
        .await
        .map_err(|_| ApiError::Stalled(self.config.stall_timeout))??;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(provider_error(ProviderKind::Gemini, status.as_u16(), &body));
        }

        Ok(spawn_reader(
            response,
            SseFormat::Gemini,
            self.config.stall_timeout,
        ))
    }

    fn kind(&self) -> ProviderKind {
        ProviderKind::Gemini
    }
}
