//! Provider abstraction layer for streaming LLM calls
//!
//! Two vendors are supported: Anthropic (messages API) and Google Gemini
//! (streamGenerateContent). Both stream `data: <json>` lines; the shared
//! reader lives in [`stream`] and the per-line decoding in [`sse`].

mod anthropic;
mod gemini;
pub mod sse;
pub mod stream;

pub use anthropic::AnthropicClient;
pub use gemini::GeminiClient;
pub use sse::{parse_sse_line, LineBuffer, SseFormat};
pub use stream::{collect_stream, stream_completion, StreamChunk};

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::time::Duration;
use thiserror::Error;
use tokio::sync::mpsc;

/// How long a call may sit with no bytes from the provider before it is
/// aborted. Applies to the initial response headers and to every
/// subsequent body chunk.
pub const DEFAULT_STALL_TIMEOUT: Duration = Duration::from_secs(120);

#[derive(Error, Debug)]
pub enum ApiError {
    #[error("no API key configured for {0}")]
    MissingApiKey(ProviderKind),

    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("{provider} API error ({status}): {message}")]
    Provider {
        provider: ProviderKind,
        status: u16,
        message: String,
    },

    #[error("stream stalled: no data within {0:?}")]
    Stalled(Duration),

    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ProviderKind {
    Anthropic,
    Gemini,
}

impl fmt::Display for ProviderKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Anthropic => write!(f, "anthropic"),
            Self::Gemini => write!(f, "gemini"),
        }
    }
}

/// Resolved configuration for one provider call.
///
/// Loaded once from [`crate::config::Settings`] and threaded explicitly
/// through every call; adapters never consult persisted settings
/// themselves.
#[derive(Debug, Clone)]
pub struct ProviderConfig {
    pub provider: ProviderKind,
    pub api_key: String,
    pub model: String,
    /// Origin override for tests and self-hosted gateways.
    pub base_url: Option<String>,
    pub stall_timeout: Duration,
}

impl ProviderConfig {
    pub fn new(
        provider: ProviderKind,
        api_key: impl Into<String>,
        model: impl Into<String>,
    ) -> Self {
        Self {
            provider,
            api_key: api_key.into(),
            model: model.into(),
            base_url: None,
            stall_timeout: DEFAULT_STALL_TIMEOUT,
        }
    }

    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = Some(base_url.into());
        self
    }

    pub fn with_stall_timeout(mut self, timeout: Duration) -> Self {
        self.stall_timeout = timeout;
        self
    }
}

/// One streaming completion to send to a provider.
#[derive(Debug, Clone)]
pub struct CompletionRequest {
    pub system: Option<String>,
    pub prompt: String,
    pub max_tokens: u32,
}

impl CompletionRequest {
    pub fn new(prompt: impl Into<String>) -> Self {
        Self {
            system: None,
            prompt: prompt.into(),
            max_tokens: 2048,
        }
    }

    pub fn with_system(mut self, system: impl Into<String>) -> Self {
        self.system = Some(system.into());
        self
    }

    pub fn with_max_tokens(mut self, max_tokens: u32) -> Self {
        self.max_tokens = max_tokens;
        self
    }
}

/// Trait for providers that stream generated text.
#[async_trait]
pub trait StreamingProvider: Send + Sync {
    /// Send a request and return a channel of stream chunks. The receiver
    /// yields `Delta` chunks as they arrive, followed by a single `Done`
    /// (or `Error`) chunk.
    async fn send_streaming(
        &self,
        request: CompletionRequest,
    ) -> Result<mpsc::Receiver<StreamChunk>, ApiError>;

    fn kind(&self) -> ProviderKind;
}

/// Build the adapter matching the configured provider.
pub fn client_for(config: &ProviderConfig) -> Box<dyn StreamingProvider> {
    match config.provider {
        ProviderKind::Anthropic => Box::new(AnthropicClient::new(config.clone())),
        ProviderKind::Gemini => Box::new(GeminiClient::new(config.clone())),
    }
}

/// Preamble prepended to raw capture text on the plain explanation path.
pub const EXPLAIN_PREAMBLE: &str = "You are helping a security tester understand captured HTTP \
traffic. Explain what the following request does, what the response indicates, and point out \
anything notable for further testing.\n\n";

/// Stream an explanation of one captured request/response, invoking
/// `on_update` with the cumulative text after every delta.
pub async fn explain_capture(
    config: &ProviderConfig,
    raw: &str,
    on_update: impl FnMut(&str),
) -> Result<String, ApiError> {
    let request = CompletionRequest::new(format!("{EXPLAIN_PREAMBLE}{raw}"));
    stream_completion(config, request, on_update).await
}

/// Turn a non-2xx response body into an [`ApiError::Provider`].
///
/// Both vendors wrap failures as `{"error": {"message": ...}}`; anything
/// else falls back to a generic message.
pub(crate) fn provider_error(provider: ProviderKind, status: u16, body: &str) -> ApiError {
    #[derive(Deserialize, Default)]
    struct Envelope {
        #[serde(default)]
        error: Detail,
    }

    #[derive(Deserialize, Default)]
    struct Detail {
        #[serde(default)]
        message: String,
    }

    let message = serde_json::from_str::<Envelope>(body)
        .ok()
        .map(|envelope| envelope.error.message)
        .filter(|message| !message.is_empty())
        .unwrap_or_else(|| "request failed".to_string());

    ApiError::Provider {
        provider,
        status,
        message,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn provider_error_extracts_vendor_message() {
        let body = r#"{"type":"error","error":{"type":"authentication_error","message":"invalid x-api-key"}}"#;
        let err = provider_error(ProviderKind::Anthropic, 401, body);
        match err {
            ApiError::Provider {
                status, message, ..
            } => {
                assert_eq!(status, 401);
                assert_eq!(message, "invalid x-api-key");
            }
            other => panic!("expected Provider error, got {:?}", other),
        }
    }

    #[test]
    fn provider_error_falls_back_on_unparseable_body() {
        let err = provider_error(ProviderKind::Gemini, 500, "<html>oops</html>");
        assert!(err.to_string().contains("request failed"));
        assert!(err.to_string().contains("500"));
    }

    #[test]
    fn completion_request_defaults() {
        let request = CompletionRequest::new("hi");
        assert_eq!(request.max_tokens, 2048);
        assert!(request.system.is_none());

        let request = request.with_system("sys").with_max_tokens(4096);
        assert_eq!(request.system.as_deref(), Some("sys"));
        assert_eq!(request.max_tokens, 4096);
    }
}
