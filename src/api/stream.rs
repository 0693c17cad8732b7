//! Shared streaming read loop and text accumulation
//!
//! Both adapters hand their `reqwest::Response` to [`spawn_reader`], which
//! drains the body chunk by chunk, splits it into lines, and forwards
//! recognized text deltas over an mpsc channel. [`collect_stream`] owns
//! the cumulative string for one call and reports it to the caller's
//! callback after every delta.

use super::sse::{parse_sse_line, LineBuffer, SseFormat};
use super::{client_for, ApiError, CompletionRequest, ProviderConfig};
use futures_util::StreamExt;
use std::time::Duration;
use tokio::sync::mpsc;
use tokio::time::timeout;
use tracing::debug;

/// A chunk of a streaming response.
#[derive(Debug)]
pub enum StreamChunk {
    /// One incremental fragment of generated text.
    Delta(String),
    /// The response body ended normally.
    Done,
    /// The stream failed; terminal for this call.
    Error(ApiError),
}

/// Drain the response body into a channel of [`StreamChunk`]s.
///
/// Every chunk await is bounded by `stall_timeout`; a provider that stops
/// sending surfaces as [`ApiError::Stalled`] instead of hanging the call.
pub(crate) fn spawn_reader(
    response: reqwest::Response,
    format: SseFormat,
    stall_timeout: Duration,
) -> mpsc::Receiver<StreamChunk> {
    let (tx, rx) = mpsc::channel(64);

    tokio::spawn(async move {
        let mut stream = response.bytes_stream();
        let mut lines = LineBuffer::new();

        loop {
            let next = match timeout(stall_timeout, stream.next()).await {
                Err(_) => {
                    let _ = tx
                        .send(StreamChunk::Error(ApiError::Stalled(stall_timeout)))
                        .await;
                    return;
                }
                Ok(None) => break,
                Ok(Some(result)) => result,
            };

            match next {
                Ok(bytes) => {
                    lines.push(&bytes);
                    while let Some(line) = lines.next_line() {
                        for delta in parse_sse_line(&line, format) {
                            if tx.send(StreamChunk::Delta(delta)).await.is_err() {
                                return; // Receiver dropped
                            }
                        }
                    }
                }
                Err(e) => {
                    let _ = tx.send(StreamChunk::Error(e.into())).await;
                    return;
                }
            }
        }

        let _ = tx.send(StreamChunk::Done).await;
    });

    rx
}

/// Accumulate a stream of chunks into the final text.
///
/// `on_update` receives the cumulative text synchronously after every
/// delta, once per delta, in arrival order. The returned string is
/// exactly the ordered concatenation of all deltas.
pub async fn collect_stream(
    mut rx: mpsc::Receiver<StreamChunk>,
    mut on_update: impl FnMut(&str),
) -> Result<String, ApiError> {
    let mut accumulated = String::new();

    while let Some(chunk) = rx.recv().await {
        match chunk {
            StreamChunk::Delta(text) => {
                accumulated.push_str(&text);
                on_update(&accumulated);
            }
            StreamChunk::Done => break,
            StreamChunk::Error(e) => return Err(e),
        }
    }

    Ok(accumulated)
}

/// Run one streaming completion end to end.
///
/// Fails fast with [`ApiError::MissingApiKey`] before any network call
/// when the config has no key.
pub async fn stream_completion(
    config: &ProviderConfig,
    request: CompletionRequest,
    on_update: impl FnMut(&str),
) -> Result<String, ApiError> {
    if config.api_key.is_empty() {
        return Err(ApiError::MissingApiKey(config.provider));
    }

    debug!(provider = %config.provider, model = %config.model, "starting streaming call");
    let client = client_for(config);
    let rx = client.send_streaming(request).await?;
    collect_stream(rx, on_update).await
}
