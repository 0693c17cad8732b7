//! Server-Sent Events parsing for streaming provider responses
//!
//! Handles two formats:
//! - Anthropic: `data: {"type":"content_block_delta","delta":{"text":"..."}}`
//! - Gemini: `data: {"candidates":[{"content":{"parts":[{"text":"..."}]}}]}`
//!
//! Payloads are decoded through typed serde structs with defaulted fields,
//! so an event of an unrecognized shape decodes to "no text" and is
//! ignored rather than probed field-by-field. A line that fails to decode
//! at all is skipped silently: a streaming transport may split a JSON
//! object across chunks, and the reader cannot tell "malformed" from
//! "incomplete" at this layer.

use serde::Deserialize;
use tracing::trace;

/// The event format of the provider being streamed.
#[derive(Debug, Clone, Copy)]
pub enum SseFormat {
    Anthropic,
    Gemini,
}

/// Buffers raw response bytes and yields complete lines.
///
/// Splitting happens on the byte buffer, so a multi-byte UTF-8 character
/// that arrives split across two chunks is reassembled before decoding
/// (continuation bytes never equal `\n`).
#[derive(Debug, Default)]
pub struct LineBuffer {
    buf: Vec<u8>,
}

impl LineBuffer {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, chunk: &[u8]) {
        self.buf.extend_from_slice(chunk);
    }

    /// Pop the next complete line, without its terminator.
    pub fn next_line(&mut self) -> Option<String> {
        let pos = self.buf.iter().position(|&b| b == b'\n')?;
        let mut line: Vec<u8> = self.buf.drain(..=pos).collect();
        line.pop();
        if line.last() == Some(&b'\r') {
            line.pop();
        }
        Some(String::from_utf8_lossy(&line).into_owned())
    }
}

/// Extract the text fragments carried by one SSE line, in order.
///
/// Returns an empty vec for anything that is not a recognized text delta:
/// blank lines, comments, `event:` fields, the `[DONE]` sentinel, control
/// events, and undecodable payloads.
pub fn parse_sse_line(line: &str, format: SseFormat) -> Vec<String> {
    let line = line.trim();

    // Skip empty lines, SSE comments, and event-type fields
    if line.is_empty() || line.starts_with(':') || line.starts_with("event:") {
        return Vec::new();
    }

    let Some(payload) = line.strip_prefix("data:").map(str::trim) else {
        return Vec::new();
    };

    if payload.is_empty() || payload == "[DONE]" {
        return Vec::new();
    }

    match format {
        SseFormat::Anthropic => anthropic_deltas(payload),
        SseFormat::Gemini => gemini_deltas(payload),
    }
}

#[derive(Deserialize, Default)]
struct AnthropicEvent {
    #[serde(rename = "type", default)]
    kind: String,
    #[serde(default)]
    delta: AnthropicDelta,
}

#[derive(Deserialize, Default)]
struct AnthropicDelta {
    #[serde(default)]
    text: Option<String>,
}

fn anthropic_deltas(payload: &str) -> Vec<String> {
    let Ok(event) = serde_json::from_str::<AnthropicEvent>(payload) else {
        trace!("skipping undecodable stream line");
        return Vec::new();
    };

    if event.kind == "content_block_delta" {
        if let Some(text) = event.delta.text {
            if !text.is_empty() {
                return vec![text];
            }
        }
    }

    Vec::new()
}

#[derive(Deserialize, Default)]
struct GeminiEvent {
    #[serde(default)]
    candidates: Vec<GeminiCandidate>,
}

#[derive(Deserialize, Default)]
struct GeminiCandidate {
    #[serde(default)]
    content: GeminiContent,
}

#[derive(Deserialize, Default)]
struct GeminiContent {
    #[serde(default)]
    parts: Vec<GeminiPart>,
}

#[derive(Deserialize, Default)]
struct GeminiPart {
    #[serde(default)]
    text: Option<String>,
}

fn gemini_deltas(payload: &str) -> Vec<String> {
    let Ok(event) = serde_json::from_str::<GeminiEvent>(payload) else {
        trace!("skipping undecodable stream line");
        return Vec::new();
    };

    // Only the first candidate is consulted; one line may still carry
    // several text parts, each forwarded as its own delta.
    let Some(candidate) = event.candidates.into_iter().next() else {
        return Vec::new();
    };

    candidate
        .content
        .parts
        .into_iter()
        .filter_map(|part| part.text)
        .filter(|text| !text.is_empty())
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_anthropic_text_delta() {
        let line = r#"data: {"type":"content_block_delta","delta":{"text":"world"}}"#;
        assert_eq!(parse_sse_line(line, SseFormat::Anthropic), vec!["world"]);
    }

    #[test]
    fn test_anthropic_other_event_ignored() {
        let line = r#"data: {"type":"message_start","message":{"id":"msg_1"}}"#;
        assert!(parse_sse_line(line, SseFormat::Anthropic).is_empty());
    }

    #[test]
    fn test_anthropic_event_line_skipped() {
        let line = "event: content_block_delta";
        assert!(parse_sse_line(line, SseFormat::Anthropic).is_empty());
    }

    #[test]
    fn test_gemini_multiple_parts_in_order() {
        let line = r#"data: {"candidates":[{"content":{"parts":[{"text":"Hel"},{"text":"lo"}]}}]}"#;
        assert_eq!(parse_sse_line(line, SseFormat::Gemini), vec!["Hel", "lo"]);
    }

    #[test]
    fn test_gemini_missing_candidates_ignored() {
        let line = r#"data: {"usageMetadata":{"totalTokenCount":42}}"#;
        assert!(parse_sse_line(line, SseFormat::Gemini).is_empty());
    }

    #[test]
    fn test_done_sentinel_skipped() {
        assert!(parse_sse_line("data: [DONE]", SseFormat::Anthropic).is_empty());
        assert!(parse_sse_line("data: [DONE]", SseFormat::Gemini).is_empty());
    }

    #[test]
    fn test_malformed_json_skipped() {
        let line = r#"data: {"type":"content_block_delta","delta":{"te"#;
        assert!(parse_sse_line(line, SseFormat::Anthropic).is_empty());
    }

    #[test]
    fn test_empty_and_comment_lines_skipped() {
        assert!(parse_sse_line("", SseFormat::Anthropic).is_empty());
        assert!(parse_sse_line("  ", SseFormat::Gemini).is_empty());
        assert!(parse_sse_line(": keep-alive", SseFormat::Anthropic).is_empty());
        assert!(parse_sse_line("data:", SseFormat::Anthropic).is_empty());
    }

    #[test]
    fn test_well_formed_line_after_malformed_one() {
        let bad = r#"data: {"type":"content_block_del"#;
        let good = r#"data: {"type":"content_block_delta","delta":{"text":"ok"}}"#;
        assert!(parse_sse_line(bad, SseFormat::Anthropic).is_empty());
        assert_eq!(parse_sse_line(good, SseFormat::Anthropic), vec!["ok"]);
    }

    #[test]
    fn test_line_buffer_partial_lines() {
        let mut lines = LineBuffer::new();
        lines.push(b"data: a");
        assert!(lines.next_line().is_none());
        lines.push(b"bc\ndata: d");
        assert_eq!(lines.next_line().as_deref(), Some("data: abc"));
        assert!(lines.next_line().is_none());
        lines.push(b"\n");
        assert_eq!(lines.next_line().as_deref(), Some("data: d"));
    }

    #[test]
    fn test_line_buffer_strips_crlf() {
        let mut lines = LineBuffer::new();
        lines.push(b"one\r\ntwo\n");
        assert_eq!(lines.next_line().as_deref(), Some("one"));
        assert_eq!(lines.next_line().as_deref(), Some("two"));
    }

    #[test]
    fn test_utf8_split_across_chunks() {
        let line = "data: {\"type\":\"content_block_delta\",\"delta\":{\"text\":\"héllo ☃\"}}\n";
        let bytes = line.as_bytes();

        // Chunking at every byte offset must yield the same deltas as one chunk.
        for split in 0..bytes.len() {
            let mut lines = LineBuffer::new();
            lines.push(&bytes[..split]);
            lines.push(&bytes[split..]);

            let mut deltas = Vec::new();
            while let Some(line) = lines.next_line() {
                deltas.extend(parse_sse_line(&line, SseFormat::Anthropic));
            }
            assert_eq!(deltas, vec!["héllo ☃"], "split at byte {split}");
        }
    }
}
