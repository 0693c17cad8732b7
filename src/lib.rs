//! reqsight - AI assistance layer for HTTP request inspection
//!
//! Sends captured request/response text to an LLM provider (Anthropic or
//! Gemini), streams the incremental reply back to the caller, and can
//! cluster a batch of captured requests into attack-surface categories.
//!
//! ## Key pieces
//!
//! - **Provider adapters**: Anthropic and Gemini streaming calls behind one trait
//! - **Stream reader**: chunk-safe SSE line decoding with silent tolerance for partial frames
//! - **Extractor**: best-effort JSON parsing of categorization replies, with field defaults
//! - **Batch orchestration**: redacted prompt building, progress events, cached results

pub mod api;
pub mod cache;
pub mod config;
pub mod extract;
pub mod surface;

pub use api::{
    explain_capture, stream_completion, ApiError, CompletionRequest, ProviderConfig, ProviderKind,
};
pub use cache::CategoryCache;
pub use config::{ConfigError, Settings};
pub use extract::{parse_categories, Category, CategoryRecord, Confidence};
pub use surface::{categorize_requests, AnalysisProgress, CapturedRequest, MAX_BATCH};
