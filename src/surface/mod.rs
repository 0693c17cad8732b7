//! Attack-surface categorization over a batch of captured requests
//!
//! Builds one redacted prompt summarizing up to [`MAX_BATCH`] requests,
//! runs a single categorization call, and parses the reply into a map
//! from request index to [`Category`]. Sensitive header values never
//! enter the prompt; only header *names* do, and even those pass a
//! deny-list first.

use crate::api::{stream_completion, ApiError, CompletionRequest, ProviderConfig};
use crate::extract::{parse_categories, Category};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use tracing::{debug, info, warn};
use url::form_urlencoded;

/// Cost-control cap: requests beyond this are dropped, not queued.
pub const MAX_BATCH: usize = 50;

/// Header names whose presence is fine to mention but whose values are
/// secrets. Matched case-insensitively; the names themselves are also
/// withheld from the prompt.
const REDACTED_HEADERS: [&str; 3] = ["cookie", "authorization", "x-api-key"];

const CATEGORIZATION_SYSTEM_PROMPT: &str = "You are an application security analyst. Group \
captured HTTP requests into attack surface categories such as authentication, file handling, \
admin functionality, or API endpoints. Respond with a JSON array only, one element per request, \
each shaped as {\"index\": <request number>, \"category\": \"<short name>\", \"confidence\": \
\"high|medium|low\", \"reasoning\": \"<one sentence>\", \"icon\": \"<single emoji>\"}.";

/// One captured HTTP request as recorded by the inspection tool.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CapturedRequest {
    pub method: String,
    pub url: String,
    #[serde(default)]
    pub headers: Vec<(String, String)>,
}

/// Lifecycle events emitted while a categorization analysis runs.
#[derive(Debug, Clone)]
pub enum AnalysisProgress {
    BuildingPrompt,
    Analyzing,
    /// Live cumulative reply text, one event per delta.
    Streaming { text: String },
    Parsing,
    Complete { categories: HashMap<usize, Category> },
}

/// Categorize a batch of captured requests into attack-surface groups.
///
/// Fails fast before any network call when no API key is configured.
/// Only the first [`MAX_BATCH`] requests are analyzed; the rest are
/// ignored. Returns a map from request index to its classification.
pub async fn categorize_requests(
    config: &ProviderConfig,
    requests: &[CapturedRequest],
    mut progress: impl FnMut(AnalysisProgress),
) -> Result<HashMap<usize, Category>, ApiError> {
    if config.api_key.is_empty() {
        return Err(ApiError::MissingApiKey(config.provider));
    }

    let batch = &requests[..requests.len().min(MAX_BATCH)];
    if batch.len() < requests.len() {
        warn!(
            analyzed = batch.len(),
            dropped = requests.len() - batch.len(),
            "capping categorization batch"
        );
    }

    progress(AnalysisProgress::BuildingPrompt);
    let prompt = build_categorization_prompt(batch);
    debug!(requests = batch.len(), prompt_bytes = prompt.len(), "categorization prompt built");

    progress(AnalysisProgress::Analyzing);
    let request = CompletionRequest::new(prompt)
        .with_system(CATEGORIZATION_SYSTEM_PROMPT)
        .with_max_tokens(4096);

    let reply = stream_completion(config, request, |cumulative| {
        progress(AnalysisProgress::Streaming {
            text: cumulative.to_string(),
        });
    })
    .await?;

    progress(AnalysisProgress::Parsing);
    let mut categories = HashMap::new();
    for record in parse_categories(&reply) {
        categories.insert(record.index, record.details);
    }
    info!(categorized = categories.len(), "categorization complete");

    progress(AnalysisProgress::Complete {
        categories: categories.clone(),
    });
    Ok(categories)
}

fn build_categorization_prompt(batch: &[CapturedRequest]) -> String {
    let mut prompt = String::from(
        "Categorize the following captured HTTP requests by attack surface.\n\n",
    );
    for (index, request) in batch.iter().enumerate() {
        prompt.push_str(&summarize_request(index, request));
    }
    prompt
}

/// Redacted one-request summary: method, path without its query string,
/// distinct query-parameter names, and non-sensitive header names.
fn summarize_request(index: usize, request: &CapturedRequest) -> String {
    let (path, query) = match request.url.split_once('?') {
        Some((path, query)) => (path, Some(query)),
        None => (request.url.as_str(), None),
    };

    let mut params: Vec<String> = Vec::new();
    if let Some(query) = query {
        for (name, _) in form_urlencoded::parse(query.as_bytes()) {
            let name = name.into_owned();
            if !name.is_empty() && !params.contains(&name) {
                params.push(name);
            }
        }
    }

    let headers: Vec<&str> = request
        .headers
        .iter()
        .map(|(name, _)| name.as_str())
        .filter(|name| !REDACTED_HEADERS.contains(&name.to_ascii_lowercase().as_str()))
        .collect();

    format!(
        "[{index}] {method} {path}\n    query params: {params}\n    headers: {headers}\n",
        method = request.method,
        params = if params.is_empty() {
            "none".to_string()
        } else {
            params.join(", ")
        },
        headers = if headers.is_empty() {
            "none".to_string()
        } else {
            headers.join(", ")
        },
    )
}
