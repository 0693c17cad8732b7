//! Best-effort extraction of structured categories from LLM replies
//!
//! Models asked for "JSON only" still wrap the array in a markdown fence
//! often enough that stripping one is part of the contract. Anything that
//! fails to parse degrades to an empty result set; the caller sees zero
//! categorized requests, never an error.

use serde::{Deserialize, Serialize};
use tracing::warn;

pub const DEFAULT_CATEGORY: &str = "Uncategorized";
pub const DEFAULT_REASONING: &str = "No reasoning provided";
pub const DEFAULT_ICON: &str = "❓";

/// Model-reported confidence in a classification.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Confidence {
    High,
    Medium,
    #[default]
    Low,
}

impl Confidence {
    /// Tolerant mapping from whatever string the model produced.
    fn parse(value: Option<&str>) -> Self {
        match value.map(str::trim) {
            Some(v) if v.eq_ignore_ascii_case("high") => Self::High,
            Some(v) if v.eq_ignore_ascii_case("medium") => Self::Medium,
            _ => Self::Low,
        }
    }
}

/// Classification of one captured request, minus its index.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Category {
    pub category: String,
    pub confidence: Confidence,
    pub reasoning: String,
    pub icon: String,
}

/// One element of a categorization reply.
///
/// The index is passed through unvalidated; it may point outside the
/// original batch and the extractor does not cross-check it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CategoryRecord {
    pub index: usize,
    pub details: Category,
}

#[derive(Deserialize)]
struct RawCategory {
    #[serde(default)]
    index: usize,
    #[serde(default)]
    category: Option<String>,
    #[serde(default)]
    confidence: Option<String>,
    #[serde(default)]
    reasoning: Option<String>,
    #[serde(default)]
    icon: Option<String>,
}

impl From<RawCategory> for CategoryRecord {
    fn from(raw: RawCategory) -> Self {
        Self {
            index: raw.index,
            details: Category {
                category: raw
                    .category
                    .unwrap_or_else(|| DEFAULT_CATEGORY.to_string()),
                confidence: Confidence::parse(raw.confidence.as_deref()),
                reasoning: raw
                    .reasoning
                    .unwrap_or_else(|| DEFAULT_REASONING.to_string()),
                icon: raw.icon.unwrap_or_else(|| DEFAULT_ICON.to_string()),
            },
        }
    }
}

/// Remove one optional wrapping markdown code fence, with or without a
/// `json` language tag.
pub fn strip_code_fence(text: &str) -> &str {
    let trimmed = text.trim();

    if let Some(inner) = trimmed
        .strip_prefix("```json")
        .or_else(|| trimmed.strip_prefix("```"))
    {
        if let Some(inner) = inner.strip_suffix("```") {
            return inner.trim();
        }
    }

    trimmed
}

/// Parse a categorization reply into records, defaulting missing fields.
///
/// Non-JSON input, or JSON that is not an array, yields an empty vec.
pub fn parse_categories(text: &str) -> Vec<CategoryRecord> {
    let payload = strip_code_fence(text);

    let raw: Vec<RawCategory> = match serde_json::from_str(payload) {
        Ok(raw) => raw,
        Err(e) => {
            warn!("categorization reply was not a JSON array: {e}");
            return Vec::new();
        }
    };

    raw.into_iter().map(CategoryRecord::from).collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn missing_fields_get_defaults() {
        let records = parse_categories(r#"[{"index":0,"category":"Auth"}]"#);
        assert_eq!(records.len(), 1);
        assert_eq!(records[0].index, 0);
        assert_eq!(records[0].details.category, "Auth");
        assert_eq!(records[0].details.confidence, Confidence::Low);
        assert_eq!(records[0].details.reasoning, "No reasoning provided");
        assert_eq!(records[0].details.icon, "❓");
    }

    #[test]
    fn fenced_input_parses_same_as_unfenced() {
        let plain = r#"[{"index":1,"category":"API","confidence":"high","reasoning":"REST endpoints","icon":"🔌"}]"#;
        let fenced = format!("```json\n{plain}\n```");
        let bare_fence = format!("```\n{plain}\n```");

        let expected = parse_categories(plain);
        assert_eq!(expected.len(), 1);
        assert_eq!(parse_categories(&fenced), expected);
        assert_eq!(parse_categories(&bare_fence), expected);
    }

    #[test]
    fn non_json_input_yields_empty_vec() {
        assert!(parse_categories("I could not categorize these requests.").is_empty());
        assert!(parse_categories("").is_empty());
    }

    #[test]
    fn non_array_json_yields_empty_vec() {
        assert!(parse_categories(r#"{"index":0,"category":"Auth"}"#).is_empty());
    }

    #[test]
    fn unknown_confidence_maps_to_low() {
        let records =
            parse_categories(r#"[{"index":2,"category":"Auth","confidence":"certain"}]"#);
        assert_eq!(records[0].details.confidence, Confidence::Low);

        let records = parse_categories(r#"[{"index":2,"category":"Auth","confidence":"HIGH"}]"#);
        assert_eq!(records[0].details.confidence, Confidence::High);
    }

    #[test]
    fn index_passes_through_unvalidated() {
        // 999 is far outside any real batch; the extractor does not care.
        let records = parse_categories(r#"[{"index":999,"category":"Files"}]"#);
        assert_eq!(records[0].index, 999);
    }

    #[test]
    fn unclosed_fence_is_left_alone() {
        assert_eq!(strip_code_fence("```json\n[1,2]"), "```json\n[1,2]");
        assert_eq!(strip_code_fence("  [1,2]  "), "[1,2]");
    }
}
