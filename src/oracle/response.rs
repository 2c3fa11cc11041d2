//! Parsing of the model's JSON answers
//!
//! Models often wrap JSON in a markdown code fence, so fences are stripped
//! before parsing. Anything that still fails to parse is `Malformed`.

use super::{ContentAnalysis, LinkScore, OracleError};
use serde::Deserialize;

#[derive(Debug, Deserialize)]
struct ScoreEnvelope {
    #[serde(alias = "prioritized_urls")]
    results: Vec<RawLinkScore>,
}

#[derive(Debug, Deserialize)]
struct RawLinkScore {
    url: String,

    #[serde(alias = "priorityScore")]
    priority_score: f64,

    #[serde(default, alias = "purposeTag", alias = "expected_content_type")]
    purpose_tag: Option<String>,
}

#[derive(Debug, Deserialize)]
struct RawAnalysis {
    #[serde(default)]
    categories: Vec<String>,

    #[serde(default, alias = "response")]
    summary: Option<String>,
}

/// Removes a surrounding ```json ... ``` fence, if any
fn strip_code_fence(content: &str) -> &str {
    let trimmed = content.trim();
    let Some(rest) = trimmed.strip_prefix("```") else {
        return trimmed;
    };

    // Drop the info string ("json") on the opening line
    let body = match rest.find('\n') {
        Some(idx) => &rest[idx + 1..],
        None => rest,
    };

    body.trim_end().trim_end_matches("```").trim()
}

/// Parses a link scoring answer
pub fn parse_scores(content: &str) -> Result<Vec<LinkScore>, OracleError> {
    let envelope: ScoreEnvelope = serde_json::from_str(strip_code_fence(content))
        .map_err(|e| OracleError::Malformed(e.to_string()))?;

    Ok(envelope
        .results
        .into_iter()
        .map(|raw| {
            let score = if raw.priority_score.is_finite() {
                raw.priority_score.round() as i64
            } else {
                0
            };
            let tag = raw.purpose_tag.filter(|t| !t.trim().is_empty());
            LinkScore::new(raw.url.trim(), score, tag)
        })
        .collect())
}

/// Parses a content analysis answer
pub fn parse_analysis(content: &str) -> Result<ContentAnalysis, OracleError> {
    let raw: RawAnalysis = serde_json::from_str(strip_code_fence(content))
        .map_err(|e| OracleError::Malformed(e.to_string()))?;

    Ok(ContentAnalysis {
        categories: raw
            .categories
            .into_iter()
            .map(|c| c.trim().to_string())
            .filter(|c| !c.is_empty())
            .collect(),
        summary: raw
            .summary
            .map(|s| s.trim().to_string())
            .filter(|s| !s.is_empty()),
    })
}
