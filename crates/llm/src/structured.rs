//! Lenient extraction of JSON objects from model output.
//!
//! Models asked for JSON still wrap it in markdown fences or add a sentence
//! before it. [`parse_json`] accepts the object wherever it sits.

use prosearch_core::{AppError, AppResult};
use serde::de::DeserializeOwned;

/// Parse the first JSON object found in `raw` into `T`.
pub fn parse_json<T: DeserializeOwned>(raw: &str) -> AppResult<T> {
    let trimmed = strip_fences(raw.trim());

    if let Ok(value) = serde_json::from_str::<T>(trimmed) {
        return Ok(value);
    }

    let start = trimmed.find('{');
    let end = trimmed.rfind('}');
    match (start, end) {
        (Some(start), Some(end)) if start < end => serde_json::from_str(&trimmed[start..=end])
            .map_err(|e| AppError::Llm(format!("Malformed structured output: {}", e))),
        _ => Err(AppError::Llm(format!(
            "No JSON object in model output: {}",
            preview(raw)
        ))),
    }
}

fn strip_fences(text: &str) -> &str {
    let Some(rest) = text.strip_prefix("```") else {
        return text;
    };
    // Drop the info string ("json") on the opening fence.
    let body = rest.split_once('\n').map(|(_, body)| body).unwrap_or(rest);
    body.trim_end().trim_end_matches("```").trim()
}

fn preview(text: &str) -> String {
    let mut out: String = text.chars().take(80).collect();
    if text.chars().count() > 80 {
        out.push_str("...");
    }
    out
}
