//! Claim list parsing
//!
//! The understanding capability is asked for a JSON array of strings,
//! optionally inside a single fenced code block. Anything else is rejected.

use crate::types::Claim;
use thiserror::Error;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ListParseError {
    #[error("response is empty")]
    Empty,

    #[error("code fence is not closed")]
    UnclosedFence,

    #[error("response is not a JSON array of strings: {0}")]
    NotAStringArray(String),
}

/// Parse a capability response into trimmed, non-empty claims
pub fn parse_claim_list(response: &str) -> Result<Vec<Claim>, ListParseError> {
    let trimmed = response.trim();
    if trimmed.is_empty() {
        return Err(ListParseError::Empty);
    }

    let body = match trimmed.find("```") {
        Some(open) => fenced_body(&trimmed[open + 3..])?,
        None => trimmed,
    };

    let items: Vec<String> = serde_json::from_str(body)
        .map_err(|e| ListParseError::NotAStringArray(e.to_string()))?;

    Ok(items
        .into_iter()
        .map(|item| item.trim().to_string())
        .filter(|item| !item.is_empty())
        .collect())
}

/// Contents of a fence, given the text just after its opening backticks
fn fenced_body(after_open: &str) -> Result<&str, ListParseError> {
    // Drop the info string (e.g. `json`) on the opening line
    let content = match after_open.find('\n') {
        Some(newline) => &after_open[newline + 1..],
        None => return Err(ListParseError::UnclosedFence),
    };
    let close = content.find("```").ok_or(ListParseError::UnclosedFence)?;
    Ok(content[..close].trim())
}
