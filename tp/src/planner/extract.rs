//! Locate the JSON payload inside model text
//!
//! Models wrap JSON in markdown fences or surround it with prose. The payload
//! is the first ```json fenced block when present, otherwise the outermost
//! `{..}` or `[..]` slice. Nothing is repaired: a truncated payload stays
//! truncated and fails to parse.

use tracing::debug;

use super::error::OutputError;

/// Return the JSON slice of `text`
pub fn extract_json(text: &str) -> Result<&str, OutputError> {
    debug!(len = text.len(), "extract_json: called");
    let text = text.trim();
    if text.is_empty() {
        return Err(OutputError::Empty);
    }

    if let Some(fenced) = fenced_block(text) {
        debug!("extract_json: using fenced block");
        return if fenced.is_empty() { Err(OutputError::Empty) } else { Ok(fenced) };
    }

    let object = outer_slice(text, '{', '}');
    let array = outer_slice(text, '[', ']');
    let chosen = match (object, array) {
        (Some(o), Some(a)) => {
            // whichever opens first is the outer container
            if a.0 < o.0 { a } else { o }
        }
        (Some(o), None) => o,
        (None, Some(a)) => a,
        (None, None) => return Err(OutputError::NoJson),
    };
    Ok(&text[chosen.0..=chosen.1])
}

fn fenced_block(text: &str) -> Option<&str> {
    let start = text.find("```json").map(|i| i + "```json".len()).or_else(|| {
        let i = text.find("```")?;
        let rest = &text[i + 3..];
        // bare fence only counts when the payload starts right away
        let trimmed = rest.trim_start();
        if trimmed.starts_with('{') || trimmed.starts_with('[') {
            Some(i + 3)
        } else {
            None
        }
    })?;
    let rest = &text[start..];
    let end = rest.find("```").unwrap_or(rest.len());
    Some(rest[..end].trim())
}

fn outer_slice(text: &str, open: char, close: char) -> Option<(usize, usize)> {
    let start = text.find(open)?;
    let end = text.rfind(close)?;
    if end > start { Some((start, end)) } else { None }
}
