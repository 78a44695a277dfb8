//! Decoding of JSON-mode model replies.

use cartmatch_core::{Error, Result};
use serde::de::DeserializeOwned;

/// Drop a surrounding Markdown code fence (```json ... ```), if any.
pub(crate) fn strip_code_fences(raw: &str) -> &str {
    let s = raw.trim();
    let Some(rest) = s.strip_prefix("```") else {
        return s;
    };
    // Skip the info string (e.g. `json`) on the opening line.
    let body = match rest.find('\n') {
        Some(i) => &rest[i + 1..],
        None => rest,
    };
    body.trim_end().strip_suffix("```").unwrap_or(body).trim()
}

pub(crate) fn parse_json_reply<T: DeserializeOwned>(what: &str, raw: &str) -> Result<T> {
    let body = strip_code_fences(raw);
    if body.is_empty() {
        return Err(Error::ModelOutput(format!("{what}: empty reply")));
    }
    serde_json::from_str(body).map_err(|e| Error::ModelOutput(format!("{what}: {e}")))
}
