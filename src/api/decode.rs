//! Decoding of structured model responses.
//!
//! Models are asked for bare JSON but regularly wrap it in a markdown code
//! fence anyway. [`decode_json`] strips one optional fence and then parses.

use once_cell::sync::Lazy;
use regex::Regex;
use serde::de::DeserializeOwned;

use crate::error::DecodeError;
use crate::utils::looks_truncated;

static FENCE_OPEN: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^```[A-Za-z0-9_+-]*[ \t]*(?:\r?\n)?").expect("valid regex"));
static FENCE_CLOSE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?:\r?\n)?[ \t]*```$").expect("valid regex"));

/// Remove a leading ```` ``` ```` (optionally with a language tag) and a
/// trailing ```` ``` ```` from a response. Unfenced text is only trimmed.
pub fn strip_code_fence(text: &str) -> &str {
    let trimmed = text.trim();
    if !trimmed.starts_with("```") {
        return trimmed;
    }
    let body = match FENCE_OPEN.find(trimmed) {
        Some(m) => &trimmed[m.end()..],
        None => trimmed,
    };
    let body = match FENCE_CLOSE.find(body) {
        Some(m) => &body[..m.start()],
        None => body,
    };
    body.trim()
}

/// Strip an optional code fence, then parse the remainder as `T`.
pub fn decode_json<T: DeserializeOwned>(text: &str) -> Result<T, DecodeError> {
    serde_json::from_str(strip_code_fence(text)).map_err(|source| DecodeError {
        truncated: looks_truncated(&source),
        source,
    })
}
