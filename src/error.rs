//! Error types for every stage of a digest run.
//!
//! Only [`DigestError`] ever reaches `main`. Feed, provider, and decode
//! failures are absorbed by the stage that produced them and degrade to
//! "no articles from this feed" or a neutral default result.

use std::fmt;
use thiserror::Error;

/// Failure of a single LLM provider round-trip.
#[derive(Error, Debug)]
pub enum ProviderError {
    #[error("{provider} request failed: {source}")]
    Transport {
        provider: String,
        #[source]
        source: reqwest::Error,
    },

    #[error("{provider} API error ({status}): {body}")]
    Status {
        provider: String,
        status: u16,
        body: String,
    },

    #[error("{provider} API returned an error body: {message}")]
    ErrorBody { provider: String, message: String },

    #[error("{provider} returned an undecodable body: {source}")]
    Body {
        provider: String,
        #[source]
        source: serde_json::Error,
    },
}

/// Failure of [`crate::api::AiClient::call`].
#[derive(Error, Debug)]
pub enum AiError {
    #[error(
        "No AI API key configured. Set BAILIAN_API_KEY (or DASHSCOPE_API_KEY), GEMINI_API_KEY, and/or OPENAI_API_KEY."
    )]
    NotConfigured,

    #[error(transparent)]
    Provider(#[from] ProviderError),

    #[error("Failed to build HTTP client: {0}")]
    Client(#[source] reqwest::Error),
}

/// A model response that could not be decoded into the expected JSON shape.
#[derive(Debug)]
pub struct DecodeError {
    pub truncated: bool,
    pub source: serde_json::Error,
}

impl fmt::Display for DecodeError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let hint = if self.truncated { " (looks truncated)" } else { "" };
        write!(f, "Model returned non-conforming JSON{hint}: {}", self.source)
    }
}

impl std::error::Error for DecodeError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        Some(&self.source)
    }
}

/// Failure of a whole LLM batch: either the call itself or its decoding.
#[derive(Error, Debug)]
pub enum BatchError {
    #[error(transparent)]
    Ai(#[from] AiError),

    #[error(transparent)]
    Decode(#[from] DecodeError),
}

/// Failure to retrieve or parse one feed.
#[derive(Error, Debug)]
pub enum FeedError {
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("timeout after {0}s")]
    Timeout(u64),

    #[error("HTTP {0}")]
    Status(u16),

    #[error("XML error: {0}")]
    Xml(#[from] quick_xml::Error),
}

/// Conditions that abort a digest run.
#[derive(Error, Debug)]
pub enum DigestError {
    #[error(
        "Missing API key. Set BAILIAN_API_KEY (recommended), GEMINI_API_KEY, or OPENAI_API_KEY."
    )]
    MissingApiKey,

    #[error("No articles fetched from any feed. Check network connection.")]
    NoArticles,

    #[error("No articles found within the last {0} hours. Try increasing --hours (e.g. --hours 168).")]
    NoRecentArticles(u32),

    #[error("AI client error: {0}")]
    Ai(#[from] AiError),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Feed list error: {0}")]
    FeedList(#[from] serde_yaml::Error),

    #[error("Failed to build HTTP client: {0}")]
    Http(#[from] reqwest::Error),
}

pub type Result<T> = std::result::Result<T, DigestError>;
