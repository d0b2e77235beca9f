//! Feed sources, retrieval, and parsing.
//!
//! Each run follows a two-phase pattern:
//!
//! 1. **Fetching** ([`fetch`]): download every feed document in bounded
//!    concurrent batches, each request under its own timeout
//! 2. **Parsing** ([`parse`]): turn RSS or Atom XML into [`Article`]s
//!
//! A feed that times out, errors, or parses to nothing contributes zero
//! articles and is counted as failed; it never aborts the run.
//!
//! # Feed List
//!
//! The built-in list is embedded from `default_feeds.yaml`. A replacement
//! list in the same format can be supplied with `--feeds`:
//!
//! ```yaml
//! - name: simonwillison.net
//!   xml_url: https://simonwillison.net/atom/everything/
//!   html_url: https://simonwillison.net
//! ```
//!
//! `html_url` may be omitted, in which case the origin of `xml_url` is used.
//!
//! [`Article`]: crate::models::Article

pub mod fetch;
pub mod parse;

use serde::{Deserialize, Serialize};
use std::path::Path;
use tracing::{info, instrument};
use url::Url;

use crate::error::Result;

const DEFAULT_FEEDS: &str = include_str!("default_feeds.yaml");

/// A syndication source.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Feed {
    /// Display name, usually the site's domain.
    pub name: String,
    /// The RSS/Atom document URL.
    pub xml_url: String,
    /// The site's homepage.
    #[serde(default)]
    pub html_url: String,
}

impl Feed {
    /// The homepage, falling back to the origin of the feed URL.
    pub fn homepage(&self) -> String {
        if !self.html_url.is_empty() {
            return self.html_url.clone();
        }
        Url::parse(&self.xml_url)
            .ok()
            .map(|u| u.origin().ascii_serialization())
            .filter(|origin| origin != "null")
            .unwrap_or_else(|| self.xml_url.clone())
    }
}

/// Parse a YAML feed list.
pub fn parse_feed_list(yaml: &str) -> Result<Vec<Feed>> {
    let feeds: Vec<Feed> = serde_yaml::from_str(yaml)?;
    Ok(feeds
        .into_iter()
        .map(|mut feed| {
            feed.html_url = feed.homepage();
            feed
        })
        .collect())
}

/// The built-in feed list.
pub fn default_feeds() -> Result<Vec<Feed>> {
    parse_feed_list(DEFAULT_FEEDS)
}

/// Load the feed list from `path`, or the built-in list when `path` is `None`.
#[instrument(level = "info", skip_all)]
pub async fn load_feeds(path: Option<&Path>) -> Result<Vec<Feed>> {
    let feeds = match path {
        Some(path) => {
            let yaml = tokio::fs::read_to_string(path).await?;
            let feeds = parse_feed_list(&yaml)?;
            info!(path = %path.display(), count = feeds.len(), "Loaded feed list");
            feeds
        }
        None => default_feeds()?,
    };
    Ok(feeds)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_feeds_parse() {
        let feeds = default_feeds().unwrap();
        assert_eq!(feeds.len(), 92);
        assert_eq!(feeds[0].name, "simonwillison.net");
        assert!(feeds.iter().all(|f| f.xml_url.starts_with("http")));
        assert!(feeds.iter().all(|f| !f.html_url.is_empty()));
    }

    #[test]
    fn test_missing_homepage_uses_feed_origin() {
        let feeds = parse_feed_list(
            "- name: example\n  xml_url: https://blog.example.com/feed.xml\n",
        )
        .unwrap();
        assert_eq!(feeds[0].html_url, "https://blog.example.com");
    }

    #[test]
    fn test_bad_feed_list_is_an_error() {
        assert!(parse_feed_list("- name: [unterminated").is_err());
        assert!(parse_feed_list("- xml_url: https://example.com/rss\n").is_err());
    }

    #[tokio::test]
    async fn test_load_feeds_from_file() {
        let path = std::env::temp_dir().join(format!("tech_digest_feeds_{}.yaml", std::process::id()));
        tokio::fs::write(
            &path,
            "- name: one\n  xml_url: https://one.example/rss\n  html_url: https://one.example\n",
        )
        .await
        .unwrap();
        let feeds = load_feeds(Some(&path)).await.unwrap();
        assert_eq!(feeds.len(), 1);
        assert_eq!(feeds[0].name, "one");
        let _ = tokio::fs::remove_file(&path).await;
    }
}
