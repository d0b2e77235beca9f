//! Feed retrieval.
//!
//! Feeds are fetched in batches of `concurrency`; every feed in a batch is
//! requested at once and the whole batch settles before the next starts.
//! Each request runs under its own timeout, and the request future is
//! dropped (cancelled) when the timeout fires.

use futures::future::join_all;
use reqwest::Client;
use reqwest::header::ACCEPT;
use std::time::Duration;
use tracing::{debug, info, instrument, warn};

use super::Feed;
use super::parse::parse_items;
use crate::error::FeedError;
use crate::models::Article;

pub const USER_AGENT: &str = "AI-Daily-Digest/1.0 (RSS Reader)";
pub const ACCEPT_FEEDS: &str =
    "application/rss+xml, application/atom+xml, application/xml, text/xml, */*";

/// Everything fetched in one pass over the feed list.
#[derive(Debug, Default)]
pub struct FetchReport {
    /// Articles from every feed, in feed order.
    pub articles: Vec<Article>,
    /// Feeds that yielded at least one article.
    pub ok_feeds: usize,
    /// Feeds that failed or yielded nothing.
    pub failed_feeds: usize,
}

/// Fetches feeds with bounded concurrency and per-feed timeouts.
#[derive(Debug, Clone)]
pub struct FeedFetcher {
    http: Client,
    timeout: Duration,
    concurrency: usize,
}

impl FeedFetcher {
    pub fn new(timeout: Duration, concurrency: usize) -> Result<Self, reqwest::Error> {
        let http = Client::builder().user_agent(USER_AGENT).build()?;
        Ok(Self {
            http,
            timeout,
            concurrency: concurrency.max(1),
        })
    }

    /// Fetch and parse a single feed.
    ///
    /// # Errors
    ///
    /// [`FeedError::Timeout`] when the whole request (including reading the
    /// body) outlives the timeout, otherwise the transport, status, or XML
    /// failure.
    #[instrument(level = "debug", skip_all, fields(feed = %feed.name))]
    pub async fn fetch_feed(&self, feed: &Feed) -> Result<Vec<Article>, FeedError> {
        let request = async {
            let response = self
                .http
                .get(&feed.xml_url)
                .header(ACCEPT, ACCEPT_FEEDS)
                .send()
                .await?;
            let status = response.status();
            if !status.is_success() {
                return Err(FeedError::Status(status.as_u16()));
            }
            let body = response.text().await?;
            parse_items(&body)
        };

        let items = tokio::time::timeout(self.timeout, request)
            .await
            .map_err(|_| FeedError::Timeout(self.timeout.as_secs()))??;

        debug!(count = items.len(), "Parsed feed");
        Ok(items.into_iter().map(|item| item.into_article(feed)).collect())
    }

    /// Fetch every feed, degrading failures to zero articles.
    #[instrument(level = "info", skip_all, fields(feeds = feeds.len(), concurrency = self.concurrency))]
    pub async fn fetch_all(&self, feeds: &[Feed]) -> FetchReport {
        let mut report = FetchReport::default();

        for (batch_no, batch) in feeds.chunks(self.concurrency).enumerate() {
            let results = join_all(batch.iter().map(|feed| self.fetch_feed(feed))).await;

            for (feed, result) in batch.iter().zip(results) {
                match result {
                    Ok(articles) if !articles.is_empty() => {
                        report.ok_feeds += 1;
                        report.articles.extend(articles);
                    }
                    Ok(_) => {
                        warn!(feed = %feed.name, "Feed produced no articles");
                        report.failed_feeds += 1;
                    }
                    Err(e) => {
                        warn!(feed = %feed.name, error = %e, "Feed fetch failed");
                        report.failed_feeds += 1;
                    }
                }
            }

            let progress = (batch_no * self.concurrency + batch.len()).min(feeds.len());
            info!(
                progress,
                total = feeds.len(),
                ok = report.ok_feeds,
                failed = report.failed_feeds,
                "Feed progress"
            );
        }

        info!(
            articles = report.articles.len(),
            ok = report.ok_feeds,
            failed = report.failed_feeds,
            "Fetched feeds"
        );
        report
    }
}
