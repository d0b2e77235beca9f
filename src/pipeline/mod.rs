//! Batched, concurrency-limited LLM processing of articles.
//!
//! Scoring and summarization share one shape, captured by [`BatchTask`] and
//! driven by [`run_batched`]:
//!
//! 1. Articles are tagged with their position in the input slice (the
//!    correlation key echoed back by the model) and split into batches of
//!    `batch_size`.
//! 2. Batches run in waves of at most `max_concurrent`; a wave fully
//!    settles before the next one starts, so no more than `max_concurrent`
//!    requests are ever in flight.
//! 3. Each batch is one prompt and one [`AiClient::call`]. The reply is
//!    decoded as `{"results": [...]}`, tolerating a markdown code fence.
//! 4. A batch whose call or decoding fails gets the task's neutral result
//!    for every article. An article a decoded reply left out gets the
//!    task's missing result. Results for indices outside the batch are
//!    ignored.
//!
//! The output holds exactly one entry per input index.

pub mod highlights;
pub mod lenient;
pub mod rank;
pub mod scoring;
pub mod summary;

use futures::future::join_all;
use serde::Deserialize;
use serde::de::DeserializeOwned;
use std::collections::{BTreeMap, HashMap};
use std::ops::Range;
use tracing::{info, instrument, warn};

use crate::api::AiClient;
use crate::api::decode::decode_json;
use crate::error::BatchError;
use crate::models::Article;
use crate::utils::truncate_for_log;

/// Batch sizing and concurrency for one pipeline.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BatchOptions {
    /// Articles per LLM request.
    pub batch_size: usize,
    /// Batches in flight at once.
    pub max_concurrent: usize,
}

impl Default for BatchOptions {
    fn default() -> Self {
        Self {
            batch_size: 10,
            max_concurrent: 2,
        }
    }
}

/// One kind of per-article LLM job.
pub trait BatchTask: Sync {
    /// One element of the model's `results` array.
    type Raw: DeserializeOwned;
    /// The validated per-article result.
    type Output: Send;

    /// Name used in logs, e.g. `"scoring"`.
    const LABEL: &'static str;

    /// Build the prompt for one batch of `(index, article)` pairs.
    fn build_prompt(&self, batch: &[(usize, &Article)]) -> String;

    /// The article index a raw result refers to.
    fn index_of(raw: &Self::Raw) -> Option<usize>;

    /// Turn a raw model result into a trusted one.
    fn validate(&self, raw: Self::Raw, article: &Article) -> Self::Output;

    /// The stand-in result when the model gave nothing usable.
    fn neutral(&self, article: &Article) -> Self::Output;

    /// The stand-in result for an article a successful reply left out.
    fn missing(&self, article: &Article) -> Self::Output {
        self.neutral(article)
    }
}

#[derive(Deserialize)]
#[serde(bound = "R: DeserializeOwned")]
struct Envelope<R> {
    #[serde(default)]
    results: Vec<R>,
}

/// Run `task` over every article and return one result per input index.
///
/// Never fails: failed batches degrade to neutral results.
#[instrument(level = "info", skip_all, fields(task = T::LABEL, articles = articles.len()))]
pub async fn run_batched<T: BatchTask>(
    task: &T,
    articles: &[Article],
    client: &AiClient,
    options: BatchOptions,
) -> BTreeMap<usize, T::Output> {
    let batch_size = options.batch_size.max(1);
    let max_concurrent = options.max_concurrent.max(1);

    let indexed: Vec<(usize, &Article)> = articles.iter().enumerate().collect();
    let batches: Vec<&[(usize, &Article)]> = indexed.chunks(batch_size).collect();
    info!(
        batches = batches.len(),
        batch_size,
        max_concurrent,
        "Starting {} batches",
        T::LABEL
    );

    let mut results = BTreeMap::new();
    for (wave_no, wave) in batches.chunks(max_concurrent).enumerate() {
        let outcomes = join_all(wave.iter().map(|batch| run_batch(task, batch, client))).await;
        for outcome in outcomes {
            results.extend(outcome);
        }
        info!(
            done = (wave_no * max_concurrent + wave.len()).min(batches.len()),
            total = batches.len(),
            "{} progress",
            T::LABEL
        );
    }
    results
}

async fn run_batch<T: BatchTask>(
    task: &T,
    batch: &[(usize, &Article)],
    client: &AiClient,
) -> Vec<(usize, T::Output)> {
    let span = batch_span(batch);

    let outcome: Result<Vec<T::Raw>, BatchError> = async {
        let prompt = task.build_prompt(batch);
        let response = client.call(&prompt).await?;
        let envelope = decode_json::<Envelope<T::Raw>>(&response).inspect_err(|e| {
            warn!(
                task = T::LABEL,
                error = %e,
                response_preview = %truncate_for_log(&response, 300),
                "Model returned non-conforming JSON"
            );
        })?;
        Ok(envelope.results)
    }
    .await;

    match outcome {
        Ok(raws) => merge(task, batch, span, raws),
        Err(e) => {
            warn!(
                task = T::LABEL,
                first = span.start,
                last = span.end.saturating_sub(1),
                error = %e,
                "Batch failed; using neutral defaults"
            );
            batch
                .iter()
                .map(|(index, article)| (*index, task.neutral(article)))
                .collect()
        }
    }
}

fn batch_span(batch: &[(usize, &Article)]) -> Range<usize> {
    match (batch.first(), batch.last()) {
        (Some((first, _)), Some((last, _))) => *first..*last + 1,
        _ => 0..0,
    }
}

/// Pair raw results with the batch's articles; first result per index wins.
fn merge<T: BatchTask>(
    task: &T,
    batch: &[(usize, &Article)],
    span: Range<usize>,
    raws: Vec<T::Raw>,
) -> Vec<(usize, T::Output)> {
    let mut by_index: HashMap<usize, T::Raw> = HashMap::with_capacity(batch.len());
    let mut stray = 0usize;
    for raw in raws {
        match T::index_of(&raw) {
            Some(index) if span.contains(&index) => {
                by_index.entry(index).or_insert(raw);
            }
            _ => stray += 1,
        }
    }

    let mut missing = 0usize;
    let merged = batch
        .iter()
        .map(|(index, article)| {
            let output = match by_index.remove(index) {
                Some(raw) => task.validate(raw, article),
                None => {
                    missing += 1;
                    task.missing(article)
                }
            };
            (*index, output)
        })
        .collect();

    if missing > 0 || stray > 0 {
        warn!(
            task = T::LABEL,
            first = span.start,
            missing,
            stray,
            "Model results incomplete; defaults used for missing articles"
        );
    }
    merged
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::api::testing::{Scripted, status_error};
    use crate::models::tests::article;
    use std::sync::Arc;
    use std::sync::atomic::{AtomicUsize, Ordering};

    /// Echoes each article's index back as its title length.
    struct EchoTask;

    #[derive(Deserialize)]
    struct EchoRaw {
        #[serde(default, deserialize_with = "lenient::index")]
        index: Option<usize>,
        #[serde(default, deserialize_with = "lenient::string")]
        value: String,
    }

    impl BatchTask for EchoTask {
        type Raw = EchoRaw;
        type Output = String;
        const LABEL: &'static str = "echo";

        fn build_prompt(&self, batch: &[(usize, &Article)]) -> String {
            batch
                .iter()
                .map(|(i, _)| i.to_string())
                .collect::<Vec<_>>()
                .join(",")
        }

        fn index_of(raw: &EchoRaw) -> Option<usize> {
            raw.index
        }

        fn validate(&self, raw: EchoRaw, _article: &Article) -> String {
            raw.value
        }

        fn neutral(&self, _article: &Article) -> String {
            "neutral".to_string()
        }
    }

    fn indices(prompt: &str) -> Vec<usize> {
        prompt.split(',').filter_map(|s| s.parse().ok()).collect()
    }

    fn echo_reply(prompt: &str) -> String {
        let results = indices(prompt)
            .into_iter()
            .map(|i| format!(r#"{{"index": {i}, "value": "v{i}"}}"#))
            .collect::<Vec<_>>()
            .join(",");
        format!(r#"{{"results": [{results}]}}"#)
    }

    fn articles(n: usize) -> Vec<Article> {
        (0..n).map(|i| article(&format!("Post {i}"))).collect()
    }

    #[tokio::test]
    async fn test_issues_one_call_per_batch_and_covers_every_index() {
        let provider = Scripted::new("A", |p| Ok(echo_reply(p)));
        let calls = provider.calls.clone();
        let client = AiClient::with_providers(vec![Box::new(provider)]);
        let options = BatchOptions {
            batch_size: 4,
            max_concurrent: 2,
        };

        let out = run_batched(&EchoTask, &articles(10), &client, options).await;
        assert_eq!(calls.load(Ordering::SeqCst), 3);
        assert_eq!(out.len(), 10);
        for (i, value) in &out {
            assert_eq!(value, &format!("v{i}"));
        }
    }

    #[tokio::test]
    async fn test_failed_batches_degrade_without_losing_indices() {
        // Batches starting at index 0 and 6 fail; 3 and 9 succeed.
        let provider = Scripted::new("A", |p| {
            let first = indices(p)[0];
            if first % 2 == 0 {
                Err(status_error("A", 500))
            } else {
                Ok(echo_reply(p))
            }
        });
        let client = AiClient::with_providers(vec![Box::new(provider)]);
        let options = BatchOptions {
            batch_size: 3,
            max_concurrent: 2,
        };

        let out = run_batched(&EchoTask, &articles(11), &client, options).await;
        assert_eq!(out.len(), 11);
        assert_eq!(out.keys().copied().collect::<Vec<_>>(), (0..11).collect::<Vec<_>>());
        for i in [0, 1, 2, 6, 7, 8] {
            assert_eq!(out[&i], "neutral");
        }
        for i in [3, 4, 5, 9, 10] {
            assert_eq!(out[&i], format!("v{i}"));
        }
    }

    #[tokio::test]
    async fn test_non_json_reply_degrades_whole_batch() {
        let provider = Scripted::ok("A", "I'm sorry, I can't help with that.");
        let client = AiClient::with_providers(vec![Box::new(provider)]);
        let out = run_batched(&EchoTask, &articles(3), &client, BatchOptions::default()).await;
        assert!(out.values().all(|v| v == "neutral"));
    }

    #[tokio::test]
    async fn test_missing_stray_and_duplicate_results() {
        let provider = Scripted::ok(
            "A",
            r#"{"results": [
                {"index": 0, "value": "first"},
                {"index": 0, "value": "second"},
                {"index": 7, "value": "stray"},
                {"index": "1", "value": "one"}
            ]}"#,
        );
        let client = AiClient::with_providers(vec![Box::new(provider)]);
        let out = run_batched(&EchoTask, &articles(3), &client, BatchOptions::default()).await;
        assert_eq!(out.len(), 3);
        assert_eq!(out[&0], "first");
        assert_eq!(out[&1], "one");
        assert_eq!(out[&2], "neutral");
    }

    #[tokio::test]
    async fn test_in_flight_calls_never_exceed_wave_size() {
        let in_flight = Arc::new(AtomicUsize::new(0));
        let peak = Arc::new(AtomicUsize::new(0));

        #[derive(Debug)]
        struct Slow {
            in_flight: Arc<AtomicUsize>,
            peak: Arc<AtomicUsize>,
        }

        #[async_trait::async_trait]
        impl crate::api::Provider for Slow {
            fn name(&self) -> &str {
                "slow"
            }

            async fn ask(&self, prompt: &str) -> Result<String, crate::error::ProviderError> {
                let now = self.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
                self.peak.fetch_max(now, Ordering::SeqCst);
                tokio::time::sleep(std::time::Duration::from_millis(10)).await;
                self.in_flight.fetch_sub(1, Ordering::SeqCst);
                Ok(echo_reply(prompt))
            }
        }

        let client = AiClient::with_providers(vec![Box::new(Slow {
            in_flight: in_flight.clone(),
            peak: peak.clone(),
        })]);
        let options = BatchOptions {
            batch_size: 1,
            max_concurrent: 3,
        };
        let out = run_batched(&EchoTask, &articles(20), &client, options).await;
        assert_eq!(out.len(), 20);
        assert_eq!(peak.load(Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn test_empty_input_makes_no_calls() {
        let provider = Scripted::ok("A", "{}");
        let calls = provider.calls.clone();
        let client = AiClient::with_providers(vec![Box::new(provider)]);
        let out = run_batched(&EchoTask, &[], &client, BatchOptions::default()).await;
        assert!(out.is_empty());
        assert_eq!(calls.load(Ordering::SeqCst), 0);
    }
}
