//! # Tech Digest
//!
//! A daily digest builder that pulls recent posts from ~90 technical blogs,
//! has an LLM score and summarize them, and writes a ranked report.
//!
//! ## Features
//!
//! - Fetches RSS and Atom feeds concurrently, with per-feed timeouts
//! - Scores every recent article for relevance, quality, and timeliness
//! - Summarizes and translates the top picks in Chinese or English
//! - Fails over between Bailian, Gemini, and any OpenAI-compatible API
//! - Writes a markdown report with charts, or the same digest as JSON
//!
//! ## Usage
//!
//! ```sh
//! BAILIAN_API_KEY=sk-xxx tech_digest --hours 48 --top-n 15 --lang zh
//! ```
//!
//! ## Architecture
//!
//! The application follows a pipeline architecture:
//! 1. **Fetching**: Download and parse every feed (10 at a time)
//! 2. **Filtering**: Keep articles from the last `--hours`
//! 3. **Scoring**: Score articles in batches of 10, 2 batches in flight
//! 4. **Ranking**: Keep the `--top-n` best totals
//! 5. **Summarizing**: Summarize the picks with the same batching
//! 6. **Highlights**: One call for a short trend overview
//! 7. **Output**: Render and write the report

use chrono::Utc;
use clap::Parser;
use std::path::Path;
use std::process::ExitCode;
use std::time::Duration;
use tracing::{error, info};
use tracing_subscriber::{EnvFilter, fmt as tfmt};

mod api;
mod cli;
mod error;
mod feeds;
mod models;
mod outputs;
mod pipeline;
mod utils;

use api::AiClient;
use cli::Cli;
use error::{DigestError, Result};
use feeds::fetch::FeedFetcher;
use models::{Digest, DigestStats, ScoredArticle, SummaryRecord};
use pipeline::highlights::generate_highlights;
use pipeline::rank::{filter_recent, rank};
use pipeline::scoring::score_articles;
use pipeline::summary::summarize_articles;
use utils::{ensure_writable_dir, truncate_chars};

#[tokio::main]
async fn main() -> ExitCode {
    // --- Tracing init ---
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    tfmt()
        .with_env_filter(filter)
        .with_target(true)
        .with_file(false)
        .with_line_number(false)
        .with_timer(tracing_subscriber::fmt::time::UtcTime::rfc_3339())
        .init();

    let args = Cli::parse();
    match run(args).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            error!(error = %e, "Fatal error");
            ExitCode::FAILURE
        }
    }
}

async fn run(args: Cli) -> Result<()> {
    let start_time = std::time::Instant::now();
    let now = Utc::now();

    let ai_config = args.ai_config();
    if !ai_config.has_any_key() {
        return Err(DigestError::MissingApiKey);
    }
    let client = AiClient::from_config(&ai_config)?;

    let output_path = args.output_path(now);
    info!(
        hours = args.hours,
        top_n = args.top_n,
        lang = %args.lang,
        output = %output_path.display(),
        provider = %client.describe(),
        "tech_digest starting up"
    );

    // Fail on an unwritable destination before any network work.
    let output_dir = match output_path.parent() {
        Some(dir) if !dir.as_os_str().is_empty() => dir,
        _ => Path::new("."),
    };
    ensure_writable_dir(output_dir).await?;

    // ---- Fetch ----
    let feeds = feeds::load_feeds(args.feeds.as_deref()).await?;
    info!(count = feeds.len(), "Step 1/5: Fetching feeds");
    let fetcher = FeedFetcher::new(
        Duration::from_secs(args.feed_timeout_secs),
        usize::from(args.feed_concurrency),
    )?;
    let report = fetcher.fetch_all(&feeds).await;
    if report.articles.is_empty() {
        return Err(DigestError::NoArticles);
    }
    let total_articles = report.articles.len();

    // ---- Filter ----
    info!(hours = args.hours, "Step 2/5: Filtering by time range");
    let recent = filter_recent(report.articles, args.hours, now);
    info!(recent = recent.len(), total = total_articles, "Found recent articles");
    if recent.is_empty() {
        return Err(DigestError::NoRecentArticles(args.hours));
    }
    let recent_articles = recent.len();

    // ---- Score and rank ----
    info!(count = recent_articles, "Step 3/5: Scoring articles");
    let scores = score_articles(&recent, &client, args.batch_options()).await;
    let ranked = rank(recent, scores, args.top_n);
    info!(
        selected = ranked.len(),
        best = ranked.first().map(|(_, s)| s.total()).unwrap_or(0),
        worst = ranked.last().map(|(_, s)| s.total()).unwrap_or(0),
        "Selected top articles"
    );

    // ---- Summarize ----
    info!(count = ranked.len(), "Step 4/5: Summarizing picks");
    let (selected, selected_scores): (Vec<_>, Vec<_>) = ranked.into_iter().unzip();
    let mut summaries =
        summarize_articles(&selected, &client, args.lang, args.batch_options()).await;
    let picks: Vec<ScoredArticle> = selected
        .into_iter()
        .zip(selected_scores)
        .enumerate()
        .map(|(i, (article, score))| {
            let summary = summaries
                .remove(&i)
                .unwrap_or_else(|| SummaryRecord::neutral(&article));
            ScoredArticle::new(article, score, summary)
        })
        .collect();

    // ---- Highlights ----
    info!("Step 5/5: Generating highlights");
    let highlights = generate_highlights(&picks, &client, args.lang).await;

    // ---- Output ----
    let digest = Digest {
        generated_at: now,
        highlights,
        stats: DigestStats {
            total_feeds: feeds.len(),
            ok_feeds: report.ok_feeds,
            total_articles,
            recent_articles,
            hours: args.hours,
            lang: args.lang,
        },
        articles: picks,
    };
    outputs::write_report(&digest, args.format, &output_path).await?;

    let elapsed = start_time.elapsed();
    info!(
        report = %output_path.display(),
        sources = report.ok_feeds,
        failed_sources = report.failed_feeds,
        articles = total_articles,
        recent = recent_articles,
        selected = digest.articles.len(),
        fell_back = client.fell_back(),
        secs = elapsed.as_secs(),
        "Done"
    );
    for (i, pick) in digest.articles.iter().take(3).enumerate() {
        info!(
            rank = i + 1,
            title = %pick.display_title(),
            summary = %truncate_chars(&pick.summary.summary, 80),
            "Top pick"
        );
    }

    Ok(())
}
