//! Command-line interface definitions for the tech digest.
//!
//! This module defines the CLI arguments and options using the `clap` crate.
//! Provider credentials are read from the environment; every other option
//! has a flag and a sensible default.

use chrono::{DateTime, Utc};
use clap::Parser;
use std::path::PathBuf;
use std::time::Duration;

use crate::api::AiConfig;
use crate::models::Lang;
use crate::outputs::ReportFormat;
use crate::pipeline::BatchOptions;

/// Command-line arguments for the tech digest.
///
/// # Examples
///
/// ```sh
/// # Last day, ten picks, English summaries
/// BAILIAN_API_KEY=sk-xxx tech_digest --hours 24 --top-n 10 --lang en
///
/// # A week of posts from a custom feed list, as JSON
/// GEMINI_API_KEY=xxx tech_digest --hours 168 --feeds ./feeds.yaml --format json
/// ```
#[derive(Parser, Debug)]
#[command(author, version, about)]
pub struct Cli {
    /// Only consider articles published within this many hours
    #[arg(long, default_value_t = 48)]
    pub hours: u32,

    /// Number of top-ranked articles to include
    #[arg(long, default_value_t = 15)]
    pub top_n: usize,

    /// Language for summaries and report labels
    #[arg(long, value_enum, default_value_t = Lang::Zh)]
    pub lang: Lang,

    /// Report path (default: ./digest-YYYYMMDD.md or .json)
    #[arg(short, long)]
    pub output: Option<PathBuf>,

    /// Report format
    #[arg(long, value_enum, default_value_t = ReportFormat::Md)]
    pub format: ReportFormat,

    /// YAML feed list replacing the built-in one
    #[arg(long)]
    pub feeds: Option<PathBuf>,

    /// Articles per LLM request
    #[arg(long, default_value_t = 10, value_parser = clap::value_parser!(u16).range(1..))]
    pub batch_size: u16,

    /// LLM requests in flight at once
    #[arg(long, default_value_t = 2, value_parser = clap::value_parser!(u16).range(1..))]
    pub max_concurrent: u16,

    /// Feeds fetched at once
    #[arg(long, default_value_t = 10, value_parser = clap::value_parser!(u16).range(1..))]
    pub feed_concurrency: u16,

    /// Per-feed timeout in seconds
    #[arg(long, default_value_t = 15)]
    pub feed_timeout_secs: u64,

    /// Per-request LLM timeout in seconds
    #[arg(long, default_value_t = 180)]
    pub llm_timeout_secs: u64,

    /// Alibaba Cloud Bailian (DashScope) API key
    #[arg(long, env = "BAILIAN_API_KEY", hide_env_values = true)]
    pub bailian_api_key: Option<String>,

    /// Alias for BAILIAN_API_KEY
    #[arg(long, env = "DASHSCOPE_API_KEY", hide_env_values = true, hide = true)]
    pub dashscope_api_key: Option<String>,

    /// Google Gemini API key
    #[arg(long, env = "GEMINI_API_KEY", hide_env_values = true)]
    pub gemini_api_key: Option<String>,

    /// OpenAI-compatible API key
    #[arg(long, env = "OPENAI_API_KEY", hide_env_values = true)]
    pub openai_api_key: Option<String>,

    /// OpenAI-compatible base URL (default: https://api.openai.com/v1)
    #[arg(long, env = "OPENAI_API_BASE")]
    pub openai_api_base: Option<String>,

    /// OpenAI-compatible model (default: inferred from the base URL)
    #[arg(long, env = "OPENAI_API_MODEL")]
    pub openai_api_model: Option<String>,

    /// Alias for OPENAI_API_MODEL
    #[arg(long, env = "OPENAI_MODEL", hide = true)]
    pub openai_model: Option<String>,
}

fn first_present(values: [&Option<String>; 2]) -> Option<String> {
    values
        .into_iter()
        .flatten()
        .map(|v| v.trim())
        .find(|v| !v.is_empty())
        .map(str::to_string)
}

impl Cli {
    /// Provider settings, with aliases folded in.
    pub fn ai_config(&self) -> AiConfig {
        AiConfig {
            bailian_api_key: first_present([&self.bailian_api_key, &self.dashscope_api_key]),
            gemini_api_key: first_present([&self.gemini_api_key, &None]),
            openai_api_key: first_present([&self.openai_api_key, &None]),
            openai_api_base: first_present([&self.openai_api_base, &None]),
            openai_model: first_present([&self.openai_api_model, &self.openai_model]),
            request_timeout: Duration::from_secs(self.llm_timeout_secs),
        }
    }

    pub fn batch_options(&self) -> BatchOptions {
        BatchOptions {
            batch_size: usize::from(self.batch_size),
            max_concurrent: usize::from(self.max_concurrent),
        }
    }

    /// The report path: `--output`, or `digest-YYYYMMDD.<ext>` in the
    /// working directory.
    pub fn output_path(&self, now: DateTime<Utc>) -> PathBuf {
        self.output.clone().unwrap_or_else(|| {
            PathBuf::from(format!(
                "./digest-{}.{}",
                now.format("%Y%m%d"),
                self.format.extension()
            ))
        })
    }
}
