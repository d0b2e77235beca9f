//! Data models for feed articles and their scored, summarized representations.
//!
//! This module defines the core data structures used throughout the pipeline:
//! - [`Article`]: a raw entry parsed from one feed
//! - [`ScoreRecord`]: the LLM's relevance/quality/timeliness verdict on one article
//! - [`SummaryRecord`]: the LLM's translated title, summary, and reason
//! - [`ScoredArticle`]: everything the report renderer needs about one pick
//! - [`Digest`]: a complete run result, ready to be rendered
//!
//! All of these live for a single run only.

use chrono::{DateTime, Utc};
use clap::ValueEnum;
use serde::{Deserialize, Serialize};
use std::fmt;

/// A single entry parsed from an RSS or Atom feed.
///
/// Two feeds may report the same post; articles are never merged.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Article {
    /// The entry title with markup stripped.
    pub title: String,
    /// The link to the full post.
    pub link: String,
    /// Publication time, if the feed carried a parseable one.
    pub published: Option<DateTime<Utc>>,
    /// Plain-text description, at most 500 characters.
    pub description: String,
    /// The name of the feed this entry came from.
    pub source_name: String,
    /// The human-facing homepage of the feed.
    pub source_url: String,
}

/// Closed set of topic tags an article can be filed under.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum Category {
    AiMl,
    Security,
    Engineering,
    Tools,
    Opinion,
    Other,
}

impl Category {
    pub const ALL: [Category; 6] = [
        Category::AiMl,
        Category::Security,
        Category::Engineering,
        Category::Tools,
        Category::Opinion,
        Category::Other,
    ];

    /// The wire tag used in prompts and model responses.
    pub fn tag(self) -> &'static str {
        match self {
            Category::AiMl => "ai-ml",
            Category::Security => "security",
            Category::Engineering => "engineering",
            Category::Tools => "tools",
            Category::Opinion => "opinion",
            Category::Other => "other",
        }
    }

    /// Map a free-text tag from the model onto the closed set.
    ///
    /// Anything unrecognized becomes [`Category::Other`], so a model that
    /// invents a tag can never leak it into the report.
    pub fn from_tag(tag: &str) -> Category {
        let tag = tag.trim();
        Category::ALL
            .into_iter()
            .find(|c| c.tag() == tag)
            .unwrap_or(Category::Other)
    }

    pub fn emoji(self) -> &'static str {
        match self {
            Category::AiMl => "🤖",
            Category::Security => "🔒",
            Category::Engineering => "⚙️",
            Category::Tools => "🛠",
            Category::Opinion => "💡",
            Category::Other => "📝",
        }
    }

    pub fn label(self, lang: Lang) -> &'static str {
        match (self, lang) {
            (Category::AiMl, _) => "AI / ML",
            (Category::Security, Lang::Zh) => "安全",
            (Category::Security, Lang::En) => "Security",
            (Category::Engineering, Lang::Zh) => "工程",
            (Category::Engineering, Lang::En) => "Engineering",
            (Category::Tools, Lang::Zh) => "工具 / 开源",
            (Category::Tools, Lang::En) => "Tools / Open Source",
            (Category::Opinion, Lang::Zh) => "观点 / 杂谈",
            (Category::Opinion, Lang::En) => "Opinion",
            (Category::Other, Lang::Zh) => "其他",
            (Category::Other, Lang::En) => "Other",
        }
    }
}

impl fmt::Display for Category {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.tag())
    }
}

/// Language used for summaries, highlights, and report labels.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, ValueEnum, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Lang {
    #[default]
    Zh,
    En,
}

impl fmt::Display for Lang {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Lang::Zh => "zh",
            Lang::En => "en",
        })
    }
}

/// The model's verdict on one article.
///
/// The three scores are always within `1..=10`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ScoreRecord {
    pub relevance: u8,
    pub quality: u8,
    pub timeliness: u8,
    pub category: Category,
    /// At most four short topic keywords.
    pub keywords: Vec<String>,
}

impl ScoreRecord {
    pub const NEUTRAL_SCORE: u8 = 5;

    /// The placeholder used when the model gave no usable answer.
    pub fn neutral() -> Self {
        Self {
            relevance: Self::NEUTRAL_SCORE,
            quality: Self::NEUTRAL_SCORE,
            timeliness: Self::NEUTRAL_SCORE,
            category: Category::Other,
            keywords: Vec::new(),
        }
    }

    pub fn total(&self) -> u32 {
        u32::from(self.relevance) + u32::from(self.quality) + u32::from(self.timeliness)
    }
}

/// Translated title, summary, and recommendation reason for one article.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SummaryRecord {
    pub translated_title: String,
    pub summary: String,
    pub reason: String,
}

impl SummaryRecord {
    /// The placeholder used when the model gave no usable answer.
    pub fn neutral(article: &Article) -> Self {
        Self {
            translated_title: article.title.clone(),
            summary: article.title.clone(),
            reason: String::new(),
        }
    }
}

/// A selected article with its score and summary attached.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ScoredArticle {
    #[serde(flatten)]
    pub article: Article,
    pub score: ScoreRecord,
    pub summary: SummaryRecord,
    pub total_score: u32,
}

impl ScoredArticle {
    pub fn new(article: Article, score: ScoreRecord, summary: SummaryRecord) -> Self {
        let total_score = score.total();
        Self {
            article,
            score,
            summary,
            total_score,
        }
    }

    /// The title to show readers: the translation if there is one.
    pub fn display_title(&self) -> &str {
        if self.summary.translated_title.is_empty() {
            &self.article.title
        } else {
            &self.summary.translated_title
        }
    }
}

/// Counters describing how a digest was assembled.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DigestStats {
    pub total_feeds: usize,
    pub ok_feeds: usize,
    pub total_articles: usize,
    pub recent_articles: usize,
    pub hours: u32,
    pub lang: Lang,
}

/// The complete result of one run.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Digest {
    pub generated_at: DateTime<Utc>,
    pub highlights: String,
    pub stats: DigestStats,
    pub articles: Vec<ScoredArticle>,
}
