//! Translated titles, summaries, and reasons for the selected articles.

use serde::Deserialize;
use std::collections::BTreeMap;

use super::{BatchOptions, BatchTask, lenient, run_batched};
use crate::api::AiClient;
use crate::models::{Article, Lang, SummaryRecord};
use crate::utils::truncate_chars;

const DESCRIPTION_CHARS: usize = 800;
const MISSING_SUMMARY_CHARS: usize = 200;

const SUMMARY_INSTRUCTIONS: &str = r#"你是一个技术内容摘要专家。请为以下文章完成三件事：

1. **中文标题** (titleZh): 将英文标题翻译成自然的中文。如果原标题已经是中文则保持不变。
2. **摘要** (summary): 4-6 句话的结构化摘要，让读者不点进原文也能了解核心内容。包含：
   - 文章讨论的核心问题或主题（1 句）
   - 关键论点、技术方案或发现（2-3 句）
   - 结论或作者的核心观点（1 句）
3. **推荐理由** (reason): 1 句话说明"为什么值得读"，区别于摘要（摘要说"是什么"，推荐理由说"为什么"）。"#;

const SUMMARY_RULES: &str = r#"摘要要求：
- 直接说重点，不要用"本文讨论了..."、"这篇文章介绍了..."这种开头
- 包含具体的技术名词、数据、方案名称或观点
- 保留关键数字和指标（如性能提升百分比、用户数、版本号等）
- 如果文章涉及对比或选型，要点出比较对象和结论
- 目标：读者花 30 秒读完摘要，就能决定是否值得花 10 分钟读原文

## 待摘要文章"#;

const SUMMARY_RESPONSE_SHAPE: &str = r#"请严格按 JSON 格式返回：
{
  "results": [
    {
      "index": 0,
      "titleZh": "中文翻译的标题",
      "summary": "摘要内容...",
      "reason": "推荐理由..."
    }
  ]
}"#;

fn language_instruction(lang: Lang) -> &'static str {
    match lang {
        Lang::Zh => "请用中文撰写摘要和推荐理由。如果原文是英文，请翻译为中文。标题翻译也用中文。",
        Lang::En => "Write summaries, reasons, and title translations in English.",
    }
}

/// One entry of the model's summary `results`, before validation.
#[derive(Debug, Deserialize)]
pub struct RawSummary {
    #[serde(default, deserialize_with = "lenient::index")]
    pub index: Option<usize>,
    #[serde(default, rename = "titleZh", deserialize_with = "lenient::string")]
    pub title_zh: String,
    #[serde(default, deserialize_with = "lenient::string")]
    pub summary: String,
    #[serde(default, deserialize_with = "lenient::string")]
    pub reason: String,
}

/// Summarizes articles in batches, writing in `lang`.
#[derive(Debug, Clone, Copy)]
pub struct SummaryTask {
    pub lang: Lang,
}

impl BatchTask for SummaryTask {
    type Raw = RawSummary;
    type Output = SummaryRecord;

    const LABEL: &'static str = "summary";

    fn build_prompt(&self, batch: &[(usize, &Article)]) -> String {
        let listing = batch
            .iter()
            .map(|(index, article)| {
                format!(
                    "Index {index}: [{}] {}\nURL: {}\n{}",
                    article.source_name,
                    article.title,
                    article.link,
                    truncate_chars(&article.description, DESCRIPTION_CHARS)
                )
            })
            .collect::<Vec<_>>()
            .join("\n\n---\n\n");

        format!(
            "{SUMMARY_INSTRUCTIONS}\n\n{}\n\n{SUMMARY_RULES}\n\n{listing}\n\n{SUMMARY_RESPONSE_SHAPE}",
            language_instruction(self.lang)
        )
    }

    fn index_of(raw: &RawSummary) -> Option<usize> {
        raw.index
    }

    fn validate(&self, raw: RawSummary, article: &Article) -> SummaryRecord {
        let or_title = |s: String| {
            let s = s.trim();
            if s.is_empty() {
                article.title.clone()
            } else {
                s.to_string()
            }
        };
        SummaryRecord {
            translated_title: or_title(raw.title_zh),
            summary: or_title(raw.summary),
            reason: raw.reason.trim().to_string(),
        }
    }

    fn neutral(&self, article: &Article) -> SummaryRecord {
        SummaryRecord::neutral(article)
    }

    /// Left out of a good reply: the opening of the description stands in
    /// for the summary.
    fn missing(&self, article: &Article) -> SummaryRecord {
        let lead = truncate_chars(article.description.trim(), MISSING_SUMMARY_CHARS);
        let mut record = SummaryRecord::neutral(article);
        if !lead.is_empty() {
            record.summary = lead.to_string();
        }
        record
    }
}

/// Summarize every article; the map holds one record per input index.
pub async fn summarize_articles(
    articles: &[Article],
    client: &AiClient,
    lang: Lang,
    options: BatchOptions,
) -> BTreeMap<usize, SummaryRecord> {
    run_batched(&SummaryTask { lang }, articles, client, options).await
}
