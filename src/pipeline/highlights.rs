//! The "today's highlights" paragraph that opens the report.

use tracing::{info, warn};

use crate::api::AiClient;
use crate::models::{Lang, ScoredArticle};
use crate::utils::truncate_chars;

const HIGHLIGHT_ARTICLES: usize = 10;
const SUMMARY_CHARS: usize = 100;

/// The prompt asking for a trend paragraph over the first ten ranked
/// articles, each listed with its category and a short summary.
pub fn build_highlights_prompt(articles: &[ScoredArticle], lang: Lang) -> String {
    let listing = articles
        .iter()
        .take(HIGHLIGHT_ARTICLES)
        .enumerate()
        .map(|(i, a)| {
            format!(
                "{}. [{}] {} — {}",
                i + 1,
                a.score.category,
                a.display_title(),
                truncate_chars(&a.summary.summary, SUMMARY_CHARS)
            )
        })
        .collect::<Vec<_>>()
        .join("\n");

    let lang_note = match lang {
        Lang::Zh => "用中文回答。",
        Lang::En => "Write in English.",
    };

    format!(
        "根据以下今日精选技术文章列表，写一段 3-5 句话的\"今日看点\"总结。\n\
         要求：\n\
         - 提炼出今天技术圈的 2-3 个主要趋势或话题\n\
         - 不要逐篇列举，要做宏观归纳\n\
         - 风格简洁有力，像新闻导语\n\
         {lang_note}\n\n\
         文章列表：\n\
         {listing}\n\n\
         直接返回纯文本总结，不要 JSON，不要 markdown 格式。"
    )
}

/// Ask for a short trend summary of the top articles.
///
/// Best effort: any failure yields an empty string.
pub async fn generate_highlights(articles: &[ScoredArticle], client: &AiClient, lang: Lang) -> String {
    if articles.is_empty() {
        return String::new();
    }
    match client.call(&build_highlights_prompt(articles, lang)).await {
        Ok(text) => {
            let text = text.trim().to_string();
            info!(chars = text.chars().count(), "Generated highlights");
            text
        }
        Err(e) => {
            warn!(error = %e, "Highlights generation failed; omitting section");
            String::new()
        }
    }
}
