//! Markdown rendering of a [`Digest`].
//!
//! The report is a pure function of the digest: the same digest always
//! renders to the same text, with relative times measured against
//! [`Digest::generated_at`].

use chrono::{DateTime, Utc};
use itertools::Itertools;
use std::fmt::Write as _;

use super::charts;
use crate::models::{Category, Digest, Lang, ScoredArticle};
use crate::utils::humanize_time;

const MEDALS: [&str; 3] = ["🥇", "🥈", "🥉"];

/// Fixed report wording in one language.
struct Labels {
    title: &'static str,
    highlights: &'static str,
    must_read: &'static str,
    why_read: &'static str,
    overview: &'static str,
    stats_header: &'static str,
    articles_unit: &'static str,
    categories: &'static str,
    keywords: &'static str,
    ascii_summary: &'static str,
    tags: &'static str,
}

const ZH: Labels = Labels {
    title: "AI 博客每日精选",
    highlights: "📝 今日看点",
    must_read: "🏆 今日必读",
    why_read: "为什么值得读",
    overview: "📊 数据概览",
    stats_header: "| 扫描源 | 抓取文章 | 时间范围 | 精选 |",
    articles_unit: " 篇",
    categories: "分类分布",
    keywords: "高频关键词",
    ascii_summary: "📈 纯文本关键词图（终端友好）",
    tags: "🏷️ 话题标签",
};

const EN: Labels = Labels {
    title: "AI Blog Daily Digest",
    highlights: "📝 Today's Highlights",
    must_read: "🏆 Must Read",
    why_read: "Why read",
    overview: "📊 Overview",
    stats_header: "| Sources | Articles | Window | Selected |",
    articles_unit: "",
    categories: "Categories",
    keywords: "Top Keywords",
    ascii_summary: "📈 Plain-text keyword chart (terminal friendly)",
    tags: "🏷️ Topics",
};

fn labels(lang: Lang) -> &'static Labels {
    match lang {
        Lang::Zh => &ZH,
        Lang::En => &EN,
    }
}

fn when(article: &ScoredArticle, now: DateTime<Utc>, lang: Lang) -> String {
    article
        .article
        .published
        .map(|p| humanize_time(p, now, lang))
        .unwrap_or_default()
}

/// Render the full markdown report.
pub fn render_markdown(digest: &Digest) -> String {
    let lang = digest.stats.lang;
    let l = labels(lang);
    let now = digest.generated_at;
    let date = now.format("%Y-%m-%d");
    let articles = &digest.articles;
    let stats = &digest.stats;

    let mut out = String::new();

    let _ = writeln!(out, "# 📰 {} — {date}\n", l.title);
    let _ = match lang {
        Lang::Zh => writeln!(
            out,
            "> 来自 Karpathy 推荐的 {} 个顶级技术博客，AI 精选 Top {}\n",
            stats.total_feeds,
            articles.len()
        ),
        Lang::En => writeln!(
            out,
            "> Top {} picks by AI from {} leading tech blogs recommended by Karpathy\n",
            articles.len(),
            stats.total_feeds
        ),
    };

    if !digest.highlights.is_empty() {
        let _ = writeln!(out, "## {}\n\n{}\n\n---\n", l.highlights, digest.highlights);
    }

    if articles.len() >= 3 {
        let _ = writeln!(out, "## {}\n", l.must_read);
        for (medal, a) in MEDALS.iter().zip(articles) {
            let category = a.score.category;
            let _ = writeln!(out, "{medal} **{}**\n", a.display_title());
            let _ = writeln!(
                out,
                "[{}]({}) — {} · {} · {} {}\n",
                a.article.title,
                a.article.link,
                a.article.source_name,
                when(a, now, lang),
                category.emoji(),
                category.label(lang)
            );
            let _ = writeln!(out, "> {}\n", a.summary.summary);
            if !a.summary.reason.is_empty() {
                let _ = writeln!(out, "💡 **{}**: {}\n", l.why_read, a.summary.reason);
            }
            if !a.score.keywords.is_empty() {
                let _ = writeln!(out, "🏷️ {}\n", a.score.keywords.join(", "));
            }
        }
        out.push_str("---\n\n");
    }

    let _ = writeln!(out, "## {}\n", l.overview);
    let _ = writeln!(out, "{}\n|:---:|:---:|:---:|:---:|", l.stats_header);
    let _ = writeln!(
        out,
        "| {}/{} | {}{unit} → {}{unit} | {}h | **{}{unit}** |\n",
        stats.ok_feeds,
        stats.total_feeds,
        stats.total_articles,
        stats.recent_articles,
        stats.hours,
        articles.len(),
        unit = l.articles_unit,
    );

    let pie = charts::category_pie(articles, lang);
    if !pie.is_empty() {
        let _ = writeln!(out, "### {}\n\n{pie}", l.categories);
    }
    let bar = charts::keyword_bar(articles, lang);
    if !bar.is_empty() {
        let _ = writeln!(out, "### {}\n\n{bar}", l.keywords);
    }
    let ascii = charts::keyword_ascii(articles);
    if !ascii.is_empty() {
        let _ = writeln!(
            out,
            "<details>\n<summary>{}</summary>\n\n{ascii}\n</details>\n",
            l.ascii_summary
        );
    }
    let cloud = charts::tag_cloud(articles);
    if !cloud.is_empty() {
        let _ = writeln!(out, "### {}\n\n{cloud}\n", l.tags);
    }
    out.push_str("---\n\n");

    render_groups(&mut out, articles, now, lang);
    render_footer(&mut out, digest);
    out
}

fn render_groups(out: &mut String, articles: &[ScoredArticle], now: DateTime<Utc>, lang: Lang) {
    let groups = articles.iter().into_group_map_by(|a| a.score.category);
    let order: Vec<Category> = charts::category_counts(articles)
        .into_iter()
        .map(|(c, _)| c)
        .collect();

    let mut number = 0;
    for category in order {
        let Some(members) = groups.get(&category) else {
            continue;
        };
        let _ = writeln!(out, "## {} {}\n", category.emoji(), category.label(lang));
        for a in members {
            number += 1;
            let _ = writeln!(out, "### {number}. {}\n", a.display_title());
            let _ = writeln!(
                out,
                "[{}]({}) — **{}** · {} · ⭐ {}/30\n",
                a.article.title,
                a.article.link,
                a.article.source_name,
                when(a, now, lang),
                a.total_score
            );
            let _ = writeln!(out, "> {}\n", a.summary.summary);
            if !a.score.keywords.is_empty() {
                let _ = writeln!(out, "🏷️ {}\n", a.score.keywords.join(", "));
            }
            out.push_str("---\n\n");
        }
    }
}

fn render_footer(out: &mut String, digest: &Digest) {
    let stats = &digest.stats;
    let stamp = digest.generated_at.format("%Y-%m-%d %H:%M");
    let selected = digest.articles.len();
    let _ = match stats.lang {
        Lang::Zh => writeln!(
            out,
            "*生成于 {stamp} | 扫描 {} 源 → 获取 {} 篇 → 精选 {selected} 篇*",
            stats.ok_feeds, stats.total_articles
        ),
        Lang::En => writeln!(
            out,
            "*Generated {stamp} UTC | {} sources → {} articles → {selected} selected*",
            stats.ok_feeds, stats.total_articles
        ),
    };
    let _ = match stats.lang {
        Lang::Zh => writeln!(
            out,
            "*基于 [Hacker News Popularity Contest 2025](https://refactoringenglish.com/tools/hn-popularity/) RSS 源列表，由 [Andrej Karpathy](https://x.com/karpathy) 推荐*"
        ),
        Lang::En => writeln!(
            out,
            "*Feed list from the [Hacker News Popularity Contest 2025](https://refactoringenglish.com/tools/hn-popularity/), recommended by [Andrej Karpathy](https://x.com/karpathy)*"
        ),
    };
}
