//! Text charts embedded in the markdown report.
//!
//! Every chart returns an empty string when there is nothing to draw, so the
//! renderer can skip the surrounding section.

use itertools::Itertools;

use crate::models::{Category, Lang, ScoredArticle};

const BAR_CELLS: usize = 20;

/// Keyword frequencies across `articles`, most frequent first.
///
/// Keywords are compared case-insensitively and reported in lowercase.
/// Equal counts keep first-appearance order.
pub fn keyword_counts(articles: &[ScoredArticle]) -> Vec<(String, usize)> {
    let keywords: Vec<String> = articles
        .iter()
        .flat_map(|a| a.score.keywords.iter())
        .map(|k| k.trim().to_lowercase())
        .filter(|k| !k.is_empty())
        .collect();
    let counts = keywords.iter().counts();

    keywords
        .iter()
        .unique()
        .map(|k| (k.clone(), counts[k]))
        .sorted_by(|a, b| b.1.cmp(&a.1))
        .collect()
}

/// Article counts per category, largest first, ties in category order.
pub fn category_counts(articles: &[ScoredArticle]) -> Vec<(Category, usize)> {
    articles
        .iter()
        .counts_by(|a| a.score.category)
        .into_iter()
        .sorted_by(|a, b| b.1.cmp(&a.1).then(a.0.cmp(&b.0)))
        .collect()
}

fn mermaid_label(s: &str) -> String {
    s.replace('"', "'")
}

/// A mermaid pie chart of the category distribution.
pub fn category_pie(articles: &[ScoredArticle], lang: Lang) -> String {
    let counts = category_counts(articles);
    if counts.is_empty() {
        return String::new();
    }
    let title = match lang {
        Lang::Zh => "文章分类分布",
        Lang::En => "Category Distribution",
    };

    let mut chart = format!("```mermaid\npie showData\n    title \"{title}\"\n");
    for (category, count) in counts {
        chart.push_str(&format!(
            "    \"{} {}\" : {count}\n",
            category.emoji(),
            category.label(lang)
        ));
    }
    chart.push_str("```\n");
    chart
}

/// A mermaid horizontal bar chart of the twelve most frequent keywords.
pub fn keyword_bar(articles: &[ScoredArticle], lang: Lang) -> String {
    let top: Vec<_> = keyword_counts(articles).into_iter().take(12).collect();
    let Some(max) = top.first().map(|(_, n)| *n) else {
        return String::new();
    };
    let (title, axis) = match lang {
        Lang::Zh => ("高频关键词", "出现次数"),
        Lang::En => ("Top Keywords", "Mentions"),
    };

    let labels = top.iter().map(|(k, _)| format!("\"{}\"", mermaid_label(k))).join(", ");
    let values = top.iter().map(|(_, n)| n).join(", ");

    format!(
        "```mermaid\nxychart-beta horizontal\n    title \"{title}\"\n    x-axis [{labels}]\n    y-axis \"{axis}\" 0 --> {}\n    bar [{values}]\n```\n",
        max + 2
    )
}

/// A terminal-friendly bar chart of the ten most frequent keywords.
pub fn keyword_ascii(articles: &[ScoredArticle]) -> String {
    let top: Vec<_> = keyword_counts(articles).into_iter().take(10).collect();
    let Some(max) = top.first().map(|(_, n)| *n) else {
        return String::new();
    };
    let width = top.iter().map(|(k, _)| k.chars().count()).max().unwrap_or(0);

    let mut chart = String::from("```\n");
    for (label, value) in &top {
        let filled = ((*value as f64 / max as f64) * BAR_CELLS as f64).round() as usize;
        let filled = filled.clamp(1, BAR_CELLS);
        let pad = width - label.chars().count();
        chart.push_str(&format!(
            "{label}{} │ {}{} {value}\n",
            " ".repeat(pad),
            "█".repeat(filled),
            "░".repeat(BAR_CELLS - filled)
        ));
    }
    chart.push_str("```\n");
    chart
}

/// The twenty most frequent keywords, the top three in bold.
pub fn tag_cloud(articles: &[ScoredArticle]) -> String {
    keyword_counts(articles)
        .into_iter()
        .take(20)
        .enumerate()
        .map(|(i, (word, count))| {
            if i < 3 {
                format!("**{word}**({count})")
            } else {
                format!("{word}({count})")
            }
        })
        .join(" · ")
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::tests::article;
    use crate::models::{ScoreRecord, SummaryRecord};

    fn scored(category: Category, keywords: &[&str]) -> ScoredArticle {
        let a = article("x");
        let mut score = ScoreRecord::neutral();
        score.category = category;
        score.keywords = keywords.iter().map(|k| k.to_string()).collect();
        ScoredArticle::new(a.clone(), score, SummaryRecord::neutral(&a))
    }

    fn sample() -> Vec<ScoredArticle> {
        vec![
            scored(Category::Engineering, &["Rust", "compiler"]),
            scored(Category::AiMl, &["LLM", "rust"]),
            scored(Category::Engineering, &["Database", "RUST", "llm"]),
            scored(Category::Security, &[]),
        ]
    }

    #[test]
    fn test_keyword_counts_case_insensitive() {
        let counts = keyword_counts(&sample());
        assert_eq!(
            counts,
            vec![
                ("rust".to_string(), 3),
                ("llm".to_string(), 2),
                ("compiler".to_string(), 1),
                ("database".to_string(), 1),
            ]
        );
    }

    #[test]
    fn test_category_counts_order() {
        let counts = category_counts(&sample());
        assert_eq!(
            counts,
            vec![
                (Category::Engineering, 2),
                (Category::AiMl, 1),
                (Category::Security, 1),
            ]
        );
    }

    #[test]
    fn test_category_pie() {
        let pie = category_pie(&sample(), Lang::Zh);
        assert!(pie.starts_with("```mermaid\npie showData\n    title \"文章分类分布\"\n"));
        assert!(pie.contains("    \"⚙️ 工程\" : 2\n"));
        assert!(pie.ends_with("```\n"));
    }

    #[test]
    fn test_keyword_bar() {
        let bar = keyword_bar(&sample(), Lang::En);
        assert!(bar.contains("x-axis [\"rust\", \"llm\", \"compiler\", \"database\"]"));
        assert!(bar.contains("y-axis \"Mentions\" 0 --> 5"));
        assert!(bar.contains("bar [3, 2, 1, 1]"));
    }

    #[test]
    fn test_keyword_ascii_bars() {
        let chart = keyword_ascii(&sample());
        let lines: Vec<_> = chart.lines().collect();
        assert_eq!(lines[0], "```");
        assert_eq!(lines[1], format!("rust     │ {} 3", "█".repeat(20)));
        assert_eq!(lines[2], format!("llm      │ {}{} 2", "█".repeat(13), "░".repeat(7)));
        assert_eq!(lines.last(), Some(&"```"));
    }

    #[test]
    fn test_tag_cloud_bolds_top_three() {
        assert_eq!(
            tag_cloud(&sample()),
            "**rust**(3) · **llm**(2) · **compiler**(1) · database(1)"
        );
    }

    #[test]
    fn test_empty_charts() {
        let none = vec![scored(Category::Other, &[])];
        assert_eq!(keyword_bar(&none, Lang::Zh), "");
        assert_eq!(keyword_ascii(&none), "");
        assert_eq!(tag_cloud(&none), "");
        assert_eq!(category_pie(&[], Lang::Zh), "");
    }
}
