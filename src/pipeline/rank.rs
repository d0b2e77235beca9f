//! Recency filtering and top-N selection.

use chrono::{DateTime, Duration, Utc};
use std::collections::BTreeMap;

use crate::models::{Article, ScoreRecord};

/// Keep articles published within `hours` of `now`.
///
/// Articles without a publication time are dropped.
pub fn filter_recent(articles: Vec<Article>, hours: u32, now: DateTime<Utc>) -> Vec<Article> {
    let cutoff = now - Duration::hours(i64::from(hours));
    articles
        .into_iter()
        .filter(|a| a.published.is_some_and(|p| p >= cutoff))
        .collect()
}

/// Order articles by total score, best first, and keep the first `top_n`.
///
/// Equal totals keep their fetch order. Articles missing from `scores`
/// rank with the neutral record.
pub fn rank(
    articles: Vec<Article>,
    mut scores: BTreeMap<usize, ScoreRecord>,
    top_n: usize,
) -> Vec<(Article, ScoreRecord)> {
    let mut ranked: Vec<(usize, Article, ScoreRecord)> = articles
        .into_iter()
        .enumerate()
        .map(|(i, a)| {
            let score = scores.remove(&i).unwrap_or_else(ScoreRecord::neutral);
            (i, a, score)
        })
        .collect();

    ranked.sort_by(|(ia, _, sa), (ib, _, sb)| sb.total().cmp(&sa.total()).then(ia.cmp(ib)));
    ranked
        .into_iter()
        .take(top_n)
        .map(|(_, a, s)| (a, s))
        .collect()
}
