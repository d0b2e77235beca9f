//! JSON rendering of a [`Digest`] for machine consumers.
//!
//! The document mirrors [`Digest`] field for field:
//!
//! ```text
//! {
//!   "generated_at": "2025-05-05T12:30:00Z",
//!   "highlights": "...",
//!   "stats": { "total_feeds": 92, "ok_feeds": 80, ... },
//!   "articles": [ { "title": "...", "score": { ... }, "summary": { ... }, "total_score": 24 } ]
//! }
//! ```

use crate::models::Digest;

/// Serialize the digest as pretty-printed JSON.
pub fn render_json(digest: &Digest) -> serde_json::Result<String> {
    serde_json::to_string_pretty(digest)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::tests::article;
    use crate::models::{DigestStats, Lang, ScoreRecord, ScoredArticle, SummaryRecord};
    use chrono::Utc;

    #[test]
    fn test_json_round_trips_digest() {
        let a = article("Json");
        let digest = Digest {
            generated_at: Utc::now(),
            highlights: "h".to_string(),
            stats: DigestStats {
                total_feeds: 2,
                ok_feeds: 1,
                total_articles: 3,
                recent_articles: 1,
                hours: 24,
                lang: Lang::En,
            },
            articles: vec![ScoredArticle::new(
                a.clone(),
                ScoreRecord::neutral(),
                SummaryRecord::neutral(&a),
            )],
        };

        let json = render_json(&digest).unwrap();
        let value: serde_json::Value = serde_json::from_str(&json).unwrap();
        assert_eq!(value["stats"]["lang"], "en");
        assert_eq!(value["articles"][0]["title"], "Json");
        assert_eq!(value["articles"][0]["total_score"], 15);

        let back: Digest = serde_json::from_str(&json).unwrap();
        assert_eq!(back.stats, digest.stats);
        assert_eq!(back.articles[0].article, digest.articles[0].article);
    }
}
