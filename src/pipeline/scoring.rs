//! Relevance/quality/timeliness scoring of candidate articles.

use serde::Deserialize;
use std::collections::BTreeMap;

use super::{BatchOptions, BatchTask, lenient, run_batched};
use crate::api::AiClient;
use crate::models::{Article, Category, ScoreRecord};
use crate::utils::truncate_chars;

const DESCRIPTION_CHARS: usize = 300;
const MAX_KEYWORDS: usize = 4;

const SCORING_INSTRUCTIONS: &str = r#"你是一个技术内容策展人，正在为一份面向技术爱好者的每日精选摘要筛选文章。

请对以下文章进行三个维度的评分（1-10 整数，10 分最高），并为每篇文章分配一个分类标签和提取 2-4 个关键词。

## 评分维度

### 1. 相关性 (relevance) - 对技术/编程/AI/互联网从业者的价值
- 10: 所有技术人都应该知道的重大事件/突破
- 7-9: 对大部分技术从业者有价值
- 4-6: 对特定技术领域有价值
- 1-3: 与技术行业关联不大

### 2. 质量 (quality) - 文章本身的深度和写作质量
- 10: 深度分析，原创洞见，引用丰富
- 7-9: 有深度，观点独到
- 4-6: 信息准确，表达清晰
- 1-3: 浅尝辄止或纯转述

### 3. 时效性 (timeliness) - 当前是否值得阅读
- 10: 正在发生的重大事件/刚发布的重要工具
- 7-9: 近期热点相关
- 4-6: 常青内容，不过时
- 1-3: 过时或无时效价值

## 分类标签（必须从以下选一个）
- ai-ml: AI、机器学习、LLM、深度学习相关
- security: 安全、隐私、漏洞、加密相关
- engineering: 软件工程、架构、编程语言、系统设计
- tools: 开发工具、开源项目、新发布的库/框架
- opinion: 行业观点、个人思考、职业发展、文化评论
- other: 以上都不太适合的

## 关键词提取
提取 2-4 个最能代表文章主题的关键词（用英文，简短，如 "Rust", "LLM", "database", "performance"）

## 待评分文章"#;

const SCORING_RESPONSE_SHAPE: &str = r#"请严格按 JSON 格式返回，不要包含 markdown 代码块或其他文字：
{
  "results": [
    {
      "index": 0,
      "relevance": 8,
      "quality": 7,
      "timeliness": 9,
      "category": "engineering",
      "keywords": ["Rust", "compiler", "performance"]
    }
  ]
}"#;

/// One entry of the model's scoring `results`, before validation.
#[derive(Debug, Deserialize)]
pub struct RawScore {
    #[serde(default, deserialize_with = "lenient::index")]
    pub index: Option<usize>,
    #[serde(default, deserialize_with = "lenient::number")]
    pub relevance: Option<f64>,
    #[serde(default, deserialize_with = "lenient::number")]
    pub quality: Option<f64>,
    #[serde(default, deserialize_with = "lenient::number")]
    pub timeliness: Option<f64>,
    #[serde(default, deserialize_with = "lenient::string")]
    pub category: String,
    #[serde(default, deserialize_with = "lenient::string_list")]
    pub keywords: Vec<String>,
}

/// Round to the nearest integer and clamp into `1..=10`.
///
/// Missing values count as the neutral score.
pub fn clamp_score(value: Option<f64>) -> u8 {
    let value = value
        .filter(|v| v.is_finite())
        .unwrap_or(f64::from(ScoreRecord::NEUTRAL_SCORE));
    value.round().clamp(1.0, 10.0) as u8
}

/// Scores articles in batches.
#[derive(Debug, Clone, Copy, Default)]
pub struct ScoringTask;

impl BatchTask for ScoringTask {
    type Raw = RawScore;
    type Output = ScoreRecord;

    const LABEL: &'static str = "scoring";

    fn build_prompt(&self, batch: &[(usize, &Article)]) -> String {
        let listing = batch
            .iter()
            .map(|(index, article)| {
                format!(
                    "Index {index}: [{}] {}\n{}",
                    article.source_name,
                    article.title,
                    truncate_chars(&article.description, DESCRIPTION_CHARS)
                )
            })
            .collect::<Vec<_>>()
            .join("\n\n---\n\n");

        format!("{SCORING_INSTRUCTIONS}\n\n{listing}\n\n{SCORING_RESPONSE_SHAPE}")
    }

    fn index_of(raw: &RawScore) -> Option<usize> {
        raw.index
    }

    fn validate(&self, raw: RawScore, _article: &Article) -> ScoreRecord {
        ScoreRecord {
            relevance: clamp_score(raw.relevance),
            quality: clamp_score(raw.quality),
            timeliness: clamp_score(raw.timeliness),
            category: Category::from_tag(&raw.category),
            keywords: raw
                .keywords
                .into_iter()
                .map(|k| k.trim().to_string())
                .filter(|k| !k.is_empty())
                .take(MAX_KEYWORDS)
                .collect(),
        }
    }

    fn neutral(&self, _article: &Article) -> ScoreRecord {
        ScoreRecord::neutral()
    }
}

/// Score every article; the map holds one record per input index.
pub async fn score_articles(
    articles: &[Article],
    client: &AiClient,
    options: BatchOptions,
) -> BTreeMap<usize, ScoreRecord> {
    run_batched(&ScoringTask, articles, client, options).await
}
