use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Named scores on an analysis, each in [1.0, 5.0].
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Scores {
    pub relevance: f64,
    pub trustworthiness: f64,
    pub controversy: f64,
}

/// AI-derived summaries, categories and scores for one content row.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Analysis {
    pub id: i64,
    pub content_id: i64,
    pub article_summary: String,
    pub comments_summary: String,
    pub categories: Vec<String>,
    pub scores: Scores,
    pub model_version: String,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone)]
pub struct NewAnalysis {
    pub content_id: i64,
    pub article_summary: String,
    pub comments_summary: String,
    pub categories: Vec<String>,
    pub scores: Scores,
    pub model_version: String,
}
