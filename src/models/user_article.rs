use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// The personalization record pairing a user with an article. Unique per
/// (user_id, article_id); `is_sent` only ever transitions false to true.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UserArticle {
    pub id: i64,
    pub user_id: i64,
    pub article_id: i64,
    pub matched_categories: Vec<String>,
    pub relevance_score: f64,
    pub is_read: bool,
    pub is_sent: bool,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone)]
pub struct NewUserArticle {
    pub user_id: i64,
    pub article_id: i64,
    pub matched_categories: Vec<String>,
    pub relevance_score: f64,
}

/// One digest candidate: a user_article joined with its link and analysis.
#[derive(Debug, Clone)]
pub struct DigestEntry {
    pub user_article_id: i64,
    pub article_id: i64,
    pub title: String,
    pub url: Option<String>,
    pub hnlink: String,
    pub article_summary: String,
    pub matched_categories: Vec<String>,
    pub relevance_score: f64,
}
