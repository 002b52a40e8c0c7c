use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Scraped raw text for a link. A row only exists once both the article text
/// and the flattened comment block were obtained.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Content {
    pub id: i64,
    pub link_id: i64,
    pub article: String,
    pub comments: String,
    pub analyze_failed: bool,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone)]
pub struct NewContent {
    pub link_id: i64,
    pub article: String,
    pub comments: String,
}
