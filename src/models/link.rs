use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// An ingested story. `hn_id` is the stable external identity; `score` and
/// `descendants` are refreshed on re-ingest, everything else is immutable.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Link {
    pub id: i64,
    pub hn_id: i64,
    pub title: String,
    pub url: Option<String>,
    pub score: i64,
    pub time: i64,
    pub author: Option<String>,
    pub descendants: i64,
    pub hnlink: String,
    pub scrape_attempts: i64,
    pub scrape_failed: bool,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone)]
pub struct NewLink {
    pub hn_id: i64,
    pub title: String,
    pub url: Option<String>,
    pub score: i64,
    pub time: i64,
    pub author: Option<String>,
    pub descendants: i64,
    pub hnlink: String,
}
