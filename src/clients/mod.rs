//! External capability seams. The pipeline and the chat manager only depend
//! on these traits; production clients live alongside them and tests plug in
//! deterministic fakes.

mod ai;
mod hn;
mod mail;
mod scrape;

use async_trait::async_trait;

use crate::error::Result;
use crate::models::Message;

pub use ai::AiClient;
pub use hn::HnClient;
pub use mail::MailClient;
pub use scrape::ArticleClient;

/// A story's metadata as returned by the feed.
#[derive(Debug, Clone)]
pub struct FeedStory {
    pub id: i64,
    pub title: String,
    pub url: Option<String>,
    pub score: i64,
    pub time: i64,
    pub author: Option<String>,
    pub descendants: i64,
}

/// One comment, flattened out of the tree with its depth preserved.
#[derive(Debug, Clone)]
pub struct FeedComment {
    pub author: String,
    pub time: i64,
    pub text: String,
    pub depth: usize,
}

/// Read-only story feed (production: the HN Firebase API).
#[async_trait]
pub trait FeedSource: Send + Sync {
    async fn top_story_ids(&self, limit: usize) -> Result<Vec<i64>>;

    /// Metadata for one story; None when the item is missing or not a story.
    async fn story(&self, id: i64) -> Result<Option<FeedStory>>;

    /// The story's comment tree flattened depth-first, deleted and dead
    /// comments skipped. Order is deterministic for a given tree.
    async fn comment_tree(&self, story_id: i64, max_depth: usize) -> Result<Vec<FeedComment>>;
}

/// Fetches readable article text for a URL. May fail or time out; failures
/// are transient from the pipeline's point of view.
#[async_trait]
pub trait ArticleFetcher: Send + Sync {
    async fn article_text(&self, url: &str) -> Result<String>;
}

/// Untrusted output of the analysis capability. The Analyzer sanitizes it
/// before anything is committed.
#[derive(Debug, Clone, Default)]
pub struct RawAnalysis {
    pub article_summary: String,
    pub comments_summary: String,
    pub categories: Vec<String>,
    pub relevance: Option<f64>,
    pub trustworthiness: Option<f64>,
    pub controversy: Option<f64>,
}

#[async_trait]
pub trait AnalysisModel: Send + Sync {
    async fn analyze(&self, title: &str, article: &str, comments: &str) -> Result<RawAnalysis>;

    fn model_version(&self) -> &str;
}

/// Semantic similarity between a user's interest description and an article
/// summary, on the same 0-5 scale as relevance scores.
#[async_trait]
pub trait SimilarityModel: Send + Sync {
    async fn similarity(&self, description: &str, summary: &str) -> Result<f64>;
}

#[async_trait]
pub trait ChatModel: Send + Sync {
    /// Generate a reply given the article context, a trailing window of
    /// prior messages, and the new user message.
    async fn reply(&self, context: &str, history: &[Message], text: &str) -> Result<String>;
}

/// Digest delivery. No partial-delivery semantics: Ok means the digest was
/// accepted for the recipient.
#[async_trait]
pub trait DigestMailer: Send + Sync {
    async fn send(&self, recipient: &str, subject: &str, html: &str) -> Result<()>;
}
