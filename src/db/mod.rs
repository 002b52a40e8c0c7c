mod repository;
mod schema;

pub use repository::{FeedItem, MatchCandidate, PendingAnalysis, Repository};
