use crate::clients::{FeedSource, FeedStory};
use crate::db::Repository;
use crate::error::Result;
use crate::models::NewLink;

#[derive(Debug, Default)]
pub struct IngestReport {
    pub inserted: usize,
    pub updated: usize,
    pub failed: usize,
}

fn link_from_story(story: FeedStory) -> NewLink {
    NewLink {
        hnlink: format!("https://news.ycombinator.com/item?id={}", story.id),
        hn_id: story.id,
        title: story.title,
        url: story.url,
        score: story.score,
        time: story.time,
        author: story.author,
        descendants: story.descendants,
    }
}

/// Pull the current top stories and upsert them into `links`. New external
/// ids insert a row; known ids only refresh score and comment count. One
/// bad item never aborts the batch.
pub async fn run(repo: &Repository, feed: &dyn FeedSource, limit: usize) -> Result<IngestReport> {
    let ids = feed.top_story_ids(limit).await?;
    tracing::info!("Ingesting {} stories from feed", ids.len());

    let mut report = IngestReport::default();

    for id in ids {
        let story = match feed.story(id).await {
            Ok(Some(story)) => story,
            Ok(None) => {
                tracing::debug!("Item {} is not a live story, skipping", id);
                continue;
            }
            Err(e) => {
                tracing::warn!("Failed to fetch story {}: {}", id, e);
                report.failed += 1;
                continue;
            }
        };

        match repo.upsert_link(link_from_story(story)).await {
            Ok(true) => report.inserted += 1,
            Ok(false) => report.updated += 1,
            Err(e) => {
                tracing::warn!("Failed to store story {}: {}", id, e);
                report.failed += 1;
            }
        }
    }

    Ok(report)
}
