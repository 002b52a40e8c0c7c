use chrono::DateTime;
use futures::stream::{self, StreamExt};

use crate::clients::{ArticleFetcher, FeedComment, FeedSource};
use crate::config::Config;
use crate::db::Repository;
use crate::error::Result;
use crate::models::{Link, NewContent};

#[derive(Debug, Default)]
pub struct ScrapeReport {
    pub scraped: usize,
    pub failed: usize,
}

/// Render the depth-first comment list as one text block: indentation
/// follows thread depth, each comment gets an author/time header.
pub fn flatten_comments(comments: &[FeedComment]) -> String {
    let mut lines = Vec::new();

    for comment in comments {
        let indent = "  ".repeat(comment.depth);
        let time_str = DateTime::from_timestamp(comment.time, 0)
            .map(|dt| dt.format("%Y-%m-%d %H:%M:%S").to_string())
            .unwrap_or_default();

        lines.push(format!("{}[{}] at {}:", indent, comment.author, time_str));
        for text_line in comment.text.lines() {
            lines.push(format!("{}{}", indent, text_line));
        }
        lines.push(String::new());
    }

    lines.join("\n")
}

async fn scrape_one(
    repo: &Repository,
    feed: &dyn FeedSource,
    fetcher: &dyn ArticleFetcher,
    link: &Link,
    config: &Config,
) -> Result<bool> {
    // Self posts (Ask HN etc.) have no external URL; the discussion is the
    // story, so the title stands in for the article body.
    let article = match &link.url {
        Some(url) => fetcher.article_text(url).await?,
        None => link.title.clone(),
    };

    let comments = feed.comment_tree(link.hn_id, config.comment_depth).await?;
    let comments_text = flatten_comments(&comments);

    // Both fields are in hand, commit the row. A concurrent duplicate is a
    // no-op thanks to the link_id uniqueness constraint.
    repo.insert_content(NewContent {
        link_id: link.id,
        article,
        comments: comments_text,
    })
    .await
}

/// Fetch article text and discussion for every link that has no content row
/// yet, bounded by the configured concurrency ceiling. Failures are counted
/// against the link's retry budget instead of committing partial rows.
pub async fn run(
    repo: &Repository,
    feed: &dyn FeedSource,
    fetcher: &dyn ArticleFetcher,
    config: &Config,
) -> Result<ScrapeReport> {
    let links = repo.links_needing_content(config.scrape_retry_budget).await?;
    tracing::info!("Scraping {} links", links.len());

    let results: Vec<bool> = stream::iter(&links)
        .map(|link| async move {
            match scrape_one(repo, feed, fetcher, link, config).await {
                Ok(_) => true,
                Err(e) => {
                    tracing::warn!("Failed to scrape {} ({}): {}", link.hn_id, link.title, e);
                    if let Err(e) = repo
                        .record_scrape_failure(link.id, config.scrape_retry_budget)
                        .await
                    {
                        tracing::error!("Failed to record scrape failure: {}", e);
                    }
                    false
                }
            }
        })
        .buffer_unordered(config.scrape_concurrency.max(1))
        .collect()
        .await;

    let scraped = results.iter().filter(|ok| **ok).count();
    Ok(ScrapeReport {
        scraped,
        failed: results.len() - scraped,
    })
}
