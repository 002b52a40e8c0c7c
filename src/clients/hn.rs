use std::time::Duration;

use async_trait::async_trait;
use regex::Regex;
use reqwest::Client;
use serde::Deserialize;

use crate::error::Result;

use super::{FeedComment, FeedSource, FeedStory};

/// Client for the HN Firebase API.
pub struct HnClient {
    client: Client,
    base_url: String,
    tag_re: Regex,
}

#[derive(Debug, Deserialize)]
struct Item {
    id: i64,
    #[serde(rename = "type")]
    item_type: Option<String>,
    by: Option<String>,
    time: Option<i64>,
    text: Option<String>,
    title: Option<String>,
    url: Option<String>,
    score: Option<i64>,
    descendants: Option<i64>,
    #[serde(default)]
    kids: Vec<i64>,
    #[serde(default)]
    deleted: bool,
    #[serde(default)]
    dead: bool,
}

impl HnClient {
    pub fn new(base_url: String) -> Self {
        let client = Client::builder()
            .timeout(Duration::from_secs(30))
            .connect_timeout(Duration::from_secs(10))
            .user_agent("ftl-news/1.0")
            .build()
            .expect("Failed to create HTTP client");

        Self {
            client,
            base_url,
            tag_re: Regex::new(r"<[^>]+>").expect("invalid tag regex"),
        }
    }

    async fn fetch_item(&self, id: i64) -> Result<Option<Item>> {
        let url = format!("{}/item/{}.json", self.base_url, id);
        let response = self.client.get(&url).send().await?.error_for_status()?;
        // The API returns literal null for unknown ids
        let item: Option<Item> = response.json().await?;
        Ok(item)
    }

    fn strip_html(&self, text: &str) -> String {
        let text = text.replace("<p>", "\n");
        let text = self.tag_re.replace_all(&text, "");
        text.replace("&amp;", "&")
            .replace("&lt;", "<")
            .replace("&gt;", ">")
            .replace("&quot;", "\"")
            .replace("&#x27;", "'")
            .replace("&#39;", "'")
    }
}

#[async_trait]
impl FeedSource for HnClient {
    async fn top_story_ids(&self, limit: usize) -> Result<Vec<i64>> {
        let url = format!("{}/topstories.json", self.base_url);
        let response = self.client.get(&url).send().await?.error_for_status()?;
        let mut ids: Vec<i64> = response.json().await?;
        ids.truncate(limit);
        Ok(ids)
    }

    async fn story(&self, id: i64) -> Result<Option<FeedStory>> {
        let item = match self.fetch_item(id).await? {
            Some(item) => item,
            None => return Ok(None),
        };

        if item.deleted || item.dead || item.item_type.as_deref() != Some("story") {
            return Ok(None);
        }

        let title = match item.title {
            Some(title) => title,
            None => return Ok(None),
        };

        Ok(Some(FeedStory {
            id: item.id,
            title,
            url: item.url,
            score: item.score.unwrap_or(0),
            time: item.time.unwrap_or(0),
            author: item.by,
            descendants: item.descendants.unwrap_or(0),
        }))
    }

    async fn comment_tree(&self, story_id: i64, max_depth: usize) -> Result<Vec<FeedComment>> {
        let story = match self.fetch_item(story_id).await? {
            Some(story) => story,
            None => return Ok(Vec::new()),
        };

        // Depth-first walk with an explicit stack; children are pushed in
        // reverse so siblings come out in the API's order.
        let mut stack: Vec<(i64, usize)> = story.kids.iter().rev().map(|&id| (id, 0)).collect();
        let mut comments = Vec::new();

        while let Some((id, depth)) = stack.pop() {
            let item = match self.fetch_item(id).await {
                Ok(Some(item)) => item,
                Ok(None) => continue,
                Err(e) => {
                    tracing::debug!("Failed to fetch comment {}: {}", id, e);
                    continue;
                }
            };

            if item.deleted || item.dead {
                continue;
            }

            let text = match &item.text {
                Some(text) => self.strip_html(text),
                None => continue,
            };

            if depth < max_depth {
                for &kid in item.kids.iter().rev() {
                    stack.push((kid, depth + 1));
                }
            }

            comments.push(FeedComment {
                author: item.by.unwrap_or_else(|| "[deleted]".to_string()),
                time: item.time.unwrap_or(0),
                text,
                depth,
            });
        }

        Ok(comments)
    }
}
