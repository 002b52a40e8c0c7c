use std::time::Duration;

use async_trait::async_trait;
use reqwest::header::{HeaderMap, HeaderValue, USER_AGENT};
use reqwest::Client;
use url::Url;

use crate::error::{AppError, Result};

use super::ArticleFetcher;

const USER_AGENT_STRING: &str =
    "Mozilla/5.0 (X11; Linux x86_64; rv:128.0) Gecko/20100101 Firefox/128.0";

/// Fetches article pages and extracts readable text.
pub struct ArticleClient {
    client: Client,
}

impl ArticleClient {
    pub fn new() -> Self {
        let client = Client::builder()
            .timeout(Duration::from_secs(30))
            .build()
            .expect("Failed to create HTTP client");
        Self { client }
    }

    /// Extract readable content from HTML using html2text.
    fn extract_content(&self, html: &str) -> Option<String> {
        let text = match html2text::from_read(html.as_bytes(), 80) {
            Ok(t) => t,
            Err(e) => {
                tracing::debug!("Failed to convert HTML to text: {}", e);
                return None;
            }
        };

        // Clean up the text - remove excessive whitespace
        let cleaned: String = text
            .lines()
            .map(|l| l.trim())
            .filter(|l| !l.is_empty())
            .collect::<Vec<_>>()
            .join("\n");

        if cleaned.len() > 200 {
            Some(cleaned)
        } else {
            tracing::debug!("Extracted content too short ({} chars)", cleaned.len());
            None
        }
    }
}

#[async_trait]
impl ArticleFetcher for ArticleClient {
    async fn article_text(&self, article_url: &str) -> Result<String> {
        let parsed = Url::parse(article_url)
            .map_err(|e| AppError::Scrape(format!("invalid url {article_url}: {e}")))?;
        if parsed.scheme() != "http" && parsed.scheme() != "https" {
            return Err(AppError::Scrape(format!(
                "unsupported scheme {} in {article_url}",
                parsed.scheme()
            )));
        }

        let mut headers = HeaderMap::new();
        headers.insert(USER_AGENT, HeaderValue::from_static(USER_AGENT_STRING));

        let response = self
            .client
            .get(article_url)
            .headers(headers)
            .send()
            .await?;

        if !response.status().is_success() {
            return Err(AppError::Scrape(format!(
                "{} returned HTTP {}",
                article_url,
                response.status()
            )));
        }

        let content_type = response
            .headers()
            .get("content-type")
            .and_then(|v| v.to_str().ok())
            .unwrap_or("")
            .to_string();

        if !content_type.is_empty() && !content_type.contains("html") && !content_type.contains("text") {
            return Err(AppError::Scrape(format!(
                "{article_url} has unsupported content type {content_type}"
            )));
        }

        let html = response.text().await?;

        self.extract_content(&html)
            .ok_or_else(|| AppError::Scrape(format!("no readable content at {article_url}")))
    }
}

impl Default for ArticleClient {
    fn default() -> Self {
        Self::new()
    }
}
