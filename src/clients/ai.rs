use std::time::Duration;

use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};

use crate::error::{AppError, Result};
use crate::models::{Message as ChatMessage, Role};
use crate::taxonomy;

use super::{AnalysisModel, ChatModel, RawAnalysis, SimilarityModel};

const CLAUDE_API_URL: &str = "https://api.anthropic.com/v1/messages";
const CLAUDE_MODEL: &str = "claude-3-5-haiku-20241022";

const ANALYSIS_SYSTEM_PROMPT: &str = r#"You analyze news articles and their discussion threads.
Respond with a single JSON object and nothing else, in this shape:
{
  "article_summary": "3-5 sentence summary of the article",
  "comments_summary": "3-5 sentence summary of the discussion, no usernames",
  "categories": ["slug", ...],
  "scores": {"relevance": 1.0-5.0, "trustworthiness": 1.0-5.0, "controversy": 1.0-5.0}
}
Categories must be chosen from the provided (slug, description) list only."#;

const SIMILARITY_SYSTEM_PROMPT: &str = r#"You rate how well an article matches a reader's stated interests.
Respond with a single number between 0.0 and 5.0 and nothing else.
0.0 means completely irrelevant, 5.0 means a perfect match."#;

const CHAT_SYSTEM_PROMPT: &str = r#"You are a helpful assistant discussing one news article with a reader.
Ground your answers in the article and discussion summaries provided below.
Use clear, accessible language and keep answers concise."#;

#[derive(Debug, Serialize)]
struct MessageRequest {
    model: String,
    max_tokens: u32,
    messages: Vec<Message>,
    system: Option<String>,
}

#[derive(Debug, Serialize)]
struct Message {
    role: String,
    content: String,
}

#[derive(Debug, Deserialize)]
struct MessageResponse {
    content: Vec<ContentBlock>,
}

#[derive(Debug, Deserialize)]
struct ContentBlock {
    #[serde(rename = "type")]
    #[allow(dead_code)]
    content_type: String,
    text: Option<String>,
}

/// The model's analysis output as it claims to be. Every field is optional;
/// sanitization happens downstream.
#[derive(Debug, Default, Deserialize)]
struct AnalysisPayload {
    #[serde(default)]
    article_summary: Option<String>,
    #[serde(default)]
    comments_summary: Option<String>,
    #[serde(default)]
    categories: Vec<String>,
    #[serde(default)]
    scores: ScoresPayload,
}

#[derive(Debug, Default, Deserialize)]
struct ScoresPayload {
    #[serde(default)]
    relevance: Option<f64>,
    #[serde(default)]
    trustworthiness: Option<f64>,
    #[serde(default)]
    controversy: Option<f64>,
}

pub struct AiClient {
    client: Client,
    api_key: String,
}

impl AiClient {
    pub fn new(api_key: String) -> Self {
        let client = Client::builder()
            .timeout(Duration::from_secs(60))
            .build()
            .expect("Failed to create HTTP client");
        Self { client, api_key }
    }

    async fn complete(&self, system: &str, messages: Vec<Message>) -> Result<String> {
        let request = MessageRequest {
            model: CLAUDE_MODEL.to_string(),
            max_tokens: 1024,
            messages,
            system: Some(system.to_string()),
        };

        let response = self
            .client
            .post(CLAUDE_API_URL)
            .header("x-api-key", &self.api_key)
            .header("anthropic-version", "2023-06-01")
            .header("content-type", "application/json")
            .json(&request)
            .send()
            .await?;

        if !response.status().is_success() {
            let error_text = response.text().await?;
            return Err(AppError::AiApi(format!("API error: {}", error_text)));
        }

        let message_response: MessageResponse = response.json().await?;

        let text = message_response
            .content
            .into_iter()
            .filter_map(|block| block.text)
            .collect::<Vec<_>>()
            .join("\n");

        Ok(text)
    }

    fn user_message(content: String) -> Message {
        Message {
            role: "user".to_string(),
            content,
        }
    }
}

/// Pull the first JSON object out of a model reply that may be wrapped in
/// prose or a code fence.
fn extract_json(text: &str) -> Option<&str> {
    let start = text.find('{')?;
    let end = text.rfind('}')?;
    (end > start).then(|| &text[start..=end])
}

fn truncate(text: &str, max_chars: usize) -> &str {
    match text.char_indices().nth(max_chars) {
        Some((idx, _)) => &text[..idx],
        None => text,
    }
}

#[async_trait]
impl AnalysisModel for AiClient {
    async fn analyze(&self, title: &str, article: &str, comments: &str) -> Result<RawAnalysis> {
        let prompt = format!(
            "Categories:\n{}\n\nTitle: {}\n\nArticle:\n{}\n\nComments:\n{}",
            taxonomy::prompt_listing(),
            title,
            truncate(article, 15000),
            if comments.is_empty() {
                "(No comments)"
            } else {
                truncate(comments, 15000)
            },
        );

        let text = self
            .complete(ANALYSIS_SYSTEM_PROMPT, vec![Self::user_message(prompt)])
            .await?;

        let payload: AnalysisPayload = extract_json(&text)
            .and_then(|json| serde_json::from_str(json).ok())
            .unwrap_or_default();

        Ok(RawAnalysis {
            article_summary: payload.article_summary.unwrap_or_default(),
            comments_summary: payload.comments_summary.unwrap_or_default(),
            categories: payload.categories,
            relevance: payload.scores.relevance,
            trustworthiness: payload.scores.trustworthiness,
            controversy: payload.scores.controversy,
        })
    }

    fn model_version(&self) -> &str {
        CLAUDE_MODEL
    }
}

#[async_trait]
impl SimilarityModel for AiClient {
    async fn similarity(&self, description: &str, summary: &str) -> Result<f64> {
        let prompt = format!(
            "READER INTERESTS:\n{}\n\nARTICLE SUMMARY:\n{}",
            truncate(description, 2000),
            truncate(summary, 4000),
        );

        let text = self
            .complete(SIMILARITY_SYSTEM_PROMPT, vec![Self::user_message(prompt)])
            .await?;

        let score: f64 = text
            .trim()
            .parse()
            .map_err(|_| AppError::AiApi(format!("unparseable similarity score: {text:?}")))?;

        Ok(score.clamp(0.0, 5.0))
    }
}

#[async_trait]
impl ChatModel for AiClient {
    async fn reply(&self, context: &str, history: &[ChatMessage], text: &str) -> Result<String> {
        let system = format!("{CHAT_SYSTEM_PROMPT}\n\n{context}");

        let mut messages: Vec<Message> = history
            .iter()
            .map(|m| Message {
                role: match m.role {
                    Role::User => "user".to_string(),
                    Role::Assistant => "assistant".to_string(),
                },
                content: m.content.clone(),
            })
            .collect();
        messages.push(Self::user_message(text.to_string()));

        let reply = self.complete(&system, messages).await?;

        if reply.trim().is_empty() {
            return Err(AppError::AiApi("empty chat reply".to_string()));
        }

        Ok(reply)
    }
}
