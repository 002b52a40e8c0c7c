//! Per-article chat sessions. Conversations hang off a user_article and use
//! the article's stored analysis as grounding context. Sends for the same
//! (user, article) pair are serialized through a keyed mutex; different
//! pairs never wait on each other.

use std::collections::HashMap;
use std::sync::Arc;

use tokio::sync::Mutex;

use crate::clients::ChatModel;
use crate::db::Repository;
use crate::error::{AppError, Result};
use crate::models::{Message, Role};

pub struct ChatSessionManager {
    repo: Arc<Repository>,
    model: Arc<dyn ChatModel>,
    history_window: usize,
    locks: Mutex<HashMap<(i64, i64), Arc<Mutex<()>>>>,
}

impl ChatSessionManager {
    pub fn new(repo: Arc<Repository>, model: Arc<dyn ChatModel>, history_window: usize) -> Self {
        Self {
            repo,
            model,
            history_window,
            locks: Mutex::new(HashMap::new()),
        }
    }

    async fn pair_lock(&self, user_id: i64, article_id: i64) -> Arc<Mutex<()>> {
        let mut locks = self.locks.lock().await;
        locks
            .entry((user_id, article_id))
            .or_insert_with(|| Arc::new(Mutex::new(())))
            .clone()
    }

    /// All messages for the pair, oldest first.
    pub async fn history(&self, user_id: i64, article_id: i64) -> Result<Vec<Message>> {
        let ua = self
            .repo
            .get_user_article(user_id, article_id)
            .await?
            .ok_or_else(|| {
                AppError::NotFound(format!("no record for user {user_id}, article {article_id}"))
            })?;

        self.repo.messages_for(ua.id).await
    }

    /// Append the user's message, generate a reply grounded in the article's
    /// analysis and a trailing window of the conversation, and append it.
    /// When the model call fails the user message stays persisted and the
    /// error propagates; the history is never left corrupted.
    pub async fn send(&self, user_id: i64, article_id: i64, text: &str) -> Result<Message> {
        let lock = self.pair_lock(user_id, article_id).await;
        let _guard = lock.lock().await;

        let ua = self
            .repo
            .get_user_article(user_id, article_id)
            .await?
            .ok_or_else(|| {
                AppError::NotFound(format!("no record for user {user_id}, article {article_id}"))
            })?;

        let analysis = self
            .repo
            .get_analysis_for_article(article_id)
            .await?
            .ok_or_else(|| {
                AppError::NotFound(format!("article {article_id} has no analysis yet"))
            })?;

        let context = format!(
            "ARTICLE SUMMARY:\n{}\n\nDISCUSSION SUMMARY:\n{}",
            analysis.article_summary, analysis.comments_summary
        );

        let prior = self.repo.messages_for(ua.id).await?;
        let window_start = prior.len().saturating_sub(self.history_window);
        let window = &prior[window_start..];

        self.repo
            .append_message(ua.id, Role::User, text.to_string())
            .await?;

        let reply = self.model.reply(&context, window, text).await?;

        self.repo.append_message(ua.id, Role::Assistant, reply).await
    }
}
