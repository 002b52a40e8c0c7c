use serde::{Deserialize, Serialize};
use std::path::PathBuf;

use crate::error::{AppError, Result};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    #[serde(default = "default_db_path")]
    pub db_path: String,

    #[serde(default = "default_hn_base_url")]
    pub hn_base_url: String,

    pub ai_api_key: Option<String>,
    pub mail_api_key: Option<String>,

    #[serde(default = "default_mail_api_url")]
    pub mail_api_url: String,

    #[serde(default = "default_from_email")]
    pub from_email: String,

    #[serde(default = "default_app_base_url")]
    pub app_base_url: String,

    #[serde(default = "default_top_stories_limit")]
    pub top_stories_limit: usize,

    #[serde(default = "default_comment_depth")]
    pub comment_depth: usize,

    #[serde(default = "default_scrape_concurrency")]
    pub scrape_concurrency: usize,

    #[serde(default = "default_analyze_concurrency")]
    pub analyze_concurrency: usize,

    #[serde(default = "default_scrape_retry_budget")]
    pub scrape_retry_budget: u32,

    #[serde(default = "default_analyze_retry_budget")]
    pub analyze_retry_budget: u32,

    #[serde(default = "default_relevance_threshold")]
    pub relevance_threshold: f64,

    #[serde(default = "default_max_digest_size")]
    pub max_digest_size: usize,

    #[serde(default = "default_chat_history_window")]
    pub chat_history_window: usize,

    #[serde(default = "default_overlap_weight")]
    pub overlap_weight: f64,
}

fn default_db_path() -> String {
    let data_dir = dirs::data_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join("ftl-news");
    std::fs::create_dir_all(&data_dir).ok();
    data_dir.join("news.db").to_string_lossy().to_string()
}

fn default_hn_base_url() -> String {
    "https://hacker-news.firebaseio.com/v0".to_string()
}

fn default_mail_api_url() -> String {
    "https://api.resend.com/emails".to_string()
}

fn default_from_email() -> String {
    "digest@ftlnews.example".to_string()
}

fn default_app_base_url() -> String {
    "http://localhost:3000".to_string()
}

fn default_top_stories_limit() -> usize {
    30
}

fn default_comment_depth() -> usize {
    2
}

fn default_scrape_concurrency() -> usize {
    5
}

fn default_analyze_concurrency() -> usize {
    3
}

fn default_scrape_retry_budget() -> u32 {
    3
}

fn default_analyze_retry_budget() -> u32 {
    3
}

fn default_relevance_threshold() -> f64 {
    2.5
}

fn default_max_digest_size() -> usize {
    10
}

fn default_chat_history_window() -> usize {
    20
}

fn default_overlap_weight() -> f64 {
    0.6
}

impl Default for Config {
    fn default() -> Self {
        Self {
            db_path: default_db_path(),
            hn_base_url: default_hn_base_url(),
            ai_api_key: None,
            mail_api_key: None,
            mail_api_url: default_mail_api_url(),
            from_email: default_from_email(),
            app_base_url: default_app_base_url(),
            top_stories_limit: default_top_stories_limit(),
            comment_depth: default_comment_depth(),
            scrape_concurrency: default_scrape_concurrency(),
            analyze_concurrency: default_analyze_concurrency(),
            scrape_retry_budget: default_scrape_retry_budget(),
            analyze_retry_budget: default_analyze_retry_budget(),
            relevance_threshold: default_relevance_threshold(),
            max_digest_size: default_max_digest_size(),
            chat_history_window: default_chat_history_window(),
            overlap_weight: default_overlap_weight(),
        }
    }
}

impl Config {
    pub fn load() -> Result<Self> {
        let config_path = Self::config_path();

        if config_path.exists() {
            let content = std::fs::read_to_string(&config_path)?;
            let config: Config =
                toml::from_str(&content).map_err(|e| AppError::Config(e.to_string()))?;
            Ok(config)
        } else {
            let config = Config::default();
            config.save()?;
            Ok(config)
        }
    }

    pub fn save(&self) -> Result<()> {
        let config_path = Self::config_path();
        if let Some(parent) = config_path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let content =
            toml::to_string_pretty(self).map_err(|e| AppError::Config(e.to_string()))?;
        std::fs::write(config_path, content)?;
        Ok(())
    }

    pub fn config_path() -> PathBuf {
        dirs::config_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join("ftl-news")
            .join("config.toml")
    }
}
