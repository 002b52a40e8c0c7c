use thiserror::Error;

pub type Result<T> = std::result::Result<T, AppError>;

#[derive(Debug, Error)]
pub enum AppError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Database error: {0}")]
    Database(#[from] tokio_rusqlite::Error),

    #[error("Database error: {0}")]
    Sqlite(#[from] rusqlite::Error),

    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("AI API error: {0}")]
    AiApi(String),

    #[error("Mail API error: {0}")]
    MailApi(String),

    #[error("Scrape error: {0}")]
    Scrape(String),

    #[error("Not found: {0}")]
    NotFound(String),

    #[error("{0}")]
    Other(#[from] anyhow::Error),
}

impl AppError {
    /// Whether the failure is worth retrying (network trouble, timeouts,
    /// rate limiting) as opposed to a problem that will repeat identically.
    pub fn is_transient(&self) -> bool {
        match self {
            AppError::Http(e) => {
                e.is_timeout()
                    || e.is_connect()
                    || e.status().is_some_and(|s| {
                        s.is_server_error() || s == reqwest::StatusCode::TOO_MANY_REQUESTS
                    })
            }
            AppError::AiApi(_) | AppError::MailApi(_) | AppError::Scrape(_) => true,
            _ => false,
        }
    }
}
