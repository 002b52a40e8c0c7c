use std::time::Duration;

use async_trait::async_trait;
use reqwest::Client;
use serde::Serialize;

use crate::error::{AppError, Result};

use super::DigestMailer;

#[derive(Debug, Serialize)]
struct SendEmailRequest {
    from: String,
    to: Vec<String>,
    subject: String,
    html: String,
}

/// HTTP mail API client (Resend-style JSON endpoint).
pub struct MailClient {
    client: Client,
    api_url: String,
    api_key: String,
    from_email: String,
}

impl MailClient {
    pub fn new(api_url: String, api_key: String, from_email: String) -> Self {
        let client = Client::builder()
            .timeout(Duration::from_secs(30))
            .build()
            .expect("Failed to create HTTP client");
        Self {
            client,
            api_url,
            api_key,
            from_email,
        }
    }
}

#[async_trait]
impl DigestMailer for MailClient {
    async fn send(&self, recipient: &str, subject: &str, html: &str) -> Result<()> {
        let request = SendEmailRequest {
            from: self.from_email.clone(),
            to: vec![recipient.to_string()],
            subject: subject.to_string(),
            html: html.to_string(),
        };

        let response = self
            .client
            .post(&self.api_url)
            .bearer_auth(&self.api_key)
            .json(&request)
            .send()
            .await?;

        if !response.status().is_success() {
            let error_text = response.text().await?;
            return Err(AppError::MailApi(format!("API error: {}", error_text)));
        }

        Ok(())
    }
}
