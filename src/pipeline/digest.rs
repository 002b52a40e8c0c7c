use crate::clients::DigestMailer;
use crate::config::Config;
use crate::db::Repository;
use crate::error::Result;
use crate::models::DigestEntry;
use crate::taxonomy;

#[derive(Debug, Default)]
pub struct DigestReport {
    pub sent: usize,
    pub skipped: usize,
    pub failed: usize,
}

pub fn subject(article_count: usize) -> String {
    format!(
        "Your Daily Digest: {} New Article{}",
        article_count,
        if article_count == 1 { "" } else { "s" }
    )
}

fn category_tag(slug: &str) -> String {
    let display = taxonomy::find(slug)
        .map(|c| c.title.to_string())
        .unwrap_or_else(|| slug.replace('-', " "));
    format!(
        r#"<span style="display: inline-block; background-color: #e8f4f8; color: #0066cc; padding: 4px 8px; border-radius: 4px; font-size: 12px; margin-right: 4px;">{display}</span>"#
    )
}

fn article_card(entry: &DigestEntry, app_base_url: &str) -> String {
    let article_link = format!("{}/article/{}", app_base_url, entry.article_id);

    let tags: String = entry
        .matched_categories
        .iter()
        .take(3)
        .map(|slug| category_tag(slug))
        .collect();

    let mut summary = entry.article_summary.clone();
    if summary.chars().count() > 300 {
        summary = summary.chars().take(297).collect::<String>() + "...";
    }

    format!(
        r#"<div style="background-color: #ffffff; border: 1px solid #e0e0e0; border-radius: 8px; padding: 20px; margin-bottom: 20px;">
  <span style="background-color: #ff6b35; color: white; padding: 4px 10px; border-radius: 4px; font-size: 12px; font-weight: bold;">Score: {score:.1}</span>
  <h2 style="margin: 12px 0; font-size: 20px; line-height: 1.4;"><a href="{article_link}" style="color: #1a1a1a; text-decoration: none;">{title}</a></h2>
  <div style="margin: 12px 0;">{tags}</div>
  <p style="color: #4a4a4a; line-height: 1.6; margin: 12px 0;">{summary}</p>
  <a href="{article_link}" style="color: #0066cc; text-decoration: none; font-weight: 500;">Read Article &rarr;</a>
</div>"#,
        score = entry.relevance_score,
        title = entry.title,
    )
}

/// Render the digest email body: a header with the article count and one
/// card per selected article, best match first.
pub fn render_digest(recipient: &str, entries: &[DigestEntry], app_base_url: &str) -> String {
    let cards: String = entries
        .iter()
        .map(|entry| article_card(entry, app_base_url))
        .collect();

    format!(
        r#"<!DOCTYPE html>
<html lang="en">
<head><meta charset="UTF-8"><title>Your Personalized Article Digest</title></head>
<body style="margin: 0; padding: 0; background-color: #f5f5f5; font-family: -apple-system, 'Segoe UI', Roboto, Arial, sans-serif;">
  <div style="max-width: 600px; margin: 0 auto; padding: 20px;">
    <div style="background-color: #1a1a1a; color: white; padding: 30px 20px; border-radius: 8px 8px 0 0; text-align: center;">
      <h1 style="margin: 0; font-size: 28px;">Your Personalized Article Digest</h1>
      <p style="margin: 10px 0 0; font-size: 16px;">{count} new article{plural} selected for you</p>
    </div>
    <div style="background-color: #f9f9f9; padding: 20px; border-radius: 0 0 8px 8px;">
      {cards}
      <div style="margin-top: 30px; padding-top: 20px; border-top: 1px solid #e0e0e0; text-align: center; color: #666666; font-size: 14px;">
        <p style="margin: 0 0 10px;">This digest was sent to {recipient}</p>
        <p style="margin: 0;"><a href="{app_base_url}/profile" style="color: #0066cc; text-decoration: none;">Manage your preferences</a></p>
      </div>
    </div>
  </div>
</body>
</html>"#,
        count = entries.len(),
        plural = if entries.len() == 1 { "" } else { "s" },
    )
}

/// Send each active user their unsent, sufficiently relevant articles. Rows
/// are flipped to sent only after the mailer confirms delivery, in one
/// update; a failed send leaves every candidate eligible for the next run.
pub async fn run(
    repo: &Repository,
    mailer: &dyn DigestMailer,
    config: &Config,
) -> Result<DigestReport> {
    let users = repo.active_users().await?;
    let mut report = DigestReport::default();

    for user in users {
        let entries = repo
            .digest_candidates(user.id, config.relevance_threshold, config.max_digest_size)
            .await?;

        if entries.is_empty() {
            report.skipped += 1;
            continue;
        }

        let html = render_digest(&user.email, &entries, &config.app_base_url);
        let subject = subject(entries.len());

        match mailer.send(&user.email, &subject, &html).await {
            Ok(()) => {
                let ids: Vec<i64> = entries.iter().map(|e| e.user_article_id).collect();
                repo.mark_sent(ids).await?;
                tracing::info!(
                    "Sent digest with {} articles to {}",
                    entries.len(),
                    user.email
                );
                report.sent += 1;
            }
            Err(e) => {
                // Nothing was mutated, the same articles go out next run
                tracing::error!("Failed to send digest to {}: {}", user.email, e);
                report.failed += 1;
            }
        }
    }

    Ok(report)
}
