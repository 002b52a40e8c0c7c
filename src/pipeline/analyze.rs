use std::time::Duration;

use futures::stream::{self, StreamExt};

use crate::clients::{AnalysisModel, RawAnalysis};
use crate::config::Config;
use crate::db::{PendingAnalysis, Repository};
use crate::error::{AppError, Result};
use crate::models::{NewAnalysis, Scores};
use crate::taxonomy;

use super::retry_with_backoff;

/// Score used when the model omits or mangles a value.
pub const NEUTRAL_SCORE: f64 = 3.0;

const BACKOFF_BASE: Duration = Duration::from_secs(1);

#[derive(Debug, Default)]
pub struct AnalyzeReport {
    pub analyzed: usize,
    pub failed: usize,
}

fn clamp_score(value: Option<f64>) -> f64 {
    match value {
        Some(v) if v.is_finite() => v.clamp(1.0, 5.0),
        _ => NEUTRAL_SCORE,
    }
}

/// Turn the model's untrusted output into a committable analysis: unknown
/// categories are dropped, scores clamped into [1.0, 5.0], missing scores
/// defaulted. An article may legitimately end up with zero categories.
pub fn sanitize(raw: RawAnalysis, content_id: i64, model_version: String) -> NewAnalysis {
    NewAnalysis {
        content_id,
        article_summary: raw.article_summary,
        comments_summary: raw.comments_summary,
        categories: taxonomy::sanitize_slugs(&raw.categories),
        scores: Scores {
            relevance: clamp_score(raw.relevance),
            trustworthiness: clamp_score(raw.trustworthiness),
            controversy: clamp_score(raw.controversy),
        },
        model_version,
    }
}

async fn analyze_one(
    repo: &Repository,
    model: &dyn AnalysisModel,
    pending: &PendingAnalysis,
    config: &Config,
) -> Result<bool> {
    let raw = retry_with_backoff(config.analyze_retry_budget, BACKOFF_BASE, || async {
        let raw = model
            .analyze(&pending.title, &pending.content.article, &pending.content.comments)
            .await?;
        // A reply with no summary at all is malformed enough to retry
        if raw.article_summary.trim().is_empty() {
            return Err(AppError::AiApi("reply carried no article summary".to_string()));
        }
        Ok(raw)
    })
    .await?;

    let analysis = sanitize(raw, pending.content.id, model.model_version().to_string());
    repo.insert_analysis(analysis).await
}

/// Analyze every content row without an analysis, bounded by the configured
/// concurrency. Retries happen per item with exponential backoff; an item
/// that exhausts its budget is marked permanently failed and skipped until
/// a forced refresh.
pub async fn run(
    repo: &Repository,
    model: &dyn AnalysisModel,
    config: &Config,
) -> Result<AnalyzeReport> {
    let pending = repo.contents_needing_analysis().await?;
    tracing::info!("Analyzing {} contents", pending.len());

    let results: Vec<bool> = stream::iter(&pending)
        .map(|item| async move {
            match analyze_one(repo, model, item, config).await {
                Ok(_) => true,
                Err(e) => {
                    tracing::warn!(
                        "Analysis failed for content {} ({}): {}",
                        item.content.id,
                        item.title,
                        e
                    );
                    if let Err(e) = repo.mark_analyze_failed(item.content.id).await {
                        tracing::error!("Failed to mark analysis failure: {}", e);
                    }
                    false
                }
            }
        })
        .buffer_unordered(config.analyze_concurrency.max(1))
        .collect()
        .await;

    let analyzed = results.iter().filter(|ok| **ok).count();
    Ok(AnalyzeReport {
        analyzed,
        failed: results.len() - analyzed,
    })
}
