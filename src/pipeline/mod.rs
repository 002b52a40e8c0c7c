//! The four-phase digest pipeline. Phases run in strict order and each one
//! derives its work set from "upstream row exists, downstream row missing",
//! so a run can stop anywhere and simply be re-run.

pub mod analyze;
pub mod digest;
pub mod ingest;
pub mod matcher;
pub mod scrape;

use std::future::Future;
use std::time::Duration;

use crate::clients::{AnalysisModel, ArticleFetcher, DigestMailer, FeedSource, SimilarityModel};
use crate::config::Config;
use crate::db::Repository;
use crate::error::Result;

/// Retry a transient-failure-prone operation with exponential backoff.
/// Non-transient errors fail immediately.
pub async fn retry_with_backoff<T, F, Fut>(
    attempts: u32,
    base_delay: Duration,
    mut op: F,
) -> Result<T>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T>>,
{
    let attempts = attempts.max(1);
    let mut delay = base_delay;

    for attempt in 1..=attempts {
        match op().await {
            Ok(value) => return Ok(value),
            Err(e) if e.is_transient() && attempt < attempts => {
                tracing::warn!(
                    "Attempt {}/{} failed ({}), retrying in {:?}",
                    attempt,
                    attempts,
                    e,
                    delay
                );
                tokio::time::sleep(delay).await;
                delay *= 2;
            }
            Err(e) => return Err(e),
        }
    }

    unreachable!("retry loop always returns")
}

/// Run the whole pipeline once: ingest, scrape, analyze, match, dispatch.
/// The mailer is optional so an unconfigured deployment can still run the
/// enrichment phases; dispatch is skipped with a warning in that case.
#[allow(clippy::too_many_arguments)]
pub async fn run_all(
    repo: &Repository,
    feed: &dyn FeedSource,
    fetcher: &dyn ArticleFetcher,
    analysis: &dyn AnalysisModel,
    similarity: Option<&dyn SimilarityModel>,
    mailer: Option<&dyn DigestMailer>,
    config: &Config,
) -> Result<()> {
    let report = ingest::run(repo, feed, config.top_stories_limit).await?;
    tracing::info!(
        "Ingest done: {} inserted, {} updated, {} failed",
        report.inserted,
        report.updated,
        report.failed
    );

    let report = scrape::run(repo, feed, fetcher, config).await?;
    tracing::info!(
        "Scrape done: {} scraped, {} failed",
        report.scraped,
        report.failed
    );

    let report = analyze::run(repo, analysis, config).await?;
    tracing::info!(
        "Analyze done: {} analyzed, {} failed",
        report.analyzed,
        report.failed
    );

    let report = matcher::run(repo, similarity, config).await?;
    tracing::info!(
        "Match done: {} matched across {} users",
        report.matched,
        report.users
    );

    match mailer {
        Some(mailer) => {
            let report = digest::run(repo, mailer, config).await?;
            tracing::info!(
                "Dispatch done: {} digests sent, {} failed",
                report.sent,
                report.failed
            );
        }
        None => tracing::warn!("No mail API key configured, skipping dispatch"),
    }

    Ok(())
}
