use futures::stream::{self, StreamExt};

use crate::clients::SimilarityModel;
use crate::config::Config;
use crate::db::{MatchCandidate, Repository};
use crate::error::Result;
use crate::models::{NewUserArticle, User};

#[derive(Debug, Default)]
pub struct MatchReport {
    pub users: usize,
    pub matched: usize,
}

/// The relevance combining policy. The blend between category overlap and
/// semantic similarity is a parameter; the result is always in [0.0, 5.0]
/// and strictly monotonic in overlap size.
#[derive(Debug, Clone, Copy)]
pub struct RelevancePolicy {
    overlap_weight: f64,
}

impl RelevancePolicy {
    pub fn new(overlap_weight: f64) -> Self {
        Self {
            overlap_weight: overlap_weight.clamp(0.01, 1.0),
        }
    }

    /// The overlap component: the matched fraction of the user's preferred
    /// categories, scaled onto [0, 5].
    fn overlap_component(&self, matched: usize, user_categories: usize) -> f64 {
        if user_categories == 0 {
            return 0.0;
        }
        5.0 * matched.min(user_categories) as f64 / user_categories as f64
    }

    /// Combine overlap with the semantic similarity score when one is
    /// available. Without similarity the overlap component stands alone,
    /// which keeps scoring deterministic when the capability is down.
    pub fn score(&self, matched: usize, user_categories: usize, similarity: Option<f64>) -> f64 {
        let overlap = self.overlap_component(matched, user_categories);
        let score = match similarity {
            Some(sim) => {
                self.overlap_weight * overlap + (1.0 - self.overlap_weight) * sim.clamp(0.0, 5.0)
            }
            None => overlap,
        };
        score.clamp(0.0, 5.0)
    }
}

async fn match_user(
    repo: &Repository,
    similarity: Option<&dyn SimilarityModel>,
    policy: RelevancePolicy,
    user: &User,
) -> Result<usize> {
    let candidates = repo.match_candidates(user.id).await?;
    tracing::debug!("User {}: {} candidate articles", user.id, candidates.len());

    let mut matched_count = 0;

    for candidate in candidates {
        let matched: Vec<String> = user
            .categories
            .iter()
            .filter(|slug| candidate.categories.contains(slug))
            .cloned()
            .collect();

        let sim = similarity_score(similarity, user, &candidate, !matched.is_empty()).await;
        let relevance_score = policy.score(matched.len(), user.categories.len(), sim);

        if !matched.is_empty() {
            matched_count += 1;
        }

        repo.insert_user_article(NewUserArticle {
            user_id: user.id,
            article_id: candidate.article_id,
            matched_categories: matched,
            relevance_score,
        })
        .await?;
    }

    Ok(matched_count)
}

/// Ask the similarity capability for a score, when there is anything to
/// compare and the capability is present. Failures degrade to overlap-only
/// scoring rather than failing the pair.
async fn similarity_score(
    similarity: Option<&dyn SimilarityModel>,
    user: &User,
    candidate: &MatchCandidate,
    has_overlap: bool,
) -> Option<f64> {
    if !has_overlap || user.description.is_empty() || candidate.article_summary.is_empty() {
        return None;
    }
    let model = similarity?;

    match model
        .similarity(&user.description, &candidate.article_summary)
        .await
    {
        Ok(score) => Some(score),
        Err(e) => {
            tracing::warn!("Similarity scoring failed for user {}: {}", user.id, e);
            None
        }
    }
}

/// Create a personalization record for every (user, analyzed article) pair
/// that does not have one yet.
pub async fn run(
    repo: &Repository,
    similarity: Option<&dyn SimilarityModel>,
    config: &Config,
) -> Result<MatchReport> {
    let policy = RelevancePolicy::new(config.overlap_weight);
    let users: Vec<User> = repo
        .active_users()
        .await?
        .into_iter()
        .filter(|u| !u.categories.is_empty())
        .collect();

    tracing::info!("Matching articles for {} users", users.len());

    // Users are independent; the AI similarity backend is the bottleneck.
    let counts: Vec<usize> = stream::iter(&users)
        .map(|user| async move {
            match match_user(repo, similarity, policy, user).await {
                Ok(count) => count,
                Err(e) => {
                    tracing::warn!("Matching failed for user {}: {}", user.id, e);
                    0
                }
            }
        })
        .buffer_unordered(config.analyze_concurrency.max(1))
        .collect()
        .await;

    Ok(MatchReport {
        users: users.len(),
        matched: counts.iter().sum(),
    })
}
