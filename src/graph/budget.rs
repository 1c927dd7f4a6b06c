//! Budget governance for the path graph.
//!
//! After every scoring round the governor reviews each path's score history.
//! A path that keeps scoring badly gets force-pruned instead of consuming
//! more budget; a path scoring exceptionally well earns extra depth and
//! token allowance. Force-pruning is a normal outcome recorded in the
//! operation log, not an error.

use std::collections::HashSet;

use serde::{Deserialize, Serialize};
use tracing::{info, warn};

/// Reviews score histories and decides prunes and extensions.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BudgetGovernor {
    /// Scores below this count toward the circuit break.
    pub score_threshold: f64,
    /// Trailing low scores required to trip the break.
    pub consecutive_threshold: usize,
    /// Latest score above this earns a budget extension.
    pub extend_threshold: f64,
    /// Depth levels granted per extension.
    pub extension_depth: i32,
    /// Token allowance granted per extension.
    pub extension_tokens: i64,
}

impl Default for BudgetGovernor {
    fn default() -> Self {
        Self {
            score_threshold: 5.0,
            consecutive_threshold: 3,
            extend_threshold: 9.0,
            extension_depth: 2,
            extension_tokens: 50_000,
        }
    }
}

/// Verdict for one path in a budget review.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PathReview {
    /// The reviewed path.
    pub path_id: String,
    /// Why the verdict was reached.
    pub reason: String,
}

/// Outcome of reviewing a round of score histories.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct BudgetReview {
    /// Paths to force-prune.
    pub force_prune: Vec<PathReview>,
    /// Paths granted a budget extension.
    pub extend: Vec<PathReview>,
}

impl BudgetReview {
    /// Whether the review changed nothing.
    pub fn is_empty(&self) -> bool {
        self.force_prune.is_empty() && self.extend.is_empty()
    }
}

impl BudgetGovernor {
    /// Create a governor with explicit thresholds.
    pub fn new(score_threshold: f64, consecutive_threshold: usize, extend_threshold: f64) -> Self {
        Self {
            score_threshold,
            consecutive_threshold,
            extend_threshold,
            ..Self::default()
        }
    }

    /// Review the score histories of a session's live paths. Each history is
    /// ordered oldest to newest.
    pub fn review<'a>(
        &self,
        histories: impl IntoIterator<Item = (&'a str, &'a [f64])>,
    ) -> BudgetReview {
        let mut review = BudgetReview::default();

        for (path_id, scores) in histories {
            if self.trips_circuit(scores) {
                let reason = format!(
                    "{} consecutive scores below {:.1}",
                    self.consecutive_threshold, self.score_threshold
                );
                warn!(path_id = %path_id, reason = %reason, "Force-pruning path");
                review.force_prune.push(PathReview {
                    path_id: path_id.to_string(),
                    reason,
                });
                continue;
            }

            if let Some(latest) = scores.last() {
                if *latest > self.extend_threshold {
                    let reason = format!(
                        "score {:.1} above {:.1}, extending budget",
                        latest, self.extend_threshold
                    );
                    info!(path_id = %path_id, score = latest, "Extending path budget");
                    review.extend.push(PathReview {
                        path_id: path_id.to_string(),
                        reason,
                    });
                }
            }
        }

        review
    }

    fn trips_circuit(&self, scores: &[f64]) -> bool {
        if scores.len() < self.consecutive_threshold {
            return false;
        }
        scores[scores.len() - self.consecutive_threshold..]
            .iter()
            .all(|s| *s < self.score_threshold)
    }
}

/// Decides whether a candidate line of research adds anything new over what
/// the session already holds. Consulted before expansion; a swapped-in
/// implementation can use embeddings or an external judge.
pub trait NoveltyGate: Send + Sync {
    /// True when the candidate is novel enough to pursue.
    fn is_novel(&self, candidate: &str, existing: &[String]) -> bool;
}

/// Token-overlap novelty gate.
///
/// Rejects a candidate whose Jaccard similarity against any existing
/// document exceeds the configured ceiling.
#[derive(Debug, Clone)]
pub struct JaccardNoveltyGate {
    /// Highest similarity still considered novel.
    pub max_similarity: f64,
}

impl Default for JaccardNoveltyGate {
    fn default() -> Self {
        Self { max_similarity: 0.8 }
    }
}

impl JaccardNoveltyGate {
    /// Create a gate with an explicit similarity ceiling.
    pub fn new(max_similarity: f64) -> Self {
        Self { max_similarity }
    }

    fn similarity(a: &str, b: &str) -> f64 {
        let tokens_a: HashSet<String> = tokenize(a);
        let tokens_b: HashSet<String> = tokenize(b);
        if tokens_a.is_empty() && tokens_b.is_empty() {
            return 1.0;
        }
        let intersection = tokens_a.intersection(&tokens_b).count();
        let union = tokens_a.union(&tokens_b).count();
        intersection as f64 / union as f64
    }
}

fn tokenize(text: &str) -> HashSet<String> {
    text.split(|c: char| !c.is_alphanumeric())
        .filter(|t| !t.is_empty())
        .map(|t| t.to_lowercase())
        .collect()
}

impl NoveltyGate for JaccardNoveltyGate {
    fn is_novel(&self, candidate: &str, existing: &[String]) -> bool {
        existing
            .iter()
            .all(|doc| Self::similarity(candidate, doc) <= self.max_similarity)
    }
}
