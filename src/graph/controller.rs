//! Graph controller: plans and persists path graph operations.
//!
//! The controller owns the session's graph semantics. It never executes a
//! search or calls a model; step execution belongs to the orchestration
//! loop's executor. Each public operation validates, builds the mutation,
//! and hands storage one atomic commit paired with its operation-log entry.

use serde_json::json;
use tracing::{debug, info, warn};

use crate::conflict::{detect_conflicts, Conflict, ConflictTolerance};
use crate::error::{GraphError, GraphResult};
use crate::facts::Fact;
use crate::graph::budget::{BudgetGovernor, BudgetReview};
use crate::graph::scoring::score_path;
use crate::graph::{
    AggregationResult, AngleTemplate, GenerateStrategy, GraphOperation, OperationKind,
    PathMetadata, PathScore, PathStatus, ResearchPath, ResearchStep, StepAction, StepType,
    AGGREGATE_PATH_SCORE,
};
use crate::storage::{AggregateCommit, Storage};

/// Placeholder confidence reported for aggregation results until a real
/// evaluator exists.
const AGGREGATE_CONFIDENCE: f64 = 0.8;

/// Controller over a storage backend.
pub struct GraphController<S: Storage> {
    storage: S,
    angles: Vec<AngleTemplate>,
    governor: BudgetGovernor,
    tolerance: ConflictTolerance,
    max_depth: i32,
}

impl<S: Storage> GraphController<S> {
    /// Create a controller with the default angle set and thresholds.
    pub fn new(storage: S) -> Self {
        Self {
            storage,
            angles: AngleTemplate::defaults(),
            governor: BudgetGovernor::default(),
            tolerance: ConflictTolerance::default(),
            max_depth: 3,
        }
    }

    /// Override the angle templates used for generation.
    pub fn with_angles(mut self, angles: Vec<AngleTemplate>) -> Self {
        self.angles = angles;
        self
    }

    /// Override the budget governor.
    pub fn with_governor(mut self, governor: BudgetGovernor) -> Self {
        self.governor = governor;
        self
    }

    /// Override the conflict tolerance used during aggregation.
    pub fn with_tolerance(mut self, tolerance: ConflictTolerance) -> Self {
        self.tolerance = tolerance;
        self
    }

    /// Override the default per-path depth ceiling.
    pub fn with_max_depth(mut self, max_depth: i32) -> Self {
        self.max_depth = max_depth;
        self
    }

    /// Access the underlying storage.
    pub fn storage(&self) -> &S {
        &self.storage
    }

    /// Generate `k` research path shells for a topic.
    ///
    /// Focus templates are assigned round-robin; each path gets one pending
    /// search step. Nothing is executed. The k nodes and the Generate log
    /// entry commit together.
    pub async fn generate_paths(
        &self,
        session_id: &str,
        topic: &str,
        k: usize,
        strategy: GenerateStrategy,
    ) -> GraphResult<Vec<ResearchPath>> {
        if topic.trim().is_empty() {
            return Err(GraphError::Validation {
                field: "topic".to_string(),
                reason: "Topic cannot be empty".to_string(),
            });
        }
        if k == 0 {
            return Err(GraphError::Validation {
                field: "k".to_string(),
                reason: "At least one path must be requested".to_string(),
            });
        }

        let mut paths = Vec::with_capacity(k);
        for i in 0..k {
            let angle = &self.angles[i % self.angles.len()];
            let query = angle.render(topic);

            let mut metadata = PathMetadata::default();
            metadata.max_depth = self.max_depth;
            metadata.strategy = strategy;

            let path = ResearchPath::new(session_id, &angle.focus, &query)
                .with_step(ResearchStep::new(StepType::Search, StepAction::Search, &query))
                .with_metadata(metadata);
            paths.push(path);
        }

        let op = GraphOperation::new(session_id, OperationKind::Generate)
            .with_outputs(paths.iter().map(|p| p.id.clone()).collect())
            .with_detail(json!({
                "topic": topic,
                "k": k,
                "strategy": strategy.to_string(),
            }));

        let stored = self.storage.commit_generate(&paths, &op).await?;

        info!(
            session_id = %session_id,
            topic = %topic,
            generated_count = stored.len(),
            strategy = %strategy,
            "Generated research paths"
        );

        Ok(stored)
    }

    /// Refine a path with optional feedback, moving it to `depth`.
    ///
    /// `depth` is the depth the caller expects the path to reach. A call
    /// whose depth the path already has is a replay and returns the stored
    /// path unchanged, so retries after a crash are safe.
    pub async fn refine_path(
        &self,
        path_id: &str,
        feedback: Option<&str>,
        depth: i32,
    ) -> GraphResult<ResearchPath> {
        let path = self
            .storage
            .get_path(path_id)
            .await?
            .ok_or_else(|| GraphError::NotFound {
                path_id: path_id.to_string(),
            })?;

        if path.status.is_terminal() {
            return Err(GraphError::InvalidTransition {
                path_id: path_id.to_string(),
                from: path.status,
                to: PathStatus::Refined,
            });
        }

        if path.metadata.depth == depth {
            debug!(path_id = %path_id, depth = depth, "Refine replay, returning stored path");
            return Ok(path);
        }

        if depth != path.metadata.depth + 1 {
            return Err(GraphError::Validation {
                field: "depth".to_string(),
                reason: format!(
                    "Expected depth {} or {}, got {}",
                    path.metadata.depth,
                    path.metadata.depth + 1,
                    depth
                ),
            });
        }

        if depth > path.metadata.effective_max_depth() {
            return Err(GraphError::Validation {
                field: "depth".to_string(),
                reason: format!(
                    "Maximum depth {} reached",
                    path.metadata.effective_max_depth()
                ),
            });
        }

        let previous_status = path.status;
        let new_query = match feedback {
            Some(f) if !f.trim().is_empty() => format!("{} focusing on {}", path.query, f.trim()),
            _ => format!("detailed analysis of {}", path.query),
        };

        let mut refined = path.clone();
        refined.query = new_query.clone();
        refined.status = PathStatus::Refined;
        refined.metadata.depth = depth;
        refined.updated_at = chrono::Utc::now();
        refined
            .steps
            .push(ResearchStep::new(StepType::Analyze, StepAction::Refine, &new_query));

        let op = GraphOperation::new(&refined.session_id, OperationKind::Refine)
            .with_inputs(vec![path.id.clone()])
            .with_outputs(vec![refined.id.clone()])
            .with_detail(json!({
                "feedback": feedback,
                "depth": depth,
            }));

        if !self.storage.commit_refine(&refined, &op).await? {
            return Err(GraphError::Stale {
                path_id: path_id.to_string(),
                expected: previous_status,
            });
        }

        info!(
            session_id = %refined.session_id,
            path_id = %refined.id,
            depth = depth,
            "Refined research path"
        );

        Ok(refined)
    }

    /// Score a batch of paths and persist the results.
    ///
    /// Scoring itself is pure; the new scores and the Score log entry
    /// commit together.
    pub async fn score_paths(
        &self,
        session_id: &str,
        paths: &[ResearchPath],
    ) -> GraphResult<Vec<PathScore>> {
        let mut results = Vec::with_capacity(paths.len());
        let mut updates = Vec::with_capacity(paths.len());
        let mut score_map = serde_json::Map::new();

        for path in paths {
            let (score, breakdown) = score_path(path);
            updates.push((path.id.clone(), score));
            score_map.insert(path.id.clone(), json!(score));
            results.push(PathScore {
                path_id: path.id.clone(),
                score,
                kept: true,
                breakdown,
            });
        }

        let op = GraphOperation::new(session_id, OperationKind::Score)
            .with_inputs(paths.iter().map(|p| p.id.clone()).collect())
            .with_detail(json!({ "scores": score_map }));

        self.storage.commit_scores(&updates, &op).await?;

        info!(
            session_id = %session_id,
            scored_count = results.len(),
            "Scored research paths"
        );

        Ok(results)
    }

    /// Keep the top `n` live paths by score and prune the rest.
    ///
    /// Ordering is deterministic: score descending, creation sequence
    /// ascending on ties. Pruned rows are retained with status `pruned`.
    pub async fn keep_best_n(&self, session_id: &str, n: usize) -> GraphResult<Vec<PathScore>> {
        let live = self
            .storage
            .get_session_paths(session_id, &[PathStatus::Active, PathStatus::Refined])
            .await?;

        let ranked = rank_paths(&live);
        let kept_ids: Vec<String> = ranked.iter().take(n).map(|p| p.id.clone()).collect();
        let pruned_ids: Vec<String> = ranked.iter().skip(n).map(|p| p.id.clone()).collect();

        let op = GraphOperation::new(session_id, OperationKind::KeepBestN)
            .with_inputs(pruned_ids.clone())
            .with_detail(json!({
                "n": n,
                "kept": kept_ids,
                "pruned": pruned_ids,
            }));

        let pruned_count = self.storage.commit_prune(&pruned_ids, &op).await?;

        info!(
            session_id = %session_id,
            kept_count = kept_ids.len(),
            pruned_count = pruned_count,
            "Keep-best-n completed"
        );

        let kept_set: std::collections::HashSet<&String> = kept_ids.iter().collect();
        Ok(ranked
            .into_iter()
            .map(|path| {
                let (score, breakdown) = score_path(&path);
                PathScore {
                    kept: kept_set.contains(&path.id),
                    path_id: path.id,
                    score,
                    breakdown,
                }
            })
            .collect())
    }

    /// Review the session's score histories against the budget governor.
    ///
    /// Histories are rebuilt from the Score entries in the operation log,
    /// so the review survives process restarts.
    pub async fn budget_review(&self, session_id: &str) -> GraphResult<BudgetReview> {
        let live = self
            .storage
            .get_session_paths(session_id, &[PathStatus::Active, PathStatus::Refined])
            .await?;
        let operations = self.storage.get_session_operations(session_id).await?;

        let mut histories: Vec<(String, Vec<f64>)> = live
            .iter()
            .map(|p| (p.id.clone(), Vec::new()))
            .collect();

        for operation in &operations {
            if operation.kind != OperationKind::Score {
                continue;
            }
            let Some(scores) = operation.detail.get("scores").and_then(|v| v.as_object())
            else {
                continue;
            };
            for (path_id, history) in histories.iter_mut() {
                if let Some(score) = scores.get(path_id).and_then(|v| v.as_f64()) {
                    history.push(score);
                }
            }
        }

        Ok(self
            .governor
            .review(histories.iter().map(|(id, h)| (id.as_str(), h.as_slice()))))
    }

    /// Apply a budget review: force-prune broken paths and extend the
    /// budget of exceptional ones.
    pub async fn apply_budget_review(
        &self,
        session_id: &str,
        review: &BudgetReview,
    ) -> GraphResult<()> {
        if !review.force_prune.is_empty() {
            let pruned_ids: Vec<String> =
                review.force_prune.iter().map(|r| r.path_id.clone()).collect();
            let reasons: serde_json::Map<String, serde_json::Value> = review
                .force_prune
                .iter()
                .map(|r| (r.path_id.clone(), json!(r.reason)))
                .collect();

            let op = GraphOperation::new(session_id, OperationKind::KeepBestN)
                .with_inputs(pruned_ids.clone())
                .with_detail(json!({
                    "circuit_break": true,
                    "reasons": reasons,
                }));

            let pruned = self.storage.commit_prune(&pruned_ids, &op).await?;
            warn!(
                session_id = %session_id,
                pruned_count = pruned,
                "Circuit break force-pruned paths"
            );
        }

        for extension in &review.extend {
            let Some(mut path) = self.storage.get_path(&extension.path_id).await? else {
                continue;
            };
            if path.status.is_terminal() {
                continue;
            }
            path.metadata.extra_depth += self.governor.extension_depth;
            path.metadata.extra_tokens += self.governor.extension_tokens;
            path.updated_at = chrono::Utc::now();
            self.storage.upsert_path(&path).await?;

            info!(
                session_id = %session_id,
                path_id = %path.id,
                extra_depth = path.metadata.extra_depth,
                "Extended path budget"
            );
        }

        Ok(())
    }

    /// Aggregate paths into a synthesis node.
    ///
    /// Inputs must still be live when the commit lands; the check is
    /// repeated inside the transaction and any miss aborts with `Stale`.
    /// Facts referenced by the source paths are run through the conflict
    /// resolver and the findings attached to the result.
    pub async fn aggregate_paths(
        &self,
        session_id: &str,
        path_ids: &[String],
        facts: &[Fact],
    ) -> GraphResult<AggregationResult> {
        if path_ids.len() < 2 {
            return Err(GraphError::Validation {
                field: "path_ids".to_string(),
                reason: "At least 2 paths required for aggregation".to_string(),
            });
        }

        let mut sources = Vec::with_capacity(path_ids.len());
        for id in path_ids {
            let path = self
                .storage
                .get_path(id)
                .await?
                .ok_or_else(|| GraphError::NotFound {
                    path_id: id.clone(),
                })?;
            if path.status.is_terminal() {
                return Err(GraphError::InvalidTransition {
                    path_id: id.clone(),
                    from: path.status,
                    to: PathStatus::Aggregated,
                });
            }
            sources.push(path);
        }

        let content = synthesize_content(&sources);
        let conflicts: Vec<Conflict> = detect_conflicts(facts, &self.tolerance);

        let max_depth = sources.iter().map(|p| p.metadata.depth).max().unwrap_or(0);
        let mut metadata = PathMetadata::default();
        metadata.depth = max_depth + 1;
        metadata.max_depth = self.max_depth;

        let aggregated = ResearchPath::new(
            session_id,
            "Aggregated Research",
            format!("synthesis of {} research paths", sources.len()),
        )
        .with_step(
            ResearchStep::new(
                StepType::Synthesize,
                StepAction::Aggregate,
                "synthesize findings across paths",
            )
            .with_output(content.clone()),
        )
        .with_metadata(metadata)
        .with_score(AGGREGATE_PATH_SCORE);

        let op = GraphOperation::new(session_id, OperationKind::Aggregate)
            .with_inputs(path_ids.to_vec())
            .with_outputs(vec![aggregated.id.clone()])
            .with_detail(json!({
                "aggregated_path_id": aggregated.id,
                "source_count": sources.len(),
                "conflict_count": conflicts.len(),
            }));

        let stored = match self
            .storage
            .commit_aggregate(&aggregated, path_ids, &op)
            .await?
        {
            AggregateCommit::Committed(path) => path,
            AggregateCommit::Stale(stale_ids) => {
                let path_id = stale_ids.into_iter().next().unwrap_or_default();
                return Err(GraphError::Stale {
                    path_id,
                    expected: PathStatus::Active,
                });
            }
        };

        info!(
            session_id = %session_id,
            aggregated_path_id = %stored.id,
            source_count = sources.len(),
            conflict_count = conflicts.len(),
            "Aggregated research paths"
        );

        Ok(AggregationResult {
            session_id: session_id.to_string(),
            aggregated_path_id: stored.id,
            content,
            confidence: AGGREGATE_CONFIDENCE,
            source_paths: path_ids.to_vec(),
            conflicts,
        })
    }

    /// Reload a session's live paths from storage.
    pub async fn load_session(&self, session_id: &str) -> GraphResult<Vec<ResearchPath>> {
        let paths = self
            .storage
            .get_session_paths(session_id, &[PathStatus::Active, PathStatus::Refined])
            .await?;

        debug!(
            session_id = %session_id,
            path_count = paths.len(),
            "Loaded session paths"
        );

        Ok(paths)
    }

    /// Persist executed step outputs for a path.
    ///
    /// Rejected once the path is terminal: executors that finish late must
    /// not resurrect pruned work.
    pub async fn save_path(&self, path: &ResearchPath) -> GraphResult<()> {
        let current = self
            .storage
            .get_path(&path.id)
            .await?
            .ok_or_else(|| GraphError::NotFound {
                path_id: path.id.clone(),
            })?;

        if current.status.is_terminal() {
            return Err(GraphError::InvalidTransition {
                path_id: path.id.clone(),
                from: current.status,
                to: path.status,
            });
        }

        self.storage.upsert_path(path).await?;
        Ok(())
    }
}

/// Deterministic ranking: score descending, creation sequence ascending on
/// ties.
fn rank_paths(paths: &[ResearchPath]) -> Vec<ResearchPath> {
    let mut ranked: Vec<ResearchPath> = paths.to_vec();
    ranked.sort_by(|a, b| {
        b.score
            .partial_cmp(&a.score)
            .unwrap_or(std::cmp::Ordering::Equal)
            .then(a.seq.cmp(&b.seq))
    });
    ranked
}

/// Concatenate source path findings into one synthesis document.
fn synthesize_content(sources: &[ResearchPath]) -> String {
    let mut sections = Vec::with_capacity(sources.len());
    for path in sources {
        let body = path.content();
        if body.is_empty() {
            sections.push(format!("## {}\n\n(no findings recorded)", path.focus));
        } else {
            sections.push(format!("## {}\n\n{}", path.focus, body));
        }
    }
    format!("# Aggregated Research\n\n{}", sections.join("\n\n"))
}
