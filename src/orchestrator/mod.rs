//! Orchestration loop driving a research session end to end.
//!
//! The loop owns sequencing only: generate, execute, score, review budgets,
//! prune, refine, aggregate. Step execution is delegated to a `PathExecutor`
//! implementation supplied by the caller. Budgets are enforced between
//! rounds, never mid-round, so a round that started always commits whole.
//! Running out of budget or rounds is a successful terminal outcome with a
//! reason attached, not an error.

use std::time::Instant;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use crate::error::{AppError, AppResult};
use crate::facts::Fact;
use crate::graph::{
    AggregationResult, GenerateStrategy, GraphController, JaccardNoveltyGate, NoveltyGate,
    PathStatus, ResearchPath, StepStatus,
};
use crate::storage::Storage;

/// Executes a single research step query and returns its output document.
///
/// Implementations wrap whatever actually does the work: a search backend,
/// a model call, a fixture in tests. The loop treats it as opaque.
#[async_trait]
pub trait PathExecutor: Send + Sync {
    /// Run a query and return the output text.
    async fn run_query(&self, query: &str) -> AppResult<String>;
}

/// Loop tuning knobs.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoopConfig {
    /// Paths generated in the opening round.
    pub paths_per_round: usize,
    /// Live paths kept after each scoring round.
    pub keep_n: usize,
    /// Hard cap on rounds.
    pub max_rounds: usize,
    /// Normalized score (0.0-1.0) at which the loop aggregates and stops.
    pub confidence_threshold: f64,
    /// Wall-clock budget in seconds, checked between rounds.
    pub wall_clock_secs: u64,
    /// Approximate token budget, checked between rounds.
    pub token_budget: i64,
}

impl Default for LoopConfig {
    fn default() -> Self {
        Self {
            paths_per_round: 3,
            keep_n: 3,
            max_rounds: 10,
            confidence_threshold: 0.9,
            wall_clock_secs: 600,
            token_budget: 1_000_000,
        }
    }
}

/// Why the loop stopped. All variants are successful terminations.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TerminationReason {
    /// A path crossed the confidence threshold.
    ConfidenceReached,
    /// Wall-clock or token budget ran out between rounds.
    BudgetExhausted,
    /// The round cap was hit.
    MaxRoundsReached,
    /// Every path was pruned before anything could be aggregated.
    AllPathsPruned,
}

impl std::fmt::Display for TerminationReason {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            TerminationReason::ConfidenceReached => write!(f, "confidence_reached"),
            TerminationReason::BudgetExhausted => write!(f, "budget_exhausted"),
            TerminationReason::MaxRoundsReached => write!(f, "max_rounds_reached"),
            TerminationReason::AllPathsPruned => write!(f, "all_paths_pruned"),
        }
    }
}

/// Final report of a loop run.
#[derive(Debug, Clone)]
pub struct LoopOutcome {
    /// Why the loop stopped.
    pub reason: TerminationReason,
    /// How many rounds completed.
    pub rounds: usize,
    /// The closing aggregation, when at least two paths survived to be
    /// merged.
    pub aggregation: Option<AggregationResult>,
}

/// Drives a `GraphController` with an executor until a terminal condition.
pub struct Orchestrator<S: Storage, E: PathExecutor> {
    controller: GraphController<S>,
    executor: E,
    novelty: Box<dyn NoveltyGate>,
    config: LoopConfig,
}

impl<S: Storage, E: PathExecutor> Orchestrator<S, E> {
    /// Create an orchestrator with the default config and novelty gate.
    pub fn new(controller: GraphController<S>, executor: E) -> Self {
        Self {
            controller,
            executor,
            novelty: Box::new(JaccardNoveltyGate::default()),
            config: LoopConfig::default(),
        }
    }

    /// Override the loop configuration.
    pub fn with_config(mut self, config: LoopConfig) -> Self {
        self.config = config;
        self
    }

    /// Swap in a different novelty gate.
    pub fn with_novelty_gate(mut self, gate: Box<dyn NoveltyGate>) -> Self {
        self.novelty = gate;
        self
    }

    /// Access the controller.
    pub fn controller(&self) -> &GraphController<S> {
        &self.controller
    }

    /// Run a full research session for a topic.
    pub async fn run(
        &self,
        session_id: &str,
        topic: &str,
        facts: &[Fact],
    ) -> AppResult<LoopOutcome> {
        let start = Instant::now();
        let mut tokens_used: i64 = 0;

        self.controller
            .generate_paths(
                session_id,
                topic,
                self.config.paths_per_round,
                GenerateStrategy::Diverse,
            )
            .await?;

        let mut rounds = 0usize;
        while rounds < self.config.max_rounds {
            rounds += 1;

            let mut paths = self.controller.load_session(session_id).await?;
            if paths.is_empty() {
                info!(session_id = %session_id, rounds, "All paths pruned, stopping");
                return Ok(LoopOutcome {
                    reason: TerminationReason::AllPathsPruned,
                    rounds,
                    aggregation: None,
                });
            }

            tokens_used += self.execute_pending_steps(&mut paths).await?;

            let scores = self.controller.score_paths(session_id, &paths).await?;
            let best = scores.iter().map(|s| s.score).fold(0.0f64, f64::max);

            let review = self.controller.budget_review(session_id).await?;
            if !review.is_empty() {
                self.controller
                    .apply_budget_review(session_id, &review)
                    .await?;
            }

            self.controller
                .keep_best_n(session_id, self.config.keep_n)
                .await?;

            if best / 10.0 >= self.config.confidence_threshold {
                info!(
                    session_id = %session_id,
                    best_score = best,
                    rounds,
                    "Confidence threshold reached"
                );
                let aggregation = self.close_out(session_id, facts).await?;
                return Ok(LoopOutcome {
                    reason: TerminationReason::ConfidenceReached,
                    rounds,
                    aggregation,
                });
            }

            // Budgets apply between rounds only.
            if start.elapsed().as_secs() >= self.config.wall_clock_secs
                || tokens_used >= self.config.token_budget
            {
                info!(
                    session_id = %session_id,
                    elapsed_secs = start.elapsed().as_secs(),
                    tokens_used,
                    rounds,
                    "Budget exhausted"
                );
                let aggregation = self.close_out(session_id, facts).await?;
                return Ok(LoopOutcome {
                    reason: TerminationReason::BudgetExhausted,
                    rounds,
                    aggregation,
                });
            }

            self.refine_survivors(session_id).await?;
        }

        info!(session_id = %session_id, rounds, "Round cap reached");
        let aggregation = self.close_out(session_id, facts).await?;
        Ok(LoopOutcome {
            reason: TerminationReason::MaxRoundsReached,
            rounds,
            aggregation,
        })
    }

    /// Execute every pending step of the given paths, persisting outputs.
    /// Returns the approximate token count consumed.
    async fn execute_pending_steps(&self, paths: &mut [ResearchPath]) -> AppResult<i64> {
        let mut tokens: i64 = 0;

        for path in paths.iter_mut() {
            let mut dirty = false;
            for step in path.steps.iter_mut() {
                if step.status != StepStatus::Pending {
                    continue;
                }
                match self.executor.run_query(&step.query).await {
                    Ok(output) => {
                        tokens += (output.len() / 4) as i64;
                        step.output = output;
                        step.status = StepStatus::Completed;
                    }
                    Err(e) => {
                        // One failed step degrades the path's score; it does
                        // not abort the round.
                        debug!(path_id = %path.id, error = %e, "Step execution failed");
                        step.status = StepStatus::Failed;
                    }
                }
                dirty = true;
            }
            if dirty {
                path.updated_at = chrono::Utc::now();
                self.controller.save_path(path).await?;
            }
        }

        Ok(tokens)
    }

    /// Refine the surviving paths one depth level, skipping paths whose
    /// findings no longer add novelty and paths already at their ceiling.
    async fn refine_survivors(&self, session_id: &str) -> AppResult<()> {
        let survivors = self.controller.load_session(session_id).await?;
        let documents: Vec<String> = survivors.iter().map(|p| p.content()).collect();

        for (i, path) in survivors.iter().enumerate() {
            if path.metadata.depth + 1 > path.metadata.effective_max_depth() {
                continue;
            }

            let others: Vec<String> = documents
                .iter()
                .enumerate()
                .filter(|(j, _)| *j != i)
                .map(|(_, d)| d.clone())
                .collect();
            if !path.content().is_empty() && !self.novelty.is_novel(&path.content(), &others) {
                debug!(path_id = %path.id, "Skipping refinement, findings not novel");
                continue;
            }

            self.controller
                .refine_path(&path.id, None, path.metadata.depth + 1)
                .await?;
        }

        Ok(())
    }

    /// Aggregate whatever is still live. Fewer than two live paths means
    /// there is nothing to merge and `None` is returned.
    async fn close_out(
        &self,
        session_id: &str,
        facts: &[Fact],
    ) -> AppResult<Option<AggregationResult>> {
        let live = self
            .controller
            .storage()
            .get_session_paths(session_id, &[PathStatus::Active, PathStatus::Refined])
            .await
            .map_err(AppError::Storage)?;

        if live.len() < 2 {
            return Ok(None);
        }

        let ids: Vec<String> = live.iter().map(|p| p.id.clone()).collect();
        let aggregation = self
            .controller
            .aggregate_paths(session_id, &ids, facts)
            .await?;
        Ok(Some(aggregation))
    }
}
