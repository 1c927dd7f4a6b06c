//! Path graph data model and controller.
//!
//! A research session is a graph of `ResearchPath` nodes, each an independent
//! line of investigation with its own focus, query, and step list. The
//! controller plans and persists graph operations (generate, refine, score,
//! keep-best-n, aggregate); it never executes searches itself. Every mutation
//! is also recorded in an append-only operation log so a session can be
//! audited and replayed.

pub mod budget;
pub mod controller;
pub mod scoring;

pub use budget::{BudgetGovernor, BudgetReview, JaccardNoveltyGate, NoveltyGate, PathReview};
pub use controller::GraphController;
pub use scoring::{score_path, ScoreBreakdown};

use chrono::{DateTime, Datelike, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Score assigned to freshly generated paths before any evaluation.
pub const DEFAULT_PATH_SCORE: f64 = 5.0;

/// Score assigned to a synthetic aggregation node.
pub const AGGREGATE_PATH_SCORE: f64 = 8.0;

/// Lifecycle status of a research path.
///
/// `Pruned` and `Aggregated` are terminal: no transition out of either is
/// permitted, and pruned rows are retained for audit rather than deleted.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PathStatus {
    /// Path is explorable and participates in scoring and aggregation.
    #[default]
    Active,
    /// Path has been refined at least once; still explorable.
    Refined,
    /// Path was cut by keep-best-n or a circuit break. Terminal.
    Pruned,
    /// Path was consumed by an aggregation. Terminal.
    Aggregated,
}

impl PathStatus {
    /// Whether this status permits no further transitions.
    pub fn is_terminal(&self) -> bool {
        matches!(self, PathStatus::Pruned | PathStatus::Aggregated)
    }

    /// Whether the state machine allows moving from this status to `to`.
    pub fn can_transition_to(&self, _to: PathStatus) -> bool {
        !self.is_terminal()
    }
}

impl std::fmt::Display for PathStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            PathStatus::Active => write!(f, "active"),
            PathStatus::Refined => write!(f, "refined"),
            PathStatus::Pruned => write!(f, "pruned"),
            PathStatus::Aggregated => write!(f, "aggregated"),
        }
    }
}

impl std::str::FromStr for PathStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "active" => Ok(PathStatus::Active),
            "refined" => Ok(PathStatus::Refined),
            "pruned" => Ok(PathStatus::Pruned),
            "aggregated" => Ok(PathStatus::Aggregated),
            _ => Err(format!("Unknown path status: {}", s)),
        }
    }
}

/// Kind of work a research step performs.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StepType {
    /// Retrieval of new material.
    #[default]
    Search,
    /// Examination of already-retrieved material.
    Analyze,
    /// Combination of material into a summary or document.
    Synthesize,
}

impl std::fmt::Display for StepType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            StepType::Search => write!(f, "search"),
            StepType::Analyze => write!(f, "analyze"),
            StepType::Synthesize => write!(f, "synthesize"),
        }
    }
}

impl std::str::FromStr for StepType {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "search" => Ok(StepType::Search),
            "analyze" => Ok(StepType::Analyze),
            "synthesize" => Ok(StepType::Synthesize),
            _ => Err(format!("Unknown step type: {}", s)),
        }
    }
}

/// Graph-level action that produced a step.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StepAction {
    /// Step was planned by generation.
    #[default]
    Search,
    /// Step was appended by a refinement.
    Refine,
    /// Step was produced by an aggregation.
    Aggregate,
}

impl std::fmt::Display for StepAction {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            StepAction::Search => write!(f, "search"),
            StepAction::Refine => write!(f, "refine"),
            StepAction::Aggregate => write!(f, "aggregate"),
        }
    }
}

impl std::str::FromStr for StepAction {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "search" => Ok(StepAction::Search),
            "refine" => Ok(StepAction::Refine),
            "aggregate" => Ok(StepAction::Aggregate),
            _ => Err(format!("Unknown step action: {}", s)),
        }
    }
}

/// Execution status of a single step.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StepStatus {
    /// Not yet executed.
    #[default]
    Pending,
    /// Executed and produced output.
    Completed,
    /// Execution failed.
    Failed,
}

impl std::fmt::Display for StepStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            StepStatus::Pending => write!(f, "pending"),
            StepStatus::Completed => write!(f, "completed"),
            StepStatus::Failed => write!(f, "failed"),
        }
    }
}

impl std::str::FromStr for StepStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "pending" => Ok(StepStatus::Pending),
            "completed" => Ok(StepStatus::Completed),
            "failed" => Ok(StepStatus::Failed),
            _ => Err(format!("Unknown step status: {}", s)),
        }
    }
}

/// A single unit of work inside a research path.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ResearchStep {
    /// Unique step identifier.
    pub id: String,
    /// Kind of work this step performs.
    pub step_type: StepType,
    /// Graph action that created this step.
    pub action: StepAction,
    /// The query or instruction the executor runs.
    pub query: String,
    /// Execution output, empty until the step runs.
    #[serde(default)]
    pub output: String,
    /// Execution status.
    #[serde(default)]
    pub status: StepStatus,
    /// When the step was created.
    pub created_at: DateTime<Utc>,
}

impl ResearchStep {
    /// Create a pending step.
    pub fn new(step_type: StepType, action: StepAction, query: impl Into<String>) -> Self {
        Self {
            id: Uuid::new_v4().to_string(),
            step_type,
            action,
            query: query.into(),
            output: String::new(),
            status: StepStatus::Pending,
            created_at: Utc::now(),
        }
    }

    /// Attach output and mark the step completed.
    pub fn with_output(mut self, output: impl Into<String>) -> Self {
        self.output = output.into();
        self.status = StepStatus::Completed;
        self
    }

    /// Mark the step failed.
    pub fn failed(mut self) -> Self {
        self.status = StepStatus::Failed;
        self
    }
}

/// Strategy hint recorded when generating paths.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum GenerateStrategy {
    /// Spread across the configured angle templates.
    #[default]
    Diverse,
    /// Narrow variations on the seed topic.
    Focused,
    /// Wider-ranging speculative angles.
    Exploratory,
    /// Angles chosen to minimize overlap with existing paths.
    Orthogonal,
}

impl std::fmt::Display for GenerateStrategy {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            GenerateStrategy::Diverse => write!(f, "diverse"),
            GenerateStrategy::Focused => write!(f, "focused"),
            GenerateStrategy::Exploratory => write!(f, "exploratory"),
            GenerateStrategy::Orthogonal => write!(f, "orthogonal"),
        }
    }
}

impl std::str::FromStr for GenerateStrategy {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "diverse" => Ok(GenerateStrategy::Diverse),
            "focused" => Ok(GenerateStrategy::Focused),
            "exploratory" => Ok(GenerateStrategy::Exploratory),
            "orthogonal" => Ok(GenerateStrategy::Orthogonal),
            _ => Err(format!("Unknown generate strategy: {}", s)),
        }
    }
}

/// A research angle: a named focus plus a query template.
///
/// Templates substitute `{topic}` with the seed topic and `{year}` with the
/// current calendar year.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AngleTemplate {
    /// Human-readable focus label.
    pub focus: String,
    /// Query template with `{topic}`/`{year}` placeholders.
    pub query_template: String,
}

impl AngleTemplate {
    /// Create a template.
    pub fn new(focus: impl Into<String>, query_template: impl Into<String>) -> Self {
        Self {
            focus: focus.into(),
            query_template: query_template.into(),
        }
    }

    /// Render the template against a topic.
    pub fn render(&self, topic: &str) -> String {
        let year = Utc::now().year().to_string();
        self.query_template
            .replace("{topic}", topic)
            .replace("{year}", &year)
    }

    /// The built-in angle set, assigned round-robin during generation.
    pub fn defaults() -> Vec<AngleTemplate> {
        vec![
            AngleTemplate::new("Academic Research", "{topic} academic research papers {year}"),
            AngleTemplate::new(
                "Industry Practices",
                "{topic} industry implementation case studies",
            ),
            AngleTemplate::new("Policy & Governance", "{topic} policy regulation governance"),
            AngleTemplate::new(
                "Technical Documentation",
                "{topic} technical documentation specifications",
            ),
            AngleTemplate::new("News & Media", "{topic} latest news developments {year}"),
        ]
    }
}

/// Typed per-path bookkeeping, persisted alongside the path.
///
/// `extra` is an escape hatch for fields outside the typed set; the
/// controller itself never writes to it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PathMetadata {
    /// Current refinement depth.
    #[serde(default)]
    pub depth: i32,
    /// Depth ceiling for this path.
    #[serde(default = "default_max_depth")]
    pub max_depth: i32,
    /// Strategy the path was generated with.
    #[serde(default)]
    pub strategy: GenerateStrategy,
    /// Additional depth granted by a budget extension.
    #[serde(default)]
    pub extra_depth: i32,
    /// Additional token allowance granted by a budget extension.
    #[serde(default)]
    pub extra_tokens: i64,
    /// Untyped extension fields.
    #[serde(default, skip_serializing_if = "serde_json::Value::is_null")]
    pub extra: serde_json::Value,
}

fn default_max_depth() -> i32 {
    3
}

impl Default for PathMetadata {
    fn default() -> Self {
        Self {
            depth: 0,
            max_depth: default_max_depth(),
            strategy: GenerateStrategy::Diverse,
            extra_depth: 0,
            extra_tokens: 0,
            extra: serde_json::Value::Null,
        }
    }
}

impl PathMetadata {
    /// Effective depth ceiling including any budget extension.
    pub fn effective_max_depth(&self) -> i32 {
        self.max_depth + self.extra_depth
    }
}

/// One line of investigation in a research session.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ResearchPath {
    /// Unique path identifier.
    pub id: String,
    /// Parent session ID.
    pub session_id: String,
    /// Research angle label.
    pub focus: String,
    /// Current query driving this path.
    pub query: String,
    /// Lifecycle status.
    pub status: PathStatus,
    /// Latest quality score (0.0-10.0).
    pub score: f64,
    /// Ordered work steps.
    #[serde(default)]
    pub steps: Vec<ResearchStep>,
    /// Typed bookkeeping.
    #[serde(default)]
    pub metadata: PathMetadata,
    /// Creation sequence within the session, assigned by storage. Used as
    /// the deterministic tie-break when scores are equal.
    #[serde(default)]
    pub seq: i64,
    /// When the path was created.
    pub created_at: DateTime<Utc>,
    /// When the path was last updated.
    pub updated_at: DateTime<Utc>,
}

impl ResearchPath {
    /// Create an active path with the default score.
    pub fn new(
        session_id: impl Into<String>,
        focus: impl Into<String>,
        query: impl Into<String>,
    ) -> Self {
        let now = Utc::now();
        Self {
            id: Uuid::new_v4().to_string(),
            session_id: session_id.into(),
            focus: focus.into(),
            query: query.into(),
            status: PathStatus::Active,
            score: DEFAULT_PATH_SCORE,
            steps: Vec::new(),
            metadata: PathMetadata::default(),
            seq: 0,
            created_at: now,
            updated_at: now,
        }
    }

    /// Set the score, clamped to the 0-10 scale.
    pub fn with_score(mut self, score: f64) -> Self {
        self.score = score.clamp(0.0, 10.0);
        self
    }

    /// Set the status.
    pub fn with_status(mut self, status: PathStatus) -> Self {
        self.status = status;
        self
    }

    /// Append a step.
    pub fn with_step(mut self, step: ResearchStep) -> Self {
        self.steps.push(step);
        self
    }

    /// Set the metadata.
    pub fn with_metadata(mut self, metadata: PathMetadata) -> Self {
        self.metadata = metadata;
        self
    }

    /// Current refinement depth.
    pub fn depth(&self) -> i32 {
        self.metadata.depth
    }

    /// All step outputs joined into one document.
    pub fn content(&self) -> String {
        self.steps
            .iter()
            .filter(|s| !s.output.is_empty())
            .map(|s| s.output.as_str())
            .collect::<Vec<_>>()
            .join("\n\n")
    }

    /// Distinct queries issued across the path's steps.
    pub fn distinct_queries(&self) -> usize {
        let mut queries: Vec<&str> = self.steps.iter().map(|s| s.query.as_str()).collect();
        queries.sort_unstable();
        queries.dedup();
        queries.len()
    }
}

/// Kind of graph operation recorded in the log.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OperationKind {
    /// Paths were generated.
    Generate,
    /// A path was refined.
    Refine,
    /// Paths were scored.
    Score,
    /// Low scorers were pruned.
    KeepBestN,
    /// Paths were aggregated.
    Aggregate,
}

impl std::fmt::Display for OperationKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            OperationKind::Generate => write!(f, "generate"),
            OperationKind::Refine => write!(f, "refine"),
            OperationKind::Score => write!(f, "score"),
            OperationKind::KeepBestN => write!(f, "keep_best_n"),
            OperationKind::Aggregate => write!(f, "aggregate"),
        }
    }
}

impl std::str::FromStr for OperationKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "generate" => Ok(OperationKind::Generate),
            "refine" => Ok(OperationKind::Refine),
            "score" => Ok(OperationKind::Score),
            "keep_best_n" => Ok(OperationKind::KeepBestN),
            "aggregate" => Ok(OperationKind::Aggregate),
            _ => Err(format!("Unknown operation kind: {}", s)),
        }
    }
}

/// Append-only log entry describing one graph mutation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GraphOperation {
    /// Unique operation identifier.
    pub id: String,
    /// Parent session ID.
    pub session_id: String,
    /// Total-order sequence within the session, assigned by storage.
    #[serde(default)]
    pub seq: i64,
    /// What kind of mutation this was.
    pub kind: OperationKind,
    /// Paths the operation read (refine and aggregate sources, scored or
    /// pruned paths).
    #[serde(default)]
    pub input_ids: Vec<String>,
    /// Paths the operation created or rewrote (generated paths, the refined
    /// path, the synthesis node).
    #[serde(default)]
    pub output_ids: Vec<String>,
    /// Operation-specific detail (scores, prune reasons, feedback).
    #[serde(default)]
    pub detail: serde_json::Value,
    /// When the operation was recorded.
    pub created_at: DateTime<Utc>,
}

impl GraphOperation {
    /// Create an operation record.
    pub fn new(session_id: impl Into<String>, kind: OperationKind) -> Self {
        Self {
            id: Uuid::new_v4().to_string(),
            session_id: session_id.into(),
            seq: 0,
            kind,
            input_ids: Vec::new(),
            output_ids: Vec::new(),
            detail: serde_json::Value::Null,
            created_at: Utc::now(),
        }
    }

    /// Set the paths the operation read.
    pub fn with_inputs(mut self, input_ids: Vec<String>) -> Self {
        self.input_ids = input_ids;
        self
    }

    /// Set the paths the operation produced.
    pub fn with_outputs(mut self, output_ids: Vec<String>) -> Self {
        self.output_ids = output_ids;
        self
    }

    /// Set the detail payload.
    pub fn with_detail(mut self, detail: serde_json::Value) -> Self {
        self.detail = detail;
        self
    }
}

/// Per-path outcome of a score or keep-best-n round.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PathScore {
    /// The scored path.
    pub path_id: String,
    /// Overall score (0.0-10.0).
    pub score: f64,
    /// Whether the path survived the round.
    pub kept: bool,
    /// Per-factor breakdown.
    pub breakdown: ScoreBreakdown,
}

/// Result of aggregating paths into a synthesis node.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AggregationResult {
    /// The session ID.
    pub session_id: String,
    /// The synthetic path created by the aggregation.
    pub aggregated_path_id: String,
    /// The synthesis document.
    pub content: String,
    /// Confidence in the synthesis (0.0-1.0). Placeholder until a real
    /// evaluator exists.
    pub confidence: f64,
    /// Paths consumed by the aggregation.
    pub source_paths: Vec<String>,
    /// Conflicts found among facts referenced by the source paths.
    pub conflicts: Vec<crate::conflict::Conflict>,
}
