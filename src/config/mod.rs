use std::env;
use std::path::PathBuf;

use tracing_subscriber::prelude::*;
use tracing_subscriber::EnvFilter;

use crate::error::AppError;

/// Application configuration loaded from environment variables
#[derive(Debug, Clone)]
pub struct Config {
    pub database: DatabaseConfig,
    pub logging: LoggingConfig,
    pub graph: GraphConfig,
    pub scoring: ScoringConfig,
    pub tolerance: ToleranceConfig,
}

/// Database configuration
#[derive(Debug, Clone)]
pub struct DatabaseConfig {
    pub path: PathBuf,
    pub max_connections: u32,
}

/// Logging configuration
#[derive(Debug, Clone)]
pub struct LoggingConfig {
    pub level: String,
    pub format: LogFormat,
}

/// Log output format
#[derive(Debug, Clone, PartialEq)]
pub enum LogFormat {
    Pretty,
    Json,
}

/// Path graph configuration
#[derive(Debug, Clone)]
pub struct GraphConfig {
    /// Paths generated per opening round.
    pub default_k: usize,
    /// Live paths kept after each scoring round.
    pub keep_n: usize,
    /// Per-path refinement depth ceiling.
    pub max_depth: i32,
    /// Round cap for the orchestration loop.
    pub max_rounds: usize,
}

/// Scoring and budget thresholds
#[derive(Debug, Clone)]
pub struct ScoringConfig {
    /// Scores below this count toward the circuit break.
    pub circuit_break_score: f64,
    /// Trailing low scores required to trip the break.
    pub circuit_break_consecutive: usize,
    /// Latest score above this earns a budget extension.
    pub extend_score: f64,
    /// Normalized confidence at which the loop aggregates and stops.
    pub confidence_threshold: f64,
}

/// Conflict detection tolerances
#[derive(Debug, Clone)]
pub struct ToleranceConfig {
    /// Relative numeric difference allowed (0.1 = 10%).
    pub numeric_percent: f64,
    /// Days of temporal disagreement allowed.
    pub date_days: i64,
    /// Skip pairs where both facts are low-confidence.
    pub ignore_low_confidence: bool,
}

impl Config {
    /// Load configuration from environment variables
    pub fn from_env() -> Result<Self, AppError> {
        // Load .env file if present (ignore errors if not found)
        let _ = dotenvy::dotenv();

        let database = DatabaseConfig {
            path: PathBuf::from(
                env::var("DATABASE_PATH").unwrap_or_else(|_| "./data/research.db".to_string()),
            ),
            max_connections: env::var("DATABASE_MAX_CONNECTIONS")
                .ok()
                .and_then(|s| s.parse().ok())
                .unwrap_or(5),
        };

        let logging = LoggingConfig {
            level: env::var("LOG_LEVEL").unwrap_or_else(|_| "info".to_string()),
            format: match env::var("LOG_FORMAT")
                .unwrap_or_else(|_| "pretty".to_string())
                .to_lowercase()
                .as_str()
            {
                "json" => LogFormat::Json,
                _ => LogFormat::Pretty,
            },
        };

        let graph = GraphConfig {
            default_k: env::var("GRAPH_DEFAULT_K")
                .ok()
                .and_then(|s| s.parse().ok())
                .unwrap_or(3),
            keep_n: env::var("GRAPH_KEEP_N")
                .ok()
                .and_then(|s| s.parse().ok())
                .unwrap_or(3),
            max_depth: env::var("GRAPH_MAX_DEPTH")
                .ok()
                .and_then(|s| s.parse().ok())
                .unwrap_or(3),
            max_rounds: env::var("GRAPH_MAX_ROUNDS")
                .ok()
                .and_then(|s| s.parse().ok())
                .unwrap_or(10),
        };

        let scoring = ScoringConfig {
            circuit_break_score: env::var("SCORE_CIRCUIT_BREAK")
                .ok()
                .and_then(|s| s.parse().ok())
                .unwrap_or(5.0),
            circuit_break_consecutive: env::var("SCORE_CIRCUIT_BREAK_CONSECUTIVE")
                .ok()
                .and_then(|s| s.parse().ok())
                .unwrap_or(3),
            extend_score: env::var("SCORE_EXTEND_THRESHOLD")
                .ok()
                .and_then(|s| s.parse().ok())
                .unwrap_or(9.0),
            confidence_threshold: env::var("CONFIDENCE_THRESHOLD")
                .ok()
                .and_then(|s| s.parse().ok())
                .unwrap_or(0.9),
        };

        let tolerance = ToleranceConfig {
            numeric_percent: env::var("CONFLICT_NUMERIC_TOLERANCE")
                .ok()
                .and_then(|s| s.parse().ok())
                .unwrap_or(0.10),
            date_days: env::var("CONFLICT_DATE_TOLERANCE_DAYS")
                .ok()
                .and_then(|s| s.parse().ok())
                .unwrap_or(30),
            ignore_low_confidence: env::var("CONFLICT_IGNORE_LOW_CONFIDENCE")
                .ok()
                .and_then(|s| s.parse().ok())
                .unwrap_or(true),
        };

        Ok(Config {
            database,
            logging,
            graph,
            scoring,
            tolerance,
        })
    }
}

impl Default for GraphConfig {
    fn default() -> Self {
        Self {
            default_k: 3,
            keep_n: 3,
            max_depth: 3,
            max_rounds: 10,
        }
    }
}

impl Default for ScoringConfig {
    fn default() -> Self {
        Self {
            circuit_break_score: 5.0,
            circuit_break_consecutive: 3,
            extend_score: 9.0,
            confidence_threshold: 0.9,
        }
    }
}

impl Default for ToleranceConfig {
    fn default() -> Self {
        Self {
            numeric_percent: 0.10,
            date_days: 30,
            ignore_low_confidence: true,
        }
    }
}

impl From<&ToleranceConfig> for crate::conflict::ConflictTolerance {
    fn from(config: &ToleranceConfig) -> Self {
        Self {
            numeric_percent: config.numeric_percent,
            date_days: config.date_days,
            ignore_low_confidence: config.ignore_low_confidence,
            ..Self::default()
        }
    }
}

/// Initialize tracing for binaries and test harnesses. Repeated calls are
/// no-ops.
pub fn init_logging(config: &LoggingConfig) {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(config.level.clone()));

    match config.format {
        LogFormat::Json => {
            let _ = tracing_subscriber::registry()
                .with(filter)
                .with(tracing_subscriber::fmt::layer().json())
                .try_init();
        }
        LogFormat::Pretty => {
            let _ = tracing_subscriber::registry()
                .with(filter)
                .with(tracing_subscriber::fmt::layer().pretty())
                .try_init();
        }
    }
}
