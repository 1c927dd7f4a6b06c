//! # Deep Research Core
//!
//! A graph-of-paths research engine: a seed topic is fanned out into
//! parallel research paths, each path is executed, scored, and pruned or
//! refined, and the survivors are merged into a synthesis with rule-based
//! fact conflict resolution.
//!
//! ## Features
//!
//! - **Path Graph Controller**: generate, refine, score, keep-best-n, and
//!   aggregate operations over persisted research paths
//! - **Append-only Operation Log**: every graph mutation recorded with a
//!   total order, enabling audit and crash recovery
//! - **Budget Governance**: circuit-breaking of persistently weak paths and
//!   depth/token extensions for exceptional ones
//! - **Novelty Gating**: pluggable redundancy check consulted before paths
//!   are expanded
//! - **Fact Conflict Resolution**: numeric, temporal, and polarity conflict
//!   detection with a total resolution ladder
//! - **Orchestration Loop**: a thin driver wiring an external step executor
//!   through the controller until a terminal condition
//!
//! ## Architecture
//!
//! ```text
//! Orchestrator → GraphController → Storage (SQLite)
//!       ↓               ↓
//! PathExecutor    Conflict Resolver
//! ```
//!
//! ## Example
//!
//! ```ignore
//! use deep_research_core::config::Config;
//! use deep_research_core::graph::GraphController;
//! use deep_research_core::orchestrator::Orchestrator;
//! use deep_research_core::storage::SqliteStorage;
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let config = Config::from_env()?;
//!     let storage = SqliteStorage::new(&config.database).await?;
//!     let controller = GraphController::new(storage);
//!     let orchestrator = Orchestrator::new(controller, MySearchExecutor::new());
//!     let outcome = orchestrator.run("session-1", "solid state batteries", &[]).await?;
//!     println!("stopped: {}", outcome.reason);
//!     Ok(())
//! }
//! ```

#![warn(missing_docs)]

/// Configuration management.
pub mod config;
/// Fact conflict detection and resolution.
pub mod conflict;
/// Error types and result aliases for the application.
pub mod error;
/// Fact data model and store.
pub mod facts;
/// Path graph types, scoring, budgets, and the controller.
pub mod graph;
/// Orchestration loop driving sessions end to end.
pub mod orchestrator;
/// SQLite storage layer for persistence.
pub mod storage;

pub use config::Config;
pub use error::{AppError, AppResult};
pub use graph::GraphController;
pub use orchestrator::{Orchestrator, PathExecutor};
