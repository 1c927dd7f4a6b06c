//! Storage layer for research graph persistence.
//!
//! Paths and the operation log live in SQLite. Every logical graph
//! operation commits in a single transaction, so a crash between rounds
//! leaves the graph at the last completed operation with no partial writes.
//! Status changes of concurrent writers are caught by compare-and-set
//! guards inside those transactions.

mod sqlite;

pub use sqlite::SqliteStorage;

use async_trait::async_trait;

use crate::error::StorageResult;
use crate::graph::{GraphOperation, PathStatus, ResearchPath};

/// Outcome of an aggregation commit.
#[derive(Debug, Clone, PartialEq)]
pub enum AggregateCommit {
    /// All source paths were still live; the synthesis node and the status
    /// flips committed together.
    Committed(ResearchPath),
    /// One or more source paths changed status since they were read. The
    /// transaction was rolled back; the ids listed failed the check.
    Stale(Vec<String>),
}

/// Persistence operations for research paths and the operation log.
///
/// The `commit_*` methods are atomic: either every write in the logical
/// operation lands, including its log entry, or none do.
#[async_trait]
pub trait Storage: Send + Sync {
    // Path operations

    /// Insert or update a single path. The creation `seq` is assigned on
    /// first insert and preserved on update.
    async fn upsert_path(&self, path: &ResearchPath) -> StorageResult<()>;

    /// Get a path by ID.
    async fn get_path(&self, id: &str) -> StorageResult<Option<ResearchPath>>;

    /// Get a session's paths, filtered to the given statuses. An empty
    /// filter returns every path. Ordered by creation sequence.
    async fn get_session_paths(
        &self,
        session_id: &str,
        statuses: &[PathStatus],
    ) -> StorageResult<Vec<ResearchPath>>;

    /// Compare-and-set a path's status. Returns `false` when the stored
    /// status no longer matches `expected`; nothing is written in that case.
    async fn update_path_status_checked(
        &self,
        id: &str,
        expected: PathStatus,
        new: PathStatus,
    ) -> StorageResult<bool>;

    // Operation log

    /// Append an operation to the session log, returning its assigned
    /// total-order sequence number.
    async fn append_operation(&self, op: &GraphOperation) -> StorageResult<i64>;

    /// All operations for a session in sequence order.
    async fn get_session_operations(&self, session_id: &str)
        -> StorageResult<Vec<GraphOperation>>;

    // Atomic per-operation commits

    /// Insert a batch of generated paths plus the Generate log entry in one
    /// transaction. Returns the paths with their assigned sequence numbers.
    async fn commit_generate(
        &self,
        paths: &[ResearchPath],
        op: &GraphOperation,
    ) -> StorageResult<Vec<ResearchPath>>;

    /// Write a refined path plus the Refine log entry in one transaction.
    /// Returns `false` without writing when the path is no longer live.
    async fn commit_refine(
        &self,
        path: &ResearchPath,
        op: &GraphOperation,
    ) -> StorageResult<bool>;

    /// Persist a round of `(path_id, score)` updates plus the Score log
    /// entry in one transaction.
    async fn commit_scores(
        &self,
        updates: &[(String, f64)],
        op: &GraphOperation,
    ) -> StorageResult<()>;

    /// Mark the listed paths pruned plus the log entry in one transaction.
    /// Paths already terminal are skipped; returns how many were pruned.
    async fn commit_prune(
        &self,
        path_ids: &[String],
        op: &GraphOperation,
    ) -> StorageResult<usize>;

    /// Insert the synthesis path, mark the sources aggregated, and append
    /// the Aggregate log entry in one transaction. Source statuses are
    /// re-checked inside the transaction; any miss rolls everything back.
    async fn commit_aggregate(
        &self,
        new_path: &ResearchPath,
        source_ids: &[String],
        op: &GraphOperation,
    ) -> StorageResult<AggregateCommit>;
}
