use thiserror::Error;

use crate::graph::PathStatus;

/// Application-level errors
#[derive(Debug, Error)]
pub enum AppError {
    #[error("Configuration error: {message}")]
    Config { message: String },

    #[error("Storage error: {0}")]
    Storage(#[from] StorageError),

    #[error("Graph error: {0}")]
    Graph(#[from] GraphError),

    #[error("Internal error: {message}")]
    Internal { message: String },
}

/// Storage layer errors.
///
/// The controller never retries these internally; retry policy belongs to
/// the orchestration loop.
#[derive(Debug, Error)]
pub enum StorageError {
    #[error("Database connection failed: {message}")]
    Connection { message: String },

    #[error("Query failed: {message}")]
    Query { message: String },

    #[error("Migration failed: {message}")]
    Migration { message: String },

    #[error("SQLx error: {0}")]
    Sqlx(#[from] sqlx::Error),
}

/// Path graph errors with structured details.
#[derive(Debug, Error)]
pub enum GraphError {
    /// An operation referenced a path id that does not exist. The controller
    /// never silently creates one.
    #[error("Path not found: {path_id}")]
    NotFound { path_id: String },

    /// Status state-machine violation: no transition out of pruned or
    /// aggregated is permitted.
    #[error("Invalid transition for path {path_id}: {from} -> {to}")]
    InvalidTransition {
        path_id: String,
        from: PathStatus,
        to: PathStatus,
    },

    /// Optimistic-concurrency conflict: the path's status changed between
    /// read and write.
    #[error("Stale write for path {path_id}: expected status {expected}")]
    Stale {
        path_id: String,
        expected: PathStatus,
    },

    #[error("Validation failed: {field} - {reason}")]
    Validation { field: String, reason: String },

    #[error("Storage error: {0}")]
    Storage(#[from] StorageError),
}

/// Result type alias for application errors
pub type AppResult<T> = Result<T, AppError>;

/// Result type alias for storage operations
pub type StorageResult<T> = Result<T, StorageError>;

/// Result type alias for graph controller operations
pub type GraphResult<T> = Result<T, GraphError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_app_error_display() {
        let err = AppError::Config {
            message: "missing key".to_string(),
        };
        assert_eq!(err.to_string(), "Configuration error: missing key");

        let err = AppError::Internal {
            message: "unexpected".to_string(),
        };
        assert_eq!(err.to_string(), "Internal error: unexpected");
    }

    #[test]
    fn test_storage_error_display() {
        let err = StorageError::Connection {
            message: "failed to connect".to_string(),
        };
        assert_eq!(
            err.to_string(),
            "Database connection failed: failed to connect"
        );

        let err = StorageError::Query {
            message: "syntax error".to_string(),
        };
        assert_eq!(err.to_string(), "Query failed: syntax error");

        let err = StorageError::Migration {
            message: "version mismatch".to_string(),
        };
        assert_eq!(err.to_string(), "Migration failed: version mismatch");
    }

    #[test]
    fn test_graph_error_display() {
        let err = GraphError::NotFound {
            path_id: "path-123".to_string(),
        };
        assert_eq!(err.to_string(), "Path not found: path-123");

        let err = GraphError::InvalidTransition {
            path_id: "path-456".to_string(),
            from: PathStatus::Pruned,
            to: PathStatus::Active,
        };
        assert_eq!(
            err.to_string(),
            "Invalid transition for path path-456: pruned -> active"
        );

        let err = GraphError::Stale {
            path_id: "path-789".to_string(),
            expected: PathStatus::Active,
        };
        assert_eq!(
            err.to_string(),
            "Stale write for path path-789: expected status active"
        );
    }

    #[test]
    fn test_graph_error_conversion_to_app_error() {
        let graph_err = GraphError::NotFound {
            path_id: "missing".to_string(),
        };
        let app_err: AppError = graph_err.into();
        assert!(matches!(app_err, AppError::Graph(_)));
        assert!(app_err.to_string().contains("Path not found"));
    }

    #[test]
    fn test_storage_error_conversion_to_app_error() {
        let storage_err = StorageError::Query {
            message: "bad column".to_string(),
        };
        let app_err: AppError = storage_err.into();
        assert!(matches!(app_err, AppError::Storage(_)));
    }

    #[test]
    fn test_storage_error_nested_in_graph_error() {
        let storage_err = StorageError::Query {
            message: "write failed".to_string(),
        };
        let graph_err: GraphError = storage_err.into();
        assert!(matches!(graph_err, GraphError::Storage(_)));
        assert!(graph_err.to_string().contains("Query failed"));
    }
}
