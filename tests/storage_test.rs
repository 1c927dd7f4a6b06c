//! Integration tests for the SQLite storage layer
//!
//! Tests path persistence, the operation log, and the atomic commit
//! methods using an in-memory SQLite database.

use serde_json::json;

use deep_research_core::config::DatabaseConfig;
use deep_research_core::graph::{
    GraphOperation, OperationKind, PathMetadata, PathStatus, ResearchPath, ResearchStep,
    StepAction, StepType,
};
use deep_research_core::storage::{AggregateCommit, SqliteStorage, Storage};

/// Create an in-memory storage instance for testing
async fn create_test_storage() -> SqliteStorage {
    SqliteStorage::new_in_memory()
        .await
        .expect("Failed to create in-memory storage")
}

fn sample_path(session_id: &str, focus: &str) -> ResearchPath {
    ResearchPath::new(session_id, focus, format!("{} query", focus))
        .with_step(ResearchStep::new(
            StepType::Search,
            StepAction::Search,
            format!("{} query", focus),
        ))
}

#[cfg(test)]
mod path_tests {
    use super::*;

    #[tokio::test]
    async fn test_upsert_and_get_path_round_trip() {
        let storage = create_test_storage().await;

        let mut metadata = PathMetadata::default();
        metadata.depth = 1;
        metadata.extra_depth = 2;
        let path = sample_path("s1", "Academic Research").with_metadata(metadata);

        storage.upsert_path(&path).await.unwrap();

        let retrieved = storage.get_path(&path.id).await.unwrap();
        assert!(retrieved.is_some(), "Path should exist after upsert");
        let retrieved = retrieved.unwrap();
        assert_eq!(retrieved.id, path.id);
        assert_eq!(retrieved.focus, "Academic Research");
        assert_eq!(retrieved.status, PathStatus::Active);
        assert_eq!(retrieved.steps.len(), 1);
        assert_eq!(retrieved.metadata.depth, 1);
        assert_eq!(retrieved.metadata.effective_max_depth(), 5);
    }

    #[tokio::test]
    async fn test_get_nonexistent_path() {
        let storage = create_test_storage().await;

        let result = storage.get_path("nonexistent-id").await.unwrap();
        assert!(result.is_none(), "Should return None for nonexistent path");
    }

    #[tokio::test]
    async fn test_upsert_preserves_seq_on_update() {
        let storage = create_test_storage().await;

        let mut path = sample_path("s1", "Academic Research");
        storage.upsert_path(&path).await.unwrap();
        let first = storage.get_path(&path.id).await.unwrap().unwrap();
        assert!(first.seq > 0, "Storage should assign a sequence number");

        path.query = "updated query".to_string();
        storage.upsert_path(&path).await.unwrap();

        let second = storage.get_path(&path.id).await.unwrap().unwrap();
        assert_eq!(second.seq, first.seq, "Update must not reassign seq");
        assert_eq!(second.query, "updated query");
    }

    #[tokio::test]
    async fn test_session_paths_ordered_by_seq() {
        let storage = create_test_storage().await;

        for focus in ["First", "Second", "Third"] {
            storage.upsert_path(&sample_path("s1", focus)).await.unwrap();
        }
        storage
            .upsert_path(&sample_path("other", "Unrelated"))
            .await
            .unwrap();

        let paths = storage.get_session_paths("s1", &[]).await.unwrap();
        assert_eq!(paths.len(), 3);
        assert_eq!(paths[0].focus, "First");
        assert_eq!(paths[2].focus, "Third");
        assert!(paths[0].seq < paths[1].seq && paths[1].seq < paths[2].seq);
    }

    #[tokio::test]
    async fn test_session_paths_status_filter() {
        let storage = create_test_storage().await;

        let active = sample_path("s1", "Active");
        let pruned = sample_path("s1", "Pruned").with_status(PathStatus::Pruned);
        storage.upsert_path(&active).await.unwrap();
        storage.upsert_path(&pruned).await.unwrap();

        let live = storage
            .get_session_paths("s1", &[PathStatus::Active, PathStatus::Refined])
            .await
            .unwrap();
        assert_eq!(live.len(), 1);
        assert_eq!(live[0].id, active.id);

        let all = storage.get_session_paths("s1", &[]).await.unwrap();
        assert_eq!(all.len(), 2, "Empty filter should return every path");
    }

    #[tokio::test]
    async fn test_file_backed_database_survives_reconnect() {
        let dir = tempfile::tempdir().expect("Failed to create temp dir");
        let config = DatabaseConfig {
            path: dir.path().join("research.db"),
            max_connections: 2,
        };

        let path = sample_path("s1", "Durable");
        {
            let storage = SqliteStorage::new(&config).await.unwrap();
            storage.upsert_path(&path).await.unwrap();
        }

        let storage = SqliteStorage::new(&config).await.unwrap();
        let stored = storage.get_path(&path.id).await.unwrap().unwrap();
        assert_eq!(stored.focus, "Durable");
        assert_eq!(stored.steps.len(), 1);
    }

    #[tokio::test]
    async fn test_status_cas_hit_and_miss() {
        let storage = create_test_storage().await;

        let path = sample_path("s1", "Academic Research");
        storage.upsert_path(&path).await.unwrap();

        let flipped = storage
            .update_path_status_checked(&path.id, PathStatus::Active, PathStatus::Refined)
            .await
            .unwrap();
        assert!(flipped, "CAS should succeed when status matches");

        let stale = storage
            .update_path_status_checked(&path.id, PathStatus::Active, PathStatus::Pruned)
            .await
            .unwrap();
        assert!(!stale, "CAS should fail when status no longer matches");

        let stored = storage.get_path(&path.id).await.unwrap().unwrap();
        assert_eq!(stored.status, PathStatus::Refined);
    }
}

#[cfg(test)]
mod operation_log_tests {
    use super::*;

    #[tokio::test]
    async fn test_operations_get_total_order() {
        let storage = create_test_storage().await;

        let first = GraphOperation::new("s1", OperationKind::Generate);
        let second = GraphOperation::new("s1", OperationKind::Score)
            .with_detail(json!({ "scores": {} }));

        let seq_a = storage.append_operation(&first).await.unwrap();
        let seq_b = storage.append_operation(&second).await.unwrap();
        assert!(seq_b > seq_a, "Later appends must get larger sequence numbers");

        let log = storage.get_session_operations("s1").await.unwrap();
        assert_eq!(log.len(), 2);
        assert_eq!(log[0].kind, OperationKind::Generate);
        assert_eq!(log[1].kind, OperationKind::Score);
        assert_eq!(log[0].seq, seq_a);
    }

    #[tokio::test]
    async fn test_operation_detail_round_trips() {
        let storage = create_test_storage().await;

        let op = GraphOperation::new("s1", OperationKind::KeepBestN)
            .with_inputs(vec!["p1".to_string(), "p2".to_string()])
            .with_detail(json!({ "n": 3, "pruned": ["p1", "p2"] }));
        storage.append_operation(&op).await.unwrap();

        let log = storage.get_session_operations("s1").await.unwrap();
        assert_eq!(log[0].input_ids, vec!["p1", "p2"]);
        assert!(log[0].output_ids.is_empty());
        assert_eq!(log[0].detail["n"], 3);
    }
}

#[cfg(test)]
mod commit_tests {
    use super::*;

    #[tokio::test]
    async fn test_commit_generate_assigns_seqs_and_logs() {
        let storage = create_test_storage().await;

        let paths = vec![sample_path("s1", "A"), sample_path("s1", "B")];
        let op = GraphOperation::new("s1", OperationKind::Generate)
            .with_outputs(paths.iter().map(|p| p.id.clone()).collect());

        let stored = storage.commit_generate(&paths, &op).await.unwrap();
        assert_eq!(stored.len(), 2);
        assert!(stored[0].seq > 0);
        assert!(stored[1].seq > stored[0].seq);

        let log = storage.get_session_operations("s1").await.unwrap();
        assert_eq!(log.len(), 1);
        assert_eq!(log[0].kind, OperationKind::Generate);
    }

    #[tokio::test]
    async fn test_commit_refine_rejects_terminal_path() {
        let storage = create_test_storage().await;

        let path = sample_path("s1", "A").with_status(PathStatus::Pruned);
        storage.upsert_path(&path).await.unwrap();

        let mut refined = path.clone();
        refined.status = PathStatus::Refined;
        let op = GraphOperation::new("s1", OperationKind::Refine);

        let committed = storage.commit_refine(&refined, &op).await.unwrap();
        assert!(!committed, "Refine of a pruned path must not commit");

        let stored = storage.get_path(&path.id).await.unwrap().unwrap();
        assert_eq!(stored.status, PathStatus::Pruned, "Nothing should be written");
        assert!(
            storage.get_session_operations("s1").await.unwrap().is_empty(),
            "No log entry for a rejected refine"
        );
    }

    #[tokio::test]
    async fn test_commit_scores_updates_every_path() {
        let storage = create_test_storage().await;

        let a = sample_path("s1", "A");
        let b = sample_path("s1", "B");
        storage.upsert_path(&a).await.unwrap();
        storage.upsert_path(&b).await.unwrap();

        let op = GraphOperation::new("s1", OperationKind::Score);
        storage
            .commit_scores(&[(a.id.clone(), 7.5), (b.id.clone(), 4.2)], &op)
            .await
            .unwrap();

        assert_eq!(storage.get_path(&a.id).await.unwrap().unwrap().score, 7.5);
        assert_eq!(storage.get_path(&b.id).await.unwrap().unwrap().score, 4.2);
    }

    #[tokio::test]
    async fn test_commit_prune_skips_terminal_rows() {
        let storage = create_test_storage().await;

        let live = sample_path("s1", "Live");
        let already = sample_path("s1", "Done").with_status(PathStatus::Aggregated);
        storage.upsert_path(&live).await.unwrap();
        storage.upsert_path(&already).await.unwrap();

        let op = GraphOperation::new("s1", OperationKind::KeepBestN);
        let pruned = storage
            .commit_prune(&[live.id.clone(), already.id.clone()], &op)
            .await
            .unwrap();

        assert_eq!(pruned, 1, "Only the live path should be pruned");
        assert_eq!(
            storage.get_path(&live.id).await.unwrap().unwrap().status,
            PathStatus::Pruned
        );
        assert_eq!(
            storage.get_path(&already.id).await.unwrap().unwrap().status,
            PathStatus::Aggregated
        );
    }

    #[tokio::test]
    async fn test_commit_aggregate_marks_sources() {
        let storage = create_test_storage().await;

        let a = sample_path("s1", "A");
        let b = sample_path("s1", "B").with_status(PathStatus::Refined);
        storage.upsert_path(&a).await.unwrap();
        storage.upsert_path(&b).await.unwrap();

        let synthesis = sample_path("s1", "Aggregated Research");
        let op = GraphOperation::new("s1", OperationKind::Aggregate);
        let outcome = storage
            .commit_aggregate(&synthesis, &[a.id.clone(), b.id.clone()], &op)
            .await
            .unwrap();

        match outcome {
            AggregateCommit::Committed(stored) => assert_eq!(stored.id, synthesis.id),
            AggregateCommit::Stale(ids) => panic!("Unexpected stale ids: {:?}", ids),
        }
        assert_eq!(
            storage.get_path(&a.id).await.unwrap().unwrap().status,
            PathStatus::Aggregated
        );
        assert_eq!(
            storage.get_path(&b.id).await.unwrap().unwrap().status,
            PathStatus::Aggregated
        );
    }

    #[tokio::test]
    async fn test_commit_aggregate_rolls_back_on_stale_source() {
        let storage = create_test_storage().await;

        let a = sample_path("s1", "A");
        let b = sample_path("s1", "B").with_status(PathStatus::Pruned);
        storage.upsert_path(&a).await.unwrap();
        storage.upsert_path(&b).await.unwrap();

        let synthesis = sample_path("s1", "Aggregated Research");
        let op = GraphOperation::new("s1", OperationKind::Aggregate);
        let outcome = storage
            .commit_aggregate(&synthesis, &[a.id.clone(), b.id.clone()], &op)
            .await
            .unwrap();

        match outcome {
            AggregateCommit::Stale(ids) => assert_eq!(ids, vec![b.id.clone()]),
            AggregateCommit::Committed(_) => panic!("Stale source must abort the commit"),
        }
        assert!(
            storage.get_path(&synthesis.id).await.unwrap().is_none(),
            "Synthesis node must be rolled back"
        );
        assert_eq!(
            storage.get_path(&a.id).await.unwrap().unwrap().status,
            PathStatus::Active,
            "Untouched sources keep their status"
        );
        assert!(
            storage.get_session_operations("s1").await.unwrap().is_empty(),
            "No log entry for an aborted aggregate"
        );
    }
}
