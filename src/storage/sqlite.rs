use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::migrate::Migrator;
use sqlx::sqlite::{SqliteConnectOptions, SqlitePool, SqlitePoolOptions};
use sqlx::SqliteConnection;
use std::str::FromStr;
use tracing::info;

use super::{AggregateCommit, Storage};
use crate::config::DatabaseConfig;
use crate::error::{StorageError, StorageResult};
use crate::graph::{GraphOperation, OperationKind, PathStatus, ResearchPath};

/// Static migrator that embeds migrations at compile time
static MIGRATOR: Migrator = sqlx::migrate!("./migrations");

/// SQLite-backed storage implementation
#[derive(Clone)]
pub struct SqliteStorage {
    pool: SqlitePool,
}

impl SqliteStorage {
    /// Create a new SQLite storage instance
    pub async fn new(config: &DatabaseConfig) -> StorageResult<Self> {
        // Ensure parent directory exists
        if let Some(parent) = config.path.parent() {
            std::fs::create_dir_all(parent).map_err(|e| StorageError::Connection {
                message: format!("Failed to create database directory: {}", e),
            })?;
        }

        let database_url = format!("sqlite://{}?mode=rwc", config.path.display());

        let options = SqliteConnectOptions::from_str(&database_url)
            .map_err(|e| StorageError::Connection {
                message: format!("Invalid database URL: {}", e),
            })?
            .create_if_missing(true);

        let pool = SqlitePoolOptions::new()
            .max_connections(config.max_connections)
            .connect_with(options)
            .await
            .map_err(|e| StorageError::Connection {
                message: format!("Failed to connect to database: {}", e),
            })?;

        let storage = Self { pool };
        storage.run_migrations().await?;

        Ok(storage)
    }

    /// Create an in-memory instance for tests. A single connection keeps
    /// the database alive for the pool's lifetime.
    pub async fn new_in_memory() -> StorageResult<Self> {
        let options = SqliteConnectOptions::from_str("sqlite::memory:").map_err(|e| {
            StorageError::Connection {
                message: format!("Invalid database URL: {}", e),
            }
        })?;

        let pool = SqlitePoolOptions::new()
            .max_connections(1)
            .connect_with(options)
            .await
            .map_err(|e| StorageError::Connection {
                message: format!("Failed to connect to database: {}", e),
            })?;

        let storage = Self { pool };
        storage.run_migrations().await?;

        Ok(storage)
    }

    /// Run database migrations using embedded sqlx migrations
    async fn run_migrations(&self) -> StorageResult<()> {
        info!("Running database migrations...");

        MIGRATOR
            .run(&self.pool)
            .await
            .map_err(|e| StorageError::Migration {
                message: format!("Failed to run migrations: {}", e),
            })?;

        info!("Database migrations completed successfully");
        Ok(())
    }

    /// Get the underlying pool for advanced queries
    pub fn pool(&self) -> &SqlitePool {
        &self.pool
    }
}

/// Insert a path inside an open transaction, preserving seq on conflict.
async fn insert_path(conn: &mut SqliteConnection, path: &ResearchPath) -> StorageResult<()> {
    let steps = serde_json::to_string(&path.steps).unwrap_or_else(|_| "[]".to_string());
    let metadata = serde_json::to_string(&path.metadata).unwrap_or_else(|_| "{}".to_string());

    sqlx::query(
        r#"
        INSERT INTO research_paths (id, session_id, focus, query, status, score, steps, metadata, created_at, updated_at)
        VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
        ON CONFLICT(id) DO UPDATE SET
            focus = excluded.focus,
            query = excluded.query,
            status = excluded.status,
            score = excluded.score,
            steps = excluded.steps,
            metadata = excluded.metadata,
            updated_at = excluded.updated_at
        "#,
    )
    .bind(&path.id)
    .bind(&path.session_id)
    .bind(&path.focus)
    .bind(&path.query)
    .bind(path.status.to_string())
    .bind(path.score)
    .bind(&steps)
    .bind(&metadata)
    .bind(path.created_at.to_rfc3339())
    .bind(path.updated_at.to_rfc3339())
    .execute(conn)
    .await?;

    Ok(())
}

/// Append an operation inside an open transaction, returning its seq.
async fn insert_operation(
    conn: &mut SqliteConnection,
    op: &GraphOperation,
) -> StorageResult<i64> {
    let input_ids = serde_json::to_string(&op.input_ids).unwrap_or_else(|_| "[]".to_string());
    let output_ids = serde_json::to_string(&op.output_ids).unwrap_or_else(|_| "[]".to_string());
    let detail = serde_json::to_string(&op.detail).unwrap_or_else(|_| "null".to_string());

    let result = sqlx::query(
        r#"
        INSERT INTO graph_operations (id, session_id, kind, input_ids, output_ids, detail, created_at)
        VALUES (?, ?, ?, ?, ?, ?, ?)
        "#,
    )
    .bind(&op.id)
    .bind(&op.session_id)
    .bind(op.kind.to_string())
    .bind(&input_ids)
    .bind(&output_ids)
    .bind(&detail)
    .bind(op.created_at.to_rfc3339())
    .execute(conn)
    .await?;

    Ok(result.last_insert_rowid())
}

async fn fetch_path(
    conn: &mut SqliteConnection,
    id: &str,
) -> StorageResult<Option<ResearchPath>> {
    let row: Option<PathRow> = sqlx::query_as(
        r#"
        SELECT seq, id, session_id, focus, query, status, score, steps, metadata, created_at, updated_at
        FROM research_paths
        WHERE id = ?
        "#,
    )
    .bind(id)
    .fetch_optional(conn)
    .await?;

    Ok(row.map(|r| r.into()))
}

#[async_trait]
impl Storage for SqliteStorage {
    async fn upsert_path(&self, path: &ResearchPath) -> StorageResult<()> {
        let mut conn = self.pool.acquire().await?;
        insert_path(&mut *conn, path).await
    }

    async fn get_path(&self, id: &str) -> StorageResult<Option<ResearchPath>> {
        let mut conn = self.pool.acquire().await?;
        fetch_path(&mut *conn, id).await
    }

    async fn get_session_paths(
        &self,
        session_id: &str,
        statuses: &[PathStatus],
    ) -> StorageResult<Vec<ResearchPath>> {
        let rows: Vec<PathRow> = if statuses.is_empty() {
            sqlx::query_as(
                r#"
                SELECT seq, id, session_id, focus, query, status, score, steps, metadata, created_at, updated_at
                FROM research_paths
                WHERE session_id = ?
                ORDER BY seq ASC
                "#,
            )
            .bind(session_id)
            .fetch_all(&self.pool)
            .await?
        } else {
            // SQLite has no array binds; build the placeholder list.
            let placeholders = vec!["?"; statuses.len()].join(", ");
            let sql = format!(
                r#"
                SELECT seq, id, session_id, focus, query, status, score, steps, metadata, created_at, updated_at
                FROM research_paths
                WHERE session_id = ? AND status IN ({})
                ORDER BY seq ASC
                "#,
                placeholders
            );
            let mut query = sqlx::query_as(&sql).bind(session_id);
            for status in statuses {
                query = query.bind(status.to_string());
            }
            query.fetch_all(&self.pool).await?
        };

        Ok(rows.into_iter().map(|r| r.into()).collect())
    }

    async fn update_path_status_checked(
        &self,
        id: &str,
        expected: PathStatus,
        new: PathStatus,
    ) -> StorageResult<bool> {
        let result = sqlx::query(
            r#"
            UPDATE research_paths
            SET status = ?, updated_at = ?
            WHERE id = ? AND status = ?
            "#,
        )
        .bind(new.to_string())
        .bind(Utc::now().to_rfc3339())
        .bind(id)
        .bind(expected.to_string())
        .execute(&self.pool)
        .await?;

        Ok(result.rows_affected() > 0)
    }

    async fn append_operation(&self, op: &GraphOperation) -> StorageResult<i64> {
        let mut conn = self.pool.acquire().await?;
        insert_operation(&mut *conn, op).await
    }

    async fn get_session_operations(
        &self,
        session_id: &str,
    ) -> StorageResult<Vec<GraphOperation>> {
        let rows: Vec<OperationRow> = sqlx::query_as(
            r#"
            SELECT seq, id, session_id, kind, input_ids, output_ids, detail, created_at
            FROM graph_operations
            WHERE session_id = ?
            ORDER BY seq ASC
            "#,
        )
        .bind(session_id)
        .fetch_all(&self.pool)
        .await?;

        Ok(rows.into_iter().map(|r| r.into()).collect())
    }

    async fn commit_generate(
        &self,
        paths: &[ResearchPath],
        op: &GraphOperation,
    ) -> StorageResult<Vec<ResearchPath>> {
        let mut tx = self.pool.begin().await?;

        for path in paths {
            insert_path(&mut *tx, path).await?;
        }
        insert_operation(&mut *tx, op).await?;

        // Read back the assigned sequence numbers before committing.
        let mut stored = Vec::with_capacity(paths.len());
        for path in paths {
            if let Some(persisted) = fetch_path(&mut *tx, &path.id).await? {
                stored.push(persisted);
            }
        }

        tx.commit().await?;
        Ok(stored)
    }

    async fn commit_refine(
        &self,
        path: &ResearchPath,
        op: &GraphOperation,
    ) -> StorageResult<bool> {
        let mut tx = self.pool.begin().await?;

        let steps = serde_json::to_string(&path.steps).unwrap_or_else(|_| "[]".to_string());
        let metadata =
            serde_json::to_string(&path.metadata).unwrap_or_else(|_| "{}".to_string());

        // The path must still be live when the write lands.
        let result = sqlx::query(
            r#"
            UPDATE research_paths
            SET focus = ?, query = ?, status = ?, score = ?, steps = ?, metadata = ?, updated_at = ?
            WHERE id = ? AND status IN ('active', 'refined')
            "#,
        )
        .bind(&path.focus)
        .bind(&path.query)
        .bind(path.status.to_string())
        .bind(path.score)
        .bind(&steps)
        .bind(&metadata)
        .bind(path.updated_at.to_rfc3339())
        .bind(&path.id)
        .execute(&mut *tx)
        .await?;

        if result.rows_affected() == 0 {
            tx.rollback().await?;
            return Ok(false);
        }

        insert_operation(&mut *tx, op).await?;
        tx.commit().await?;
        Ok(true)
    }

    async fn commit_scores(
        &self,
        updates: &[(String, f64)],
        op: &GraphOperation,
    ) -> StorageResult<()> {
        let mut tx = self.pool.begin().await?;
        let now = Utc::now().to_rfc3339();

        for (path_id, score) in updates {
            sqlx::query(
                r#"
                UPDATE research_paths
                SET score = ?, updated_at = ?
                WHERE id = ?
                "#,
            )
            .bind(score)
            .bind(&now)
            .bind(path_id)
            .execute(&mut *tx)
            .await?;
        }

        insert_operation(&mut *tx, op).await?;
        tx.commit().await?;
        Ok(())
    }

    async fn commit_prune(
        &self,
        path_ids: &[String],
        op: &GraphOperation,
    ) -> StorageResult<usize> {
        let mut tx = self.pool.begin().await?;
        let now = Utc::now().to_rfc3339();
        let mut pruned = 0usize;

        for path_id in path_ids {
            // Already-terminal rows are left alone.
            let result = sqlx::query(
                r#"
                UPDATE research_paths
                SET status = 'pruned', updated_at = ?
                WHERE id = ? AND status IN ('active', 'refined')
                "#,
            )
            .bind(&now)
            .bind(path_id)
            .execute(&mut *tx)
            .await?;
            pruned += result.rows_affected() as usize;
        }

        insert_operation(&mut *tx, op).await?;
        tx.commit().await?;
        Ok(pruned)
    }

    async fn commit_aggregate(
        &self,
        new_path: &ResearchPath,
        source_ids: &[String],
        op: &GraphOperation,
    ) -> StorageResult<AggregateCommit> {
        let mut tx = self.pool.begin().await?;
        let now = Utc::now().to_rfc3339();
        let mut stale = Vec::new();

        for source_id in source_ids {
            let result = sqlx::query(
                r#"
                UPDATE research_paths
                SET status = 'aggregated', updated_at = ?
                WHERE id = ? AND status IN ('active', 'refined')
                "#,
            )
            .bind(&now)
            .bind(source_id)
            .execute(&mut *tx)
            .await?;
            if result.rows_affected() == 0 {
                stale.push(source_id.clone());
            }
        }

        if !stale.is_empty() {
            tx.rollback().await?;
            return Ok(AggregateCommit::Stale(stale));
        }

        insert_path(&mut *tx, new_path).await?;
        insert_operation(&mut *tx, op).await?;

        let persisted = fetch_path(&mut *tx, &new_path.id)
            .await?
            .unwrap_or_else(|| new_path.clone());

        tx.commit().await?;
        Ok(AggregateCommit::Committed(persisted))
    }
}

// Internal row types for SQLx mapping
#[derive(sqlx::FromRow)]
struct PathRow {
    seq: i64,
    id: String,
    session_id: String,
    focus: String,
    query: String,
    status: String,
    score: f64,
    steps: String,
    metadata: String,
    created_at: String,
    updated_at: String,
}

impl From<PathRow> for ResearchPath {
    fn from(row: PathRow) -> Self {
        Self {
            id: row.id,
            session_id: row.session_id,
            focus: row.focus,
            query: row.query,
            status: row.status.parse().unwrap_or_default(),
            score: row.score,
            steps: serde_json::from_str(&row.steps).unwrap_or_default(),
            metadata: serde_json::from_str(&row.metadata).unwrap_or_default(),
            seq: row.seq,
            created_at: parse_timestamp(&row.created_at),
            updated_at: parse_timestamp(&row.updated_at),
        }
    }
}

#[derive(sqlx::FromRow)]
struct OperationRow {
    seq: i64,
    id: String,
    session_id: String,
    kind: String,
    input_ids: String,
    output_ids: String,
    detail: String,
    created_at: String,
}

impl From<OperationRow> for GraphOperation {
    fn from(row: OperationRow) -> Self {
        Self {
            id: row.id,
            session_id: row.session_id,
            seq: row.seq,
            kind: row.kind.parse().unwrap_or(OperationKind::Generate),
            input_ids: serde_json::from_str(&row.input_ids).unwrap_or_default(),
            output_ids: serde_json::from_str(&row.output_ids).unwrap_or_default(),
            detail: serde_json::from_str(&row.detail).unwrap_or(serde_json::Value::Null),
            created_at: parse_timestamp(&row.created_at),
        }
    }
}

fn parse_timestamp(value: &str) -> DateTime<Utc> {
    DateTime::parse_from_rfc3339(value)
        .map(|dt| dt.with_timezone(&Utc))
        .unwrap_or_else(|_| Utc::now())
}
