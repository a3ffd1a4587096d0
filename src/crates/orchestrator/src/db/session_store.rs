//! Sqlite-backed session store.
//!
//! Implements the same conditional-write policy as the in-memory store:
//! an UPDATE only lands when the incoming revision is strictly greater
//! than the stored one, so a writer in another process cannot clobber
//! newer state.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use review_checkpoint::{
    bound_graph_state, CheckpointError, Checkpointer, Result, SessionRecord,
};
use sqlx::{Row, SqlitePool};

pub struct SqliteSessionStore {
    pool: SqlitePool,
}

impl SqliteSessionStore {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }
}

fn storage_err(err: sqlx::Error) -> CheckpointError {
    CheckpointError::Storage(err.to_string())
}

fn row_to_record(row: sqlx::sqlite::SqliteRow) -> Result<SessionRecord> {
    let graph_state: String = row.get("graph_state");
    let last_access: String = row.get("last_access_ts");
    Ok(SessionRecord {
        task_id: row.get("task_id"),
        user_id: row.get("user_id"),
        domain_id: row.get("domain_id"),
        status: row.get("status"),
        is_complete: row.get::<i64, _>("is_complete") != 0,
        error: row.get("error"),
        graph_state: serde_json::from_str(&graph_state)
            .map_err(|e| CheckpointError::Serialization(e.to_string()))?,
        last_access_ts: DateTime::parse_from_rfc3339(&last_access)
            .map(|t| t.with_timezone(&Utc))
            .unwrap_or_else(|_| Utc::now()),
        revision: row.get::<i64, _>("revision") as u64,
    })
}

#[async_trait]
impl Checkpointer for SqliteSessionStore {
    async fn save_session(&self, mut record: SessionRecord) -> Result<()> {
        record.graph_state = bound_graph_state(&record.graph_state);
        let graph_state = record.graph_state.to_string();
        let now = Utc::now().to_rfc3339();

        let result = sqlx::query(
            "INSERT INTO sessions
                (task_id, user_id, domain_id, status, is_complete, error,
                 graph_state, last_access_ts, revision)
             VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?)
             ON CONFLICT(task_id) DO UPDATE SET
                user_id = excluded.user_id,
                domain_id = excluded.domain_id,
                status = excluded.status,
                is_complete = excluded.is_complete,
                error = excluded.error,
                graph_state = excluded.graph_state,
                last_access_ts = excluded.last_access_ts,
                revision = excluded.revision
             WHERE sessions.revision < excluded.revision",
        )
        .bind(&record.task_id)
        .bind(&record.user_id)
        .bind(&record.domain_id)
        .bind(&record.status)
        .bind(record.is_complete as i64)
        .bind(&record.error)
        .bind(&graph_state)
        .bind(&now)
        .bind(record.revision as i64)
        .execute(&self.pool)
        .await
        .map_err(storage_err)?;

        if result.rows_affected() == 0 {
            let stored: Option<(i64,)> =
                sqlx::query_as("SELECT revision FROM sessions WHERE task_id = ?")
                    .bind(&record.task_id)
                    .fetch_optional(&self.pool)
                    .await
                    .map_err(storage_err)?;
            return Err(CheckpointError::StaleRevision {
                task_id: record.task_id,
                incoming: record.revision,
                stored: stored.map(|(r,)| r as u64).unwrap_or(0),
            });
        }
        Ok(())
    }

    async fn load_session(&self, task_id: &str) -> Result<Option<SessionRecord>> {
        let row = sqlx::query("SELECT * FROM sessions WHERE task_id = ?")
            .bind(task_id)
            .fetch_optional(&self.pool)
            .await
            .map_err(storage_err)?;
        row.map(row_to_record).transpose()
    }

    async fn update_session_status(
        &self,
        task_id: &str,
        status: &str,
        is_complete: bool,
        error: Option<String>,
    ) -> Result<()> {
        let result = sqlx::query(
            "UPDATE sessions SET status = ?, is_complete = ?, error = ?, last_access_ts = ?
             WHERE task_id = ?",
        )
        .bind(status)
        .bind(is_complete as i64)
        .bind(&error)
        .bind(Utc::now().to_rfc3339())
        .bind(task_id)
        .execute(&self.pool)
        .await
        .map_err(storage_err)?;

        if result.rows_affected() == 0 {
            return Err(CheckpointError::NotFound(task_id.to_string()));
        }
        Ok(())
    }

    async fn touch(&self, task_id: &str) -> Result<()> {
        sqlx::query("UPDATE sessions SET last_access_ts = ? WHERE task_id = ?")
            .bind(Utc::now().to_rfc3339())
            .bind(task_id)
            .execute(&self.pool)
            .await
            .map_err(storage_err)?;
        Ok(())
    }

    async fn delete_session(&self, task_id: &str) -> Result<()> {
        sqlx::query("DELETE FROM sessions WHERE task_id = ?")
            .bind(task_id)
            .execute(&self.pool)
            .await
            .map_err(storage_err)?;
        Ok(())
    }

    async fn list_task_ids(&self) -> Result<Vec<String>> {
        let rows = sqlx::query("SELECT task_id FROM sessions")
            .fetch_all(&self.pool)
            .await
            .map_err(storage_err)?;
        Ok(rows.iter().map(|r| r.get("task_id")).collect())
    }
}
