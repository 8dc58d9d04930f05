//! Repository for the load status row and its append-only audit trail
//!
//! One mutable status row per credentials id plus an audit row for every
//! transition, written in the same database transaction. Status writes carry
//! the run sequence number; a write tagged with an older sequence than the
//! stored row is discarded so a delayed write from a superseded run can never
//! clobber the current one.

use chrono::{DateTime, Utc};
use sqlx::{Row, SqlitePool};
use std::sync::Arc;
use tracing::debug;

use crate::domain::errors::PipelineError;
use crate::domain::load_status::{LoadStatus, LoadStatusDetail, LoadStatusName};

/// Timestamped copy of one status transition
#[derive(Debug, Clone, PartialEq, sqlx::FromRow)]
pub struct AuditRecord {
    pub credentials_id: String,
    pub name: LoadStatusName,
    pub detail: LoadStatusDetail,
    pub imported_pages: u32,
    pub total_count: u32,
    pub run_seq: i64,
    pub recorded_at: DateTime<Utc>,
}

#[derive(Clone)]
pub struct LoadStatusRepository {
    pool: Arc<SqlitePool>,
}

impl LoadStatusRepository {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool: Arc::new(pool) }
    }

    /// Current status for a credentials id; NOT_STARTED when absent
    pub async fn get(&self, credentials_id: &str) -> Result<LoadStatus, PipelineError> {
        let row = sqlx::query(
            r#"
            SELECT credentials_id, name, detail, imported_pages, total_count, run_seq,
                   started, finished, updated
            FROM load_status WHERE credentials_id = ?
            "#,
        )
        .bind(credentials_id)
        .fetch_optional(&*self.pool)
        .await?;

        match row {
            Some(row) => Ok(LoadStatus {
                credentials_id: row.get("credentials_id"),
                name: row.get("name"),
                detail: row.get("detail"),
                imported_pages: row.get("imported_pages"),
                total_count: row.get("total_count"),
                started: row.get("started"),
                finished: row.get("finished"),
                updated: row.get("updated"),
                run_seq: row.get("run_seq"),
            }),
            None => Ok(LoadStatus::not_started(credentials_id)),
        }
    }

    /// Overwrite the status row and append an audit record atomically.
    ///
    /// Returns `false` when the write carried a stale run sequence and was
    /// discarded.
    pub async fn transition(&self, status: &LoadStatus) -> Result<bool, PipelineError> {
        let mut tx = self.pool.begin().await?;

        let result = sqlx::query(
            r#"
            INSERT INTO load_status
                (credentials_id, name, detail, imported_pages, total_count, run_seq,
                 started, finished, updated)
            VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?)
            ON CONFLICT(credentials_id) DO UPDATE SET
                name = excluded.name,
                detail = excluded.detail,
                imported_pages = excluded.imported_pages,
                total_count = excluded.total_count,
                run_seq = excluded.run_seq,
                started = excluded.started,
                finished = excluded.finished,
                updated = excluded.updated
            WHERE excluded.run_seq >= load_status.run_seq
            "#,
        )
        .bind(&status.credentials_id)
        .bind(status.name)
        .bind(status.detail)
        .bind(status.imported_pages)
        .bind(status.total_count)
        .bind(status.run_seq)
        .bind(status.started)
        .bind(status.finished)
        .bind(status.updated)
        .execute(&mut *tx)
        .await?;

        if result.rows_affected() == 0 {
            // Stale write from a superseded run
            tx.rollback().await?;
            debug!(
                credentials_id = %status.credentials_id,
                run_seq = status.run_seq,
                "Discarded stale status write"
            );
            return Ok(false);
        }

        sqlx::query(
            r#"
            INSERT INTO load_audit
                (credentials_id, name, detail, imported_pages, total_count, run_seq, recorded_at)
            VALUES (?, ?, ?, ?, ?, ?, ?)
            "#,
        )
        .bind(&status.credentials_id)
        .bind(status.name)
        .bind(status.detail)
        .bind(status.imported_pages)
        .bind(status.total_count)
        .bind(status.run_seq)
        .bind(Utc::now())
        .execute(&mut *tx)
        .await?;

        tx.commit().await?;
        Ok(true)
    }

    /// Whether an IN_PROGRESS run exists whose last update is younger than
    /// `stale_after`. Used to reject concurrent start requests while letting
    /// a stuck run be superseded.
    pub async fn is_running_and_fresh(
        &self,
        credentials_id: &str,
        stale_after: chrono::Duration,
    ) -> Result<bool, PipelineError> {
        let status = self.get(credentials_id).await?;
        let fresh = status.is_in_progress()
            && status
                .updated
                .is_some_and(|updated| Utc::now() - updated < stale_after);
        Ok(fresh)
    }

    /// Next run sequence number for a credentials id
    pub async fn next_run_seq(&self, credentials_id: &str) -> Result<i64, PipelineError> {
        let row = sqlx::query(
            "SELECT COALESCE(MAX(run_seq), 0) AS seq FROM load_status WHERE credentials_id = ?",
        )
        .bind(credentials_id)
        .fetch_one(&*self.pool)
        .await?;
        let current: i64 = row.get("seq");
        Ok(current + 1)
    }

    /// Drop audit rows older than the retention window; called at run start
    pub async fn purge_audit_older_than(
        &self,
        credentials_id: &str,
        retention: chrono::Duration,
    ) -> Result<u64, PipelineError> {
        let cutoff = Utc::now() - retention;
        let result = sqlx::query(
            "DELETE FROM load_audit WHERE credentials_id = ? AND recorded_at < ?",
        )
        .bind(credentials_id)
        .bind(cutoff)
        .execute(&*self.pool)
        .await?;
        Ok(result.rows_affected())
    }

    /// Full audit trail, oldest first
    pub async fn audit_trail(&self, credentials_id: &str) -> Result<Vec<AuditRecord>, PipelineError> {
        let records = sqlx::query_as::<_, AuditRecord>(
            r#"
            SELECT credentials_id, name, detail, imported_pages, total_count, run_seq, recorded_at
            FROM load_audit WHERE credentials_id = ? ORDER BY id ASC
            "#,
        )
        .bind(credentials_id)
        .fetch_all(&*self.pool)
        .await?;
        Ok(records)
    }
}
