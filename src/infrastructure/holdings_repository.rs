//! Repository for persisted holding rows
//!
//! Upserts are keyed by `(credentials_id, vendor, package, title)` so both
//! page persistence and delta application are idempotent: replaying the same
//! page or delta batch yields the same end state. Each upsert stamps
//! `updated_at`, which a full run uses afterwards to sweep rows the new
//! snapshot no longer contains.

use chrono::{DateTime, Utc};
use sqlx::{Row, SqlitePool};
use std::sync::Arc;

use crate::domain::errors::PipelineError;
use crate::domain::events::{DeltaEntry, DeltaOp};
use crate::domain::holding::{HoldingRecord, HoldingsKey};

#[derive(Clone)]
pub struct HoldingsRepository {
    pool: Arc<SqlitePool>,
}

impl HoldingsRepository {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool: Arc::new(pool) }
    }

    /// Insert or update one page of holding records
    pub async fn upsert_page(
        &self,
        credentials_id: &str,
        records: &[HoldingRecord],
        touched_at: DateTime<Utc>,
    ) -> Result<(), PipelineError> {
        let mut tx = self.pool.begin().await?;
        for record in records {
            sqlx::query(
                r#"
                INSERT INTO holdings
                    (credentials_id, vendor_id, package_id, title_id, publication_title,
                     publisher_name, resource_type, format, embargo, updated_at)
                VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
                ON CONFLICT(credentials_id, vendor_id, package_id, title_id) DO UPDATE SET
                    publication_title = excluded.publication_title,
                    publisher_name = excluded.publisher_name,
                    resource_type = excluded.resource_type,
                    format = excluded.format,
                    embargo = excluded.embargo,
                    updated_at = excluded.updated_at
                "#,
            )
            .bind(credentials_id)
            .bind(record.vendor_id)
            .bind(record.package_id)
            .bind(record.title_id)
            .bind(&record.publication_title)
            .bind(&record.publisher_name)
            .bind(&record.resource_type)
            .bind(&record.format)
            .bind(&record.embargo)
            .bind(touched_at)
            .execute(&mut *tx)
            .await?;
        }
        tx.commit().await?;
        Ok(())
    }

    /// Remove one holding by its composite key; idempotent
    pub async fn delete_by_key(
        &self,
        credentials_id: &str,
        key: HoldingsKey,
    ) -> Result<(), PipelineError> {
        sqlx::query(
            r#"
            DELETE FROM holdings
            WHERE credentials_id = ? AND vendor_id = ? AND package_id = ? AND title_id = ?
            "#,
        )
        .bind(credentials_id)
        .bind(key.vendor_id)
        .bind(key.package_id)
        .bind(key.title_id)
        .execute(&*self.pool)
        .await?;
        Ok(())
    }

    /// Apply one page of delta entries: deletions remove by key, additions
    /// and updates upsert. Replay-safe by construction.
    pub async fn apply_delta(
        &self,
        credentials_id: &str,
        entries: &[DeltaEntry],
        touched_at: DateTime<Utc>,
    ) -> Result<(), PipelineError> {
        for entry in entries {
            match entry.op {
                DeltaOp::Deleted => self.delete_by_key(credentials_id, entry.key).await?,
                DeltaOp::Added | DeltaOp::Updated => {
                    if let Some(record) = &entry.record {
                        self.upsert_page(credentials_id, std::slice::from_ref(record), touched_at)
                            .await?;
                    }
                }
            }
        }
        Ok(())
    }

    /// Full-run replacement sweep: delete rows not touched since run start
    pub async fn delete_not_touched_since(
        &self,
        credentials_id: &str,
        since: DateTime<Utc>,
    ) -> Result<u64, PipelineError> {
        let result = sqlx::query(
            "DELETE FROM holdings WHERE credentials_id = ? AND updated_at < ?",
        )
        .bind(credentials_id)
        .bind(since)
        .execute(&*self.pool)
        .await?;
        Ok(result.rows_affected())
    }

    pub async fn get_by_key(
        &self,
        credentials_id: &str,
        key: HoldingsKey,
    ) -> Result<Option<HoldingRecord>, PipelineError> {
        let row = sqlx::query(
            r#"
            SELECT vendor_id, package_id, title_id, publication_title,
                   publisher_name, resource_type, format, embargo
            FROM holdings
            WHERE credentials_id = ? AND vendor_id = ? AND package_id = ? AND title_id = ?
            "#,
        )
        .bind(credentials_id)
        .bind(key.vendor_id)
        .bind(key.package_id)
        .bind(key.title_id)
        .fetch_optional(&*self.pool)
        .await?;

        Ok(row.map(|row| HoldingRecord {
            vendor_id: row.get("vendor_id"),
            package_id: row.get("package_id"),
            title_id: row.get("title_id"),
            publication_title: row.get("publication_title"),
            publisher_name: row.get("publisher_name"),
            resource_type: row.get("resource_type"),
            format: row.get("format"),
            embargo: row.get("embargo"),
        }))
    }

    pub async fn count(&self, credentials_id: &str) -> Result<u32, PipelineError> {
        let row = sqlx::query("SELECT COUNT(*) AS cnt FROM holdings WHERE credentials_id = ?")
            .bind(credentials_id)
            .fetch_one(&*self.pool)
            .await?;
        let count: i64 = row.get("cnt");
        Ok(count as u32)
    }
}
