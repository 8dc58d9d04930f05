//! Repository for upstream transaction records
//!
//! The transaction+delta strategy keeps the most recent transaction as the
//! comparison base for the next delta. Superseded transactions stay until
//! they pass the expiry window.

use chrono::Utc;
use sqlx::SqlitePool;
use std::sync::Arc;

use crate::domain::errors::PipelineError;
use crate::domain::transaction::HoldingsTransaction;

#[derive(Clone)]
pub struct TransactionRepository {
    pool: Arc<SqlitePool>,
}

impl TransactionRepository {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool: Arc::new(pool) }
    }

    pub async fn save(&self, transaction: &HoldingsTransaction) -> Result<(), PipelineError> {
        sqlx::query(
            r#"
            INSERT INTO holdings_transactions (credentials_id, transaction_id, created_at)
            VALUES (?, ?, ?)
            ON CONFLICT(credentials_id, transaction_id) DO UPDATE SET
                created_at = excluded.created_at
            "#,
        )
        .bind(&transaction.credentials_id)
        .bind(&transaction.transaction_id)
        .bind(transaction.created_at)
        .execute(&*self.pool)
        .await?;
        Ok(())
    }

    /// Most recently created transaction for a credentials id
    pub async fn current(
        &self,
        credentials_id: &str,
    ) -> Result<Option<HoldingsTransaction>, PipelineError> {
        let transaction = sqlx::query_as::<_, HoldingsTransaction>(
            r#"
            SELECT credentials_id, transaction_id, created_at
            FROM holdings_transactions
            WHERE credentials_id = ?
            ORDER BY created_at DESC LIMIT 1
            "#,
        )
        .bind(credentials_id)
        .fetch_optional(&*self.pool)
        .await?;
        Ok(transaction)
    }

    /// Remove transactions older than the expiry window
    pub async fn purge_expired(
        &self,
        credentials_id: &str,
        expiry: chrono::Duration,
    ) -> Result<u64, PipelineError> {
        let cutoff = Utc::now() - expiry;
        let result = sqlx::query(
            "DELETE FROM holdings_transactions WHERE credentials_id = ? AND created_at < ?",
        )
        .bind(credentials_id)
        .bind(cutoff)
        .execute(&*self.pool)
        .await?;
        Ok(result.rows_affected())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::infrastructure::database_connection::DatabaseConnection;

    async fn repository() -> TransactionRepository {
        let db = DatabaseConnection::in_memory().await.unwrap();
        db.migrate().await.unwrap();
        TransactionRepository::new(db.pool().clone())
    }

    #[tokio::test]
    async fn current_returns_latest_by_creation() {
        let repo = repository().await;
        let mut older = HoldingsTransaction::new("creds-1", "txn-old");
        older.created_at = Utc::now() - chrono::Duration::hours(2);
        repo.save(&older).await.unwrap();
        repo.save(&HoldingsTransaction::new("creds-1", "txn-new")).await.unwrap();

        let current = repo.current("creds-1").await.unwrap().unwrap();
        assert_eq!(current.transaction_id, "txn-new");
    }

    #[tokio::test]
    async fn purge_keeps_recent_transactions() {
        let repo = repository().await;
        let mut expired = HoldingsTransaction::new("creds-1", "txn-expired");
        expired.created_at = Utc::now() - chrono::Duration::days(60);
        repo.save(&expired).await.unwrap();
        repo.save(&HoldingsTransaction::new("creds-1", "txn-live")).await.unwrap();

        let purged = repo.purge_expired("creds-1", chrono::Duration::days(30)).await.unwrap();
        assert_eq!(purged, 1);
        let current = repo.current("creds-1").await.unwrap().unwrap();
        assert_eq!(current.transaction_id, "txn-live");
    }

    #[tokio::test]
    async fn missing_credentials_has_no_current() {
        let repo = repository().await;
        assert!(repo.current("creds-x").await.unwrap().is_none());
    }
}
