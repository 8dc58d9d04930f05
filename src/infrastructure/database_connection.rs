// Database connection and pool management
// This module handles SQLite database connections using sqlx

use anyhow::Result;
use sqlx::sqlite::SqlitePoolOptions;
use sqlx::SqlitePool;
use std::path::Path;

pub struct DatabaseConnection {
    pool: SqlitePool,
}

impl DatabaseConnection {
    pub async fn new(database_url: &str) -> Result<Self> {
        // Create database file directory if it doesn't exist
        let db_path = if database_url.starts_with("sqlite://") {
            database_url.trim_start_matches("sqlite://")
        } else if database_url.starts_with("sqlite:") {
            database_url.trim_start_matches("sqlite:")
        } else {
            database_url
        };

        if db_path != ":memory:" {
            if let Some(parent) = Path::new(db_path).parent() {
                tokio::fs::create_dir_all(parent).await?;
            }
            if !Path::new(db_path).exists() {
                std::fs::File::create(db_path)?;
            }
        }

        let pool = SqlitePoolOptions::new()
            .max_connections(10)
            .connect(database_url)
            .await?;

        Ok(Self { pool })
    }

    /// In-memory database for tests and throwaway runs
    pub async fn in_memory() -> Result<Self> {
        let pool = SqlitePoolOptions::new()
            .max_connections(1)
            .connect("sqlite::memory:")
            .await?;
        Ok(Self { pool })
    }

    pub fn pool(&self) -> &SqlitePool {
        &self.pool
    }

    pub async fn migrate(&self) -> Result<()> {
        let create_load_status_sql = r#"
            CREATE TABLE IF NOT EXISTS load_status (
                credentials_id TEXT PRIMARY KEY,
                name TEXT NOT NULL,
                detail TEXT NOT NULL DEFAULT 'NONE',
                imported_pages INTEGER NOT NULL DEFAULT 0,
                total_count INTEGER NOT NULL DEFAULT 0,
                run_seq INTEGER NOT NULL DEFAULT 0,
                started DATETIME,
                finished DATETIME,
                updated DATETIME
            )
        "#;

        let create_load_audit_sql = r#"
            CREATE TABLE IF NOT EXISTS load_audit (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                credentials_id TEXT NOT NULL,
                name TEXT NOT NULL,
                detail TEXT NOT NULL,
                imported_pages INTEGER NOT NULL,
                total_count INTEGER NOT NULL,
                run_seq INTEGER NOT NULL,
                recorded_at DATETIME NOT NULL
            )
        "#;

        let create_transactions_sql = r#"
            CREATE TABLE IF NOT EXISTS holdings_transactions (
                credentials_id TEXT NOT NULL,
                transaction_id TEXT NOT NULL,
                created_at DATETIME NOT NULL,
                PRIMARY KEY (credentials_id, transaction_id)
            )
        "#;

        let create_holdings_sql = r#"
            CREATE TABLE IF NOT EXISTS holdings (
                credentials_id TEXT NOT NULL,
                vendor_id INTEGER NOT NULL,
                package_id INTEGER NOT NULL,
                title_id INTEGER NOT NULL,
                publication_title TEXT NOT NULL,
                publisher_name TEXT,
                resource_type TEXT,
                format TEXT,
                embargo TEXT,
                updated_at DATETIME NOT NULL,
                PRIMARY KEY (credentials_id, vendor_id, package_id, title_id)
            )
        "#;

        let create_indexes_sql = r#"
            CREATE INDEX IF NOT EXISTS idx_load_audit_credentials ON load_audit (credentials_id, recorded_at);
            CREATE INDEX IF NOT EXISTS idx_transactions_created ON holdings_transactions (credentials_id, created_at);
            CREATE INDEX IF NOT EXISTS idx_holdings_updated ON holdings (credentials_id, updated_at);
        "#;

        sqlx::query(create_load_status_sql).execute(&self.pool).await?;
        sqlx::query(create_load_audit_sql).execute(&self.pool).await?;
        sqlx::query(create_transactions_sql).execute(&self.pool).await?;
        sqlx::query(create_holdings_sql).execute(&self.pool).await?;

        for statement in create_indexes_sql.split(';') {
            let statement = statement.trim();
            if !statement.is_empty() {
                sqlx::query(statement).execute(&self.pool).await?;
            }
        }

        Ok(())
    }
}
