//! Configuration infrastructure
//!
//! Serde-backed configuration tree with sensible defaults, loaded from a
//! JSON file when one exists and written back with defaults when it does
//! not. All pipeline tuning knobs (retry budget, backoff, freshness and
//! staleness windows, page size) live here.

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::time::Duration;
use tokio::fs;
use tracing::info;

/// Complete application configuration
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct AppConfig {
    pub database: DatabaseConfig,
    pub upstream: UpstreamConfig,
    pub pipeline: PipelineConfig,
    pub logging: LoggingConfig,
}

/// SQLite database settings
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DatabaseConfig {
    pub url: String,
    pub max_connections: u32,
}

impl Default for DatabaseConfig {
    fn default() -> Self {
        Self {
            url: "sqlite://data/holdings.db".to_string(),
            max_connections: 10,
        }
    }
}

/// Upstream provider endpoint settings
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UpstreamConfig {
    pub base_url: String,
    pub api_key: String,
    pub timeout_seconds: u64,
    pub max_requests_per_second: u32,
}

impl Default for UpstreamConfig {
    fn default() -> Self {
        Self {
            base_url: "https://sandbox.example-kb.com/rm/rmaccounts".to_string(),
            api_key: String::new(),
            timeout_seconds: 30,
            max_requests_per_second: 5,
        }
    }
}

/// Synchronization pipeline tuning knobs
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PipelineConfig {
    /// Bounded retry budget shared by snapshot polling and page loading
    pub max_attempts: u32,
    pub retry_base_delay_ms: u64,
    pub retry_max_delay_ms: u64,
    /// Window within which an existing upstream snapshot/transaction is reused
    pub freshness_window_secs: i64,
    /// Window after which an IN_PROGRESS run is presumed stuck and superseded
    pub staleness_window_secs: i64,
    pub page_size: u32,
    pub audit_retention_days: i64,
    pub transaction_expiry_days: i64,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            retry_base_delay_ms: 500,
            retry_max_delay_ms: 300_000,
            freshness_window_secs: 300,
            staleness_window_secs: 10 * 24 * 3600,
            page_size: 2500,
            audit_retention_days: 30,
            transaction_expiry_days: 30,
        }
    }
}

impl PipelineConfig {
    pub fn retry_base_delay(&self) -> Duration {
        Duration::from_millis(self.retry_base_delay_ms)
    }

    pub fn retry_max_delay(&self) -> Duration {
        Duration::from_millis(self.retry_max_delay_ms)
    }

    pub fn freshness_window(&self) -> chrono::Duration {
        chrono::Duration::seconds(self.freshness_window_secs)
    }

    pub fn staleness_window(&self) -> chrono::Duration {
        chrono::Duration::seconds(self.staleness_window_secs)
    }

    pub fn audit_retention(&self) -> chrono::Duration {
        chrono::Duration::days(self.audit_retention_days)
    }

    pub fn transaction_expiry(&self) -> chrono::Duration {
        chrono::Duration::days(self.transaction_expiry_days)
    }

    /// Number of pages needed to cover `total_count` records
    pub fn page_count_for(&self, total_count: u32) -> u32 {
        if total_count == 0 {
            0
        } else {
            total_count.div_ceil(self.page_size)
        }
    }
}

/// Logging configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoggingConfig {
    pub level: String,
    pub json_output: bool,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            json_output: false,
        }
    }
}

impl AppConfig {
    /// Load configuration from a JSON file, writing defaults when absent
    pub async fn load_or_default(path: &Path) -> Result<Self> {
        if path.exists() {
            let content = fs::read_to_string(path)
                .await
                .with_context(|| format!("Failed to read config file: {}", path.display()))?;
            let config: Self = serde_json::from_str(&content)
                .with_context(|| format!("Failed to parse config file: {}", path.display()))?;
            info!("Loaded configuration from {}", path.display());
            Ok(config)
        } else {
            let config = Self::default();
            config.save(path).await?;
            info!("Created default configuration at {}", path.display());
            Ok(config)
        }
    }

    /// Persist the configuration as pretty JSON
    pub async fn save(&self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)
                .await
                .with_context(|| format!("Failed to create config directory: {}", parent.display()))?;
        }
        let content = serde_json::to_string_pretty(self).context("Failed to serialize config")?;
        fs::write(path, content)
            .await
            .with_context(|| format!("Failed to write config file: {}", path.display()))?;
        Ok(())
    }
}
