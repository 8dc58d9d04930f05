//! Load status lifecycle for one credentials id
//!
//! A single mutable status row per credentials id, overwritten on every
//! transition and mirrored into an append-only audit trail. The `run_seq`
//! tag makes a superseding run safe against delayed writes from a stale one.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Top-level lifecycle state of a holdings load
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, sqlx::Type)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
#[sqlx(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum LoadStatusName {
    NotStarted,
    InProgress,
    Completed,
    Failed,
}

/// Sub-state of an in-progress load; `None` outside `InProgress`
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, sqlx::Type)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
#[sqlx(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum LoadStatusDetail {
    None,
    PopulatingStagingArea,
    LoadingHoldings,
}

/// Current load lifecycle state of one credentials id
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LoadStatus {
    pub credentials_id: String,
    pub name: LoadStatusName,
    pub detail: LoadStatusDetail,
    pub imported_pages: u32,
    pub total_count: u32,
    pub started: Option<DateTime<Utc>>,
    pub finished: Option<DateTime<Utc>>,
    pub updated: Option<DateTime<Utc>>,
    /// Monotonically increasing per credentials id; guards stale writes
    pub run_seq: i64,
}

impl LoadStatus {
    /// Default state for a credentials id that never ran a load
    pub fn not_started(credentials_id: &str) -> Self {
        Self {
            credentials_id: credentials_id.to_string(),
            name: LoadStatusName::NotStarted,
            detail: LoadStatusDetail::None,
            imported_pages: 0,
            total_count: 0,
            started: None,
            finished: None,
            updated: None,
            run_seq: 0,
        }
    }

    /// A new run entered the cycle; upstream is populating its staging area
    pub fn populating_staging_area(credentials_id: &str, run_seq: i64) -> Self {
        let now = Utc::now();
        Self {
            credentials_id: credentials_id.to_string(),
            name: LoadStatusName::InProgress,
            detail: LoadStatusDetail::PopulatingStagingArea,
            imported_pages: 0,
            total_count: 0,
            started: Some(now),
            finished: None,
            updated: Some(now),
            run_seq,
        }
    }

    /// Snapshot is ready; pages are being fetched and persisted
    pub fn loading_holdings(
        credentials_id: &str,
        run_seq: i64,
        started: Option<DateTime<Utc>>,
        imported_pages: u32,
        total_count: u32,
    ) -> Self {
        Self {
            credentials_id: credentials_id.to_string(),
            name: LoadStatusName::InProgress,
            detail: LoadStatusDetail::LoadingHoldings,
            imported_pages,
            total_count,
            started,
            finished: None,
            updated: Some(Utc::now()),
            run_seq,
        }
    }

    /// Every page persisted; run finished successfully
    pub fn completed(
        credentials_id: &str,
        run_seq: i64,
        started: Option<DateTime<Utc>>,
        imported_pages: u32,
        total_count: u32,
    ) -> Self {
        let now = Utc::now();
        Self {
            credentials_id: credentials_id.to_string(),
            name: LoadStatusName::Completed,
            detail: LoadStatusDetail::None,
            imported_pages,
            total_count,
            started,
            finished: Some(now),
            updated: Some(now),
            run_seq,
        }
    }

    /// Run hit a terminal error or exhausted its retry budget
    pub fn failed(credentials_id: &str, run_seq: i64, started: Option<DateTime<Utc>>) -> Self {
        let now = Utc::now();
        Self {
            credentials_id: credentials_id.to_string(),
            name: LoadStatusName::Failed,
            detail: LoadStatusDetail::None,
            imported_pages: 0,
            total_count: 0,
            started,
            finished: Some(now),
            updated: Some(now),
            run_seq,
        }
    }

    pub fn is_in_progress(&self) -> bool {
        self.name == LoadStatusName::InProgress
    }
}
