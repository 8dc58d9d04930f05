//! Pipeline messages and events
//!
//! Two kinds of traffic flow through the pipeline: point-to-point messages
//! handed from the snapshot orchestrator to the coordinator's run loop
//! (`SnapshotMessage`, mpsc), and broadcast `LoadEvent`s announcing state
//! changes to any interested subscriber (tests, metrics, UI feeds).

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::errors::PipelineError;
use super::holding::{HoldingRecord, HoldingsKey};

/// How the ready snapshot is to be ingested
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum LoadPlan {
    /// Fetch and upsert every page of the full holdings set
    Full {
        /// Present when pages come from a transaction rather than a snapshot
        transaction_id: Option<String>,
        page_count: u32,
        page_size: u32,
    },
    /// Apply a delta report comparing two transactions
    Delta {
        delta_id: String,
        page_count: u32,
        page_size: u32,
    },
}

impl LoadPlan {
    pub fn page_count(&self) -> u32 {
        match self {
            Self::Full { page_count, .. } | Self::Delta { page_count, .. } => *page_count,
        }
    }
}

/// Result of a successful snapshot orchestration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SnapshotOutcome {
    pub total_count: u32,
    pub plan: LoadPlan,
}

/// Point-to-point hand-off from orchestrator task to coordinator run loop
#[derive(Debug)]
pub enum SnapshotMessage {
    Ready(SnapshotOutcome),
    Failed(PipelineError),
}

/// Classification of one holding inside a delta report
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DeltaOp {
    Added,
    Updated,
    Deleted,
}

/// One entry of a delta report page
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DeltaEntry {
    pub op: DeltaOp,
    pub key: HoldingsKey,
    /// Full record for `Added`/`Updated`; absent for `Deleted`
    #[serde(default)]
    pub record: Option<HoldingRecord>,
}

/// Broadcast state-change announcements
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum LoadEvent {
    /// One snapshot creation/polling attempt failed; more may follow
    SnapshotAttemptFailed {
        credentials_id: String,
        category: String,
        attempts_left: u32,
        timestamp: DateTime<Utc>,
    },
    SnapshotReady {
        credentials_id: String,
        total_count: u32,
        page_count: u32,
        timestamp: DateTime<Utc>,
    },
    PageSaved {
        credentials_id: String,
        page: u32,
        records: u32,
        timestamp: DateTime<Utc>,
    },
    LoadCompleted {
        credentials_id: String,
        imported_pages: u32,
        total_count: u32,
        timestamp: DateTime<Utc>,
    },
    LoadFailed {
        credentials_id: String,
        category: String,
        timestamp: DateTime<Utc>,
    },
}

impl LoadEvent {
    pub fn credentials_id(&self) -> &str {
        match self {
            Self::SnapshotAttemptFailed { credentials_id, .. }
            | Self::SnapshotReady { credentials_id, .. }
            | Self::PageSaved { credentials_id, .. }
            | Self::LoadCompleted { credentials_id, .. }
            | Self::LoadFailed { credentials_id, .. } => credentials_id,
        }
    }
}
