//! Upstream transaction handles (transaction+delta strategy)
//!
//! The provider identifies each snapshot generation run with a transaction
//! id; comparing two transactions yields a delta. At most one transaction is
//! "current" per credentials id, superseded ones stay around for delta
//! comparison until they expire.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// One upstream snapshot-generation transaction
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, sqlx::FromRow)]
pub struct HoldingsTransaction {
    pub credentials_id: String,
    pub transaction_id: String,
    pub created_at: DateTime<Utc>,
}

impl HoldingsTransaction {
    pub fn new(credentials_id: &str, transaction_id: &str) -> Self {
        Self {
            credentials_id: credentials_id.to_string(),
            transaction_id: transaction_id.to_string(),
            created_at: Utc::now(),
        }
    }
}
