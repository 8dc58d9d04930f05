//! Holding records imported from the upstream provider
//!
//! A holding is identified by the composite `(vendor, package, title)` key
//! upstream uses; everything else is descriptive data copied as-is.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Composite identity of a holding as assigned by the upstream provider
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct HoldingsKey {
    pub vendor_id: i64,
    pub package_id: i64,
    pub title_id: i64,
}

impl fmt::Display for HoldingsKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}-{}-{}", self.vendor_id, self.package_id, self.title_id)
    }
}

/// One holding row as delivered by upstream snapshot/delta pages
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct HoldingRecord {
    pub vendor_id: i64,
    pub package_id: i64,
    pub title_id: i64,
    pub publication_title: String,
    #[serde(default)]
    pub publisher_name: Option<String>,
    #[serde(default)]
    pub resource_type: Option<String>,
    #[serde(default)]
    pub format: Option<String>,
    #[serde(default)]
    pub embargo: Option<String>,
}

impl HoldingRecord {
    pub fn key(&self) -> HoldingsKey {
        HoldingsKey {
            vendor_id: self.vendor_id,
            package_id: self.package_id,
            title_id: self.title_id,
        }
    }
}
