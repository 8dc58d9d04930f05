//! Domain module - Core entities and lifecycle types
//!
//! This module contains the domain entities of the synchronization pipeline:
//! holding records, the load status lifecycle, upstream transaction handles,
//! pipeline events and the error taxonomy.

pub mod errors;
pub mod events;
pub mod holding;
pub mod load_status;
pub mod transaction;

// Re-export commonly used items
pub use errors::PipelineError;
pub use events::{DeltaEntry, DeltaOp, LoadEvent, LoadPlan, SnapshotMessage, SnapshotOutcome};
pub use holding::{HoldingRecord, HoldingsKey};
pub use load_status::{LoadStatus, LoadStatusDetail, LoadStatusName};
pub use transaction::HoldingsTransaction;
