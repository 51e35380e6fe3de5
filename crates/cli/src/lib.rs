#![deny(missing_docs)]
//! Orchestration around the devmdx pipeline: walking a source tree,
//! converting in parallel, fanning out to destination roots and keeping
//! the quarantine list.

/// Parallel batch conversion.
pub mod batch;
/// Persisted exclude list.
pub mod quarantine;

pub use batch::{
    BatchError, BatchOptions, BatchReport, BatchStats, FileOutcome, FileReport, destination_path,
    discover_sources, run_batch,
};
pub use quarantine::QuarantineList;
