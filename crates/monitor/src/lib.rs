//! Monitoring Loop
//!
//! Periodic Idle → Checking → Dispatching passes over all known regions,
//! with per-region failure isolation and a clean stop signal.

mod runner;
mod source;

pub use runner::{LoopState, MonitorConfig, MonitorLoop, PassSummary};
pub use source::{DataSource, SimulatedSource, SourceError};

use storage::StorageError;
use thiserror::Error;

/// Pass-fatal errors. Per-region problems are counted in the pass
/// summary instead of surfacing here.
#[derive(Debug, Error)]
pub enum MonitorError {
    /// The region roster itself could not be read
    #[error("Data source error: {0}")]
    Source(#[from] SourceError),

    /// The store failed on the dedup read path, which the issuance
    /// invariant depends on
    #[error("Store error: {0}")]
    Store(#[from] StorageError),

    /// A region worker panicked
    #[error("Worker task failed: {0}")]
    Join(String),
}
