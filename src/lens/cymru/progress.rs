//! Progress events for batch lookups
//!
//! The lens reports through an injected callback and never renders anything
//! itself. The CLI turns these events into a progress bar; library users can
//! log them, forward them, or pass no callback at all.
//!
//! ```rust,ignore
//! use cymru_enrich::lens::cymru::{CymruLens, LookupProgress};
//! use std::sync::Arc;
//!
//! let lens = CymruLens::from_config(&config)?.with_progress(Arc::new(|p: LookupProgress| {
//!     if let LookupProgress::Completed { summary } = p {
//!         println!("{} of {} resolved", summary.resolved, summary.total);
//!     }
//! }));
//! ```

use super::assembler::BatchSummary;
use super::types::RecordStatus;
use serde::{Deserialize, Serialize};
use std::sync::Arc;

/// Progress information for batch lookups
#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum LookupProgress {
    /// A batch has started
    Started {
        /// Number of input addresses
        total: usize,
    },
    /// One address has been fully processed (emitted in completion order)
    AddressCompleted {
        /// Input position of the address
        index: usize,
        address: String,
        status: RecordStatus,
    },
    /// The batch has finished, been cancelled, or halted
    Completed { summary: BatchSummary },
}

/// Callback receiving [`LookupProgress`] updates, possibly from several
/// worker threads at once.
pub type LookupProgressCallback = Arc<dyn Fn(LookupProgress) + Send + Sync>;
