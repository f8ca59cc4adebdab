//! Warehouse jobs, their line items and worker assignments.

pub mod assignment;
pub mod completion;
pub mod model;
pub mod policy;
pub mod state;

pub use assignment::{AssignmentStatus, JobAssignment};
pub use completion::JobCompletion;
pub use model::{JobItem, JobType, Priority, WmsJob, WmsJobBuilder};
pub use state::{ItemStatus, JobStatus};

use thiserror::Error;

/// Errors raised by job and assignment invariants.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum JobError {
    /// Job is not in a state that allows the action.
    #[error("Invalid state transition: cannot {action} from {current_state} state")]
    InvalidStateTransition {
        current_state: JobStatus,
        action: &'static str,
    },

    #[error("Job must have at least one line item")]
    EmptyLineItems,

    #[error("Line item {sku} has zero expected quantity")]
    ZeroQuantity { sku: String },

    #[error("Line item index {index} out of range (job has {len} items)")]
    ItemIndexOutOfRange { index: usize, len: usize },

    #[error("Cannot record a line item as {0}")]
    InvalidItemStatus(ItemStatus),

    /// Picked quantity exceeds expected without an override.
    #[error("Line item {index}: picked {picked} exceeds expected {expected}")]
    OverPick {
        index: usize,
        picked: u32,
        expected: u32,
    },

    #[error("{pending} line item(s) not yet picked or marked short")]
    UnprocessedItems { pending: usize },

    #[error("Invalid assignment transition from {from} to {to}")]
    InvalidAssignmentTransition {
        from: AssignmentStatus,
        to: AssignmentStatus,
    },
}
