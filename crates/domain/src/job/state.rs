//! Job and line-item state machines.

use serde::{Deserialize, Serialize};

/// The state of a warehouse job.
///
/// State transitions:
/// ```text
/// Pending ──assign──► In-Progress ──complete──► Completed
///    ▲                    │
///    └───────reset────────┘
/// ```
/// A Pending job may also be completed directly (unassigned work), and
/// Completed is terminal: reset is refused once a job completes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
pub enum JobStatus {
    #[default]
    Pending,

    #[serde(rename = "In-Progress")]
    InProgress,

    /// Terminal; only a reset before completion can reopen work.
    Completed,
}

impl JobStatus {
    /// Returns true if a worker can be assigned in this state.
    pub fn can_assign(&self) -> bool {
        matches!(self, JobStatus::Pending)
    }

    /// Returns true if line items may still be recorded.
    pub fn can_record_items(&self) -> bool {
        !self.is_terminal()
    }

    pub fn can_complete(&self) -> bool {
        !self.is_terminal()
    }

    pub fn can_reset(&self) -> bool {
        !self.is_terminal()
    }

    pub fn is_terminal(&self) -> bool {
        matches!(self, JobStatus::Completed)
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            JobStatus::Pending => "Pending",
            JobStatus::InProgress => "In-Progress",
            JobStatus::Completed => "Completed",
        }
    }
}

impl std::fmt::Display for JobStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Per-item progress within a job.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
pub enum ItemStatus {
    #[default]
    Pending,
    Picked,
    Short,
    Skipped,
}

impl ItemStatus {
    /// Picked and Short both count as processed for completion and chaining.
    pub fn is_terminal(&self) -> bool {
        matches!(self, ItemStatus::Picked | ItemStatus::Short)
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            ItemStatus::Pending => "Pending",
            ItemStatus::Picked => "Picked",
            ItemStatus::Short => "Short",
            ItemStatus::Skipped => "Skipped",
        }
    }
}

impl std::fmt::Display for ItemStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}
