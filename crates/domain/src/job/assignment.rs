//! Worker-to-job assignments.

use chrono::{DateTime, Utc};
use common::{AssignmentId, EmployeeId, JobId};
use serde::{Deserialize, Serialize};

use super::JobError;

/// Lifecycle of an assignment.
///
/// ```text
/// Assigned ──► Accepted ──► In-Progress ◄──► Paused
///     │            │             │              │
///     └────────────┴─────┬───────┴──────────────┘
///                        ▼
///               Completed | Cancelled
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
pub enum AssignmentStatus {
    #[default]
    Assigned,
    Accepted,
    #[serde(rename = "In-Progress")]
    InProgress,
    Paused,
    Completed,
    Cancelled,
}

impl AssignmentStatus {
    /// Statuses counted against the per-worker concurrency limit.
    pub fn is_active(&self) -> bool {
        matches!(
            self,
            AssignmentStatus::Assigned | AssignmentStatus::Accepted | AssignmentStatus::InProgress
        )
    }

    pub fn is_terminal(&self) -> bool {
        matches!(self, AssignmentStatus::Completed | AssignmentStatus::Cancelled)
    }

    pub fn can_transition_to(&self, next: AssignmentStatus) -> bool {
        use AssignmentStatus::*;
        match (*self, next) {
            (from, _) if from.is_terminal() => false,
            (_, Completed | Cancelled) => true,
            (Assigned, Accepted | InProgress) => true,
            (Accepted, InProgress) => true,
            (InProgress, Paused) => true,
            (Paused, InProgress) => true,
            _ => false,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            AssignmentStatus::Assigned => "Assigned",
            AssignmentStatus::Accepted => "Accepted",
            AssignmentStatus::InProgress => "In-Progress",
            AssignmentStatus::Paused => "Paused",
            AssignmentStatus::Completed => "Completed",
            AssignmentStatus::Cancelled => "Cancelled",
        }
    }
}

impl std::fmt::Display for AssignmentStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct JobAssignment {
    pub id: AssignmentId,
    pub job_id: JobId,
    pub employee_id: EmployeeId,
    pub status: AssignmentStatus,
    pub estimated_duration_minutes: u32,
    pub assigned_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl JobAssignment {
    pub fn new(
        job_id: JobId,
        employee_id: EmployeeId,
        estimated_duration_minutes: u32,
        at: DateTime<Utc>,
    ) -> Self {
        Self {
            id: AssignmentId::new(),
            job_id,
            employee_id,
            status: AssignmentStatus::Assigned,
            estimated_duration_minutes,
            assigned_at: at,
            updated_at: at,
        }
    }

    pub fn transition(&mut self, next: AssignmentStatus, at: DateTime<Utc>) -> Result<(), JobError> {
        if !self.status.can_transition_to(next) {
            return Err(JobError::InvalidAssignmentTransition {
                from: self.status,
                to: next,
            });
        }
        self.status = next;
        self.updated_at = at;
        Ok(())
    }
}
