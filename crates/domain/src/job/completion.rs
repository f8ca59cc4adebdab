use chrono::{DateTime, Utc};
use common::{JobId, OrderRef, SiteId};
use serde::{Deserialize, Serialize};

use super::JobType;

/// Completion log record. One per job, written once its chain step is done.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct JobCompletion {
    pub job_id: JobId,
    pub job_number: String,
    pub job_type: JobType,
    pub site_id: SiteId,
    pub order_ref: Option<OrderRef>,
    pub successor: Option<JobId>,
    pub completed_by: Option<String>,
    pub at: DateTime<Utc>,
}

impl JobCompletion {
    pub const ENTRY_TYPE: &'static str = "JobCompleted";

    /// Key marking that `job_id` has been chained.
    pub fn idempotency_key(job_id: JobId) -> String {
        format!("chain:{job_id}")
    }
}
