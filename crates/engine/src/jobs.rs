//! Job Repository: creation with duplicate tolerance and item recording.

use chrono::Utc;
use common::{JobId, OrderRef};
use domain::{ItemStatus, WmsJob};

use crate::error::{EngineError, Result};
use crate::services::Services;

/// Result of an idempotent create.
#[derive(Debug, Clone, PartialEq)]
pub enum CreateOutcome {
    Created(WmsJob),
    /// A job with the same id was already stored; this is that job.
    Existing(WmsJob),
}

impl CreateOutcome {
    pub fn job(&self) -> &WmsJob {
        match self {
            CreateOutcome::Created(job) | CreateOutcome::Existing(job) => job,
        }
    }

    pub fn into_job(self) -> WmsJob {
        match self {
            CreateOutcome::Created(job) | CreateOutcome::Existing(job) => job,
        }
    }

    pub fn was_created(&self) -> bool {
        matches!(self, CreateOutcome::Created(_))
    }
}

pub struct JobRepository {
    services: Services,
}

impl JobRepository {
    pub fn new(services: Services) -> Self {
        Self { services }
    }

    /// Stores a new job. Re-creating an existing id is a no-op that returns
    /// the stored job, so at-least-once delivery never duplicates work.
    #[tracing::instrument(skip(self, job), fields(job_id = %job.id, job_type = %job.job_type))]
    pub async fn create(&self, job: WmsJob) -> Result<CreateOutcome> {
        let job_type = job.job_type;
        match self.services.jobs.create(job.clone()).await {
            Ok(created) => {
                metrics::counter!("wms_jobs_created_total", "type" => job_type.as_str())
                    .increment(1);
                tracing::info!(job_number = %created.job_number, "job created");
                Ok(CreateOutcome::Created(created))
            }
            Err(e) if e.is_duplicate() => {
                metrics::counter!("wms_chain_duplicates_total").increment(1);
                tracing::debug!("job already exists");
                let existing = self
                    .services
                    .jobs
                    .get(job.id)
                    .await?
                    .ok_or(EngineError::JobNotFound(job.id))?;
                Ok(CreateOutcome::Existing(existing))
            }
            Err(e) => {
                metrics::counter!("wms_persistence_failures_total").increment(1);
                tracing::error!(error = %e, "job not created");
                Err(e)
            }
        }
    }

    pub async fn get(&self, id: JobId) -> Result<WmsJob> {
        self.services
            .jobs
            .get(id)
            .await?
            .ok_or(EngineError::JobNotFound(id))
    }

    pub async fn jobs_for_order(&self, order_ref: OrderRef) -> Result<Vec<WmsJob>> {
        self.services.jobs.find_by_order(order_ref).await
    }

    /// Records one line item's outcome on a job that is not yet completed.
    ///
    /// The stored job is only replaced once the update succeeds.
    #[tracing::instrument(skip(self))]
    pub async fn record_item(
        &self,
        job_id: JobId,
        index: usize,
        status: ItemStatus,
        picked_qty: u32,
        allow_over_pick: bool,
    ) -> Result<WmsJob> {
        let mut job = self.get(job_id).await?;
        job.record_item(index, status, picked_qty, allow_over_pick, Utc::now())
            .inspect_err(|e| tracing::warn!(error = %e, "item not recorded"))?;
        self.services.jobs.update(job).await.inspect_err(|e| {
            metrics::counter!("wms_persistence_failures_total").increment(1);
            tracing::error!(error = %e, "item update not persisted");
        })
    }
}
