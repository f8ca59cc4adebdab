//! Assignment Scheduler: binds workers to jobs under a per-worker
//! concurrency limit.

use std::sync::Arc;

use chrono::Utc;
use common::{AssignmentId, EmployeeId, JobId};
use domain::job::policy::estimate_duration_minutes;
use domain::{AssignmentStatus, EngineConfig, JobAssignment, WmsJob};

use crate::error::{EngineError, Result};
use crate::jobs::JobRepository;
use crate::locks::KeyedLocks;
use crate::services::Services;

pub struct AssignmentScheduler {
    services: Services,
    config: Arc<EngineConfig>,
    jobs: JobRepository,
    job_locks: KeyedLocks<JobId>,
    worker_locks: KeyedLocks<EmployeeId>,
}

impl AssignmentScheduler {
    pub fn new(services: Services, config: Arc<EngineConfig>) -> Self {
        Self {
            jobs: JobRepository::new(services.clone()),
            services,
            config,
            job_locks: KeyedLocks::new(),
            worker_locks: KeyedLocks::new(),
        }
    }

    /// Assigns a pending job to a worker.
    ///
    /// Rejected without any write when the job is not Pending or the worker
    /// already holds `max_active_assignments` active assignments. Concurrent
    /// calls for the same job or the same worker run one at a time.
    #[tracing::instrument(skip(self))]
    pub async fn assign(&self, job_id: JobId, employee_id: EmployeeId) -> Result<JobAssignment> {
        // Job before worker, always.
        let _job_guard = self.job_locks.lock(job_id).await;
        let _worker_guard = self.worker_locks.lock(employee_id).await;

        let job = self.jobs.get(job_id).await?;
        self.services
            .employees
            .get(employee_id)
            .await?
            .ok_or(EngineError::EmployeeNotFound(employee_id))?;

        if !job.status.can_assign() {
            return Err(Self::reject(
                "job_status",
                EngineError::precondition(format!(
                    "job {} is {} and cannot be assigned",
                    job.job_number, job.status
                )),
            ));
        }

        let active = self.active_assignments(employee_id).await?.len();
        let limit = self.config.max_active_assignments;
        if active >= limit {
            return Err(Self::reject(
                "limit",
                EngineError::AssignmentLimit {
                    employee_id,
                    active,
                    limit,
                },
            ));
        }

        let now = Utc::now();
        let mut assigned = job.clone();
        assigned.assign(employee_id, now)?;

        let estimate = estimate_duration_minutes(job.job_type, job.line_items.len());
        let assignment = self
            .services
            .assignments
            .create(JobAssignment::new(job_id, employee_id, estimate, now))
            .await?;

        if let Err(e) = self.services.jobs.update(assigned).await {
            metrics::counter!("wms_persistence_failures_total").increment(1);
            tracing::error!(error = %e, "job not updated, withdrawing assignment");
            if let Err(cleanup) = self.services.assignments.delete(assignment.id).await {
                tracing::error!(error = %cleanup, assignment_id = %assignment.id, "assignment left behind");
            }
            return Err(e);
        }

        metrics::counter!("wms_assignments_total").increment(1);
        tracing::info!(job_number = %job.job_number, estimate, "job assigned");
        Ok(assignment)
    }

    fn reject(reason: &'static str, error: EngineError) -> EngineError {
        metrics::counter!("wms_assignment_rejections_total", "reason" => reason).increment(1);
        tracing::warn!(error = %error, "assignment rejected");
        error
    }

    /// Moves an assignment through its lifecycle.
    #[tracing::instrument(skip(self))]
    pub async fn set_assignment_status(
        &self,
        assignment_id: AssignmentId,
        status: AssignmentStatus,
    ) -> Result<JobAssignment> {
        let mut assignment = self
            .services
            .assignments
            .get(assignment_id)
            .await?
            .ok_or(EngineError::AssignmentNotFound(assignment_id))?;
        assignment.transition(status, Utc::now())?;
        self.services.assignments.update(assignment).await
    }

    /// Reopens a job: Pending, unassigned, lines cleared. Its open
    /// assignments are cancelled.
    #[tracing::instrument(skip(self))]
    pub async fn reset(&self, job_id: JobId) -> Result<WmsJob> {
        let _job_guard = self.job_locks.lock(job_id).await;
        let mut job = self.jobs.get(job_id).await?;
        job.reset(Utc::now())?;
        let job = self.services.jobs.update(job).await?;

        let now = Utc::now();
        for mut assignment in self
            .services
            .assignments
            .for_job(job_id)
            .await?
            .into_iter()
            .filter(|a| !a.status.is_terminal())
        {
            assignment.transition(AssignmentStatus::Cancelled, now)?;
            if let Err(e) = self.services.assignments.update(assignment).await {
                tracing::warn!(error = %e, "assignment not cancelled after reset");
            }
        }

        tracing::info!(job_number = %job.job_number, "job reset");
        Ok(job)
    }

    /// Assignments counted against the worker's limit.
    pub async fn active_assignments(&self, employee_id: EmployeeId) -> Result<Vec<JobAssignment>> {
        Ok(self
            .services
            .assignments
            .for_employee(employee_id)
            .await?
            .into_iter()
            .filter(|a| a.status.is_active())
            .collect())
    }
}
