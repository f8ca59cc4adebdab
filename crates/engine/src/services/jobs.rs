//! Job and assignment persistence.

use std::collections::HashMap;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use async_trait::async_trait;
use common::{AssignmentId, EmployeeId, JobId, OrderRef};
use domain::{JobAssignment, WmsJob};
use tokio::sync::RwLock;

use crate::error::{EngineError, Result};

/// Stored warehouse jobs, by id.
#[async_trait]
pub trait JobStore: Send + Sync {
    /// Inserts a new job. Fails with `Duplicate` when the id is taken.
    async fn create(&self, job: WmsJob) -> Result<WmsJob>;

    async fn get(&self, id: JobId) -> Result<Option<WmsJob>>;

    /// Replaces a stored job. Fails with `JobNotFound` when absent.
    async fn update(&self, job: WmsJob) -> Result<WmsJob>;

    async fn delete(&self, id: JobId) -> Result<()>;

    /// Jobs linked to an order, oldest first.
    async fn find_by_order(&self, order_ref: OrderRef) -> Result<Vec<WmsJob>>;

    async fn list(&self) -> Result<Vec<WmsJob>>;
}

/// Stored worker assignments, by id.
#[async_trait]
pub trait AssignmentStore: Send + Sync {
    async fn create(&self, assignment: JobAssignment) -> Result<JobAssignment>;

    async fn get(&self, id: AssignmentId) -> Result<Option<JobAssignment>>;

    async fn update(&self, assignment: JobAssignment) -> Result<JobAssignment>;

    async fn delete(&self, id: AssignmentId) -> Result<()>;

    async fn for_employee(&self, employee_id: EmployeeId) -> Result<Vec<JobAssignment>>;

    async fn for_job(&self, job_id: JobId) -> Result<Vec<JobAssignment>>;
}

fn write_rejected(what: &str) -> EngineError {
    EngineError::Persistence(format!("{what} write rejected by backing store"))
}

/// In-memory job store.
///
/// Clones share state. `set_fail_on_write` makes create, update and delete
/// fail, for exercising rollback paths.
#[derive(Clone, Default)]
pub struct InMemoryJobStore {
    jobs: Arc<RwLock<HashMap<JobId, WmsJob>>>,
    fail_on_write: Arc<AtomicBool>,
}

impl InMemoryJobStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set_fail_on_write(&self, fail: bool) {
        self.fail_on_write.store(fail, Ordering::SeqCst);
    }

    pub async fn len(&self) -> usize {
        self.jobs.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.jobs.read().await.is_empty()
    }

    fn check_writable(&self) -> Result<()> {
        if self.fail_on_write.load(Ordering::SeqCst) {
            return Err(write_rejected("job"));
        }
        Ok(())
    }
}

#[async_trait]
impl JobStore for InMemoryJobStore {
    async fn create(&self, job: WmsJob) -> Result<WmsJob> {
        self.check_writable()?;
        let mut jobs = self.jobs.write().await;
        if jobs.contains_key(&job.id) {
            return Err(EngineError::Duplicate(format!("job {}", job.id)));
        }
        jobs.insert(job.id, job.clone());
        Ok(job)
    }

    async fn get(&self, id: JobId) -> Result<Option<WmsJob>> {
        Ok(self.jobs.read().await.get(&id).cloned())
    }

    async fn update(&self, job: WmsJob) -> Result<WmsJob> {
        self.check_writable()?;
        let mut jobs = self.jobs.write().await;
        let Some(stored) = jobs.get_mut(&job.id) else {
            return Err(EngineError::JobNotFound(job.id));
        };
        *stored = job.clone();
        Ok(job)
    }

    async fn delete(&self, id: JobId) -> Result<()> {
        self.check_writable()?;
        self.jobs.write().await.remove(&id);
        Ok(())
    }

    async fn find_by_order(&self, order_ref: OrderRef) -> Result<Vec<WmsJob>> {
        let jobs = self.jobs.read().await;
        let mut found: Vec<_> = jobs
            .values()
            .filter(|job| job.order_ref == Some(order_ref))
            .cloned()
            .collect();
        found.sort_by_key(|job| job.created_at);
        Ok(found)
    }

    async fn list(&self) -> Result<Vec<WmsJob>> {
        let mut all: Vec<_> = self.jobs.read().await.values().cloned().collect();
        all.sort_by_key(|job| job.created_at);
        Ok(all)
    }
}

/// In-memory assignment store. Same sharing and fault injection as
/// [`InMemoryJobStore`].
#[derive(Clone, Default)]
pub struct InMemoryAssignmentStore {
    assignments: Arc<RwLock<HashMap<AssignmentId, JobAssignment>>>,
    fail_on_write: Arc<AtomicBool>,
}

impl InMemoryAssignmentStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set_fail_on_write(&self, fail: bool) {
        self.fail_on_write.store(fail, Ordering::SeqCst);
    }

    pub async fn len(&self) -> usize {
        self.assignments.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.assignments.read().await.is_empty()
    }

    fn check_writable(&self) -> Result<()> {
        if self.fail_on_write.load(Ordering::SeqCst) {
            return Err(write_rejected("assignment"));
        }
        Ok(())
    }

    async fn matching(&self, keep: impl Fn(&JobAssignment) -> bool) -> Vec<JobAssignment> {
        let mut found: Vec<_> = self
            .assignments
            .read()
            .await
            .values()
            .filter(|a| keep(a))
            .cloned()
            .collect();
        found.sort_by_key(|a| a.assigned_at);
        found
    }
}

#[async_trait]
impl AssignmentStore for InMemoryAssignmentStore {
    async fn create(&self, assignment: JobAssignment) -> Result<JobAssignment> {
        self.check_writable()?;
        let mut assignments = self.assignments.write().await;
        if assignments.contains_key(&assignment.id) {
            return Err(EngineError::Duplicate(format!("assignment {}", assignment.id)));
        }
        assignments.insert(assignment.id, assignment.clone());
        Ok(assignment)
    }

    async fn get(&self, id: AssignmentId) -> Result<Option<JobAssignment>> {
        Ok(self.assignments.read().await.get(&id).cloned())
    }

    async fn update(&self, assignment: JobAssignment) -> Result<JobAssignment> {
        self.check_writable()?;
        let mut assignments = self.assignments.write().await;
        let Some(stored) = assignments.get_mut(&assignment.id) else {
            return Err(EngineError::AssignmentNotFound(assignment.id));
        };
        *stored = assignment.clone();
        Ok(assignment)
    }

    async fn delete(&self, id: AssignmentId) -> Result<()> {
        self.assignments.write().await.remove(&id);
        Ok(())
    }

    async fn for_employee(&self, employee_id: EmployeeId) -> Result<Vec<JobAssignment>> {
        Ok(self.matching(|a| a.employee_id == employee_id).await)
    }

    async fn for_job(&self, job_id: JobId) -> Result<Vec<JobAssignment>> {
        Ok(self.matching(|a| a.job_id == job_id).await)
    }
}
