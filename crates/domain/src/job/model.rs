//! The warehouse job entity.

use chrono::{DateTime, Utc};
use common::{EmployeeId, JobId, OrderRef, ProductId, SiteId};
use serde::{Deserialize, Serialize};

use super::{ItemStatus, JobError, JobStatus, policy};
use crate::orders::TransferStatus;

/// Kind of warehouse work.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum JobType {
    Putaway,
    Pick,
    Pack,
    Dispatch,
    Transfer,
}

impl JobType {
    pub fn as_str(&self) -> &'static str {
        match self {
            JobType::Putaway => "PUTAWAY",
            JobType::Pick => "PICK",
            JobType::Pack => "PACK",
            JobType::Dispatch => "DISPATCH",
            JobType::Transfer => "TRANSFER",
        }
    }

    /// Job number prefix.
    pub fn prefix(&self) -> &'static str {
        match self {
            JobType::Putaway => "PW",
            JobType::Pick => "PK",
            JobType::Pack => "PA",
            JobType::Dispatch => "DS",
            JobType::Transfer => "TR",
        }
    }
}

impl std::fmt::Display for JobType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize, Default)]
pub enum Priority {
    Low,
    #[default]
    Normal,
    High,
    Critical,
}

/// One product line on a job.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct JobItem {
    pub product_id: ProductId,
    pub sku: String,
    /// Fixed at creation.
    pub expected_qty: u32,
    pub picked_qty: u32,
    pub status: ItemStatus,
}

impl JobItem {
    pub fn new(product_id: ProductId, sku: impl Into<String>, expected_qty: u32) -> Self {
        Self {
            product_id,
            sku: sku.into(),
            expected_qty,
            picked_qty: 0,
            status: ItemStatus::Pending,
        }
    }

    /// Copy of this line with progress cleared.
    pub fn reset(&self) -> Self {
        Self {
            picked_qty: 0,
            status: ItemStatus::Pending,
            ..self.clone()
        }
    }

    /// Line for the next step of a chain: only what this step moved goes on.
    pub fn carry_forward(&self) -> Self {
        Self {
            expected_qty: self.moved_qty(),
            ..self.reset()
        }
    }

    /// Quantity that physically moved. A recorded line moves what was picked,
    /// possibly nothing; a line never recorded (completion without
    /// validation) moves the expected quantity.
    pub fn moved_qty(&self) -> u32 {
        match self.status {
            ItemStatus::Pending => self.expected_qty,
            _ => self.picked_qty,
        }
    }
}

/// A unit of warehouse work at one site.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WmsJob {
    pub id: JobId,
    pub job_number: String,
    pub site_id: SiteId,
    pub job_type: JobType,
    pub status: JobStatus,
    pub priority: Priority,
    pub line_items: Vec<JobItem>,
    pub assigned_to: Option<EmployeeId>,
    pub location: Option<String>,
    pub order_ref: Option<OrderRef>,
    pub source_site_id: Option<SiteId>,
    pub dest_site_id: Option<SiteId>,
    pub transfer_status: Option<TransferStatus>,
    /// Set on jobs created by chaining; names the completed predecessor.
    pub chained_from: Option<JobId>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    pub completed_at: Option<DateTime<Utc>>,
    pub completed_by: Option<String>,
}

impl WmsJob {
    pub fn builder(site_id: SiteId, job_type: JobType) -> WmsJobBuilder {
        WmsJobBuilder::new(site_id, job_type)
    }

    /// True when both route ends are set and differ.
    pub fn is_cross_site(&self) -> bool {
        matches!(
            (self.source_site_id, self.dest_site_id),
            (Some(source), Some(dest)) if source != dest
        )
    }

    /// True when every line item ended as Picked (no Short).
    pub fn all_items_picked(&self) -> bool {
        !self.line_items.is_empty()
            && self
                .line_items
                .iter()
                .all(|item| item.status == ItemStatus::Picked)
    }

    pub fn unprocessed_items(&self) -> usize {
        self.line_items
            .iter()
            .filter(|item| !item.status.is_terminal())
            .count()
    }

    pub fn total_picked(&self) -> u32 {
        self.line_items.iter().map(|item| item.picked_qty).sum()
    }

    /// Records the outcome for one line item.
    ///
    /// `picked_qty` above `expected_qty` is refused unless `allow_over_pick`
    /// acknowledges it.
    pub fn record_item(
        &mut self,
        index: usize,
        status: ItemStatus,
        picked_qty: u32,
        allow_over_pick: bool,
        at: DateTime<Utc>,
    ) -> Result<(), JobError> {
        if !self.status.can_record_items() {
            return Err(JobError::InvalidStateTransition {
                current_state: self.status,
                action: "record items",
            });
        }
        if status == ItemStatus::Pending {
            return Err(JobError::InvalidItemStatus(status));
        }
        let len = self.line_items.len();
        let item = self
            .line_items
            .get_mut(index)
            .ok_or(JobError::ItemIndexOutOfRange { index, len })?;
        if picked_qty > item.expected_qty && !allow_over_pick {
            return Err(JobError::OverPick {
                index,
                picked: picked_qty,
                expected: item.expected_qty,
            });
        }

        item.picked_qty = picked_qty;
        item.status = status;
        self.updated_at = at;
        Ok(())
    }

    /// Checks that the job may be completed.
    pub fn ensure_completable(&self, skip_validation: bool) -> Result<(), JobError> {
        if !self.status.can_complete() {
            return Err(JobError::InvalidStateTransition {
                current_state: self.status,
                action: "complete",
            });
        }
        let pending = self.unprocessed_items();
        if !skip_validation && pending > 0 {
            return Err(JobError::UnprocessedItems { pending });
        }
        Ok(())
    }

    pub fn complete(
        &mut self,
        actor: impl Into<String>,
        skip_validation: bool,
        at: DateTime<Utc>,
    ) -> Result<(), JobError> {
        self.ensure_completable(skip_validation)?;
        self.status = JobStatus::Completed;
        self.completed_at = Some(at);
        self.completed_by = Some(actor.into());
        self.updated_at = at;
        Ok(())
    }

    pub fn assign(&mut self, employee_id: EmployeeId, at: DateTime<Utc>) -> Result<(), JobError> {
        if !self.status.can_assign() {
            return Err(JobError::InvalidStateTransition {
                current_state: self.status,
                action: "assign",
            });
        }
        self.assigned_to = Some(employee_id);
        self.status = JobStatus::InProgress;
        self.updated_at = at;
        Ok(())
    }

    /// Reopens the job: back to Pending, unassigned, every line cleared.
    pub fn reset(&mut self, at: DateTime<Utc>) -> Result<(), JobError> {
        if !self.status.can_reset() {
            return Err(JobError::InvalidStateTransition {
                current_state: self.status,
                action: "reset",
            });
        }
        self.status = JobStatus::Pending;
        self.assigned_to = None;
        self.line_items = self.line_items.iter().map(JobItem::reset).collect();
        self.updated_at = at;
        Ok(())
    }

    /// Builds the next job in this job's chain.
    ///
    /// The successor id is derived from this job's id and the successor type,
    /// so building it twice yields the same id.
    pub fn successor(&self, job_type: JobType, at: DateTime<Utc>) -> WmsJob {
        let id = JobId::derived(&format!("chain:{}:{}", self.id, job_type));
        WmsJob {
            id,
            job_number: policy::job_number(job_type, self.order_ref.as_ref(), id),
            site_id: self.site_id,
            job_type,
            status: JobStatus::Pending,
            priority: self.priority,
            line_items: self.line_items.iter().map(JobItem::carry_forward).collect(),
            assigned_to: None,
            location: policy::default_location(job_type).map(str::to_string),
            order_ref: self.order_ref,
            source_site_id: self.source_site_id,
            dest_site_id: self.dest_site_id,
            transfer_status: self.transfer_status,
            chained_from: Some(self.id),
            created_at: at,
            updated_at: at,
            completed_at: None,
            completed_by: None,
        }
    }
}

/// Builder for new jobs.
#[derive(Debug)]
pub struct WmsJobBuilder {
    id: Option<JobId>,
    site_id: SiteId,
    job_type: JobType,
    priority: Priority,
    line_items: Vec<JobItem>,
    location: Option<String>,
    order_ref: Option<OrderRef>,
    source_site_id: Option<SiteId>,
    dest_site_id: Option<SiteId>,
    transfer_status: Option<TransferStatus>,
    created_at: Option<DateTime<Utc>>,
}

impl WmsJobBuilder {
    fn new(site_id: SiteId, job_type: JobType) -> Self {
        Self {
            id: None,
            site_id,
            job_type,
            priority: Priority::default(),
            line_items: Vec::new(),
            location: None,
            order_ref: None,
            source_site_id: None,
            dest_site_id: None,
            transfer_status: None,
            created_at: None,
        }
    }

    /// Sets the id. Callers with an idempotency key should pass `JobId::derived`.
    pub fn id(mut self, id: JobId) -> Self {
        self.id = Some(id);
        self
    }

    pub fn priority(mut self, priority: Priority) -> Self {
        self.priority = priority;
        self
    }

    pub fn item(mut self, item: JobItem) -> Self {
        self.line_items.push(item);
        self
    }

    pub fn items(mut self, items: impl IntoIterator<Item = JobItem>) -> Self {
        self.line_items.extend(items);
        self
    }

    pub fn location(mut self, location: impl Into<String>) -> Self {
        self.location = Some(location.into());
        self
    }

    pub fn order_ref(mut self, order_ref: OrderRef) -> Self {
        self.order_ref = Some(order_ref);
        self
    }

    pub fn route(mut self, source: SiteId, dest: SiteId) -> Self {
        self.source_site_id = Some(source);
        self.dest_site_id = Some(dest);
        self
    }

    pub fn transfer_status(mut self, status: TransferStatus) -> Self {
        self.transfer_status = Some(status);
        self
    }

    pub fn created_at(mut self, at: DateTime<Utc>) -> Self {
        self.created_at = Some(at);
        self
    }

    /// Builds the job. Fails on an empty line list or a zero quantity line.
    pub fn build(self) -> Result<WmsJob, JobError> {
        if self.line_items.is_empty() {
            return Err(JobError::EmptyLineItems);
        }
        if let Some(item) = self.line_items.iter().find(|item| item.expected_qty == 0) {
            return Err(JobError::ZeroQuantity {
                sku: item.sku.clone(),
            });
        }

        let id = self.id.unwrap_or_default();
        let at = self.created_at.unwrap_or_else(Utc::now);
        let location = self
            .location
            .or_else(|| policy::default_location(self.job_type).map(str::to_string));

        Ok(WmsJob {
            id,
            job_number: policy::job_number(self.job_type, self.order_ref.as_ref(), id),
            site_id: self.site_id,
            job_type: self.job_type,
            status: JobStatus::Pending,
            priority: self.priority,
            line_items: self.line_items.into_iter().map(|item| item.reset()).collect(),
            assigned_to: None,
            location,
            order_ref: self.order_ref,
            source_site_id: self.source_site_id,
            dest_site_id: self.dest_site_id,
            transfer_status: self.transfer_status,
            chained_from: None,
            created_at: at,
            updated_at: at,
            completed_at: None,
            completed_by: None,
        })
    }
}
