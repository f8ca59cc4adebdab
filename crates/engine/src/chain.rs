//! Job Chaining State Machine.
//!
//! Completing a job fires its transition exactly once:
//!
//! ```text
//! PUTAWAY  ──► credit stock, relocate product
//! PICK     ──► PACK      (sale: Packing, transfer: Picked + debit source)
//! PACK     ──► DISPATCH  when cross-site (sale: Shipped, transfer: Packed)
//!          ──► (none)    when local      (sale: Delivered, transfer: Packed)
//! DISPATCH ──► credit destination stock (sale/transfer: Delivered)
//! ```
//!
//! The completed job is persisted before anything else happens. A
//! `JobCompleted` record keyed by the job id is appended last; its presence
//! is what makes re-delivery a no-op. A job found Completed without that
//! record had its previous run interrupted, and the chain resumes. Every
//! step on the way is idempotent: successor ids are derived from the
//! predecessor, and stock movements and point awards carry ledger keys.

use std::sync::Arc;
use std::time::Instant;

use chrono::Utc;
use common::{JobId, OrderRef, SaleId, TransferId};
use domain::job::policy::RECEIVING_DOCK;
use domain::{
    AssignmentStatus, FulfillmentStatus, ItemStatus, JobCompletion, JobStatus,
    JobType, StockDirection, TransferStatus, WmsJob,
};
use ledger::{LedgerEntry, LedgerStoreExt, StreamKey};

use crate::error::{EngineError, Result};
use crate::inventory::{Adjustment, InventoryLedger};
use crate::jobs::{CreateOutcome, JobRepository};
use crate::points::{PointsEngine, WorkerAward};
use crate::services::{NotificationKind, Services};
use crate::streams;

/// What one completion did.
#[derive(Debug, Clone, PartialEq)]
pub struct CompletionReport {
    pub job: WmsJob,
    pub successor: Option<WmsJob>,
    pub award: Option<WorkerAward>,
    /// True when this call finished a previously interrupted chain step.
    pub resumed: bool,
    /// Side effects that were skipped without failing the completion.
    pub warnings: Vec<String>,
}

#[derive(Debug, Clone, PartialEq)]
pub enum ChainOutcome {
    Completed(CompletionReport),
    /// The job was already completed and chained; nothing was done.
    AlreadyChained {
        job_id: JobId,
        successor: Option<JobId>,
    },
}

impl ChainOutcome {
    pub fn successor_id(&self) -> Option<JobId> {
        match self {
            ChainOutcome::Completed(report) => report.successor.as_ref().map(|job| job.id),
            ChainOutcome::AlreadyChained { successor, .. } => *successor,
        }
    }

    pub fn report(&self) -> Option<&CompletionReport> {
        match self {
            ChainOutcome::Completed(report) => Some(report),
            ChainOutcome::AlreadyChained { .. } => None,
        }
    }
}

pub struct ChainEngine {
    services: Services,
    jobs: JobRepository,
    inventory: Arc<InventoryLedger>,
    points: Arc<PointsEngine>,
}

impl ChainEngine {
    pub fn new(
        services: Services,
        inventory: Arc<InventoryLedger>,
        points: Arc<PointsEngine>,
    ) -> Self {
        Self {
            jobs: JobRepository::new(services.clone()),
            services,
            inventory,
            points,
        }
    }

    /// Completes a job and fires its chain transition.
    ///
    /// Every line item must be Picked or Short unless `skip_validation` is
    /// set. Point awards and assignment bookkeeping never fail the call; their
    /// problems are returned as warnings.
    #[tracing::instrument(skip(self))]
    pub async fn complete_job(
        &self,
        job_id: JobId,
        actor: &str,
        skip_validation: bool,
    ) -> Result<ChainOutcome> {
        let started = Instant::now();
        let stored = self.jobs.get(job_id).await?;

        let (job, resumed) = if stored.status == JobStatus::Completed {
            if let Some(entry) = self
                .services
                .ledger
                .find_by_key(&JobCompletion::idempotency_key(job_id))
                .await?
            {
                let step: JobCompletion = entry.decode()?;
                metrics::counter!("wms_chain_duplicates_total").increment(1);
                tracing::info!("job already chained, re-delivery ignored");
                return Ok(ChainOutcome::AlreadyChained {
                    job_id,
                    successor: step.successor,
                });
            }
            tracing::warn!("job completed without a chain record, resuming");
            (stored, true)
        } else {
            let mut completed = stored;
            completed
                .complete(actor, skip_validation, Utc::now())
                .inspect_err(|e| tracing::warn!(error = %e, "completion rejected"))?;
            let completed = self.services.jobs.update(completed).await.inspect_err(|e| {
                metrics::counter!("wms_persistence_failures_total").increment(1);
                tracing::error!(error = %e, "completion not persisted");
            })?;
            (completed, false)
        };

        let mut warnings = Vec::new();
        let successor = self
            .apply_transition(&job, &mut warnings)
            .await
            .inspect_err(|e| {
                tracing::error!(error = %e, "chain transition interrupted; re-delivery will resume it");
            })?;

        let award = match self.points.award_job(&job).await {
            Ok(award) => award,
            Err(e) => {
                tracing::warn!(error = %e, "points not awarded");
                warnings.push(format!("points not awarded: {e}"));
                None
            }
        };

        self.close_assignments(&job, &mut warnings).await;
        self.record_completion(&job, successor.as_ref()).await?;

        for warning in &warnings {
            self.services
                .notifier
                .notify(
                    NotificationKind::ChainWarning,
                    format!("{}: {warning}", job.job_number),
                )
                .await;
        }

        metrics::counter!("wms_jobs_completed_total", "type" => job.job_type.as_str())
            .increment(1);
        metrics::histogram!("wms_chain_step_duration_seconds")
            .record(started.elapsed().as_secs_f64());
        tracing::info!(
            job_number = %job.job_number,
            successor = ?successor.as_ref().map(|s| s.job_type),
            resumed,
            "job completed"
        );

        Ok(ChainOutcome::Completed(CompletionReport {
            job,
            successor,
            award,
            resumed,
            warnings,
        }))
    }

    async fn apply_transition(
        &self,
        job: &WmsJob,
        warnings: &mut Vec<String>,
    ) -> Result<Option<WmsJob>> {
        match job.job_type {
            JobType::Putaway => {
                self.put_away(job, warnings).await?;
                Ok(None)
            }
            JobType::Pick => {
                if job.order_ref.is_none() {
                    return Ok(None);
                }
                let transfer_status = self
                    .advance_order(
                        job,
                        FulfillmentStatus::Packing,
                        TransferStatus::Picked,
                        warnings,
                    )
                    .await?;
                if transfer_status.is_some() {
                    self.debit_source(job, warnings).await?;
                }
                let pack = self
                    .create_successor(job, JobType::Pack, transfer_status)
                    .await?;
                Ok(Some(pack))
            }
            JobType::Pack if job.is_cross_site() => {
                let transfer_status = self
                    .advance_order(
                        job,
                        FulfillmentStatus::Shipped,
                        TransferStatus::Packed,
                        warnings,
                    )
                    .await?;
                let dispatch = self
                    .create_successor(job, JobType::Dispatch, transfer_status)
                    .await?;
                Ok(Some(dispatch))
            }
            JobType::Pack => {
                self.advance_order(
                    job,
                    FulfillmentStatus::Delivered,
                    TransferStatus::Packed,
                    warnings,
                )
                .await?;
                Ok(None)
            }
            JobType::Dispatch => {
                self.advance_order(
                    job,
                    FulfillmentStatus::Delivered,
                    TransferStatus::Delivered,
                    warnings,
                )
                .await?;
                self.credit_destination(job, warnings).await?;
                Ok(None)
            }
            JobType::Transfer => Ok(None),
        }
    }

    async fn create_successor(
        &self,
        job: &WmsJob,
        job_type: JobType,
        transfer_status: Option<TransferStatus>,
    ) -> Result<WmsJob> {
        let mut next = job.successor(job_type, Utc::now());
        if transfer_status.is_some() {
            next.transfer_status = transfer_status;
        }
        self.jobs.create(next).await.map(CreateOutcome::into_job)
    }

    /// Moves the linked sale or transfer forward. Returns the transfer
    /// status when the job belongs to a transfer.
    async fn advance_order(
        &self,
        job: &WmsJob,
        sale_status: FulfillmentStatus,
        transfer_status: TransferStatus,
        warnings: &mut Vec<String>,
    ) -> Result<Option<TransferStatus>> {
        match job.order_ref {
            Some(OrderRef::Sale(sale_id)) => {
                self.set_sale_status(sale_id, sale_status, warnings).await?;
                Ok(None)
            }
            Some(OrderRef::Transfer(transfer_id)) => {
                self.set_transfer_status(transfer_id, transfer_status, warnings)
                    .await?;
                Ok(Some(transfer_status))
            }
            Some(OrderRef::PurchaseOrder(_)) | None => Ok(None),
        }
    }

    async fn set_sale_status(
        &self,
        sale_id: SaleId,
        status: FulfillmentStatus,
        warnings: &mut Vec<String>,
    ) -> Result<()> {
        let Some(mut sale) = self.services.orders.get_sale(sale_id).await? else {
            warnings.push(format!("sale {sale_id} not found; status not set to {status}"));
            return Ok(());
        };
        if sale.fulfillment_status != status {
            sale.fulfillment_status = status;
            self.services.orders.update_sale(sale).await?;
            tracing::info!(%sale_id, %status, "sale status advanced");
        }
        Ok(())
    }

    async fn set_transfer_status(
        &self,
        transfer_id: TransferId,
        status: TransferStatus,
        warnings: &mut Vec<String>,
    ) -> Result<()> {
        let Some(mut transfer) = self.services.orders.get_transfer(transfer_id).await? else {
            warnings.push(format!(
                "transfer {transfer_id} not found; status not set to {status}"
            ));
            return Ok(());
        };
        if transfer.status != status {
            transfer.status = status;
            self.services.orders.update_transfer(transfer).await?;
            tracing::info!(%transfer_id, %status, "transfer status advanced");
        }
        Ok(())
    }

    /// Runs one keyed adjustment; a missing product becomes a warning.
    async fn adjust_or_warn(
        &self,
        adjustment: Adjustment,
        warnings: &mut Vec<String>,
    ) -> Result<()> {
        match self.inventory.adjust(adjustment).await {
            Ok(_) => Ok(()),
            Err(EngineError::ProductNotFound(product_id)) => {
                warnings.push(format!("product {product_id} not found; stock not moved"));
                Ok(())
            }
            Err(e) => Err(e),
        }
    }

    fn actor(job: &WmsJob) -> String {
        job.completed_by.clone().unwrap_or_else(|| "system".to_string())
    }

    async fn put_away(&self, job: &WmsJob, warnings: &mut Vec<String>) -> Result<()> {
        let shelved = job
            .line_items
            .iter()
            .enumerate()
            .filter(|(_, item)| matches!(item.status, ItemStatus::Picked | ItemStatus::Short))
            .filter(|(_, item)| item.moved_qty() > 0);

        for (index, item) in shelved {
            let adjustment = Adjustment::new(
                item.product_id,
                item.moved_qty(),
                StockDirection::In,
                "Putaway",
            )
            .by(Self::actor(job))
            .keyed(format!("putaway-in:{}:{index}", job.id));
            self.adjust_or_warn(adjustment, warnings).await?;

            let Some(location) = job.location.as_deref().filter(|l| *l != RECEIVING_DOCK) else {
                continue;
            };
            let Some(mut product) = self.services.products.get(item.product_id).await? else {
                continue;
            };
            if product.location.as_deref() != Some(location) {
                product.location = Some(location.to_string());
                product.updated_at = Utc::now();
                self.services.products.update(product).await?;
                tracing::info!(sku = %item.sku, %location, "product relocated");
            }
        }
        Ok(())
    }

    async fn debit_source(&self, job: &WmsJob, warnings: &mut Vec<String>) -> Result<()> {
        for (index, item) in job.line_items.iter().enumerate() {
            if item.status == ItemStatus::Skipped || item.moved_qty() == 0 {
                continue;
            }
            let adjustment = Adjustment::new(
                item.product_id,
                item.moved_qty(),
                StockDirection::Out,
                "Transfer",
            )
            .by(Self::actor(job))
            .keyed(format!("transfer-out:{}:{index}", job.id));
            self.adjust_or_warn(adjustment, warnings).await?;
        }
        Ok(())
    }

    /// Credits each dispatched line at the destination site, creating the
    /// product there from the source record when the SKU is new to the site.
    async fn credit_destination(&self, job: &WmsJob, warnings: &mut Vec<String>) -> Result<()> {
        let Some(dest_site) = job.dest_site_id else {
            warnings.push("dispatch has no destination site; stock not credited".to_string());
            return Ok(());
        };

        for (index, item) in job.line_items.iter().enumerate() {
            if item.status == ItemStatus::Skipped || item.moved_qty() == 0 {
                continue;
            }
            let Some(source) = self.services.products.get(item.product_id).await? else {
                warnings.push(format!(
                    "source product {} not found; {} not credited",
                    item.product_id, item.sku
                ));
                continue;
            };
            let destination = match self
                .services
                .products
                .find_by_sku(dest_site, &source.sku)
                .await?
            {
                Some(product) => product,
                None => {
                    let created = self
                        .services
                        .products
                        .create(source.clone_for_site(dest_site, Utc::now()))
                        .await?;
                    tracing::info!(sku = %created.sku, %dest_site, "product created at destination");
                    created
                }
            };

            let adjustment = Adjustment::new(
                destination.id,
                item.moved_qty(),
                StockDirection::In,
                "Dispatch received",
            )
            .by(Self::actor(job))
            .keyed(format!("dispatch-in:{}:{index}", job.id));
            self.adjust_or_warn(adjustment, warnings).await?;
        }
        Ok(())
    }

    async fn close_assignments(&self, job: &WmsJob, warnings: &mut Vec<String>) {
        let assignments = match self.services.assignments.for_job(job.id).await {
            Ok(assignments) => assignments,
            Err(e) => {
                warnings.push(format!("assignments not closed: {e}"));
                return;
            }
        };
        let now = Utc::now();
        for mut assignment in assignments
            .into_iter()
            .filter(|a| !a.status.is_terminal())
        {
            let closed = assignment
                .transition(AssignmentStatus::Completed, now)
                .map_err(EngineError::from);
            let result = match closed {
                Ok(()) => self.services.assignments.update(assignment).await.map(|_| ()),
                Err(e) => Err(e),
            };
            if let Err(e) = result {
                warnings.push(format!("assignment not closed: {e}"));
            }
        }
    }

    async fn record_completion(&self, job: &WmsJob, successor: Option<&WmsJob>) -> Result<()> {
        let step = JobCompletion {
            job_id: job.id,
            job_number: job.job_number.clone(),
            job_type: job.job_type,
            site_id: job.site_id,
            order_ref: job.order_ref,
            successor: successor.map(|s| s.id),
            completed_by: job.completed_by.clone(),
            at: job.completed_at.unwrap_or_else(Utc::now),
        };
        let entry = LedgerEntry::builder()
            .entry_type(JobCompletion::ENTRY_TYPE)
            .stream(StreamKey::new(streams::JOB, job.id))
            .idempotency_key(JobCompletion::idempotency_key(job.id))
            .timestamp(step.at)
            .payload(&step)?
            .build()?;
        self.services
            .ledger
            .append_entry(entry)
            .await
            .inspect_err(|e| {
                metrics::counter!("wms_persistence_failures_total").increment(1);
                tracing::error!(error = %e, "chain record not written; re-delivery will resume");
            })?;
        Ok(())
    }
}
