//! Points & Bonus Engine.
//!
//! Every award is journaled to the ledger under an idempotency key before
//! the denormalized running totals are touched. If saving the totals fails
//! the journal still holds the award and [`PointsEngine::reconcile_worker`]
//! repairs the drift.

use std::sync::Arc;

use chrono::Utc;
use common::{EmployeeId, SaleId, SiteId};
use domain::points::{job_points, rule_points, sale_points, share_for, streak_action};
use domain::points::{JobPoints, SalePoints};
use domain::{
    EngineConfig, Money, PointsAccount, PointsBalance, PointsTransaction, StorePoints,
    TransactionKind, WmsJob, WorkerPoints,
};
use ledger::{LedgerEntry, LedgerStoreExt, StreamKey};
use projections::{PointsBalanceView, Projection};

use crate::error::{EngineError, Result};
use crate::services::Services;

/// Points credited to a worker for one completed job.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WorkerAward {
    pub employee_id: EmployeeId,
    pub breakdown: JobPoints,
    /// Zero unless this job completed a 3-, 7- or 30-day streak.
    pub streak_bonus: u64,
    pub worker: WorkerPoints,
}

impl WorkerAward {
    pub fn total(&self) -> u64 {
        u64::from(self.breakdown.total()) + self.streak_bonus
    }
}

/// Points credited to a store for one sale.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StoreAward {
    pub site_id: SiteId,
    pub points: SalePoints,
    pub store: StorePoints,
}

/// Journal fold compared against the stored running totals.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Reconciliation {
    pub employee_id: EmployeeId,
    pub journal: PointsBalance,
    pub stored: Option<PointsBalance>,
    pub repaired: bool,
}

pub struct PointsEngine {
    services: Services,
    config: Arc<EngineConfig>,
}

impl PointsEngine {
    pub fn new(services: Services, config: Arc<EngineConfig>) -> Self {
        Self { services, config }
    }

    /// Appends a transaction. Returns false when the key was already journaled.
    async fn journal(&self, tx: &PointsTransaction, key: String) -> Result<bool> {
        let entry = LedgerEntry::builder()
            .entry_type(PointsTransaction::ENTRY_TYPE)
            .stream(StreamKey::new(tx.account.stream_kind(), tx.account.id_string()))
            .idempotency_key(key)
            .timestamp(tx.at)
            .payload(tx)?
            .build()?;
        let outcome = self.services.ledger.append_entry(entry).await?;
        if outcome.is_duplicate() {
            metrics::counter!("wms_chain_duplicates_total").increment(1);
        }
        Ok(!outcome.is_duplicate())
    }

    /// Awards individual points for a completed job.
    ///
    /// Returns `None` when warehouse points are off for the site, the job
    /// was unassigned, the worker's role is not eligible, the rules score it
    /// at zero, or the job was already awarded.
    #[tracing::instrument(skip(self, job), fields(job_id = %job.id, job_type = %job.job_type))]
    pub async fn award_job(&self, job: &WmsJob) -> Result<Option<WorkerAward>> {
        let settings = &self.config.warehouse_points;
        if !settings.is_active_for(job.site_id) {
            tracing::debug!("warehouse points disabled for site");
            return Ok(None);
        }
        let Some(employee_id) = job.assigned_to else {
            tracing::debug!("job was not assigned, no points");
            return Ok(None);
        };
        let employee = self
            .services
            .employees
            .get(employee_id)
            .await?
            .ok_or(EngineError::EmployeeNotFound(employee_id))?;
        if !employee.has_role_in(&settings.eligible_roles) {
            tracing::debug!(role = %employee.role, "role not eligible for points");
            return Ok(None);
        }

        let breakdown = job_points(&settings.rules, job);
        let points = u64::from(breakdown.total());
        if points == 0 {
            return Ok(None);
        }

        let at = job.completed_at.unwrap_or_else(Utc::now);
        let account = PointsAccount::Worker(employee_id);
        let tx = PointsTransaction::new(
            account,
            job.site_id,
            points,
            TransactionKind::JobCompletion,
            format!("{} {} completed", job.job_type, job.job_number),
            at,
        )
        .with_reference(job.id.to_string());
        if !self.journal(&tx, format!("points:job:{}", job.id)).await? {
            tracing::debug!("job already awarded");
            return Ok(None);
        }

        let mut worker = self
            .services
            .points
            .get_worker(employee_id)
            .await?
            .unwrap_or_else(|| WorkerPoints::new(employee_id, employee.site_id));
        worker.balance.award(points, at);

        let mut streak_bonus = 0;
        if let Some(streak) = worker.record_job(job.total_picked(), at)
            && let Some(action) = streak_action(streak)
        {
            let bonus = u64::from(rule_points(&settings.rules, action));
            let day = at.date_naive();
            let streak_tx = PointsTransaction::new(
                account,
                job.site_id,
                bonus,
                TransactionKind::StreakBonus,
                format!("{streak}-day streak"),
                at,
            )
            .with_reference(day.to_string());
            if bonus > 0
                && self
                    .journal(&streak_tx, format!("points:streak:{employee_id}:{day}"))
                    .await?
            {
                worker.balance.award(bonus, at);
                streak_bonus = bonus;
                tracing::info!(streak, bonus, "streak bonus awarded");
            }
        }

        worker.refresh_standing(&settings.tiers);
        let worker = self.services.points.save_worker(worker).await.inspect_err(|e| {
            metrics::counter!("wms_persistence_failures_total").increment(1);
            tracing::error!(error = %e, "worker totals not saved; journal holds the award");
        })?;

        let award = WorkerAward {
            employee_id,
            breakdown,
            streak_bonus,
            worker,
        };
        metrics::counter!("wms_points_awarded_total", "ledger" => "worker").increment(award.total());
        tracing::info!(
            %employee_id,
            points = award.total(),
            total = award.worker.balance.total_points,
            tier = ?award.worker.current_bonus_tier,
            "worker points awarded"
        );
        Ok(Some(award))
    }

    /// Awards team points for a completed sale.
    #[tracing::instrument(skip(self))]
    pub async fn award_sale(&self, sale_id: SaleId) -> Result<Option<StoreAward>> {
        let sale = self
            .services
            .orders
            .get_sale(sale_id)
            .await?
            .ok_or(EngineError::SaleNotFound(sale_id))?;
        let settings = &self.config.store_points;
        if !settings.is_active_for(sale.site_id) {
            tracing::debug!("store points disabled for site");
            return Ok(None);
        }

        let points = sale_points(&settings.rules, &sale);
        if points.total == 0 {
            return Ok(None);
        }

        let at = Utc::now();
        let tx = PointsTransaction::new(
            PointsAccount::Store(sale.site_id),
            sale.site_id,
            points.total,
            TransactionKind::Sale,
            format!("Sale of {} unit(s)", sale.total_units()),
            at,
        )
        .with_reference(sale.id.to_string());
        if !self.journal(&tx, format!("points:sale:{}", sale.id)).await? {
            tracing::debug!("sale already awarded");
            return Ok(None);
        }

        let mut store = self
            .services
            .points
            .get_store(sale.site_id)
            .await?
            .unwrap_or_else(|| StorePoints::new(sale.site_id));
        store.balance.award(points.total, at);
        store.record_sale(sale.subtotal());
        store.refresh_standing(&settings.tiers);
        let store = self.services.points.save_store(store).await.inspect_err(|e| {
            metrics::counter!("wms_persistence_failures_total").increment(1);
            tracing::error!(error = %e, "store totals not saved; journal holds the award");
        })?;

        metrics::counter!("wms_points_awarded_total", "ledger" => "store").increment(points.total);
        tracing::info!(site_id = %sale.site_id, points = points.total, "store points awarded");
        Ok(Some(StoreAward {
            site_id: sale.site_id,
            points,
            store,
        }))
    }

    /// A role's share of the store's current estimated bonus.
    pub async fn bonus_share(&self, site_id: SiteId, role: &str) -> Result<Money> {
        let estimated = self
            .services
            .points
            .get_store(site_id)
            .await?
            .map_or(Money::zero(), |store| store.estimated_bonus);
        Ok(share_for(
            self.config.store_points.distribution_for(site_id),
            role,
            estimated,
        ))
    }

    /// Folds the worker's journal and repairs the stored totals on drift.
    #[tracing::instrument(skip(self))]
    pub async fn reconcile_worker(&self, employee_id: EmployeeId) -> Result<Reconciliation> {
        let account = PointsAccount::Worker(employee_id);
        let entries = self
            .services
            .ledger
            .entries_for_stream(&StreamKey::new(account.stream_kind(), account.id_string()))
            .await?;

        let view = PointsBalanceView::new();
        for entry in &entries {
            view.handle(entry).await?;
        }
        let journal = view.balance(&account).await;

        let stored = self.services.points.get_worker(employee_id).await?;
        let stored_balance = stored.as_ref().map(|w| w.balance.clone());
        let drifted = match &stored_balance {
            Some(balance) => *balance != journal,
            None => journal.total_points > 0,
        };

        if drifted {
            let mut worker = match stored {
                Some(worker) => worker,
                None => {
                    let employee = self
                        .services
                        .employees
                        .get(employee_id)
                        .await?
                        .ok_or(EngineError::EmployeeNotFound(employee_id))?;
                    WorkerPoints::new(employee_id, employee.site_id)
                }
            };
            tracing::warn!(
                stored = ?stored_balance.as_ref().map(|b| b.total_points),
                journal = journal.total_points,
                "worker totals drifted from journal, repairing"
            );
            worker.balance = journal.clone();
            worker.refresh_standing(&self.config.warehouse_points.tiers);
            self.services.points.save_worker(worker).await?;
        }

        Ok(Reconciliation {
            employee_id,
            journal,
            stored: stored_balance,
            repaired: drifted,
        })
    }
}
