//! Integration tests: worker and store points through job completion and
//! sale awards, with journal reconciliation.

use chrono::{DateTime, TimeZone, Utc};
use common::{ProductId, SiteId};
use domain::points::{StorePointRule, UnitTerms, WarehouseAction, WarehousePointRule};
use domain::{
    EngineConfig, Employee, ItemStatus, JobItem, JobType, Money, PointsAccount, PointsTransaction,
    Sale, SaleLine, TransactionKind, WmsJob,
};
use engine::services::{OrderStore, PointsStore};
use engine::{FulfillmentEngine, InMemoryServices, RetryConfig};
use ledger::{LedgerStore, StreamKey};

struct TestHarness {
    mem: InMemoryServices,
    engine: FulfillmentEngine,
    site: SiteId,
}

impl TestHarness {
    fn new(configure: impl FnOnce(&mut EngineConfig, SiteId)) -> Self {
        let site = SiteId::new();
        let mut config = EngineConfig::default();
        configure(&mut config, site);
        let mem = InMemoryServices::new(Vec::new(), RetryConfig::default());
        let engine = FulfillmentEngine::new(mem.services(), config);
        Self { mem, engine, site }
    }

    async fn worker(&self, role: &str) -> Employee {
        self.mem
            .employees
            .insert(Employee::new("Ana", self.site, role))
            .await
    }

    /// A PICK job run through assignment, full picking and completion.
    async fn complete_pick(&self, worker: &Employee, items: u32) -> engine::CompletionReport {
        let job = WmsJob::builder(self.site, JobType::Pick)
            .items((0..items).map(|n| JobItem::new(ProductId::new(), format!("EL-{n:03}"), 2)))
            .build()
            .unwrap();
        let job = self.engine.jobs.create(job).await.unwrap().into_job();
        self.engine.scheduler.assign(job.id, worker.id).await.unwrap();
        for index in 0..job.line_items.len() {
            self.engine
                .jobs
                .record_item(job.id, index, ItemStatus::Picked, 2, false)
                .await
                .unwrap();
        }
        self.engine
            .chain
            .complete_job(job.id, &worker.name, false)
            .await
            .unwrap()
            .report()
            .cloned()
            .unwrap()
    }

    async fn worker_journal(&self, worker: &Employee) -> Vec<PointsTransaction> {
        let account = PointsAccount::Worker(worker.id);
        self.mem
            .ledger
            .entries_for_stream(&StreamKey::new(account.stream_kind(), account.id_string()))
            .await
            .unwrap()
            .iter()
            .map(|entry| entry.decode().unwrap())
            .collect()
    }
}

fn lean_rules(config: &mut EngineConfig) {
    config.warehouse_points.rules = vec![
        WarehousePointRule::new(WarehouseAction::Pick, 10, "Pick"),
        WarehousePointRule::new(WarehouseAction::ItemBonus, 2, "Per item"),
        WarehousePointRule::new(WarehouseAction::Accuracy100, 5, "Accuracy"),
    ];
}

fn beverages_only(config: &mut EngineConfig) {
    config.store_points.rules = vec![StorePointRule::Category {
        category: "Beverages".to_string(),
        terms: UnitTerms::per_unit(2),
        priority: 1,
        enabled: true,
    }];
}

fn cola(quantity: u32) -> SaleLine {
    SaleLine {
        product_id: ProductId::new(),
        sku: "BV-001".to_string(),
        name: "Cola".to_string(),
        category: "Beverages".to_string(),
        quantity,
        unit_price: Money::from_cents(250),
    }
}

fn day(d: u32) -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2024, 5, d, 10, 0, 0).unwrap()
}

#[tokio::test]
async fn test_pick_with_four_items_scores_base_items_and_accuracy() {
    let h = TestHarness::new(|config, _| lean_rules(config));
    let picker = h.worker("Picker").await;

    let report = h.complete_pick(&picker, 4).await;
    let award = report.award.unwrap();

    assert_eq!(award.breakdown.base, 10);
    assert_eq!(award.breakdown.item_bonus, 8);
    assert_eq!(award.breakdown.accuracy_bonus, 5);
    assert_eq!(award.total(), 23);
    assert_eq!(award.streak_bonus, 0);

    let stored = h.mem.points.get_worker(picker.id).await.unwrap().unwrap();
    assert_eq!(stored.balance.total_points, 23);
    assert_eq!(stored.balance.today_points, 23);
    assert_eq!(stored.total_jobs_completed, 1);
    assert_eq!(stored.total_items_picked, 8);
    assert_eq!(stored.current_streak, 1);

    let journal = h.worker_journal(&picker).await;
    assert_eq!(journal.len(), 1);
    assert_eq!(journal[0].points, 23);
    assert_eq!(journal[0].kind, TransactionKind::JobCompletion);
}

#[tokio::test]
async fn test_short_line_forfeits_accuracy_bonus() {
    let h = TestHarness::new(|config, _| lean_rules(config));
    let picker = h.worker("picker").await;
    let job = WmsJob::builder(h.site, JobType::Pick)
        .item(JobItem::new(ProductId::new(), "EL-001", 3))
        .item(JobItem::new(ProductId::new(), "EL-002", 3))
        .build()
        .unwrap();
    let job = h.engine.jobs.create(job).await.unwrap().into_job();
    h.engine.scheduler.assign(job.id, picker.id).await.unwrap();
    h.engine
        .jobs
        .record_item(job.id, 0, ItemStatus::Picked, 3, false)
        .await
        .unwrap();
    h.engine
        .jobs
        .record_item(job.id, 1, ItemStatus::Short, 1, false)
        .await
        .unwrap();

    let outcome = h
        .engine
        .chain
        .complete_job(job.id, &picker.name, false)
        .await
        .unwrap();
    let award = outcome.report().unwrap().award.clone().unwrap();
    assert_eq!(award.breakdown.accuracy_bonus, 0);
    assert_eq!(award.total(), 14);
}

#[tokio::test]
async fn test_third_consecutive_day_earns_streak_bonus_once() {
    let h = TestHarness::new(|_, _| {});
    let picker = h.worker("picker").await;

    let mut awards = Vec::new();
    for (d, hour_offset) in [(6, 0), (7, 0), (8, 0), (8, 2)] {
        let mut job = WmsJob::builder(h.site, JobType::Pick)
            .item(JobItem::new(ProductId::new(), "EL-001", 1))
            .build()
            .unwrap();
        let at = day(d) + chrono::Duration::hours(hour_offset);
        job.assigned_to = Some(picker.id);
        job.record_item(0, ItemStatus::Picked, 1, false, at).unwrap();
        job.complete(&picker.name, false, at).unwrap();
        awards.push(h.engine.points.award_job(&job).await.unwrap().unwrap());
    }

    // Default rules: 15 base + 2 per item + 50 accuracy.
    assert!(awards.iter().all(|award| award.breakdown.total() == 67));
    assert_eq!(
        awards.iter().map(|a| a.streak_bonus).collect::<Vec<_>>(),
        vec![0, 0, 25, 0]
    );

    let stored = h.mem.points.get_worker(picker.id).await.unwrap().unwrap();
    assert_eq!(stored.current_streak, 3);
    assert_eq!(stored.longest_streak, 3);
    assert_eq!(stored.balance.total_points, 4 * 67 + 25);
    assert_eq!(stored.balance.today_points, 2 * 67 + 25);
    assert_eq!(stored.current_bonus_tier.as_deref(), Some("Bronze"));

    let journal = h.worker_journal(&picker).await;
    let streaks: Vec<_> = journal
        .iter()
        .filter(|tx| tx.kind == TransactionKind::StreakBonus)
        .collect();
    assert_eq!(streaks.len(), 1);
    assert_eq!(streaks[0].points, 25);
}

#[tokio::test]
async fn test_job_is_awarded_once() {
    let h = TestHarness::new(|_, _| {});
    let picker = h.worker("picker").await;
    let mut job = WmsJob::builder(h.site, JobType::Putaway)
        .item(JobItem::new(ProductId::new(), "EL-001", 5))
        .build()
        .unwrap();
    job.assigned_to = Some(picker.id);
    job.record_item(0, ItemStatus::Picked, 5, false, day(6)).unwrap();
    job.complete("Ana", false, day(6)).unwrap();

    assert!(h.engine.points.award_job(&job).await.unwrap().is_some());
    assert!(h.engine.points.award_job(&job).await.unwrap().is_none());

    let stored = h.mem.points.get_worker(picker.id).await.unwrap().unwrap();
    assert_eq!(stored.total_jobs_completed, 1);
    assert_eq!(stored.balance.total_points, 8 + 2 + 50);
}

#[tokio::test]
async fn test_opted_out_site_and_ineligible_role_earn_nothing() {
    let h = TestHarness::new(|config, site| {
        config.warehouse_points.opted_out_sites.insert(site);
    });
    let picker = h.worker("picker").await;
    let report = h.complete_pick(&picker, 2).await;
    assert!(report.award.is_none());
    assert!(report.warnings.is_empty());
    assert!(h.worker_journal(&picker).await.is_empty());

    let h = TestHarness::new(|_, _| {});
    let cashier = h.worker("Cashier").await;
    let report = h.complete_pick(&cashier, 2).await;
    assert!(report.award.is_none());
    assert!(h.mem.points.get_worker(cashier.id).await.unwrap().is_none());
}

#[tokio::test]
async fn test_failed_totals_save_is_repaired_from_journal() {
    let h = TestHarness::new(|config, _| lean_rules(config));
    let picker = h.worker("picker").await;

    h.mem.points.set_fail_on_write(true);
    let report = h.complete_pick(&picker, 4).await;
    assert!(report.award.is_none());
    assert_eq!(report.warnings.len(), 1);
    assert!(report.warnings[0].starts_with("points not awarded"));
    assert!(h.mem.points.get_worker(picker.id).await.unwrap().is_none());
    assert_eq!(h.worker_journal(&picker).await.len(), 1);

    h.mem.points.set_fail_on_write(false);
    let reconciliation = h.engine.points.reconcile_worker(picker.id).await.unwrap();
    assert!(reconciliation.repaired);
    assert!(reconciliation.stored.is_none());
    assert_eq!(reconciliation.journal.total_points, 23);

    let repaired = h.mem.points.get_worker(picker.id).await.unwrap().unwrap();
    assert_eq!(repaired.balance.total_points, 23);
    assert_eq!(repaired.site_id, h.site);

    let again = h.engine.points.reconcile_worker(picker.id).await.unwrap();
    assert!(!again.repaired);
}

#[tokio::test]
async fn test_sale_awards_store_points_once() {
    let h = TestHarness::new(|config, _| beverages_only(config));
    let sale = h
        .mem
        .orders
        .create_sale(Sale::new(h.site, vec![cola(3)], Utc::now()))
        .await
        .unwrap();

    let award = h.engine.points.award_sale(sale.id).await.unwrap().unwrap();
    assert_eq!(award.points.line_points, 6);
    assert_eq!(award.points.total, 6);
    assert_eq!(award.store.balance.total_points, 6);
    assert_eq!(award.store.total_transactions, 1);
    assert_eq!(award.store.total_revenue, Money::from_cents(750));

    assert!(h.engine.points.award_sale(sale.id).await.unwrap().is_none());
    let store = h.mem.points.get_store(h.site).await.unwrap().unwrap();
    assert_eq!(store.total_transactions, 1);
}

#[tokio::test]
async fn test_store_bonus_is_split_by_role() {
    let h = TestHarness::new(|config, _| beverages_only(config));
    let sale = h
        .mem
        .orders
        .create_sale(Sale::new(h.site, vec![cola(250)], Utc::now()))
        .await
        .unwrap();
    let award = h.engine.points.award_sale(sale.id).await.unwrap().unwrap();
    assert_eq!(award.store.balance.monthly_points, 500);
    assert_eq!(award.store.current_bonus_tier.as_deref(), Some("Bronze"));
    // 2000.00 flat + 0.50 x 500 points.
    assert_eq!(award.store.estimated_bonus, Money::from_units(2250));

    let manager = h
        .engine
        .points
        .bonus_share(h.site, "store manager")
        .await
        .unwrap();
    assert_eq!(manager, Money::from_cents(67_500));
    assert_eq!(
        h.engine.points.bonus_share(h.site, "Cashier").await.unwrap(),
        Money::from_cents(27_000)
    );
    assert_eq!(
        h.engine.points.bonus_share(h.site, "Janitor").await.unwrap(),
        Money::zero()
    );
}

#[tokio::test]
async fn test_store_points_disabled_for_site() {
    let h = TestHarness::new(|config, site| {
        config.store_points.opted_out_sites.insert(site);
    });
    let sale = h
        .mem
        .orders
        .create_sale(Sale::new(h.site, vec![cola(3)], Utc::now()))
        .await
        .unwrap();
    assert!(h.engine.points.award_sale(sale.id).await.unwrap().is_none());
    assert!(h.mem.points.get_store(h.site).await.unwrap().is_none());
}
