//! Integration tests: release -> assignment -> completion chains over the
//! in-memory collaborators.

use std::sync::Arc;

use chrono::Utc;
use common::{EmployeeId, JobId, OrderRef, ProductId, SaleId, SiteId, TransferId};
use domain::job::policy::{DISPATCH_BAY, PACKING_STATION, RECEIVING_DOCK};
use domain::{
    AssignmentStatus, BarcodeType, EngineConfig, Employee, FulfillmentPlan, FulfillmentStatus,
    FulfillmentStrategy, ItemStatus, JobItem, JobStatus, JobType, Money, PlanAssignment,
    PlannedItem, PoLine, PoStatus, Product, PurchaseOrder, Sale, SaleLine, StockDirection,
    TransferLine, TransferRecord, TransferStatus, WmsJob,
};
use engine::services::{AssignmentStore, OrderStore, ProductStore};
use engine::{
    ChainOutcome, EngineError, ErrorKind, FulfillmentEngine, InMemoryServices, Receipt,
    ReceiptLine, ReleaseOutcome, RetryConfig,
};

struct TestHarness {
    mem: InMemoryServices,
    engine: FulfillmentEngine,
    warehouse: SiteId,
    store: SiteId,
}

impl TestHarness {
    fn new() -> Self {
        Self::with_config(EngineConfig::default())
    }

    fn with_config(config: EngineConfig) -> Self {
        let warehouse = SiteId::new();
        let store = SiteId::new();
        let retry = RetryConfig {
            max_retries: 2,
            base_delay_ms: 1,
        };
        let mem = InMemoryServices::new(vec![warehouse], retry);
        let engine = FulfillmentEngine::new(mem.services(), config);
        Self {
            mem,
            engine,
            warehouse,
            store,
        }
    }

    async fn product(&self, site: SiteId, name: &str, sku: &str, stock: u32) -> Product {
        self.engine
            .services()
            .products
            .create(
                Product::new(site, name, sku, "Electronics", Utc::now())
                    .with_stock(stock, 10)
                    .with_price(Money::from_units(5)),
            )
            .await
            .unwrap()
    }

    async fn stored_product(&self, id: ProductId) -> Product {
        self.engine
            .services()
            .products
            .get(id)
            .await
            .unwrap()
            .unwrap()
    }

    async fn worker(&self, role: &str) -> Employee {
        self.mem
            .employees
            .insert(Employee::new("Ana", self.warehouse, role))
            .await
    }

    async fn sale(&self, site: SiteId, lines: Vec<SaleLine>) -> Sale {
        self.mem
            .orders
            .create_sale(Sale::new(site, lines, Utc::now()))
            .await
            .unwrap()
    }

    async fn sale_status(&self, sale: &Sale) -> FulfillmentStatus {
        self.mem
            .orders
            .get_sale(sale.id)
            .await
            .unwrap()
            .unwrap()
            .fulfillment_status
    }

    async fn transfer_status(&self, id: TransferId) -> TransferStatus {
        self.mem
            .orders
            .get_transfer(id)
            .await
            .unwrap()
            .unwrap()
            .status
    }

    async fn job(&self, id: JobId) -> WmsJob {
        self.engine.jobs.get(id).await.unwrap()
    }

    async fn pick_all(&self, job_id: JobId) {
        let job = self.job(job_id).await;
        for (index, item) in job.line_items.iter().enumerate() {
            self.engine
                .jobs
                .record_item(job_id, index, ItemStatus::Picked, item.expected_qty, false)
                .await
                .unwrap();
        }
    }

    /// Assign, pick every line in full, complete.
    async fn work(&self, job_id: JobId, worker: &Employee) -> ChainOutcome {
        self.engine.scheduler.assign(job_id, worker.id).await.unwrap();
        self.pick_all(job_id).await;
        self.engine
            .chain
            .complete_job(job_id, &worker.name, false)
            .await
            .unwrap()
    }

    async fn release(&self, sale: &Sale) -> Vec<WmsJob> {
        match self.engine.release.release_sale(sale.id).await.unwrap() {
            ReleaseOutcome::Released(jobs) => jobs,
            ReleaseOutcome::Parked => panic!("sale unexpectedly parked"),
        }
    }
}

fn line(product: &Product, quantity: u32) -> SaleLine {
    SaleLine {
        product_id: product.id,
        sku: product.sku.clone(),
        name: product.name.clone(),
        category: product.category.clone(),
        quantity,
        unit_price: product.price,
    }
}

fn receipt_line(line_id: u32, quantity: u32) -> ReceiptLine {
    ReceiptLine {
        line_id,
        quantity,
        scanned: None,
        sku_decision: None,
    }
}

fn manual_line(line_id: u32, name: &str, category: &str, quantity: u32) -> PoLine {
    PoLine {
        line_id,
        product_id: None,
        name: name.to_string(),
        category: category.to_string(),
        supplier_sku: None,
        quantity_ordered: quantity,
    }
}

#[tokio::test]
async fn test_sale_pick_chains_into_pack() {
    let h = TestHarness::new();
    let cable = h.product(h.warehouse, "Cable", "EL-001", 50).await;
    let sale = h.sale(h.store, vec![line(&cable, 2)]).await;
    let picker = h.worker("picker").await;

    let picks = h.release(&sale).await;
    assert_eq!(picks.len(), 1);
    let pick = &picks[0];
    assert_eq!(pick.site_id, h.warehouse);
    assert_eq!(pick.source_site_id, Some(h.warehouse));
    assert_eq!(pick.dest_site_id, Some(h.store));
    assert_eq!(h.sale_status(&sale).await, FulfillmentStatus::Picking);

    let outcome = h.work(pick.id, &picker).await;
    let report = outcome.report().unwrap();
    assert!(!report.resumed);
    assert!(report.warnings.is_empty());

    let pack = report.successor.clone().unwrap();
    assert_eq!(pack.job_type, JobType::Pack);
    assert_eq!(pack.status, JobStatus::Pending);
    assert_eq!(pack.chained_from, Some(pick.id));
    assert_eq!(pack.order_ref, Some(OrderRef::Sale(sale.id)));
    assert_eq!(pack.location.as_deref(), Some(PACKING_STATION));
    assert_eq!(pack.source_site_id, pick.source_site_id);
    assert_eq!(pack.dest_site_id, pick.dest_site_id);
    assert!(pack.assigned_to.is_none());
    assert!(pack.line_items.iter().all(|item| {
        item.status == ItemStatus::Pending && item.picked_qty == 0 && item.expected_qty == 2
    }));

    assert_eq!(h.sale_status(&sale).await, FulfillmentStatus::Packing);
    // Sale picks do not move stock.
    assert_eq!(h.stored_product(cable.id).await.stock, 50);
    assert_eq!(
        h.engine
            .jobs
            .jobs_for_order(OrderRef::Sale(sale.id))
            .await
            .unwrap()
            .len(),
        2
    );
}

#[tokio::test]
async fn test_cross_site_sale_ships_then_delivers() {
    let h = TestHarness::new();
    let cable = h.product(h.warehouse, "Cable", "EL-001", 50).await;
    let sale = h.sale(h.store, vec![line(&cable, 3)]).await;
    let worker = h.worker("dispatcher").await;

    let pick = h.release(&sale).await.remove(0);
    let pack_id = h.work(pick.id, &worker).await.successor_id().unwrap();

    let outcome = h.work(pack_id, &worker).await;
    let dispatch = outcome.report().unwrap().successor.clone().unwrap();
    assert_eq!(dispatch.job_type, JobType::Dispatch);
    assert_eq!(dispatch.location.as_deref(), Some(DISPATCH_BAY));
    assert_eq!(h.sale_status(&sale).await, FulfillmentStatus::Shipped);

    let outcome = h.work(dispatch.id, &worker).await;
    assert!(outcome.successor_id().is_none());
    assert_eq!(h.sale_status(&sale).await, FulfillmentStatus::Delivered);

    let at_store = h
        .engine
        .services()
        .products
        .find_by_sku(h.store, "EL-001")
        .await
        .unwrap()
        .expect("product created at the store");
    assert_eq!(at_store.stock, 3);
    assert_eq!(at_store.name, "Cable");
}

#[tokio::test]
async fn test_local_pack_delivers_without_dispatch() {
    let h = TestHarness::new();
    let mug = h.product(h.store, "Mug", "EL-010", 20).await;
    let sale = h.sale(h.store, vec![line(&mug, 1)]).await;
    let packer = h.worker("packer").await;

    let pick = h.release(&sale).await.remove(0);
    assert_eq!(pick.site_id, h.store);
    assert!(!pick.is_cross_site());

    let pack_id = h.work(pick.id, &packer).await.successor_id().unwrap();
    let outcome = h.work(pack_id, &packer).await;

    assert!(outcome.successor_id().is_none());
    assert_eq!(h.sale_status(&sale).await, FulfillmentStatus::Delivered);
    assert_eq!(
        h.engine
            .jobs
            .jobs_for_order(OrderRef::Sale(sale.id))
            .await
            .unwrap()
            .len(),
        2
    );
}

#[tokio::test]
async fn test_transfer_chain_conserves_stock() {
    let h = TestHarness::new();
    let cable = h.product(h.warehouse, "Cable", "EL-001", 50).await;
    let transfer = h
        .mem
        .orders
        .create_transfer(TransferRecord::new(
            h.warehouse,
            h.store,
            vec![TransferLine {
                product_id: cable.id,
                sku: cable.sku.clone(),
                quantity: 20,
            }],
        ))
        .await
        .unwrap();
    let worker = h.worker("picker").await;

    let pick = h.engine.release.release_transfer(transfer.id).await.unwrap();
    assert_eq!(pick.transfer_status, Some(TransferStatus::Picking));
    assert_eq!(h.transfer_status(transfer.id).await, TransferStatus::Picking);

    let pack_id = h.work(pick.id, &worker).await.successor_id().unwrap();
    assert_eq!(h.stored_product(cable.id).await.stock, 30);
    assert_eq!(h.transfer_status(transfer.id).await, TransferStatus::Picked);
    assert_eq!(h.job(pack_id).await.transfer_status, Some(TransferStatus::Picked));

    let dispatch_id = h.work(pack_id, &worker).await.successor_id().unwrap();
    assert_eq!(h.transfer_status(transfer.id).await, TransferStatus::Packed);

    h.work(dispatch_id, &worker).await;
    assert_eq!(h.transfer_status(transfer.id).await, TransferStatus::Delivered);

    let source = h.stored_product(cable.id).await;
    let dest = h
        .engine
        .services()
        .products
        .find_by_sku(h.store, "EL-001")
        .await
        .unwrap()
        .unwrap();
    assert_eq!(source.stock, 30);
    assert_eq!(dest.stock, 20);
    assert_eq!(source.stock + dest.stock, 50);

    let out = h.engine.inventory.movements(cable.id).await.unwrap();
    assert_eq!(out.len(), 1);
    assert_eq!(out[0].direction, StockDirection::Out);
    assert_eq!(out[0].reason, "Transfer");
    assert_eq!(h.engine.inventory.movements(dest.id).await.unwrap().len(), 1);

    // Releasing again is refused.
    let err = h
        .engine
        .release
        .release_transfer(transfer.id)
        .await
        .unwrap_err();
    assert_eq!(err.kind(), ErrorKind::PreconditionViolation);
}

#[tokio::test]
async fn test_short_line_with_nothing_picked_moves_no_stock() {
    let h = TestHarness::new();
    let cable = h.product(h.warehouse, "Cable", "EL-001", 50).await;
    let mouse = h.product(h.warehouse, "Mouse", "EL-002", 10).await;
    let transfer = h
        .mem
        .orders
        .create_transfer(TransferRecord::new(
            h.warehouse,
            h.store,
            vec![
                TransferLine {
                    product_id: cable.id,
                    sku: cable.sku.clone(),
                    quantity: 20,
                },
                TransferLine {
                    product_id: mouse.id,
                    sku: mouse.sku.clone(),
                    quantity: 4,
                },
            ],
        ))
        .await
        .unwrap();
    let worker = h.worker("picker").await;

    let pick = h.engine.release.release_transfer(transfer.id).await.unwrap();
    h.engine.scheduler.assign(pick.id, worker.id).await.unwrap();
    let cable_index = pick
        .line_items
        .iter()
        .position(|item| item.product_id == cable.id)
        .unwrap();
    let mouse_index = 1 - cable_index;
    h.engine
        .jobs
        .record_item(pick.id, cable_index, ItemStatus::Short, 0, false)
        .await
        .unwrap();
    h.engine
        .jobs
        .record_item(pick.id, mouse_index, ItemStatus::Picked, 4, false)
        .await
        .unwrap();
    let outcome = h
        .engine
        .chain
        .complete_job(pick.id, &worker.name, false)
        .await
        .unwrap();

    assert_eq!(h.stored_product(cable.id).await.stock, 50);
    assert_eq!(h.stored_product(mouse.id).await.stock, 6);
    assert!(h.engine.inventory.movements(cable.id).await.unwrap().is_empty());

    let pack_id = outcome.successor_id().unwrap();
    let pack = h.job(pack_id).await;
    assert_eq!(pack.line_items[cable_index].expected_qty, 0);
    assert_eq!(pack.line_items[mouse_index].expected_qty, 4);

    let dispatch_id = h.work(pack_id, &worker).await.successor_id().unwrap();
    h.work(dispatch_id, &worker).await;
    assert_eq!(h.transfer_status(transfer.id).await, TransferStatus::Delivered);

    let products = &h.engine.services().products;
    assert!(products.find_by_sku(h.store, "EL-001").await.unwrap().is_none());
    let dest_mouse = products.find_by_sku(h.store, "EL-002").await.unwrap().unwrap();
    assert_eq!(dest_mouse.stock, 4);
}

#[tokio::test]
async fn test_recompleting_chained_job_is_a_no_op() {
    let h = TestHarness::new();
    let cable = h.product(h.warehouse, "Cable", "EL-001", 50).await;
    let sale = h.sale(h.store, vec![line(&cable, 2)]).await;
    let picker = h.worker("picker").await;

    let pick = h.release(&sale).await.remove(0);
    let first = h.work(pick.id, &picker).await;
    let entries_after_first = h.mem.ledger.entry_count().await;

    let second = h
        .engine
        .chain
        .complete_job(pick.id, "someone else", true)
        .await
        .unwrap();

    assert!(matches!(second, ChainOutcome::AlreadyChained { .. }));
    assert_eq!(second.successor_id(), first.successor_id());
    assert_eq!(h.mem.ledger.entry_count().await, entries_after_first);
    assert_eq!(
        h.engine
            .jobs
            .jobs_for_order(OrderRef::Sale(sale.id))
            .await
            .unwrap()
            .len(),
        2
    );
    assert_eq!(h.job(pick.id).await.completed_by.as_deref(), Some("Ana"));
}

#[tokio::test]
async fn test_interrupted_chain_resumes_without_duplicates() {
    let h = TestHarness::new();
    let cable = h.product(h.warehouse, "Cable", "EL-001", 50).await;
    let sale = h.sale(h.store, vec![line(&cable, 2)]).await;
    let picker = h.worker("picker").await;

    let pick = h.release(&sale).await.remove(0);
    h.engine.scheduler.assign(pick.id, picker.id).await.unwrap();
    h.pick_all(pick.id).await;

    h.mem.ledger.set_fail_on_append(true);
    let err = h
        .engine
        .chain
        .complete_job(pick.id, &picker.name, false)
        .await
        .unwrap_err();
    assert_eq!(err.kind(), ErrorKind::PersistenceFailure);
    assert_eq!(h.job(pick.id).await.status, JobStatus::Completed);

    h.mem.ledger.set_fail_on_append(false);
    let outcome = h
        .engine
        .chain
        .complete_job(pick.id, &picker.name, false)
        .await
        .unwrap();
    let report = outcome.report().unwrap();
    assert!(report.resumed);
    assert!(report.award.is_some());
    assert_eq!(report.successor.as_ref().unwrap().job_type, JobType::Pack);

    let jobs = h
        .engine
        .jobs
        .jobs_for_order(OrderRef::Sale(sale.id))
        .await
        .unwrap();
    assert_eq!(jobs.len(), 2);

    let again = h
        .engine
        .chain
        .complete_job(pick.id, &picker.name, false)
        .await
        .unwrap();
    assert!(matches!(again, ChainOutcome::AlreadyChained { .. }));
}

#[tokio::test]
async fn test_completion_requires_processed_items() {
    let h = TestHarness::new();
    let picker = h.worker("picker").await;
    let job = h
        .engine
        .jobs
        .create(
            WmsJob::builder(h.warehouse, JobType::Pick)
                .item(JobItem::new(ProductId::new(), "EL-001", 2))
                .item(JobItem::new(ProductId::new(), "EL-002", 1))
                .build()
                .unwrap(),
        )
        .await
        .unwrap()
        .into_job();
    h.engine.scheduler.assign(job.id, picker.id).await.unwrap();
    h.engine
        .jobs
        .record_item(job.id, 0, ItemStatus::Short, 1, false)
        .await
        .unwrap();

    let err = h
        .engine
        .chain
        .complete_job(job.id, &picker.name, false)
        .await
        .unwrap_err();
    assert_eq!(err.kind(), ErrorKind::PreconditionViolation);
    assert_eq!(h.job(job.id).await.status, JobStatus::InProgress);

    let outcome = h
        .engine
        .chain
        .complete_job(job.id, &picker.name, true)
        .await
        .unwrap();
    assert!(outcome.successor_id().is_none());
    assert_eq!(h.job(job.id).await.status, JobStatus::Completed);

    let assignments = h.mem.assignments.for_job(job.id).await.unwrap();
    assert_eq!(assignments[0].status, AssignmentStatus::Completed);
}

#[tokio::test]
async fn test_receipts_queue_putaway_once_and_close_the_po() {
    let h = TestHarness::new();
    let cable = h.product(h.warehouse, "Cable", "EL-001", 0).await;
    let po = h
        .mem
        .orders
        .create_purchase_order(PurchaseOrder::new(
            h.warehouse,
            "Acme",
            vec![PoLine {
                line_id: 1,
                product_id: Some(cable.id),
                name: "Cable".to_string(),
                category: "Electronics".to_string(),
                supplier_sku: None,
                quantity_ordered: 10,
            }],
        ))
        .await
        .unwrap();
    let receiver = h.worker("receiver").await;
    let receipt = |id: &str, quantity| Receipt {
        purchase_order_id: po.id,
        receipt_id: id.to_string(),
        lines: vec![receipt_line(1, quantity)],
    };

    let first = h
        .engine
        .release
        .receive_purchase_order(receipt("R1", 4))
        .await
        .unwrap();
    assert_eq!(first.jobs.len(), 1);
    assert_eq!(first.po_status, PoStatus::Pending);
    let putaway = &first.jobs[0];
    assert_eq!(putaway.job_type, JobType::Putaway);
    assert_eq!(putaway.location.as_deref(), Some(RECEIVING_DOCK));
    assert_eq!(putaway.order_ref, Some(OrderRef::PurchaseOrder(po.id)));
    assert_eq!(putaway.line_items[0].product_id, cable.id);
    assert_eq!(putaway.line_items[0].expected_qty, 4);

    let repeated = h
        .engine
        .release
        .receive_purchase_order(receipt("R1", 4))
        .await
        .unwrap();
    assert!(repeated.jobs.is_empty());
    assert_eq!(repeated.skipped_lines, vec![1]);

    let err = h
        .engine
        .release
        .receive_purchase_order(receipt("R2", 7))
        .await
        .unwrap_err();
    assert_eq!(err.kind(), ErrorKind::PreconditionViolation);
    assert_eq!(h.mem.jobs.len().await, 1);

    let second = h
        .engine
        .release
        .receive_purchase_order(receipt("R2", 6))
        .await
        .unwrap();
    assert_eq!(second.po_status, PoStatus::Received);

    for job in first.jobs.iter().chain(second.jobs.iter()) {
        h.work(job.id, &receiver).await;
    }
    let shelved = h.stored_product(cable.id).await;
    assert_eq!(shelved.stock, 10);
    // Receiving dock is not a shelf location.
    assert!(shelved.location.is_none());

    let err = h
        .engine
        .release
        .receive_purchase_order(receipt("R3", 1))
        .await
        .unwrap_err();
    assert_eq!(err.kind(), ErrorKind::PreconditionViolation);
}

#[tokio::test]
async fn test_receipt_resolves_skus_against_live_catalog() {
    let h = TestHarness::new();
    h.product(h.warehouse, "Cable", "EL-001", 5).await;
    let po = h
        .mem
        .orders
        .create_purchase_order(PurchaseOrder::new(
            h.warehouse,
            "Acme",
            vec![
                manual_line(1, "Desk Lamp", "Electronics", 2),
                manual_line(2, "USB Hub", "Electronics", 3),
                manual_line(3, "Gift Card", "Other", 1),
            ],
        ))
        .await
        .unwrap();

    let outcome = h
        .engine
        .release
        .receive_purchase_order(Receipt {
            purchase_order_id: po.id,
            receipt_id: "R1".to_string(),
            lines: vec![
                receipt_line(1, 2),
                receipt_line(2, 3),
                ReceiptLine {
                    scanned: Some(" 5901234123457 ".to_string()),
                    ..receipt_line(3, 1)
                },
            ],
        })
        .await
        .unwrap();

    let skus: Vec<_> = outcome
        .jobs
        .iter()
        .map(|job| job.line_items[0].sku.clone())
        .collect();
    assert_eq!(skus, vec!["EL-002", "EL-003", "5901234123457"]);
    assert_eq!(outcome.po_status, PoStatus::Received);

    let lamp = h
        .engine
        .services()
        .products
        .find_by_name(h.warehouse, "desk lamp")
        .await
        .unwrap()
        .unwrap();
    assert_eq!(lamp.sku, "EL-002");
    assert_eq!(lamp.stock, 0);

    let card = h
        .engine
        .services()
        .products
        .find_by_sku(h.warehouse, "5901234123457")
        .await
        .unwrap()
        .unwrap();
    assert_eq!(card.barcode_type, Some(BarcodeType::Ean13));
}

#[tokio::test]
async fn test_receipt_rejects_bad_lines_before_writing() {
    let h = TestHarness::new();
    let po = h
        .mem
        .orders
        .create_purchase_order(PurchaseOrder::new(
            h.warehouse,
            "Acme",
            vec![manual_line(1, "Desk Lamp", "Electronics", 2)],
        ))
        .await
        .unwrap();

    for lines in [
        vec![receipt_line(1, 1), receipt_line(9, 1)],
        vec![receipt_line(1, 1), receipt_line(1, 1)],
        vec![receipt_line(1, 0)],
        vec![receipt_line(1, 3)],
    ] {
        let err = h
            .engine
            .release
            .receive_purchase_order(Receipt {
                purchase_order_id: po.id,
                receipt_id: "R1".to_string(),
                lines,
            })
            .await
            .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::PreconditionViolation);
    }

    assert!(h.mem.jobs.is_empty().await);
    assert!(h.engine.services().products.list().await.unwrap().is_empty());
}

#[tokio::test]
async fn test_manual_strategy_parks_until_operator_release() {
    let h = TestHarness::with_config(EngineConfig {
        default_strategy: FulfillmentStrategy::Manual,
        ..EngineConfig::default()
    });
    let cable = h.product(h.warehouse, "Cable", "EL-001", 50).await;
    let sale = h.sale(h.store, vec![line(&cable, 2)]).await;

    let outcome = h.engine.release.release_sale(sale.id).await.unwrap();
    assert_eq!(outcome, ReleaseOutcome::Parked);
    assert_eq!(h.engine.release.release_sale(sale.id).await.unwrap(), ReleaseOutcome::Parked);
    assert_eq!(h.engine.release.parked_sales().await.unwrap(), vec![sale.id]);
    assert!(h.mem.jobs.is_empty().await);
    assert_eq!(h.sale_status(&sale).await, FulfillmentStatus::Pending);

    let plan = FulfillmentPlan::single_site(
        h.warehouse,
        vec![PlannedItem {
            product_id: cable.id,
            sku: cable.sku.clone(),
            quantity: 2,
        }],
    );
    let jobs = h
        .engine
        .release
        .release_parked(sale.id, plan.clone())
        .await
        .unwrap();
    assert_eq!(jobs.len(), 1);
    assert_eq!(jobs[0].site_id, h.warehouse);
    assert!(h.engine.release.parked_sales().await.unwrap().is_empty());
    assert_eq!(h.sale_status(&sale).await, FulfillmentStatus::Picking);

    let err = h
        .engine
        .release
        .release_parked(sale.id, plan)
        .await
        .unwrap_err();
    assert_eq!(err.kind(), ErrorKind::PreconditionViolation);
}

#[tokio::test]
async fn test_operator_plan_repeating_a_site_keeps_every_line() {
    let h = TestHarness::with_config(EngineConfig {
        default_strategy: FulfillmentStrategy::Manual,
        ..EngineConfig::default()
    });
    let cable = h.product(h.warehouse, "Cable", "EL-001", 50).await;
    let mouse = h.product(h.warehouse, "Mouse", "EL-002", 50).await;
    let sale = h
        .sale(h.store, vec![line(&cable, 2), line(&mouse, 1)])
        .await;
    assert_eq!(
        h.engine.release.release_sale(sale.id).await.unwrap(),
        ReleaseOutcome::Parked
    );

    let planned = |product: &Product, quantity| PlannedItem {
        product_id: product.id,
        sku: product.sku.clone(),
        quantity,
    };
    let plan = FulfillmentPlan {
        assignments: vec![
            PlanAssignment {
                site_id: h.warehouse,
                items: vec![planned(&cable, 2)],
            },
            PlanAssignment {
                site_id: h.warehouse,
                items: vec![planned(&mouse, 1)],
            },
        ],
    };
    let jobs = h.engine.release.release_parked(sale.id, plan).await.unwrap();

    assert_eq!(jobs.len(), 1);
    let skus: Vec<_> = jobs[0]
        .line_items
        .iter()
        .map(|item| item.sku.as_str())
        .collect();
    assert_eq!(skus, vec!["EL-001", "EL-002"]);
    assert_eq!(h.job(jobs[0].id).await.line_items.len(), 2);
    assert_eq!(h.sale_status(&sale).await, FulfillmentStatus::Picking);
}

#[tokio::test]
async fn test_release_of_unparked_sale_with_plan_is_refused() {
    let h = TestHarness::new();
    let cable = h.product(h.warehouse, "Cable", "EL-001", 50).await;
    let sale = h.sale(h.store, vec![line(&cable, 2)]).await;

    let err = h
        .engine
        .release
        .release_parked(sale.id, FulfillmentPlan::default())
        .await
        .unwrap_err();
    assert_eq!(err.kind(), ErrorKind::PreconditionViolation);

    let missing = h
        .engine
        .release
        .release_sale(SaleId::new())
        .await
        .unwrap_err();
    assert!(missing.is_not_found());
}

#[tokio::test]
async fn test_fourth_active_assignment_is_rejected() {
    let h = TestHarness::new();
    let picker = h.worker("picker").await;
    let mut jobs = Vec::new();
    for n in 0..4 {
        let job = WmsJob::builder(h.warehouse, JobType::Pick)
            .item(JobItem::new(ProductId::new(), format!("EL-00{n}"), 1))
            .build()
            .unwrap();
        jobs.push(h.engine.jobs.create(job).await.unwrap().into_job());
    }
    for job in &jobs[..3] {
        h.engine.scheduler.assign(job.id, picker.id).await.unwrap();
    }

    let err = h
        .engine
        .scheduler
        .assign(jobs[3].id, picker.id)
        .await
        .unwrap_err();
    assert!(matches!(
        err,
        EngineError::AssignmentLimit {
            active: 3,
            limit: 3,
            ..
        }
    ));

    let untouched = h.job(jobs[3].id).await;
    assert_eq!(untouched.status, JobStatus::Pending);
    assert!(untouched.assigned_to.is_none());
    assert_eq!(h.mem.assignments.len().await, 3);

    // Paused assignments free a slot.
    let active = h.engine.scheduler.active_assignments(picker.id).await.unwrap();
    h.engine
        .scheduler
        .set_assignment_status(active[0].id, AssignmentStatus::InProgress)
        .await
        .unwrap();
    h.engine
        .scheduler
        .set_assignment_status(active[0].id, AssignmentStatus::Paused)
        .await
        .unwrap();
    h.engine.scheduler.assign(jobs[3].id, picker.id).await.unwrap();
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_concurrent_assignments_respect_the_limit() {
    let h = Arc::new(TestHarness::new());
    for _ in 0..20 {
        let picker = h.worker("picker").await;
        let mut tasks = Vec::new();
        for n in 0..6 {
            let job = WmsJob::builder(h.warehouse, JobType::Pick)
                .item(JobItem::new(ProductId::new(), format!("EL-00{n}"), 1))
                .build()
                .unwrap();
            let job_id = h.engine.jobs.create(job).await.unwrap().into_job().id;
            let h = h.clone();
            let picker_id = picker.id;
            tasks.push(tokio::spawn(async move {
                h.engine.scheduler.assign(job_id, picker_id).await
            }));
        }

        let mut assigned = 0;
        for task in tasks {
            match task.await.unwrap() {
                Ok(_) => assigned += 1,
                Err(err) => assert!(matches!(err, EngineError::AssignmentLimit { .. })),
            }
        }
        assert_eq!(assigned, 3);
        let active = h.engine.scheduler.active_assignments(picker.id).await.unwrap();
        assert_eq!(active.len(), 3);
    }
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_concurrent_assignments_of_one_job_pick_one_worker() {
    let h = Arc::new(TestHarness::new());
    let job = WmsJob::builder(h.warehouse, JobType::Pick)
        .item(JobItem::new(ProductId::new(), "EL-001", 1))
        .build()
        .unwrap();
    let job_id = h.engine.jobs.create(job).await.unwrap().into_job().id;

    let mut tasks = Vec::new();
    for _ in 0..4 {
        let picker = h.worker("picker").await;
        let h = h.clone();
        tasks.push(tokio::spawn(async move {
            h.engine.scheduler.assign(job_id, picker.id).await
        }));
    }
    let mut assigned = 0;
    for task in tasks {
        if task.await.unwrap().is_ok() {
            assigned += 1;
        }
    }

    assert_eq!(assigned, 1);
    assert_eq!(h.mem.assignments.for_job(job_id).await.unwrap().len(), 1);
    assert_eq!(h.job(job_id).await.status, JobStatus::InProgress);
}

#[tokio::test]
async fn test_assignment_preconditions() {
    let h = TestHarness::new();
    let picker = h.worker("picker").await;
    let job = h
        .engine
        .jobs
        .create(
            WmsJob::builder(h.warehouse, JobType::Pick)
                .item(JobItem::new(ProductId::new(), "EL-001", 1))
                .build()
                .unwrap(),
        )
        .await
        .unwrap()
        .into_job();

    let err = h
        .engine
        .scheduler
        .assign(JobId::new(), picker.id)
        .await
        .unwrap_err();
    assert!(matches!(err, EngineError::JobNotFound(_)));

    let err = h
        .engine
        .scheduler
        .assign(job.id, EmployeeId::new())
        .await
        .unwrap_err();
    assert!(matches!(err, EngineError::EmployeeNotFound(_)));

    h.engine.scheduler.assign(job.id, picker.id).await.unwrap();
    let err = h
        .engine
        .scheduler
        .assign(job.id, picker.id)
        .await
        .unwrap_err();
    assert_eq!(err.kind(), ErrorKind::PreconditionViolation);
}

#[tokio::test]
async fn test_failed_job_write_withdraws_assignment() {
    let h = TestHarness::new();
    let picker = h.worker("picker").await;
    let job = h
        .engine
        .jobs
        .create(
            WmsJob::builder(h.warehouse, JobType::Pick)
                .item(JobItem::new(ProductId::new(), "EL-001", 1))
                .build()
                .unwrap(),
        )
        .await
        .unwrap()
        .into_job();

    h.mem.jobs.set_fail_on_write(true);
    let err = h
        .engine
        .scheduler
        .assign(job.id, picker.id)
        .await
        .unwrap_err();
    assert_eq!(err.kind(), ErrorKind::PersistenceFailure);
    assert!(h.mem.assignments.is_empty().await);
    assert_eq!(h.job(job.id).await.status, JobStatus::Pending);
}

#[tokio::test]
async fn test_reset_reopens_job_and_cancels_assignment() {
    let h = TestHarness::new();
    let picker = h.worker("picker").await;
    let job = h
        .engine
        .jobs
        .create(
            WmsJob::builder(h.warehouse, JobType::Pick)
                .item(JobItem::new(ProductId::new(), "EL-001", 3))
                .build()
                .unwrap(),
        )
        .await
        .unwrap()
        .into_job();
    let assignment = h.engine.scheduler.assign(job.id, picker.id).await.unwrap();
    h.engine
        .jobs
        .record_item(job.id, 0, ItemStatus::Short, 2, false)
        .await
        .unwrap();

    let reset = h.engine.scheduler.reset(job.id).await.unwrap();
    assert_eq!(reset.status, JobStatus::Pending);
    assert!(reset.assigned_to.is_none());
    assert_eq!(reset.line_items[0].status, ItemStatus::Pending);
    assert_eq!(reset.line_items[0].picked_qty, 0);

    let cancelled = h.mem.assignments.get(assignment.id).await.unwrap().unwrap();
    assert_eq!(cancelled.status, AssignmentStatus::Cancelled);
    assert!(h
        .engine
        .scheduler
        .active_assignments(picker.id)
        .await
        .unwrap()
        .is_empty());

    h.engine.scheduler.assign(job.id, picker.id).await.unwrap();
    h.engine
        .jobs
        .record_item(job.id, 0, ItemStatus::Picked, 3, false)
        .await
        .unwrap();
    h.engine
        .chain
        .complete_job(job.id, &picker.name, false)
        .await
        .unwrap();
    let err = h.engine.scheduler.reset(job.id).await.unwrap_err();
    assert_eq!(err.kind(), ErrorKind::PreconditionViolation);
}
