//! Scenario replay.
//!
//! A scenario declares sites, then lists steps: seed records (products,
//! employees, sales, transfers, purchase orders) and operator actions
//! (release, receive, assign, pick, complete, ...). Records are referred to
//! by alias, jobs by the order they belong to and their type.
//!
//! Steps the engine rejects are recorded and the replay continues. Scenario
//! mistakes (unknown aliases, bad JSON) stop the run.

use std::collections::{BTreeMap, HashMap};
use std::path::Path;

use chrono::Utc;
use common::{EmployeeId, JobId, OrderRef, ProductId, PurchaseOrderId, SaleId, SiteId, TransferId};
use domain::catalog::{SkuRequest, resolve_sku};
use domain::{
    Employee, EngineConfig, FulfillmentStrategy, ItemStatus, JobType, Money, PoLine,
    PointsAccount, Product, PurchaseOrder, Sale, SaleLine, StockDirection, StockStatus,
    TransferLine, TransferRecord, WmsJob,
};
use engine::services::{
    EmployeeDirectory, FulfillmentPlanner, JobStore, Notification, OrderStore, PointsStore,
    ProductStore,
};
use engine::{
    Adjustment, ChainOutcome, EngineError, FulfillmentEngine, InMemoryServices, Receipt,
    ReceiptLine, ReleaseOutcome, RetryConfig, streams,
};
use projections::{ChainHistoryView, PointsBalanceView, ProjectionProcessor};
use serde::{Deserialize, Serialize};

use crate::error::{Result, RunnerError};

/// Scenario replayed when no `WMS_SCENARIO` is given.
pub const DEMO: &str = include_str!("../scenarios/demo.json");

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SiteKind {
    /// Holds stock and serves orders for other sites.
    Warehouse,
    Store,
}

#[derive(Debug, Clone, Deserialize)]
pub struct SiteSpec {
    pub alias: String,
    pub kind: SiteKind,
    /// Overrides the configured default strategy for orders placed here.
    #[serde(default)]
    pub strategy: Option<FulfillmentStrategy>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct LineSpec {
    pub product: String,
    pub quantity: u32,
}

/// A purchase order line. Without `product` it is a manual line and needs
/// a name and category.
#[derive(Debug, Clone, Deserialize)]
pub struct PoLineSpec {
    pub line_id: u32,
    #[serde(default)]
    pub product: Option<String>,
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub category: String,
    #[serde(default)]
    pub supplier_sku: Option<String>,
    pub quantity: u32,
}

/// One scenario step, tagged by `action`.
///
/// Job steps pick the first open job of `job` type for `order`, or the
/// latest one when every job of that type is completed.
#[derive(Debug, Clone, Deserialize)]
#[serde(tag = "action", rename_all = "snake_case")]
pub enum Step {
    Product {
        alias: String,
        site: String,
        name: String,
        /// Generated from the category when empty.
        #[serde(default)]
        sku: String,
        category: String,
        #[serde(default)]
        stock: u32,
        #[serde(default)]
        price_cents: i64,
        #[serde(default)]
        location: Option<String>,
    },
    Employee {
        alias: String,
        site: String,
        name: String,
        role: String,
    },
    Sale {
        alias: String,
        site: String,
        lines: Vec<LineSpec>,
    },
    Transfer {
        alias: String,
        from: String,
        to: String,
        lines: Vec<LineSpec>,
    },
    PurchaseOrder {
        alias: String,
        site: String,
        supplier: String,
        lines: Vec<PoLineSpec>,
    },
    ReleaseSale {
        sale: String,
    },
    /// Operator release of a parked sale, using the nearest-stock plan.
    ReleaseParked {
        sale: String,
    },
    ReleaseTransfer {
        transfer: String,
    },
    Receive {
        purchase_order: String,
        receipt: String,
        lines: Vec<ReceiptLine>,
    },
    Assign {
        order: String,
        job: JobType,
        employee: String,
    },
    RecordItem {
        order: String,
        job: JobType,
        index: usize,
        status: ItemStatus,
        quantity: u32,
        #[serde(default)]
        allow_over_pick: bool,
    },
    /// Marks every pending item picked in full.
    Pick {
        order: String,
        job: JobType,
    },
    Complete {
        order: String,
        job: JobType,
        #[serde(default)]
        employee: Option<String>,
        #[serde(default)]
        skip_validation: bool,
    },
    /// Assign, pick and complete in one step.
    Work {
        order: String,
        job: JobType,
        employee: String,
    },
    Reset {
        order: String,
        job: JobType,
    },
    Adjust {
        product: String,
        direction: StockDirection,
        quantity: u32,
        reason: String,
    },
    AwardSale {
        sale: String,
    },
    Reconcile {
        employee: String,
    },
}

impl Step {
    pub fn action(&self) -> &'static str {
        match self {
            Step::Product { .. } => "product",
            Step::Employee { .. } => "employee",
            Step::Sale { .. } => "sale",
            Step::Transfer { .. } => "transfer",
            Step::PurchaseOrder { .. } => "purchase_order",
            Step::ReleaseSale { .. } => "release_sale",
            Step::ReleaseParked { .. } => "release_parked",
            Step::ReleaseTransfer { .. } => "release_transfer",
            Step::Receive { .. } => "receive",
            Step::Assign { .. } => "assign",
            Step::RecordItem { .. } => "record_item",
            Step::Pick { .. } => "pick",
            Step::Complete { .. } => "complete",
            Step::Work { .. } => "work",
            Step::Reset { .. } => "reset",
            Step::Adjust { .. } => "adjust",
            Step::AwardSale { .. } => "award_sale",
            Step::Reconcile { .. } => "reconcile",
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct Scenario {
    #[serde(default = "default_name")]
    pub name: String,
    pub sites: Vec<SiteSpec>,
    #[serde(default)]
    pub steps: Vec<Step>,
}

fn default_name() -> String {
    "unnamed".to_string()
}

impl Scenario {
    pub fn from_json(json: &str) -> Result<Self> {
        Ok(serde_json::from_str(json)?)
    }

    pub async fn load(path: &Path) -> Result<Self> {
        let json = tokio::fs::read_to_string(path).await?;
        Self::from_json(&json)
    }

    pub fn demo() -> Result<Self> {
        Self::from_json(DEMO)
    }
}

/// A step the engine refused.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Rejection {
    /// 1-based position in the scenario.
    pub step: usize,
    pub action: &'static str,
    pub kind: String,
    pub error: String,
}

#[derive(Debug, Clone, Serialize)]
pub struct JobSummary {
    pub job_number: String,
    pub job_type: JobType,
    pub status: String,
    pub site: String,
    pub order: Option<String>,
    pub chained_from: Option<String>,
    pub assigned_to: Option<String>,
    pub items: usize,
}

#[derive(Debug, Clone, Serialize)]
pub struct ProductSummary {
    /// Unset for products the engine created, e.g. on dispatch receipt.
    pub alias: Option<String>,
    pub site: String,
    pub sku: String,
    pub name: String,
    pub stock: u32,
    pub status: StockStatus,
    pub location: Option<String>,
}

#[derive(Debug, Clone, Serialize)]
pub struct OrderSummary {
    pub alias: String,
    pub kind: &'static str,
    pub status: String,
    /// Completed job types in completion order.
    pub chain: Vec<JobType>,
}

#[derive(Debug, Clone, Serialize)]
pub struct WorkerSummary {
    pub alias: String,
    pub total_points: u64,
    pub today_points: u64,
    pub jobs_completed: u64,
    pub current_streak: u32,
    pub level_title: Option<String>,
    pub bonus_tier: Option<String>,
    /// Total rebuilt from the points journal.
    pub journal_points: u64,
}

#[derive(Debug, Clone, Serialize)]
pub struct StoreSummary {
    pub site: String,
    pub total_points: u64,
    pub revenue_cents: i64,
    pub bonus_tier: Option<String>,
    pub estimated_bonus_cents: i64,
}

/// State of every collaborator after a replay.
#[derive(Debug, Clone, Serialize)]
pub struct RunSummary {
    pub scenario: String,
    pub steps: usize,
    pub rejections: Vec<Rejection>,
    pub jobs: Vec<JobSummary>,
    pub products: Vec<ProductSummary>,
    pub orders: Vec<OrderSummary>,
    pub workers: Vec<WorkerSummary>,
    pub stores: Vec<StoreSummary>,
    pub parked_sales: Vec<String>,
    pub notifications: Vec<Notification>,
    pub ledger_entries: usize,
}

impl RunSummary {
    pub fn to_json(&self) -> Result<String> {
        Ok(serde_json::to_string_pretty(self)?)
    }

    pub fn order(&self, alias: &str) -> Option<&OrderSummary> {
        self.orders.iter().find(|o| o.alias == alias)
    }

    pub fn worker(&self, alias: &str) -> Option<&WorkerSummary> {
        self.workers.iter().find(|w| w.alias == alias)
    }

    pub fn product(&self, site: &str, sku: &str) -> Option<&ProductSummary> {
        self.products
            .iter()
            .find(|p| p.site == site && p.sku == sku)
    }
}

/// Aliases share one namespace across record kinds.
#[derive(Default)]
struct Aliases {
    sites: BTreeMap<String, SiteId>,
    products: BTreeMap<String, ProductId>,
    employees: BTreeMap<String, EmployeeId>,
    orders: BTreeMap<String, OrderRef>,
}

impl Aliases {
    fn reserve(&self, alias: &str) -> Result<()> {
        let taken = self.sites.contains_key(alias)
            || self.products.contains_key(alias)
            || self.employees.contains_key(alias)
            || self.orders.contains_key(alias);
        if taken {
            return Err(RunnerError::DuplicateAlias(alias.to_string()));
        }
        Ok(())
    }
}

fn lookup<T: Copy>(map: &BTreeMap<String, T>, kind: &'static str, alias: &str) -> Result<T> {
    map.get(alias).copied().ok_or_else(|| RunnerError::UnknownAlias {
        kind,
        alias: alias.to_string(),
    })
}

fn reverse<T: Copy + Eq + std::hash::Hash>(map: &BTreeMap<String, T>) -> HashMap<T, String> {
    map.iter().map(|(alias, id)| (*id, alias.clone())).collect()
}

/// Replays scenario steps against one engine over in-memory collaborators.
pub struct ScenarioRunner {
    name: String,
    mem: InMemoryServices,
    engine: FulfillmentEngine,
    aliases: Aliases,
}

impl ScenarioRunner {
    /// Declares the scenario's sites. Warehouses become the planner's
    /// candidate sites in declaration order.
    pub fn new(scenario: &Scenario, mut config: EngineConfig, retry: RetryConfig) -> Result<Self> {
        let mut aliases = Aliases::default();
        let mut warehouses = Vec::new();
        for site in &scenario.sites {
            aliases.reserve(&site.alias)?;
            let id = SiteId::new();
            aliases.sites.insert(site.alias.clone(), id);
            if site.kind == SiteKind::Warehouse {
                warehouses.push(id);
            }
            if let Some(strategy) = site.strategy {
                config.fulfillment_strategies.insert(id, strategy);
            }
        }

        let mem = InMemoryServices::new(warehouses, retry);
        let engine = FulfillmentEngine::new(mem.services(), config);
        Ok(Self {
            name: scenario.name.clone(),
            mem,
            engine,
            aliases,
        })
    }

    pub fn engine(&self) -> &FulfillmentEngine {
        &self.engine
    }

    pub fn collaborators(&self) -> &InMemoryServices {
        &self.mem
    }

    pub fn site(&self, alias: &str) -> Result<SiteId> {
        lookup(&self.aliases.sites, "site", alias)
    }

    pub fn product_id(&self, alias: &str) -> Result<ProductId> {
        lookup(&self.aliases.products, "product", alias)
    }

    pub fn employee_id(&self, alias: &str) -> Result<EmployeeId> {
        lookup(&self.aliases.employees, "employee", alias)
    }

    pub fn order(&self, alias: &str) -> Result<OrderRef> {
        lookup(&self.aliases.orders, "order", alias)
    }

    fn sale_id(&self, alias: &str) -> Result<SaleId> {
        match self.order(alias)? {
            OrderRef::Sale(id) => Ok(id),
            _ => Err(RunnerError::UnknownAlias {
                kind: "sale",
                alias: alias.to_string(),
            }),
        }
    }

    fn transfer_id(&self, alias: &str) -> Result<TransferId> {
        match self.order(alias)? {
            OrderRef::Transfer(id) => Ok(id),
            _ => Err(RunnerError::UnknownAlias {
                kind: "transfer",
                alias: alias.to_string(),
            }),
        }
    }

    fn purchase_order_id(&self, alias: &str) -> Result<PurchaseOrderId> {
        match self.order(alias)? {
            OrderRef::PurchaseOrder(id) => Ok(id),
            _ => Err(RunnerError::UnknownAlias {
                kind: "purchase order",
                alias: alias.to_string(),
            }),
        }
    }

    /// Applies `steps` in order and returns the ones the engine refused.
    #[tracing::instrument(skip_all, fields(scenario = %self.name))]
    pub async fn replay(&mut self, steps: &[Step]) -> Result<Vec<Rejection>> {
        let mut rejections = Vec::new();
        for (index, step) in steps.iter().enumerate() {
            let action = step.action();
            match self.apply(step).await {
                Ok(()) => {
                    metrics::counter!("wms_scenario_steps_total", "action" => action, "outcome" => "applied")
                        .increment(1);
                    tracing::debug!(step = index + 1, action, "step applied");
                }
                Err(RunnerError::Engine(e)) => {
                    metrics::counter!("wms_scenario_steps_total", "action" => action, "outcome" => "rejected")
                        .increment(1);
                    tracing::warn!(step = index + 1, action, error = %e, "step rejected");
                    rejections.push(Rejection {
                        step: index + 1,
                        action,
                        kind: format!("{:?}", e.kind()),
                        error: e.to_string(),
                    });
                }
                Err(e) => return Err(e),
            }
        }
        Ok(rejections)
    }

    async fn apply(&mut self, step: &Step) -> Result<()> {
        let services = self.engine.services().clone();
        match step {
            Step::Product {
                alias,
                site,
                name,
                sku,
                category,
                stock,
                price_cents,
                location,
            } => {
                self.aliases.reserve(alias)?;
                let site_id = self.site(site)?;
                let sku = if sku.trim().is_empty() {
                    self.generate_sku(category).await?
                } else {
                    sku.clone()
                };
                let mut product = Product::new(site_id, name, sku, category, Utc::now())
                    .with_stock(*stock, self.engine.config().low_stock_threshold)
                    .with_price(Money::from_cents(*price_cents));
                if let Some(location) = location {
                    product = product.with_location(location);
                }
                let product = services.products.create(product).await?;
                self.aliases.products.insert(alias.clone(), product.id);
            }
            Step::Employee {
                alias,
                site,
                name,
                role,
            } => {
                self.aliases.reserve(alias)?;
                let site_id = self.site(site)?;
                let employee = self
                    .mem
                    .employees
                    .insert(Employee::new(name, site_id, role))
                    .await;
                self.aliases.employees.insert(alias.clone(), employee.id);
            }
            Step::Sale { alias, site, lines } => {
                self.aliases.reserve(alias)?;
                let site_id = self.site(site)?;
                let mut sale_lines = Vec::with_capacity(lines.len());
                for line in lines {
                    let product = self.product(&line.product).await?;
                    sale_lines.push(SaleLine {
                        product_id: product.id,
                        sku: product.sku,
                        name: product.name,
                        category: product.category,
                        quantity: line.quantity,
                        unit_price: product.price,
                    });
                }
                let sale = services
                    .orders
                    .create_sale(Sale::new(site_id, sale_lines, Utc::now()))
                    .await?;
                self.aliases
                    .orders
                    .insert(alias.clone(), OrderRef::Sale(sale.id));
            }
            Step::Transfer {
                alias,
                from,
                to,
                lines,
            } => {
                self.aliases.reserve(alias)?;
                let (source, dest) = (self.site(from)?, self.site(to)?);
                let mut items = Vec::with_capacity(lines.len());
                for line in lines {
                    let product = self.product(&line.product).await?;
                    items.push(TransferLine {
                        product_id: product.id,
                        sku: product.sku,
                        quantity: line.quantity,
                    });
                }
                let transfer = services
                    .orders
                    .create_transfer(TransferRecord::new(source, dest, items))
                    .await?;
                self.aliases
                    .orders
                    .insert(alias.clone(), OrderRef::Transfer(transfer.id));
            }
            Step::PurchaseOrder {
                alias,
                site,
                supplier,
                lines,
            } => {
                self.aliases.reserve(alias)?;
                let site_id = self.site(site)?;
                let mut po_lines = Vec::with_capacity(lines.len());
                for line in lines {
                    po_lines.push(self.po_line(line).await?);
                }
                let po = services
                    .orders
                    .create_purchase_order(PurchaseOrder::new(site_id, supplier, po_lines))
                    .await?;
                self.aliases
                    .orders
                    .insert(alias.clone(), OrderRef::PurchaseOrder(po.id));
            }
            Step::ReleaseSale { sale } => {
                match self.engine.release.release_sale(self.sale_id(sale)?).await? {
                    ReleaseOutcome::Released(jobs) => {
                        tracing::info!(sale = %sale, jobs = jobs.len(), "sale released")
                    }
                    ReleaseOutcome::Parked => tracing::info!(sale = %sale, "sale parked"),
                }
            }
            Step::ReleaseParked { sale } => {
                let sale_id = self.sale_id(sale)?;
                let record = services
                    .orders
                    .get_sale(sale_id)
                    .await?
                    .ok_or(EngineError::SaleNotFound(sale_id))?;
                let plan = services
                    .planner
                    .plan(record.site_id, FulfillmentStrategy::Nearest, &record.lines)
                    .await?;
                let jobs = self.engine.release.release_parked(sale_id, plan).await?;
                tracing::info!(sale = %sale, jobs = jobs.len(), "parked sale released");
            }
            Step::ReleaseTransfer { transfer } => {
                let job = self
                    .engine
                    .release
                    .release_transfer(self.transfer_id(transfer)?)
                    .await?;
                tracing::info!(transfer = %transfer, job = %job.job_number, "transfer released");
            }
            Step::Receive {
                purchase_order,
                receipt,
                lines,
            } => {
                let outcome = self
                    .engine
                    .release
                    .receive_purchase_order(Receipt {
                        purchase_order_id: self.purchase_order_id(purchase_order)?,
                        receipt_id: receipt.clone(),
                        lines: lines.clone(),
                    })
                    .await?;
                tracing::info!(
                    purchase_order = %purchase_order,
                    jobs = outcome.jobs.len(),
                    skipped = outcome.skipped_lines.len(),
                    status = outcome.po_status.as_str(),
                    "receipt processed"
                );
            }
            Step::Assign {
                order,
                job,
                employee,
            } => {
                let job = self.find_job(order, *job).await?;
                self.engine
                    .scheduler
                    .assign(job.id, self.employee_id(employee)?)
                    .await?;
            }
            Step::RecordItem {
                order,
                job,
                index,
                status,
                quantity,
                allow_over_pick,
            } => {
                let job = self.find_job(order, *job).await?;
                self.engine
                    .jobs
                    .record_item(job.id, *index, *status, *quantity, *allow_over_pick)
                    .await?;
            }
            Step::Pick { order, job } => {
                let job = self.find_job(order, *job).await?;
                self.pick_all(&job).await?;
            }
            Step::Complete {
                order,
                job,
                employee,
                skip_validation,
            } => {
                let job = self.find_job(order, *job).await?;
                let actor = match employee {
                    Some(alias) => self.employee_name(alias).await?,
                    None => "operator".to_string(),
                };
                self.complete(job.id, &actor, *skip_validation).await?;
            }
            Step::Work {
                order,
                job,
                employee,
            } => {
                let job = self.find_job(order, *job).await?;
                let employee_id = self.employee_id(employee)?;
                let actor = self.employee_name(employee).await?;
                self.engine.scheduler.assign(job.id, employee_id).await?;
                self.pick_all(&job).await?;
                self.complete(job.id, &actor, false).await?;
            }
            Step::Reset { order, job } => {
                let job = self.find_job(order, *job).await?;
                self.engine.scheduler.reset(job.id).await?;
            }
            Step::Adjust {
                product,
                direction,
                quantity,
                reason,
            } => {
                let adjustment =
                    Adjustment::new(self.product_id(product)?, *quantity, *direction, reason)
                        .by("operator");
                self.engine.inventory.adjust(adjustment).await?;
            }
            Step::AwardSale { sale } => {
                if let Some(award) = self.engine.points.award_sale(self.sale_id(sale)?).await? {
                    tracing::info!(sale = %sale, points = award.points.total, "store points awarded");
                }
            }
            Step::Reconcile { employee } => {
                let outcome = self
                    .engine
                    .points
                    .reconcile_worker(self.employee_id(employee)?)
                    .await?;
                tracing::info!(employee = %employee, ?outcome, "worker reconciled");
            }
        }
        Ok(())
    }

    async fn generate_sku(&self, category: &str) -> Result<String> {
        let catalog = self.engine.services().products.list().await?;
        let request = SkuRequest {
            category,
            ..Default::default()
        };
        let resolution = resolve_sku(
            &request,
            catalog.iter().map(|p| p.sku.as_str()),
            &self.engine.config().category_prefixes,
        );
        Ok(resolution.sku)
    }

    async fn product(&self, alias: &str) -> Result<Product> {
        let id = self.product_id(alias)?;
        Ok(self
            .engine
            .services()
            .products
            .get(id)
            .await?
            .ok_or(EngineError::ProductNotFound(id))?)
    }

    async fn po_line(&self, entry: &PoLineSpec) -> Result<PoLine> {
        let mut line = PoLine {
            line_id: entry.line_id,
            product_id: None,
            name: entry.name.clone(),
            category: entry.category.clone(),
            supplier_sku: entry.supplier_sku.clone(),
            quantity_ordered: entry.quantity,
        };
        if let Some(alias) = &entry.product {
            let product = self.product(alias).await?;
            line.product_id = Some(product.id);
            if line.name.is_empty() {
                line.name = product.name;
            }
            if line.category.is_empty() {
                line.category = product.category;
            }
        }
        Ok(line)
    }

    async fn employee_name(&self, alias: &str) -> Result<String> {
        let id = self.employee_id(alias)?;
        let employee = self
            .engine
            .services()
            .employees
            .get(id)
            .await?
            .ok_or(EngineError::EmployeeNotFound(id))?;
        Ok(employee.name)
    }

    async fn find_job(&self, order: &str, job_type: JobType) -> Result<WmsJob> {
        let jobs: Vec<WmsJob> = self
            .engine
            .jobs
            .jobs_for_order(self.order(order)?)
            .await?
            .into_iter()
            .filter(|job| job.job_type == job_type)
            .collect();
        let open = jobs.iter().find(|job| !job.status.is_terminal()).cloned();
        open.or_else(|| jobs.last().cloned()).ok_or_else(|| {
            EngineError::Precondition(format!("no {job_type} job for order '{order}'")).into()
        })
    }

    async fn pick_all(&self, job: &WmsJob) -> Result<()> {
        for (index, item) in job.line_items.iter().enumerate() {
            if item.status == ItemStatus::Pending {
                self.engine
                    .jobs
                    .record_item(job.id, index, ItemStatus::Picked, item.expected_qty, false)
                    .await?;
            }
        }
        Ok(())
    }

    async fn complete(&self, job_id: JobId, actor: &str, skip_validation: bool) -> Result<()> {
        match self
            .engine
            .chain
            .complete_job(job_id, actor, skip_validation)
            .await?
        {
            ChainOutcome::Completed(report) => tracing::info!(
                job = %report.job.job_number,
                successor = report.successor.as_ref().map(|s| s.job_number.as_str()),
                resumed = report.resumed,
                warnings = report.warnings.len(),
                "job completed"
            ),
            ChainOutcome::AlreadyChained { job_id, .. } => {
                tracing::info!(%job_id, "job already chained")
            }
        }
        Ok(())
    }

    /// Folds the ledger and the stores into a [`RunSummary`].
    pub async fn summary(&self, steps: usize, rejections: Vec<Rejection>) -> Result<RunSummary> {
        let services = self.engine.services();

        let points_view = PointsBalanceView::new();
        let chain_view = ChainHistoryView::new();
        let mut processor = ProjectionProcessor::new(self.mem.ledger.clone())
            .only_streams(&[streams::WORKER, streams::STORE, streams::JOB]);
        processor.register(Box::new(points_view.clone()));
        processor.register(Box::new(chain_view.clone()));
        processor.run_catch_up().await?;

        let site_names = reverse(&self.aliases.sites);
        let product_names = reverse(&self.aliases.products);
        let employee_names = reverse(&self.aliases.employees);
        let order_names = reverse(&self.aliases.orders);
        let site_name = |id: SiteId| {
            site_names
                .get(&id)
                .cloned()
                .unwrap_or_else(|| id.to_string())
        };

        let mut jobs = services.jobs.list().await?;
        jobs.sort_by(|a, b| {
            a.created_at
                .cmp(&b.created_at)
                .then_with(|| a.job_number.cmp(&b.job_number))
        });
        let job_numbers: HashMap<JobId, String> = jobs
            .iter()
            .map(|job| (job.id, job.job_number.clone()))
            .collect();
        let jobs = jobs
            .iter()
            .map(|job| JobSummary {
                job_number: job.job_number.clone(),
                job_type: job.job_type,
                status: job.status.to_string(),
                site: site_name(job.site_id),
                order: job.order_ref.and_then(|r| order_names.get(&r).cloned()),
                chained_from: job.chained_from.and_then(|id| job_numbers.get(&id).cloned()),
                assigned_to: job.assigned_to.and_then(|id| employee_names.get(&id).cloned()),
                items: job.line_items.len(),
            })
            .collect();

        let mut products: Vec<ProductSummary> = services
            .products
            .list()
            .await?
            .into_iter()
            .map(|p| ProductSummary {
                alias: product_names.get(&p.id).cloned(),
                site: site_name(p.site_id),
                sku: p.sku,
                name: p.name,
                stock: p.stock,
                status: p.status,
                location: p.location,
            })
            .collect();
        products.sort_by(|a, b| a.site.cmp(&b.site).then_with(|| a.sku.cmp(&b.sku)));

        let mut orders = Vec::with_capacity(self.aliases.orders.len());
        for (alias, order_ref) in &self.aliases.orders {
            let status = match *order_ref {
                OrderRef::Sale(id) => services
                    .orders
                    .get_sale(id)
                    .await?
                    .map(|s| s.fulfillment_status.as_str()),
                OrderRef::Transfer(id) => services
                    .orders
                    .get_transfer(id)
                    .await?
                    .map(|t| t.status.as_str()),
                OrderRef::PurchaseOrder(id) => services
                    .orders
                    .get_purchase_order(id)
                    .await?
                    .map(|po| po.status.as_str()),
            };
            orders.push(OrderSummary {
                alias: alias.clone(),
                kind: order_ref.kind(),
                status: status.unwrap_or("Missing").to_string(),
                chain: chain_view
                    .chain(order_ref)
                    .await
                    .iter()
                    .map(|step| step.job_type)
                    .collect(),
            });
        }

        let mut workers = Vec::with_capacity(self.aliases.employees.len());
        for (alias, id) in &self.aliases.employees {
            let points = services.points.get_worker(*id).await?;
            let journal = points_view.balance(&PointsAccount::Worker(*id)).await;
            workers.push(WorkerSummary {
                alias: alias.clone(),
                total_points: points.as_ref().map_or(0, |p| p.balance.total_points),
                today_points: points.as_ref().map_or(0, |p| p.balance.today_points),
                jobs_completed: points.as_ref().map_or(0, |p| p.total_jobs_completed),
                current_streak: points.as_ref().map_or(0, |p| p.current_streak),
                level_title: points.as_ref().map(|p| p.level_title.clone()),
                bonus_tier: points.and_then(|p| p.current_bonus_tier),
                journal_points: journal.total_points,
            });
        }

        let mut stores = Vec::new();
        for (alias, id) in &self.aliases.sites {
            if let Some(points) = services.points.get_store(*id).await? {
                stores.push(StoreSummary {
                    site: alias.clone(),
                    total_points: points.balance.total_points,
                    revenue_cents: points.total_revenue.cents(),
                    bonus_tier: points.current_bonus_tier,
                    estimated_bonus_cents: points.estimated_bonus.cents(),
                });
            }
        }

        let parked_sales = self
            .engine
            .release
            .parked_sales()
            .await?
            .into_iter()
            .map(|id| {
                order_names
                    .get(&OrderRef::Sale(id))
                    .cloned()
                    .unwrap_or_else(|| id.to_string())
            })
            .collect();

        Ok(RunSummary {
            scenario: self.name.clone(),
            steps,
            rejections,
            jobs,
            products,
            orders,
            workers,
            stores,
            parked_sales,
            notifications: self.mem.notifier.notifications().await,
            ledger_entries: self.mem.ledger.entry_count().await,
        })
    }
}

/// Replays a whole scenario and summarizes the result.
pub async fn run(scenario: &Scenario, config: EngineConfig, retry: RetryConfig) -> Result<RunSummary> {
    let mut runner = ScenarioRunner::new(scenario, config, retry)?;
    let rejections = runner.replay(&scenario.steps).await?;
    tracing::info!(
        scenario = %scenario.name,
        steps = scenario.steps.len(),
        rejected = rejections.len(),
        "scenario replayed"
    );
    runner.summary(scenario.steps.len(), rejections).await
}
