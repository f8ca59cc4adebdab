//! Collaborator interfaces the engine calls, with in-memory implementations.

pub mod catalog;
pub mod employees;
pub mod jobs;
pub mod notifier;
pub mod orders;
pub mod planner;
pub mod points;

use std::sync::Arc;

use common::SiteId;
use ledger::{InMemoryLedger, LedgerStore};

pub use catalog::{InMemoryProductStore, ProductStore};
pub use employees::{EmployeeDirectory, InMemoryEmployeeDirectory};
pub use jobs::{AssignmentStore, InMemoryAssignmentStore, InMemoryJobStore, JobStore};
pub use notifier::{InMemoryNotifier, Notification, NotificationKind, Notifier, TracingNotifier};
pub use orders::{InMemoryOrderStore, OrderStore};
pub use planner::{FulfillmentPlanner, StockPlanner};
pub use points::{InMemoryPointsStore, PointsStore};

use crate::cache::{CachedProductStore, RetryConfig};

/// Handles to every collaborator, shared by the engine components.
#[derive(Clone)]
pub struct Services {
    pub jobs: Arc<dyn JobStore>,
    pub assignments: Arc<dyn AssignmentStore>,
    pub products: Arc<dyn ProductStore>,
    pub orders: Arc<dyn OrderStore>,
    pub employees: Arc<dyn EmployeeDirectory>,
    pub points: Arc<dyn PointsStore>,
    /// Completion log, stock movements and the points journal.
    pub ledger: Arc<dyn LedgerStore>,
    pub notifier: Arc<dyn Notifier>,
    pub planner: Arc<dyn FulfillmentPlanner>,
}

/// In-memory collaborators with their concrete handles kept for seeding
/// and fault injection.
///
/// Products are served through a [`CachedProductStore`] over `products`.
#[derive(Clone)]
pub struct InMemoryServices {
    pub jobs: InMemoryJobStore,
    pub assignments: InMemoryAssignmentStore,
    pub products: InMemoryProductStore,
    pub orders: InMemoryOrderStore,
    pub employees: InMemoryEmployeeDirectory,
    pub points: InMemoryPointsStore,
    pub ledger: InMemoryLedger,
    pub notifier: InMemoryNotifier,
    services: Services,
}

impl InMemoryServices {
    /// `site_order` is the planner's candidate order after the requesting site.
    pub fn new(site_order: Vec<SiteId>, retry: RetryConfig) -> Self {
        let jobs = InMemoryJobStore::new();
        let assignments = InMemoryAssignmentStore::new();
        let products = InMemoryProductStore::new();
        let orders = InMemoryOrderStore::new();
        let employees = InMemoryEmployeeDirectory::new();
        let points = InMemoryPointsStore::new();
        let ledger = InMemoryLedger::new();
        let notifier = InMemoryNotifier::new();

        let catalog: Arc<dyn ProductStore> = Arc::new(CachedProductStore::new(
            Arc::new(products.clone()),
            retry,
        ));
        let services = Services {
            jobs: Arc::new(jobs.clone()),
            assignments: Arc::new(assignments.clone()),
            products: catalog.clone(),
            orders: Arc::new(orders.clone()),
            employees: Arc::new(employees.clone()),
            points: Arc::new(points.clone()),
            ledger: Arc::new(ledger.clone()),
            notifier: Arc::new(notifier.clone()),
            planner: Arc::new(StockPlanner::new(catalog, site_order)),
        };

        Self {
            jobs,
            assignments,
            products,
            orders,
            employees,
            points,
            ledger,
            notifier,
            services,
        }
    }

    pub fn services(&self) -> Services {
        self.services.clone()
    }
}
