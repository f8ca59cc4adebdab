//! Fulfillment planning: which site(s) serve which sale lines.

use std::collections::BTreeMap;
use std::sync::Arc;

use async_trait::async_trait;
use common::SiteId;
use domain::{
    FulfillmentPlan, FulfillmentStrategy, PlanAssignment, PlannedItem, Product, SaleLine,
};

use super::catalog::ProductStore;
use crate::error::Result;

#[async_trait]
pub trait FulfillmentPlanner: Send + Sync {
    /// Plans a cart for `requesting_site`. `Manual` yields an empty plan.
    async fn plan(
        &self,
        requesting_site: SiteId,
        strategy: FulfillmentStrategy,
        lines: &[SaleLine],
    ) -> Result<FulfillmentPlan>;
}

/// Plans against current stock levels.
///
/// Candidate sites are tried in order: the requesting site first, then
/// `site_order`. There is no distance model; callers encode proximity in the
/// ordering.
pub struct StockPlanner {
    products: Arc<dyn ProductStore>,
    site_order: Vec<SiteId>,
}

impl StockPlanner {
    pub fn new(products: Arc<dyn ProductStore>, site_order: Vec<SiteId>) -> Self {
        Self {
            products,
            site_order,
        }
    }

    fn candidates(&self, requesting_site: SiteId) -> Vec<SiteId> {
        std::iter::once(requesting_site)
            .chain(
                self.site_order
                    .iter()
                    .copied()
                    .filter(|site| *site != requesting_site),
            )
            .collect()
    }
}

fn product_at<'a>(catalog: &'a [Product], site_id: SiteId, sku: &str) -> Option<&'a Product> {
    catalog.iter().find(|p| p.site_id == site_id && p.sku == sku)
}

fn covers(catalog: &[Product], site_id: SiteId, line: &SaleLine) -> bool {
    product_at(catalog, site_id, &line.sku).is_some_and(|p| p.stock >= line.quantity)
}

fn planned(catalog: &[Product], site_id: SiteId, line: &SaleLine) -> PlannedItem {
    PlannedItem {
        product_id: product_at(catalog, site_id, &line.sku).map_or(line.product_id, |p| p.id),
        sku: line.sku.clone(),
        quantity: line.quantity,
    }
}

#[async_trait]
impl FulfillmentPlanner for StockPlanner {
    async fn plan(
        &self,
        requesting_site: SiteId,
        strategy: FulfillmentStrategy,
        lines: &[SaleLine],
    ) -> Result<FulfillmentPlan> {
        if strategy == FulfillmentStrategy::Manual || lines.is_empty() {
            return Ok(FulfillmentPlan::default());
        }

        let catalog = self.products.list().await?;
        let candidates = self.candidates(requesting_site);
        let local_items = || -> Vec<PlannedItem> {
            lines
                .iter()
                .map(|l| planned(&catalog, requesting_site, l))
                .collect()
        };

        let plan = match strategy {
            FulfillmentStrategy::LocalOnly | FulfillmentStrategy::Manual => {
                FulfillmentPlan::single_site(requesting_site, local_items())
            }
            FulfillmentStrategy::Nearest => {
                match candidates
                    .iter()
                    .copied()
                    .find(|site| lines.iter().all(|l| covers(&catalog, *site, l)))
                {
                    Some(site) => FulfillmentPlan::single_site(
                        site,
                        lines.iter().map(|l| planned(&catalog, site, l)).collect(),
                    ),
                    None => FulfillmentPlan::single_site(requesting_site, local_items()),
                }
            }
            FulfillmentStrategy::Split => {
                let mut by_site: BTreeMap<SiteId, Vec<PlannedItem>> = BTreeMap::new();
                for line in lines {
                    let site = candidates
                        .iter()
                        .copied()
                        .find(|site| covers(&catalog, *site, line))
                        .unwrap_or(requesting_site);
                    by_site
                        .entry(site)
                        .or_default()
                        .push(planned(&catalog, site, line));
                }
                FulfillmentPlan {
                    assignments: by_site
                        .into_iter()
                        .map(|(site_id, items)| PlanAssignment { site_id, items })
                        .collect(),
                }
            }
        };

        tracing::debug!(
            %requesting_site,
            ?strategy,
            sites = plan.assignments.len(),
            "fulfillment planned"
        );
        Ok(plan)
    }
}
