//! Completed chain steps grouped by originating order.

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use common::{JobId, OrderRef};
use domain::JobCompletion;
use ledger::LedgerEntry;
use tokio::sync::RwLock;

use crate::Result;
use crate::projection::{Projection, ProjectionPosition};
use crate::read_model::ReadModel;

struct ChainHistoryState {
    chains: HashMap<OrderRef, Vec<JobCompletion>>,
    /// Completed jobs with no order reference.
    standalone: Vec<JobCompletion>,
    position: ProjectionPosition,
}

#[derive(Clone)]
pub struct ChainHistoryView {
    state: Arc<RwLock<ChainHistoryState>>,
}

impl ChainHistoryView {
    pub fn new() -> Self {
        Self {
            state: Arc::new(RwLock::new(ChainHistoryState {
                chains: HashMap::new(),
                standalone: Vec::new(),
                position: ProjectionPosition::zero(),
            })),
        }
    }

    /// Completed steps for an order, in completion order.
    pub async fn chain(&self, order_ref: &OrderRef) -> Vec<JobCompletion> {
        self.state
            .read()
            .await
            .chains
            .get(order_ref)
            .cloned()
            .unwrap_or_default()
    }

    pub async fn last_step(&self, order_ref: &OrderRef) -> Option<JobCompletion> {
        self.state
            .read()
            .await
            .chains
            .get(order_ref)
            .and_then(|steps| steps.last().cloned())
    }

    /// Successor created when `job_id` completed, if any.
    pub async fn successor_of(&self, job_id: JobId) -> Option<JobId> {
        let state = self.state.read().await;
        state
            .chains
            .values()
            .flatten()
            .chain(state.standalone.iter())
            .find(|step| step.job_id == job_id)
            .and_then(|step| step.successor)
    }

    pub async fn standalone_count(&self) -> usize {
        self.state.read().await.standalone.len()
    }
}

impl Default for ChainHistoryView {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl Projection for ChainHistoryView {
    fn name(&self) -> &'static str {
        "ChainHistoryView"
    }

    async fn handle(&self, entry: &LedgerEntry) -> Result<()> {
        let completion = if entry.entry_type == JobCompletion::ENTRY_TYPE {
            Some(entry.decode::<JobCompletion>()?)
        } else {
            None
        };

        let mut state = self.state.write().await;
        if let Some(step) = completion {
            match step.order_ref {
                Some(order_ref) => state.chains.entry(order_ref).or_default().push(step),
                None => state.standalone.push(step),
            }
        }
        state.position = state.position.advance();
        Ok(())
    }

    async fn position(&self) -> ProjectionPosition {
        self.state.read().await.position
    }

    async fn reset(&self) -> Result<()> {
        let mut state = self.state.write().await;
        state.chains.clear();
        state.standalone.clear();
        state.position = ProjectionPosition::zero();
        Ok(())
    }
}

impl ReadModel for ChainHistoryView {
    fn name(&self) -> &'static str {
        "ChainHistoryView"
    }

    fn count(&self) -> usize {
        self.state.try_read().map(|s| s.chains.len()).unwrap_or(0)
    }
}
