//! Points balances rebuilt from the transaction journal.

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use domain::{PointsAccount, PointsBalance, PointsTransaction, TransactionKind};
use ledger::LedgerEntry;
use tokio::sync::RwLock;

use crate::Result;
use crate::projection::{Projection, ProjectionPosition};
use crate::read_model::ReadModel;

/// Folded state of one points account.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct AccountSummary {
    pub balance: PointsBalance,
    pub transactions: u64,
    pub points_by_kind: HashMap<TransactionKind, u64>,
}

struct PointsBalanceState {
    accounts: HashMap<PointsAccount, AccountSummary>,
    position: ProjectionPosition,
}

/// Folds `PointsAwarded` entries into per-account balances.
///
/// Applying each award at its recorded time reproduces the same period
/// rollovers as the running totals, so the two can be compared directly.
#[derive(Clone)]
pub struct PointsBalanceView {
    state: Arc<RwLock<PointsBalanceState>>,
}

impl PointsBalanceView {
    pub fn new() -> Self {
        Self {
            state: Arc::new(RwLock::new(PointsBalanceState {
                accounts: HashMap::new(),
                position: ProjectionPosition::zero(),
            })),
        }
    }

    pub async fn get(&self, account: &PointsAccount) -> Option<AccountSummary> {
        self.state.read().await.accounts.get(account).cloned()
    }

    pub async fn balance(&self, account: &PointsAccount) -> PointsBalance {
        self.get(account)
            .await
            .map(|summary| summary.balance)
            .unwrap_or_default()
    }

    /// Worker accounts ordered by total points, highest first.
    pub async fn worker_leaderboard(&self, limit: usize) -> Vec<(PointsAccount, u64)> {
        let state = self.state.read().await;
        let mut workers: Vec<_> = state
            .accounts
            .iter()
            .filter(|(account, _)| matches!(account, PointsAccount::Worker(_)))
            .map(|(account, summary)| (*account, summary.balance.total_points))
            .collect();
        workers.sort_by(|a, b| b.1.cmp(&a.1));
        workers.truncate(limit);
        workers
    }
}

impl Default for PointsBalanceView {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl Projection for PointsBalanceView {
    fn name(&self) -> &'static str {
        "PointsBalanceView"
    }

    async fn handle(&self, entry: &LedgerEntry) -> Result<()> {
        let transaction = if entry.entry_type == PointsTransaction::ENTRY_TYPE {
            Some(entry.decode::<PointsTransaction>()?)
        } else {
            None
        };

        let mut state = self.state.write().await;
        if let Some(tx) = transaction {
            let summary = state.accounts.entry(tx.account).or_default();
            summary.balance.award(tx.points, tx.at);
            summary.transactions += 1;
            *summary.points_by_kind.entry(tx.kind).or_default() += tx.points;
        }
        state.position = state.position.advance();
        Ok(())
    }

    async fn position(&self) -> ProjectionPosition {
        self.state.read().await.position
    }

    async fn reset(&self) -> Result<()> {
        let mut state = self.state.write().await;
        state.accounts.clear();
        state.position = ProjectionPosition::zero();
        Ok(())
    }
}

impl ReadModel for PointsBalanceView {
    fn name(&self) -> &'static str {
        "PointsBalanceView"
    }

    fn count(&self) -> usize {
        self.state.try_read().map(|s| s.accounts.len()).unwrap_or(0)
    }
}

#[cfg(test)]
mod tests {
    use chrono::{TimeZone, Utc};
    use common::{EmployeeId, SiteId};
    use ledger::StreamKey;

    use super::*;

    fn award_entry(tx: &PointsTransaction) -> LedgerEntry {
        LedgerEntry::builder()
            .entry_type(PointsTransaction::ENTRY_TYPE)
            .stream(StreamKey::new(tx.account.stream_kind(), tx.account.id_string()))
            .payload(tx)
            .unwrap()
            .build()
            .unwrap()
    }

    #[tokio::test]
    async fn folds_awards_per_account() {
        let view = PointsBalanceView::new();
        let worker = PointsAccount::Worker(EmployeeId::new());
        let site = SiteId::new();
        let day1 = Utc.with_ymd_and_hms(2024, 5, 6, 9, 0, 0).unwrap();
        let day2 = Utc.with_ymd_and_hms(2024, 5, 7, 9, 0, 0).unwrap();

        for (points, kind, at) in [
            (23, TransactionKind::JobCompletion, day1),
            (25, TransactionKind::StreakBonus, day1),
            (10, TransactionKind::JobCompletion, day2),
        ] {
            let tx = PointsTransaction::new(worker, site, points, kind, "award", at);
            view.handle(&award_entry(&tx)).await.unwrap();
        }

        let summary = view.get(&worker).await.unwrap();
        assert_eq!(summary.balance.total_points, 58);
        assert_eq!(summary.balance.today_points, 10);
        assert_eq!(summary.transactions, 3);
        assert_eq!(summary.points_by_kind[&TransactionKind::StreakBonus], 25);
        assert_eq!(view.position().await.entries_processed, 3);
    }

    #[tokio::test]
    async fn ignores_other_entry_types_but_advances() {
        let view = PointsBalanceView::new();
        let entry = LedgerEntry::builder()
            .entry_type("StockAdjusted")
            .stream(StreamKey::new("product", "p"))
            .payload_raw(serde_json::json!({}))
            .build()
            .unwrap();
        view.handle(&entry).await.unwrap();
        assert_eq!(view.position().await.entries_processed, 1);
        assert_eq!(ReadModel::count(&view), 0);
    }

    #[tokio::test]
    async fn leaderboard_excludes_stores() {
        let view = PointsBalanceView::new();
        let site = SiteId::new();
        let a = PointsAccount::Worker(EmployeeId::new());
        let b = PointsAccount::Worker(EmployeeId::new());
        let store = PointsAccount::Store(site);
        let now = Utc::now();
        for (account, points) in [(a, 10), (b, 40), (store, 500)] {
            let tx = PointsTransaction::new(account, site, points, TransactionKind::Sale, "", now);
            view.handle(&award_entry(&tx)).await.unwrap();
        }

        let board = view.worker_leaderboard(5).await;
        assert_eq!(board, vec![(b, 40), (a, 10)]);
    }
}
