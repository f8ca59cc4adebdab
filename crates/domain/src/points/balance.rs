//! Running point totals with calendar period rollover.

use chrono::{DateTime, Datelike, Utc};
use common::{EmployeeId, SiteId};
use serde::{Deserialize, Serialize};

use super::tiers::{BonusTier, estimated_bonus, find_tier, level_for};
use crate::money::Money;

/// Point counters shared by worker and store ledgers.
///
/// `total_points` only grows. The period counters are zeroed lazily, on the
/// first award that lands in a new day, ISO week or month.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PointsBalance {
    pub total_points: u64,
    pub today_points: u64,
    pub weekly_points: u64,
    pub monthly_points: u64,
    pub last_updated: Option<DateTime<Utc>>,
}

impl PointsBalance {
    pub fn award(&mut self, points: u64, now: DateTime<Utc>) {
        self.roll_periods(now);
        self.total_points += points;
        self.today_points += points;
        self.weekly_points += points;
        self.monthly_points += points;
        self.last_updated = Some(now);
    }

    fn roll_periods(&mut self, now: DateTime<Utc>) {
        let Some(last) = self.last_updated else {
            return;
        };
        if last.date_naive() != now.date_naive() {
            self.today_points = 0;
        }
        let (last_week, this_week) = (last.iso_week(), now.iso_week());
        if (last_week.year(), last_week.week()) != (this_week.year(), this_week.week()) {
            self.weekly_points = 0;
        }
        if (last.year(), last.month()) != (now.year(), now.month()) {
            self.monthly_points = 0;
        }
    }
}

/// Individual ledger for a warehouse worker.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct WorkerPoints {
    pub employee_id: EmployeeId,
    pub site_id: SiteId,
    #[serde(flatten)]
    pub balance: PointsBalance,
    pub total_jobs_completed: u64,
    pub total_items_picked: u64,
    pub current_streak: u32,
    pub longest_streak: u32,
    pub last_job_completed_at: Option<DateTime<Utc>>,
    pub level: u8,
    pub level_title: String,
    pub current_bonus_tier: Option<String>,
    pub estimated_bonus: Money,
}

impl WorkerPoints {
    pub fn new(employee_id: EmployeeId, site_id: SiteId) -> Self {
        let level = level_for(0);
        Self {
            employee_id,
            site_id,
            balance: PointsBalance::default(),
            total_jobs_completed: 0,
            total_items_picked: 0,
            current_streak: 0,
            longest_streak: 0,
            last_job_completed_at: None,
            level: level.level,
            level_title: level.title.to_string(),
            current_bonus_tier: None,
            estimated_bonus: Money::zero(),
        }
    }

    /// Counts a completed job and advances the daily streak.
    ///
    /// Returns the new streak length when it grew, `None` when the worker
    /// already completed a job earlier the same day.
    pub fn record_job(&mut self, items_picked: u32, at: DateTime<Utc>) -> Option<u32> {
        self.total_jobs_completed += 1;
        self.total_items_picked += u64::from(items_picked);

        let today = at.date_naive();
        let previous = self.last_job_completed_at.map(|t| t.date_naive());
        self.last_job_completed_at = Some(at);

        let streak = match previous {
            Some(day) if day == today && self.current_streak > 0 => return None,
            Some(day) if today.pred_opt() == Some(day) => self.current_streak + 1,
            _ => 1,
        };
        self.current_streak = streak;
        self.longest_streak = self.longest_streak.max(streak);
        Some(streak)
    }

    /// Recomputes level, tier and estimated bonus from the current totals.
    pub fn refresh_standing(&mut self, tiers: &[BonusTier]) {
        let level = level_for(self.balance.total_points);
        self.level = level.level;
        self.level_title = level.title.to_string();

        let monthly = self.balance.monthly_points;
        let tier = find_tier(tiers, monthly);
        self.current_bonus_tier = tier.map(|t| t.name.clone());
        self.estimated_bonus = tier.map_or(Money::zero(), |t| estimated_bonus(t, monthly));
    }
}

/// Team ledger for a store.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StorePoints {
    pub site_id: SiteId,
    #[serde(flatten)]
    pub balance: PointsBalance,
    pub total_transactions: u64,
    pub total_revenue: Money,
    pub average_ticket_size: Money,
    pub current_bonus_tier: Option<String>,
    pub estimated_bonus: Money,
}

impl StorePoints {
    pub fn new(site_id: SiteId) -> Self {
        Self {
            site_id,
            balance: PointsBalance::default(),
            total_transactions: 0,
            total_revenue: Money::zero(),
            average_ticket_size: Money::zero(),
            current_bonus_tier: None,
            estimated_bonus: Money::zero(),
        }
    }

    pub fn record_sale(&mut self, subtotal: Money) {
        self.total_transactions += 1;
        self.total_revenue += subtotal;
        self.average_ticket_size = self.total_revenue.divide(self.total_transactions);
    }

    pub fn refresh_standing(&mut self, tiers: &[BonusTier]) {
        let monthly = self.balance.monthly_points;
        let tier = find_tier(tiers, monthly);
        self.current_bonus_tier = tier.map(|t| t.name.clone());
        self.estimated_bonus = tier.map_or(Money::zero(), |t| estimated_bonus(t, monthly));
    }
}
