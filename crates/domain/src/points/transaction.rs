use chrono::{DateTime, Utc};
use common::{EmployeeId, SiteId, TransactionId};
use serde::{Deserialize, Serialize};

/// Which ledger a transaction belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(tag = "ledger", content = "id", rename_all = "snake_case")]
pub enum PointsAccount {
    Worker(EmployeeId),
    Store(SiteId),
}

impl PointsAccount {
    /// Ledger stream kind the account's journal lives under.
    pub fn stream_kind(&self) -> &'static str {
        match self {
            PointsAccount::Worker(_) => "worker",
            PointsAccount::Store(_) => "store",
        }
    }

    pub fn id_string(&self) -> String {
        match self {
            PointsAccount::Worker(id) => id.to_string(),
            PointsAccount::Store(id) => id.to_string(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TransactionKind {
    JobCompletion,
    StreakBonus,
    Sale,
}

/// Immutable record of one award.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PointsTransaction {
    pub id: TransactionId,
    pub account: PointsAccount,
    pub site_id: SiteId,
    pub points: u64,
    pub kind: TransactionKind,
    pub description: String,
    /// Job, sale or streak day the award was made for.
    pub reference: Option<String>,
    pub at: DateTime<Utc>,
}

impl PointsTransaction {
    pub const ENTRY_TYPE: &'static str = "PointsAwarded";

    pub fn new(
        account: PointsAccount,
        site_id: SiteId,
        points: u64,
        kind: TransactionKind,
        description: impl Into<String>,
        at: DateTime<Utc>,
    ) -> Self {
        Self {
            id: TransactionId::new(),
            account,
            site_id,
            points,
            kind,
            description: description.into(),
            reference: None,
            at,
        }
    }

    pub fn with_reference(mut self, reference: impl Into<String>) -> Self {
        self.reference = Some(reference.into());
        self
    }
}
