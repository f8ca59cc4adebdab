//! Named heuristics used when creating and scheduling jobs.

use common::{JobId, OrderRef};

use super::JobType;

/// Where received goods wait before putaway.
pub const RECEIVING_DOCK: &str = "Receiving Dock";
pub const PACKING_STATION: &str = "Packing Station 1";
pub const DISPATCH_BAY: &str = "Dispatch Bay";

/// Estimated minutes of work for a job with `item_count` line items.
pub fn estimate_duration_minutes(job_type: JobType, item_count: usize) -> u32 {
    let items = u32::try_from(item_count).unwrap_or(u32::MAX);
    match job_type {
        JobType::Pick => items.saturating_mul(3).max(15),
        JobType::Pack => items.saturating_mul(2).max(10),
        JobType::Putaway => items.saturating_mul(4).max(20),
        JobType::Dispatch | JobType::Transfer => 15,
    }
}

/// Default work location for a new job of the given type.
pub fn default_location(job_type: JobType) -> Option<&'static str> {
    match job_type {
        JobType::Putaway => Some(RECEIVING_DOCK),
        JobType::Pack => Some(PACKING_STATION),
        JobType::Dispatch => Some(DISPATCH_BAY),
        JobType::Pick | JobType::Transfer => None,
    }
}

/// Human-facing job number: `<prefix>-<order code>` or `<prefix>-<job code>`.
pub fn job_number(job_type: JobType, order_ref: Option<&OrderRef>, job_id: JobId) -> String {
    let code = match order_ref {
        Some(order) => order.short_code(),
        None => job_id.as_uuid().simple().to_string()[..8].to_ascii_uppercase(),
    };
    format!("{}-{}", job_type.prefix(), code)
}
