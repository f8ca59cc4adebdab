//! Core projection trait and position tracking.

use async_trait::async_trait;
use ledger::LedgerEntry;

use crate::Result;

/// Tracks how many ledger entries a projection has seen.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ProjectionPosition {
    /// Number of entries processed, including ones the projection ignored.
    pub entries_processed: u64,
}

impl ProjectionPosition {
    /// Creates a new position at zero.
    pub fn zero() -> Self {
        Self {
            entries_processed: 0,
        }
    }

    /// Advances the position by one entry.
    pub fn advance(&self) -> Self {
        Self {
            entries_processed: self.entries_processed + 1,
        }
    }
}

impl std::fmt::Display for ProjectionPosition {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "position({})", self.entries_processed)
    }
}

/// A projection that folds ledger entries into a read model.
///
/// Every entry must advance the position, even when the projection has no
/// interest in its type, so catch-up can skip what was already seen.
#[async_trait]
pub trait Projection: Send + Sync {
    /// Returns the name of this projection.
    fn name(&self) -> &'static str;

    /// Handles a single entry, updating the projection's read model.
    async fn handle(&self, entry: &LedgerEntry) -> Result<()>;

    /// Returns the current position of this projection.
    async fn position(&self) -> ProjectionPosition;

    /// Resets the projection to its initial state.
    async fn reset(&self) -> Result<()>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn position_starts_at_zero() {
        let pos = ProjectionPosition::zero();
        assert_eq!(pos.entries_processed, 0);
    }

    #[test]
    fn position_advances() {
        let pos = ProjectionPosition::zero().advance().advance();
        assert_eq!(pos.entries_processed, 2);
    }

    #[test]
    fn position_display() {
        let pos = ProjectionPosition {
            entries_processed: 42,
        };
        assert_eq!(pos.to_string(), "position(42)");
    }
}
