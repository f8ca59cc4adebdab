//! Feeds ledger entries to registered projections.

use futures_util::StreamExt;
use ledger::{LedgerEntry, LedgerStore};

use crate::Result;
use crate::projection::Projection;

/// What one catch-up pass did.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CatchUp {
    /// Entries read from the ledger.
    pub scanned: u64,
    /// Entries that passed the stream filter.
    pub fed: u64,
    /// Handler calls made across all projections.
    pub delivered: u64,
}

/// Folds the ledger into projections.
///
/// A processor may be narrowed to some stream kinds (`worker`, `job`, ...).
/// Positions then count entries of the narrowed feed, so one processor
/// must always be built with the same filter for a given set of views.
pub struct ProjectionProcessor<S: LedgerStore> {
    store: S,
    stream_kinds: Vec<&'static str>,
    projections: Vec<Box<dyn Projection>>,
}

impl<S: LedgerStore> ProjectionProcessor<S> {
    pub fn new(store: S) -> Self {
        Self {
            store,
            stream_kinds: Vec::new(),
            projections: Vec::new(),
        }
    }

    /// Only feeds entries whose stream kind is listed.
    pub fn only_streams(mut self, kinds: &[&'static str]) -> Self {
        self.stream_kinds = kinds.to_vec();
        self
    }

    pub fn register(&mut self, projection: Box<dyn Projection>) {
        self.projections.push(projection);
    }

    pub fn projection_count(&self) -> usize {
        self.projections.len()
    }

    fn wants(&self, entry: &LedgerEntry) -> bool {
        self.stream_kinds.is_empty() || self.stream_kinds.contains(&entry.stream.kind())
    }

    /// Streams the ledger in insertion order and hands each entry to every
    /// projection whose position is behind it.
    #[tracing::instrument(skip(self))]
    pub async fn run_catch_up(&self) -> Result<CatchUp> {
        let mut stream = self.store.stream_all().await?;
        let mut report = CatchUp::default();

        while let Some(result) = stream.next().await {
            let entry = result?;
            report.scanned += 1;
            if !self.wants(&entry) {
                continue;
            }
            report.fed += 1;

            for projection in &self.projections {
                if projection.position().await.entries_processed < report.fed {
                    projection.handle(&entry).await?;
                    report.delivered += 1;
                    metrics::counter!(
                        "projections_entries_processed",
                        "projection" => projection.name()
                    )
                    .increment(1);
                }
            }
        }

        tracing::info!(
            scanned = report.scanned,
            fed = report.fed,
            delivered = report.delivered,
            "catch-up complete"
        );
        Ok(report)
    }

    /// Hands one newly appended entry to every projection. Returns false
    /// when the stream filter drops it.
    #[tracing::instrument(
        skip(self, entry),
        fields(entry_type = %entry.entry_type, stream = %entry.stream)
    )]
    pub async fn process_entry(&self, entry: &LedgerEntry) -> Result<bool> {
        if !self.wants(entry) {
            return Ok(false);
        }
        for projection in &self.projections {
            projection.handle(entry).await?;
        }
        Ok(true)
    }

    /// Resets every projection and replays the ledger.
    #[tracing::instrument(skip(self))]
    pub async fn rebuild_all(&self) -> Result<CatchUp> {
        for projection in &self.projections {
            tracing::debug!(projection = projection.name(), "resetting");
            projection.reset().await?;
        }
        self.run_catch_up().await
    }
}
