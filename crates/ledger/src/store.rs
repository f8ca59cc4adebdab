use std::collections::HashSet;
use std::pin::Pin;
use std::sync::Arc;

use async_trait::async_trait;
use futures_core::Stream;

use crate::{LedgerEntry, LedgerError, LedgerQuery, Result, Sequence, StreamKey};

/// Options for appending entries to the ledger.
#[derive(Debug, Clone, Default)]
pub struct AppendOptions {
    /// Expected current sequence of the stream. `None` skips the check.
    pub expected_sequence: Option<Sequence>,
}

impl AppendOptions {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn expect_sequence(sequence: Sequence) -> Self {
        Self {
            expected_sequence: Some(sequence),
        }
    }

    /// Expects the stream to be empty.
    pub fn expect_new() -> Self {
        Self {
            expected_sequence: Some(Sequence::initial()),
        }
    }
}

/// Result of an append that did not fail.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AppendOutcome {
    /// The batch was written; carries the stream's new last sequence.
    Appended { last_sequence: Sequence },
    /// An idempotency key in the batch was already recorded; nothing was written.
    Duplicate { key: String },
}

impl AppendOutcome {
    pub fn is_duplicate(&self) -> bool {
        matches!(self, AppendOutcome::Duplicate { .. })
    }
}

/// A stream of ledger entries.
pub type EntryStream = Pin<Box<dyn Stream<Item = Result<LedgerEntry>> + Send>>;

/// Core trait for ledger implementations.
///
/// All implementations must be thread-safe (Send + Sync).
#[async_trait]
pub trait LedgerStore: Send + Sync {
    /// Appends a batch of entries to one stream.
    ///
    /// The batch is atomic: either every entry is written or none is. If any
    /// entry carries an idempotency key that is already recorded, the call
    /// returns [`AppendOutcome::Duplicate`] without writing. If
    /// `options.expected_sequence` is set and differs from the stream's
    /// current sequence, the call fails with `ConcurrencyConflict`.
    async fn append(&self, entries: Vec<LedgerEntry>, options: AppendOptions)
    -> Result<AppendOutcome>;

    /// Retrieves all entries of a stream in sequence order.
    async fn entries_for_stream(&self, stream: &StreamKey) -> Result<Vec<LedgerEntry>>;

    /// Retrieves entries of a stream starting at a sequence (inclusive).
    async fn entries_for_stream_from(
        &self,
        stream: &StreamKey,
        from: Sequence,
    ) -> Result<Vec<LedgerEntry>>;

    /// Retrieves entries matching a query, ordered by timestamp.
    async fn query(&self, query: LedgerQuery) -> Result<Vec<LedgerEntry>>;

    async fn entries_by_type(&self, entry_type: &str) -> Result<Vec<LedgerEntry>>;

    /// Streams every entry in insertion order.
    async fn stream_all(&self) -> Result<EntryStream>;

    /// Current sequence of a stream, or None if it has no entries.
    async fn stream_sequence(&self, stream: &StreamKey) -> Result<Option<Sequence>>;

    /// Looks up the entry recorded under an idempotency key.
    async fn find_by_key(&self, key: &str) -> Result<Option<LedgerEntry>>;
}

#[async_trait]
impl<T: LedgerStore + ?Sized> LedgerStore for Arc<T> {
    async fn append(
        &self,
        entries: Vec<LedgerEntry>,
        options: AppendOptions,
    ) -> Result<AppendOutcome> {
        (**self).append(entries, options).await
    }

    async fn entries_for_stream(&self, stream: &StreamKey) -> Result<Vec<LedgerEntry>> {
        (**self).entries_for_stream(stream).await
    }

    async fn entries_for_stream_from(
        &self,
        stream: &StreamKey,
        from: Sequence,
    ) -> Result<Vec<LedgerEntry>> {
        (**self).entries_for_stream_from(stream, from).await
    }

    async fn query(&self, query: LedgerQuery) -> Result<Vec<LedgerEntry>> {
        (**self).query(query).await
    }

    async fn entries_by_type(&self, entry_type: &str) -> Result<Vec<LedgerEntry>> {
        (**self).entries_by_type(entry_type).await
    }

    async fn stream_all(&self) -> Result<EntryStream> {
        (**self).stream_all().await
    }

    async fn stream_sequence(&self, stream: &StreamKey) -> Result<Option<Sequence>> {
        (**self).stream_sequence(stream).await
    }

    async fn find_by_key(&self, key: &str) -> Result<Option<LedgerEntry>> {
        (**self).find_by_key(key).await
    }
}

/// Convenience methods available on every ledger.
#[async_trait]
pub trait LedgerStoreExt: LedgerStore {
    /// Appends a single entry without a sequence check.
    async fn append_entry(&self, entry: LedgerEntry) -> Result<AppendOutcome> {
        self.append(vec![entry], AppendOptions::new()).await
    }

    async fn stream_exists(&self, stream: &StreamKey) -> Result<bool> {
        Ok(self.stream_sequence(stream).await?.is_some())
    }

    async fn has_key(&self, key: &str) -> Result<bool> {
        Ok(self.find_by_key(key).await?.is_some())
    }
}

impl<T: LedgerStore + ?Sized> LedgerStoreExt for T {}

/// Validates a batch before appending.
pub fn validate_entries_for_append(entries: &[LedgerEntry]) -> Result<()> {
    let Some(first) = entries.first() else {
        return Err(LedgerError::InvalidAppend(
            "cannot append empty entry list".to_string(),
        ));
    };

    if entries.iter().any(|e| e.stream != first.stream) {
        return Err(LedgerError::InvalidAppend(
            "all entries must belong to the same stream".to_string(),
        ));
    }

    let mut keys = HashSet::new();
    for key in entries.iter().filter_map(|e| e.idempotency_key.as_deref()) {
        if !keys.insert(key) {
            return Err(LedgerError::InvalidAppend(format!(
                "idempotency key {key} repeated within one batch"
            )));
        }
    }

    Ok(())
}
