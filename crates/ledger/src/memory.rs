use std::collections::HashMap;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use async_trait::async_trait;
use tokio::sync::RwLock;

use crate::{
    LedgerEntry, LedgerError, LedgerQuery, Result, Sequence, StreamKey,
    store::{AppendOptions, AppendOutcome, EntryStream, LedgerStore, validate_entries_for_append},
};

#[derive(Default)]
struct LedgerState {
    entries: Vec<LedgerEntry>,
    /// Idempotency key -> index into `entries`.
    keys: HashMap<String, usize>,
    sequences: HashMap<StreamKey, Sequence>,
}

/// In-memory ledger.
///
/// Clones share the same underlying log. `set_fail_on_append` makes every
/// subsequent append fail with `Unavailable`, for exercising persistence
/// failure paths.
#[derive(Clone, Default)]
pub struct InMemoryLedger {
    state: Arc<RwLock<LedgerState>>,
    fail_on_append: Arc<AtomicBool>,
}

impl InMemoryLedger {
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns the total number of entries stored.
    pub async fn entry_count(&self) -> usize {
        self.state.read().await.entries.len()
    }

    pub async fn clear(&self) {
        let mut state = self.state.write().await;
        state.entries.clear();
        state.keys.clear();
        state.sequences.clear();
    }

    pub fn set_fail_on_append(&self, fail: bool) {
        self.fail_on_append.store(fail, Ordering::SeqCst);
    }
}

#[async_trait]
impl LedgerStore for InMemoryLedger {
    async fn append(
        &self,
        entries: Vec<LedgerEntry>,
        options: AppendOptions,
    ) -> Result<AppendOutcome> {
        validate_entries_for_append(&entries)?;

        if self.fail_on_append.load(Ordering::SeqCst) {
            metrics::counter!("ledger_append_failures_total").increment(1);
            return Err(LedgerError::Unavailable(
                "append rejected by backing store".to_string(),
            ));
        }

        let mut state = self.state.write().await;

        if let Some(key) = entries
            .iter()
            .filter_map(|e| e.idempotency_key.as_deref())
            .find(|key| state.keys.contains_key(*key))
        {
            tracing::debug!(%key, "duplicate idempotency key, append skipped");
            return Ok(AppendOutcome::Duplicate {
                key: key.to_string(),
            });
        }

        let stream = entries[0].stream.clone();
        let current = state
            .sequences
            .get(&stream)
            .copied()
            .unwrap_or(Sequence::initial());

        if let Some(expected) = options.expected_sequence
            && current != expected
        {
            return Err(LedgerError::ConcurrencyConflict {
                stream,
                expected,
                actual: current,
            });
        }

        let mut sequence = current;
        for mut entry in entries {
            sequence = sequence.next();
            entry.sequence = sequence;
            let index = state.entries.len();
            if let Some(key) = entry.idempotency_key.clone() {
                state.keys.insert(key, index);
            }
            state.entries.push(entry);
        }
        state.sequences.insert(stream, sequence);

        metrics::counter!("ledger_entries_appended_total").increment(1);
        Ok(AppendOutcome::Appended {
            last_sequence: sequence,
        })
    }

    async fn entries_for_stream(&self, stream: &StreamKey) -> Result<Vec<LedgerEntry>> {
        let state = self.state.read().await;
        let mut entries: Vec<_> = state
            .entries
            .iter()
            .filter(|e| &e.stream == stream)
            .cloned()
            .collect();
        entries.sort_by_key(|e| e.sequence);
        Ok(entries)
    }

    async fn entries_for_stream_from(
        &self,
        stream: &StreamKey,
        from: Sequence,
    ) -> Result<Vec<LedgerEntry>> {
        let state = self.state.read().await;
        let mut entries: Vec<_> = state
            .entries
            .iter()
            .filter(|e| &e.stream == stream && e.sequence >= from)
            .cloned()
            .collect();
        entries.sort_by_key(|e| e.sequence);
        Ok(entries)
    }

    async fn query(&self, query: LedgerQuery) -> Result<Vec<LedgerEntry>> {
        let state = self.state.read().await;
        let mut entries: Vec<_> = state
            .entries
            .iter()
            .filter(|e| query.matches(e))
            .cloned()
            .collect();

        // Stable sort keeps insertion order for equal timestamps.
        entries.sort_by(|a, b| a.timestamp.cmp(&b.timestamp));

        let offset = query.offset.unwrap_or(0);
        let entries = entries
            .into_iter()
            .skip(offset)
            .take(query.limit.unwrap_or(usize::MAX))
            .collect();

        Ok(entries)
    }

    async fn entries_by_type(&self, entry_type: &str) -> Result<Vec<LedgerEntry>> {
        let state = self.state.read().await;
        Ok(state
            .entries
            .iter()
            .filter(|e| e.entry_type == entry_type)
            .cloned()
            .collect())
    }

    async fn stream_all(&self) -> Result<EntryStream> {
        use futures_util::stream;

        let entries = self.state.read().await.entries.clone();
        Ok(Box::pin(stream::iter(entries.into_iter().map(Ok))))
    }

    async fn stream_sequence(&self, stream: &StreamKey) -> Result<Option<Sequence>> {
        Ok(self.state.read().await.sequences.get(stream).copied())
    }

    async fn find_by_key(&self, key: &str) -> Result<Option<LedgerEntry>> {
        let state = self.state.read().await;
        Ok(state
            .keys
            .get(key)
            .and_then(|index| state.entries.get(*index))
            .cloned())
    }
}
