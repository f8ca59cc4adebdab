use chrono::{DateTime, Utc};

use crate::{LedgerEntry, Sequence, StreamKey};

/// Builder for filtering ledger entries.
///
/// Every set field narrows the result; unset fields match everything.
#[derive(Debug, Clone, Default)]
pub struct LedgerQuery {
    pub stream: Option<StreamKey>,

    /// Filter by stream kind (the `<kind>` part of `<kind>:<id>`).
    pub stream_kind: Option<String>,

    /// Filter by entry types (any of these types).
    pub entry_types: Option<Vec<String>>,

    /// Minimum sequence (inclusive).
    pub from_sequence: Option<Sequence>,

    /// Maximum sequence (inclusive).
    pub to_sequence: Option<Sequence>,

    pub from_timestamp: Option<DateTime<Utc>>,

    pub to_timestamp: Option<DateTime<Utc>>,

    pub limit: Option<usize>,

    pub offset: Option<usize>,
}

impl LedgerQuery {
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates a query for a single stream.
    pub fn for_stream(stream: StreamKey) -> Self {
        Self {
            stream: Some(stream),
            ..Default::default()
        }
    }

    /// Creates a query for entries of a specific type.
    pub fn for_entry_type(entry_type: impl Into<String>) -> Self {
        Self {
            entry_types: Some(vec![entry_type.into()]),
            ..Default::default()
        }
    }

    pub fn stream(mut self, stream: StreamKey) -> Self {
        self.stream = Some(stream);
        self
    }

    pub fn stream_kind(mut self, kind: impl Into<String>) -> Self {
        self.stream_kind = Some(kind.into());
        self
    }

    pub fn entry_type(mut self, entry_type: impl Into<String>) -> Self {
        self.entry_types = Some(vec![entry_type.into()]);
        self
    }

    pub fn entry_types(mut self, entry_types: Vec<String>) -> Self {
        self.entry_types = Some(entry_types);
        self
    }

    pub fn from_sequence(mut self, sequence: Sequence) -> Self {
        self.from_sequence = Some(sequence);
        self
    }

    pub fn to_sequence(mut self, sequence: Sequence) -> Self {
        self.to_sequence = Some(sequence);
        self
    }

    pub fn from_timestamp(mut self, timestamp: DateTime<Utc>) -> Self {
        self.from_timestamp = Some(timestamp);
        self
    }

    pub fn to_timestamp(mut self, timestamp: DateTime<Utc>) -> Self {
        self.to_timestamp = Some(timestamp);
        self
    }

    pub fn limit(mut self, limit: usize) -> Self {
        self.limit = Some(limit);
        self
    }

    pub fn offset(mut self, offset: usize) -> Self {
        self.offset = Some(offset);
        self
    }

    /// Returns true if the entry passes every filter (limit/offset aside).
    pub fn matches(&self, entry: &LedgerEntry) -> bool {
        if let Some(ref stream) = self.stream
            && &entry.stream != stream
        {
            return false;
        }
        if let Some(ref kind) = self.stream_kind
            && entry.stream.kind() != kind
        {
            return false;
        }
        if let Some(ref types) = self.entry_types
            && !types.contains(&entry.entry_type)
        {
            return false;
        }
        if let Some(from) = self.from_sequence
            && entry.sequence < from
        {
            return false;
        }
        if let Some(to) = self.to_sequence
            && entry.sequence > to
        {
            return false;
        }
        if let Some(from) = self.from_timestamp
            && entry.timestamp < from
        {
            return false;
        }
        if let Some(to) = self.to_timestamp
            && entry.timestamp > to
        {
            return false;
        }
        true
    }
}
