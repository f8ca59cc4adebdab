use std::collections::HashMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize, de::DeserializeOwned};
use uuid::Uuid;

use crate::LedgerError;

/// Unique identifier for a ledger entry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct EntryId(Uuid);

impl EntryId {
    /// Creates a new random entry ID.
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }

    /// Returns the underlying UUID.
    pub fn as_uuid(&self) -> Uuid {
        self.0
    }
}

impl Default for EntryId {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Display for EntryId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Position of an entry within its stream.
///
/// The store assigns sequences on append: the first entry of a stream gets 1
/// and every following entry increments by one.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default, Serialize, Deserialize,
)]
#[serde(transparent)]
pub struct Sequence(i64);

impl Sequence {
    pub fn new(value: i64) -> Self {
        Self(value)
    }

    /// The sequence of a stream with no entries.
    pub fn initial() -> Self {
        Self(0)
    }

    pub fn first() -> Self {
        Self(1)
    }

    pub fn next(&self) -> Self {
        Self(self.0 + 1)
    }

    pub fn as_i64(&self) -> i64 {
        self.0
    }
}

impl std::fmt::Display for Sequence {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Name of a ledger stream, formatted as `<kind>:<id>`.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct StreamKey(String);

impl StreamKey {
    /// Builds a stream key from a kind and an identifier.
    pub fn new(kind: &str, id: impl std::fmt::Display) -> Self {
        Self(format!("{kind}:{id}"))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// The part before the first `:`.
    pub fn kind(&self) -> &str {
        self.0.split(':').next().unwrap_or_default()
    }
}

impl std::fmt::Display for StreamKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

/// A single immutable record in the ledger.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LedgerEntry {
    pub entry_id: EntryId,

    /// The type of the record (e.g. "JobCompleted", "StockAdjusted").
    pub entry_type: String,

    pub stream: StreamKey,

    /// Assigned by the store when the entry is appended.
    pub sequence: Sequence,

    /// At most one entry in the whole ledger carries a given key.
    pub idempotency_key: Option<String>,

    pub timestamp: DateTime<Utc>,

    pub payload: serde_json::Value,

    pub metadata: HashMap<String, serde_json::Value>,
}

impl LedgerEntry {
    /// Creates a new entry builder.
    pub fn builder() -> LedgerEntryBuilder {
        LedgerEntryBuilder::default()
    }

    /// Deserializes the payload into a typed record.
    pub fn decode<T: DeserializeOwned>(&self) -> Result<T, serde_json::Error> {
        serde_json::from_value(self.payload.clone())
    }
}

/// Builder for constructing ledger entries.
#[derive(Debug, Default)]
pub struct LedgerEntryBuilder {
    entry_id: Option<EntryId>,
    entry_type: Option<String>,
    stream: Option<StreamKey>,
    idempotency_key: Option<String>,
    timestamp: Option<DateTime<Utc>>,
    payload: Option<serde_json::Value>,
    metadata: HashMap<String, serde_json::Value>,
}

impl LedgerEntryBuilder {
    /// Sets the entry ID. If not set, a new ID will be generated.
    pub fn entry_id(mut self, id: EntryId) -> Self {
        self.entry_id = Some(id);
        self
    }

    pub fn entry_type(mut self, entry_type: impl Into<String>) -> Self {
        self.entry_type = Some(entry_type.into());
        self
    }

    pub fn stream(mut self, stream: StreamKey) -> Self {
        self.stream = Some(stream);
        self
    }

    pub fn idempotency_key(mut self, key: impl Into<String>) -> Self {
        self.idempotency_key = Some(key.into());
        self
    }

    /// Sets the timestamp. If not set, the current time will be used.
    pub fn timestamp(mut self, timestamp: DateTime<Utc>) -> Self {
        self.timestamp = Some(timestamp);
        self
    }

    /// Sets the payload from a serializable value.
    pub fn payload<T: Serialize>(mut self, payload: &T) -> Result<Self, serde_json::Error> {
        self.payload = Some(serde_json::to_value(payload)?);
        Ok(self)
    }

    pub fn payload_raw(mut self, payload: serde_json::Value) -> Self {
        self.payload = Some(payload);
        self
    }

    pub fn metadata(mut self, key: impl Into<String>, value: serde_json::Value) -> Self {
        self.metadata.insert(key.into(), value);
        self
    }

    /// Builds the entry. `entry_type`, `stream` and `payload` are required.
    pub fn build(self) -> Result<LedgerEntry, LedgerError> {
        Ok(LedgerEntry {
            entry_id: self.entry_id.unwrap_or_default(),
            entry_type: self.entry_type.ok_or(LedgerError::MissingField("entry_type"))?,
            stream: self.stream.ok_or(LedgerError::MissingField("stream"))?,
            sequence: Sequence::initial(),
            idempotency_key: self.idempotency_key,
            timestamp: self.timestamp.unwrap_or_else(Utc::now),
            payload: self.payload.ok_or(LedgerError::MissingField("payload"))?,
            metadata: self.metadata,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn sequence_ordering() {
        assert!(Sequence::new(1) < Sequence::new(2));
        assert_eq!(Sequence::initial().next(), Sequence::first());
        assert_eq!(Sequence::first().as_i64(), 1);
    }

    #[test]
    fn stream_key_kind() {
        let key = StreamKey::new("job", "1234");
        assert_eq!(key.as_str(), "job:1234");
        assert_eq!(key.kind(), "job");
    }

    #[test]
    fn builder_sets_fields() {
        let entry = LedgerEntry::builder()
            .entry_type("JobCompleted")
            .stream(StreamKey::new("job", "a"))
            .idempotency_key("chain:a")
            .payload_raw(serde_json::json!({"job": "a"}))
            .metadata("actor", serde_json::json!("u-1"))
            .build()
            .unwrap();

        assert_eq!(entry.entry_type, "JobCompleted");
        assert_eq!(entry.stream.as_str(), "job:a");
        assert_eq!(entry.idempotency_key.as_deref(), Some("chain:a"));
        assert_eq!(entry.sequence, Sequence::initial());
        assert_eq!(entry.metadata.get("actor"), Some(&serde_json::json!("u-1")));
    }

    #[test]
    fn builder_reports_missing_field() {
        let result = LedgerEntry::builder().entry_type("X").build();
        assert!(matches!(result, Err(LedgerError::MissingField("stream"))));
    }

    #[test]
    fn decode_typed_payload() {
        #[derive(Debug, PartialEq, Serialize, Deserialize)]
        struct Marker {
            qty: u32,
        }

        let entry = LedgerEntry::builder()
            .entry_type("Marker")
            .stream(StreamKey::new("test", 1))
            .payload(&Marker { qty: 4 })
            .unwrap()
            .build()
            .unwrap();

        assert_eq!(entry.decode::<Marker>().unwrap(), Marker { qty: 4 });
    }
}
