//! Append-only ledger used as the engine's durable record log.
//!
//! Entries are grouped into streams (`job:<id>`, `product:<id>`, `worker:<id>`, ...)
//! and carry an optional idempotency key. Appending a batch whose key is already
//! present is reported as [`AppendOutcome::Duplicate`] and writes nothing, which is
//! how at-least-once callers turn re-delivery into a no-op.

pub mod entry;
pub mod error;
pub mod memory;
pub mod query;
pub mod store;

pub use entry::{EntryId, LedgerEntry, LedgerEntryBuilder, Sequence, StreamKey};
pub use error::{LedgerError, Result};
pub use memory::InMemoryLedger;
pub use query::LedgerQuery;
pub use store::{AppendOptions, AppendOutcome, EntryStream, LedgerStore, LedgerStoreExt};
