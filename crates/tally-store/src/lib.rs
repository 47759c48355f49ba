//! tally-store
//!
//! The shared counter record as seen by one process: a key-addressed store
//! with a plain read and a conditional publish that commits only if the
//! record is unchanged since it was read (optimistic concurrency control).
//!
//! Backends:
//! - [`MemoryStore`]   — in-process map; several engines sharing one
//!   `Arc<MemoryStore>` behave like several peer processes.
//! - [`FileStore`]     — single-node persistence in one text file.
//! - [`PostgresStore`] — `tally_counters` table, row-locked compare-and-set.
//!
//! The reconcile engine only ever talks to the [`CounterStore`] trait.

mod error;
mod file;
mod memory;
mod postgres;
pub mod record;

pub use error::StoreError;
pub use file::FileStore;
pub use memory::MemoryStore;
pub use postgres::{connect, migrate, PostgresStore, ENV_DB_URL};

/// Well-known key holding the global total when none is configured.
pub const DEFAULT_COUNTER_KEY: &str = "TALLY_COUNTER";

/// Key-value store holding the agreed global total.
///
/// Implementations must guarantee that `publish_if_unchanged` commits only
/// if the record still equals `expected` at commit time, and leaves the
/// record untouched otherwise. An absent record equals `0`.
#[async_trait::async_trait]
pub trait CounterStore: Send + Sync {
    /// Short backend label for logs and status responses.
    fn backend_name(&self) -> &'static str;

    /// Current value of `key`, or `0` if the key is absent.
    async fn read(&self, key: &str) -> Result<u64, StoreError>;

    /// Commit `new_value` only if `key` still holds `expected`.
    async fn publish_if_unchanged(
        &self,
        key: &str,
        expected: u64,
        new_value: u64,
    ) -> Result<(), StoreError>;
}

#[async_trait::async_trait]
impl<S: CounterStore + ?Sized> CounterStore for std::sync::Arc<S> {
    fn backend_name(&self) -> &'static str {
        (**self).backend_name()
    }

    async fn read(&self, key: &str) -> Result<u64, StoreError> {
        (**self).read(key).await
    }

    async fn publish_if_unchanged(
        &self,
        key: &str,
        expected: u64,
        new_value: u64,
    ) -> Result<(), StoreError> {
        (**self).publish_if_unchanged(key, expected, new_value).await
    }
}
