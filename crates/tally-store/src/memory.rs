use std::collections::BTreeMap;
use std::sync::{Mutex, MutexGuard};

use crate::{CounterStore, StoreError};

/// In-process counter store.
///
/// Compare-and-set happens under one lock, so publishes are linearizable.
/// Sharing one `Arc<MemoryStore>` between several engines gives each engine
/// the view a separate process would have of a shared record.
#[derive(Debug, Default)]
pub struct MemoryStore {
    records: Mutex<BTreeMap<String, u64>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Current value of `key`, `None` if absent. Bypasses the trait so tests
    /// can inspect the record without going through an engine.
    pub fn get(&self, key: &str) -> Option<u64> {
        self.lock().get(key).copied()
    }

    /// Unconditionally overwrite `key` (an external writer or operator reset).
    pub fn set(&self, key: &str, value: u64) {
        self.lock().insert(key.to_string(), value);
    }

    /// Drop `key` entirely (record lost).
    pub fn remove(&self, key: &str) {
        self.lock().remove(key);
    }

    fn lock(&self) -> MutexGuard<'_, BTreeMap<String, u64>> {
        // A panic while holding the lock cannot leave a half-written u64.
        self.records.lock().unwrap_or_else(|e| e.into_inner())
    }
}

#[async_trait::async_trait]
impl CounterStore for MemoryStore {
    fn backend_name(&self) -> &'static str {
        "memory"
    }

    async fn read(&self, key: &str) -> Result<u64, StoreError> {
        Ok(self.get(key).unwrap_or(0))
    }

    async fn publish_if_unchanged(
        &self,
        key: &str,
        expected: u64,
        new_value: u64,
    ) -> Result<(), StoreError> {
        let mut records = self.lock();
        let current = records.get(key).copied().unwrap_or(0);
        if current != expected {
            return Err(StoreError::conflict(key, expected));
        }
        records.insert(key.to_string(), new_value);
        Ok(())
    }
}
