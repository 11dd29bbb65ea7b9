use std::collections::BTreeMap;

use super::Storage;
use crate::error::StateError;

/// In-memory storage implementation using BTreeMap. Pending writes are held
/// apart from committed data so a failed call can be rolled back without
/// touching shared keys, mirroring the host's per-transaction atomicity.
#[derive(Debug, Clone, Default)]
pub struct MemoryStorage {
    /// Committed data
    data: BTreeMap<Vec<u8>, Vec<u8>>,
    /// Pending writes (not yet committed)
    pending_writes: BTreeMap<Vec<u8>, Option<Vec<u8>>>,
}

impl MemoryStorage {
    pub fn new() -> Self {
        MemoryStorage {
            data: BTreeMap::new(),
            pending_writes: BTreeMap::new(),
        }
    }

    /// Get the number of committed keys
    pub fn len(&self) -> usize {
        self.data.len()
    }

    /// Check if storage is empty
    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }
}

impl Storage for MemoryStorage {
    fn get(&self, key: &[u8]) -> Result<Option<Vec<u8>>, StateError> {
        // Check pending writes first
        if let Some(pending) = self.pending_writes.get(key) {
            return Ok(pending.clone());
        }
        // Fall back to committed data
        Ok(self.data.get(key).cloned())
    }

    fn put(&mut self, key: &[u8], value: &[u8]) -> Result<(), StateError> {
        self.pending_writes
            .insert(key.to_vec(), Some(value.to_vec()));
        Ok(())
    }

    fn delete(&mut self, key: &[u8]) -> Result<(), StateError> {
        self.pending_writes.insert(key.to_vec(), None);
        Ok(())
    }

    fn commit(&mut self) -> Result<(), StateError> {
        let pending = std::mem::take(&mut self.pending_writes);
        for (key, value) in pending {
            match value {
                Some(v) => {
                    self.data.insert(key, v);
                }
                None => {
                    self.data.remove(&key);
                }
            }
        }
        Ok(())
    }

    fn rollback(&mut self) {
        self.pending_writes.clear();
    }
}
