pub mod memory;

use crate::error::StateError;

/// Contract-scoped key-value store supplied by the host. Reads are
/// tri-state: a missing key is `Ok(None)`, distinct from a real storage
/// failure.
pub trait Storage: Send + Sync {
    /// Get a value by key
    fn get(&self, key: &[u8]) -> Result<Option<Vec<u8>>, StateError>;

    /// Put a key-value pair
    fn put(&mut self, key: &[u8], value: &[u8]) -> Result<(), StateError>;

    /// Delete a key
    fn delete(&mut self, key: &[u8]) -> Result<(), StateError>;

    /// Commit pending changes
    fn commit(&mut self) -> Result<(), StateError>;

    /// Rollback pending changes
    fn rollback(&mut self);

    /// Check if a key exists
    fn exists(&self, key: &[u8]) -> Result<bool, StateError> {
        Ok(self.get(key)?.is_some())
    }
}

pub use memory::MemoryStorage;
