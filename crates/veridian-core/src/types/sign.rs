use serde::{Deserialize, Serialize};

use crate::crypto::{hash_blake3, Hash};
use crate::error::CoreError;
use crate::serialize;

/// A pending multi-validator approval of an arbitrary (method, payload)
/// pair. Identity is the content hash; the first submission establishes the
/// canonical record at that hash.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConsensusSign {
    pub method: String,
    pub input: Vec<u8>,
}

impl ConsensusSign {
    pub fn new(method: impl Into<String>, input: Vec<u8>) -> Self {
        ConsensusSign {
            method: method.into(),
            input,
        }
    }

    /// Content hash over method and input
    pub fn hash(&self) -> Result<Hash, CoreError> {
        let bytes = serialize::to_bytes(self)?;
        Ok(hash_blake3(&bytes))
    }
}
