use serde::{Deserialize, Serialize};

use crate::crypto::{hash_blake3, Address, Hash};
use crate::error::CoreError;
use crate::serialize;
use crate::types::peer::{sort_peers, Peer};

/// Lifecycle of an epoch proposal
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum EpochStatus {
    /// Candidate next-epoch definition, open for votes
    Proposed,
    /// Reached quorum; at most one per epoch id
    Passed,
}

/// A numbered era with a fixed validator set, active from its start height
/// until superseded.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EpochInfo {
    pub id: u64,
    /// Members in canonical order (ascending by address)
    pub peers: Vec<Peer>,
    pub start_height: u64,
    pub proposer: Address,
    pub status: EpochStatus,
}

impl EpochInfo {
    /// Build an epoch, sorting the peers into canonical order
    pub fn new(
        id: u64,
        mut peers: Vec<Peer>,
        start_height: u64,
        proposer: Address,
        status: EpochStatus,
    ) -> Self {
        sort_peers(&mut peers);
        EpochInfo {
            id,
            peers,
            start_height,
            proposer,
            status,
        }
    }

    /// Deterministic content hash; both the proposal's identity and its
    /// storage key. The status field is excluded so the hash survives the
    /// Proposed -> Passed transition.
    pub fn hash(&self) -> Result<Hash, CoreError> {
        let bytes =
            serialize::to_bytes(&(self.id, &self.peers, self.start_height, &self.proposer))?;
        Ok(hash_blake3(&bytes))
    }

    /// Member addresses in canonical order
    pub fn members(&self) -> Vec<Address> {
        self.peers.iter().map(|p| p.address).collect()
    }

    pub fn member_count(&self) -> usize {
        self.peers.len()
    }

    pub fn is_member(&self, address: &Address) -> bool {
        self.peers.iter().any(|p| p.address == *address)
    }

    /// Number of candidate peers that are already members of this epoch,
    /// counted by address
    pub fn old_member_count(&self, candidates: &[Peer]) -> usize {
        candidates
            .iter()
            .filter(|p| self.is_member(&p.address))
            .count()
    }
}
