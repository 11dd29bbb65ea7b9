use serde::de::DeserializeOwned;
use serde::Serialize;

use veridian_core::{serialize, Address, ConsensusSign, EpochInfo, Hash};

use crate::error::StateError;
use crate::storage::Storage;

/// Key prefixes for governance storage
mod keys {
    pub const EPOCH: &[u8] = b"epoch:";
    pub const CURRENT: &[u8] = b"epoch:current";
    pub const PROOF: &[u8] = b"proof:";
    pub const PROPOSALS: &[u8] = b"prop:";
    pub const PROPOSER_COUNT: &[u8] = b"propn:";
    pub const VOTES: &[u8] = b"vote:";
    pub const VOTE_TO: &[u8] = b"voteto:";
    pub const SIGN: &[u8] = b"sign:";
    pub const SIGNERS: &[u8] = b"signer:";
}

/// Persistent governance storage: epochs, the proposal index, vote sets,
/// vote pointers, proposer counters, and consensus-sign records. Provides
/// read/write/delete primitives only; no business logic.
pub struct EpochStore<S: Storage> {
    storage: S,
}

impl<S: Storage> EpochStore<S> {
    pub fn new(storage: S) -> Self {
        EpochStore { storage }
    }

    /// Commit pending writes (host transaction boundary)
    pub fn commit(&mut self) -> Result<(), StateError> {
        self.storage.commit()
    }

    /// Discard pending writes
    pub fn rollback(&mut self) {
        self.storage.rollback();
    }

    // Epoch records, keyed by content hash

    pub fn epoch(&self, hash: &Hash) -> Result<Option<EpochInfo>, StateError> {
        self.get_typed(&epoch_key(hash))
    }

    pub fn put_epoch(&mut self, epoch: &EpochInfo) -> Result<(), StateError> {
        let hash = epoch.hash()?;
        self.put_typed(&epoch_key(&hash), epoch)
    }

    pub fn delete_epoch(&mut self, hash: &Hash) -> Result<(), StateError> {
        self.storage.delete(&epoch_key(hash))
    }

    // Current epoch pointer and per-id approval proof

    pub fn current_epoch_hash(&self) -> Result<Option<Hash>, StateError> {
        self.get_typed(keys::CURRENT)
    }

    pub fn set_current_epoch_hash(&mut self, hash: &Hash) -> Result<(), StateError> {
        self.put_typed(keys::CURRENT, hash)
    }

    pub fn epoch_proof(&self, epoch_id: u64) -> Result<Option<Hash>, StateError> {
        self.get_typed(&proof_key(epoch_id))
    }

    pub fn set_epoch_proof(&mut self, epoch_id: u64, hash: &Hash) -> Result<(), StateError> {
        self.put_typed(&proof_key(epoch_id), hash)
    }

    // Proposal index: epoch id -> list of proposal hashes

    pub fn proposals(&self, epoch_id: u64) -> Result<Vec<Hash>, StateError> {
        Ok(self.get_typed(&proposals_key(epoch_id))?.unwrap_or_default())
    }

    pub fn proposal_exists(&self, epoch_id: u64, hash: &Hash) -> Result<bool, StateError> {
        Ok(self.proposals(epoch_id)?.contains(hash))
    }

    pub fn add_proposal(&mut self, epoch_id: u64, hash: &Hash) -> Result<(), StateError> {
        let mut list = self.proposals(epoch_id)?;
        if !list.contains(hash) {
            list.push(*hash);
        }
        self.put_typed(&proposals_key(epoch_id), &list)
    }

    pub fn remove_proposal(&mut self, epoch_id: u64, hash: &Hash) -> Result<(), StateError> {
        let mut list = self.proposals(epoch_id)?;
        list.retain(|h| h != hash);
        if list.is_empty() {
            self.storage.delete(&proposals_key(epoch_id))
        } else {
            self.put_typed(&proposals_key(epoch_id), &list)
        }
    }

    // Per-proposer proposal counters (anti-spam)

    pub fn proposer_count(&self, epoch_id: u64, proposer: &Address) -> Result<u64, StateError> {
        Ok(self
            .get_typed(&proposer_count_key(epoch_id, proposer))?
            .unwrap_or(0))
    }

    pub fn increment_proposer_count(
        &mut self,
        epoch_id: u64,
        proposer: &Address,
    ) -> Result<(), StateError> {
        let count = self.proposer_count(epoch_id, proposer)? + 1;
        self.put_typed(&proposer_count_key(epoch_id, proposer), &count)
    }

    // Vote sets: proposal hash -> voter addresses

    pub fn votes(&self, proposal: &Hash) -> Result<Vec<Address>, StateError> {
        Ok(self.get_typed(&votes_key(proposal))?.unwrap_or_default())
    }

    pub fn vote_count(&self, proposal: &Hash) -> Result<usize, StateError> {
        Ok(self.votes(proposal)?.len())
    }

    pub fn add_vote(&mut self, proposal: &Hash, voter: &Address) -> Result<(), StateError> {
        let mut voters = self.votes(proposal)?;
        if !voters.contains(voter) {
            voters.push(*voter);
        }
        self.put_typed(&votes_key(proposal), &voters)
    }

    pub fn remove_vote(&mut self, proposal: &Hash, voter: &Address) -> Result<(), StateError> {
        let mut voters = self.votes(proposal)?;
        voters.retain(|v| v != voter);
        if voters.is_empty() {
            self.storage.delete(&votes_key(proposal))
        } else {
            self.put_typed(&votes_key(proposal), &voters)
        }
    }

    pub fn clear_votes(&mut self, proposal: &Hash) -> Result<(), StateError> {
        self.storage.delete(&votes_key(proposal))
    }

    // Vote pointers: (epoch id, voter) -> last voted proposal hash

    pub fn vote_to(&self, epoch_id: u64, voter: &Address) -> Result<Option<Hash>, StateError> {
        self.get_typed(&vote_to_key(epoch_id, voter))
    }

    pub fn set_vote_to(
        &mut self,
        epoch_id: u64,
        voter: &Address,
        proposal: &Hash,
    ) -> Result<(), StateError> {
        self.put_typed(&vote_to_key(epoch_id, voter), proposal)
    }

    pub fn clear_vote_to(&mut self, epoch_id: u64, voter: &Address) -> Result<(), StateError> {
        self.storage.delete(&vote_to_key(epoch_id, voter))
    }

    // Consensus-sign records and signer sets, keyed by content hash

    pub fn sign(&self, hash: &Hash) -> Result<Option<ConsensusSign>, StateError> {
        self.get_typed(&sign_key(hash))
    }

    pub fn put_sign(&mut self, sign: &ConsensusSign) -> Result<(), StateError> {
        let hash = sign.hash()?;
        self.put_typed(&sign_key(&hash), sign)
    }

    pub fn signers(&self, hash: &Hash) -> Result<Vec<Address>, StateError> {
        Ok(self.get_typed(&signers_key(hash))?.unwrap_or_default())
    }

    pub fn signer_count(&self, hash: &Hash) -> Result<usize, StateError> {
        Ok(self.signers(hash)?.len())
    }

    pub fn has_signer(&self, hash: &Hash, signer: &Address) -> Result<bool, StateError> {
        Ok(self.signers(hash)?.contains(signer))
    }

    pub fn add_signer(&mut self, hash: &Hash, signer: &Address) -> Result<(), StateError> {
        let mut signers = self.signers(hash)?;
        if !signers.contains(signer) {
            signers.push(*signer);
        }
        self.put_typed(&signers_key(hash), &signers)
    }

    // Typed get/put over the raw byte store

    fn get_typed<T: DeserializeOwned>(&self, key: &[u8]) -> Result<Option<T>, StateError> {
        match self.storage.get(key)? {
            None => Ok(None),
            Some(bytes) => {
                let value = serialize::from_bytes(&bytes)
                    .map_err(|e| StateError::Serialization(e.to_string()))?;
                Ok(Some(value))
            }
        }
    }

    fn put_typed<T: Serialize>(&mut self, key: &[u8], value: &T) -> Result<(), StateError> {
        let bytes =
            serialize::to_bytes(value).map_err(|e| StateError::Serialization(e.to_string()))?;
        self.storage.put(key, &bytes)
    }
}

fn epoch_key(hash: &Hash) -> Vec<u8> {
    [keys::EPOCH, hash.as_bytes()].concat()
}

fn proof_key(epoch_id: u64) -> Vec<u8> {
    [keys::PROOF, epoch_id.to_le_bytes().as_slice()].concat()
}

fn proposals_key(epoch_id: u64) -> Vec<u8> {
    [keys::PROPOSALS, epoch_id.to_le_bytes().as_slice()].concat()
}

fn proposer_count_key(epoch_id: u64, proposer: &Address) -> Vec<u8> {
    [
        keys::PROPOSER_COUNT,
        epoch_id.to_le_bytes().as_slice(),
        proposer.as_bytes(),
    ]
    .concat()
}

fn votes_key(proposal: &Hash) -> Vec<u8> {
    [keys::VOTES, proposal.as_bytes()].concat()
}

fn vote_to_key(epoch_id: u64, voter: &Address) -> Vec<u8> {
    [
        keys::VOTE_TO,
        epoch_id.to_le_bytes().as_slice(),
        voter.as_bytes(),
    ]
    .concat()
}

fn sign_key(hash: &Hash) -> Vec<u8> {
    [keys::SIGN, hash.as_bytes()].concat()
}

fn signers_key(hash: &Hash) -> Vec<u8> {
    [keys::SIGNERS, hash.as_bytes()].concat()
}
