use serde::{Deserialize, Serialize};

use crate::crypto::{Address, PublicKey};
use crate::error::CoreError;

/// A validator peer: a 20-byte account address and the public key it claims
/// to be derived from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Peer {
    pub address: Address,
    pub public_key: PublicKey,
}

impl Peer {
    pub fn new(address: Address, public_key: PublicKey) -> Self {
        Peer {
            address,
            public_key,
        }
    }

    /// Build a peer with the address derived from the public key
    pub fn from_public_key(public_key: PublicKey) -> Self {
        Peer {
            address: Address::from_public_key(&public_key),
            public_key,
        }
    }

    /// Check that the public key is a valid ed25519 point and derives the
    /// claimed address. Peers failing this are rejected at proposal time.
    pub fn check(&self) -> Result<(), CoreError> {
        self.public_key.to_verifying_key()?;
        let derived = Address::from_public_key(&self.public_key);
        if derived != self.address {
            return Err(CoreError::AddressMismatch(self.address.to_hex()));
        }
        Ok(())
    }
}

/// Sort peers into the canonical order used for epoch hashing: ascending by
/// address bytes.
pub fn sort_peers(peers: &mut [Peer]) {
    peers.sort_by(|a, b| a.address.cmp(&b.address));
}
