use tracing::{debug, error, info};

use veridian_core::{Address, ConsensusSign, EpochInfo, EpochStatus, Hash, Peer};
use veridian_state::{EpochStore, StateError, Storage};

use crate::authority::check_authority;
use crate::context::CallContext;
use crate::error::GovernanceError;
use crate::events::{EventSink, GovernanceEvent};
use crate::notifier::{EpochChange, EpochChangeNotifier};
use crate::quorum::quorum_size;

/// Epoch id of the genesis validator set
pub const GENESIS_EPOCH_ID: u64 = 1;

/// A proposal's start height must lie at least this many blocks ahead
pub const MIN_EPOCH_VALID_PERIOD: u64 = 60;
/// Start height used when a proposal leaves it unspecified
pub const DEFAULT_EPOCH_VALID_PERIOD: u64 = 86_400;
/// A proposal's start height must lie at most this many blocks ahead
pub const MAX_EPOCH_VALID_PERIOD: u64 = 864_000;

/// Group size bounds; the minimum keeps the fault budget f >= 1
pub const MIN_PROPOSAL_PEERS: usize = 4;
pub const MAX_PROPOSAL_PEERS: usize = 100;

/// Distinct proposals a single validator may author per epoch id
pub const MAX_PROPOSALS_PER_EPOCH: u64 = 3;

/// Voting must finish this many blocks before the proposed start height so
/// the new validator set has time to restart consensus
pub const MIN_VOTE_EFFECTIVE_PERIOD: u64 = 10;

/// The validator-set transition state machine: orchestrates `propose`,
/// `vote`, and the read-only `epoch` / `epoch_proof` queries against the
/// epoch store, and hosts the generic consensus-signature gate.
pub struct EpochManager<S: Storage> {
    store: EpochStore<S>,
    events: Box<dyn EventSink>,
    notifier: EpochChangeNotifier,
}

impl<S: Storage> EpochManager<S> {
    pub fn new(store: EpochStore<S>, events: Box<dyn EventSink>) -> Self {
        EpochManager {
            store,
            events,
            notifier: EpochChangeNotifier::default(),
        }
    }

    /// Register for epoch-change announcements
    pub fn subscribe(&self) -> tokio::sync::broadcast::Receiver<EpochChange> {
        self.notifier.subscribe()
    }

    /// Read-only access to the underlying governance storage
    pub fn store(&self) -> &EpochStore<S> {
        &self.store
    }

    /// Commit pending storage writes (called by the dispatcher on success)
    pub fn commit(&mut self) -> Result<(), GovernanceError> {
        self.store.commit()?;
        Ok(())
    }

    /// Discard pending storage writes (called by the dispatcher on error)
    pub fn rollback(&mut self) {
        self.store.rollback();
    }

    /// Store the genesis validator set. Rejects a second initialization.
    pub fn init_genesis(&mut self, peers: Vec<Peer>, start_height: u64) -> Result<Hash, GovernanceError> {
        if self.store.current_epoch_hash()?.is_some() {
            return Err(GovernanceError::InvalidInput(
                "genesis epoch already initialized".to_string(),
            ));
        }
        check_peers(&peers)?;

        let epoch = EpochInfo::new(
            GENESIS_EPOCH_ID,
            peers,
            start_height,
            Address::ZERO,
            EpochStatus::Passed,
        );
        let hash = epoch.hash()?;

        self.store.put_epoch(&epoch)?;
        self.store.set_current_epoch_hash(&hash)?;
        self.store.set_epoch_proof(GENESIS_EPOCH_ID, &hash)?;

        info!(epoch_id = GENESIS_EPOCH_ID, %hash, members = epoch.member_count(), "genesis epoch stored");
        Ok(hash)
    }

    /// The active epoch, or `EpochNotFound` before genesis
    pub fn current_epoch(&self) -> Result<EpochInfo, GovernanceError> {
        let hash = self
            .store
            .current_epoch_hash()?
            .ok_or(GovernanceError::EpochNotFound)?;
        match self.store.epoch(&hash)? {
            Some(epoch) => Ok(epoch),
            None => {
                error!(%hash, "current epoch pointer has no backing record");
                Err(StateError::Corrupt("current epoch record missing".to_string()).into())
            }
        }
    }

    /// Propose a candidate validator set for the next epoch. Returns the
    /// proposal hash; the proposer's own vote is recorded immediately.
    pub fn propose(
        &mut self,
        ctx: &CallContext,
        peers: Vec<Peer>,
        start_height: u64,
    ) -> Result<Hash, GovernanceError> {
        let cur = self.current_epoch()?;
        check_authority(ctx.tx_origin, ctx.caller, &cur)?;
        let proposer = ctx.tx_origin;

        check_peers(&peers)?;

        // continuity guard: the candidate set must retain a quorum of the
        // current membership, or an out-of-band majority could take over
        let need = quorum_size(cur.member_count());
        let have = cur.old_member_count(&peers);
        if have < need {
            return Err(GovernanceError::InsufficientOldMemberOverlap { have, need });
        }

        let start_height = if start_height > 0 {
            let earliest = ctx.block_height + MIN_EPOCH_VALID_PERIOD;
            let latest = ctx.block_height + MAX_EPOCH_VALID_PERIOD;
            if start_height < earliest || start_height > latest {
                return Err(GovernanceError::InvalidProposalWindow {
                    got: start_height,
                    earliest,
                    latest,
                });
            }
            start_height
        } else {
            ctx.block_height + DEFAULT_EPOCH_VALID_PERIOD
        };

        let epoch = EpochInfo::new(
            cur.id + 1,
            peers,
            start_height,
            proposer,
            EpochStatus::Proposed,
        );
        let proposal = epoch.hash()?;

        if self.store.proposal_exists(epoch.id, &proposal)? {
            return Err(GovernanceError::DuplicateProposal(proposal));
        }
        let authored = self.store.proposer_count(epoch.id, &proposer)?;
        if authored >= MAX_PROPOSALS_PER_EPOCH {
            return Err(GovernanceError::ProposalRateExceeded {
                proposer,
                count: authored,
            });
        }

        self.store.put_epoch(&epoch)?;
        self.store.add_proposal(epoch.id, &proposal)?;
        self.store.increment_proposer_count(epoch.id, &proposer)?;

        // the proposer votes for its own proposal
        self.store.add_vote(&proposal, &proposer)?;
        self.store.set_vote_to(epoch.id, &proposer, &proposal)?;

        self.events
            .emit(&GovernanceEvent::Proposed {
                epoch_id: epoch.id,
                proposal,
                proposer,
                start_height,
            })
            .map_err(|e| GovernanceError::EventEmission(e.to_string()))?;

        debug!(epoch_id = epoch.id, %proposal, %proposer, "proposal stored");
        Ok(proposal)
    }

    /// Vote for a proposal. The vote that makes the tally exactly equal the
    /// quorum size transitions the validator set: the proposal is marked
    /// passed, the current-epoch pointer and proof are updated, sibling
    /// proposals are purged, and the epoch change is published.
    pub fn vote(
        &mut self,
        ctx: &CallContext,
        epoch_id: u64,
        proposal: Hash,
    ) -> Result<(), GovernanceError> {
        let cur = self.current_epoch()?;
        check_authority(ctx.tx_origin, ctx.caller, &cur)?;
        let voter = ctx.tx_origin;

        if epoch_id != cur.id + 1 {
            // a winner already exists for the current id; re-voting it is an
            // idempotent success, anything else for that id is settled
            if epoch_id == cur.id {
                if proposal == cur.hash()? {
                    return Ok(());
                }
                return Err(GovernanceError::ProposalAlreadyPassed(epoch_id));
            }
            return Err(GovernanceError::InvalidInput(format!(
                "can only vote on epoch {}, got {}",
                cur.id + 1,
                epoch_id
            )));
        }

        if !self.store.proposal_exists(epoch_id, &proposal)? {
            return Err(GovernanceError::ProposalNotFound(proposal));
        }
        let mut epoch = match self.store.epoch(&proposal)? {
            Some(epoch) => epoch,
            None => {
                error!(%proposal, "indexed proposal has no backing record");
                return Err(
                    StateError::Corrupt("indexed proposal record missing".to_string()).into(),
                );
            }
        };
        if epoch.status == EpochStatus::Passed {
            return Err(GovernanceError::ProposalAlreadyPassed(epoch_id));
        }
        if epoch.id != epoch_id || epoch.hash()? != proposal {
            return Err(GovernanceError::InvalidEpochReference(proposal));
        }

        // the new set needs lead time to restart before taking over
        if ctx.block_height + MIN_VOTE_EFFECTIVE_PERIOD >= epoch.start_height {
            return Err(GovernanceError::VoteWindowClosed {
                height: ctx.block_height,
                start_height: epoch.start_height,
            });
        }

        let quorum = quorum_size(cur.member_count());
        if self.store.vote_count(&proposal)? >= quorum {
            debug!(%proposal, "already at quorum, vote ignored");
            return Ok(());
        }

        // duplicate vote is a no-op; a switched vote unwinds the old one
        if let Some(previous) = self.store.vote_to(epoch_id, &voter)? {
            if previous == proposal {
                debug!(%proposal, %voter, "duplicate vote");
                return Ok(());
            }
            self.store.clear_vote_to(epoch_id, &voter)?;
            self.store.remove_vote(&previous, &voter)?;
        }

        self.store.set_vote_to(epoch_id, &voter, &proposal)?;
        self.store.add_vote(&proposal, &voter)?;
        let votes = self.store.vote_count(&proposal)?;

        self.events
            .emit(&GovernanceEvent::Voted {
                epoch_id,
                proposal,
                votes,
                group_size: cur.member_count(),
            })
            .map_err(|e| GovernanceError::EventEmission(e.to_string()))?;
        debug!(epoch_id, %proposal, %voter, votes, quorum, "vote stored");

        // transition edge: fire exactly once, on the vote that reaches quorum
        if votes == quorum {
            epoch.status = EpochStatus::Passed;
            self.store.put_epoch(&epoch)?;
            self.store.set_current_epoch_hash(&proposal)?;
            self.store.set_epoch_proof(epoch.id, &proposal)?;

            self.events
                .emit(&GovernanceEvent::EpochChanged {
                    epoch_id: epoch.id,
                    proposal,
                    start_height: epoch.start_height,
                })
                .map_err(|e| GovernanceError::EventEmission(e.to_string()))?;

            self.dirty_job(&cur, &epoch)?;

            self.notifier.notify(EpochChange {
                epoch_id: epoch.id,
                start_height: epoch.start_height,
                members: epoch.members(),
                hash: proposal,
            });
            info!(epoch_id = epoch.id, %proposal, start_height = epoch.start_height, "proposal passed, epoch changed");
        }

        Ok(())
    }

    /// Post-transition cleanup: purge sibling proposals, their votes, and
    /// stale vote pointers for the settled epoch id, bounding storage to the
    /// active validator set.
    fn dirty_job(
        &mut self,
        outgoing: &EpochInfo,
        winner: &EpochInfo,
    ) -> Result<(), GovernanceError> {
        let winner_hash = winner.hash()?;
        for hash in self.store.proposals(winner.id)? {
            if hash == winner_hash {
                continue;
            }
            self.store.delete_epoch(&hash)?;
            self.store.remove_proposal(winner.id, &hash)?;
            self.store.clear_votes(&hash)?;
        }
        // pointers are cleared for outgoing members only; a new peer that
        // voted nowhere cannot have one, but one introduced solely by a
        // losing sibling keeps a stale pointer for this id
        for member in outgoing.members() {
            self.store.clear_vote_to(winner.id, &member)?;
        }
        Ok(())
    }

    /// The current `EpochInfo` (read-only operation)
    pub fn epoch(&self) -> Result<EpochInfo, GovernanceError> {
        self.current_epoch()
    }

    /// The stored approval hash for the current epoch id (read-only)
    pub fn epoch_proof(&self) -> Result<Hash, GovernanceError> {
        let cur = self.current_epoch()?;
        self.store
            .epoch_proof(cur.id)?
            .ok_or(GovernanceError::EpochProofNotFound)
    }

    /// Generic N-of-M approval gate. Records `signer`'s approval of the
    /// (method, input) pair and returns whether the signer set has reached
    /// quorum. The first submission establishes the canonical record at its
    /// content hash; a stored record that no longer matches its key is
    /// tampering and is rejected.
    pub fn check_consensus_signs(
        &mut self,
        ctx: &CallContext,
        method: &str,
        input: &[u8],
        signer: Address,
    ) -> Result<bool, GovernanceError> {
        let cur = self.current_epoch()?;
        check_authority(signer, ctx.caller, &cur)?;

        let sign = ConsensusSign::new(method, input.to_vec());
        let sign_hash = sign.hash()?;

        match self.store.sign(&sign_hash)? {
            None => self.store.put_sign(&sign)?,
            Some(existing) => {
                if existing.hash()? != sign_hash {
                    error!(%sign_hash, "stored sign record does not match its key");
                    return Err(GovernanceError::SignRecordConflict(sign_hash));
                }
            }
        }

        if self.store.has_signer(&sign_hash, &signer)? {
            return Err(GovernanceError::DuplicateSigner(signer));
        }

        let quorum = quorum_size(cur.member_count());
        if self.store.signer_count(&sign_hash)? >= quorum {
            // already decided; don't store redundant approvals
            return Ok(true);
        }

        self.store.add_signer(&sign_hash, &signer)?;
        let signatures = self.store.signer_count(&sign_hash)?;

        self.events
            .emit(&GovernanceEvent::ConsensusSigned {
                method: method.to_string(),
                sign_hash,
                signer,
                signatures,
            })
            .map_err(|e| GovernanceError::EventEmission(e.to_string()))?;
        debug!(method, %sign_hash, %signer, signatures, quorum, "consensus sign stored");

        Ok(signatures >= quorum)
    }

    /// The stored consensus-sign record at `hash`
    pub fn sign_record(&self, hash: &Hash) -> Result<ConsensusSign, GovernanceError> {
        self.store
            .sign(hash)?
            .ok_or(GovernanceError::SignNotFound(*hash))
    }
}

/// Validate a candidate peer set: size bounds and key/address derivation
fn check_peers(peers: &[Peer]) -> Result<(), GovernanceError> {
    if peers.is_empty() {
        return Err(GovernanceError::InvalidPeerSet(
            "peer list is empty".to_string(),
        ));
    }
    if peers.len() < MIN_PROPOSAL_PEERS || peers.len() > MAX_PROPOSAL_PEERS {
        return Err(GovernanceError::InvalidPeerSet(format!(
            "peer count {} outside [{}, {}]",
            peers.len(),
            MIN_PROPOSAL_PEERS,
            MAX_PROPOSAL_PEERS
        )));
    }
    for peer in peers {
        peer.check()
            .map_err(|e| GovernanceError::InvalidPeerSet(e.to_string()))?;
    }
    Ok(())
}
