use thiserror::Error;

use veridian_core::{Address, CoreError, Hash};
use veridian_state::StateError;

/// Call-boundary errors. None of these leaves partial effects behind: the
/// enclosing transaction's pending writes are rolled back by the dispatcher.
#[derive(Debug, Error)]
pub enum GovernanceError {
    #[error("Epoch not found")]
    EpochNotFound,

    #[error("Epoch proof not found")]
    EpochProofNotFound,

    #[error("Invalid authority: {0}")]
    InvalidAuthority(Address),

    #[error("Invalid input: {0}")]
    InvalidInput(String),

    #[error("Invalid peer set: {0}")]
    InvalidPeerSet(String),

    #[error("Insufficient old member overlap: have {have}, need {need}")]
    InsufficientOldMemberOverlap { have: usize, need: usize },

    #[error("Proposal start height {got} outside [{earliest}, {latest}]")]
    InvalidProposalWindow {
        got: u64,
        earliest: u64,
        latest: u64,
    },

    #[error("Duplicate proposal: {0}")]
    DuplicateProposal(Hash),

    #[error("Proposal rate exceeded: {proposer} already authored {count} proposals")]
    ProposalRateExceeded { proposer: Address, count: u64 },

    #[error("Proposal not found: {0}")]
    ProposalNotFound(Hash),

    #[error("Proposal already passed for epoch {0}")]
    ProposalAlreadyPassed(u64),

    #[error("Invalid epoch reference: {0}")]
    InvalidEpochReference(Hash),

    #[error("Vote window closed: start height {start_height}, now {height}")]
    VoteWindowClosed { height: u64, start_height: u64 },

    #[error("Storage failure: {0}")]
    Storage(#[from] StateError),

    #[error("Event emission failed: {0}")]
    EventEmission(String),

    #[error("Sign record conflict at {0}")]
    SignRecordConflict(Hash),

    #[error("Sign record not found: {0}")]
    SignNotFound(Hash),

    #[error("Duplicate signer: {0}")]
    DuplicateSigner(Address),
}

impl From<CoreError> for GovernanceError {
    fn from(err: CoreError) -> Self {
        GovernanceError::Storage(StateError::Core(err))
    }
}
