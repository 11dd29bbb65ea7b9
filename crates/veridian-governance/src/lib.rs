//! Veridian Governance - Validator-set transitions and Byzantine quorum
//!
//! The epoch proposal/voting state machine (`EpochManager`), the generic
//! consensus-signature gate (`check_consensus_signs`), and the fixed-enum
//! contract dispatcher exposing them. Every operation is a deterministic
//! state transition over the contract's key-value storage; "now" is always
//! block height.

pub mod authority;
pub mod context;
pub mod contract;
pub mod error;
pub mod events;
pub mod manager;
pub mod notifier;
pub mod quorum;

pub use authority::check_authority;
pub use context::CallContext;
pub use contract::{CallOutput, CostSchedule, NodeManagerContract, Operation, CONTRACT_NAME};
pub use error::GovernanceError;
pub use events::{EmitError, EventSink, GovernanceEvent, TracingEventSink};
pub use manager::{
    EpochManager, DEFAULT_EPOCH_VALID_PERIOD, GENESIS_EPOCH_ID, MAX_EPOCH_VALID_PERIOD,
    MAX_PROPOSALS_PER_EPOCH, MAX_PROPOSAL_PEERS, MIN_EPOCH_VALID_PERIOD, MIN_PROPOSAL_PEERS,
    MIN_VOTE_EFFECTIVE_PERIOD,
};
pub use notifier::{EpochChange, EpochChangeNotifier};
pub use quorum::quorum_size;
