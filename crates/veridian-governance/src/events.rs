use thiserror::Error;
use tracing::debug;

use veridian_core::{Address, Hash};

/// Observability events written to the host's event log
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum GovernanceEvent {
    Proposed {
        epoch_id: u64,
        proposal: Hash,
        proposer: Address,
        start_height: u64,
    },
    Voted {
        epoch_id: u64,
        proposal: Hash,
        votes: usize,
        group_size: usize,
    },
    EpochChanged {
        epoch_id: u64,
        proposal: Hash,
        start_height: u64,
    },
    ConsensusSigned {
        method: String,
        sign_hash: Hash,
        signer: Address,
        signatures: usize,
    },
}

#[derive(Debug, Error)]
#[error("{0}")]
pub struct EmitError(pub String);

/// Event-log emission facility supplied by the host
pub trait EventSink: Send + Sync {
    fn emit(&self, event: &GovernanceEvent) -> Result<(), EmitError>;
}

/// Default sink that writes events to the tracing log
#[derive(Debug, Default)]
pub struct TracingEventSink;

impl EventSink for TracingEventSink {
    fn emit(&self, event: &GovernanceEvent) -> Result<(), EmitError> {
        debug!(?event, "governance event");
        Ok(())
    }
}
