use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use veridian_core::{serialize, EpochInfo, Hash, Peer};
use veridian_state::Storage;

use crate::context::CallContext;
use crate::error::GovernanceError;
use crate::manager::EpochManager;

/// Registered name of the governance contract
pub const CONTRACT_NAME: &str = "node_manager";

/// The contract's fixed operation surface
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum Operation {
    Name,
    Propose,
    Vote,
    Epoch,
    EpochProof,
}

impl Operation {
    pub const ALL: [Operation; 5] = [
        Operation::Name,
        Operation::Propose,
        Operation::Vote,
        Operation::Epoch,
        Operation::EpochProof,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Operation::Name => "name",
            Operation::Propose => "propose",
            Operation::Vote => "vote",
            Operation::Epoch => "epoch",
            Operation::EpochProof => "epochProof",
        }
    }

    pub fn from_name(name: &str) -> Option<Operation> {
        Operation::ALL.into_iter().find(|op| op.as_str() == name)
    }
}

/// Per-operation cost table, supplied at construction rather than read from
/// ambient state
#[derive(Debug, Clone)]
pub struct CostSchedule(BTreeMap<Operation, u64>);

impl CostSchedule {
    pub fn new(costs: BTreeMap<Operation, u64>) -> Self {
        CostSchedule(costs)
    }

    /// Costs used by the reference deployment
    pub fn reference() -> Self {
        let mut costs = BTreeMap::new();
        costs.insert(Operation::Name, 0);
        costs.insert(Operation::Propose, 30_000);
        costs.insert(Operation::Vote, 30_000);
        costs.insert(Operation::Epoch, 0);
        costs.insert(Operation::EpochProof, 0);
        CostSchedule(costs)
    }

    pub fn cost(&self, op: Operation) -> u64 {
        self.0.get(&op).copied().unwrap_or(0)
    }
}

/// `propose` call payload
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProposeInput {
    pub peers: Vec<Peer>,
    /// 0 means "use the default valid period"
    pub start_height: u64,
}

/// `vote` call payload
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct VoteInput {
    pub epoch_id: u64,
    pub proposal: Hash,
}

/// Structured result of a dispatched call
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CallOutput {
    Name(&'static str),
    Proposed(Hash),
    Voted,
    Epoch(EpochInfo),
    EpochProof(Hash),
}

/// The contract entry point: decodes call payloads, routes the fixed
/// operation set to the manager, and settles the storage transaction —
/// commit on success, rollback on any error, so a failed call leaves no
/// partial writes behind.
pub struct NodeManagerContract<S: Storage> {
    manager: EpochManager<S>,
    costs: CostSchedule,
}

impl<S: Storage> NodeManagerContract<S> {
    pub fn new(manager: EpochManager<S>, costs: CostSchedule) -> Self {
        NodeManagerContract { manager, costs }
    }

    pub fn cost(&self, op: Operation) -> u64 {
        self.costs.cost(op)
    }

    pub fn manager(&self) -> &EpochManager<S> {
        &self.manager
    }

    pub fn manager_mut(&mut self) -> &mut EpochManager<S> {
        &mut self.manager
    }

    pub fn dispatch(
        &mut self,
        ctx: &CallContext,
        op: Operation,
        payload: &[u8],
    ) -> Result<CallOutput, GovernanceError> {
        match self.execute(ctx, op, payload) {
            Ok(output) => {
                self.manager.commit()?;
                Ok(output)
            }
            Err(err) => {
                self.manager.rollback();
                Err(err)
            }
        }
    }

    fn execute(
        &mut self,
        ctx: &CallContext,
        op: Operation,
        payload: &[u8],
    ) -> Result<CallOutput, GovernanceError> {
        match op {
            Operation::Name => Ok(CallOutput::Name(CONTRACT_NAME)),
            Operation::Propose => {
                let input: ProposeInput = decode(payload)?;
                let proposal = self.manager.propose(ctx, input.peers, input.start_height)?;
                Ok(CallOutput::Proposed(proposal))
            }
            Operation::Vote => {
                let input: VoteInput = decode(payload)?;
                self.manager.vote(ctx, input.epoch_id, input.proposal)?;
                Ok(CallOutput::Voted)
            }
            Operation::Epoch => Ok(CallOutput::Epoch(self.manager.epoch()?)),
            Operation::EpochProof => Ok(CallOutput::EpochProof(self.manager.epoch_proof()?)),
        }
    }
}

/// Decode a call payload; failures surface as `InvalidInput`, distinct from
/// business-logic errors
fn decode<'a, T: Deserialize<'a>>(payload: &'a [u8]) -> Result<T, GovernanceError> {
    serialize::from_bytes(payload).map_err(|e| GovernanceError::InvalidInput(e.to_string()))
}
