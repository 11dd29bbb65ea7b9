//! Governance integration tests: epoch proposal/voting lifecycle, the
//! consensus-signature gate, and the contract dispatcher.

use std::sync::{Arc, Mutex};

use veridian_core::{serialize, Address, EpochStatus, KeyPair, Peer};
use veridian_governance::{
    check_authority, quorum_size, CallContext, CallOutput, CostSchedule, EmitError, EpochManager,
    EventSink, GovernanceError, GovernanceEvent, NodeManagerContract, Operation, TracingEventSink,
    CONTRACT_NAME, DEFAULT_EPOCH_VALID_PERIOD, MAX_EPOCH_VALID_PERIOD, MIN_EPOCH_VALID_PERIOD,
};
use veridian_governance::contract::{ProposeInput, VoteInput};
use veridian_state::{EpochStore, MemoryStorage};

/// Event sink that records everything it sees
#[derive(Default)]
struct RecordingSink(Arc<Mutex<Vec<GovernanceEvent>>>);

impl EventSink for RecordingSink {
    fn emit(&self, event: &GovernanceEvent) -> Result<(), EmitError> {
        self.0.lock().unwrap().push(event.clone());
        Ok(())
    }
}

fn make_peers(n: usize) -> (Vec<KeyPair>, Vec<Peer>) {
    let keys: Vec<KeyPair> = (0..n).map(|_| KeyPair::generate()).collect();
    let peers: Vec<Peer> = keys
        .iter()
        .map(|k| Peer::from_public_key(k.public))
        .collect();
    (keys, peers)
}

fn new_manager(n: usize) -> (EpochManager<MemoryStorage>, Vec<Peer>) {
    let (_, peers) = make_peers(n);
    let mut manager = EpochManager::new(
        EpochStore::new(MemoryStorage::new()),
        Box::new(TracingEventSink),
    );
    manager.init_genesis(peers.clone(), 0).unwrap();
    (manager, peers)
}

fn ctx(origin: Address, height: u64) -> CallContext {
    CallContext::direct(origin, height)
}

// ---- genesis and reads ----

#[test]
fn uninitialized_state_reports_epoch_not_found() {
    let manager: EpochManager<MemoryStorage> = EpochManager::new(
        EpochStore::new(MemoryStorage::new()),
        Box::new(TracingEventSink),
    );
    assert!(matches!(
        manager.epoch(),
        Err(GovernanceError::EpochNotFound)
    ));
    assert!(matches!(
        manager.epoch_proof(),
        Err(GovernanceError::EpochNotFound)
    ));
}

#[test]
fn genesis_sets_current_epoch_and_proof() {
    let (manager, peers) = new_manager(4);
    let epoch = manager.epoch().unwrap();

    assert_eq!(epoch.id, 1);
    assert_eq!(epoch.status, EpochStatus::Passed);
    assert_eq!(epoch.member_count(), peers.len());
    assert_eq!(manager.epoch_proof().unwrap(), epoch.hash().unwrap());
}

#[test]
fn genesis_rejects_double_init() {
    let (mut manager, peers) = new_manager(4);
    assert!(matches!(
        manager.init_genesis(peers, 0),
        Err(GovernanceError::InvalidInput(_))
    ));
}

// ---- propose ----

#[test]
fn propose_requires_current_membership() {
    let (mut manager, peers) = new_manager(4);
    let outsider = Address([9u8; 20]);

    let result = manager.propose(&ctx(outsider, 100), peers, 0);
    assert!(matches!(result, Err(GovernanceError::InvalidAuthority(_))));
}

#[test]
fn propose_peer_set_size_bounds() {
    // fewer than 4 peers is rejected
    let (mut manager, peers) = new_manager(4);
    let proposer = peers[0].address;
    assert!(matches!(
        manager.propose(&ctx(proposer, 100), peers[..3].to_vec(), 0),
        Err(GovernanceError::InvalidPeerSet(_))
    ));

    // exactly 4 is accepted (boundary inclusive)
    let (mut manager, peers) = new_manager(4);
    let proposer = peers[0].address;
    manager.propose(&ctx(proposer, 100), peers, 0).unwrap();

    // exactly 100 is accepted
    let (mut manager, peers) = new_manager(4);
    let proposer = peers[0].address;
    let mut candidate = peers.clone();
    candidate.extend(make_peers(96).1);
    manager.propose(&ctx(proposer, 100), candidate, 0).unwrap();

    // 101 is rejected
    let (mut manager, peers) = new_manager(4);
    let proposer = peers[0].address;
    let mut candidate = peers.clone();
    candidate.extend(make_peers(97).1);
    assert!(matches!(
        manager.propose(&ctx(proposer, 100), candidate, 0),
        Err(GovernanceError::InvalidPeerSet(_))
    ));
}

#[test]
fn propose_rejects_mismatched_public_key() {
    let (mut manager, peers) = new_manager(4);
    let proposer = peers[0].address;

    let mut candidate = peers.clone();
    // claimed address does not derive from this key
    candidate.push(Peer::new(
        Address([1u8; 20]),
        KeyPair::generate().public,
    ));
    assert!(matches!(
        manager.propose(&ctx(proposer, 100), candidate, 0),
        Err(GovernanceError::InvalidPeerSet(_))
    ));
}

#[test]
fn propose_requires_old_member_overlap() {
    let (mut manager, peers) = new_manager(4);
    let proposer = peers[0].address;

    // quorum of the current 4 members is 3; only 2 retained
    let mut candidate = peers[..2].to_vec();
    candidate.extend(make_peers(3).1);
    assert!(matches!(
        manager.propose(&ctx(proposer, 100), candidate, 0),
        Err(GovernanceError::InsufficientOldMemberOverlap { have: 2, need: 3 })
    ));
}

#[test]
fn propose_start_height_window() {
    let height = 1_000;

    let (mut manager, peers) = new_manager(4);
    let proposer = peers[0].address;
    assert!(matches!(
        manager.propose(
            &ctx(proposer, height),
            peers.clone(),
            height + MIN_EPOCH_VALID_PERIOD - 1
        ),
        Err(GovernanceError::InvalidProposalWindow { .. })
    ));
    assert!(matches!(
        manager.propose(
            &ctx(proposer, height),
            peers.clone(),
            height + MAX_EPOCH_VALID_PERIOD + 1
        ),
        Err(GovernanceError::InvalidProposalWindow { .. })
    ));

    // both bounds are inclusive
    manager
        .propose(
            &ctx(proposer, height),
            peers.clone(),
            height + MIN_EPOCH_VALID_PERIOD,
        )
        .unwrap();
    let proposal = manager
        .propose(
            &ctx(proposer, height),
            peers.clone(),
            height + MAX_EPOCH_VALID_PERIOD,
        )
        .unwrap();
    let stored = manager.store().epoch(&proposal).unwrap().unwrap();
    assert_eq!(stored.start_height, height + MAX_EPOCH_VALID_PERIOD);

    // zero start height falls back to the default valid period
    let proposal = manager
        .propose(&ctx(peers[1].address, height), peers.clone(), 0)
        .unwrap();
    let stored = manager.store().epoch(&proposal).unwrap().unwrap();
    assert_eq!(stored.start_height, height + DEFAULT_EPOCH_VALID_PERIOD);
}

#[test]
fn propose_rejects_duplicate_proposal() {
    let (mut manager, peers) = new_manager(4);
    let proposer = peers[0].address;

    manager
        .propose(&ctx(proposer, 100), peers.clone(), 0)
        .unwrap();
    assert!(matches!(
        manager.propose(&ctx(proposer, 100), peers, 0),
        Err(GovernanceError::DuplicateProposal(_))
    ));
}

#[test]
fn propose_rate_limited_per_proposer() {
    let (mut manager, peers) = new_manager(4);
    let proposer = peers[0].address;
    let height = 100;

    // 3 distinct proposals succeed
    for i in 0..3 {
        manager
            .propose(
                &ctx(proposer, height),
                peers.clone(),
                height + MIN_EPOCH_VALID_PERIOD + i,
            )
            .unwrap();
    }
    // the 4th is rejected
    assert!(matches!(
        manager.propose(
            &ctx(proposer, height),
            peers.clone(),
            height + MIN_EPOCH_VALID_PERIOD + 3
        ),
        Err(GovernanceError::ProposalRateExceeded { count: 3, .. })
    ));

    // another member is unaffected
    manager
        .propose(&ctx(peers[1].address, height), peers, 0)
        .unwrap();
}

#[test]
fn propose_records_self_vote() {
    let (mut manager, peers) = new_manager(4);
    let proposer = peers[0].address;

    let proposal = manager.propose(&ctx(proposer, 100), peers, 0).unwrap();
    assert_eq!(manager.store().votes(&proposal).unwrap(), vec![proposer]);
    assert_eq!(
        manager.store().vote_to(2, &proposer).unwrap(),
        Some(proposal)
    );
}

// ---- vote ----

#[test]
fn vote_rejects_wrong_epoch_id_and_unknown_proposal() {
    let (mut manager, peers) = new_manager(4);
    let proposer = peers[0].address;
    let voter = peers[1].address;

    let proposal = manager.propose(&ctx(proposer, 100), peers, 0).unwrap();

    assert!(matches!(
        manager.vote(&ctx(voter, 101), 3, proposal),
        Err(GovernanceError::InvalidInput(_))
    ));
    assert!(matches!(
        manager.vote(&ctx(voter, 101), 2, veridian_core::hash_blake3(b"nope")),
        Err(GovernanceError::ProposalNotFound(_))
    ));
}

#[test]
fn vote_requires_current_membership() {
    let (mut manager, peers) = new_manager(4);
    let proposer = peers[0].address;
    let proposal = manager.propose(&ctx(proposer, 100), peers, 0).unwrap();

    let outsider = Address([9u8; 20]);
    assert!(matches!(
        manager.vote(&ctx(outsider, 101), 2, proposal),
        Err(GovernanceError::InvalidAuthority(_))
    ));
}

#[test]
fn vote_window_closes_before_start_height() {
    let (mut manager, peers) = new_manager(4);
    let proposer = peers[0].address;
    let voter = peers[1].address;
    let start = 100 + MIN_EPOCH_VALID_PERIOD;

    let proposal = manager
        .propose(&ctx(proposer, 100), peers, start)
        .unwrap();

    // height + 10 >= start_height is too late
    assert!(matches!(
        manager.vote(&ctx(voter, start - 10), 2, proposal),
        Err(GovernanceError::VoteWindowClosed { .. })
    ));
    // one block earlier is fine
    manager.vote(&ctx(voter, start - 11), 2, proposal).unwrap();
}

#[test]
fn vote_switch_moves_tally_and_pointer() {
    let (mut manager, peers) = new_manager(4);
    let a_proposer = peers[0].address;
    let b_proposer = peers[1].address;
    let voter = peers[2].address;

    let a = manager
        .propose(&ctx(a_proposer, 100), peers.clone(), 0)
        .unwrap();
    let b = manager.propose(&ctx(b_proposer, 100), peers, 0).unwrap();

    manager.vote(&ctx(voter, 101), 2, a).unwrap();
    assert_eq!(manager.store().votes(&a).unwrap(), vec![a_proposer, voter]);
    assert_eq!(manager.store().vote_to(2, &voter).unwrap(), Some(a));

    // switching allegiance unwinds the old vote before recording the new one
    manager.vote(&ctx(voter, 102), 2, b).unwrap();
    assert_eq!(manager.store().votes(&a).unwrap(), vec![a_proposer]);
    assert_eq!(manager.store().votes(&b).unwrap(), vec![b_proposer, voter]);
    assert_eq!(manager.store().vote_to(2, &voter).unwrap(), Some(b));
}

#[test]
fn vote_duplicate_is_noop() {
    let (mut manager, peers) = new_manager(5);
    let proposer = peers[0].address;
    let voter = peers[1].address;

    let proposal = manager.propose(&ctx(proposer, 100), peers, 0).unwrap();
    manager.vote(&ctx(voter, 101), 2, proposal).unwrap();
    manager.vote(&ctx(voter, 102), 2, proposal).unwrap();
    assert_eq!(manager.store().vote_count(&proposal).unwrap(), 2);
}

#[test]
fn quorum_vote_transitions_epoch_exactly_once() {
    let events = Arc::new(Mutex::new(Vec::new()));
    let (_, peers) = make_peers(4);
    let mut manager = EpochManager::new(
        EpochStore::new(MemoryStorage::new()),
        Box::new(RecordingSink(events.clone())),
    );
    manager.init_genesis(peers.clone(), 0).unwrap();
    let mut rx = manager.subscribe();

    // 5-member successor retaining all 4 old members
    let mut candidate = peers.clone();
    candidate.extend(make_peers(1).1);

    let proposer = peers[0].address;
    let proposal = manager
        .propose(&ctx(proposer, 100), candidate.clone(), 0)
        .unwrap();

    // quorum of the current 4-member epoch is 3: self-vote + 1 is not enough
    manager.vote(&ctx(peers[1].address, 101), 2, proposal).unwrap();
    assert_eq!(manager.epoch().unwrap().id, 1);
    assert!(rx.try_recv().is_err());

    // the third vote crosses the edge
    manager.vote(&ctx(peers[2].address, 102), 2, proposal).unwrap();

    let epoch = manager.epoch().unwrap();
    assert_eq!(epoch.id, 2);
    assert_eq!(epoch.status, EpochStatus::Passed);
    assert_eq!(epoch.member_count(), 5);
    assert_eq!(manager.epoch_proof().unwrap(), proposal);

    // exactly one notification, carrying the new member list
    let change = rx.try_recv().unwrap();
    assert_eq!(change.epoch_id, 2);
    assert_eq!(change.hash, proposal);
    assert_eq!(change.members, epoch.members());
    assert!(rx.try_recv().is_err());

    // exactly one EpochChanged event
    let changed: Vec<_> = events
        .lock()
        .unwrap()
        .iter()
        .filter(|e| matches!(e, GovernanceEvent::EpochChanged { .. }))
        .cloned()
        .collect();
    assert_eq!(changed.len(), 1);
}

#[test]
fn transition_purges_sibling_proposals() {
    let (mut manager, peers) = new_manager(4);
    let winner_proposer = peers[0].address;
    let loser_proposer = peers[1].address;

    let winner = manager
        .propose(&ctx(winner_proposer, 100), peers.clone(), 0)
        .unwrap();
    let loser = manager
        .propose(&ctx(loser_proposer, 100), peers.clone(), 200 + MIN_EPOCH_VALID_PERIOD)
        .unwrap();

    manager.vote(&ctx(peers[2].address, 101), 2, winner).unwrap();
    manager.vote(&ctx(peers[3].address, 102), 2, winner).unwrap();
    assert_eq!(manager.epoch().unwrap().hash().unwrap(), winner);

    // the loser's record, index entry, and votes are gone
    assert!(manager.store().epoch(&loser).unwrap().is_none());
    assert_eq!(manager.store().proposals(2).unwrap(), vec![winner]);
    assert_eq!(manager.store().vote_count(&loser).unwrap(), 0);

    // outgoing members' vote pointers for the settled id are cleared
    for peer in &peers {
        assert!(manager.store().vote_to(2, &peer.address).unwrap().is_none());
    }
}

#[test]
fn votes_after_transition_are_settled() {
    let (mut manager, peers) = new_manager(4);
    let winner_proposer = peers[0].address;
    let loser_proposer = peers[1].address;

    let winner = manager
        .propose(&ctx(winner_proposer, 100), peers.clone(), 0)
        .unwrap();
    let loser = manager
        .propose(&ctx(loser_proposer, 100), peers.clone(), 200 + MIN_EPOCH_VALID_PERIOD)
        .unwrap();

    manager.vote(&ctx(peers[2].address, 101), 2, winner).unwrap();
    manager.vote(&ctx(peers[3].address, 102), 2, winner).unwrap();
    let mut rx = manager.subscribe();

    // re-voting the winner is an idempotent success with no state change
    manager.vote(&ctx(peers[1].address, 103), 2, winner).unwrap();
    assert_eq!(manager.store().vote_count(&winner).unwrap(), 3);
    assert!(rx.try_recv().is_err());

    // any other proposal under the settled id is rejected
    assert!(matches!(
        manager.vote(&ctx(peers[1].address, 103), 2, loser),
        Err(GovernanceError::ProposalAlreadyPassed(2))
    ));
}

#[test]
fn end_to_end_epoch_change() {
    // epoch with 4 members, quorum 3; a 5-member successor retains all 4
    let (_, old_peers) = make_peers(4);
    let mut manager = EpochManager::new(
        EpochStore::new(MemoryStorage::new()),
        Box::new(TracingEventSink),
    );
    manager.init_genesis(old_peers.clone(), 0).unwrap();
    let mut rx = manager.subscribe();

    let mut successor = old_peers.clone();
    successor.extend(make_peers(1).1);
    assert!(manager.epoch().unwrap().old_member_count(&successor) >= quorum_size(4));

    let proposal = manager
        .propose(&ctx(old_peers[0].address, 10), successor, 0)
        .unwrap();
    manager.vote(&ctx(old_peers[1].address, 11), 2, proposal).unwrap();
    manager.vote(&ctx(old_peers[2].address, 12), 2, proposal).unwrap();

    let change = rx.try_recv().unwrap();
    assert_eq!(change.epoch_id, 2);
    assert_eq!(change.members.len(), 5);
    assert_eq!(manager.epoch().unwrap().members(), change.members);

    // the new epoch governs authority checks from now on
    let new_epoch = manager.epoch().unwrap();
    let new_member = *change.members.last().unwrap();
    assert!(check_authority(new_member, new_member, &new_epoch).is_ok());
}

// ---- consensus-sign gate ----

#[test]
fn consensus_signs_collects_until_quorum() {
    let (mut manager, peers) = new_manager(4);
    let input = vec![1u8, 2, 3];

    let approved = manager
        .check_consensus_signs(&ctx(peers[0].address, 100), "import_header", &input, peers[0].address)
        .unwrap();
    assert!(!approved);

    let approved = manager
        .check_consensus_signs(&ctx(peers[1].address, 100), "import_header", &input, peers[1].address)
        .unwrap();
    assert!(!approved);

    // third distinct signer reaches quorum (3 of 4)
    let approved = manager
        .check_consensus_signs(&ctx(peers[2].address, 100), "import_header", &input, peers[2].address)
        .unwrap();
    assert!(approved);

    // every later call for the same hash stays approved, without growing
    // the signer set
    let approved = manager
        .check_consensus_signs(&ctx(peers[3].address, 100), "import_header", &input, peers[3].address)
        .unwrap();
    assert!(approved);

    let sign = veridian_core::ConsensusSign::new("import_header", input);
    let hash = sign.hash().unwrap();
    assert_eq!(manager.store().signer_count(&hash).unwrap(), 3);
    assert_eq!(manager.sign_record(&hash).unwrap(), sign);
}

#[test]
fn consensus_signs_rejects_duplicate_signer() {
    let (mut manager, peers) = new_manager(4);
    let signer = peers[0].address;

    manager
        .check_consensus_signs(&ctx(signer, 100), "relay", b"payload", signer)
        .unwrap();
    assert!(matches!(
        manager.check_consensus_signs(&ctx(signer, 101), "relay", b"payload", signer),
        Err(GovernanceError::DuplicateSigner(_))
    ));
}

#[test]
fn consensus_signs_rejects_non_member_and_forged_caller() {
    let (mut manager, peers) = new_manager(4);
    let outsider = Address([9u8; 20]);

    assert!(matches!(
        manager.check_consensus_signs(&ctx(outsider, 100), "relay", b"x", outsider),
        Err(GovernanceError::InvalidAuthority(_))
    ));

    // a member signing through a different caller is rejected
    let member = peers[0].address;
    let forged = CallContext::new(peers[1].address, member, 100);
    assert!(matches!(
        manager.check_consensus_signs(&forged, "relay", b"x", member),
        Err(GovernanceError::InvalidAuthority(_))
    ));
}

#[test]
fn consensus_signs_distinct_payloads_tally_independently() {
    let (mut manager, peers) = new_manager(4);
    let signer = peers[0].address;

    manager
        .check_consensus_signs(&ctx(signer, 100), "relay", b"a", signer)
        .unwrap();
    // same signer, different payload: a fresh record, not a duplicate
    manager
        .check_consensus_signs(&ctx(signer, 100), "relay", b"b", signer)
        .unwrap();

    let a = veridian_core::ConsensusSign::new("relay", b"a".to_vec());
    let b = veridian_core::ConsensusSign::new("relay", b"b".to_vec());
    assert_eq!(manager.store().signer_count(&a.hash().unwrap()).unwrap(), 1);
    assert_eq!(manager.store().signer_count(&b.hash().unwrap()).unwrap(), 1);
}

#[test]
fn sign_record_missing_reports_not_found() {
    let (manager, _) = new_manager(4);
    let unknown = veridian_core::hash_blake3(b"unknown");
    assert!(matches!(
        manager.sign_record(&unknown),
        Err(GovernanceError::SignNotFound(_))
    ));
}

// ---- contract dispatcher ----

fn new_contract(n: usize) -> (NodeManagerContract<MemoryStorage>, Vec<Peer>) {
    let (_, peers) = make_peers(n);
    let mut manager = EpochManager::new(
        EpochStore::new(MemoryStorage::new()),
        Box::new(TracingEventSink),
    );
    manager.init_genesis(peers.clone(), 0).unwrap();
    manager.commit().unwrap();
    (
        NodeManagerContract::new(manager, CostSchedule::reference()),
        peers,
    )
}

#[test]
fn dispatch_name_and_reads() {
    let (mut contract, _) = new_contract(4);
    let caller = ctx(Address([1u8; 20]), 100);

    assert_eq!(
        contract.dispatch(&caller, Operation::Name, &[]).unwrap(),
        CallOutput::Name(CONTRACT_NAME)
    );
    match contract.dispatch(&caller, Operation::Epoch, &[]).unwrap() {
        CallOutput::Epoch(epoch) => assert_eq!(epoch.id, 1),
        other => panic!("unexpected output: {:?}", other),
    }
    assert!(matches!(
        contract.dispatch(&caller, Operation::EpochProof, &[]).unwrap(),
        CallOutput::EpochProof(_)
    ));
}

#[test]
fn dispatch_propose_and_vote_round_trip() {
    let (mut contract, peers) = new_contract(4);

    let payload = serialize::to_bytes(&ProposeInput {
        peers: peers.clone(),
        start_height: 0,
    })
    .unwrap();
    let proposal = match contract
        .dispatch(&ctx(peers[0].address, 100), Operation::Propose, &payload)
        .unwrap()
    {
        CallOutput::Proposed(hash) => hash,
        other => panic!("unexpected output: {:?}", other),
    };

    for voter in &peers[1..3] {
        let payload = serialize::to_bytes(&VoteInput {
            epoch_id: 2,
            proposal,
        })
        .unwrap();
        contract
            .dispatch(&ctx(voter.address, 101), Operation::Vote, &payload)
            .unwrap();
    }

    match contract
        .dispatch(&ctx(peers[0].address, 102), Operation::Epoch, &[])
        .unwrap()
    {
        CallOutput::Epoch(epoch) => {
            assert_eq!(epoch.id, 2);
            assert_eq!(epoch.status, EpochStatus::Passed);
        }
        other => panic!("unexpected output: {:?}", other),
    }
}

#[test]
fn dispatch_rejects_malformed_payload_without_side_effects() {
    let (mut contract, peers) = new_contract(4);

    let result = contract.dispatch(
        &ctx(peers[0].address, 100),
        Operation::Propose,
        b"not bincode",
    );
    assert!(matches!(result, Err(GovernanceError::InvalidInput(_))));

    // the failed call left no proposals behind
    assert!(contract.manager().store().proposals(2).unwrap().is_empty());
}

#[test]
fn dispatch_rolls_back_failed_calls() {
    let (mut contract, peers) = new_contract(4);
    let proposer = peers[0].address;

    let payload = serialize::to_bytes(&ProposeInput {
        peers: peers.clone(),
        start_height: 0,
    })
    .unwrap();
    contract
        .dispatch(&ctx(proposer, 100), Operation::Propose, &payload)
        .unwrap();

    // a duplicate proposal fails and must not disturb committed state
    let result = contract.dispatch(&ctx(proposer, 100), Operation::Propose, &payload);
    assert!(matches!(result, Err(GovernanceError::DuplicateProposal(_))));
    assert_eq!(contract.manager().store().proposals(2).unwrap().len(), 1);
}

#[test]
fn dispatch_cost_lookup() {
    let (contract, _) = new_contract(4);
    assert_eq!(contract.cost(Operation::Propose), 30_000);
    assert_eq!(contract.cost(Operation::Name), 0);
}

#[test]
fn operation_from_dispatcher_names() {
    assert_eq!(Operation::from_name("propose"), Some(Operation::Propose));
    assert_eq!(Operation::from_name("epochProof"), Some(Operation::EpochProof));
}
