use tokio::sync::broadcast;
use tracing::debug;

use veridian_core::{Address, Hash};

/// Announcement of a completed validator-set transition, consumed by the
/// node's block-production component to restart consensus with the new set.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EpochChange {
    pub epoch_id: u64,
    pub start_height: u64,
    pub members: Vec<Address>,
    pub hash: Hash,
}

/// Owned publish point for epoch changes. Delivery is fire-and-forget: one
/// attempt per subscriber per change, no replay, and a missing or slow
/// subscriber never blocks or fails the state transition.
#[derive(Debug, Clone)]
pub struct EpochChangeNotifier {
    sender: broadcast::Sender<EpochChange>,
}

impl EpochChangeNotifier {
    pub fn new(capacity: usize) -> Self {
        let (sender, _) = broadcast::channel(capacity);
        EpochChangeNotifier { sender }
    }

    /// Register a subscriber; changes published before this call are not
    /// replayed
    pub fn subscribe(&self) -> broadcast::Receiver<EpochChange> {
        self.sender.subscribe()
    }

    /// Publish a change to all current subscribers
    pub fn notify(&self, change: EpochChange) {
        // send fails only when there are no subscribers, which is fine
        let delivered = self.sender.send(change).unwrap_or(0);
        debug!(subscribers = delivered, "epoch change published");
    }
}

impl Default for EpochChangeNotifier {
    fn default() -> Self {
        EpochChangeNotifier::new(16)
    }
}
