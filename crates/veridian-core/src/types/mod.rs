pub mod epoch;
pub mod peer;
pub mod sign;

pub use epoch::{EpochInfo, EpochStatus};
pub use peer::Peer;
pub use sign::ConsensusSign;
