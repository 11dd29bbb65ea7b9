use veridian_core::{Address, EpochInfo};

use crate::error::GovernanceError;

/// Check that `origin` is a member of the active epoch and that `caller`
/// equals the dispatcher-verified transaction origin, so an intermediate
/// contract cannot forge a vote or signature on a validator's behalf.
/// Side-effect free.
pub fn check_authority(
    origin: Address,
    caller: Address,
    epoch: &EpochInfo,
) -> Result<(), GovernanceError> {
    if caller != origin {
        return Err(GovernanceError::InvalidAuthority(caller));
    }
    if !epoch.is_member(&origin) {
        return Err(GovernanceError::InvalidAuthority(origin));
    }
    Ok(())
}
