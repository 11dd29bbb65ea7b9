use veridian_core::Address;

/// Transaction context supplied by the host dispatcher for each call:
/// the immediate caller, the outermost (dispatcher-verified) signer, and the
/// block height, which stands in for time everywhere in this subsystem.
#[derive(Debug, Clone, Copy)]
pub struct CallContext {
    pub caller: Address,
    pub tx_origin: Address,
    pub block_height: u64,
}

impl CallContext {
    pub fn new(caller: Address, tx_origin: Address, block_height: u64) -> Self {
        CallContext {
            caller,
            tx_origin,
            block_height,
        }
    }

    /// Context for a direct (non-contract-mediated) call by `origin`
    pub fn direct(origin: Address, block_height: u64) -> Self {
        CallContext::new(origin, origin, block_height)
    }
}
