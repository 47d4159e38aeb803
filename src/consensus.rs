//! Consensus collaborator seam (spec.md §6): the block engine calls into
//! this trait for DPoS slot timing, candidate-set sizing, and duplicate
//! detection; none of those policies live in this crate.
//!
//! Grounded in the `Consensus` Go interface in
//! `original_source/core/types.go`.

use crate::block::Block;
use crate::error::CoreError;

pub trait Consensus: Send + Sync {
    /// Full verification of `block` against its `parent`: slot timing,
    /// minimum candidate set, duplicate-block detection.
    fn verify_block(&self, block: &Block, parent: &Block) -> Result<(), CoreError>;

    /// Cheaper verification invoked once a block's roots have already been
    /// confirmed by replay (spec.md §4.7 step 6).
    fn fast_verify_block(&self, block: &Block) -> Result<(), CoreError>;
}

/// Reference implementation for a chain with a single, always-authorized
/// producer: every block is accepted. Useful in tests and as a starting
/// point for a real DPoS policy layered on top.
#[derive(Clone, Copy, Debug, Default)]
pub struct SingleProducerConsensus;

impl Consensus for SingleProducerConsensus {
    fn verify_block(&self, _block: &Block, _parent: &Block) -> Result<(), CoreError> {
        Ok(())
    }

    fn fast_verify_block(&self, _block: &Block) -> Result<(), CoreError> {
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::block::BlockHeader;
    use crate::crypto::{genesis_hash, Hash};
    use crate::types::Address;

    fn dummy_block() -> Block {
        Block {
            header: BlockHeader {
                hash: Hash::zero(),
                parent_hash: genesis_hash(),
                state_root: Hash::zero(),
                txs_root: Hash::zero(),
                dpos_context_root: Hash::zero(),
                nonce: 0,
                coinbase: Address::ZERO,
                timestamp: 0,
                chain_id: 1,
            },
            transactions: vec![],
        }
    }

    #[test]
    fn single_producer_always_accepts() {
        let consensus = SingleProducerConsensus;
        let block = dummy_block();
        assert!(consensus.verify_block(&block, &block).is_ok());
        assert!(consensus.fast_verify_block(&block).is_ok());
    }
}
