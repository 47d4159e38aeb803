//! Block lifecycle engine (spec.md §4.7): assemble, seal, link, verify.
//!
//! `Block`/`BlockHeader` are the wire-serializable records (spec.md §3).
//! `BlockBuilder` is the mutable assembly/verification engine holding the
//! ephemeral working state (`account_state`, `txs_trie`, `dpos`, `height`,
//! `sealed`) that spec.md §3 lists as non-serialized `Block` fields —
//! split out here because Rust has no single type that is both an
//! immutable wire record and a mutable in-progress builder.

use std::collections::{BTreeMap, HashMap, VecDeque};
use std::time::Instant;

use serde::{Deserialize, Serialize};

use crate::account::AccountState;
use crate::consensus::Consensus;
use crate::crypto::{self, Hash};
use crate::dpos::DposContext;
use crate::error::CoreError;
use crate::payload::{self, ExecutionContext};
use crate::tx_pool::TxPool;
use crate::types::{Address, Transaction, Uint128};
use crate::vm::ScriptEngine;

/// Process-wide, fixed block reward credited to the coinbase at `Seal()`
/// (spec.md §9 "Global state"). No source of truth names a concrete
/// value; chosen arbitrarily and documented in DESIGN.md.
pub const BLOCK_REWARD: Uint128 = Uint128(16);

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct BlockHeader {
    pub hash: Hash,
    pub parent_hash: Hash,
    pub state_root: Hash,
    pub txs_root: Hash,
    pub dpos_context_root: Hash,
    pub nonce: u64,
    pub coinbase: Address,
    pub timestamp: i64,
    pub chain_id: u32,
}

impl BlockHeader {
    /// Digest over the header with `hash` zeroed, so the hash is a pure
    /// function of the remaining fields (spec.md §4.7 "Seal").
    pub fn compute_hash(&self) -> Hash {
        let mut unhashed = self.clone();
        unhashed.hash = Hash::zero();
        crypto::hash_data(&unhashed)
    }
}

/// Wire-level block: header plus ordered transactions. No ephemeral
/// engine state — reconstructed identically from its encoded bytes.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Block {
    pub header: BlockHeader,
    pub transactions: Vec<Transaction>,
}

/// Lightweight height-tracking wrapper used to re-establish chain position
/// for a block reconstructed from its wire form (spec.md §4.7
/// "LinkParentBlock"), without replaying it.
pub struct ChainedBlock {
    pub block: Block,
    pub height: u64,
}

impl ChainedBlock {
    pub fn genesis(block: Block) -> Self {
        ChainedBlock { block, height: 1 }
    }

    /// Returns true and sets `height = parent.height + 1` iff
    /// `self.block.header.parent_hash == parent.block.header.hash`;
    /// otherwise returns false and sets `height = 0`.
    pub fn link_parent_block(&mut self, parent: &ChainedBlock) -> bool {
        if self.block.header.parent_hash == parent.block.header.hash {
            self.height = parent.height + 1;
            true
        } else {
            self.height = 0;
            false
        }
    }
}

/// The mutable block-assembly/verification engine (spec.md §4.7).
pub struct BlockBuilder {
    header: BlockHeader,
    transactions: Vec<Transaction>,
    account_state: AccountState,
    txs_trie: crate::trie::Trie,
    dpos: DposContext,
    height: u64,
    sealed: bool,
    block_gas_limit: Uint128,
    gas_used: Uint128,
}

impl BlockBuilder {
    /// Genesis block: height 1, `parent_hash = GenesisHash` (spec.md §3).
    pub fn genesis(chain_id: u32, coinbase: Address, timestamp: i64, block_gas_limit: Uint128) -> Self {
        BlockBuilder {
            header: BlockHeader {
                hash: Hash::zero(),
                parent_hash: crypto::genesis_hash(),
                state_root: Hash::zero(),
                txs_root: Hash::zero(),
                dpos_context_root: Hash::zero(),
                nonce: 0,
                coinbase,
                timestamp,
                chain_id,
            },
            transactions: Vec::new(),
            account_state: AccountState::new(),
            txs_trie: crate::trie::Trie::new(),
            dpos: DposContext::new(),
            height: 1,
            sealed: false,
            block_gas_limit,
            gas_used: Uint128::ZERO,
        }
    }

    /// `NewBlock(chain_id, coinbase, parent)`: forks `parent`'s committed
    /// state as the new block's working state (spec.md §4.7).
    pub fn new_block(chain_id: u32, coinbase: Address, timestamp: i64, parent: &BlockBuilder, block_gas_limit: Uint128) -> Self {
        assert!(parent.sealed, "parent block must be sealed before building on it");
        BlockBuilder {
            header: BlockHeader {
                hash: Hash::zero(),
                parent_hash: parent.header.hash,
                state_root: Hash::zero(),
                txs_root: Hash::zero(),
                dpos_context_root: Hash::zero(),
                nonce: 0,
                coinbase,
                timestamp,
                chain_id,
            },
            transactions: Vec::new(),
            account_state: parent.account_state.fork(),
            txs_trie: crate::trie::Trie::new(),
            dpos: parent.dpos.fork(),
            height: parent.height + 1,
            sealed: false,
            block_gas_limit,
            gas_used: Uint128::ZERO,
        }
    }

    pub fn header(&self) -> &BlockHeader {
        &self.header
    }

    pub fn height(&self) -> u64 {
        self.height
    }

    pub fn is_sealed(&self) -> bool {
        self.sealed
    }

    pub fn account_state(&self) -> &AccountState {
        &self.account_state
    }

    pub fn dpos(&self) -> &DposContext {
        &self.dpos
    }

    pub fn transactions(&self) -> &[Transaction] {
        &self.transactions
    }

    pub fn to_block(&self) -> Block {
        Block { header: self.header.clone(), transactions: self.transactions.clone() }
    }

    /// Runs `tx` under the per-transaction checkpoint (spec.md §4.6):
    /// snapshots `account_state`/`dpos` before execution, rolls both back
    /// on payload error, always consumes `tx`'s nonce, and charges
    /// `gas_used * gas_price` from `tx.from` to the coinbase — crediting the
    /// coinbase only with what was actually debited, never for free — before
    /// recording `tx` in `txs_trie`. Returns the gas charged.
    fn apply_transaction(&mut self, tx: &Transaction, engine: &dyn ScriptEngine) -> Uint128 {
        let account_snapshot = self.account_state.trie().snapshot();
        let dpos_snapshot = self.dpos.snapshot();

        let (gas_used, err) = {
            let mut ctx = ExecutionContext { account_state: &mut self.account_state, dpos: &mut self.dpos, engine };
            payload::execute(tx, &mut ctx)
        };

        if let Some(e) = &err {
            self.account_state.trie_mut().restore(account_snapshot);
            self.dpos.restore(dpos_snapshot);
            log::warn!("transaction {:?} failed, state rolled back: {}", tx.hash, e);
        }
        // Nonce is consumed whether the payload succeeded or failed, so a
        // rolled-back transaction can never be replayed in a later block.
        self.account_state.set_nonce(tx.from, tx.nonce + 1);

        let fee = gas_used.checked_mul(tx.gas_price).unwrap_or(Uint128::ZERO);
        if self.account_state.sub_balance(tx.from, fee).is_ok() {
            self.account_state.add_balance(self.header.coinbase, fee).ok();
        }

        let encoded = bincode::serialize(tx).expect("transaction encoding cannot fail");
        self.txs_trie.put(tx.hash.as_bytes(), &encoded);
        self.transactions.push(tx.clone());
        self.gas_used = self.gas_used.checked_add(gas_used).unwrap_or(self.block_gas_limit);
        gas_used
    }

    /// `CollectTransactions(n)` (spec.md §4.7): pops from `pool`, gating
    /// each transaction by a per-sender expected nonce bootstrapped from
    /// `account_state`. Stops at `n` inclusions, an exhausted pool, the
    /// block gas limit, or `deadline`.
    pub fn collect_transactions(
        &mut self,
        pool: &TxPool,
        n: usize,
        engine: &dyn ScriptEngine,
        nonce_gap_window: u64,
        deadline: Option<Instant>,
    ) {
        assert!(!self.sealed, "cannot collect transactions on a sealed block");

        let mut expected: HashMap<Address, u64> = HashMap::new();
        let mut deferred: HashMap<Address, BTreeMap<u64, Transaction>> = HashMap::new();
        let mut included = 0usize;

        'outer: while included < n {
            if let Some(deadline) = deadline {
                if Instant::now() >= deadline {
                    break;
                }
            }
            let Some(popped) = pool.pop() else { break };

            let mut pending = VecDeque::from([popped]);
            while let Some(tx) = pending.pop_front() {
                if included >= n {
                    break 'outer;
                }

                let exp = *expected.entry(tx.from).or_insert_with(|| self.account_state.get_nonce(tx.from));

                if tx.nonce < exp {
                    log::warn!("discarding tx {:?} ({})", tx.hash, CoreError::SmallTransactionNonce);
                    continue;
                }
                if tx.nonce > exp + nonce_gap_window {
                    log::warn!("discarding tx {:?} ({})", tx.hash, CoreError::LargeTransactionNonce);
                    continue;
                }
                if tx.nonce > exp {
                    deferred.entry(tx.from).or_default().insert(tx.nonce, tx);
                    continue;
                }

                if self.gas_used.checked_add(tx.gas_limit).map(|g| g > self.block_gas_limit).unwrap_or(true) {
                    break 'outer;
                }

                self.apply_transaction(&tx, engine);
                included += 1;
                expected.insert(tx.from, exp + 1);

                if let Some(sender_deferred) = deferred.get_mut(&tx.from) {
                    if let Some(next_tx) = sender_deferred.remove(&(exp + 1)) {
                        pending.push_back(next_tx);
                    }
                }
            }
        }
    }

    /// `Seal()`: credits `BLOCK_REWARD` to coinbase, freezes the tries,
    /// writes the roots and `header.hash`. Fails `DoubleSealBlock` if
    /// already sealed.
    pub fn seal(&mut self) -> Result<(), CoreError> {
        if self.sealed {
            return Err(CoreError::DoubleSealBlock);
        }
        self.account_state.add_balance(self.header.coinbase, BLOCK_REWARD)?;
        self.header.state_root = self.account_state.root_hash()?;
        self.header.txs_root = self.txs_trie.root_hash()?;
        self.header.dpos_context_root = self.dpos.root_hash()?;
        self.header.hash = self.header.compute_hash();
        self.sealed = true;
        log::info!("sealed block height={} hash={:?}", self.height, self.header.hash);
        Ok(())
    }
}

/// `Verify(chain_id)` (spec.md §4.7): replays `block` from a fresh fork of
/// `parent`'s state, then compares recomputed roots to the header. Returns
/// the resulting sealed `BlockBuilder` so the caller can chain the next
/// block from it.
pub fn verify_block(
    block: &Block,
    parent: &BlockBuilder,
    chain_id: u32,
    consensus: &dyn Consensus,
    engine: &dyn ScriptEngine,
) -> Result<BlockBuilder, CoreError> {
    if block.header.chain_id != chain_id {
        return Err(CoreError::InvalidChainID);
    }
    if block.header.compute_hash() != block.header.hash {
        return Err(CoreError::InvalidBlockHash);
    }

    let mut builder = BlockBuilder {
        header: block.header.clone(),
        transactions: Vec::new(),
        account_state: parent.account_state.fork(),
        txs_trie: crate::trie::Trie::new(),
        dpos: parent.dpos.fork(),
        height: parent.height + 1,
        sealed: false,
        block_gas_limit: parent.block_gas_limit,
        gas_used: Uint128::ZERO,
    };

    for tx in &block.transactions {
        builder.apply_transaction(tx, engine);
    }
    builder.account_state.add_balance(block.header.coinbase, BLOCK_REWARD)?;

    let state_root = builder.account_state.root_hash()?;
    if state_root != block.header.state_root {
        return Err(CoreError::InvalidBlockStateRoot);
    }
    let txs_root = builder.txs_trie.root_hash()?;
    if txs_root != block.header.txs_root {
        return Err(CoreError::InvalidBlockTxsRoot);
    }
    let dpos_root = builder.dpos.root_hash()?;
    if dpos_root != block.header.dpos_context_root {
        return Err(CoreError::InvalidBlockDposContextRoot);
    }

    builder.sealed = true;
    consensus.fast_verify_block(block)?;
    Ok(builder)
}
