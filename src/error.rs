use thiserror::Error;

/// Every error kind the core can raise, across trie, account, pool, payload
/// and block-engine operations. Structural failures (hash/signature/root
/// mismatches) abort the containing operation; payload-level failures are
/// caught inside the per-transaction checkpoint and never reach here as a
/// block-assembly abort.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum CoreError {
    #[error("invalid transaction data payload type")]
    InvalidTxPayloadType,
    #[error("invalid contract address")]
    InvalidContractAddress,
    #[error("insufficient balance")]
    InsufficientBalance,
    #[error("invalid transaction signature")]
    InvalidSignature,
    #[error("invalid transaction hash")]
    InvalidTransactionHash,
    #[error("cannot find a on-chain block's parent block in storage")]
    MissingParentBlock,
    #[error("too few candidates in consensus")]
    TooFewCandidates,
    #[error("now is not time to forg block")]
    NotBlockForgTime,
    #[error("invalid block hash")]
    InvalidBlockHash,
    #[error("invalid block state root hash")]
    InvalidBlockStateRoot,
    #[error("invalid block txs root hash")]
    InvalidBlockTxsRoot,
    #[error("invalid block dpos context root hash")]
    InvalidBlockDposContextRoot,
    #[error("invalid transaction chainID")]
    InvalidChainID,
    #[error("duplicated transaction")]
    DuplicatedTransaction,
    #[error("cannot accept a transaction with smaller nonce")]
    SmallTransactionNonce,
    #[error("cannot accept a transaction with too bigger nonce")]
    LargeTransactionNonce,
    #[error("duplicated block")]
    DuplicatedBlock,
    #[error("address: invalid address")]
    InvalidAddress,
    #[error("address: invalid address data length")]
    InvalidAddressDataLength,
    #[error("out of gas limit")]
    OutOfGasLimit,
    #[error("cannot seal a block twice")]
    DoubleSealBlock,
    #[error("invalid candidate payload action")]
    InvalidCandidatePayloadAction,
    #[error("arithmetic overflow or underflow")]
    Arithmetic,
    #[error("key not found")]
    NotFound,
    #[error("trie error: {0}")]
    Trie(String),
    #[error("storage error: {0}")]
    Storage(String),
    #[error("codec error: {0}")]
    Codec(String),
}
