//! Core data-model primitives: `Uint128`, `Account`, `Transaction` and the
//! wire-level payload envelope.

use serde::{Deserialize, Serialize};

use crate::crypto::{self, Hash, PublicKey, Signature};
use crate::error::CoreError;

pub use alloy_primitives::Address;

/// Unsigned 128-bit integer with checked arithmetic. Balances, values, gas
/// price, gas limit and gas used are all `Uint128`; overflow/underflow is
/// reported rather than wrapping (spec.md §3).
#[derive(Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
pub struct Uint128(pub u128);

impl Uint128 {
    pub const ZERO: Uint128 = Uint128(0);

    pub fn new(v: u128) -> Self {
        Uint128(v)
    }

    pub fn checked_add(self, rhs: Uint128) -> Result<Uint128, CoreError> {
        self.0.checked_add(rhs.0).map(Uint128).ok_or(CoreError::Arithmetic)
    }

    pub fn checked_sub(self, rhs: Uint128) -> Result<Uint128, CoreError> {
        self.0.checked_sub(rhs.0).map(Uint128).ok_or(CoreError::Arithmetic)
    }

    pub fn checked_mul(self, rhs: Uint128) -> Result<Uint128, CoreError> {
        self.0.checked_mul(rhs.0).map(Uint128).ok_or(CoreError::Arithmetic)
    }
}

impl std::fmt::Debug for Uint128 {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl std::fmt::Display for Uint128 {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<u128> for Uint128 {
    fn from(v: u128) -> Self {
        Uint128(v)
    }
}

impl From<u64> for Uint128 {
    fn from(v: u64) -> Self {
        Uint128(v as u128)
    }
}

/// Tag for `Payload::kind`; dispatch in `payload::execute` is a total match
/// over this enum (Design Notes §9 — "avoids open inheritance").
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum PayloadKind {
    Binary,
    Deploy,
    Call,
    Vote,
    Candidate,
}

/// Raw, still-encoded transaction payload. `payload::decode` turns this into
/// the matching concrete payload type before execution.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Payload {
    pub kind: PayloadKind,
    pub bytes: Vec<u8>,
}

/// An account's balance and nonce, as stored in the account trie.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Account {
    pub balance: Uint128,
    pub nonce: u64,
}

/// A signed transaction. `hash` is a pure function of every other field and
/// is validated against recomputation at pool intake and block verification.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Transaction {
    pub hash: Hash,
    pub from: Address,
    pub to: Address,
    pub value: Uint128,
    pub nonce: u64,
    pub timestamp: i64,
    pub payload: Payload,
    pub chain_id: u32,
    pub gas_price: Uint128,
    pub gas_limit: Uint128,
    pub signature: Signature,
}

/// Fields hashed to produce `Transaction::hash`; `signature` and `hash`
/// itself are excluded so the digest is stable across signing.
#[derive(Serialize)]
struct TransactionSigningPayload<'a> {
    from: &'a Address,
    to: &'a Address,
    value: Uint128,
    nonce: u64,
    timestamp: i64,
    payload: &'a Payload,
    chain_id: u32,
    gas_price: Uint128,
    gas_limit: Uint128,
}

impl Transaction {
    /// Build an unsigned transaction skeleton, computing `hash` but leaving
    /// `signature` default. Callers sign the returned hash and call
    /// `with_signature`.
    #[allow(clippy::too_many_arguments)]
    pub fn new_unsigned(
        from: Address,
        to: Address,
        value: Uint128,
        nonce: u64,
        timestamp: i64,
        payload: Payload,
        chain_id: u32,
        gas_price: Uint128,
        gas_limit: Uint128,
    ) -> Self {
        let signing = TransactionSigningPayload {
            from: &from,
            to: &to,
            value,
            nonce,
            timestamp,
            payload: &payload,
            chain_id,
            gas_price,
            gas_limit,
        };
        let hash = crypto::hash_data(&signing);
        Transaction {
            hash,
            from,
            to,
            value,
            nonce,
            timestamp,
            payload,
            chain_id,
            gas_price,
            gas_limit,
            signature: Signature::default(),
        }
    }

    pub fn recompute_hash(&self) -> Hash {
        let signing = TransactionSigningPayload {
            from: &self.from,
            to: &self.to,
            value: self.value,
            nonce: self.nonce,
            timestamp: self.timestamp,
            payload: &self.payload,
            chain_id: self.chain_id,
            gas_price: self.gas_price,
            gas_limit: self.gas_limit,
        };
        crypto::hash_data(&signing)
    }

    /// Attach a signature computed over `self.hash` and return the sealed transaction.
    pub fn with_signature(mut self, public_key: &PublicKey, signature: Signature) -> Result<Self, CoreError> {
        if public_key.address() != self.from {
            return Err(CoreError::InvalidSignature);
        }
        self.signature = signature;
        Ok(self)
    }

    /// Full validity check per spec.md §3: hash matches, signature recovers
    /// to `from`, chain id matches the local chain.
    pub fn validate(&self, local_chain_id: u32) -> Result<(), CoreError> {
        if self.recompute_hash() != self.hash {
            return Err(CoreError::InvalidTransactionHash);
        }
        if self.chain_id != local_chain_id {
            return Err(CoreError::InvalidChainID);
        }
        let recovered = crypto::recover(self.hash.as_bytes(), &self.signature)?;
        if recovered.address() != self.from {
            return Err(CoreError::InvalidSignature);
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::crypto::generate_keypair;

    fn make_signed_tx(from_key: &crypto::SecretKey, from: Address, nonce: u64) -> Transaction {
        let tx = Transaction::new_unsigned(
            from,
            Address::ZERO,
            Uint128::new(10),
            nonce,
            1_700_000_000,
            Payload { kind: PayloadKind::Binary, bytes: vec![] },
            1,
            Uint128::new(1),
            Uint128::new(21_000),
        );
        let sig = crypto::sign(from_key, tx.hash.as_bytes());
        let pk_for_from = crypto::PublicKey::from_verifying_key(from_key.verifying_key());
        tx.with_signature(&pk_for_from, sig).unwrap()
    }

    #[test]
    fn hash_is_pure_function_of_fields() {
        let (pk, sk) = generate_keypair();
        let tx = make_signed_tx(&sk, pk.address(), 0);
        assert_eq!(tx.hash, tx.recompute_hash());
    }

    #[test]
    fn validate_succeeds_for_well_formed_tx() {
        let (pk, sk) = generate_keypair();
        let tx = make_signed_tx(&sk, pk.address(), 0);
        assert!(tx.validate(1).is_ok());
    }

    #[test]
    fn validate_rejects_wrong_chain_id() {
        let (pk, sk) = generate_keypair();
        let tx = make_signed_tx(&sk, pk.address(), 0);
        assert_eq!(tx.validate(2), Err(CoreError::InvalidChainID));
    }

    #[test]
    fn validate_rejects_tampered_hash() {
        let (pk, sk) = generate_keypair();
        let mut tx = make_signed_tx(&sk, pk.address(), 0);
        tx.value = Uint128::new(999);
        assert_eq!(tx.validate(1), Err(CoreError::InvalidTransactionHash));
    }

    #[test]
    fn uint128_checked_arithmetic() {
        let a = Uint128::new(u128::MAX);
        assert_eq!(a.checked_add(Uint128::new(1)), Err(CoreError::Arithmetic));
        let b = Uint128::new(0);
        assert_eq!(b.checked_sub(Uint128::new(1)), Err(CoreError::Arithmetic));
        assert_eq!(Uint128::new(2).checked_add(Uint128::new(3)), Ok(Uint128::new(5)));
    }
}
