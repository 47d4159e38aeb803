//! Hashing, addressing and secp256k1 signing primitives.
//!
//! Transaction signatures carry an explicit `algorithm_id` byte (spec.md
//! §6); `0` is the only algorithm implemented here (secp256k1 ECDSA).
//! Any other value is rejected as `InvalidSignature` rather than panicking,
//! since it can arrive over the wire from a peer.

pub use alloy_primitives::{Address, keccak256};
use k256::ecdsa::signature::hazmat::{PrehashSigner, PrehashVerifier};
use k256::ecdsa::{RecoveryId, Signature as EcdsaSignature, SigningKey, VerifyingKey};
use serde::{Deserialize, Serialize};

use crate::error::CoreError;

pub const ALGORITHM_SECP256K1: u8 = 0;

/// Opaque 32-byte digest: a transaction hash, a block header hash, or a trie root.
#[derive(Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct Hash(pub [u8; 32]);

impl Hash {
    pub fn zero() -> Self {
        Hash([0u8; 32])
    }

    pub fn as_bytes(&self) -> &[u8; 32] {
        &self.0
    }
}

impl From<[u8; 32]> for Hash {
    fn from(bytes: [u8; 32]) -> Self {
        Hash(bytes)
    }
}

impl From<alloy_primitives::B256> for Hash {
    fn from(b: alloy_primitives::B256) -> Self {
        Hash(b.0)
    }
}

impl std::fmt::Debug for Hash {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "0x{}", hex::encode(self.0))
    }
}

impl std::fmt::Display for Hash {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "0x{}", hex::encode(self.0))
    }
}

/// Sentinel parent hash for the genesis block (spec.md §3).
pub fn genesis_hash() -> Hash {
    Hash::zero()
}

/// Uncompressed secp256k1 public key, stored as the 64-byte X||Y coordinate
/// pair (no `0x04` prefix), matching the bytes an address is derived from.
#[derive(Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct PublicKey(pub [u8; 64]);

impl std::fmt::Debug for PublicKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "PublicKey(0x{}...)", hex::encode(&self.0[..4]))
    }
}

impl PublicKey {
    pub fn from_verifying_key(vk: &VerifyingKey) -> Self {
        let point = vk.to_encoded_point(false);
        let bytes = point.as_bytes();
        let mut out = [0u8; 64];
        out.copy_from_slice(&bytes[1..]);
        PublicKey(out)
    }

    pub fn to_verifying_key(&self) -> Result<VerifyingKey, CoreError> {
        let mut sec1 = [0u8; 65];
        sec1[0] = 0x04;
        sec1[1..].copy_from_slice(&self.0);
        VerifyingKey::from_sec1_bytes(&sec1).map_err(|_| CoreError::InvalidSignature)
    }

    /// Deterministic hash-truncate address derivation (spec.md §3).
    pub fn address(&self) -> Address {
        let digest = keccak256(self.0);
        Address::from_slice(&digest[12..])
    }
}

/// A secp256k1 ECDSA signature over a 32-byte digest, plus the algorithm tag
/// and recovery id needed to recover the signer's public key.
#[derive(Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Signature {
    pub algorithm_id: u8,
    pub bytes: [u8; 64],
    pub recovery_id: u8,
}

impl std::fmt::Debug for Signature {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "Signature(alg={}, 0x{}...)", self.algorithm_id, hex::encode(&self.bytes[..4]))
    }
}

pub type SecretKey = SigningKey;

pub fn generate_keypair() -> (PublicKey, SecretKey) {
    let sk = SigningKey::random(&mut rand::thread_rng());
    let pk = PublicKey::from_verifying_key(sk.verifying_key());
    (pk, sk)
}

/// Sign a 32-byte digest (already the transaction/message hash, never
/// re-hashed internally).
pub fn sign(sk: &SecretKey, digest: &[u8; 32]) -> Signature {
    let (sig, recid): (EcdsaSignature, RecoveryId) = sk
        .sign_prehash_recoverable(digest)
        .expect("signing a 32-byte digest cannot fail");
    let mut bytes = [0u8; 64];
    bytes.copy_from_slice(&sig.to_bytes());
    Signature {
        algorithm_id: ALGORITHM_SECP256K1,
        bytes,
        recovery_id: recid.to_byte(),
    }
}

/// Verify `sig` over `digest` against an explicit public key.
pub fn verify(pk: &PublicKey, digest: &[u8; 32], sig: &Signature) -> bool {
    if sig.algorithm_id != ALGORITHM_SECP256K1 {
        return false;
    }
    let Ok(vk) = pk.to_verifying_key() else {
        return false;
    };
    let Ok(ecdsa_sig) = EcdsaSignature::from_slice(&sig.bytes) else {
        return false;
    };
    vk.verify_prehash(digest, &ecdsa_sig).is_ok()
}

/// Recover the signer's public key from a digest and signature, without an
/// explicit public key on hand.
pub fn recover(digest: &[u8; 32], sig: &Signature) -> Result<PublicKey, CoreError> {
    if sig.algorithm_id != ALGORITHM_SECP256K1 {
        return Err(CoreError::InvalidSignature);
    }
    let ecdsa_sig = EcdsaSignature::from_slice(&sig.bytes).map_err(|_| CoreError::InvalidSignature)?;
    let recid = RecoveryId::from_byte(sig.recovery_id).ok_or(CoreError::InvalidSignature)?;
    let vk = VerifyingKey::recover_from_prehash(digest, &ecdsa_sig, recid)
        .map_err(|_| CoreError::InvalidSignature)?;
    Ok(PublicKey::from_verifying_key(&vk))
}

/// Hash any serializable value by bincode-encoding it and taking keccak256.
/// Used for transaction/header hashing and for trie leaf digests, so that
/// contract storage proofs and state roots use the identical hash function
/// (spec.md §4.8).
pub fn hash_data<T: Serialize>(value: &T) -> Hash {
    let bytes = bincode::serialize(value).expect("serialization of core types cannot fail");
    Hash(keccak256(bytes).0)
}
