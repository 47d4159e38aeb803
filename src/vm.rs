//! VM storage bridge (spec.md §4.8) and the script-engine collaborator seam.
//!
//! Two layers live here:
//! - `ScriptEngine`/`ContractStorage`: the idiomatic Rust-native substitution
//!   point for the out-of-scope WASM/JS runtime, used internally by
//!   `payload::execute` for the "Call" payload.
//! - `StorageBridge`: the literal opaque-handler contract the spec names for
//!   an embedded runtime crossing into contract storage — a handle table
//!   from 64-bit IDs to `(engine_id, storage trie)` pairs, guarded by a
//!   mutex, replacing the original's `unsafe` C-ABI pointer bridge (Design
//!   Notes §9).

use std::collections::HashMap;
use std::sync::Mutex;

use crate::crypto::keccak256;
use crate::error::CoreError;
use crate::trie::Trie;
use crate::types::{Address, Uint128};

/// Storage surface a `ScriptEngine` call is given: a contract's own trie,
/// scoped to the duration of the call.
pub trait ContractStorage {
    fn get(&self, key: &[u8]) -> Option<Vec<u8>>;
    fn put(&mut self, key: &[u8], value: &[u8]);
    fn del(&mut self, key: &[u8]) -> bool;
}

impl ContractStorage for Trie {
    fn get(&self, key: &[u8]) -> Option<Vec<u8>> {
        Trie::get(self, key).ok()
    }

    fn put(&mut self, key: &[u8], value: &[u8]) {
        Trie::put(self, key, value);
    }

    fn del(&mut self, key: &[u8]) -> bool {
        Trie::del(self, key).is_ok()
    }
}

/// Scopes a contract's storage operations to a private key namespace within
/// the shared account trie, so a `ScriptEngine` cannot read or write any
/// account or contract other than the one it was invoked for.
pub struct ScopedStorage<'a> {
    trie: &'a mut Trie,
    prefix: Vec<u8>,
}

impl<'a> ScopedStorage<'a> {
    pub fn new(trie: &'a mut Trie, contract: Address) -> Self {
        let mut prefix = b"storage:".to_vec();
        prefix.extend_from_slice(contract.as_slice());
        prefix.push(b':');
        ScopedStorage { trie, prefix }
    }

    fn scoped_key(&self, key: &[u8]) -> Vec<u8> {
        let mut k = self.prefix.clone();
        k.extend_from_slice(key);
        k
    }
}

impl ContractStorage for ScopedStorage<'_> {
    fn get(&self, key: &[u8]) -> Option<Vec<u8>> {
        self.trie.get(&self.scoped_key(key)).ok()
    }

    fn put(&mut self, key: &[u8], value: &[u8]) {
        let k = self.scoped_key(key);
        self.trie.put(&k, value);
    }

    fn del(&mut self, key: &[u8]) -> bool {
        let k = self.scoped_key(key);
        self.trie.del(&k).is_ok()
    }
}

/// Out-of-scope collaborator (spec.md §1): the runtime that executes a
/// deployed contract's code for a "Call" payload.
pub trait ScriptEngine: Send + Sync {
    #[allow(clippy::too_many_arguments)]
    fn call(
        &self,
        contract: Address,
        function: &str,
        args: &[u8],
        code: &[u8],
        storage: &mut dyn ContractStorage,
        gas_limit: Uint128,
    ) -> Result<Uint128, CoreError>;
}

/// Reference `ScriptEngine`: charges a fixed step cost and requires the
/// target to carry deployed code, without interpreting `code` at all.
pub struct MeteredNullEngine {
    pub step_cost: Uint128,
}

impl Default for MeteredNullEngine {
    fn default() -> Self {
        MeteredNullEngine { step_cost: Uint128::new(10) }
    }
}

impl ScriptEngine for MeteredNullEngine {
    fn call(
        &self,
        _contract: Address,
        function: &str,
        args: &[u8],
        code: &[u8],
        storage: &mut dyn ContractStorage,
        gas_limit: Uint128,
    ) -> Result<Uint128, CoreError> {
        if code.is_empty() {
            return Err(CoreError::InvalidContractAddress);
        }
        if gas_limit < self.step_cost {
            return Err(CoreError::OutOfGasLimit);
        }
        let mut call_record = function.as_bytes().to_vec();
        call_record.extend_from_slice(args);
        storage.put(b"@calls[last]", &call_record);
        Ok(self.step_cost)
    }
}

/// `key` in one of two shapes per spec.md §4.8: a bare identifier (domain
/// `""`) or `@domain[item]` (map entry). Returns the raw bytes fed to the
/// trie — the trie itself hashes them identically to every other key so
/// contract storage proofs verify against the same state root.
pub fn storage_key(key: &str) -> Vec<u8> {
    let (domain, item) = split_domain_item(key);
    let mut buf = Vec::with_capacity(domain.len() + item.len() + 1);
    buf.extend_from_slice(domain.as_bytes());
    buf.push(0);
    buf.extend_from_slice(item.as_bytes());
    buf
}

fn split_domain_item(key: &str) -> (&str, &str) {
    if let Some(rest) = key.strip_prefix('@') {
        if let (Some(open), true) = (rest.find('['), rest.ends_with(']')) {
            let domain = &rest[..open];
            let item = &rest[open + 1..rest.len() - 1];
            let domain_valid = domain
                .chars()
                .next()
                .is_some_and(|c| c.is_ascii_alphabetic() || c == '_');
            if domain_valid && !item.is_empty() {
                return (domain, item);
            }
        }
    }
    ("", key)
}

struct ContractHandle {
    engine_id: u64,
    storage: Trie,
}

/// Mutex-guarded handle table from opaque 64-bit IDs to `(engine, storage)`
/// pairs (spec.md §4.8, Design Notes §9). `register`/`unregister` bracket a
/// contract call; `get`/`put`/`del` are what an embedded runtime calls
/// across the bridge by handler id alone.
#[derive(Default)]
pub struct StorageBridge {
    next_handler: Mutex<u64>,
    table: Mutex<HashMap<u64, ContractHandle>>,
}

impl StorageBridge {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register(&self, engine_id: u64, storage: Trie) -> u64 {
        let mut next = self.next_handler.lock().unwrap();
        let handler = *next;
        *next += 1;
        self.table.lock().unwrap().insert(handler, ContractHandle { engine_id, storage });
        handler
    }

    /// Returns the handle's storage trie so the caller can fold it back
    /// into the owning contract's account state.
    pub fn unregister(&self, handler: u64) -> Option<Trie> {
        self.table.lock().unwrap().remove(&handler).map(|h| h.storage)
    }

    pub fn engine_id(&self, handler: u64) -> Option<u64> {
        self.table.lock().unwrap().get(&handler).map(|h| h.engine_id)
    }

    /// `get(handler, key) -> value | null`
    pub fn get(&self, handler: u64, key: &str) -> Option<Vec<u8>> {
        let table = self.table.lock().unwrap();
        table.get(&handler)?.storage.get(&storage_key(key)).ok()
    }

    /// `put(handler, key, value) -> 0 on success, 1 on failure`
    pub fn put(&self, handler: u64, key: &str, value: &[u8]) -> u8 {
        let mut table = self.table.lock().unwrap();
        match table.get_mut(&handler) {
            Some(h) => {
                h.storage.put(&storage_key(key), value);
                0
            }
            None => 1,
        }
    }

    /// `del(handler, key) -> 0 on success, 1 on failure`
    pub fn del(&self, handler: u64, key: &str) -> u8 {
        let mut table = self.table.lock().unwrap();
        match table.get_mut(&handler) {
            Some(h) => {
                h.storage.del(&storage_key(key)).ok();
                0
            }
            None => 1,
        }
    }
}

/// Stable domain hash helper, kept for parity with the original's
/// `trie.HashDomains` — not used by the trie itself (whose keys are raw
/// bytes) but available to callers that want a fixed-width digest of a
/// storage key outside the trie.
pub fn hash_storage_key(key: &str) -> crate::crypto::Hash {
    crate::crypto::Hash(keccak256(storage_key(key)).0)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn bare_identifier_has_empty_domain() {
        assert_eq!(split_domain_item("totalSupply"), ("", "totalSupply"));
    }

    #[test]
    fn map_item_key_splits_domain_and_item() {
        assert_eq!(split_domain_item("@balances[addr1]"), ("balances", "addr1"));
    }

    #[test]
    fn malformed_map_key_falls_back_to_bare() {
        assert_eq!(split_domain_item("@balances[addr1"), ("", "@balances[addr1"));
        assert_eq!(split_domain_item("@[addr1]"), ("", "@[addr1]"));
    }

    #[test]
    fn unregistered_handler_fails_without_panicking() {
        let bridge = StorageBridge::new();
        assert_eq!(bridge.get(42, "x"), None);
        assert_eq!(bridge.put(42, "x", b"y"), 1);
        assert_eq!(bridge.del(42, "x"), 1);
    }

    #[test]
    fn registered_handler_roundtrips_through_bridge() {
        let bridge = StorageBridge::new();
        let handler = bridge.register(7, Trie::new());
        assert_eq!(bridge.engine_id(handler), Some(7));
        assert_eq!(bridge.put(handler, "@balances[addr1]", b"100"), 0);
        assert_eq!(bridge.get(handler, "@balances[addr1]"), Some(b"100".to_vec()));
        assert_eq!(bridge.del(handler, "@balances[addr1]"), 0);
        assert_eq!(bridge.get(handler, "@balances[addr1]"), None);
        let storage = bridge.unregister(handler).unwrap();
        assert!(storage.get(b"anything").is_err());
    }

    #[test]
    fn null_engine_requires_deployed_code() {
        let engine = MeteredNullEngine::default();
        let mut storage = Trie::new();
        let err = engine
            .call(Address::ZERO, "run", &[], &[], &mut storage, Uint128::new(100))
            .unwrap_err();
        assert_eq!(err, CoreError::InvalidContractAddress);
    }

    #[test]
    fn null_engine_charges_step_cost() {
        let engine = MeteredNullEngine::default();
        let mut storage = Trie::new();
        let gas_used = engine
            .call(Address::ZERO, "run", &[1, 2], b"deployed", &mut storage, Uint128::new(100))
            .unwrap();
        assert_eq!(gas_used, engine.step_cost);
    }

    #[test]
    fn null_engine_rejects_insufficient_gas() {
        let engine = MeteredNullEngine::default();
        let mut storage = Trie::new();
        let err = engine
            .call(Address::ZERO, "run", &[], b"deployed", &mut storage, Uint128::new(1))
            .unwrap_err();
        assert_eq!(err, CoreError::OutOfGasLimit);
    }
}
