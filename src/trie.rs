//! Authenticated key/value facade (spec.md §4.1).
//!
//! The raw `{key -> value}` mapping lives in an `im::OrdMap`, giving
//! `Clone()` genuine O(1) structural-sharing copy-on-write and preserving
//! lexicographic byte order for `Iterator(prefix)`. A `sparse_merkle_tree`
//! is rebuilt on demand from that mapping to answer `RootHash()` — leaves
//! are keyed by `keccak256(raw_key)` and store `keccak256(value)`, mirroring
//! `state.rs::OckhamSmtStore`'s key/value hashing scheme.

use sparse_merkle_tree::default_store::DefaultStore;
use sparse_merkle_tree::{H256, SparseMerkleTree, blake2b::Blake2bHasher};

use crate::crypto::{Hash, keccak256};
use crate::error::CoreError;

type Smt = SparseMerkleTree<Blake2bHasher, H256, DefaultStore<H256>>;

fn smt_key(raw_key: &[u8]) -> H256 {
    H256::from(keccak256(raw_key).0)
}

fn smt_leaf_value(raw_value: &[u8]) -> H256 {
    H256::from(keccak256(raw_value).0)
}

/// A lightweight, in-memory snapshot of a trie's contents, used for the
/// per-transaction checkpoint in spec.md §4.6 (root-pointer swap, no I/O).
#[derive(Clone)]
pub struct TrieSnapshot(im::OrdMap<Vec<u8>, Vec<u8>>);

/// Backing persistence for `Trie::commit`/`Trie::rollback`: a namespaced
/// store of raw key/value entries. Implemented by `storage::Storage`.
pub trait TrieBackend {
    fn load_namespace(&self, namespace: &[u8]) -> Result<Vec<(Vec<u8>, Vec<u8>)>, CoreError>;
    fn save_namespace(&self, namespace: &[u8], entries: &[(Vec<u8>, Vec<u8>)]) -> Result<(), CoreError>;
}

#[derive(Clone, Default)]
pub struct Trie {
    entries: im::OrdMap<Vec<u8>, Vec<u8>>,
}

impl Trie {
    pub fn new() -> Self {
        Trie::default()
    }

    /// `Put(k,v) -> old?`
    pub fn put(&mut self, key: &[u8], value: &[u8]) -> Option<Vec<u8>> {
        self.entries.insert(key.to_vec(), value.to_vec())
    }

    /// `Get(k) -> v | NotFound`
    pub fn get(&self, key: &[u8]) -> Result<Vec<u8>, CoreError> {
        self.entries.get(key).cloned().ok_or(CoreError::NotFound)
    }

    pub fn contains(&self, key: &[u8]) -> bool {
        self.entries.contains_key(key)
    }

    /// `Del(k) -> old? | NotFound`
    pub fn del(&mut self, key: &[u8]) -> Result<Vec<u8>, CoreError> {
        self.entries.remove(key).ok_or(CoreError::NotFound)
    }

    /// `Iterator(prefix)`: entries whose key begins with `prefix`, in
    /// lexicographic order. Errors `NotFound` if none exist, per spec.md §4.1.
    pub fn iter_prefix(&self, prefix: &[u8]) -> Result<impl Iterator<Item = (Vec<u8>, Vec<u8>)> + use<>, CoreError> {
        let matches: Vec<(Vec<u8>, Vec<u8>)> = self
            .entries
            .iter()
            .filter(|(k, _)| k.starts_with(prefix))
            .map(|(k, v)| (k.clone(), v.clone()))
            .collect();
        if matches.is_empty() {
            return Err(CoreError::NotFound);
        }
        Ok(matches.into_iter())
    }

    /// `RootHash()`: pure function of the current `{key -> value}` mapping.
    pub fn root_hash(&self) -> Result<Hash, CoreError> {
        let mut smt = Smt::default();
        for (k, v) in self.entries.iter() {
            smt.update(smt_key(k), smt_leaf_value(v))
                .map_err(|e| CoreError::Trie(e.to_string()))?;
        }
        Ok(Hash((*smt.root()).into()))
    }

    /// `Clone()`: copy-on-write fork — O(1) structural sharing via `im::OrdMap`.
    pub fn fork(&self) -> Self {
        self.clone()
    }

    /// Cheap, I/O-free snapshot for the per-transaction checkpoint (§4.6).
    pub fn snapshot(&self) -> TrieSnapshot {
        TrieSnapshot(self.entries.clone())
    }

    /// Restore a previously taken snapshot, discarding everything since.
    pub fn restore(&mut self, snapshot: TrieSnapshot) {
        self.entries = snapshot.0;
    }

    /// `Commit()`: persist the full working mapping under `namespace`.
    pub fn commit(&mut self, namespace: &[u8], backend: &dyn TrieBackend) -> Result<(), CoreError> {
        let entries: Vec<(Vec<u8>, Vec<u8>)> =
            self.entries.iter().map(|(k, v)| (k.clone(), v.clone())).collect();
        backend.save_namespace(namespace, &entries)
    }

    /// `Rollback()`: discard uncommitted entries by reloading the last
    /// persisted snapshot for `namespace`.
    pub fn rollback(&mut self, namespace: &[u8], backend: &dyn TrieBackend) -> Result<(), CoreError> {
        let entries = backend.load_namespace(namespace)?;
        self.entries = entries.into_iter().collect();
        Ok(())
    }

    pub fn load(namespace: &[u8], backend: &dyn TrieBackend) -> Result<Self, CoreError> {
        let entries = backend.load_namespace(namespace)?;
        Ok(Trie { entries: entries.into_iter().collect() })
    }
}
