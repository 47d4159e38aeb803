//! Persisted state (spec.md §6): a single KV namespace holding trie nodes
//! under content-addressed keys plus block bodies under their hash.

use std::collections::HashMap;
use std::sync::{Arc, Mutex, RwLock};

use redb::{Database, ReadableTable, TableDefinition};

use crate::crypto::Hash;
use crate::error::CoreError;
use crate::trie::TrieBackend;

const BLOCKS_TABLE: TableDefinition<&[u8], &[u8]> = TableDefinition::new("blocks");
const NAMESPACES_TABLE: TableDefinition<&[u8], &[u8]> = TableDefinition::new("trie_namespaces");

/// Backing store for block bodies and trie-node namespaces. Implemented by
/// an in-memory double for tests and a `redb`-backed store for real nodes.
pub trait Storage: Send + Sync {
    fn save_block_bytes(&self, hash: &Hash, bytes: &[u8]) -> Result<(), CoreError>;
    fn get_block_bytes(&self, hash: &Hash) -> Result<Option<Vec<u8>>, CoreError>;
    fn save_namespace(&self, namespace: &[u8], entries: &[(Vec<u8>, Vec<u8>)]) -> Result<(), CoreError>;
    fn load_namespace(&self, namespace: &[u8]) -> Result<Vec<(Vec<u8>, Vec<u8>)>, CoreError>;
}

impl<T: Storage + ?Sized> TrieBackend for T {
    fn load_namespace(&self, namespace: &[u8]) -> Result<Vec<(Vec<u8>, Vec<u8>)>, CoreError> {
        Storage::load_namespace(self, namespace)
    }

    fn save_namespace(&self, namespace: &[u8], entries: &[(Vec<u8>, Vec<u8>)]) -> Result<(), CoreError> {
        Storage::save_namespace(self, namespace, entries)
    }
}

/// In-memory test double; also useful for ephemeral/single-process nodes.
#[derive(Default)]
pub struct MemStorage {
    blocks: Mutex<HashMap<Hash, Vec<u8>>>,
    namespaces: RwLock<HashMap<Vec<u8>, Vec<(Vec<u8>, Vec<u8>)>>>,
}

impl MemStorage {
    pub fn new() -> Self {
        Self::default()
    }
}

impl Storage for MemStorage {
    fn save_block_bytes(&self, hash: &Hash, bytes: &[u8]) -> Result<(), CoreError> {
        self.blocks.lock().unwrap().insert(*hash, bytes.to_vec());
        Ok(())
    }

    fn get_block_bytes(&self, hash: &Hash) -> Result<Option<Vec<u8>>, CoreError> {
        Ok(self.blocks.lock().unwrap().get(hash).cloned())
    }

    fn save_namespace(&self, namespace: &[u8], entries: &[(Vec<u8>, Vec<u8>)]) -> Result<(), CoreError> {
        self.namespaces.write().unwrap().insert(namespace.to_vec(), entries.to_vec());
        Ok(())
    }

    fn load_namespace(&self, namespace: &[u8]) -> Result<Vec<(Vec<u8>, Vec<u8>)>, CoreError> {
        Ok(self.namespaces.read().unwrap().get(namespace).cloned().unwrap_or_default())
    }
}

/// Embedded, file-backed store. The teacher declares `redb` in its
/// manifest but its sampled `storage.rs` reached for an undeclared
/// `rocksdb` crate instead; `redb` is what's actually on the dependency
/// list, so it is what this crate's persistent backend uses.
pub struct RedbStorage {
    db: Database,
}

impl RedbStorage {
    pub fn open<P: AsRef<std::path::Path>>(path: P) -> Result<Self, CoreError> {
        let db = Database::create(path).map_err(|e| CoreError::Storage(e.to_string()))?;
        let write_txn = db.begin_write().map_err(|e| CoreError::Storage(e.to_string()))?;
        {
            write_txn.open_table(BLOCKS_TABLE).map_err(|e| CoreError::Storage(e.to_string()))?;
            write_txn.open_table(NAMESPACES_TABLE).map_err(|e| CoreError::Storage(e.to_string()))?;
        }
        write_txn.commit().map_err(|e| CoreError::Storage(e.to_string()))?;
        Ok(Self { db })
    }
}

impl Storage for RedbStorage {
    fn save_block_bytes(&self, hash: &Hash, bytes: &[u8]) -> Result<(), CoreError> {
        let txn = self.db.begin_write().map_err(|e| CoreError::Storage(e.to_string()))?;
        {
            let mut table = txn.open_table(BLOCKS_TABLE).map_err(|e| CoreError::Storage(e.to_string()))?;
            table
                .insert(hash.as_bytes().as_slice(), bytes)
                .map_err(|e| CoreError::Storage(e.to_string()))?;
        }
        txn.commit().map_err(|e| CoreError::Storage(e.to_string()))
    }

    fn get_block_bytes(&self, hash: &Hash) -> Result<Option<Vec<u8>>, CoreError> {
        let txn = self.db.begin_read().map_err(|e| CoreError::Storage(e.to_string()))?;
        let table = txn.open_table(BLOCKS_TABLE).map_err(|e| CoreError::Storage(e.to_string()))?;
        Ok(table
            .get(hash.as_bytes().as_slice())
            .map_err(|e| CoreError::Storage(e.to_string()))?
            .map(|v| v.value().to_vec()))
    }

    fn save_namespace(&self, namespace: &[u8], entries: &[(Vec<u8>, Vec<u8>)]) -> Result<(), CoreError> {
        let bytes = bincode::serialize(entries).map_err(|e| CoreError::Codec(e.to_string()))?;
        let txn = self.db.begin_write().map_err(|e| CoreError::Storage(e.to_string()))?;
        {
            let mut table = txn.open_table(NAMESPACES_TABLE).map_err(|e| CoreError::Storage(e.to_string()))?;
            table.insert(namespace, bytes.as_slice()).map_err(|e| CoreError::Storage(e.to_string()))?;
        }
        txn.commit().map_err(|e| CoreError::Storage(e.to_string()))
    }

    fn load_namespace(&self, namespace: &[u8]) -> Result<Vec<(Vec<u8>, Vec<u8>)>, CoreError> {
        let txn = self.db.begin_read().map_err(|e| CoreError::Storage(e.to_string()))?;
        let table = txn.open_table(NAMESPACES_TABLE).map_err(|e| CoreError::Storage(e.to_string()))?;
        match table.get(namespace).map_err(|e| CoreError::Storage(e.to_string()))? {
            Some(bytes) => bincode::deserialize(bytes.value()).map_err(|e| CoreError::Codec(e.to_string())),
            None => Ok(Vec::new()),
        }
    }
}

pub type SharedStorage = Arc<dyn Storage>;
