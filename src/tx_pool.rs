//! Transaction pool (spec.md §4.3): a priority cache ordered by
//! (gas_price desc, timestamp asc, hash asc), shared behind a mutex so
//! `Push`/`Pop` are safe under parallel callers (spec.md §5).

use std::collections::{BTreeSet, HashMap, HashSet, VecDeque};
use std::sync::Mutex;

use crate::crypto::Hash;
use crate::error::CoreError;
use crate::types::{Transaction, Uint128};

#[derive(Clone, Debug)]
struct PoolEntry {
    hash: Hash,
    gas_price: Uint128,
    timestamp: i64,
}

impl PartialEq for PoolEntry {
    fn eq(&self, other: &Self) -> bool {
        self.hash == other.hash
    }
}

impl Eq for PoolEntry {}

impl Ord for PoolEntry {
    fn cmp(&self, other: &Self) -> std::cmp::Ordering {
        other
            .gas_price
            .cmp(&self.gas_price)
            .then_with(|| self.timestamp.cmp(&other.timestamp))
            .then_with(|| self.hash.cmp(&other.hash))
    }
}

impl PartialOrd for PoolEntry {
    fn partial_cmp(&self, other: &Self) -> Option<std::cmp::Ordering> {
        Some(self.cmp(other))
    }
}

struct PoolInner {
    transactions: HashMap<Hash, Transaction>,
    order: BTreeSet<PoolEntry>,
    recently_seen: VecDeque<Hash>,
    recently_seen_set: HashSet<Hash>,
}

/// Bounded priority cache. `capacity` bounds pooled transactions (lowest
/// priority evicted on overflow); `recently_seen_capacity` bounds the LRU
/// dedup set of hashes no longer pooled (evicted or popped).
pub struct TxPool {
    inner: Mutex<PoolInner>,
    capacity: usize,
    recently_seen_capacity: usize,
}

impl TxPool {
    pub fn new(capacity: usize, recently_seen_capacity: usize) -> Self {
        TxPool {
            inner: Mutex::new(PoolInner {
                transactions: HashMap::new(),
                order: BTreeSet::new(),
                recently_seen: VecDeque::new(),
                recently_seen_set: HashSet::new(),
            }),
            capacity,
            recently_seen_capacity,
        }
    }

    fn mark_recently_seen(inner: &mut PoolInner, hash: Hash, recently_seen_capacity: usize) {
        if inner.recently_seen_set.insert(hash) {
            inner.recently_seen.push_back(hash);
            if inner.recently_seen.len() > recently_seen_capacity {
                if let Some(evicted) = inner.recently_seen.pop_front() {
                    inner.recently_seen_set.remove(&evicted);
                }
            }
        }
    }

    /// `Push(tx)`: validates hash recomputation, signature recovery, chain
    /// id, and non-duplication, then inserts in priority order.
    pub fn push(&self, tx: Transaction, local_chain_id: u32) -> Result<(), CoreError> {
        tx.validate(local_chain_id)?;

        let mut inner = self.inner.lock().unwrap();
        if inner.transactions.contains_key(&tx.hash) || inner.recently_seen_set.contains(&tx.hash) {
            return Err(CoreError::DuplicatedTransaction);
        }

        let entry = PoolEntry { hash: tx.hash, gas_price: tx.gas_price, timestamp: tx.timestamp };
        inner.transactions.insert(tx.hash, tx);
        inner.order.insert(entry);

        if inner.transactions.len() > self.capacity {
            if let Some(lowest) = inner.order.iter().next_back().cloned() {
                inner.order.remove(&lowest);
                inner.transactions.remove(&lowest.hash);
                Self::mark_recently_seen(&mut inner, lowest.hash, self.recently_seen_capacity);
            }
        }
        Ok(())
    }

    /// `Pop() -> tx | empty`: removes and returns the highest-priority
    /// transaction. No nonce gating — that lives in the block engine.
    pub fn pop(&self) -> Option<Transaction> {
        let mut inner = self.inner.lock().unwrap();
        let head = inner.order.iter().next().cloned()?;
        inner.order.remove(&head);
        let tx = inner.transactions.remove(&head.hash);
        Self::mark_recently_seen(&mut inner, head.hash, self.recently_seen_capacity);
        tx
    }

    pub fn len(&self) -> usize {
        self.inner.lock().unwrap().transactions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::crypto::{generate_keypair, sign};
    use crate::types::{Address, Payload, PayloadKind};

    fn make_tx(from_key: &crate::crypto::SecretKey, from: Address, nonce: u64, gas_price: u128, timestamp: i64) -> Transaction {
        let tx = Transaction::new_unsigned(
            from,
            Address::ZERO,
            Uint128::new(1),
            nonce,
            timestamp,
            Payload { kind: PayloadKind::Binary, bytes: vec![] },
            1,
            Uint128::new(gas_price),
            Uint128::new(21_000),
        );
        let sig = sign(from_key, tx.hash.as_bytes());
        let pk = crate::crypto::PublicKey::from_verifying_key(from_key.verifying_key());
        tx.with_signature(&pk, sig).unwrap()
    }

    #[test]
    fn push_rejects_invalid_signature() {
        let pool = TxPool::new(16, 16);
        let (pk, sk) = generate_keypair();
        let mut tx = make_tx(&sk, pk.address(), 0, 10, 1);
        tx.value = Uint128::new(999);
        assert_eq!(pool.push(tx, 1), Err(CoreError::InvalidTransactionHash));
    }

    #[test]
    fn push_rejects_duplicate() {
        let pool = TxPool::new(16, 16);
        let (pk, sk) = generate_keypair();
        let tx = make_tx(&sk, pk.address(), 0, 10, 1);
        assert!(pool.push(tx.clone(), 1).is_ok());
        assert_eq!(pool.push(tx, 1), Err(CoreError::DuplicatedTransaction));
    }

    #[test]
    fn pop_orders_by_gas_price_desc_then_timestamp_asc_then_hash_asc() {
        let pool = TxPool::new(16, 16);
        let (pk_a, sk_a) = generate_keypair();
        let (pk_b, sk_b) = generate_keypair();

        let low_gas = make_tx(&sk_a, pk_a.address(), 0, 5, 100);
        let high_gas_later = make_tx(&sk_b, pk_b.address(), 0, 10, 200);
        let high_gas_earlier = make_tx(&sk_a, pk_a.address(), 1, 10, 50);

        pool.push(low_gas.clone(), 1).unwrap();
        pool.push(high_gas_later.clone(), 1).unwrap();
        pool.push(high_gas_earlier.clone(), 1).unwrap();

        assert_eq!(pool.pop().unwrap().hash, high_gas_earlier.hash);
        assert_eq!(pool.pop().unwrap().hash, high_gas_later.hash);
        assert_eq!(pool.pop().unwrap().hash, low_gas.hash);
        assert!(pool.pop().is_none());
    }

    #[test]
    fn overflow_evicts_lowest_priority_entry() {
        let pool = TxPool::new(2, 16);
        let (pk_a, sk_a) = generate_keypair();
        let (pk_b, sk_b) = generate_keypair();
        let (pk_c, sk_c) = generate_keypair();

        let low = make_tx(&sk_a, pk_a.address(), 0, 1, 1);
        let mid = make_tx(&sk_b, pk_b.address(), 0, 5, 1);
        let high = make_tx(&sk_c, pk_c.address(), 0, 10, 1);

        pool.push(low.clone(), 1).unwrap();
        pool.push(mid.clone(), 1).unwrap();
        assert_eq!(pool.len(), 2);
        pool.push(high.clone(), 1).unwrap();
        assert_eq!(pool.len(), 2);

        assert_eq!(pool.pop().unwrap().hash, high.hash);
        assert_eq!(pool.pop().unwrap().hash, mid.hash);
        assert!(pool.pop().is_none());
    }

    #[test]
    fn evicted_then_resubmitted_hash_is_rejected_as_duplicate() {
        let pool = TxPool::new(1, 16);
        let (pk_a, sk_a) = generate_keypair();
        let (pk_b, sk_b) = generate_keypair();

        let low = make_tx(&sk_a, pk_a.address(), 0, 1, 1);
        let high = make_tx(&sk_b, pk_b.address(), 0, 10, 1);

        pool.push(low.clone(), 1).unwrap();
        pool.push(high, 1).unwrap();

        assert_eq!(pool.push(low, 1), Err(CoreError::DuplicatedTransaction));
    }
}
