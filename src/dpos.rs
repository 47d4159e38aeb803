//! DPoS context (spec.md §3, §4.5): five sibling tries committed atomically
//! alongside account state.

use crate::crypto::Hash;
use crate::error::CoreError;
use crate::trie::Trie;
use crate::types::Address;

/// Fixed sub-root order normative for the combined DPoS root (spec.md §3,
/// Design Notes §9 Open Question resolution).
const SUB_TRIE_COUNT: usize = 5;

pub struct DposContext {
    pub candidate: Trie,
    pub delegate: Trie,
    pub vote: Trie,
    pub dynasty: Trie,
    pub next_dynasty: Trie,
}

impl DposContext {
    pub fn new() -> Self {
        DposContext {
            candidate: Trie::new(),
            delegate: Trie::new(),
            vote: Trie::new(),
            dynasty: Trie::new(),
            next_dynasty: Trie::new(),
        }
    }

    /// `Clone()`: forks all five tries (copy-on-write).
    pub fn fork(&self) -> Self {
        DposContext {
            candidate: self.candidate.fork(),
            delegate: self.delegate.fork(),
            vote: self.vote.fork(),
            dynasty: self.dynasty.fork(),
            next_dynasty: self.next_dynasty.fork(),
        }
    }

    fn delegate_key(candidate: Address, delegator: Address) -> Vec<u8> {
        let mut key = Vec::with_capacity(40);
        key.extend_from_slice(candidate.as_slice());
        key.extend_from_slice(delegator.as_slice());
        key
    }

    /// Merkle root over `[candidate, delegate, vote, dynasty, next_dynasty]`
    /// sub-roots, in that fixed order.
    pub fn root_hash(&self) -> Result<Hash, CoreError> {
        let roots = [
            self.candidate.root_hash()?,
            self.delegate.root_hash()?,
            self.vote.root_hash()?,
            self.dynasty.root_hash()?,
            self.next_dynasty.root_hash()?,
        ];
        let mut combined = Trie::new();
        for (i, root) in roots.iter().enumerate() {
            combined.put(&(i as u8).to_be_bytes(), root.as_bytes());
        }
        debug_assert_eq!(roots.len(), SUB_TRIE_COUNT);
        combined.root_hash()
    }

    pub fn is_candidate(&self, addr: Address) -> bool {
        self.candidate.contains(addr.as_slice())
    }

    pub fn login_candidate(&mut self, addr: Address) {
        self.candidate.put(addr.as_slice(), addr.as_slice());
    }

    /// Record `delegator`'s vote for `candidate`, removing any prior vote
    /// edge by the same delegator (spec.md §4.4 "Vote").
    pub fn vote(&mut self, delegator: Address, candidate: Address) {
        if let Ok(prior_bytes) = self.vote.get(delegator.as_slice()) {
            if prior_bytes.len() == 20 {
                let prior = Address::from_slice(&prior_bytes);
                let _ = self.delegate.del(&Self::delegate_key(prior, delegator));
            }
        }
        self.vote.put(delegator.as_slice(), candidate.as_slice());
        self.delegate.put(&Self::delegate_key(candidate, delegator), delegator.as_slice());
    }

    /// Subroutine shared by candidate-logout and consensus-driven eviction
    /// (spec.md §4.5): removes all delegate edges under `addr`, revokes
    /// dependent votes, and removes `addr` from `candidate`/`dynasty`/`next_dynasty`.
    pub fn kickout_candidate(&mut self, addr: Address) -> Result<(), CoreError> {
        if let Ok(entries) = self.delegate.iter_prefix(addr.as_slice()) {
            for (key, delegator_bytes) in entries {
                self.delegate.del(&key).ok();
                let delegator = Address::from_slice(&delegator_bytes);
                if let Ok(voted_for) = self.vote.get(delegator.as_slice()) {
                    if voted_for == addr.as_slice() {
                        self.vote.del(delegator.as_slice()).ok();
                    }
                }
            }
        }
        self.candidate.del(addr.as_slice()).ok();
        self.dynasty.del(addr.as_slice()).ok();
        self.next_dynasty.del(addr.as_slice()).ok();
        Ok(())
    }

    pub fn snapshot(&self) -> DposSnapshot {
        DposSnapshot {
            candidate: self.candidate.snapshot(),
            delegate: self.delegate.snapshot(),
            vote: self.vote.snapshot(),
            dynasty: self.dynasty.snapshot(),
            next_dynasty: self.next_dynasty.snapshot(),
        }
    }

    pub fn restore(&mut self, snapshot: DposSnapshot) {
        self.candidate.restore(snapshot.candidate);
        self.delegate.restore(snapshot.delegate);
        self.vote.restore(snapshot.vote);
        self.dynasty.restore(snapshot.dynasty);
        self.next_dynasty.restore(snapshot.next_dynasty);
    }
}

impl Default for DposContext {
    fn default() -> Self {
        Self::new()
    }
}

pub struct DposSnapshot {
    candidate: crate::trie::TrieSnapshot,
    delegate: crate::trie::TrieSnapshot,
    vote: crate::trie::TrieSnapshot,
    dynasty: crate::trie::TrieSnapshot,
    next_dynasty: crate::trie::TrieSnapshot,
}
