//! Account state (spec.md §4.2): a thin view over the trie mapping
//! address -> {balance, nonce}.

use crate::error::CoreError;
use crate::trie::Trie;
use crate::types::{Account, Address, Uint128};

pub struct AccountState {
    trie: Trie,
}

impl AccountState {
    pub fn new() -> Self {
        AccountState { trie: Trie::new() }
    }

    pub fn from_trie(trie: Trie) -> Self {
        AccountState { trie }
    }

    pub fn trie(&self) -> &Trie {
        &self.trie
    }

    pub fn trie_mut(&mut self) -> &mut Trie {
        &mut self.trie
    }

    fn load(&self, addr: Address) -> Account {
        match self.trie.get(addr.as_slice()) {
            Ok(bytes) => bincode::deserialize(&bytes).unwrap_or_default(),
            Err(_) => Account::default(),
        }
    }

    fn store(&mut self, addr: Address, account: Account) {
        let bytes = bincode::serialize(&account).expect("account encoding cannot fail");
        self.trie.put(addr.as_slice(), &bytes);
    }

    pub fn get_balance(&self, addr: Address) -> Uint128 {
        self.load(addr).balance
    }

    pub fn add_balance(&mut self, addr: Address, value: Uint128) -> Result<(), CoreError> {
        let mut account = self.load(addr);
        account.balance = account.balance.checked_add(value)?;
        self.store(addr, account);
        Ok(())
    }

    pub fn sub_balance(&mut self, addr: Address, value: Uint128) -> Result<(), CoreError> {
        let mut account = self.load(addr);
        if value > account.balance {
            return Err(CoreError::InsufficientBalance);
        }
        account.balance = account.balance.checked_sub(value)?;
        self.store(addr, account);
        Ok(())
    }

    pub fn get_nonce(&self, addr: Address) -> u64 {
        self.load(addr).nonce
    }

    pub fn set_nonce(&mut self, addr: Address, nonce: u64) {
        let mut account = self.load(addr);
        account.nonce = nonce;
        self.store(addr, account);
    }

    pub fn root_hash(&self) -> Result<crate::crypto::Hash, CoreError> {
        self.trie.root_hash()
    }

    fn code_key(addr: Address) -> Vec<u8> {
        let mut key = b"code:".to_vec();
        key.extend_from_slice(addr.as_slice());
        key
    }

    pub fn get_code(&self, addr: Address) -> Option<Vec<u8>> {
        self.trie.get(&Self::code_key(addr)).ok()
    }

    /// Stores `code` under `addr` (spec.md §4.4 "Deploy").
    pub fn set_code(&mut self, addr: Address, code: &[u8]) {
        self.trie.put(&Self::code_key(addr), code);
    }

    pub fn fork(&self) -> Self {
        AccountState { trie: self.trie.fork() }
    }
}

impl Default for AccountState {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn absent_account_has_zero_balance_and_nonce() {
        let state = AccountState::new();
        assert_eq!(state.get_balance(Address::ZERO), Uint128::ZERO);
        assert_eq!(state.get_nonce(Address::ZERO), 0);
    }

    #[test]
    fn add_then_sub_balance() {
        let mut state = AccountState::new();
        state.add_balance(Address::ZERO, Uint128::new(100)).unwrap();
        assert_eq!(state.get_balance(Address::ZERO), Uint128::new(100));
        state.sub_balance(Address::ZERO, Uint128::new(40)).unwrap();
        assert_eq!(state.get_balance(Address::ZERO), Uint128::new(60));
    }

    #[test]
    fn sub_balance_below_zero_fails() {
        let mut state = AccountState::new();
        state.add_balance(Address::ZERO, Uint128::new(10)).unwrap();
        assert_eq!(
            state.sub_balance(Address::ZERO, Uint128::new(11)),
            Err(CoreError::InsufficientBalance)
        );
    }

    #[test]
    fn nonce_set_and_get() {
        let mut state = AccountState::new();
        state.set_nonce(Address::ZERO, 7);
        assert_eq!(state.get_nonce(Address::ZERO), 7);
    }

    #[test]
    fn code_roundtrip() {
        let mut state = AccountState::new();
        assert_eq!(state.get_code(Address::ZERO), None);
        state.set_code(Address::ZERO, b"deployed-bytecode");
        assert_eq!(state.get_code(Address::ZERO), Some(b"deployed-bytecode".to_vec()));
    }

    #[test]
    fn root_hash_changes_with_state() {
        let mut state = AccountState::new();
        let empty = state.root_hash().unwrap();
        state.add_balance(Address::ZERO, Uint128::new(1)).unwrap();
        assert_ne!(empty, state.root_hash().unwrap());
    }
}
