//! Transaction payloads (spec.md §4.4): a tagged variant with a uniform
//! `Execute(tx, ...) -> (gas_used, error?)` contract — the richer of the two
//! divergent originals (Design Notes §9 Open Question).

use serde::{Deserialize, Serialize};

use crate::account::AccountState;
use crate::crypto::keccak256;
use crate::dpos::DposContext;
use crate::error::CoreError;
use crate::types::{Address, Payload, PayloadKind, Transaction, Uint128};
use crate::vm::ScriptEngine;

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct DeployPayload {
    pub code: Vec<u8>,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct CallPayload {
    pub function: String,
    pub args: Vec<u8>,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct VotePayload {
    pub candidate: Address,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum CandidateAction {
    Login,
    Logout,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct CandidatePayload {
    pub action: CandidateAction,
}

/// Deterministically derives a contract address from `from || nonce`
/// (spec.md §4.4 "Deploy").
pub fn derive_contract_address(from: Address, nonce: u64) -> Address {
    let mut buf = Vec::with_capacity(28);
    buf.extend_from_slice(from.as_slice());
    buf.extend_from_slice(&nonce.to_be_bytes());
    let digest = keccak256(buf);
    Address::from_slice(&digest[12..])
}

/// Execution context threaded through every payload variant. Kept as a
/// struct of `&mut` borrows rather than a god object, so each variant only
/// touches the state it needs.
pub struct ExecutionContext<'a> {
    pub account_state: &'a mut AccountState,
    pub dpos: &'a mut DposContext,
    pub engine: &'a dyn ScriptEngine,
}

/// Execute `tx.payload` against `ctx`. Every variant reports
/// `(gas_used, error)` uniformly; errors here are payload-level and are
/// caught by the caller's per-transaction checkpoint (spec.md §4.6) — they
/// never abort the containing block.
pub fn execute(tx: &Transaction, ctx: &mut ExecutionContext<'_>) -> (Uint128, Option<CoreError>) {
    match tx.payload.kind {
        PayloadKind::Binary => execute_binary(tx, ctx),
        PayloadKind::Deploy => execute_deploy(tx, ctx),
        PayloadKind::Call => execute_call(tx, ctx),
        PayloadKind::Vote => execute_vote(tx, ctx),
        PayloadKind::Candidate => execute_candidate(tx, ctx),
    }
}

fn execute_binary(tx: &Transaction, ctx: &mut ExecutionContext<'_>) -> (Uint128, Option<CoreError>) {
    if let Err(e) = ctx.account_state.sub_balance(tx.from, tx.value) {
        return (Uint128::ZERO, Some(e));
    }
    if let Err(e) = ctx.account_state.add_balance(tx.to, tx.value) {
        return (Uint128::ZERO, Some(e));
    }
    (Uint128::new(1), None)
}

fn execute_deploy(tx: &Transaction, ctx: &mut ExecutionContext<'_>) -> (Uint128, Option<CoreError>) {
    let decoded: DeployPayload = match bincode::deserialize(&tx.payload.bytes) {
        Ok(p) => p,
        Err(e) => return (Uint128::ZERO, Some(CoreError::Codec(e.to_string()))),
    };
    let expected_addr = derive_contract_address(tx.from, tx.nonce);
    if tx.to != expected_addr {
        return (Uint128::ZERO, Some(CoreError::InvalidContractAddress));
    }
    let gas_used = Uint128::new(1 + decoded.code.len() as u128);
    if gas_used > tx.gas_limit {
        return (Uint128::ZERO, Some(CoreError::OutOfGasLimit));
    }
    ctx.account_state.set_code(tx.to, &decoded.code);
    (gas_used, None)
}

fn execute_call(tx: &Transaction, ctx: &mut ExecutionContext<'_>) -> (Uint128, Option<CoreError>) {
    let decoded: CallPayload = match bincode::deserialize(&tx.payload.bytes) {
        Ok(p) => p,
        Err(e) => return (Uint128::ZERO, Some(CoreError::Codec(e.to_string()))),
    };
    let Some(code) = ctx.account_state.get_code(tx.to) else {
        return (Uint128::ZERO, Some(CoreError::InvalidContractAddress));
    };
    let mut storage = crate::vm::ScopedStorage::new(ctx.account_state.trie_mut(), tx.to);
    let result = ctx.engine.call(tx.to, &decoded.function, &decoded.args, &code, &mut storage, tx.gas_limit);
    match result {
        Ok(gas_used) => (gas_used, None),
        Err(e) => (Uint128::ZERO, Some(e)),
    }
}

fn execute_vote(tx: &Transaction, ctx: &mut ExecutionContext<'_>) -> (Uint128, Option<CoreError>) {
    let decoded: VotePayload = match bincode::deserialize(&tx.payload.bytes) {
        Ok(p) => p,
        Err(e) => return (Uint128::ZERO, Some(CoreError::Codec(e.to_string()))),
    };
    ctx.dpos.vote(tx.from, decoded.candidate);
    (Uint128::new(1), None)
}

fn execute_candidate(tx: &Transaction, ctx: &mut ExecutionContext<'_>) -> (Uint128, Option<CoreError>) {
    let decoded: CandidatePayload = match bincode::deserialize(&tx.payload.bytes) {
        Ok(p) => p,
        Err(e) => return (Uint128::ZERO, Some(CoreError::Codec(e.to_string()))),
    };
    match decoded.action {
        CandidateAction::Login => {
            ctx.dpos.login_candidate(tx.from);
            (Uint128::new(1), None)
        }
        CandidateAction::Logout => match ctx.dpos.kickout_candidate(tx.from) {
            Ok(()) => (Uint128::new(1), None),
            Err(e) => (Uint128::new(1), Some(e)),
        },
    }
}
