use dpos_core::block::{verify_block, BlockBuilder, ChainedBlock};
use dpos_core::consensus::SingleProducerConsensus;
use dpos_core::crypto::{generate_keypair, sign};
use dpos_core::error::CoreError;
use dpos_core::payload::DeployPayload;
use dpos_core::tx_pool::TxPool;
use dpos_core::types::{Address, Payload, PayloadKind, Transaction, Uint128};
use dpos_core::vm::MeteredNullEngine;

fn sign_tx(tx: Transaction, sk: &dpos_core::crypto::SecretKey) -> Transaction {
    let sig = sign(sk, tx.hash.as_bytes());
    let pk = dpos_core::crypto::PublicKey::from_verifying_key(sk.verifying_key());
    tx.with_signature(&pk, sig).unwrap()
}

#[test]
fn assembled_block_seals_links_and_verifies_across_the_wire() {
    let _ = env_logger::try_init();
    let coinbase = Address::repeat_byte(0xAA);
    let mut genesis = BlockBuilder::genesis(1, coinbase, 0, Uint128::new(1_000_000));
    genesis.seal().unwrap();
    let genesis_chained = ChainedBlock::genesis(genesis.to_block());
    assert_eq!(genesis_chained.height, 1);

    let (pk, _sk) = generate_keypair();
    let pool = TxPool::new(8, 8);
    let engine = MeteredNullEngine::default();

    let mut child = BlockBuilder::new_block(1, coinbase, 1, &genesis, Uint128::new(1_000_000));
    assert_eq!(child.account_state().get_nonce(pk.address()), 0);

    child.collect_transactions(&pool, 10, &engine, 128, None);
    assert!(child.transactions().is_empty());

    let coinbase_balance_before_seal = child.account_state().get_balance(coinbase);
    child.seal().unwrap();
    assert_eq!(
        child.account_state().get_balance(coinbase),
        coinbase_balance_before_seal.checked_add(dpos_core::block::BLOCK_REWARD).unwrap()
    );

    let wire = child.to_block();
    let mut child_chained = ChainedBlock { block: wire.clone(), height: 0 };
    assert!(child_chained.link_parent_block(&genesis_chained));
    assert_eq!(child_chained.height, 2);

    let encoded = bincode::serialize(&wire).unwrap();
    let decoded = bincode::deserialize(&encoded).unwrap();

    let consensus = SingleProducerConsensus;
    let verified = verify_block(&decoded, &genesis, 1, &consensus, &engine);
    assert!(verified.is_ok(), "verify failed: {:?}", verified.err());
}

#[test]
fn deploy_payload_exceeding_gas_limit_is_recorded_as_failed_but_still_included() {
    let _ = env_logger::try_init();
    let coinbase = Address::repeat_byte(0xBB);
    let mut genesis = BlockBuilder::genesis(1, coinbase, 0, Uint128::new(1_000_000));
    genesis.seal().unwrap();

    let (pk, sk) = generate_keypair();
    let pool = TxPool::new(4, 4);

    let deploy_bytes = bincode::serialize(&DeployPayload { code: vec![1; 64] }).unwrap();
    let contract = dpos_core::payload::derive_contract_address(pk.address(), 0);
    let tx = Transaction::new_unsigned(
        pk.address(),
        contract,
        Uint128::ZERO,
        0,
        10,
        Payload { kind: PayloadKind::Deploy, bytes: deploy_bytes },
        1,
        Uint128::new(1),
        Uint128::new(10), // too small for 64 bytes of code (cost = 1 + len)
    );
    let tx = sign_tx(tx, &sk);
    pool.push(tx, 1).unwrap();

    let mut child = BlockBuilder::new_block(1, coinbase, 1, &genesis, Uint128::new(1_000_000));
    let engine = MeteredNullEngine::default();
    child.collect_transactions(&pool, 1, &engine, 128, None);

    assert_eq!(child.transactions().len(), 1);
    assert_eq!(child.account_state().get_code(contract), None, "failed deploy must not persist code");
}

#[test]
fn double_seal_reports_error_not_panic() {
    let mut genesis = BlockBuilder::genesis(1, Address::ZERO, 0, Uint128::new(1_000_000));
    genesis.seal().unwrap();
    assert_eq!(genesis.seal(), Err(CoreError::DoubleSealBlock));
}
