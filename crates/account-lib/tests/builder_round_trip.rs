//! build → broadcast → from_raw → build reproduces the same transaction

use account_lib::avaxp::utils::cb58_encode;
use account_lib::avaxp::{KeyPair, Utxo};
use account_lib::sol::SolFields;
use account_lib::{
    AnyTransaction, BaseTransaction, CoinRegistry, TransactionBuilder, TransactionBuilderFactory,
    TransactionType,
};
use ed25519_dalek::SigningKey;
use proptest::prelude::*;

const BLOCKHASH: &str = "GHtXQBsoZHVnNFa9YevAzFr17DJjgHXk3ycTKD5xD3Zi";

/// base58 seed and address of a deterministic ed25519 key
fn sol_key(byte: u8) -> (String, String) {
    let seed = [byte; 32];
    let address = SigningKey::from_bytes(&seed).verifying_key().to_bytes();
    (
        bs58::encode(seed).into_string(),
        bs58::encode(address).into_string(),
    )
}

fn factory(coin: &str) -> TransactionBuilderFactory {
    TransactionBuilderFactory::new(&CoinRegistry::builtin(), coin).unwrap()
}

fn assert_round_trip(factory: &TransactionBuilderFactory, mut tx: AnyTransaction, expected: TransactionType) {
    assert!(tx.signing_state().is_fully_signed());
    let raw = tx.to_broadcast_format().unwrap();
    let mut parsed = factory.from_raw(&raw).unwrap();
    assert_eq!(parsed.transaction_type(), expected);
    let rebuilt = parsed.build().unwrap();
    assert_eq!(rebuilt.serialize().unwrap(), raw);
    assert_eq!(rebuilt.id(), tx.id());
    assert_eq!(rebuilt.to_json().unwrap(), tx.to_json().unwrap());
}

#[test]
fn test_every_solana_builder_round_trips() {
    let factory = factory("tsol");
    let (sender_seed, sender) = sol_key(1);
    let (_, receiver) = sol_key(2);
    let (nonce_seed, nonce_account) = sol_key(3);
    let (stake_seed, stake_account) = sol_key(4);
    let (_, validator) = sol_key(5);

    let mut transfer = factory.transfer_builder().unwrap();
    transfer
        .sender(&sender)
        .unwrap()
        .nonce(BLOCKHASH, None)
        .unwrap()
        .memo("rent");
    transfer.send(&receiver, "1000").unwrap().send(&receiver, "2000").unwrap();
    transfer.sign(&sender_seed).unwrap();
    assert_round_trip(&factory, AnyTransaction::Sol(transfer.build().unwrap()), TransactionType::Send);

    let mut token = factory.token_transfer_builder().unwrap();
    token.sender(&sender).unwrap().nonce(BLOCKHASH, None).unwrap();
    token.send(&receiver, "42", "tsol:usdc").unwrap();
    token.sign(&sender_seed).unwrap();
    assert_round_trip(&factory, AnyTransaction::Sol(token.build().unwrap()), TransactionType::Send);

    let mut wallet_init = factory.wallet_initialization_builder().unwrap();
    wallet_init
        .sender(&sender)
        .unwrap()
        .nonce(BLOCKHASH, None)
        .unwrap()
        .address(&nonce_account)
        .unwrap()
        .amount("1447680")
        .unwrap();
    wallet_init.sign(&sender_seed).unwrap().sign(&nonce_seed).unwrap();
    assert_round_trip(
        &factory,
        AnyTransaction::Sol(wallet_init.build().unwrap()),
        TransactionType::WalletInitialization,
    );

    let mut activate = factory.staking_activate_builder().unwrap();
    activate
        .sender(&sender)
        .unwrap()
        .nonce(BLOCKHASH, Some((nonce_account.as_str(), sender.as_str())))
        .unwrap()
        .staking_address(&stake_account)
        .unwrap()
        .amount("5000000000")
        .unwrap()
        .validator(&validator)
        .unwrap();
    activate.sign(&sender_seed).unwrap().sign(&stake_seed).unwrap();
    assert_round_trip(
        &factory,
        AnyTransaction::Sol(activate.build().unwrap()),
        TransactionType::StakingActivate,
    );

    let mut deactivate = factory.staking_deactivate_builder().unwrap();
    deactivate
        .sender(&sender)
        .unwrap()
        .nonce(BLOCKHASH, None)
        .unwrap()
        .staking_address(&stake_account)
        .unwrap();
    deactivate.sign(&sender_seed).unwrap();
    assert_round_trip(
        &factory,
        AnyTransaction::Sol(deactivate.build().unwrap()),
        TransactionType::StakingDeactivate,
    );

    let mut withdraw = factory.staking_withdraw_builder().unwrap();
    withdraw
        .sender(&sender)
        .unwrap()
        .nonce(BLOCKHASH, None)
        .unwrap()
        .staking_address(&stake_account)
        .unwrap()
        .amount("5000000000")
        .unwrap();
    withdraw.sign(&sender_seed).unwrap();
    assert_round_trip(
        &factory,
        AnyTransaction::Sol(withdraw.build().unwrap()),
        TransactionType::StakingWithdraw,
    );

    let mut ata = factory.ata_initialization_builder().unwrap();
    ata.sender(&sender)
        .unwrap()
        .nonce(BLOCKHASH, None)
        .unwrap()
        .mint("tsol:usdc")
        .unwrap();
    ata.sign(&sender_seed).unwrap();
    assert_round_trip(
        &factory,
        AnyTransaction::Sol(ata.build().unwrap()),
        TransactionType::AssociatedTokenAccountInitialization,
    );
}

const USER_KEY: &str = "1111111111111111111111111111111111111111111111111111111111111111";
const BITGO_KEY: &str = "2222222222222222222222222222222222222222222222222222222222222222";
const BACKUP_KEY: &str = "3333333333333333333333333333333333333333333333333333333333333333";
const START: u64 = 1_710_000_000;
const DAY: u64 = 24 * 60 * 60;

fn avax_address(key: &str) -> String {
    hex::encode(KeyPair::from_private_key_hex(key).unwrap().address())
}

fn validator_raw(stake: u64, balance: u64, recover: bool) -> Result<String, account_lib::Error> {
    let factory = factory("tavaxp");
    let (user, bitgo, backup) = (
        avax_address(USER_KEY),
        avax_address(BITGO_KEY),
        avax_address(BACKUP_KEY),
    );
    let mut builder = factory.validator_builder()?;
    builder
        .threshold(2)?
        .from_pubkey(&[&user, &bitgo, &backup])?
        .reward_addresses(&[&bitgo])?
        .utxos(vec![Utxo {
            output_id: 7,
            amount: balance.to_string(),
            txid: cb58_encode(&[9u8; 32]),
            outputidx: "1".to_string(),
        }])?
        .node_id("NodeID-MFrZFVCXPv5iCn6M9K6XduxGTYp891xXZ")?
        .start_time(START)
        .end_time(START + 21 * DAY)
        .stake_amount(stake)?
        .delegation_fee_rate(20_000)?
        .recover_mode(recover);
    let first = if recover { BACKUP_KEY } else { USER_KEY };
    builder.sign(first)?;
    let partial = builder.build()?;
    assert_eq!(partial.missing_signers(), vec![bitgo]);
    partial.serialize()
}

#[test]
fn test_validator_cosigning_round_trips() {
    let factory = factory("tavaxp");
    for recover in [false, true] {
        let raw = validator_raw(1_500_000_000, 2_000_000_000, recover).unwrap();
        let mut cosigner = factory.from_raw(&raw).unwrap();
        assert_eq!(cosigner.transaction_type(), TransactionType::AddValidator);
        cosigner.sign(BITGO_KEY).unwrap();
        let tx = cosigner.build().unwrap();
        assert_eq!(tx.outputs()[0].value, "1500000000");
        assert_round_trip(&factory, tx, TransactionType::AddValidator);
    }
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(32))]

    #[test]
    fn prop_transfer_amounts_survive_parsing(amounts in prop::collection::vec(1u64..=u64::MAX, 1..4)) {
        let factory = factory("tsol");
        let (sender_seed, sender) = sol_key(7);
        let (_, receiver) = sol_key(8);
        let mut builder = factory.transfer_builder().unwrap();
        builder.sender(&sender).unwrap().nonce(BLOCKHASH, None).unwrap();
        for amount in &amounts {
            builder.send(&receiver, &amount.to_string()).unwrap();
        }
        builder.sign(&sender_seed).unwrap();
        let tx = builder.build().unwrap();

        let mut parsed = factory.from_raw(&tx.serialize().unwrap()).unwrap();
        let rebuilt = parsed.build().unwrap();
        let values: Vec<String> = rebuilt.outputs().iter().map(|entry| entry.value.clone()).collect();
        let expected: Vec<String> = amounts.iter().map(u64::to_string).collect();
        prop_assert_eq!(values, expected);
    }

    #[test]
    fn prop_validator_change_balances(stake in 1_000_000_000u64..5_000_000_000, extra in 0u64..1_000_000_000) {
        let raw = validator_raw(stake, stake + extra, false).unwrap();
        let factory = factory("tavaxp");
        let rebuilt = factory.from_raw(&raw).unwrap().build().unwrap();
        let json = rebuilt.to_json().unwrap();
        let stake_str = stake.to_string();
        prop_assert_eq!(json["stakeAmount"].as_str(), Some(stake_str.as_str()));
        match rebuilt {
            AnyTransaction::AvaxP(tx) => {
                let change: u64 = tx.tx().base.outputs.iter().map(|output| output.amount).sum();
                prop_assert_eq!(change, extra);
            }
            AnyTransaction::Sol(_) => prop_assert!(false, "expected an Avalanche transaction"),
        }
    }
}
