//! Solana transactions signed by the 2-of-3 TSS ceremony

use account_lib::sol::{SolFields, SolTransaction};
use account_lib::{
    AnyTransaction, BaseTransaction, CoinRegistry, SigningState, TransactionBuilder,
    TransactionBuilderFactory, TransactionType,
};
use ed25519_dalek::{Signature as DalekSignature, Verifier, VerifyingKey};
use tss_core::keychain::{
    create_keychains, public_key_from_common_keychain, sign_tx_request, KeychainsTriplet,
    MemoryKeychainStore, PasswordEncryptor, TxRequest, UnsignedTx,
};
use tss_core::mpc::{CancellationToken, MemoryRelay};
use tss_core::{Party, Signature, TssConfig};

const PASSPHRASE: &str = "validator rewards go here";
const BLOCKHASH: &str = "GHtXQBsoZHVnNFa9YevAzFr17DJjgHXk3ycTKD5xD3Zi";
const RECEIVER: &str = "7xKXtg2CW87d97TXJSDpbD5jBkheTqA83TZRuJosgAsU";

fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .with_test_writer()
        .try_init();
}

async fn wallet() -> KeychainsTriplet {
    create_keychains(&MemoryKeychainStore::new(), &PasswordEncryptor::new(), PASSPHRASE)
        .await
        .unwrap()
}

async fn tss_sign(keychains: &KeychainsTriplet, id: &str, payload: &[u8]) -> Signature {
    let request = TxRequest {
        tx_request_id: id.to_string(),
        wallet_id: "sol-wallet".to_string(),
        attempt: 0,
        unsigned_tx: UnsignedTx {
            signable_hex: hex::encode(payload),
            derivation_path: "m".to_string(),
            serialized_tx_hex: None,
        },
    };
    let relay = MemoryRelay::new();
    let encryptor = PasswordEncryptor::new();
    let config = TssConfig::default();
    let cancel = CancellationToken::new();
    let user_prv = keychains.user.encrypted_prv.as_deref().unwrap();
    let backup_prv = keychains.backup.encrypted_prv.as_deref().unwrap();

    let (by_user, by_backup) = tokio::join!(
        sign_tx_request(
            &relay, &encryptor, &request, user_prv, PASSPHRASE, Party::Backup, &config, &cancel
        ),
        sign_tx_request(
            &relay, &encryptor, &request, backup_prv, PASSPHRASE, Party::User, &config, &cancel
        ),
    );
    let signature = by_user.unwrap();
    assert_eq!(signature, by_backup.unwrap());
    signature
}

fn unsigned_transfer(factory: &TransactionBuilderFactory, sender: &str) -> SolTransaction {
    let mut builder = factory.transfer_builder().unwrap();
    builder
        .sender(sender)
        .unwrap()
        .nonce(BLOCKHASH, None)
        .unwrap()
        .memo("tss e2e");
    builder.send(RECEIVER, "250000000").unwrap();
    builder.build().unwrap()
}

#[tokio::test]
async fn test_tss_signed_transfer_round_trips() {
    init_tracing();
    let keychains = wallet().await;
    let wallet_address =
        public_key_from_common_keychain(keychains.user.common_keychain.as_str()).unwrap();

    let registry = CoinRegistry::builtin();
    let factory = TransactionBuilderFactory::new(&registry, "tsol").unwrap();
    let mut tx = unsigned_transfer(&factory, &wallet_address);
    assert_eq!(tx.signing_state(), SigningState::Unbuilt);
    assert_eq!(tx.missing_signers(), vec![wallet_address.clone()]);
    assert!(matches!(
        tx.to_broadcast_format(),
        Err(account_lib::Error::NotFullySigned { .. })
    ));

    let payload = tx.signable_payload();
    let signature = tss_sign(&keychains, "sol-tx-1", &payload).await;
    assert_eq!(bs58::encode(signature.y).into_string(), wallet_address);

    let key = VerifyingKey::from_bytes(&signature.y).unwrap();
    let dalek = DalekSignature::from_bytes(&signature.to_bytes());
    assert!(key.verify(&payload, &dalek).is_ok());

    tx.add_signature(&wallet_address, &signature.to_bytes()).unwrap();
    assert!(tx.signing_state().is_fully_signed());
    assert_eq!(
        tx.id(),
        Some(bs58::encode(signature.to_bytes()).into_string())
    );
    let broadcast = tx.to_broadcast_format().unwrap();
    assert!(tx.is_sealed());

    let mut parsed = factory.from_raw(&broadcast).unwrap();
    assert_eq!(parsed.transaction_type(), TransactionType::Send);
    let rebuilt = parsed.build().unwrap();
    assert!(matches!(rebuilt, AnyTransaction::Sol(_)));
    assert!(rebuilt.signing_state().is_fully_signed());
    assert_eq!(rebuilt.serialize().unwrap(), broadcast);
    assert_eq!(rebuilt.signable_payload(), payload);
}

#[tokio::test]
async fn test_signature_over_other_payload_is_rejected() {
    init_tracing();
    let keychains = wallet().await;
    let wallet_address =
        public_key_from_common_keychain(keychains.user.common_keychain.as_str()).unwrap();

    let registry = CoinRegistry::builtin();
    let factory = TransactionBuilderFactory::new(&registry, "tsol").unwrap();
    let mut tx = unsigned_transfer(&factory, &wallet_address);

    let signature = tss_sign(&keychains, "sol-tx-2", b"not this transaction").await;
    assert!(matches!(
        tx.add_signature(&wallet_address, &signature.to_bytes()),
        Err(account_lib::Error::InvalidSignature(_))
    ));
    assert_eq!(tx.signing_state(), SigningState::Unbuilt);
}
