//! Solana transaction builders
//!
//! Every builder embeds a [`SolBuilderCore`] holding the fields all
//! Solana transactions share: fee payer, recent blockhash or durable nonce,
//! memo and queued signing keys. The per-type builders only contribute the
//! body instructions.

mod ata_init;
mod staking;
mod token_transfer;
mod transfer;
mod wallet_init;

pub use ata_init::AtaInitializationBuilder;
pub use staking::{StakingActivateBuilder, StakingDeactivateBuilder, StakingWithdrawBuilder};
pub use token_transfer::TokenTransferBuilder;
pub use transfer::TransferBuilder;
pub use wallet_init::WalletInitializationBuilder;

use super::params::{detect_transaction_type, instruction_params_factory, InstructionParams};
use super::pubkey::{Hash, Pubkey};
use super::transaction::SolTransaction;
use super::wire::{self, Message, PACKET_DATA_SIZE, SIGNATURE_LEN};
use crate::builder::{TransactionBuilder, TransactionType};
use crate::coins::{CoinConfig, CoinFamily, CoinRegistry};
use crate::{Error, Result};
use base64::{engine::general_purpose::STANDARD, Engine as _};
use ed25519_dalek::{Signer, SigningKey};
use tracing::{debug, instrument};

/// Durable nonce account replacing the recent blockhash
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DurableNonce {
    pub wallet_nonce_address: Pubkey,
    pub auth_wallet_address: Pubkey,
}

#[derive(Clone, Debug)]
struct RawState {
    message_bytes: Vec<u8>,
    signatures: Vec<(Pubkey, [u8; SIGNATURE_LEN])>,
}

/// Fields shared by every Solana builder
#[derive(Clone, Debug)]
pub struct SolBuilderCore {
    coin: CoinConfig,
    tokens: Vec<CoinConfig>,
    sender: Option<Pubkey>,
    nonce: Option<Hash>,
    durable_nonce: Option<DurableNonce>,
    memo: Option<String>,
    signers: Vec<SigningKey>,
    raw: Option<RawState>,
}

/// Parse a positive base-unit amount
pub(crate) fn parse_amount(field: &str, value: &str) -> Result<u64> {
    match value.parse::<u64>() {
        Ok(amount) if amount > 0 => Ok(amount),
        _ => Err(Error::build(field, value)),
    }
}

/// Base58 ed25519 secret: a 32-byte seed or a 64-byte keypair
pub(crate) fn parse_signing_key(key: &str) -> Result<SigningKey> {
    let bytes = bs58::decode(key)
        .into_vec()
        .map_err(|_| Error::InvalidKey("private key is not base58".into()))?;
    match bytes.len() {
        32 => {
            let mut seed = [0u8; 32];
            seed.copy_from_slice(&bytes);
            Ok(SigningKey::from_bytes(&seed))
        }
        64 => {
            let mut keypair = [0u8; 64];
            keypair.copy_from_slice(&bytes);
            SigningKey::from_keypair_bytes(&keypair)
                .map_err(|_| Error::InvalidKey("keypair halves do not match".into()))
        }
        n => Err(Error::InvalidKey(format!(
            "private key must be 32 or 64 bytes, got {}",
            n
        ))),
    }
}

impl SolBuilderCore {
    pub fn new(coin: &CoinConfig, registry: &CoinRegistry) -> Result<Self> {
        if coin.family != CoinFamily::Sol {
            return Err(Error::NotSupported(format!(
                "{} is not a Solana coin",
                coin.name
            )));
        }
        let tokens = registry
            .iter()
            .filter(|candidate| candidate.is_token() && candidate.network == coin.network)
            .cloned()
            .collect();
        Ok(Self {
            coin: coin.clone(),
            tokens,
            sender: None,
            nonce: None,
            durable_nonce: None,
            memo: None,
            signers: Vec::new(),
            raw: None,
        })
    }

    pub fn coin(&self) -> &CoinConfig {
        &self.coin
    }

    /// Fee payer, required by every transaction
    pub fn sender(&self) -> Result<Pubkey> {
        self.sender.ok_or_else(|| Error::build("sender", "none"))
    }

    pub fn set_sender(&mut self, address: &str) -> Result<()> {
        self.sender = Some(Pubkey::parse_field("sender", address)?);
        Ok(())
    }

    pub fn set_nonce(&mut self, blockhash: &str, durable_nonce: Option<(&str, &str)>) -> Result<()> {
        let nonce = Pubkey::parse_field("nonce", blockhash)?;
        let durable_nonce = durable_nonce
            .map(|(wallet_nonce_address, auth_wallet_address)| {
                Ok::<_, Error>(DurableNonce {
                    wallet_nonce_address: Pubkey::parse_field(
                        "walletNonceAddress",
                        wallet_nonce_address,
                    )?,
                    auth_wallet_address: Pubkey::parse_field(
                        "authWalletAddress",
                        auth_wallet_address,
                    )?,
                })
            })
            .transpose()?;
        self.nonce = Some(nonce);
        self.durable_nonce = durable_nonce;
        Ok(())
    }

    pub fn set_memo(&mut self, memo: &str) {
        self.memo = Some(memo.to_string());
    }

    pub fn add_signer(&mut self, key: &str) -> Result<()> {
        let signing_key = parse_signing_key(key)?;
        let public_key = signing_key.verifying_key();
        if self
            .signers
            .iter()
            .any(|queued| queued.verifying_key() == public_key)
        {
            return Err(Error::DuplicateSigner(
                Pubkey(public_key.to_bytes()).to_string(),
            ));
        }
        self.signers.push(signing_key);
        Ok(())
    }

    /// Token coin configured on this network under `name`
    pub fn token(&self, name: &str) -> Result<(&CoinConfig, Pubkey, u8)> {
        let coin = self
            .tokens
            .iter()
            .find(|token| token.name == name)
            .ok_or_else(|| Error::build("tokenName", name))?;
        let (mint, decimals) = coin.token().ok_or_else(|| Error::build("tokenName", name))?;
        Ok((coin, Pubkey::parse_field("mint", mint)?, decimals))
    }

    /// Decode `raw` into the shared fields and return the body params
    pub fn load_raw(&mut self, raw: &str) -> Result<(TransactionType, Vec<InstructionParams>)> {
        let bytes = STANDARD
            .decode(raw.trim())
            .map_err(|e| Error::parse("raw transaction", e))?;
        if bytes.len() > PACKET_DATA_SIZE {
            return Err(Error::parse(
                "raw transaction",
                format!("{} bytes exceeds the packet limit", bytes.len()),
            ));
        }
        let (signatures, message) = wire::decode_transaction(&bytes)?;
        let instructions = message.decompile()?;
        let tx_type = detect_transaction_type(&instructions)?;
        let params = instruction_params_factory(tx_type, &instructions, &self.tokens)?;

        let fee_payer = *message
            .fee_payer()
            .ok_or_else(|| Error::parse("accountKeys", "no fee payer"))?;
        self.sender = Some(fee_payer);
        self.nonce = Some(message.recent_blockhash);
        self.durable_nonce = None;
        self.memo = None;

        let mut body = Vec::with_capacity(params.len());
        for param in params {
            match param {
                InstructionParams::NonceAdvance {
                    wallet_nonce_address,
                    auth_wallet_address,
                } => {
                    self.durable_nonce = Some(DurableNonce {
                        wallet_nonce_address,
                        auth_wallet_address,
                    })
                }
                InstructionParams::Memo { memo } => self.memo = Some(memo),
                other => body.push(other),
            }
        }

        let signatures = message
            .signer_keys()
            .iter()
            .zip(signatures)
            .filter(|(_, signature)| signature.iter().any(|b| *b != 0))
            .map(|(key, signature)| (*key, signature))
            .collect::<Vec<_>>();
        debug!(
            tx_type = %tx_type,
            signatures = signatures.len(),
            "loaded raw solana transaction"
        );
        self.raw = Some(RawState {
            message_bytes: message.serialize()?,
            signatures,
        });
        Ok((tx_type, body))
    }

    /// Compile `body` with the shared fields and apply signatures
    #[instrument(skip(self, body), fields(coin = %self.coin.name))]
    pub fn build_transaction(
        &self,
        tx_type: TransactionType,
        body: Vec<InstructionParams>,
    ) -> Result<SolTransaction> {
        let sender = self.sender()?;
        let nonce = self.nonce.ok_or_else(|| Error::build("nonce", "none"))?;

        let mut params = Vec::with_capacity(body.len() + 2);
        if let Some(durable) = &self.durable_nonce {
            params.push(InstructionParams::NonceAdvance {
                wallet_nonce_address: durable.wallet_nonce_address,
                auth_wallet_address: durable.auth_wallet_address,
            });
        }
        params.extend(body);
        if let Some(memo) = &self.memo {
            params.push(InstructionParams::Memo { memo: memo.clone() });
        }

        let instructions: Vec<_> = params.iter().flat_map(|p| p.instructions()).collect();
        let message = Message::compile(&sender, &instructions, nonce)?;
        let mut tx = SolTransaction::new(&self.coin.name, tx_type, message, params)?;

        if let Some(raw) = &self.raw {
            if raw.message_bytes == tx.signable_payload_bytes() {
                for (signer, signature) in &raw.signatures {
                    tx.attach(signer, *signature)?;
                }
            } else if !raw.signatures.is_empty() {
                debug!("message changed since parsing, dropping collected signatures");
            }
        }

        let payload = tx.signable_payload_bytes().to_vec();
        for key in &self.signers {
            let signer = Pubkey(key.verifying_key().to_bytes());
            tx.attach(&signer, key.sign(&payload).to_bytes())?;
        }
        debug!(tx_type = %tx_type, "built solana transaction");
        Ok(tx)
    }
}

/// Setters shared by every Solana builder
pub trait SolFields: Sized {
    fn core_mut(&mut self) -> &mut SolBuilderCore;

    /// Fee payer address
    fn sender(&mut self, address: &str) -> Result<&mut Self> {
        self.core_mut().set_sender(address)?;
        Ok(self)
    }

    /// Recent blockhash, or the stored value of a durable nonce account
    /// given as `(nonce account, nonce authority)`
    fn nonce(&mut self, blockhash: &str, durable_nonce: Option<(&str, &str)>) -> Result<&mut Self> {
        self.core_mut().set_nonce(blockhash, durable_nonce)?;
        Ok(self)
    }

    fn memo(&mut self, memo: &str) -> &mut Self {
        self.core_mut().set_memo(memo);
        self
    }
}

pub(crate) fn expect_type(expected: TransactionType, actual: TransactionType) -> Result<()> {
    if expected != actual {
        return Err(Error::NotSupported(format!(
            "expected a {} transaction, got {}",
            expected, actual
        )));
    }
    Ok(())
}

pub(crate) fn expect_sender(sender: &Pubkey, from_address: &Pubkey) -> Result<()> {
    if sender != from_address {
        return Err(Error::parse(
            "fromAddress",
            format!("{} is not the fee payer {}", from_address, sender),
        ));
    }
    Ok(())
}

pub(crate) fn unexpected(params: &InstructionParams) -> Error {
    Error::NotSupported(format!(
        "Invalid transaction, unexpected instruction {:?}",
        params
    ))
}

/// Closed set of Solana builders
#[derive(Clone)]
pub enum SolBuilder {
    Transfer(TransferBuilder),
    TokenTransfer(TokenTransferBuilder),
    WalletInitialization(WalletInitializationBuilder),
    StakingActivate(StakingActivateBuilder),
    StakingDeactivate(StakingDeactivateBuilder),
    StakingWithdraw(StakingWithdrawBuilder),
    AtaInitialization(AtaInitializationBuilder),
}

impl SolBuilder {
    /// Builder matching the raw transaction, loaded from it
    pub fn from_raw(coin: &CoinConfig, registry: &CoinRegistry, raw: &str) -> Result<Self> {
        let mut probe = SolBuilderCore::new(coin, registry)?;
        let (tx_type, body) = probe.load_raw(raw)?;
        let token = body
            .iter()
            .any(|p| matches!(p, InstructionParams::TokenTransfer { .. }));

        let mut builder = match tx_type {
            TransactionType::Send if token => {
                SolBuilder::TokenTransfer(TokenTransferBuilder::new(coin, registry)?)
            }
            TransactionType::Send => SolBuilder::Transfer(TransferBuilder::new(coin, registry)?),
            TransactionType::WalletInitialization => {
                SolBuilder::WalletInitialization(WalletInitializationBuilder::new(coin, registry)?)
            }
            TransactionType::StakingActivate => {
                SolBuilder::StakingActivate(StakingActivateBuilder::new(coin, registry)?)
            }
            TransactionType::StakingDeactivate => {
                SolBuilder::StakingDeactivate(StakingDeactivateBuilder::new(coin, registry)?)
            }
            TransactionType::StakingWithdraw => {
                SolBuilder::StakingWithdraw(StakingWithdrawBuilder::new(coin, registry)?)
            }
            TransactionType::AssociatedTokenAccountInitialization => {
                SolBuilder::AtaInitialization(AtaInitializationBuilder::new(coin, registry)?)
            }
            TransactionType::AddValidator => {
                return Err(Error::NotSupported(format!(
                    "Invalid transaction, transaction type not supported: {}",
                    tx_type
                )))
            }
        };
        builder.load(raw)?;
        Ok(builder)
    }

    fn load(&mut self, raw: &str) -> Result<()> {
        match self {
            SolBuilder::Transfer(b) => b.from_raw(raw).map(|_| ()),
            SolBuilder::TokenTransfer(b) => b.from_raw(raw).map(|_| ()),
            SolBuilder::WalletInitialization(b) => b.from_raw(raw).map(|_| ()),
            SolBuilder::StakingActivate(b) => b.from_raw(raw).map(|_| ()),
            SolBuilder::StakingDeactivate(b) => b.from_raw(raw).map(|_| ()),
            SolBuilder::StakingWithdraw(b) => b.from_raw(raw).map(|_| ()),
            SolBuilder::AtaInitialization(b) => b.from_raw(raw).map(|_| ()),
        }
    }

    pub fn transaction_type(&self) -> TransactionType {
        match self {
            SolBuilder::Transfer(b) => b.transaction_type(),
            SolBuilder::TokenTransfer(b) => b.transaction_type(),
            SolBuilder::WalletInitialization(b) => b.transaction_type(),
            SolBuilder::StakingActivate(b) => b.transaction_type(),
            SolBuilder::StakingDeactivate(b) => b.transaction_type(),
            SolBuilder::StakingWithdraw(b) => b.transaction_type(),
            SolBuilder::AtaInitialization(b) => b.transaction_type(),
        }
    }

    pub fn sign(&mut self, key: &str) -> Result<()> {
        match self {
            SolBuilder::Transfer(b) => b.sign(key).map(|_| ()),
            SolBuilder::TokenTransfer(b) => b.sign(key).map(|_| ()),
            SolBuilder::WalletInitialization(b) => b.sign(key).map(|_| ()),
            SolBuilder::StakingActivate(b) => b.sign(key).map(|_| ()),
            SolBuilder::StakingDeactivate(b) => b.sign(key).map(|_| ()),
            SolBuilder::StakingWithdraw(b) => b.sign(key).map(|_| ()),
            SolBuilder::AtaInitialization(b) => b.sign(key).map(|_| ()),
        }
    }

    pub fn build(&mut self) -> Result<SolTransaction> {
        match self {
            SolBuilder::Transfer(b) => b.build(),
            SolBuilder::TokenTransfer(b) => b.build(),
            SolBuilder::WalletInitialization(b) => b.build(),
            SolBuilder::StakingActivate(b) => b.build(),
            SolBuilder::StakingDeactivate(b) => b.build(),
            SolBuilder::StakingWithdraw(b) => b.build(),
            SolBuilder::AtaInitialization(b) => b.build(),
        }
    }
}

/// Kinds a builder-produced body may contain, used by tests
#[cfg(test)]
pub(crate) fn body_kinds(tx: &SolTransaction) -> Vec<super::instruction::InstructionKind> {
    tx.message()
        .decompile()
        .unwrap()
        .iter()
        .map(|ix| super::instruction::classify(ix).unwrap())
        .collect()
}
