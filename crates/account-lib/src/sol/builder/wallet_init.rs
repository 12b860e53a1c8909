use super::{expect_sender, expect_type, parse_amount, unexpected, SolBuilderCore, SolFields};
use crate::builder::{TransactionBuilder, TransactionType};
use crate::coins::{CoinConfig, CoinRegistry};
use crate::sol::params::InstructionParams;
use crate::sol::pubkey::Pubkey;
use crate::sol::transaction::SolTransaction;
use crate::{Error, Result};

/// Creates and initializes a durable nonce account owned by the fee payer
#[derive(Clone)]
pub struct WalletInitializationBuilder {
    core: SolBuilderCore,
    nonce_address: Option<Pubkey>,
    amount: Option<u64>,
}

impl WalletInitializationBuilder {
    pub fn new(coin: &CoinConfig, registry: &CoinRegistry) -> Result<Self> {
        Ok(Self {
            core: SolBuilderCore::new(coin, registry)?,
            nonce_address: None,
            amount: None,
        })
    }

    /// Address of the nonce account to create; it must sign too
    pub fn address(&mut self, nonce_address: &str) -> Result<&mut Self> {
        self.nonce_address = Some(Pubkey::parse_field("nonceAddress", nonce_address)?);
        Ok(self)
    }

    /// Rent-exempt balance in lamports
    pub fn amount(&mut self, amount: &str) -> Result<&mut Self> {
        self.amount = Some(parse_amount("amount", amount)?);
        Ok(self)
    }
}

impl SolFields for WalletInitializationBuilder {
    fn core_mut(&mut self) -> &mut SolBuilderCore {
        &mut self.core
    }
}

impl TransactionBuilder for WalletInitializationBuilder {
    type Transaction = SolTransaction;

    fn transaction_type(&self) -> TransactionType {
        TransactionType::WalletInitialization
    }

    fn from_raw(&mut self, raw: &str) -> Result<&mut Self> {
        let (tx_type, body) = self.core.load_raw(raw)?;
        expect_type(TransactionType::WalletInitialization, tx_type)?;
        let sender = self.core.sender()?;
        for params in body {
            match params {
                InstructionParams::CreateNonceAccount {
                    from_address,
                    nonce_address,
                    auth_address,
                    amount,
                } => {
                    expect_sender(&sender, &from_address)?;
                    expect_sender(&sender, &auth_address)?;
                    self.nonce_address = Some(nonce_address);
                    self.amount = Some(amount);
                }
                other => return Err(unexpected(&other)),
            }
        }
        Ok(self)
    }

    fn sign(&mut self, key: &str) -> Result<&mut Self> {
        self.core.add_signer(key)?;
        Ok(self)
    }

    fn build(&mut self) -> Result<SolTransaction> {
        let sender = self.core.sender()?;
        let nonce_address = self
            .nonce_address
            .ok_or_else(|| Error::build("nonceAddress", "none"))?;
        if nonce_address == sender {
            return Err(Error::build(
                "nonceAddress",
                format!("{} (same as sender)", nonce_address),
            ));
        }
        let amount = self.amount.ok_or_else(|| Error::build("amount", "none"))?;
        let body = vec![InstructionParams::CreateNonceAccount {
            from_address: sender,
            nonce_address,
            auth_address: sender,
            amount,
        }];
        self.core
            .build_transaction(TransactionType::WalletInitialization, body)
    }
}

#[cfg(test)]
mod tests {
    use super::super::test_utils::*;
    use super::super::body_kinds;
    use super::*;
    use crate::builder::{BaseTransaction, SigningState};
    use crate::sol::instruction::InstructionKind;

    fn builder() -> WalletInitializationBuilder {
        let registry = registry();
        WalletInitializationBuilder::new(registry.get("tsol").unwrap(), &registry).unwrap()
    }

    #[test]
    fn test_wallet_init_needs_both_signers() {
        let (sender_seed, sender) = keypair(1);
        let (nonce_seed, nonce) = keypair(9);
        let mut builder = builder();
        builder
            .sender(&sender.to_string())
            .unwrap()
            .nonce(BLOCKHASH, None)
            .unwrap()
            .address(&nonce.to_string())
            .unwrap()
            .amount("1447680")
            .unwrap()
            .memo("init");
        builder.sign(&sender_seed).unwrap();
        let tx = builder.build().unwrap();
        assert_eq!(
            body_kinds(&tx),
            vec![
                InstructionKind::CreateAccount,
                InstructionKind::InitializeNonceAccount,
                InstructionKind::Memo
            ]
        );
        assert_eq!(tx.signing_state(), SigningState::PartiallySigned(1));
        assert_eq!(tx.missing_signers(), vec![nonce.to_string()]);

        let raw = tx.serialize().unwrap();
        let mut parsed = self::builder();
        parsed.from_raw(&raw).unwrap().sign(&nonce_seed).unwrap();
        let mut full = parsed.build().unwrap();
        assert!(full.to_broadcast_format().is_ok());
        assert_eq!(full.outputs()[0].address, nonce.to_string());
    }

    #[test]
    fn test_nonce_address_must_differ() {
        let (_, sender) = keypair(1);
        let mut builder = builder();
        builder
            .sender(&sender.to_string())
            .unwrap()
            .nonce(BLOCKHASH, None)
            .unwrap()
            .address(&sender.to_string())
            .unwrap()
            .amount("10")
            .unwrap();
        assert_eq!(builder.build().unwrap_err().field(), Some("nonceAddress"));
    }
}
