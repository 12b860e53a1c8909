use super::{expect_sender, expect_type, unexpected, SolBuilderCore, SolFields};
use crate::builder::{TransactionBuilder, TransactionType};
use crate::coins::{CoinConfig, CoinRegistry};
use crate::sol::params::InstructionParams;
use crate::sol::pubkey::{associated_token_address, Pubkey};
use crate::sol::transaction::SolTransaction;
use crate::{Error, Result};

/// Creates the associated token account of an owner for one token
#[derive(Clone)]
pub struct AtaInitializationBuilder {
    core: SolBuilderCore,
    token_name: Option<String>,
    owner: Option<Pubkey>,
}

impl AtaInitializationBuilder {
    pub fn new(coin: &CoinConfig, registry: &CoinRegistry) -> Result<Self> {
        Ok(Self {
            core: SolBuilderCore::new(coin, registry)?,
            token_name: None,
            owner: None,
        })
    }

    /// Token whose account is created
    pub fn mint(&mut self, token_name: &str) -> Result<&mut Self> {
        self.core.token(token_name)?;
        self.token_name = Some(token_name.to_string());
        Ok(self)
    }

    /// Account owner; defaults to the fee payer
    pub fn owner(&mut self, address: &str) -> Result<&mut Self> {
        self.owner = Some(Pubkey::parse_field("ownerAddress", address)?);
        Ok(self)
    }
}

impl SolFields for AtaInitializationBuilder {
    fn core_mut(&mut self) -> &mut SolBuilderCore {
        &mut self.core
    }
}

impl TransactionBuilder for AtaInitializationBuilder {
    type Transaction = SolTransaction;

    fn transaction_type(&self) -> TransactionType {
        TransactionType::AssociatedTokenAccountInitialization
    }

    fn from_raw(&mut self, raw: &str) -> Result<&mut Self> {
        let (tx_type, body) = self.core.load_raw(raw)?;
        expect_type(TransactionType::AssociatedTokenAccountInitialization, tx_type)?;
        let sender = self.core.sender()?;
        for params in body {
            match params {
                InstructionParams::CreateAssociatedTokenAccount {
                    owner_address,
                    payer_address,
                    token_name,
                    ..
                } => {
                    expect_sender(&sender, &payer_address)?;
                    self.token_name = Some(token_name);
                    self.owner = Some(owner_address);
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
        let token_name = self
            .token_name
            .clone()
            .ok_or_else(|| Error::build("mint", "none"))?;
        let (_, mint_address, _) = self.core.token(&token_name)?;
        let owner_address = self.owner.unwrap_or(sender);
        let body = vec![InstructionParams::CreateAssociatedTokenAccount {
            mint_address,
            ata_address: associated_token_address(&owner_address, &mint_address)?,
            owner_address,
            payer_address: sender,
            token_name,
        }];
        self.core
            .build_transaction(TransactionType::AssociatedTokenAccountInitialization, body)
    }
}
