use super::{expect_sender, expect_type, parse_amount, unexpected, SolBuilderCore, SolFields};
use crate::builder::{TransactionBuilder, TransactionType};
use crate::coins::{CoinConfig, CoinRegistry};
use crate::sol::params::InstructionParams;
use crate::sol::pubkey::{associated_token_address, Pubkey};
use crate::sol::transaction::SolTransaction;
use crate::{Error, Result};

#[derive(Clone, Debug)]
struct TokenSend {
    to: Pubkey,
    /// `to` already names a token account rather than its owner
    to_is_token_account: bool,
    source: Option<Pubkey>,
    amount: u64,
    token_name: String,
}

/// SPL `TransferChecked` transfers out of the fee payer's token accounts
#[derive(Clone, Debug)]
pub struct TokenTransferBuilder {
    core: SolBuilderCore,
    sends: Vec<TokenSend>,
}

impl TokenTransferBuilder {
    pub fn new(coin: &CoinConfig, registry: &CoinRegistry) -> Result<Self> {
        Ok(Self {
            core: SolBuilderCore::new(coin, registry)?,
            sends: Vec::new(),
        })
    }

    /// Add a recipient wallet, a base-unit amount and the token to move
    ///
    /// The destination is the recipient's associated token account.
    pub fn send(&mut self, address: &str, amount: &str, token_name: &str) -> Result<&mut Self> {
        let to = Pubkey::parse_field("address", address)?;
        let amount = parse_amount("amount", amount)?;
        self.core.token(token_name)?;
        self.sends.push(TokenSend {
            to,
            to_is_token_account: false,
            source: None,
            amount,
            token_name: token_name.to_string(),
        });
        Ok(self)
    }
}

impl SolFields for TokenTransferBuilder {
    fn core_mut(&mut self) -> &mut SolBuilderCore {
        &mut self.core
    }
}

impl TransactionBuilder for TokenTransferBuilder {
    type Transaction = SolTransaction;

    fn transaction_type(&self) -> TransactionType {
        TransactionType::Send
    }

    fn from_raw(&mut self, raw: &str) -> Result<&mut Self> {
        let (tx_type, body) = self.core.load_raw(raw)?;
        expect_type(TransactionType::Send, tx_type)?;
        let sender = self.core.sender()?;
        self.sends.clear();
        for params in body {
            match params {
                InstructionParams::TokenTransfer {
                    from_address,
                    to_address,
                    amount,
                    token_name,
                    source_address,
                    ..
                } => {
                    expect_sender(&sender, &from_address)?;
                    self.sends.push(TokenSend {
                        to: to_address,
                        to_is_token_account: true,
                        source: Some(source_address),
                        amount,
                        token_name,
                    });
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
        if self.sends.is_empty() {
            return Err(Error::build("sends", "none"));
        }
        let mut body = Vec::with_capacity(self.sends.len());
        for send in &self.sends {
            let (_, mint, decimals) = self.core.token(&send.token_name)?;
            let to_address = if send.to_is_token_account {
                send.to
            } else {
                associated_token_address(&send.to, &mint)?
            };
            let source_address = match send.source {
                Some(source) => source,
                None => associated_token_address(&sender, &mint)?,
            };
            body.push(InstructionParams::TokenTransfer {
                from_address: sender,
                to_address,
                amount: send.amount,
                token_name: send.token_name.clone(),
                mint_address: mint,
                decimals,
                source_address,
            });
        }
        self.core.build_transaction(TransactionType::Send, body)
    }
}

#[cfg(test)]
mod tests {
    use super::super::test_utils::*;
    use super::*;
    use crate::builder::BaseTransaction;

    fn builder() -> TokenTransferBuilder {
        let registry = registry();
        TokenTransferBuilder::new(registry.get("tsol").unwrap(), &registry).unwrap()
    }

    #[test]
    fn test_token_transfer_targets_associated_accounts() {
        let (seed, sender) = keypair(1);
        let (_, owner) = keypair(2);
        let mut builder = builder();
        builder
            .sender(&sender.to_string())
            .unwrap()
            .nonce(BLOCKHASH, None)
            .unwrap()
            .send(&owner.to_string(), "1000", "tsol:usdc")
            .unwrap();
        builder.sign(&seed).unwrap();
        let mut tx = builder.build().unwrap();

        let mint: Pubkey = "Gh9ZwEmdLJ8DscKNTkTqPbNwLNNBjuSzaG9Vp2KGtKJr".parse().unwrap();
        match &tx.instructions_data()[0] {
            InstructionParams::TokenTransfer {
                to_address,
                source_address,
                decimals,
                ..
            } => {
                assert_eq!(*to_address, associated_token_address(&owner, &mint).unwrap());
                assert_eq!(*source_address, associated_token_address(&sender, &mint).unwrap());
                assert_eq!(*decimals, 6);
            }
            other => panic!("unexpected params {:?}", other),
        }
        assert_eq!(tx.outputs()[0].coin, "tsol:usdc");

        let raw = tx.to_broadcast_format().unwrap();
        let mut parsed = self::builder();
        parsed.from_raw(&raw).unwrap();
        assert_eq!(parsed.build().unwrap().serialize().unwrap(), raw);
    }

    #[test]
    fn test_unknown_or_foreign_network_token() {
        let mut builder = builder();
        let owner = keypair(2).1.to_string();
        let err = builder.send(&owner, "10", "tsol:doge").unwrap_err();
        assert_eq!(err.field(), Some("tokenName"));
        assert!(builder.send(&owner, "10", "sol:usdc").is_err());
    }
}
