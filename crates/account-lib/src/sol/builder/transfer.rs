use super::{expect_sender, expect_type, parse_amount, unexpected, SolBuilderCore, SolFields};
use crate::builder::{TransactionBuilder, TransactionType};
use crate::coins::{CoinConfig, CoinRegistry};
use crate::sol::params::InstructionParams;
use crate::sol::pubkey::Pubkey;
use crate::sol::transaction::SolTransaction;
use crate::{Error, Result};

/// Native SOL transfers from the fee payer, one instruction per recipient
#[derive(Clone, Debug)]
pub struct TransferBuilder {
    core: SolBuilderCore,
    sends: Vec<(Pubkey, u64)>,
}

impl TransferBuilder {
    pub fn new(coin: &CoinConfig, registry: &CoinRegistry) -> Result<Self> {
        if coin.is_token() {
            return Err(Error::NotSupported(format!(
                "{} is a token, use the token transfer builder",
                coin.name
            )));
        }
        Ok(Self {
            core: SolBuilderCore::new(coin, registry)?,
            sends: Vec::new(),
        })
    }

    /// Add a recipient and an amount in lamports
    pub fn send(&mut self, address: &str, amount: &str) -> Result<&mut Self> {
        let to = Pubkey::parse_field("address", address)?;
        let amount = parse_amount("amount", amount)?;
        self.sends.push((to, amount));
        Ok(self)
    }
}

impl SolFields for TransferBuilder {
    fn core_mut(&mut self) -> &mut SolBuilderCore {
        &mut self.core
    }
}

impl TransactionBuilder for TransferBuilder {
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
                InstructionParams::Transfer {
                    from_address,
                    to_address,
                    amount,
                } => {
                    expect_sender(&sender, &from_address)?;
                    self.sends.push((to_address, amount));
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
        let body = self
            .sends
            .iter()
            .map(|(to, amount)| InstructionParams::Transfer {
                from_address: sender,
                to_address: *to,
                amount: *amount,
            })
            .collect();
        self.core.build_transaction(TransactionType::Send, body)
    }
}

#[cfg(test)]
mod tests {
    use super::super::test_utils::*;
    use super::super::body_kinds;
    use super::*;
    use crate::builder::{BaseTransaction, SigningState};
    use crate::sol::instruction::InstructionKind;

    fn builder() -> TransferBuilder {
        let registry = registry();
        TransferBuilder::new(registry.get("tsol").unwrap(), &registry).unwrap()
    }

    #[test]
    fn test_build_and_sign_transfer() {
        let (seed, sender) = keypair(1);
        let (_, to) = keypair(2);
        let mut builder = builder();
        builder
            .sender(&sender.to_string())
            .unwrap()
            .nonce(BLOCKHASH, None)
            .unwrap()
            .send(&to.to_string(), "300000")
            .unwrap()
            .memo("test memo");
        builder.sign(&seed).unwrap();

        let tx = builder.build().unwrap();
        assert_eq!(tx.signing_state(), SigningState::FullySigned);
        assert_eq!(
            body_kinds(&tx),
            vec![InstructionKind::Transfer, InstructionKind::Memo]
        );
        assert_eq!(tx.memo(), Some("test memo"));
        assert_eq!(tx.outputs()[0].value, "300000");
    }

    #[test]
    fn test_durable_nonce_goes_first() {
        let (_, sender) = keypair(1);
        let (_, nonce_account) = keypair(5);
        let mut builder = builder();
        builder
            .sender(&sender.to_string())
            .unwrap()
            .nonce(
                BLOCKHASH,
                Some((&nonce_account.to_string(), &sender.to_string())),
            )
            .unwrap()
            .send(&keypair(2).1.to_string(), "1")
            .unwrap();
        let tx = builder.build().unwrap();
        assert_eq!(
            body_kinds(&tx),
            vec![InstructionKind::AdvanceNonceAccount, InstructionKind::Transfer]
        );
        assert_eq!(tx.durable_nonce(), Some((&nonce_account, &sender)));
        assert_eq!(tx.message().recent_blockhash.to_string(), BLOCKHASH);
    }

    #[test]
    fn test_invalid_fields() {
        let mut builder = builder();
        let err = builder.send("bad address", "10").unwrap_err();
        assert_eq!(err.to_string(), "Invalid or missing address, got: bad address");
        let err = builder.send(&keypair(2).1.to_string(), "-1").unwrap_err();
        assert_eq!(err.field(), Some("amount"));
        assert!(builder.send(&keypair(2).1.to_string(), "0").is_err());

        builder.sender(&keypair(1).1.to_string()).unwrap();
        builder.nonce(BLOCKHASH, None).unwrap();
        assert_eq!(builder.build().unwrap_err().field(), Some("sends"));
    }

    #[test]
    fn test_signing_with_foreign_key_fails() {
        let (_, sender) = keypair(1);
        let mut builder = builder();
        builder
            .sender(&sender.to_string())
            .unwrap()
            .nonce(BLOCKHASH, None)
            .unwrap()
            .send(&keypair(2).1.to_string(), "5")
            .unwrap();
        builder.sign(&keypair(3).0).unwrap();
        assert!(matches!(builder.build(), Err(Error::InvalidKey(_))));
    }

    #[test]
    fn test_roundtrip_partially_signed() {
        let (sender_seed, sender) = keypair(1);
        let (nonce_seed, nonce_auth) = keypair(6);
        let (_, nonce_account) = keypair(7);
        let mut builder = builder();
        builder
            .sender(&sender.to_string())
            .unwrap()
            .nonce(
                BLOCKHASH,
                Some((&nonce_account.to_string(), &nonce_auth.to_string())),
            )
            .unwrap()
            .send(&keypair(2).1.to_string(), "42")
            .unwrap();
        builder.sign(&sender_seed).unwrap();
        let tx = builder.build().unwrap();
        assert_eq!(tx.signing_state(), SigningState::PartiallySigned(1));
        let raw = tx.serialize().unwrap();

        let mut rebuilt = self::builder();
        rebuilt.from_raw(&raw).unwrap();
        let same = rebuilt.build().unwrap();
        assert_eq!(same.serialize().unwrap(), raw);

        assert!(matches!(
            rebuilt.sign(&sender_seed).and_then(|b| b.build()),
            Err(Error::DuplicateSigner(_))
        ));

        let mut cosigner = self::builder();
        cosigner.from_raw(&raw).unwrap().sign(&nonce_seed).unwrap();
        let mut full = cosigner.build().unwrap();
        assert!(full.signing_state().is_fully_signed());
        let broadcast = full.to_broadcast_format().unwrap();

        let mut again = self::builder();
        again.from_raw(&broadcast).unwrap();
        assert_eq!(again.build().unwrap().serialize().unwrap(), broadcast);
    }
}
