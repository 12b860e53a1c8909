//! Builder selection by coin family

use crate::avaxp::{AvaxPTransaction, ValidatorBuilder};
use crate::builder::{BaseTransaction, Entry, Explanation, SigningState, TransactionBuilder, TransactionType};
use crate::coins::{CoinConfig, CoinFamily, CoinRegistry};
use crate::sol::{
    AtaInitializationBuilder, SolBuilder, SolTransaction, StakingActivateBuilder,
    StakingDeactivateBuilder, StakingWithdrawBuilder, TokenTransferBuilder, TransferBuilder,
    WalletInitializationBuilder,
};
use crate::{Error, Result};
use tracing::debug;

/// Hands out builders for one coin
#[derive(Debug, Clone)]
pub struct TransactionBuilderFactory {
    coin: CoinConfig,
    registry: CoinRegistry,
}

impl TransactionBuilderFactory {
    pub fn new(registry: &CoinRegistry, coin: &str) -> Result<Self> {
        Ok(Self {
            coin: registry.get(coin)?.clone(),
            registry: registry.clone(),
        })
    }

    pub fn coin(&self) -> &CoinConfig {
        &self.coin
    }

    fn require(&self, family: CoinFamily) -> Result<()> {
        if self.coin.family != family {
            return Err(Error::NotSupported(format!(
                "{} builders are not available for {}",
                family, self.coin.name
            )));
        }
        Ok(())
    }

    pub fn transfer_builder(&self) -> Result<TransferBuilder> {
        TransferBuilder::new(&self.coin, &self.registry)
    }

    pub fn token_transfer_builder(&self) -> Result<TokenTransferBuilder> {
        TokenTransferBuilder::new(&self.coin, &self.registry)
    }

    pub fn wallet_initialization_builder(&self) -> Result<WalletInitializationBuilder> {
        WalletInitializationBuilder::new(&self.coin, &self.registry)
    }

    pub fn staking_activate_builder(&self) -> Result<StakingActivateBuilder> {
        StakingActivateBuilder::new(&self.coin, &self.registry)
    }

    pub fn staking_deactivate_builder(&self) -> Result<StakingDeactivateBuilder> {
        StakingDeactivateBuilder::new(&self.coin, &self.registry)
    }

    pub fn staking_withdraw_builder(&self) -> Result<StakingWithdrawBuilder> {
        StakingWithdrawBuilder::new(&self.coin, &self.registry)
    }

    pub fn ata_initialization_builder(&self) -> Result<AtaInitializationBuilder> {
        AtaInitializationBuilder::new(&self.coin, &self.registry)
    }

    pub fn validator_builder(&self) -> Result<ValidatorBuilder> {
        self.require(CoinFamily::AvaxP)?;
        ValidatorBuilder::new(&self.coin)
    }

    /// Builder loaded from a raw transaction of this coin
    pub fn from_raw(&self, raw: &str) -> Result<AnyTransactionBuilder> {
        debug!(coin = %self.coin.name, family = %self.coin.family, "parsing raw transaction");
        match self.coin.family {
            CoinFamily::Sol => Ok(AnyTransactionBuilder::Sol(SolBuilder::from_raw(
                &self.coin,
                &self.registry,
                raw,
            )?)),
            CoinFamily::AvaxP => {
                let mut builder = ValidatorBuilder::new(&self.coin)?;
                builder.from_raw(raw)?;
                Ok(AnyTransactionBuilder::AvaxPValidator(builder))
            }
        }
    }
}

/// Any builder this crate provides
pub enum AnyTransactionBuilder {
    Sol(SolBuilder),
    AvaxPValidator(ValidatorBuilder),
}

impl AnyTransactionBuilder {
    pub fn transaction_type(&self) -> TransactionType {
        match self {
            AnyTransactionBuilder::Sol(b) => b.transaction_type(),
            AnyTransactionBuilder::AvaxPValidator(b) => b.transaction_type(),
        }
    }

    pub fn sign(&mut self, key: &str) -> Result<()> {
        match self {
            AnyTransactionBuilder::Sol(b) => b.sign(key),
            AnyTransactionBuilder::AvaxPValidator(b) => b.sign(key).map(|_| ()),
        }
    }

    pub fn build(&mut self) -> Result<AnyTransaction> {
        match self {
            AnyTransactionBuilder::Sol(b) => b.build().map(AnyTransaction::Sol),
            AnyTransactionBuilder::AvaxPValidator(b) => b.build().map(AnyTransaction::AvaxP),
        }
    }
}

/// Any transaction this crate builds
#[derive(Debug, Clone)]
pub enum AnyTransaction {
    Sol(SolTransaction),
    AvaxP(AvaxPTransaction),
}

macro_rules! delegate {
    ($self:ident, $tx:ident => $body:expr) => {
        match $self {
            AnyTransaction::Sol($tx) => $body,
            AnyTransaction::AvaxP($tx) => $body,
        }
    };
}

impl BaseTransaction for AnyTransaction {
    fn id(&self) -> Option<String> {
        delegate!(self, tx => tx.id())
    }

    fn transaction_type(&self) -> TransactionType {
        delegate!(self, tx => tx.transaction_type())
    }

    fn signable_payload(&self) -> Vec<u8> {
        delegate!(self, tx => tx.signable_payload())
    }

    fn signing_state(&self) -> SigningState {
        delegate!(self, tx => tx.signing_state())
    }

    fn missing_signers(&self) -> Vec<String> {
        delegate!(self, tx => tx.missing_signers())
    }

    fn inputs(&self) -> &[Entry] {
        delegate!(self, tx => tx.inputs())
    }

    fn outputs(&self) -> &[Entry] {
        delegate!(self, tx => tx.outputs())
    }

    fn serialize(&self) -> Result<String> {
        delegate!(self, tx => tx.serialize())
    }

    fn to_broadcast_format(&mut self) -> Result<String> {
        delegate!(self, tx => tx.to_broadcast_format())
    }

    fn is_sealed(&self) -> bool {
        delegate!(self, tx => tx.is_sealed())
    }

    fn add_signature(&mut self, public_key: &str, signature: &[u8]) -> Result<()> {
        delegate!(self, tx => tx.add_signature(public_key, signature))
    }

    fn to_json(&self) -> Result<serde_json::Value> {
        delegate!(self, tx => tx.to_json())
    }

    fn explain(&self) -> Result<Explanation> {
        delegate!(self, tx => tx.explain())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sol::builder::test_utils::{keypair, BLOCKHASH};
    use crate::sol::SolFields;

    #[test]
    fn test_family_mismatch() {
        let registry = CoinRegistry::builtin();
        let sol = TransactionBuilderFactory::new(&registry, "tsol").unwrap();
        assert!(matches!(sol.validator_builder(), Err(Error::NotSupported(_))));

        let avax = TransactionBuilderFactory::new(&registry, "tavaxp").unwrap();
        assert!(avax.transfer_builder().is_err());
        assert!(matches!(
            TransactionBuilderFactory::new(&registry, "btc"),
            Err(Error::UnknownCoin(_))
        ));
    }

    #[test]
    fn test_from_raw_dispatches_by_family() {
        let registry = CoinRegistry::builtin();
        let factory = TransactionBuilderFactory::new(&registry, "tsol").unwrap();
        let (sender_key, sender) = keypair(1);
        let (_, receiver) = keypair(2);

        let mut builder = factory.transfer_builder().unwrap();
        builder
            .sender(&sender.to_string())
            .unwrap()
            .nonce(BLOCKHASH, None)
            .unwrap();
        builder.send(&receiver.to_string(), "5000").unwrap();
        builder.sign(&sender_key).unwrap();
        let mut tx = builder.build().unwrap();
        let raw = tx.to_broadcast_format().unwrap();

        let mut parsed = factory.from_raw(&raw).unwrap();
        assert_eq!(parsed.transaction_type(), TransactionType::Send);
        let rebuilt = parsed.build().unwrap();
        assert!(matches!(rebuilt, AnyTransaction::Sol(_)));
        assert_eq!(rebuilt.serialize().unwrap(), raw);
        assert!(rebuilt.signing_state().is_fully_signed());
    }
}
