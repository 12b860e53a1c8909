//! Native stake program: activate (create, initialize, delegate),
//! deactivate and withdraw

use super::{expect_sender, expect_type, parse_amount, unexpected, SolBuilderCore, SolFields};
use crate::builder::{TransactionBuilder, TransactionType};
use crate::coins::{CoinConfig, CoinRegistry};
use crate::sol::params::InstructionParams;
use crate::sol::pubkey::Pubkey;
use crate::sol::transaction::SolTransaction;
use crate::{Error, Result};

fn staking_address(value: Option<Pubkey>, sender: &Pubkey) -> Result<Pubkey> {
    let address = value.ok_or_else(|| Error::build("stakingAddress", "none"))?;
    if address == *sender {
        return Err(Error::build(
            "stakingAddress",
            format!("{} (same as sender)", address),
        ));
    }
    Ok(address)
}

#[derive(Clone)]
pub struct StakingActivateBuilder {
    core: SolBuilderCore,
    staking_address: Option<Pubkey>,
    amount: Option<u64>,
    validator: Option<Pubkey>,
}

impl StakingActivateBuilder {
    pub fn new(coin: &CoinConfig, registry: &CoinRegistry) -> Result<Self> {
        Ok(Self {
            core: SolBuilderCore::new(coin, registry)?,
            staking_address: None,
            amount: None,
            validator: None,
        })
    }

    /// New stake account; it signs its own creation
    pub fn staking_address(&mut self, address: &str) -> Result<&mut Self> {
        self.staking_address = Some(Pubkey::parse_field("stakingAddress", address)?);
        Ok(self)
    }

    pub fn amount(&mut self, amount: &str) -> Result<&mut Self> {
        self.amount = Some(parse_amount("amount", amount)?);
        Ok(self)
    }

    /// Vote account to delegate to
    pub fn validator(&mut self, address: &str) -> Result<&mut Self> {
        self.validator = Some(Pubkey::parse_field("validator", address)?);
        Ok(self)
    }
}

impl SolFields for StakingActivateBuilder {
    fn core_mut(&mut self) -> &mut SolBuilderCore {
        &mut self.core
    }
}

impl TransactionBuilder for StakingActivateBuilder {
    type Transaction = SolTransaction;

    fn transaction_type(&self) -> TransactionType {
        TransactionType::StakingActivate
    }

    fn from_raw(&mut self, raw: &str) -> Result<&mut Self> {
        let (tx_type, body) = self.core.load_raw(raw)?;
        expect_type(TransactionType::StakingActivate, tx_type)?;
        let sender = self.core.sender()?;
        for params in body {
            match params {
                InstructionParams::StakingActivate {
                    from_address,
                    staking_address,
                    amount,
                    validator,
                } => {
                    expect_sender(&sender, &from_address)?;
                    self.staking_address = Some(staking_address);
                    self.amount = Some(amount);
                    self.validator = Some(validator);
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
        let staking_address = staking_address(self.staking_address, &sender)?;
        let amount = self.amount.ok_or_else(|| Error::build("amount", "none"))?;
        let validator = self
            .validator
            .ok_or_else(|| Error::build("validator", "none"))?;
        let body = vec![InstructionParams::StakingActivate {
            from_address: sender,
            staking_address,
            amount,
            validator,
        }];
        self.core
            .build_transaction(TransactionType::StakingActivate, body)
    }
}

#[derive(Clone)]
pub struct StakingDeactivateBuilder {
    core: SolBuilderCore,
    staking_address: Option<Pubkey>,
}

impl StakingDeactivateBuilder {
    pub fn new(coin: &CoinConfig, registry: &CoinRegistry) -> Result<Self> {
        Ok(Self {
            core: SolBuilderCore::new(coin, registry)?,
            staking_address: None,
        })
    }

    pub fn staking_address(&mut self, address: &str) -> Result<&mut Self> {
        self.staking_address = Some(Pubkey::parse_field("stakingAddress", address)?);
        Ok(self)
    }
}

impl SolFields for StakingDeactivateBuilder {
    fn core_mut(&mut self) -> &mut SolBuilderCore {
        &mut self.core
    }
}

impl TransactionBuilder for StakingDeactivateBuilder {
    type Transaction = SolTransaction;

    fn transaction_type(&self) -> TransactionType {
        TransactionType::StakingDeactivate
    }

    fn from_raw(&mut self, raw: &str) -> Result<&mut Self> {
        let (tx_type, body) = self.core.load_raw(raw)?;
        expect_type(TransactionType::StakingDeactivate, tx_type)?;
        let sender = self.core.sender()?;
        for params in body {
            match params {
                InstructionParams::StakingDeactivate {
                    from_address,
                    staking_address,
                } => {
                    expect_sender(&sender, &from_address)?;
                    self.staking_address = Some(staking_address);
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
        let staking_address = staking_address(self.staking_address, &sender)?;
        let body = vec![InstructionParams::StakingDeactivate {
            from_address: sender,
            staking_address,
        }];
        self.core
            .build_transaction(TransactionType::StakingDeactivate, body)
    }
}

/// Withdraws from a deactivated stake account back to the fee payer
#[derive(Clone)]
pub struct StakingWithdrawBuilder {
    core: SolBuilderCore,
    staking_address: Option<Pubkey>,
    amount: Option<u64>,
}

impl StakingWithdrawBuilder {
    pub fn new(coin: &CoinConfig, registry: &CoinRegistry) -> Result<Self> {
        Ok(Self {
            core: SolBuilderCore::new(coin, registry)?,
            staking_address: None,
            amount: None,
        })
    }

    pub fn staking_address(&mut self, address: &str) -> Result<&mut Self> {
        self.staking_address = Some(Pubkey::parse_field("stakingAddress", address)?);
        Ok(self)
    }

    pub fn amount(&mut self, amount: &str) -> Result<&mut Self> {
        self.amount = Some(parse_amount("amount", amount)?);
        Ok(self)
    }
}

impl SolFields for StakingWithdrawBuilder {
    fn core_mut(&mut self) -> &mut SolBuilderCore {
        &mut self.core
    }
}

impl TransactionBuilder for StakingWithdrawBuilder {
    type Transaction = SolTransaction;

    fn transaction_type(&self) -> TransactionType {
        TransactionType::StakingWithdraw
    }

    fn from_raw(&mut self, raw: &str) -> Result<&mut Self> {
        let (tx_type, body) = self.core.load_raw(raw)?;
        expect_type(TransactionType::StakingWithdraw, tx_type)?;
        let sender = self.core.sender()?;
        for params in body {
            match params {
                InstructionParams::StakingWithdraw {
                    from_address,
                    staking_address,
                    amount,
                } => {
                    expect_sender(&sender, &from_address)?;
                    self.staking_address = Some(staking_address);
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
        let staking_address = staking_address(self.staking_address, &sender)?;
        let amount = self.amount.ok_or_else(|| Error::build("amount", "none"))?;
        let body = vec![InstructionParams::StakingWithdraw {
            from_address: sender,
            staking_address,
            amount,
        }];
        self.core
            .build_transaction(TransactionType::StakingWithdraw, body)
    }
}

#[cfg(test)]
mod tests {
    use super::super::test_utils::*;
    use super::super::{body_kinds, SolBuilder};
    use super::*;
    use crate::builder::{BaseTransaction, SigningState};
    use crate::sol::instruction::InstructionKind;

    #[test]
    fn test_activate_builds_three_instructions() {
        let registry = registry();
        let (sender_seed, sender) = keypair(1);
        let (stake_seed, stake) = keypair(11);
        let (_, validator) = keypair(12);
        let mut builder =
            StakingActivateBuilder::new(registry.get("tsol").unwrap(), &registry).unwrap();
        builder
            .sender(&sender.to_string())
            .unwrap()
            .nonce(BLOCKHASH, None)
            .unwrap()
            .staking_address(&stake.to_string())
            .unwrap()
            .amount("300000")
            .unwrap()
            .validator(&validator.to_string())
            .unwrap();
        builder.sign(&sender_seed).unwrap().sign(&stake_seed).unwrap();
        let mut tx = builder.build().unwrap();
        assert_eq!(
            body_kinds(&tx),
            vec![
                InstructionKind::CreateAccount,
                InstructionKind::StakingInitialize,
                InstructionKind::StakingDelegate
            ]
        );
        assert_eq!(tx.signing_state(), SigningState::FullySigned);

        let raw = tx.to_broadcast_format().unwrap();
        let mut parsed = SolBuilder::from_raw(registry.get("tsol").unwrap(), &registry, &raw).unwrap();
        assert_eq!(parsed.transaction_type(), TransactionType::StakingActivate);
        assert_eq!(parsed.build().unwrap().serialize().unwrap(), raw);
    }

    #[test]
    fn test_activate_requires_validator() {
        let registry = registry();
        let mut builder =
            StakingActivateBuilder::new(registry.get("tsol").unwrap(), &registry).unwrap();
        builder
            .sender(&keypair(1).1.to_string())
            .unwrap()
            .nonce(BLOCKHASH, None)
            .unwrap()
            .staking_address(&keypair(11).1.to_string())
            .unwrap()
            .amount("1")
            .unwrap();
        assert_eq!(builder.build().unwrap_err().field(), Some("validator"));
    }

    #[test]
    fn test_deactivate_and_withdraw() {
        let registry = registry();
        let coin = registry.get("tsol").unwrap();
        let (seed, sender) = keypair(1);
        let stake = keypair(11).1.to_string();

        let mut deactivate = StakingDeactivateBuilder::new(coin, &registry).unwrap();
        deactivate
            .sender(&sender.to_string())
            .unwrap()
            .nonce(BLOCKHASH, None)
            .unwrap()
            .staking_address(&stake)
            .unwrap()
            .memo("unstake");
        deactivate.sign(&seed).unwrap();
        let tx = deactivate.build().unwrap();
        assert_eq!(
            body_kinds(&tx),
            vec![InstructionKind::StakingDeactivate, InstructionKind::Memo]
        );
        assert!(tx.outputs().is_empty());

        let mut withdraw = StakingWithdrawBuilder::new(coin, &registry).unwrap();
        withdraw
            .sender(&sender.to_string())
            .unwrap()
            .nonce(BLOCKHASH, None)
            .unwrap()
            .staking_address(&stake)
            .unwrap()
            .amount("5000")
            .unwrap();
        withdraw.sign(&seed).unwrap();
        let mut tx = withdraw.build().unwrap();
        assert_eq!(tx.inputs()[0].address, stake);
        assert_eq!(tx.outputs()[0].address, sender.to_string());

        let raw = tx.to_broadcast_format().unwrap();
        let mut wrong = StakingDeactivateBuilder::new(coin, &registry).unwrap();
        assert!(matches!(wrong.from_raw(&raw), Err(Error::NotSupported(_))));
    }
}
