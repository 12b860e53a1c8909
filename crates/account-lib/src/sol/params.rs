//! Typed view of a transaction's instructions
//!
//! Builders describe what they want as a list of [`InstructionParams`];
//! parsing a raw transaction recovers the same list from the decoded
//! instructions, so both directions meet in one representation.

use super::instruction::{self, Instruction, InstructionKind};
use super::pubkey::{associated_token_address, Pubkey, STAKE_PROGRAM_ID, SYSTEM_PROGRAM_ID};
use crate::builder::TransactionType;
use crate::coins::CoinConfig;
use crate::{Error, Result};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", content = "params", rename_all = "camelCase")]
pub enum InstructionParams {
    #[serde(rename_all = "camelCase")]
    Transfer {
        from_address: Pubkey,
        to_address: Pubkey,
        amount: u64,
    },
    #[serde(rename_all = "camelCase")]
    TokenTransfer {
        /// Owner of the source token account
        from_address: Pubkey,
        /// Destination token account
        to_address: Pubkey,
        amount: u64,
        token_name: String,
        mint_address: Pubkey,
        decimals: u8,
        source_address: Pubkey,
    },
    #[serde(rename_all = "camelCase")]
    NonceAdvance {
        wallet_nonce_address: Pubkey,
        auth_wallet_address: Pubkey,
    },
    Memo { memo: String },
    #[serde(rename_all = "camelCase")]
    CreateNonceAccount {
        from_address: Pubkey,
        nonce_address: Pubkey,
        auth_address: Pubkey,
        amount: u64,
    },
    #[serde(rename_all = "camelCase")]
    StakingActivate {
        from_address: Pubkey,
        staking_address: Pubkey,
        amount: u64,
        validator: Pubkey,
    },
    #[serde(rename_all = "camelCase")]
    StakingDeactivate {
        from_address: Pubkey,
        staking_address: Pubkey,
    },
    #[serde(rename_all = "camelCase")]
    StakingWithdraw {
        from_address: Pubkey,
        staking_address: Pubkey,
        amount: u64,
    },
    #[serde(rename_all = "camelCase")]
    CreateAssociatedTokenAccount {
        mint_address: Pubkey,
        ata_address: Pubkey,
        owner_address: Pubkey,
        payer_address: Pubkey,
        token_name: String,
    },
}

impl InstructionParams {
    /// Program instructions implementing these params, in execution order
    pub fn instructions(&self) -> Vec<Instruction> {
        match self {
            InstructionParams::Transfer {
                from_address,
                to_address,
                amount,
            } => vec![instruction::transfer(from_address, to_address, *amount)],
            InstructionParams::TokenTransfer {
                from_address,
                to_address,
                amount,
                mint_address,
                decimals,
                source_address,
                ..
            } => vec![instruction::transfer_checked(
                source_address,
                mint_address,
                to_address,
                from_address,
                *amount,
                *decimals,
            )],
            InstructionParams::NonceAdvance {
                wallet_nonce_address,
                auth_wallet_address,
            } => vec![instruction::advance_nonce_account(
                wallet_nonce_address,
                auth_wallet_address,
            )],
            InstructionParams::Memo { memo } => vec![instruction::memo(memo)],
            InstructionParams::CreateNonceAccount {
                from_address,
                nonce_address,
                auth_address,
                amount,
            } => vec![
                instruction::create_account(
                    from_address,
                    nonce_address,
                    *amount,
                    instruction::NONCE_ACCOUNT_LEN,
                    &SYSTEM_PROGRAM_ID,
                ),
                instruction::initialize_nonce_account(nonce_address, auth_address),
            ],
            InstructionParams::StakingActivate {
                from_address,
                staking_address,
                amount,
                validator,
            } => vec![
                instruction::create_account(
                    from_address,
                    staking_address,
                    *amount,
                    instruction::STAKE_ACCOUNT_LEN,
                    &STAKE_PROGRAM_ID,
                ),
                instruction::stake_initialize(staking_address, from_address),
                instruction::stake_delegate(staking_address, from_address, validator),
            ],
            InstructionParams::StakingDeactivate {
                from_address,
                staking_address,
            } => vec![instruction::stake_deactivate(staking_address, from_address)],
            InstructionParams::StakingWithdraw {
                from_address,
                staking_address,
                amount,
            } => vec![instruction::stake_withdraw(
                staking_address,
                from_address,
                from_address,
                *amount,
            )],
            InstructionParams::CreateAssociatedTokenAccount {
                mint_address,
                ata_address,
                owner_address,
                payer_address,
                ..
            } => vec![instruction::create_associated_token_account(
                payer_address,
                ata_address,
                owner_address,
                mint_address,
            )],
        }
    }
}

/// Infer the transaction type from the instruction kinds present
pub fn detect_transaction_type(instructions: &[Instruction]) -> Result<TransactionType> {
    let kinds = instructions
        .iter()
        .map(instruction::classify)
        .collect::<Result<Vec<_>>>()?;
    let has = |kind: InstructionKind| kinds.contains(&kind);

    let tx_type = if has(InstructionKind::InitializeNonceAccount) {
        TransactionType::WalletInitialization
    } else if has(InstructionKind::CreateAccount)
        || has(InstructionKind::StakingInitialize)
        || has(InstructionKind::StakingDelegate)
    {
        TransactionType::StakingActivate
    } else if has(InstructionKind::StakingDeactivate) {
        TransactionType::StakingDeactivate
    } else if has(InstructionKind::StakingWithdraw) {
        TransactionType::StakingWithdraw
    } else if has(InstructionKind::CreateAssociatedTokenAccount) {
        TransactionType::AssociatedTokenAccountInitialization
    } else if has(InstructionKind::Transfer) || has(InstructionKind::TokenTransfer) {
        TransactionType::Send
    } else {
        return Err(Error::NotSupported(
            "Invalid transaction, no value-bearing instruction".into(),
        ));
    };
    Ok(tx_type)
}

fn find_token<'a>(tokens: &'a [CoinConfig], mint: &Pubkey) -> Result<&'a CoinConfig> {
    let mint = mint.to_string();
    tokens
        .iter()
        .find(|coin| coin.token().map(|(m, _)| m == mint).unwrap_or(false))
        .ok_or_else(|| Error::parse("mint", format!("unknown token mint {}", mint)))
}

fn not_supported(tx_type: TransactionType, kind: InstructionKind) -> Error {
    Error::NotSupported(format!(
        "Invalid transaction, instruction type not supported in {}: {:?}",
        tx_type, kind
    ))
}

/// Reconstruct instruction params from decoded instructions
///
/// The result is ordered as builders emit it: durable nonce advance first,
/// then the body, then the memo.
pub fn instruction_params_factory(
    tx_type: TransactionType,
    instructions: &[Instruction],
    tokens: &[CoinConfig],
) -> Result<Vec<InstructionParams>> {
    if tx_type == TransactionType::AddValidator {
        return Err(Error::NotSupported(format!(
            "Invalid transaction, transaction type not supported: {}",
            tx_type
        )));
    }

    let mut nonce = None;
    let mut memo = None;
    let mut body = Vec::new();
    let mut create = None;
    let mut initialize_nonce = None;
    let mut stake_initialize = None;
    let mut delegate = None;

    for ix in instructions {
        let kind = instruction::classify(ix)?;
        match kind {
            InstructionKind::AdvanceNonceAccount => {
                let (wallet_nonce_address, auth_wallet_address) =
                    instruction::decode_advance_nonce(ix)?;
                nonce = Some(InstructionParams::NonceAdvance {
                    wallet_nonce_address,
                    auth_wallet_address,
                });
            }
            InstructionKind::Memo => {
                memo = Some(InstructionParams::Memo {
                    memo: instruction::decode_memo(ix)?,
                });
            }
            InstructionKind::Transfer if tx_type == TransactionType::Send => {
                let transfer = instruction::decode_transfer(ix)?;
                body.push(InstructionParams::Transfer {
                    from_address: transfer.from,
                    to_address: transfer.to,
                    amount: transfer.lamports,
                });
            }
            InstructionKind::TokenTransfer if tx_type == TransactionType::Send => {
                let transfer = instruction::decode_transfer_checked(ix)?;
                let token = find_token(tokens, &transfer.mint)?;
                body.push(InstructionParams::TokenTransfer {
                    from_address: transfer.owner,
                    to_address: transfer.destination,
                    amount: transfer.amount,
                    token_name: token.name.clone(),
                    mint_address: transfer.mint,
                    decimals: transfer.decimals,
                    source_address: transfer.source,
                });
            }
            InstructionKind::CreateAccount
                if matches!(
                    tx_type,
                    TransactionType::WalletInitialization | TransactionType::StakingActivate
                ) =>
            {
                create = Some(instruction::decode_create_account(ix)?);
            }
            InstructionKind::InitializeNonceAccount
                if tx_type == TransactionType::WalletInitialization =>
            {
                initialize_nonce = Some(instruction::decode_initialize_nonce(ix)?);
            }
            InstructionKind::StakingInitialize if tx_type == TransactionType::StakingActivate => {
                stake_initialize = Some(instruction::decode_stake_initialize(ix)?);
            }
            InstructionKind::StakingDelegate if tx_type == TransactionType::StakingActivate => {
                delegate = Some(instruction::decode_stake_delegate(ix)?);
            }
            InstructionKind::StakingDeactivate
                if tx_type == TransactionType::StakingDeactivate =>
            {
                let (staking_address, from_address) = instruction::decode_stake_deactivate(ix)?;
                body.push(InstructionParams::StakingDeactivate {
                    from_address,
                    staking_address,
                });
            }
            InstructionKind::StakingWithdraw if tx_type == TransactionType::StakingWithdraw => {
                let withdraw = instruction::decode_stake_withdraw(ix)?;
                body.push(InstructionParams::StakingWithdraw {
                    from_address: withdraw.authority,
                    staking_address: withdraw.stake,
                    amount: withdraw.lamports,
                });
            }
            InstructionKind::CreateAssociatedTokenAccount
                if tx_type == TransactionType::AssociatedTokenAccountInitialization =>
            {
                let (payer_address, ata_address, owner_address, mint_address) =
                    instruction::decode_create_associated_token_account(ix)?;
                let token = find_token(tokens, &mint_address)?;
                if associated_token_address(&owner_address, &mint_address)? != ata_address {
                    return Err(Error::parse(
                        "ataAddress",
                        format!("{} is not derived from owner and mint", ata_address),
                    ));
                }
                body.push(InstructionParams::CreateAssociatedTokenAccount {
                    mint_address,
                    ata_address,
                    owner_address,
                    payer_address,
                    token_name: token.name.clone(),
                });
            }
            other => return Err(not_supported(tx_type, other)),
        }
    }

    match tx_type {
        TransactionType::WalletInitialization => {
            let create = create.ok_or_else(|| {
                Error::NotSupported(
                    "Invalid wallet initialization transaction, missing create account instruction"
                        .into(),
                )
            })?;
            let (nonce_address, auth_address) = initialize_nonce.ok_or_else(|| {
                Error::NotSupported(
                    "Invalid wallet initialization transaction, missing initialize nonce instruction"
                        .into(),
                )
            })?;
            body.push(InstructionParams::CreateNonceAccount {
                from_address: create.from,
                nonce_address,
                auth_address,
                amount: create.lamports,
            });
        }
        TransactionType::StakingActivate => {
            let create = create.ok_or_else(|| {
                Error::NotSupported(
                    "Invalid staking activate transaction, missing create stake account instruction"
                        .into(),
                )
            })?;
            let (staking_address, _) = stake_initialize.ok_or_else(|| {
                Error::NotSupported(
                    "Invalid staking activate transaction, missing initialize stake account instruction"
                        .into(),
                )
            })?;
            let (_, validator, _) = delegate.ok_or_else(|| {
                Error::NotSupported(
                    "Invalid staking activate transaction, missing delegate instruction".into(),
                )
            })?;
            body.push(InstructionParams::StakingActivate {
                from_address: create.from,
                staking_address,
                amount: create.lamports,
                validator,
            });
        }
        _ => {}
    }

    if body.is_empty() {
        return Err(Error::NotSupported(format!(
            "Invalid {} transaction, no {} instruction",
            tx_type, tx_type
        )));
    }

    Ok(nonce.into_iter().chain(body).chain(memo).collect())
}
