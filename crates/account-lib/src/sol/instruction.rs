//! Instructions of the system, stake, token, associated token and memo programs

use super::pubkey::*;
use super::wire::Reader;
use crate::{Error, Result};

/// Space of a nonce account
pub const NONCE_ACCOUNT_LEN: u64 = 80;
/// Space of a stake account
pub const STAKE_ACCOUNT_LEN: u64 = 200;

const SYSTEM_CREATE_ACCOUNT: u32 = 0;
const SYSTEM_TRANSFER: u32 = 2;
const SYSTEM_ADVANCE_NONCE: u32 = 4;
const SYSTEM_INITIALIZE_NONCE: u32 = 6;

const STAKE_INITIALIZE: u32 = 0;
const STAKE_DELEGATE: u32 = 2;
const STAKE_WITHDRAW: u32 = 4;
const STAKE_DEACTIVATE: u32 = 5;

const TOKEN_TRANSFER_CHECKED: u8 = 12;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AccountMeta {
    pub pubkey: Pubkey,
    pub is_signer: bool,
    pub is_writable: bool,
}

impl AccountMeta {
    pub fn new(pubkey: Pubkey, is_signer: bool) -> Self {
        Self {
            pubkey,
            is_signer,
            is_writable: true,
        }
    }

    pub fn new_readonly(pubkey: Pubkey, is_signer: bool) -> Self {
        Self {
            pubkey,
            is_signer,
            is_writable: false,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Instruction {
    pub program_id: Pubkey,
    pub accounts: Vec<AccountMeta>,
    pub data: Vec<u8>,
}

impl Instruction {
    fn account(&self, index: usize) -> Result<Pubkey> {
        self.accounts
            .get(index)
            .map(|meta| meta.pubkey)
            .ok_or_else(|| Error::parse("instruction accounts", format!("missing account {}", index)))
    }
}

/// Recognized instruction kinds
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InstructionKind {
    Memo,
    AdvanceNonceAccount,
    Transfer,
    CreateAccount,
    InitializeNonceAccount,
    StakingInitialize,
    StakingDelegate,
    StakingDeactivate,
    StakingWithdraw,
    TokenTransfer,
    CreateAssociatedTokenAccount,
}

fn tagged(tag: u32) -> Vec<u8> {
    tag.to_le_bytes().to_vec()
}

pub fn transfer(from: &Pubkey, to: &Pubkey, lamports: u64) -> Instruction {
    let mut data = tagged(SYSTEM_TRANSFER);
    data.extend_from_slice(&lamports.to_le_bytes());
    Instruction {
        program_id: SYSTEM_PROGRAM_ID,
        accounts: vec![AccountMeta::new(*from, true), AccountMeta::new(*to, false)],
        data,
    }
}

pub fn create_account(
    from: &Pubkey,
    new_account: &Pubkey,
    lamports: u64,
    space: u64,
    owner: &Pubkey,
) -> Instruction {
    let mut data = tagged(SYSTEM_CREATE_ACCOUNT);
    data.extend_from_slice(&lamports.to_le_bytes());
    data.extend_from_slice(&space.to_le_bytes());
    data.extend_from_slice(owner.as_bytes());
    Instruction {
        program_id: SYSTEM_PROGRAM_ID,
        accounts: vec![
            AccountMeta::new(*from, true),
            AccountMeta::new(*new_account, true),
        ],
        data,
    }
}

pub fn advance_nonce_account(nonce: &Pubkey, authority: &Pubkey) -> Instruction {
    Instruction {
        program_id: SYSTEM_PROGRAM_ID,
        accounts: vec![
            AccountMeta::new(*nonce, false),
            AccountMeta::new_readonly(SYSVAR_RECENT_BLOCKHASHES_ID, false),
            AccountMeta::new_readonly(*authority, true),
        ],
        data: tagged(SYSTEM_ADVANCE_NONCE),
    }
}

pub fn initialize_nonce_account(nonce: &Pubkey, authority: &Pubkey) -> Instruction {
    let mut data = tagged(SYSTEM_INITIALIZE_NONCE);
    data.extend_from_slice(authority.as_bytes());
    Instruction {
        program_id: SYSTEM_PROGRAM_ID,
        accounts: vec![
            AccountMeta::new(*nonce, false),
            AccountMeta::new_readonly(SYSVAR_RECENT_BLOCKHASHES_ID, false),
            AccountMeta::new_readonly(SYSVAR_RENT_ID, false),
        ],
        data,
    }
}

/// Stake initialize with `authority` as both staker and withdrawer, no lockup
pub fn stake_initialize(stake: &Pubkey, authority: &Pubkey) -> Instruction {
    let mut data = tagged(STAKE_INITIALIZE);
    data.extend_from_slice(authority.as_bytes());
    data.extend_from_slice(authority.as_bytes());
    data.extend_from_slice(&0i64.to_le_bytes());
    data.extend_from_slice(&0u64.to_le_bytes());
    data.extend_from_slice(SYSTEM_PROGRAM_ID.as_bytes());
    Instruction {
        program_id: STAKE_PROGRAM_ID,
        accounts: vec![
            AccountMeta::new(*stake, false),
            AccountMeta::new_readonly(SYSVAR_RENT_ID, false),
        ],
        data,
    }
}

pub fn stake_delegate(stake: &Pubkey, authority: &Pubkey, vote: &Pubkey) -> Instruction {
    Instruction {
        program_id: STAKE_PROGRAM_ID,
        accounts: vec![
            AccountMeta::new(*stake, false),
            AccountMeta::new_readonly(*vote, false),
            AccountMeta::new_readonly(SYSVAR_CLOCK_ID, false),
            AccountMeta::new_readonly(SYSVAR_STAKE_HISTORY_ID, false),
            AccountMeta::new_readonly(STAKE_CONFIG_ID, false),
            AccountMeta::new_readonly(*authority, true),
        ],
        data: tagged(STAKE_DELEGATE),
    }
}

pub fn stake_deactivate(stake: &Pubkey, authority: &Pubkey) -> Instruction {
    Instruction {
        program_id: STAKE_PROGRAM_ID,
        accounts: vec![
            AccountMeta::new(*stake, false),
            AccountMeta::new_readonly(SYSVAR_CLOCK_ID, false),
            AccountMeta::new_readonly(*authority, true),
        ],
        data: tagged(STAKE_DEACTIVATE),
    }
}

pub fn stake_withdraw(stake: &Pubkey, authority: &Pubkey, to: &Pubkey, lamports: u64) -> Instruction {
    let mut data = tagged(STAKE_WITHDRAW);
    data.extend_from_slice(&lamports.to_le_bytes());
    Instruction {
        program_id: STAKE_PROGRAM_ID,
        accounts: vec![
            AccountMeta::new(*stake, false),
            AccountMeta::new(*to, false),
            AccountMeta::new_readonly(SYSVAR_CLOCK_ID, false),
            AccountMeta::new_readonly(SYSVAR_STAKE_HISTORY_ID, false),
            AccountMeta::new_readonly(*authority, true),
        ],
        data,
    }
}

pub fn transfer_checked(
    source: &Pubkey,
    mint: &Pubkey,
    destination: &Pubkey,
    owner: &Pubkey,
    amount: u64,
    decimals: u8,
) -> Instruction {
    let mut data = vec![TOKEN_TRANSFER_CHECKED];
    data.extend_from_slice(&amount.to_le_bytes());
    data.push(decimals);
    Instruction {
        program_id: TOKEN_PROGRAM_ID,
        accounts: vec![
            AccountMeta::new(*source, false),
            AccountMeta::new_readonly(*mint, false),
            AccountMeta::new(*destination, false),
            AccountMeta::new_readonly(*owner, true),
        ],
        data,
    }
}

/// Account order: payer, associated account, owner, mint, system, token, rent
pub fn create_associated_token_account(
    payer: &Pubkey,
    ata: &Pubkey,
    owner: &Pubkey,
    mint: &Pubkey,
) -> Instruction {
    Instruction {
        program_id: ASSOCIATED_TOKEN_PROGRAM_ID,
        accounts: vec![
            AccountMeta::new(*payer, true),
            AccountMeta::new(*ata, false),
            AccountMeta::new_readonly(*owner, false),
            AccountMeta::new_readonly(*mint, false),
            AccountMeta::new_readonly(SYSTEM_PROGRAM_ID, false),
            AccountMeta::new_readonly(TOKEN_PROGRAM_ID, false),
            AccountMeta::new_readonly(SYSVAR_RENT_ID, false),
        ],
        data: Vec::new(),
    }
}

pub fn memo(text: &str) -> Instruction {
    Instruction {
        program_id: MEMO_PROGRAM_ID,
        accounts: Vec::new(),
        data: text.as_bytes().to_vec(),
    }
}

/// Identify an instruction; anything outside the known set is `NotSupported`
pub fn classify(ix: &Instruction) -> Result<InstructionKind> {
    let unsupported = || {
        Error::NotSupported(format!(
            "Invalid transaction, instruction type not supported: program {}",
            ix.program_id
        ))
    };
    let tag = || -> Result<u32> { Reader::new(&ix.data).u32_le("instruction data") };

    let kind = match ix.program_id {
        id if id == MEMO_PROGRAM_ID => InstructionKind::Memo,
        id if id == SYSTEM_PROGRAM_ID => match tag()? {
            SYSTEM_CREATE_ACCOUNT => InstructionKind::CreateAccount,
            SYSTEM_TRANSFER => InstructionKind::Transfer,
            SYSTEM_ADVANCE_NONCE => InstructionKind::AdvanceNonceAccount,
            SYSTEM_INITIALIZE_NONCE => InstructionKind::InitializeNonceAccount,
            _ => return Err(unsupported()),
        },
        id if id == STAKE_PROGRAM_ID => match tag()? {
            STAKE_INITIALIZE => InstructionKind::StakingInitialize,
            STAKE_DELEGATE => InstructionKind::StakingDelegate,
            STAKE_WITHDRAW => InstructionKind::StakingWithdraw,
            STAKE_DEACTIVATE => InstructionKind::StakingDeactivate,
            _ => return Err(unsupported()),
        },
        id if id == TOKEN_PROGRAM_ID => match ix.data.first() {
            Some(&TOKEN_TRANSFER_CHECKED) => InstructionKind::TokenTransfer,
            _ => return Err(unsupported()),
        },
        id if id == ASSOCIATED_TOKEN_PROGRAM_ID => InstructionKind::CreateAssociatedTokenAccount,
        _ => return Err(unsupported()),
    };
    Ok(kind)
}

pub struct DecodedTransfer {
    pub from: Pubkey,
    pub to: Pubkey,
    pub lamports: u64,
}

pub fn decode_transfer(ix: &Instruction) -> Result<DecodedTransfer> {
    let mut data = Reader::new(&ix.data);
    data.u32_le("transfer")?;
    let lamports = data.u64_le("transfer lamports")?;
    Ok(DecodedTransfer {
        from: ix.account(0)?,
        to: ix.account(1)?,
        lamports,
    })
}

pub struct DecodedCreateAccount {
    pub from: Pubkey,
    pub new_account: Pubkey,
    pub lamports: u64,
    pub space: u64,
    pub owner: Pubkey,
}

pub fn decode_create_account(ix: &Instruction) -> Result<DecodedCreateAccount> {
    let mut data = Reader::new(&ix.data);
    data.u32_le("create account")?;
    let lamports = data.u64_le("create account lamports")?;
    let space = data.u64_le("create account space")?;
    let owner = Pubkey(data.array32("create account owner")?);
    Ok(DecodedCreateAccount {
        from: ix.account(0)?,
        new_account: ix.account(1)?,
        lamports,
        space,
        owner,
    })
}

/// `(nonce account, authority)` of an advance nonce instruction
pub fn decode_advance_nonce(ix: &Instruction) -> Result<(Pubkey, Pubkey)> {
    Ok((ix.account(0)?, ix.account(2)?))
}

/// `(nonce account, authority)` of an initialize nonce instruction
pub fn decode_initialize_nonce(ix: &Instruction) -> Result<(Pubkey, Pubkey)> {
    let mut data = Reader::new(&ix.data);
    data.u32_le("initialize nonce")?;
    Ok((ix.account(0)?, Pubkey(data.array32("nonce authority")?)))
}

/// `(stake account, staker)` of a stake initialize instruction
pub fn decode_stake_initialize(ix: &Instruction) -> Result<(Pubkey, Pubkey)> {
    let mut data = Reader::new(&ix.data);
    data.u32_le("stake initialize")?;
    Ok((ix.account(0)?, Pubkey(data.array32("staker")?)))
}

/// `(stake account, vote account, authority)`
pub fn decode_stake_delegate(ix: &Instruction) -> Result<(Pubkey, Pubkey, Pubkey)> {
    Ok((ix.account(0)?, ix.account(1)?, ix.account(5)?))
}

/// `(stake account, authority)`
pub fn decode_stake_deactivate(ix: &Instruction) -> Result<(Pubkey, Pubkey)> {
    Ok((ix.account(0)?, ix.account(2)?))
}

pub struct DecodedStakeWithdraw {
    pub stake: Pubkey,
    pub to: Pubkey,
    pub authority: Pubkey,
    pub lamports: u64,
}

pub fn decode_stake_withdraw(ix: &Instruction) -> Result<DecodedStakeWithdraw> {
    let mut data = Reader::new(&ix.data);
    data.u32_le("stake withdraw")?;
    Ok(DecodedStakeWithdraw {
        stake: ix.account(0)?,
        to: ix.account(1)?,
        authority: ix.account(4)?,
        lamports: data.u64_le("stake withdraw lamports")?,
    })
}

pub struct DecodedTransferChecked {
    pub source: Pubkey,
    pub mint: Pubkey,
    pub destination: Pubkey,
    pub owner: Pubkey,
    pub amount: u64,
    pub decimals: u8,
}

pub fn decode_transfer_checked(ix: &Instruction) -> Result<DecodedTransferChecked> {
    let mut data = Reader::new(&ix.data);
    data.u8("transfer checked")?;
    let amount = data.u64_le("transfer checked amount")?;
    let decimals = data.u8("transfer checked decimals")?;
    Ok(DecodedTransferChecked {
        source: ix.account(0)?,
        mint: ix.account(1)?,
        destination: ix.account(2)?,
        owner: ix.account(3)?,
        amount,
        decimals,
    })
}

/// `(payer, associated account, owner, mint)`
pub fn decode_create_associated_token_account(
    ix: &Instruction,
) -> Result<(Pubkey, Pubkey, Pubkey, Pubkey)> {
    Ok((ix.account(0)?, ix.account(1)?, ix.account(2)?, ix.account(3)?))
}

pub fn decode_memo(ix: &Instruction) -> Result<String> {
    String::from_utf8(ix.data.clone()).map_err(|e| Error::parse("memo", e))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_transfer_layout() {
        let ix = transfer(&Pubkey([1; 32]), &Pubkey([2; 32]), 300_000);
        assert_eq!(ix.data.len(), 12);
        assert_eq!(&ix.data[..4], &[2, 0, 0, 0]);
        assert_eq!(classify(&ix).unwrap(), InstructionKind::Transfer);

        let decoded = decode_transfer(&ix).unwrap();
        assert_eq!(decoded.lamports, 300_000);
        assert_eq!(decoded.to, Pubkey([2; 32]));
    }

    #[test]
    fn test_stake_initialize_layout() {
        let ix = stake_initialize(&Pubkey([3; 32]), &Pubkey([4; 32]));
        assert_eq!(ix.data.len(), 4 + 64 + 48);
        assert_eq!(classify(&ix).unwrap(), InstructionKind::StakingInitialize);
        assert_eq!(
            decode_stake_initialize(&ix).unwrap(),
            (Pubkey([3; 32]), Pubkey([4; 32]))
        );
    }

    #[test]
    fn test_transfer_checked_layout() {
        let ix = transfer_checked(
            &Pubkey([1; 32]),
            &Pubkey([2; 32]),
            &Pubkey([3; 32]),
            &Pubkey([4; 32]),
            1_000,
            6,
        );
        assert_eq!(ix.data, [vec![12], 1_000u64.to_le_bytes().to_vec(), vec![6]].concat());
        let decoded = decode_transfer_checked(&ix).unwrap();
        assert_eq!(decoded.owner, Pubkey([4; 32]));
        assert_eq!(decoded.decimals, 6);
    }

    #[test]
    fn test_unknown_instruction_not_supported() {
        let ix = Instruction {
            program_id: Pubkey([9; 32]),
            accounts: vec![],
            data: vec![],
        };
        assert!(matches!(classify(&ix), Err(Error::NotSupported(_))));

        let assign = Instruction {
            program_id: SYSTEM_PROGRAM_ID,
            accounts: vec![],
            data: 1u32.to_le_bytes().to_vec(),
        };
        assert!(matches!(classify(&assign), Err(Error::NotSupported(_))));
    }
}
