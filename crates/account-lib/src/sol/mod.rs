//! Solana: legacy transactions for transfers, token transfers, durable
//! nonce accounts, native staking and associated token accounts

pub mod builder;
pub mod instruction;
pub mod params;
pub mod pubkey;
pub mod transaction;
pub mod wire;

pub use builder::{
    AtaInitializationBuilder, DurableNonce, SolBuilder, SolFields, StakingActivateBuilder,
    StakingDeactivateBuilder, StakingWithdrawBuilder, TokenTransferBuilder, TransferBuilder,
    WalletInitializationBuilder,
};
pub use params::InstructionParams;
pub use pubkey::{associated_token_address, Pubkey};
pub use transaction::SolTransaction;

/// Whether `address` is a valid base58 32-byte account address
pub fn is_valid_address(address: &str) -> bool {
    address.parse::<Pubkey>().is_ok()
}

/// Whether `hash` is a valid base58 blockhash
pub fn is_valid_blockhash(hash: &str) -> bool {
    hash.parse::<pubkey::Hash>().is_ok()
}
