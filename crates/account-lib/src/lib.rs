//! # Account Lib
//!
//! Transaction builders for TSS-backed wallets.
//!
//! Each coin family gets builders that validate their fields, produce the
//! canonical unsigned payload, accept signatures from local keys or from an
//! external signer (the TSS ceremony in `tss-core`), and parse previously
//! built transactions back for co-signing.
//!
//! - [`sol`]: Solana transfers, token transfers, durable nonce accounts,
//!   native staking and associated token accounts
//! - [`avaxp`]: Avalanche P-chain `AddValidatorTx` for 2-of-3 multisig wallets
//!
//! ## Example
//!
//! ```rust,ignore
//! use account_lib::{BaseTransaction, CoinRegistry, TransactionBuilder, TransactionBuilderFactory};
//! use account_lib::sol::SolFields;
//!
//! let registry = CoinRegistry::builtin();
//! let factory = TransactionBuilderFactory::new(&registry, "tsol")?;
//!
//! let mut builder = factory.transfer_builder()?;
//! builder.sender(&wallet_address)?.nonce(&blockhash, None)?;
//! builder.send(&receiver, "1000000")?;
//! let mut tx = builder.build()?;
//!
//! tx.add_signature(&wallet_address, &tss_signature)?;
//! let broadcast = tx.to_broadcast_format()?;
//! ```

pub mod avaxp;
pub mod builder;
pub mod coins;
pub mod error;
pub mod factory;
pub mod sol;

pub use builder::{
    BaseTransaction, Entry, Explanation, SigningState, TransactionBuilder, TransactionType,
};
pub use coins::{CoinConfig, CoinFamily, CoinParams, CoinRegistry, Network};
pub use error::{Error, Result};
pub use factory::{AnyTransaction, AnyTransactionBuilder, TransactionBuilderFactory};
